//! Namespace-aware XML tree reader.
//!
//! Feed documents use a single default namespace whose URI changes with the
//! document type (generation, prices, load, acknowledgement...). The reader
//! keeps the resolved namespace of every element, discovers the document
//! namespace from the root tag and answers path queries restricted to that
//! namespace.
//!
//! Path syntax is a small subset of XPath:
//! - `a/b/c` selects `c` children of `b` children of `a` children
//! - an empty step (`//b`, `a//b`) selects descendants instead of children
//! - `*` matches any element, `.` keeps the current node

use std::collections::HashSet;

use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;

use feed_common::{FeedError, FeedResult};

/// Parsed element with its resolved namespace URI and local name.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    namespace: Option<String>,
    name: String,
    children: Vec<Content>,
}

#[derive(Debug, Clone, PartialEq)]
enum Content {
    Element(Element),
    Text(String),
}

impl Element {
    fn new(namespace: Option<String>, name: String) -> Self {
        Self {
            namespace,
            name,
            children: Vec::new(),
        }
    }

    fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            Content::Element(e) => Some(e),
            Content::Text(_) => None,
        })
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Content::Text(t) => out.push_str(t),
                Content::Element(e) => e.collect_text(out),
            }
        }
    }
}

/// A well-formed XML document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Element,
}

impl Document {
    /// Parse raw bytes. Fails with [`FeedError::Parse`] on malformed XML.
    pub fn parse(bytes: &[u8]) -> FeedResult<Self> {
        let mut reader = NsReader::from_reader(bytes);
        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    if stack.is_empty() && root.is_some() {
                        return Err(FeedError::Parse("content after root element".to_string()));
                    }
                    let (ns, local) = reader.resolve_element(e.name());
                    let namespace = resolve_namespace(ns)?;
                    let name = String::from_utf8_lossy(local.as_ref()).into_owned();
                    stack.push(Element::new(namespace, name));
                }
                Ok(Event::Empty(e)) => {
                    let (ns, local) = reader.resolve_element(e.name());
                    let namespace = resolve_namespace(ns)?;
                    let name = String::from_utf8_lossy(local.as_ref()).into_owned();
                    let element = Element::new(namespace, name);
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Content::Element(element)),
                        None if root.is_none() => root = Some(element),
                        None => {
                            return Err(FeedError::Parse(
                                "content after root element".to_string(),
                            ))
                        }
                    }
                }
                Ok(Event::End(_)) => {
                    let element = stack.pop().ok_or_else(|| {
                        FeedError::Parse("closing tag without matching opening tag".to_string())
                    })?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Content::Element(element)),
                        None => root = Some(element),
                    }
                }
                Ok(Event::Text(e)) => {
                    let text = e
                        .unescape()
                        .map_err(|err| FeedError::Parse(err.to_string()))?
                        .into_owned();
                    push_text(&mut stack, text)?;
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    push_text(&mut stack, text)?;
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(FeedError::Parse(e.to_string())),
            }
            buf.clear();
        }

        if let Some(open) = stack.last() {
            return Err(FeedError::Parse(format!(
                "unexpected end of document, <{}> is not closed",
                open.name
            )));
        }

        root.map(|root| Document { root })
            .ok_or_else(|| FeedError::Parse("document has no root element".to_string()))
    }

    /// Local name of the root element.
    pub fn root_name(&self) -> &str {
        &self.root.name
    }

    /// Namespace URI of the root element.
    pub fn namespace(&self) -> FeedResult<&str> {
        self.root.namespace.as_deref().ok_or_else(|| {
            FeedError::Schema(format!(
                "root element <{}> has no namespace",
                self.root.name
            ))
        })
    }

    /// Handle on the root element, bound to the document namespace.
    pub fn root(&self) -> FeedResult<Node<'_>> {
        let namespace = self.namespace()?;
        Ok(Node {
            element: &self.root,
            namespace,
        })
    }

    /// Path query evaluated from the root element.
    pub fn select(&self, path: &str) -> FeedResult<Vec<Node<'_>>> {
        Ok(self.root()?.select(path))
    }

    /// Report the in-band `Reason/code` + `Reason/text` error, if the document carries one.
    pub fn upstream_error(&self) -> FeedResult<Option<FeedError>> {
        let root = self.root()?;
        Ok(root.select_text("//Reason/code").map(|code| FeedError::Upstream {
            code,
            message: root.select_text("//Reason/text").unwrap_or_default(),
        }))
    }
}

fn resolve_namespace(ns: ResolveResult<'_>) -> FeedResult<Option<String>> {
    match ns {
        ResolveResult::Bound(Namespace(uri)) => Ok(Some(String::from_utf8_lossy(uri).into_owned())),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(FeedError::Parse(format!(
            "undeclared namespace prefix '{}'",
            String::from_utf8_lossy(&prefix)
        ))),
    }
}

fn push_text(stack: &mut [Element], text: String) -> FeedResult<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Content::Text(text));
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(FeedError::Parse("text outside of root element".to_string())),
    }
}

/// Borrowed handle on an element, carrying the document namespace used for queries.
#[derive(Debug, Clone, Copy)]
pub struct Node<'a> {
    element: &'a Element,
    namespace: &'a str,
}

#[derive(Debug)]
struct Step<'p> {
    descendant: bool,
    name: &'p str,
}

impl<'a> Node<'a> {
    pub fn local_name(&self) -> &'a str {
        &self.element.name
    }

    /// Concatenated text of the element and its descendants, trimmed.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.element.collect_text(&mut out);
        out.trim().to_string()
    }

    /// Child elements in the document namespace.
    pub fn children(&self) -> Vec<Node<'a>> {
        let namespace = self.namespace;
        self.element
            .child_elements()
            .filter(|e| e.namespace.as_deref() == Some(namespace))
            .map(|element| Node { element, namespace })
            .collect()
    }

    /// Evaluate a path relative to this node, in document order.
    pub fn select(&self, path: &str) -> Vec<Node<'a>> {
        let steps = parse_path(path);
        if steps.is_empty() {
            return Vec::new();
        }

        let mut current: Vec<&'a Element> = vec![self.element];
        for step in &steps {
            if step.name == "." {
                continue;
            }
            let mut next = Vec::new();
            let mut seen: HashSet<*const Element> = HashSet::new();
            for element in &current {
                if step.descendant {
                    self.collect_descendants(element, step.name, &mut seen, &mut next);
                } else {
                    for child in element.child_elements() {
                        if self.matches(child, step.name) && seen.insert(child as *const Element) {
                            next.push(child);
                        }
                    }
                }
            }
            current = next;
        }

        current
            .into_iter()
            .map(|element| Node {
                element,
                namespace: self.namespace,
            })
            .collect()
    }

    /// First match of `path`, if any.
    pub fn select_first(&self, path: &str) -> Option<Node<'a>> {
        self.select(path).into_iter().next()
    }

    /// Trimmed text of the first match of `path`.
    pub fn select_text(&self, path: &str) -> Option<String> {
        self.select_first(path).map(|n| n.text())
    }

    fn matches(&self, element: &Element, name: &str) -> bool {
        element.namespace.as_deref() == Some(self.namespace) && (name == "*" || element.name == name)
    }

    fn collect_descendants(
        &self,
        element: &'a Element,
        name: &str,
        seen: &mut HashSet<*const Element>,
        out: &mut Vec<&'a Element>,
    ) {
        for child in element.child_elements() {
            if self.matches(child, name) && seen.insert(child as *const Element) {
                out.push(child);
            }
            self.collect_descendants(child, name, seen, out);
        }
    }
}

fn parse_path(path: &str) -> Vec<Step<'_>> {
    let mut steps = Vec::new();
    let mut descendant = false;
    for segment in path.split('/') {
        let segment = segment.trim();
        if segment.is_empty() {
            descendant = true;
            continue;
        }
        steps.push(Step {
            descendant,
            name: segment,
        });
        descendant = false;
    }
    steps
}
