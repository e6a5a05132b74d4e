//! Common test fixtures: namespaces, query parameters and feed document builders.

/// Namespace URIs used by the market feed document types.
pub mod namespaces {
    /// Generation and load documents (`GL_MarketDocument`).
    pub const GENERATION_LOAD: &str = "urn:iec62325.351:tc57wg16:451-6:generationloaddocument:3:0";

    /// Day-ahead prices (`Publication_MarketDocument`).
    pub const PUBLICATION: &str = "urn:iec62325.351:tc57wg16:451-3:publicationdocument:7:3";

    /// In-band error replies (`Acknowledgement_MarketDocument`).
    pub const ACKNOWLEDGEMENT: &str = "urn:iec62325.351:tc57wg16:451-1:acknowledgementdocument:7:0";
}

/// Start instants used across tests.
pub mod time {
    /// Midnight on 2024-01-01 in Paris.
    pub const PARIS_MIDNIGHT: &str = "2024-01-01T00:00+01:00";

    /// The same instant in UTC, as the upstream API writes it.
    pub const PARIS_MIDNIGHT_UTC: &str = "2023-12-31T23:00Z";

    /// Period bounds in `YYYYMMDDHHMM` form.
    pub const PERIOD_START: &str = "202312312300";
    pub const PERIOD_END: &str = "202401012300";
}

/// Query parameters as the service passes them to the extractor.
pub mod params {
    pub const GENERATION_FORECAST: [(&str, &str); 2] =
        [("documentType", "A69"), ("processType", "A01")];

    pub const DAY_AHEAD_PRICES: [(&str, &str); 1] = [("documentType", "A44")];

    pub const FRANCE_DOMAIN: (&str, &str) = ("in_Domain", "10YFR-RTE------C");
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[derive(Debug, Clone)]
struct PeriodFixture {
    start: String,
    resolution: String,
    values: Vec<String>,
}

/// One `TimeSeries` element under construction.
#[derive(Debug, Clone)]
pub struct SeriesFixture {
    tags: Vec<(String, String)>,
    periods: Vec<PeriodFixture>,
}

impl SeriesFixture {
    /// Series with one `Period` starting at `start` with the given resolution in minutes.
    pub fn new(start: &str, resolution_minutes: u32) -> Self {
        Self {
            tags: Vec::new(),
            periods: vec![PeriodFixture {
                start: start.to_string(),
                resolution: format!("PT{}M", resolution_minutes),
                values: Vec::new(),
            }],
        }
    }

    /// Add a metadata child element such as `businessType` or `MktPSRType`.
    pub fn tag(mut self, name: &str, value: &str) -> Self {
        self.tags.push((name.to_string(), value.to_string()));
        self
    }

    /// Override the resolution code of the last period verbatim.
    pub fn resolution_code(mut self, code: &str) -> Self {
        if let Some(period) = self.periods.last_mut() {
            period.resolution = code.to_string();
        }
        self
    }

    /// Append numeric values to the last period, positions continuing from 1.
    pub fn values<I: IntoIterator<Item = f64>>(mut self, values: I) -> Self {
        if let Some(period) = self.periods.last_mut() {
            period.values.extend(values.into_iter().map(|v| v.to_string()));
        }
        self
    }

    /// Append values verbatim, for malformed-data tests.
    pub fn raw_values(mut self, values: &[&str]) -> Self {
        if let Some(period) = self.periods.last_mut() {
            period.values.extend(values.iter().map(|v| v.to_string()));
        }
        self
    }

    /// Start another `Period` block within the same series.
    pub fn period(mut self, start: &str, resolution_minutes: u32) -> Self {
        self.periods.push(PeriodFixture {
            start: start.to_string(),
            resolution: format!("PT{}M", resolution_minutes),
            values: Vec::new(),
        });
        self
    }

    fn to_xml(&self, mrid: usize, value_field: &str) -> String {
        let mut xml = format!("<TimeSeries><mRID>{}</mRID>", mrid);
        for (name, value) in &self.tags {
            if name == "MktPSRType" {
                xml.push_str(&format!(
                    "<MktPSRType><psrType>{}</psrType></MktPSRType>",
                    escape(value)
                ));
            } else {
                xml.push_str(&format!("<{name}>{}</{name}>", escape(value)));
            }
        }
        for period in &self.periods {
            xml.push_str(&format!(
                "<Period><timeInterval><start>{}</start></timeInterval><resolution>{}</resolution>",
                period.start, period.resolution
            ));
            for (i, value) in period.values.iter().enumerate() {
                xml.push_str(&format!(
                    "<Point><position>{}</position><{field}>{}</{field}></Point>",
                    i + 1,
                    escape(value),
                    field = value_field
                ));
            }
            xml.push_str("</Period>");
        }
        xml.push_str("</TimeSeries>");
        xml
    }
}

/// Builds complete feed documents.
#[derive(Debug, Clone)]
pub struct FeedDocumentBuilder {
    root: String,
    namespace: String,
    value_field: String,
    series: Vec<SeriesFixture>,
}

impl FeedDocumentBuilder {
    pub fn new(root: &str, namespace: &str, value_field: &str) -> Self {
        Self {
            root: root.to_string(),
            namespace: namespace.to_string(),
            value_field: value_field.to_string(),
            series: Vec::new(),
        }
    }

    /// Generation/load document with `quantity` values.
    pub fn generation() -> Self {
        Self::new("GL_MarketDocument", namespaces::GENERATION_LOAD, "quantity")
    }

    /// Price document with `price.amount` values.
    pub fn prices() -> Self {
        Self::new(
            "Publication_MarketDocument",
            namespaces::PUBLICATION,
            "price.amount",
        )
    }

    pub fn series(mut self, series: SeriesFixture) -> Self {
        self.series.push(series);
        self
    }

    pub fn build(&self) -> String {
        let body: String = self
            .series
            .iter()
            .enumerate()
            .map(|(i, s)| s.to_xml(i + 1, &self.value_field))
            .collect();
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<{root} xmlns=\"{ns}\"><mRID>doc</mRID><type>A75</type>{body}</{root}>",
            root = self.root,
            ns = self.namespace,
            body = body
        )
    }

    pub fn build_bytes(&self) -> Vec<u8> {
        self.build().into_bytes()
    }
}

/// Upstream in-band error reply.
pub fn acknowledgement(code: &str, text: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Acknowledgement_MarketDocument xmlns=\"{}\"><mRID>ack</mRID>\
         <Reason><code>{}</code><text>{}</text></Reason></Acknowledgement_MarketDocument>",
        namespaces::ACKNOWLEDGEMENT,
        escape(code),
        escape(text)
    )
}
