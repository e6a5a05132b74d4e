//! Ingestion pipeline: fetch every query, process, merge, persist, audit.

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use feed_common::WideTable;
use ingestion::{merge, process_document, LabelTables, MergeInput, ProcessedDocument, Record};
use storage::{SqliteStore, TableAudit};

use crate::config::IngesterConfig;
use crate::query::{redacted_url, FeedQuery};
use crate::sources::{DirectorySource, DocumentSource, HttpSource};
use crate::weather::WeatherClient;

/// What happened to one feed query.
#[derive(Debug)]
pub enum QueryOutcome {
    Processed(ProcessedDocument),
    /// The feed has nothing for this query and window.
    NoData,
    Failed(anyhow::Error),
}

/// Result of one ingestion cycle.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub processed: Vec<String>,
    pub no_data: Vec<String>,
    /// Query name and error text.
    pub failed: Vec<(String, String)>,
    pub weather_locations: usize,
    pub columns: Vec<String>,
    pub audit: TableAudit,
}

/// Main ingestion pipeline.
pub struct IngestionPipeline {
    config: IngesterConfig,
    source: Arc<dyn DocumentSource>,
    weather: Option<WeatherClient>,
    store: SqliteStore,
}

impl IngestionPipeline {
    pub fn new(
        config: IngesterConfig,
        source: Arc<dyn DocumentSource>,
        weather: Option<WeatherClient>,
        store: SqliteStore,
    ) -> Self {
        Self {
            config,
            source,
            weather,
            store,
        }
    }

    /// Build the pipeline the binary runs: HTTP or directory source, the
    /// configured database and, unless skipped, the weather client.
    pub async fn from_config(
        config: IngesterConfig,
        input_dir: Option<PathBuf>,
        skip_weather: bool,
    ) -> Result<Self> {
        let source: Arc<dyn DocumentSource> = match input_dir {
            Some(dir) => Arc::new(DirectorySource::new(dir)),
            None => Arc::new(HttpSource::from_settings(&config.feed)?),
        };

        let weather = match (&config.weather, skip_weather) {
            (Some(settings), false) => Some(WeatherClient::new(settings.clone(), config.feed.timeout)?),
            _ => None,
        };

        let store = SqliteStore::open(&config.database.path)
            .await
            .with_context(|| format!("Failed to open database {:?}", config.database.path))?;

        info!(
            source = %source.describe(),
            queries = config.queries.len(),
            weather = weather.is_some(),
            "Ingestion pipeline ready"
        );

        Ok(Self::new(config, source, weather, store))
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    /// Run the ingestion pipeline forever.
    pub async fn run_forever(&self) -> Result<()> {
        loop {
            info!("Starting ingestion cycle");

            if let Err(e) = self.run_once().await {
                error!(error = %e, "Ingestion cycle failed");
            }

            info!(
                interval_secs = self.config.poll_interval.as_secs(),
                "Sleeping until next cycle"
            );
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// One full cycle. Per-query failures are logged and skipped; the cycle
    /// fails only when nothing could be merged or the write fails.
    #[instrument(skip(self), fields(table = %self.config.database.table))]
    pub async fn run_once(&self) -> Result<RunSummary> {
        let outcomes = self.fetch_all().await;

        let mut processed = Vec::new();
        let mut documents = Vec::new();
        let mut no_data = Vec::new();
        let mut failed = Vec::new();
        for (query, outcome) in self.config.queries.iter().zip(outcomes) {
            match outcome {
                QueryOutcome::Processed(document) => {
                    processed.push(query.name.clone());
                    documents.push(document);
                }
                QueryOutcome::NoData => {
                    warn!(query = %query.name, "No data for query, skipping");
                    no_data.push(query.name.clone());
                }
                QueryOutcome::Failed(e) => {
                    error!(query = %query.name, error = %format!("{:#}", e), "Query failed, skipping");
                    failed.push((query.name.clone(), format!("{:#}", e)));
                }
            }
        }

        let weather_records = self.fetch_weather().await;

        let no_labels = LabelTables::new();
        let mut inputs: Vec<MergeInput<'_>> = documents
            .iter()
            .map(|doc| MergeInput::new(&doc.records, &self.config.labels))
            .collect();
        inputs.extend(
            weather_records
                .iter()
                .map(|records| MergeInput::new(records, &no_labels)),
        );

        let total: usize = inputs.iter().map(|input| input.records.len()).sum();
        anyhow::ensure!(
            total > 0,
            "No records from any source, table '{}' left unchanged",
            self.config.database.table
        );

        let table = self.build_table(&inputs).await?;
        let audit = self.persist(&table).await?;

        let summary = RunSummary {
            processed,
            no_data,
            failed,
            weather_locations: weather_records.len(),
            columns: table.columns().to_vec(),
            audit,
        };

        info!(
            processed = summary.processed.len(),
            no_data = summary.no_data.len(),
            failed = summary.failed.len(),
            weather_locations = summary.weather_locations,
            rows = summary.audit.rows,
            columns = summary.columns.len(),
            "Ingestion cycle completed"
        );
        Ok(summary)
    }

    /// Fetch and process every query, bounded by `max_concurrent`.
    /// Outcomes come back in query order.
    async fn fetch_all(&self) -> Vec<QueryOutcome> {
        let mut outcomes: Vec<(usize, QueryOutcome)> = stream::iter(self.config.queries.iter().enumerate())
            .map(|(index, query)| async move { (index, self.run_query(query).await) })
            .buffer_unordered(self.config.feed.max_concurrent)
            .collect()
            .await;
        outcomes.sort_by_key(|(index, _)| *index);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }

    async fn run_query(&self, query: &FeedQuery) -> QueryOutcome {
        let bytes = match self.source.fetch(query).await {
            Ok(bytes) => bytes,
            Err(e) => return QueryOutcome::Failed(e),
        };

        match process_document(&query.name, &bytes, &query.required, &query.optional) {
            Ok(document) => QueryOutcome::Processed(document),
            Err(e) if e.is_no_data() => QueryOutcome::NoData,
            Err(e) => QueryOutcome::Failed(e.into()),
        }
    }

    /// Records per location. Failed locations are logged and left out.
    async fn fetch_weather(&self) -> Vec<Vec<Record>> {
        let Some(client) = &self.weather else {
            return Vec::new();
        };

        let mut all = Vec::with_capacity(client.locations().len());
        for location in client.locations() {
            match client.fetch_records(location).await {
                Ok(records) => all.push(records),
                Err(e) => warn!(city = %location.name, error = %format!("{:#}", e), "Weather fetch failed, skipping"),
            }
        }
        all
    }

    /// Merge, rename and join the configured existing tables.
    async fn build_table(&self, inputs: &[MergeInput<'_>]) -> Result<WideTable> {
        let merged = merge(inputs, &self.config.target_zone);
        let mut table = merged
            .rename_columns(&self.config.aliases)
            .context("Failed to apply column aliases")?;

        for name in &self.config.database.join_tables {
            if !self.store.table_exists(name).await? {
                warn!(table = %name, "Join table does not exist, skipping");
                continue;
            }
            let other = self.store.load_table(name).await?;
            table = table
                .outer_join(&other)
                .with_context(|| format!("Failed to join table '{}'", name))?;
            debug!(table = %name, rows = table.len(), "Joined existing table");
        }

        Ok(table)
    }

    /// Replace the output table and audit what was written.
    async fn persist(&self, table: &WideTable) -> Result<TableAudit> {
        let name = &self.config.database.table;
        self.store.replace_table(name, table).await?;

        let audit = self.store.audit(name).await?;
        info!(
            table = %audit.table,
            rows = audit.rows,
            duplicate_timestamps = audit.duplicate_timestamps,
            null_timestamps = audit.null_timestamps,
            first = ?audit.first,
            last = ?audit.last,
            "Table audit"
        );
        for column in audit.null_counts.iter().filter(|c| c.nulls > 0) {
            debug!(table = %audit.table, column = %column.column, nulls = column.nulls, "Column has nulls");
        }
        if !audit.is_clean() {
            warn!(table = %audit.table, "Audit found duplicate or missing timestamps");
        }
        Ok(audit)
    }
}

/// Request URLs for every feed query and weather location, token redacted.
pub fn print_urls(config: &IngesterConfig) -> Result<Vec<String>> {
    let mut urls = Vec::with_capacity(config.queries.len());
    for query in &config.queries {
        let url = redacted_url(&config.feed.endpoint, query, &config.feed.period)?;
        urls.push(format!("{}: {}", query.name, url));
    }

    if let Some(settings) = &config.weather {
        for location in &settings.locations {
            let url = crate::weather::archive_url(
                &settings.endpoint,
                location,
                &settings.start_date,
                &settings.end_date,
                &settings.variables,
            )?;
            urls.push(format!("weather/{}: {}", location.name, url));
        }
    }

    Ok(urls)
}
