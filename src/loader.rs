//! Ingestion pipeline: fetch → normalize → load.
//!
//! Sources are processed strictly in input order. A failure in one source is
//! recorded and the run moves on; only a warehouse connectivity failure stops
//! the run, and the session is released on every exit path.

use crate::error::Result;
use crate::events::{LoadEvent, LoadReport, LoadStatus};
use crate::fetch::{coerce_batch, SourceFetch};
use crate::identifiers::{dedupe_columns, derive_table_name, sanitize_column};
use crate::warehouse::{Warehouse, WarehouseSession};
use tracing::{error, info, warn};

pub struct Loader<'a> {
    warehouse: &'a dyn Warehouse,
    fetcher: &'a dyn SourceFetch,
}

impl<'a> Loader<'a> {
    pub fn new(warehouse: &'a dyn Warehouse, fetcher: &'a dyn SourceFetch) -> Self {
        Self { warehouse, fetcher }
    }

    /// Run one ingestion batch over an ordered list of source descriptors.
    pub async fn run(&self, sources: &[String]) -> LoadReport {
        let mut events = Vec::new();

        // Blank descriptors are dropped before numbering, so source_<n> tags
        // always line up with what actually ran.
        let sources: Vec<&str> = sources
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();

        if sources.is_empty() {
            return LoadReport {
                status: LoadStatus::Failed,
                message: "No sources provided".to_string(),
                events,
                tables_loaded: 0,
            };
        }

        let session = match self.warehouse.connect().await {
            Ok(session) => session,
            Err(e) => {
                error!("Warehouse connection failed: {}", e);
                events.push(LoadEvent::critical(format!("Connection failed: {}", e)));
                return LoadReport {
                    status: LoadStatus::Failed,
                    message: "Warehouse connection failed".to_string(),
                    events,
                    tables_loaded: 0,
                };
            }
        };

        match session.ping().await {
            Ok(version) => events.push(LoadEvent::info(format!("Connection test: {}", version))),
            Err(e) => {
                error!("Warehouse ping failed: {}", e);
                events.push(LoadEvent::critical(format!("Connection test failed: {}", e)));
                self.release(session.as_ref(), &mut events).await;
                return LoadReport {
                    status: LoadStatus::Failed,
                    message: "Warehouse connection failed".to_string(),
                    events,
                    tables_loaded: 0,
                };
            }
        }

        events.push(LoadEvent::info(format!("Processing {} sources", sources.len())));

        let mut tables_loaded = 0usize;
        for (i, descriptor) in sources.iter().enumerate() {
            let index = i + 1;
            let tag = format!("source_{}", index);
            events.push(LoadEvent::info(format!("Processing {}: {}", tag, descriptor)));

            match self
                .load_one(session.as_ref(), descriptor, index, &mut events)
                .await
            {
                Ok(true) => tables_loaded += 1,
                Ok(false) => {} // empty source, already reported
                Err(e) => {
                    warn!("Source {} failed: {}", tag, e);
                    events.push(LoadEvent::error(tag, e.to_string()));
                }
            }
        }

        self.release(session.as_ref(), &mut events).await;

        LoadReport {
            status: LoadStatus::Completed,
            message: format!("Loaded {} of {} sources", tables_loaded, sources.len()),
            events,
            tables_loaded,
        }
    }

    /// Process a single source end to end. Returns `Ok(false)` for an empty
    /// (skipped) source.
    async fn load_one(
        &self,
        session: &dyn WarehouseSession,
        descriptor: &str,
        index: usize,
        events: &mut Vec<LoadEvent>,
    ) -> Result<bool> {
        let mut df = self.fetcher.fetch(descriptor).await?;
        events.push(LoadEvent::info(format!(
            "Fetched {} rows x {} columns",
            df.height(),
            df.width()
        )));

        if df.height() == 0 {
            events.push(LoadEvent::warning(format!(
                "source_{} is empty, skipping",
                index
            )));
            return Ok(false);
        }

        let table = derive_table_name(descriptor, index);
        events.push(LoadEvent::info(format!("Target table: {}", table)));

        let original: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        let sanitized = dedupe_columns(original.iter().map(|c| sanitize_column(c)).collect());
        df.set_column_names(&sanitized)?;
        events.push(LoadEvent::info(format!(
            "Sanitized columns ({}): {}",
            sanitized.len(),
            sanitized.join(", ")
        )));

        coerce_batch(&mut df)?;

        let outcome = session.write_table(&table, &mut df).await?;
        info!("Loaded {} rows into {}", outcome.rows, table);
        events.push(LoadEvent::info(format!(
            "SUCCESS: loaded {} rows into {} (chunks: {})",
            outcome.rows, table, outcome.chunks
        )));

        let verified = session.row_count(&table).await?;
        events.push(LoadEvent::info(format!(
            "Verification: table {} now has {} rows",
            table, verified
        )));

        Ok(true)
    }

    async fn release(&self, session: &dyn WarehouseSession, events: &mut Vec<LoadEvent>) {
        match session.close().await {
            Ok(()) => events.push(LoadEvent::info("Warehouse session released".to_string())),
            Err(e) => warn!("Failed to release warehouse session: {}", e),
        }
    }
}
