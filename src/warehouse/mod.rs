//! Warehouse abstraction.
//!
//! The core's responsibility ends at handing a sanitized batch and a
//! destination name across this seam; bulk-load staging and chunking belong
//! to the implementation behind it. Sessions are opened per run or per query
//! and always released, never pooled.

pub mod embedded;

use crate::error::Result;
use async_trait::async_trait;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

pub use embedded::EmbeddedWarehouse;

/// Outcome of one bulk load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadOutcome {
    pub rows: usize,
    pub chunks: usize,
}

/// One `table.column (type)` triple from the catalog snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    pub table: String,
    pub column: String,
    pub data_type: String,
    /// 0-based position of the column within its table.
    pub position: usize,
}

/// Catalog snapshots are capped so the schema context handed to the LLM stays
/// bounded.
pub const SNAPSHOT_CAP: usize = 5000;

/// Connection factory. A failed `connect` is the critical-tier error that
/// aborts a whole ingestion run.
#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn WarehouseSession>>;
}

/// One live destination connection.
#[async_trait]
pub trait WarehouseSession: Send + Sync {
    /// Cheap connectivity probe; returns a human-readable version line.
    async fn ping(&self) -> Result<String>;

    /// Create-if-absent, full-overwrite write of a batch into `table`.
    async fn write_table(&self, table: &str, batch: &mut DataFrame) -> Result<LoadOutcome>;

    /// Execute a read-only statement, capped at `max_rows` rows.
    async fn select(&self, sql: &str, max_rows: usize) -> Result<DataFrame>;

    /// Enumerate table/column/type triples, ordered by table then column
    /// position, capped at [`SNAPSHOT_CAP`] entries.
    async fn schema_snapshot(&self) -> Result<Vec<ColumnDef>>;

    /// Post-load verification count.
    async fn row_count(&self, table: &str) -> Result<usize>;

    /// Release the connection. Callers invoke this on every path, including
    /// after a critical failure.
    async fn close(&self) -> Result<()>;
}

/// Render a snapshot as the textual schema context used in LLM prompts:
/// one `table.column (type)` line per entry.
pub fn snapshot_text(snapshot: &[ColumnDef]) -> String {
    snapshot
        .iter()
        .map(|c| format!("{}.{} ({})", c.table, c.column, c.data_type))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_text() {
        let snapshot = vec![
            ColumnDef {
                table: "SALES".into(),
                column: "REGION".into(),
                data_type: "String".into(),
                position: 0,
            },
            ColumnDef {
                table: "SALES".into(),
                column: "TOTAL".into(),
                data_type: "Float64".into(),
                position: 1,
            },
        ];
        assert_eq!(
            snapshot_text(&snapshot),
            "SALES.REGION (String)\nSALES.TOTAL (Float64)"
        );
    }
}
