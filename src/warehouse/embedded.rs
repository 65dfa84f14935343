//! Embedded warehouse backed by one parquet file per table.
//!
//! Tables live as `<NAME>.parquet` under a data directory; SELECTs run
//! through the polars `SQLContext` with every table registered. Writes are
//! whole-file overwrites, which gives the create-if-absent / replace-contents
//! semantics the loader relies on.

use super::{ColumnDef, LoadOutcome, Warehouse, WarehouseSession, SNAPSHOT_CAP};
use crate::error::{DockError, Result};
use async_trait::async_trait;
use polars::prelude::*;
use polars::sql::SQLContext;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct EmbeddedWarehouse {
    data_dir: PathBuf,
}

impl EmbeddedWarehouse {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }
}

#[async_trait]
impl Warehouse for EmbeddedWarehouse {
    async fn connect(&self) -> Result<Box<dyn WarehouseSession>> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| {
            DockError::Warehouse(format!(
                "Cannot open data directory {}: {}",
                self.data_dir.display(),
                e
            ))
        })?;
        debug!("Opened embedded warehouse at {}", self.data_dir.display());
        Ok(Box::new(EmbeddedSession { data_dir: self.data_dir.clone() }))
    }
}

pub struct EmbeddedSession {
    data_dir: PathBuf,
}

impl EmbeddedSession {
    fn table_path(&self, table: &str) -> PathBuf {
        self.data_dir.join(format!("{}.parquet", table))
    }

    /// Table names in deterministic (sorted) order.
    fn list_tables(&self) -> Result<Vec<String>> {
        let mut tables = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("parquet") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    tables.push(stem.to_string());
                }
            }
        }
        tables.sort();
        Ok(tables)
    }

    fn scan_table(&self, table: &str) -> Result<LazyFrame> {
        let path = self.table_path(table);
        LazyFrame::scan_parquet(&path, ScanArgsParquet::default())
            .map_err(|e| DockError::Warehouse(format!("Failed to scan table {}: {}", table, e)))
    }
}

#[async_trait]
impl WarehouseSession for EmbeddedSession {
    async fn ping(&self) -> Result<String> {
        if !self.data_dir.is_dir() {
            return Err(DockError::Warehouse(format!(
                "Data directory missing: {}",
                self.data_dir.display()
            )));
        }
        Ok(format!(
            "embedded warehouse at {} ({} tables)",
            self.data_dir.display(),
            self.list_tables()?.len()
        ))
    }

    async fn write_table(&self, table: &str, batch: &mut DataFrame) -> Result<LoadOutcome> {
        let path = self.table_path(table);
        // Write to a sibling temp file then rename, so a failed write never
        // truncates an existing table.
        let tmp = self.data_dir.join(format!("{}.parquet.tmp", table));
        let file = std::fs::File::create(&tmp)?;
        ParquetWriter::new(file)
            .finish(batch)
            .map_err(|e| DockError::Warehouse(format!("Failed to write table {}: {}", table, e)))?;
        std::fs::rename(&tmp, &path)?;

        info!("Wrote {} rows into {}", batch.height(), table);
        Ok(LoadOutcome { rows: batch.height(), chunks: batch.n_chunks() })
    }

    async fn select(&self, sql: &str, max_rows: usize) -> Result<DataFrame> {
        let mut ctx = SQLContext::new();
        for table in self.list_tables()? {
            ctx.register(&table, self.scan_table(&table)?);
        }
        ctx.execute(sql)
            .map_err(|e| DockError::Warehouse(format!("Query failed: {}", e)))?
            .limit(max_rows as u32)
            .collect()
            .map_err(|e| DockError::Warehouse(format!("Query failed: {}", e)))
    }

    async fn schema_snapshot(&self) -> Result<Vec<ColumnDef>> {
        let mut snapshot = Vec::new();
        for table in self.list_tables()? {
            let schema = self
                .scan_table(&table)?
                .schema()
                .map_err(|e| DockError::Warehouse(format!("Failed to read schema of {}: {}", table, e)))?;
            for (position, (name, dtype)) in schema.iter().enumerate() {
                if snapshot.len() >= SNAPSHOT_CAP {
                    return Ok(snapshot);
                }
                snapshot.push(ColumnDef {
                    table: table.clone(),
                    column: name.to_string(),
                    data_type: format!("{:?}", dtype),
                    position,
                });
            }
        }
        Ok(snapshot)
    }

    async fn row_count(&self, table: &str) -> Result<usize> {
        let df = self
            .scan_table(table)?
            .select([len()])
            .collect()
            .map_err(|e| DockError::Warehouse(format!("Failed to count {}: {}", table, e)))?;
        let count = df
            .column("len")?
            .u32()?
            .get(0)
            .unwrap_or(0);
        Ok(count as usize)
    }

    async fn close(&self) -> Result<()> {
        debug!("Released embedded warehouse session");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_select_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let warehouse = EmbeddedWarehouse::new(dir.path());
        let session = warehouse.connect().await.unwrap();

        let mut df = df! [
            "REGION" => ["north", "south"],
            "TOTAL" => [10.0f64, 20.0]
        ]
        .unwrap();
        let outcome = session.write_table("SALES", &mut df).await.unwrap();
        assert_eq!(outcome.rows, 2);

        let out = session
            .select("SELECT REGION, TOTAL FROM SALES ORDER BY TOTAL", 1000)
            .await
            .unwrap();
        assert_eq!(out.height(), 2);
        assert_eq!(session.row_count("SALES").await.unwrap(), 2);
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_overwrite_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let warehouse = EmbeddedWarehouse::new(dir.path());
        let session = warehouse.connect().await.unwrap();

        let mut first = df! ["A" => [1i64, 2, 3]].unwrap();
        session.write_table("T", &mut first).await.unwrap();
        let mut second = df! ["A" => [9i64]].unwrap();
        session.write_table("T", &mut second).await.unwrap();

        assert_eq!(session.row_count("T").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_connect_fails_on_non_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("not_a_dir");
        std::fs::write(&file_path, b"x").unwrap();

        let warehouse = EmbeddedWarehouse::new(&file_path);
        assert!(warehouse.connect().await.is_err());
    }

    #[tokio::test]
    async fn test_schema_snapshot_ordering() {
        let dir = tempfile::tempdir().unwrap();
        let warehouse = EmbeddedWarehouse::new(dir.path());
        let session = warehouse.connect().await.unwrap();

        let mut df = df! ["B" => [1i64], "A" => [2i64]].unwrap();
        session.write_table("ZED", &mut df).await.unwrap();
        let mut df = df! ["X" => ["a"]].unwrap();
        session.write_table("ALPHA", &mut df).await.unwrap();

        let snapshot = session.schema_snapshot().await.unwrap();
        let tables: Vec<&str> = snapshot.iter().map(|c| c.table.as_str()).collect();
        assert_eq!(tables, vec!["ALPHA", "ZED", "ZED"]);
        // Column order within a table follows position, not name.
        assert_eq!(snapshot[1].column, "B");
        assert_eq!(snapshot[1].position, 0);
        assert_eq!(snapshot[2].column, "A");
    }
}
