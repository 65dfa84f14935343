//! Source fetching and type coercion.
//!
//! One source descriptor is either a URL ending in `.csv`/`.parquet`, a JSON
//! API URL, or a server-local file path. Each dispatches to a polars reader
//! and yields an in-memory batch ready for sanitization and load.

use crate::config::FetchConfig;
use crate::error::{DockError, Result};
use async_trait::async_trait;
use polars::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Seam between the loader and the outside world, so tests can substitute a
/// failing or canned fetcher.
#[async_trait]
pub trait SourceFetch: Send + Sync {
    /// Produce a tabular batch for one descriptor. Errors are per-source and
    /// never abort the surrounding run.
    async fn fetch(&self, descriptor: &str) -> Result<DataFrame>;
}

/// GET client with bounded retries on transient upstream failures.
///
/// Retries only GET, only on 500/502/503/504, with exponential backoff
/// starting at the configured initial delay. Every request carries the fixed
/// fetch timeout.
pub struct RetryingClient {
    inner: reqwest::Client,
    retries: u32,
    backoff: std::time::Duration,
}

impl RetryingClient {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DockError::Fetch(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            inner,
            retries: config.retries,
            backoff: config.backoff,
        })
    }

    const RETRY_STATUS: [u16; 4] = [500, 502, 503, 504];

    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let mut delay = self.backoff;
        let mut last_err = String::new();

        for attempt in 1..=self.retries.max(1) {
            match self.inner.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let bytes = response
                            .bytes()
                            .await
                            .map_err(|e| DockError::Fetch(format!("Failed to read body from {}: {}", url, e)))?;
                        return Ok(bytes.to_vec());
                    }
                    last_err = format!("HTTP {} from {}", status.as_u16(), url);
                    if !Self::RETRY_STATUS.contains(&status.as_u16()) {
                        return Err(DockError::Fetch(last_err));
                    }
                }
                Err(e) => {
                    // Timeouts and connection errors are final; only retryable
                    // status codes re-enter the loop.
                    return Err(DockError::Fetch(format!("GET {} failed: {}", url, e)));
                }
            }
            if attempt < self.retries {
                warn!("Transient failure ({}), retrying in {:?}", last_err, delay);
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
        Err(DockError::Fetch(format!("Retries exhausted: {}", last_err)))
    }
}

/// Production fetcher dispatching on descriptor extension.
pub struct HttpSourceFetcher {
    client: RetryingClient,
}

impl HttpSourceFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Ok(Self { client: RetryingClient::new(config)? })
    }

    async fn fetch_csv(&self, descriptor: &str) -> Result<DataFrame> {
        if is_url(descriptor) {
            let bytes = self.client.get_bytes(descriptor).await?;
            let tmp = spool_to_temp(&bytes, "csv")?;
            let result = read_csv_path(&tmp);
            let _ = std::fs::remove_file(&tmp);
            result
        } else {
            read_csv_path(Path::new(descriptor))
        }
    }

    async fn fetch_parquet(&self, descriptor: &str) -> Result<DataFrame> {
        if is_url(descriptor) {
            let bytes = self.client.get_bytes(descriptor).await?;
            let tmp = spool_to_temp(&bytes, "parquet")?;
            let result = read_parquet_path(&tmp);
            let _ = std::fs::remove_file(&tmp);
            result
        } else {
            read_parquet_path(Path::new(descriptor))
        }
    }

    /// Anything that is not CSV/parquet is treated as a JSON API returning an
    /// array of objects.
    async fn fetch_json_api(&self, descriptor: &str) -> Result<DataFrame> {
        let bytes = self.client.get_bytes(descriptor).await?;
        JsonReader::new(Cursor::new(bytes))
            .finish()
            .map_err(|e| DockError::Fetch(format!("Failed to parse JSON from {}: {}", descriptor, e)))
    }
}

#[async_trait]
impl SourceFetch for HttpSourceFetcher {
    async fn fetch(&self, descriptor: &str) -> Result<DataFrame> {
        debug!("Fetching source: {}", descriptor);
        if descriptor.ends_with(".csv") {
            self.fetch_csv(descriptor).await
        } else if descriptor.ends_with(".parquet") {
            self.fetch_parquet(descriptor).await
        } else if is_url(descriptor) {
            self.fetch_json_api(descriptor).await
        } else {
            Err(DockError::Fetch(format!(
                "Unsupported local source (expected .csv or .parquet): {}",
                descriptor
            )))
        }
    }
}

fn is_url(descriptor: &str) -> bool {
    descriptor.starts_with("http://") || descriptor.starts_with("https://")
}

/// Remote payloads are spooled to a temp file so the polars path readers can
/// do their own schema inference, same as for local files.
fn spool_to_temp(bytes: &[u8], ext: &str) -> Result<PathBuf> {
    let path = std::env::temp_dir().join(format!("datadock_{}.{}", Uuid::new_v4(), ext));
    std::fs::write(&path, bytes)?;
    Ok(path)
}

fn read_csv_path(path: &Path) -> Result<DataFrame> {
    LazyCsvReader::new(path)
        .with_has_header(true)
        .with_try_parse_dates(true)
        .with_infer_schema_length(Some(1000))
        .finish()
        .map_err(|e| DockError::Fetch(format!("Failed to read CSV {}: {}", path.display(), e)))?
        .collect()
        .map_err(|e| DockError::Fetch(format!("Failed to collect CSV {}: {}", path.display(), e)))
}

fn read_parquet_path(path: &Path) -> Result<DataFrame> {
    LazyFrame::scan_parquet(path, ScanArgsParquet::default())
        .map_err(|e| DockError::Fetch(format!("Failed to scan parquet {}: {}", path.display(), e)))?
        .collect()
        .map_err(|e| DockError::Fetch(format!("Failed to collect parquet {}: {}", path.display(), e)))
}

/// Normalize a fetched batch before load: mixed/text-like columns become
/// strings, and float NaN/inf collapse to null so the warehouse sees a single
/// null representation.
pub fn coerce_batch(df: &mut DataFrame) -> Result<()> {
    let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();

    for name in names {
        let series = df.column(&name)?;
        let dtype = series.dtype().clone();

        if matches!(dtype, DataType::Float32 | DataType::Float64) {
            let ca = series.cast(&DataType::Float64)?;
            let cleaned: Float64Chunked = ca
                .f64()?
                .into_iter()
                .map(|v| v.filter(|x| x.is_finite()))
                .collect();
            let mut cleaned = cleaned.into_series();
            cleaned.rename(&name);
            df.replace(&name, cleaned)?;
        } else if !(dtype.is_numeric()
            || dtype.is_temporal()
            || matches!(dtype, DataType::Boolean | DataType::String))
        {
            let casted = series.cast(&DataType::String)?;
            df.replace(&name, casted)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_nan_to_null() {
        let mut df = df! [
            "a" => [1.0f64, f64::NAN, 3.0],
            "b" => ["x", "y", "z"]
        ]
        .unwrap();
        coerce_batch(&mut df).unwrap();
        assert_eq!(df.column("a").unwrap().null_count(), 1);
        assert_eq!(df.column("b").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://x.com/a.csv"));
        assert!(is_url("http://x.com/a"));
        assert!(!is_url("uploads/a.csv"));
    }
}
