//! datadock: tabular-data ingestion and natural-language query service.
//!
//! Two pipelines share one embedded warehouse: the loader fetches CSV,
//! parquet, and JSON-API sources, sanitizes their identifiers, and bulk-loads
//! them as tables; the query engine turns a natural-language question into a
//! single read-only SELECT via an LLM, executes it, and decorates the result
//! with insights, an optional summary, and an optional chart.

pub mod api;
pub mod charts;
pub mod config;
pub mod error;
pub mod events;
pub mod fetch;
pub mod identifiers;
pub mod insights;
pub mod llm;
pub mod loader;
pub mod query;
pub mod result_set;
pub mod sql_extract;
pub mod warehouse;
