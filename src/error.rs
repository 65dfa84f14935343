use thiserror::Error;

#[derive(Error, Debug)]
pub enum DockError {
    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Warehouse error: {0}")]
    Warehouse(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Chart error: {0}")]
    Chart(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}

pub type Result<T> = std::result::Result<T, DockError>;
