//! Basic numeric insights attached to every query response.

use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// How many numeric columns get per-column stats.
const MAX_PROFILED_COLUMNS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnStats {
    pub name: String,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryInsights {
    pub row_count: usize,
    pub column_count: usize,
    pub numeric_columns: Vec<ColumnStats>,
}

/// Mean/min/max for up to the first three numeric columns, plus overall
/// row/column counts.
pub fn numeric_insights(df: &DataFrame) -> Result<QueryInsights> {
    let mut numeric_columns = Vec::new();

    for name in df.get_column_names() {
        if numeric_columns.len() >= MAX_PROFILED_COLUMNS {
            break;
        }
        let series = df.column(name)?;
        if !series.dtype().is_numeric() {
            continue;
        }
        numeric_columns.push(ColumnStats {
            name: name.to_string(),
            mean: series.mean(),
            min: series.min().unwrap_or(None),
            max: series.max().unwrap_or(None),
        });
    }

    Ok(QueryInsights {
        row_count: df.height(),
        column_count: df.width(),
        numeric_columns,
    })
}
