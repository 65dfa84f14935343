//! Conversion of an executed frame into the wire-level result set.
//!
//! Rows are ordered JSON values; temporal values are serialized as ISO-8601
//! strings so callers never see engine-internal epoch integers.

use crate::error::{DockError, Result};
use chrono::{DateTime, Duration, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
}

impl ResultSet {
    /// Convert up to `max_rows` rows of a frame, preserving column order.
    pub fn from_frame(df: &DataFrame, max_rows: usize) -> Result<Self> {
        let df = df.head(Some(max_rows));
        let columns: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();

        let mut rows = Vec::with_capacity(df.height());
        for row_idx in 0..df.height() {
            let mut row = Vec::with_capacity(columns.len());
            for name in &columns {
                let series = df.column(name)?;
                row.push(value_at(series, row_idx)?);
            }
            rows.push(row);
        }

        Ok(Self { row_count: rows.len(), columns, rows })
    }

    /// Compact CSV preview of the first `rows` rows, used as LLM summary
    /// context.
    pub fn preview_csv(&self, rows: usize) -> String {
        let header: Vec<String> = self.columns.iter().map(|c| csv_field(c)).collect();
        let mut out = header.join(",");
        for row in self.rows.iter().take(rows) {
            out.push('\n');
            let line: Vec<String> = row
                .iter()
                .map(|v| match v {
                    Value::Null => String::new(),
                    Value::String(s) => csv_field(s),
                    other => other.to_string(),
                })
                .collect();
            out.push_str(&line.join(","));
        }
        out
    }
}

/// Quote a field when it would break the row structure otherwise.
fn csv_field(s: &str) -> String {
    if s.contains([',', '\n', '\r', '"']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn value_at(series: &Series, row_idx: usize) -> Result<Value> {
    let any_val = series
        .get(row_idx)
        .map_err(|_| DockError::Warehouse("Row index out of bounds".to_string()))?;

    let value = match any_val {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::String(s) => Value::String(s.to_string()),
        AnyValue::StringOwned(s) => Value::String(s.to_string()),
        AnyValue::Int8(v) => Value::Number(v.into()),
        AnyValue::Int16(v) => Value::Number(v.into()),
        AnyValue::Int32(v) => Value::Number(v.into()),
        AnyValue::Int64(v) => Value::Number(v.into()),
        AnyValue::UInt8(v) => Value::Number(v.into()),
        AnyValue::UInt16(v) => Value::Number(v.into()),
        AnyValue::UInt32(v) => Value::Number(v.into()),
        AnyValue::UInt64(v) => Value::Number(v.into()),
        AnyValue::Float32(v) => float_value(v as f64),
        AnyValue::Float64(v) => float_value(v),
        AnyValue::Date(days) => Value::String(date_to_iso(days)),
        AnyValue::Datetime(ts, unit, _) => Value::String(datetime_to_iso(ts, unit)),
        other => Value::String(other.to_string()),
    };
    Ok(value)
}

fn float_value(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn date_to_iso(days_since_epoch: i32) -> String {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    (epoch + Duration::days(days_since_epoch as i64))
        .format("%Y-%m-%d")
        .to_string()
}

fn datetime_to_iso(ts: i64, unit: TimeUnit) -> String {
    let (secs, nanos) = match unit {
        TimeUnit::Nanoseconds => (ts.div_euclid(1_000_000_000), ts.rem_euclid(1_000_000_000)),
        TimeUnit::Microseconds => {
            let n = ts.rem_euclid(1_000_000) * 1_000;
            (ts.div_euclid(1_000_000), n)
        }
        TimeUnit::Milliseconds => {
            let n = ts.rem_euclid(1_000) * 1_000_000;
            (ts.div_euclid(1_000), n)
        }
    };
    match DateTime::from_timestamp(secs, nanos as u32) {
        Some(dt) => dt.naive_utc().format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
        None => ts.to_string(),
    }
}
