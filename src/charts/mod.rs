//! Chart archetype selection and the rendered artifact type.
//!
//! `auto` chart requests go through [`detect_chart_kind`], an ordered,
//! name-substring-driven heuristic. The precedence is deliberate and pinned
//! by tests; it is English-only and implementation-defined on ambiguous or
//! multilingual column names.

pub mod render;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Scatter,
    Histogram,
    Heatmap,
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Scatter => "scatter",
            ChartKind::Histogram => "histogram",
            ChartKind::Heatmap => "heatmap",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ChartKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bar" => Ok(ChartKind::Bar),
            "line" => Ok(ChartKind::Line),
            "scatter" => Ok(ChartKind::Scatter),
            "histogram" => Ok(ChartKind::Histogram),
            "heatmap" => Ok(ChartKind::Heatmap),
            other => Err(format!("Unknown chart type: {}", other)),
        }
    }
}

/// Rendered chart, returned inline in the query response. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartArtifact {
    pub chart_type: String,
    pub title: String,
    /// Base64-encoded SVG document.
    pub image_base64: String,
    pub engine: String,
}

const VALUE_TERMS: [&str; 3] = ["revenue", "share", "percent"];
const CATEGORY_TERMS: [&str; 3] = ["category", "product", "type"];
const COUNT_TERMS: [&str; 3] = ["count", "freq", "frequency"];
const DATE_TOKENS: [&str; 5] = ["date", "time", "year", "month", "day"];

fn contains_any(name: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| name.contains(t))
}

/// Pick a chart archetype for a result frame. First matching rule wins:
///
/// 1. revenue/share/percent names alongside category/product/type names → bar
/// 2. exactly two columns, second named like a frequency/count → bar
/// 3. any date/time/year/month/day token in a name → line
/// 4. a categorical column plus a numeric column → bar
/// 5. exactly one numeric column and no categorical → histogram
/// 6. three or more numeric columns → heatmap
/// 7. exactly two numeric columns → scatter, unless a name suggests a
///    disguised category → bar
/// 8. default → bar
pub fn detect_chart_kind(df: &DataFrame) -> ChartKind {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_lowercase())
        .collect();

    let numeric: Vec<bool> = df
        .get_columns()
        .iter()
        .map(|s| s.dtype().is_numeric())
        .collect();
    let categorical: Vec<bool> = df
        .get_columns()
        .iter()
        .map(|s| matches!(s.dtype(), DataType::String | DataType::Boolean))
        .collect();

    let numeric_count = numeric.iter().filter(|b| **b).count();
    let categorical_count = categorical.iter().filter(|b| **b).count();

    // 1. Named like a revenue/share breakdown over categories.
    if names.iter().any(|n| contains_any(n, &VALUE_TERMS))
        && names.iter().any(|n| contains_any(n, &CATEGORY_TERMS))
    {
        return ChartKind::Bar;
    }
    // 2. Two columns with a count-like second column.
    if names.len() == 2 && contains_any(&names[1], &COUNT_TERMS) {
        return ChartKind::Bar;
    }
    // 3. Anything temporal-looking plots over time.
    if names.iter().any(|n| contains_any(n, &DATE_TOKENS)) {
        return ChartKind::Line;
    }
    // 4. Category vs. value.
    if categorical_count >= 1 && numeric_count >= 1 {
        return ChartKind::Bar;
    }
    // 5. A single numeric distribution.
    if numeric_count == 1 && categorical_count == 0 {
        return ChartKind::Histogram;
    }
    // 6. Wide numeric frames get a correlation heatmap.
    if numeric_count >= 3 {
        return ChartKind::Heatmap;
    }
    // 7. Two numerics: scatter, unless a name betrays a disguised category.
    if numeric_count == 2 {
        if names.iter().any(|n| contains_any(n, &CATEGORY_TERMS)) {
            return ChartKind::Bar;
        }
        return ChartKind::Scatter;
    }
    // 8.
    ChartKind::Bar
}
