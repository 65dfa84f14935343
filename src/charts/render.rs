//! SVG chart rendering via plotters.
//!
//! Renders a result frame into one of the five archetypes and hands back a
//! base64 artifact. Failures here are recoverable by design: the query
//! pipeline degrades to a null chart instead of failing the response.

use super::{ChartArtifact, ChartKind};
use crate::error::{DockError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use plotters::prelude::*;
use polars::prelude::*;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 500;
/// Rendering caps the rows it looks at; charts of thousands of points are
/// unreadable anyway.
const MAX_POINTS: usize = 200;
const ENGINE: &str = "plotters";

pub fn render_chart(kind: ChartKind, df: &DataFrame, title: &str) -> Result<ChartArtifact> {
    let df = df.head(Some(MAX_POINTS));
    let mut svg = String::new();

    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        match kind {
            ChartKind::Bar => draw_bar(&root, &df, title)?,
            ChartKind::Line => draw_line(&root, &df, title)?,
            ChartKind::Scatter => draw_scatter(&root, &df, title)?,
            ChartKind::Histogram => draw_histogram(&root, &df, title)?,
            ChartKind::Heatmap => draw_heatmap(&root, &df, title)?,
        }
        root.present().map_err(chart_err)?;
    }

    Ok(ChartArtifact {
        chart_type: kind.to_string(),
        title: title.to_string(),
        image_base64: STANDARD.encode(svg.as_bytes()),
        engine: ENGINE.to_string(),
    })
}

fn chart_err(e: impl std::fmt::Display) -> DockError {
    DockError::Chart(e.to_string())
}

type Area<'a> = DrawingArea<SVGBackend<'a>, plotters::coord::Shift>;

/// Values of the first numeric column, with nulls dropped.
fn first_numeric(df: &DataFrame) -> Result<(String, Vec<f64>)> {
    for series in df.get_columns() {
        if series.dtype().is_numeric() {
            return Ok((series.name().to_string(), numeric_values(series)?));
        }
    }
    Err(DockError::Chart("No numeric column to chart".to_string()))
}

fn numeric_values(series: &Series) -> Result<Vec<f64>> {
    let ca = series.cast(&DataType::Float64)?;
    Ok(ca.f64()?.into_iter().flatten().collect())
}

/// Row labels from the first non-numeric column, falling back to row indexes.
fn row_labels(df: &DataFrame, n: usize) -> Vec<String> {
    for series in df.get_columns() {
        if !series.dtype().is_numeric() {
            return (0..n)
                .map(|i| series.get(i).map(|v| v.to_string()).unwrap_or_default())
                .map(|s| s.trim_matches('"').to_string())
                .collect();
        }
    }
    (0..n).map(|i| i.to_string()).collect()
}

/// Axis bounds with a little headroom. Bars are drawn from a zero baseline,
/// so only they anchor the range at 0; line and scatter axes follow the data.
fn value_bounds(values: &[f64], anchor_zero: bool) -> (f64, f64) {
    let mut min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    if anchor_zero {
        min = min.min(0.0);
    }
    let mut max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !min.is_finite() {
        min = 0.0;
    }
    if !max.is_finite() || max <= min {
        max = min + 1.0;
    }
    (min, max + (max - min) * 0.05)
}

fn draw_bar(root: &Area<'_>, df: &DataFrame, title: &str) -> Result<()> {
    let (_, values) = first_numeric(df)?;
    if values.is_empty() {
        return Err(DockError::Chart("Empty result set".to_string()));
    }
    let labels = row_labels(df, values.len());
    let (y_min, y_max) = value_bounds(&values, true);
    let n = values.len() as i32;

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 22))
        .margin(12)
        .x_label_area_size(48)
        .y_label_area_size(56)
        .build_cartesian_2d(0..n, y_min..y_max)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(values.len().min(20))
        .x_label_formatter(&|x: &i32| {
            labels.get(*x as usize).cloned().unwrap_or_default()
        })
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(values.iter().enumerate().map(|(i, v)| {
            Rectangle::new([(i as i32, 0.0), (i as i32 + 1, *v)], BLUE.mix(0.6).filled())
        }))
        .map_err(chart_err)?;
    Ok(())
}

fn draw_line(root: &Area<'_>, df: &DataFrame, title: &str) -> Result<()> {
    // For a time-ish frame the y series is the last numeric column; the x
    // axis is row order, which follows the query's ORDER BY.
    let numeric: Vec<&Series> = df
        .get_columns()
        .iter()
        .filter(|s| s.dtype().is_numeric())
        .collect();
    let series = *numeric
        .last()
        .ok_or_else(|| DockError::Chart("No numeric column to chart".to_string()))?;
    let values = numeric_values(series)?;
    if values.is_empty() {
        return Err(DockError::Chart("Empty result set".to_string()));
    }
    let labels = row_labels(df, values.len());
    let (y_min, y_max) = value_bounds(&values, false);
    let n = values.len() as i32;

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 22))
        .margin(12)
        .x_label_area_size(48)
        .y_label_area_size(56)
        .build_cartesian_2d(0..n.max(1), y_min..y_max)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .x_labels(values.len().min(12))
        .x_label_formatter(&|x: &i32| {
            labels.get(*x as usize).cloned().unwrap_or_default()
        })
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(LineSeries::new(
            values.iter().enumerate().map(|(i, v)| (i as i32, *v)),
            &BLUE,
        ))
        .map_err(chart_err)?;
    Ok(())
}

fn draw_scatter(root: &Area<'_>, df: &DataFrame, title: &str) -> Result<()> {
    let numeric: Vec<&Series> = df
        .get_columns()
        .iter()
        .filter(|s| s.dtype().is_numeric())
        .collect();
    if numeric.len() < 2 {
        return Err(DockError::Chart("Scatter needs two numeric columns".to_string()));
    }
    let xs = numeric_values(numeric[0])?;
    let ys = numeric_values(numeric[1])?;
    let points: Vec<(f64, f64)> = xs.into_iter().zip(ys).collect();
    if points.is_empty() {
        return Err(DockError::Chart("Empty result set".to_string()));
    }

    let (x_min, x_max) = value_bounds(&points.iter().map(|p| p.0).collect::<Vec<_>>(), false);
    let (y_min, y_max) = value_bounds(&points.iter().map(|p| p.1).collect::<Vec<_>>(), false);

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 22))
        .margin(12)
        .x_label_area_size(48)
        .y_label_area_size(56)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .x_desc(numeric[0].name())
        .y_desc(numeric[1].name())
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(
            points
                .iter()
                .map(|(x, y)| Circle::new((*x, *y), 4, BLUE.mix(0.7).filled())),
        )
        .map_err(chart_err)?;
    Ok(())
}

fn draw_histogram(root: &Area<'_>, df: &DataFrame, title: &str) -> Result<()> {
    const BINS: usize = 10;
    let (name, values) = first_numeric(df)?;
    if values.is_empty() {
        return Err(DockError::Chart("Empty result set".to_string()));
    }

    let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let width = ((hi - lo) / BINS as f64).max(f64::EPSILON);

    let mut counts = [0usize; BINS];
    for v in &values {
        let bin = (((v - lo) / width) as usize).min(BINS - 1);
        counts[bin] += 1;
    }
    let max_count = counts.iter().copied().max().unwrap_or(1).max(1);

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 22))
        .margin(12)
        .x_label_area_size(48)
        .y_label_area_size(56)
        .build_cartesian_2d(0..BINS as i32, 0f64..max_count as f64 * 1.05)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(BINS)
        .x_label_formatter(&|x: &i32| format!("{:.1}", lo + *x as f64 * width))
        .x_desc(name.as_str())
        .y_desc("count")
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(counts.iter().enumerate().map(|(i, c)| {
            Rectangle::new(
                [(i as i32, 0.0), (i as i32 + 1, *c as f64)],
                BLUE.mix(0.6).filled(),
            )
        }))
        .map_err(chart_err)?;
    Ok(())
}

fn draw_heatmap(root: &Area<'_>, df: &DataFrame, title: &str) -> Result<()> {
    let numeric: Vec<&Series> = df
        .get_columns()
        .iter()
        .filter(|s| s.dtype().is_numeric())
        .collect();
    if numeric.len() < 2 {
        return Err(DockError::Chart("Heatmap needs at least two numeric columns".to_string()));
    }

    let names: Vec<String> = numeric.iter().map(|s| s.name().to_string()).collect();
    let columns: Vec<Vec<f64>> = numeric
        .iter()
        .map(|&s| numeric_values(s))
        .collect::<Result<_>>()?;
    let n = names.len() as i32;

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 22))
        .margin(12)
        .x_label_area_size(64)
        .y_label_area_size(80)
        .build_cartesian_2d(0..n, 0..n)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(names.len())
        .y_labels(names.len())
        .x_label_formatter(&|x: &i32| names.get(*x as usize).cloned().unwrap_or_default())
        .y_label_formatter(&|y: &i32| names.get(*y as usize).cloned().unwrap_or_default())
        .draw()
        .map_err(chart_err)?;

    let mut cells = Vec::new();
    for (i, a) in columns.iter().enumerate() {
        for (j, b) in columns.iter().enumerate() {
            let corr = pearson(a, b);
            cells.push(Rectangle::new(
                [(i as i32, j as i32), (i as i32 + 1, j as i32 + 1)],
                corr_color(corr).filled(),
            ));
        }
    }
    chart.draw_series(cells).map_err(chart_err)?;
    Ok(())
}

/// Pearson correlation over the overlapping prefix of two columns; 0.0 when
/// either side is degenerate.
fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// Blue (−1) through white (0) to red (+1).
fn corr_color(c: f64) -> RGBColor {
    let c = c.clamp(-1.0, 1.0);
    if c >= 0.0 {
        let fade = (255.0 * (1.0 - c)) as u8;
        RGBColor(255, fade, fade)
    } else {
        let fade = (255.0 * (1.0 + c)) as u8;
        RGBColor(fade, fade, 255)
    }
}
