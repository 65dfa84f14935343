//! Query pipeline: question → SQL → execute → summarize/chart.

use crate::charts::{detect_chart_kind, render::render_chart, ChartArtifact, ChartKind};
use crate::error::{DockError, Result};
use crate::insights::{numeric_insights, QueryInsights};
use crate::llm::{
    sql_generation_prompt, summary_prompt, LanguageModel, SQL_SYSTEM, SUMMARY_SYSTEM,
};
use crate::result_set::ResultSet;
use crate::sql_extract::{ensure_read_only, extract_sql};
use crate::warehouse::{snapshot_text, Warehouse};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

/// Rows fed to the summary prompt.
const SUMMARY_PREVIEW_ROWS: usize = 20;
const CHART_ENGINE: &str = "plotters";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub include_summary: bool,
    #[serde(default)]
    pub include_chart: bool,
    /// `auto` (default) routes through the chart-type heuristic.
    #[serde(default)]
    pub chart_type: Option<String>,
    #[serde(default)]
    pub chart_engine: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub sql: String,
    pub explanation: Option<String>,
    #[serde(flatten)]
    pub result: ResultSet,
    pub elapsed_ms: u64,
    pub summary: Option<String>,
    pub chart: Option<ChartArtifact>,
    pub insights: QueryInsights,
}

pub struct QueryEngine<'a> {
    warehouse: &'a dyn Warehouse,
    llm: &'a dyn LanguageModel,
    max_result_rows: usize,
}

impl<'a> QueryEngine<'a> {
    pub fn new(
        warehouse: &'a dyn Warehouse,
        llm: &'a dyn LanguageModel,
        max_result_rows: usize,
    ) -> Self {
        Self { warehouse, llm, max_result_rows }
    }

    pub async fn ask(&self, request: &AskRequest) -> Result<AskResponse> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(DockError::InvalidRequest("Question must not be empty".to_string()));
        }

        let start = Instant::now();
        let session = self.warehouse.connect().await?;

        // The session is released on every path below; errors are captured
        // and re-raised after close.
        let outcome = self.ask_inner(session.as_ref(), question, request, start).await;
        if let Err(e) = session.close().await {
            warn!("Failed to release warehouse session: {}", e);
        }
        outcome
    }

    async fn ask_inner(
        &self,
        session: &dyn crate::warehouse::WarehouseSession,
        question: &str,
        request: &AskRequest,
        start: Instant,
    ) -> Result<AskResponse> {
        let snapshot = session.schema_snapshot().await?;
        if snapshot.is_empty() {
            return Err(DockError::InvalidRequest(
                "No tables available; load data before querying".to_string(),
            ));
        }
        let schema = snapshot_text(&snapshot);

        let response = self
            .llm
            .complete(SQL_SYSTEM, &sql_generation_prompt(&schema, question))
            .await?;
        let extracted = extract_sql(&response)?;
        ensure_read_only(&extracted.sql)?;
        info!("Generated SQL: {}", extracted.sql);

        let df = session.select(&extracted.sql, self.max_result_rows).await?;
        let result = ResultSet::from_frame(&df, self.max_result_rows)?;
        let insights = numeric_insights(&df)?;

        let summary = if request.include_summary {
            let preview = result.preview_csv(SUMMARY_PREVIEW_ROWS);
            match self
                .llm
                .complete(SUMMARY_SYSTEM, &summary_prompt(question, &extracted.sql, &preview))
                .await
            {
                Ok(text) => Some(text),
                Err(e) => {
                    // A summary is best-effort decoration on a complete result.
                    warn!("Summary generation failed: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let chart = if request.include_chart {
            self.build_chart(&df, question, request)
        } else {
            None
        };

        Ok(AskResponse {
            sql: extracted.sql,
            explanation: extracted.explanation,
            result,
            elapsed_ms: start.elapsed().as_millis() as u64,
            summary,
            chart,
            insights,
        })
    }

    /// Chart generation degrades to `None` on any failure, including an
    /// unknown requested type or engine.
    fn build_chart(
        &self,
        df: &polars::prelude::DataFrame,
        question: &str,
        request: &AskRequest,
    ) -> Option<ChartArtifact> {
        if let Some(engine) = request.chart_engine.as_deref() {
            if engine != "auto" && engine != CHART_ENGINE {
                warn!("Unknown chart engine {:?}, skipping chart", engine);
                return None;
            }
        }

        let kind = match request.chart_type.as_deref() {
            None | Some("auto") => detect_chart_kind(df),
            Some(explicit) => match explicit.parse::<ChartKind>() {
                Ok(kind) => kind,
                Err(e) => {
                    warn!("{}, skipping chart", e);
                    return None;
                }
            },
        };

        match render_chart(kind, df, question) {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                warn!("Chart rendering failed: {}", e);
                None
            }
        }
    }
}
