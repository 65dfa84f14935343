//! Query pipeline tests: seeded embedded warehouse plus a canned or stubbed
//! language model, exercising the full ask path without any network.

use async_trait::async_trait;
use datadock::config::LlmConfig;
use datadock::error::{DockError, Result};
use datadock::llm::{LanguageModel, OpenAiClient};
use datadock::query::{AskRequest, QueryEngine};
use datadock::warehouse::{EmbeddedWarehouse, Warehouse};
use polars::prelude::*;

async fn seeded_warehouse(dir: &std::path::Path) -> EmbeddedWarehouse {
    let warehouse = EmbeddedWarehouse::new(dir);
    let session = warehouse.connect().await.unwrap();
    let mut df = df! [
        "REGION" => ["north", "south", "east"],
        "TOTAL" => [100.0f64, 250.0, 175.0]
    ]
    .unwrap();
    session.write_table("SALES", &mut df).await.unwrap();
    session.close().await.unwrap();
    warehouse
}

fn canned_llm() -> OpenAiClient {
    OpenAiClient::new(&LlmConfig {
        api_key: "dummy-api-key".to_string(),
        model: "gpt-4".to_string(),
        base_url: "https://api.openai.com/v1".to_string(),
    })
}

fn ask(question: &str) -> AskRequest {
    AskRequest {
        question: question.to_string(),
        include_summary: false,
        include_chart: false,
        chart_type: None,
        chart_engine: None,
    }
}

#[tokio::test]
async fn test_ask_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let warehouse = seeded_warehouse(dir.path()).await;
    let llm = canned_llm();
    let engine = QueryEngine::new(&warehouse, &llm, 1000);

    let response = engine.ask(&ask("what are total sales by region?")).await.unwrap();

    assert!(response.sql.contains("FROM SALES"));
    assert_eq!(response.result.columns, vec!["REGION", "TOTAL"]);
    assert_eq!(response.result.row_count, 3);
    assert_eq!(response.insights.row_count, 3);
    assert_eq!(response.insights.column_count, 2);

    let total = &response.insights.numeric_columns[0];
    assert_eq!(total.name, "TOTAL");
    assert_eq!(total.mean, Some(175.0));
    assert_eq!(total.min, Some(100.0));
    assert_eq!(total.max, Some(250.0));
}

#[tokio::test]
async fn test_ask_with_summary_and_chart() {
    let dir = tempfile::tempdir().unwrap();
    let warehouse = seeded_warehouse(dir.path()).await;
    let llm = canned_llm();
    let engine = QueryEngine::new(&warehouse, &llm, 1000);

    let mut request = ask("sales by region");
    request.include_summary = true;
    request.include_chart = true;
    let response = engine.ask(&request).await.unwrap();

    assert!(response.summary.is_some());
    let chart = response.chart.expect("chart should render");
    assert_eq!(chart.engine, "plotters");
    // One categorical + one numeric column resolves to a bar chart.
    assert_eq!(chart.chart_type, "bar");
    assert!(!chart.image_base64.is_empty());
}

#[tokio::test]
async fn test_unknown_chart_engine_degrades_to_no_chart() {
    let dir = tempfile::tempdir().unwrap();
    let warehouse = seeded_warehouse(dir.path()).await;
    let llm = canned_llm();
    let engine = QueryEngine::new(&warehouse, &llm, 1000);

    let mut request = ask("sales by region");
    request.include_chart = true;
    request.chart_engine = Some("matplotlib".to_string());
    let response = engine.ask(&request).await.unwrap();

    assert!(response.chart.is_none());
}

#[tokio::test]
async fn test_empty_question_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let warehouse = seeded_warehouse(dir.path()).await;
    let llm = canned_llm();
    let engine = QueryEngine::new(&warehouse, &llm, 1000);

    let err = engine.ask(&ask("   ")).await.unwrap_err();
    assert!(matches!(err, DockError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_ask_without_tables_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let warehouse = EmbeddedWarehouse::new(dir.path());
    let llm = canned_llm();
    let engine = QueryEngine::new(&warehouse, &llm, 1000);

    let err = engine.ask(&ask("anything loaded?")).await.unwrap_err();
    assert!(matches!(err, DockError::InvalidRequest(_)));
}

/// Model that ignores the prompt and always answers with fixed text.
struct FixedModel(&'static str);

#[async_trait]
impl LanguageModel for FixedModel {
    async fn complete(&self, _system: &str, _prompt: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}

#[tokio::test]
async fn test_mutating_sql_from_model_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let warehouse = seeded_warehouse(dir.path()).await;
    let llm = FixedModel("SQL:\nDROP TABLE SALES\nEXPLANATION:\nnope");
    let engine = QueryEngine::new(&warehouse, &llm, 1000);

    let err = engine.ask(&ask("drop everything")).await.unwrap_err();
    assert!(matches!(err, DockError::InvalidRequest(_)));

    // The table is untouched.
    let session = warehouse.connect().await.unwrap();
    assert_eq!(session.row_count("SALES").await.unwrap(), 3);
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_result_rows_are_capped() {
    let dir = tempfile::tempdir().unwrap();
    let warehouse = seeded_warehouse(dir.path()).await;
    let llm = canned_llm();
    let engine = QueryEngine::new(&warehouse, &llm, 2);

    let response = engine.ask(&ask("sales by region")).await.unwrap();
    assert_eq!(response.result.row_count, 2);
    assert_eq!(response.result.rows.len(), 2);
}
