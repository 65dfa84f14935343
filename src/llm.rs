//! LLM completion client and the two prompts the query pipeline uses.
//!
//! The client speaks the OpenAI-compatible chat-completions protocol. When
//! the API key is the literal `dummy-api-key`, calls short-circuit to canned
//! responses so offline development and tests never hit the network.

use crate::config::LlmConfig;
use crate::error::{DockError, Result};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

/// Completion seam; the query engine only ever sees this trait.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        }
    }

    fn canned_response(prompt: &str) -> String {
        lazy_static! {
            // First `table.column (type)` line of the schema block.
            static ref SCHEMA_LINE: Regex =
                Regex::new(r"(?m)^([A-Za-z_][A-Za-z0-9_$]*)\.[A-Za-z0-9_$]+ \(").unwrap();
        }
        if prompt.contains("SQL:") {
            let table = SCHEMA_LINE
                .captures(prompt)
                .map(|c| c[1].to_string())
                .unwrap_or_else(|| "UNKNOWN".to_string());
            return format!(
                "SQL:\nSELECT * FROM {} LIMIT 100\nEXPLANATION:\nCanned offline response.",
                table
            );
        }
        "The result set is summarized offline; configure OPENAI_API_KEY for real summaries."
            .to_string()
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        if self.api_key == "dummy-api-key" {
            debug!("LLM in canned-response mode");
            return Ok(Self::canned_response(prompt));
        }

        let client = reqwest::Client::new();
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.1,
            "max_tokens": 1000
        });

        let response = client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| DockError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DockError::Llm(format!("LLM API error ({}): {}", status, error_text)));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DockError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        if let Some(error) = response_json.get("error") {
            return Err(DockError::Llm(format!("LLM API error: {}", error)));
        }

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| DockError::Llm("No content in LLM response".to_string()))?;

        Ok(content.to_string())
    }
}

/// System message for SQL generation.
pub const SQL_SYSTEM: &str =
    "You are a SQL assistant. Follow the requested output format exactly.";

/// Prompt asking for exactly one SELECT against the given schema, using the
/// SQL:/EXPLANATION: output convention the extractor parses.
pub fn sql_generation_prompt(schema: &str, question: &str) -> String {
    format!(
        r#"You translate business questions into SQL for a warehouse with this schema
(one "table.column (type)" entry per line):

{schema}

Rules:
- Produce exactly ONE SELECT statement. Never produce INSERT, UPDATE, DELETE,
  DDL, or multiple statements.
- Use table and column names exactly as given above.
- End the statement with LIMIT 100 unless the question asks for a different limit.

Question: "{question}"

Answer in exactly this format:
SQL:
<the single SELECT statement>
EXPLANATION:
<one or two sentences explaining the statement>"#
    )
}

/// System message for result summaries.
pub const SUMMARY_SYSTEM: &str =
    "You summarize query results for business users in plain language.";

/// Prompt asking for a short natural-language summary of an executed result.
pub fn summary_prompt(question: &str, sql: &str, preview: &str) -> String {
    format!(
        r#"A user asked: "{question}"

This SQL was executed:
{sql}

First rows of the result (CSV):
{preview}

Write 2-3 plain-language sentences summarizing what the result shows. Mention
concrete numbers where they matter. Do not restate the SQL."#
    )
}
