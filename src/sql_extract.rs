//! Parsing the model's free-text answer into a statement + explanation, and
//! the read-only gate applied before execution.
//!
//! Extraction follows the SQL:/EXPLANATION: marker convention; Markdown code
//! fences are stripped first. The gate parses the statement with `sqlparser`
//! and requires exactly one query; when the statement does not parse at all,
//! a prefix check plus a statement-separator check is applied instead, so an
//! unusual-but-valid SELECT dialect still gets through.

use crate::error::{DockError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"(?m)^\s*```[A-Za-z]*\s*$").unwrap();
    static ref SQL_MARKER: Regex = Regex::new(r"(?i)\bsql\s*:").unwrap();
    static ref EXPLANATION_MARKER: Regex = Regex::new(r"(?i)\bexplanation\s*:").unwrap();
}

/// Statement and optional explanation pulled out of a model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSql {
    pub sql: String,
    pub explanation: Option<String>,
}

/// Extract the `SQL:` section (up to an optional `EXPLANATION:` marker) and
/// the explanation remainder. A response with no `SQL:` marker is a
/// client-input error: the model did not follow the contract, and there is
/// nothing safe to execute.
pub fn extract_sql(response: &str) -> Result<ExtractedSql> {
    let cleaned = CODE_FENCE.replace_all(response, "");

    let sql_match = SQL_MARKER.find(&cleaned).ok_or_else(|| {
        DockError::InvalidRequest("Model response contained no SQL: section".to_string())
    })?;
    let after_sql = &cleaned[sql_match.end()..];

    let (sql_part, explanation_part) = match EXPLANATION_MARKER.find(after_sql) {
        Some(m) => (
            &after_sql[..m.start()],
            Some(after_sql[m.end()..].trim().to_string()),
        ),
        None => (after_sql, None),
    };

    let sql = sql_part.trim().to_string();
    if sql.is_empty() {
        return Err(DockError::InvalidRequest(
            "Model response contained an empty SQL: section".to_string(),
        ));
    }

    Ok(ExtractedSql {
        sql,
        explanation: explanation_part.filter(|e| !e.is_empty()),
    })
}

/// Reject anything that is not a single read-only query.
///
/// Primary path: parse and require exactly one `Statement::Query`. Fallback
/// for dialects the parser chokes on: a case-insensitive `select` prefix
/// check plus rejection of embedded statement separators.
pub fn ensure_read_only(sql: &str) -> Result<()> {
    let trimmed = sql.trim().trim_end_matches(';').trim();
    if trimmed.is_empty() {
        return Err(DockError::InvalidRequest("Empty SQL statement".to_string()));
    }

    match Parser::parse_sql(&GenericDialect {}, trimmed) {
        Ok(statements) => {
            if statements.len() != 1 {
                return Err(DockError::InvalidRequest(format!(
                    "Expected a single statement, got {}",
                    statements.len()
                )));
            }
            match &statements[0] {
                Statement::Query(_) => Ok(()),
                other => Err(DockError::InvalidRequest(format!(
                    "Only SELECT statements are allowed, got: {}",
                    statement_kind(other)
                ))),
            }
        }
        Err(_) => {
            if !trimmed.to_lowercase().starts_with("select") {
                return Err(DockError::InvalidRequest(
                    "Generated statement is not a SELECT".to_string(),
                ));
            }
            if trimmed.contains(';') {
                return Err(DockError::InvalidRequest(
                    "Generated statement contains multiple statements".to_string(),
                ));
            }
            Ok(())
        }
    }
}

fn statement_kind(statement: &Statement) -> &'static str {
    match statement {
        Statement::Insert { .. } => "INSERT",
        Statement::Update { .. } => "UPDATE",
        Statement::Delete { .. } => "DELETE",
        Statement::Drop { .. } => "DROP",
        Statement::Truncate { .. } => "TRUNCATE",
        Statement::CreateTable { .. } => "CREATE TABLE",
        Statement::AlterTable { .. } => "ALTER TABLE",
        _ => "non-SELECT statement",
    }
}
