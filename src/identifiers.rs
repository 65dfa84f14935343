//! Warehouse identifier derivation.
//!
//! European CSV exports, JSON APIs and hand-edited spreadsheets produce column
//! labels the warehouse will not accept. Everything funnels through
//! [`sanitize_column`] before load; table names come from the source URL via
//! [`derive_table_name`].

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref INVALID_CHARS: Regex = Regex::new(r"[^A-Za-z0-9_$]").unwrap();
    static ref LEADING_OK: Regex = Regex::new(r"^[A-Za-z_]").unwrap();
    static ref VALID_IDENT: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").unwrap();
}

/// Rewrite an arbitrary column label into a warehouse-safe identifier.
///
/// Total over any input: trims whitespace and surrounding quotes, replaces
/// every character outside `[A-Za-z0-9_$]` with `_`, prefixes `COL_` when the
/// result does not start with a letter or underscore, falls back to
/// `UNNAMED_COL` when empty, and upper-cases.
pub fn sanitize_column(label: &str) -> String {
    let trimmed = label.trim().trim_matches('"').trim_matches('\'');
    let mut out = INVALID_CHARS.replace_all(trimmed, "_").into_owned();
    if !out.is_empty() && !LEADING_OK.is_match(&out) {
        out = format!("COL_{}", out);
    }
    if out.is_empty() {
        out = "UNNAMED_COL".to_string();
    }
    out.to_uppercase()
}

/// Resolve duplicate column names deterministically, preserving order.
///
/// The first occurrence keeps its name; later occurrences get `_1`, `_2`, …
/// suffixes in first-seen order. Generated names count as taken too, so a
/// suffix never collides with a literal column appearing later.
pub fn dedupe_columns(columns: Vec<String>) -> Vec<String> {
    let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut taken: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(columns.len());
    for col in columns {
        let name = if taken.contains(&col) {
            let count = counts.entry(col.clone()).or_insert(0);
            loop {
                *count += 1;
                let candidate = format!("{}_{}", col, count);
                if !taken.contains(&candidate) {
                    break candidate;
                }
            }
        } else {
            col
        };
        taken.insert(name.clone());
        out.push(name);
    }
    out
}

/// Derive a destination table name from a source descriptor.
///
/// Takes the basename of the URL or path, strips `.csv`/`.parquet`, replaces
/// `-` with `_`, and upper-cases. Falls back to the last non-empty path
/// segment, then to `SOURCE_<index>` (1-based). The result always satisfies
/// the warehouse identifier grammar; the table is overwritten on every load,
/// so repeated ingestion of the same descriptor is idempotent.
pub fn derive_table_name(descriptor: &str, index: usize) -> String {
    let path = url_path(descriptor);
    let basename = path.rsplit('/').next().unwrap_or("");

    let mut name = strip_table_extension(basename).replace('-', "_").to_uppercase();

    if name.is_empty() {
        name = path
            .split('/')
            .rev()
            .find(|seg| !seg.is_empty())
            .map(|seg| strip_table_extension(seg).replace('-', "_").to_uppercase())
            .unwrap_or_default();
    }
    if name.is_empty() {
        name = format!("SOURCE_{}", index);
    }
    if !VALID_IDENT.is_match(&name) {
        name = sanitize_column(&name);
    }
    name
}

/// Path component of a URL, or the input unchanged for plain file paths.
fn url_path(descriptor: &str) -> &str {
    let without_scheme = match descriptor.find("://") {
        Some(idx) => {
            let rest = &descriptor[idx + 3..];
            match rest.find('/') {
                Some(slash) => &rest[slash..],
                None => "",
            }
        }
        None => descriptor,
    };
    // Drop query string and fragment.
    let end = without_scheme
        .find(['?', '#'])
        .unwrap_or(without_scheme.len());
    &without_scheme[..end]
}

fn strip_table_extension(name: &str) -> &str {
    name.strip_suffix(".csv")
        .or_else(|| name.strip_suffix(".parquet"))
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_basic() {
        assert_eq!(sanitize_column("1abc"), "COL_1ABC");
        assert_eq!(sanitize_column(""), "UNNAMED_COL");
        assert_eq!(sanitize_column("   "), "UNNAMED_COL");
        assert_eq!(sanitize_column("\"Revenue (USD)\""), "REVENUE__USD_");
        assert_eq!(sanitize_column("order id"), "ORDER_ID");
        assert_eq!(sanitize_column("total$"), "TOTAL$");
    }

    #[test]
    fn test_sanitize_always_valid() {
        let inputs = ["1abc", "", "  ", "é-col", "9", "_x", "a b c", "%%", "'quoted'"];
        let valid = Regex::new(r"^[A-Z_][A-Z0-9_$]*$").unwrap();
        for input in inputs {
            let out = sanitize_column(input);
            assert!(valid.is_match(&out), "{:?} -> {:?}", input, out);
        }
    }

    #[test]
    fn test_dedupe_preserves_order() {
        let cols = vec!["A".to_string(), "A".to_string(), "A".to_string()];
        assert_eq!(dedupe_columns(cols), vec!["A", "A_1", "A_2"]);

        let cols = vec!["A".to_string(), "B".to_string(), "A".to_string()];
        assert_eq!(dedupe_columns(cols), vec!["A", "B", "A_1"]);
    }

    #[test]
    fn test_dedupe_skips_taken_suffixes() {
        // A generated suffix must not shadow a literal column seen later.
        let cols = vec!["A".to_string(), "A".to_string(), "A_1".to_string()];
        assert_eq!(dedupe_columns(cols), vec!["A", "A_1", "A_1_1"]);

        let cols = vec!["A_1".to_string(), "A".to_string(), "A".to_string()];
        assert_eq!(dedupe_columns(cols), vec!["A_1", "A", "A_2"]);
    }

    #[test]
    fn test_table_name_from_url() {
        assert_eq!(
            derive_table_name("https://x.com/data/sales-2024.csv", 1),
            "SALES_2024"
        );
        assert_eq!(
            derive_table_name("https://api.example.com/api/stores", 2),
            "STORES"
        );
        assert_eq!(
            derive_table_name("https://x.com/d/prices.parquet?sig=abc", 1),
            "PRICES"
        );
    }

    #[test]
    fn test_table_name_from_path() {
        assert_eq!(derive_table_name("uploads/finance entries.csv", 1), "FINANCE_ENTRIES");
        assert_eq!(derive_table_name("/tmp/orders.parquet", 3), "ORDERS");
    }

    #[test]
    fn test_table_name_fallbacks() {
        assert_eq!(derive_table_name("https://x.com", 4), "SOURCE_4");
        assert_eq!(derive_table_name("https://x.com/data/", 2), "DATA");
        assert_eq!(derive_table_name("", 7), "SOURCE_7");
    }
}
