//! Identifier qualification and quoting utilities
//! ----------------------------------------------
//! Single source of truth for turning a configured table name (`table` or
//! `schema.table`, optionally double-quoted) into the pieces used for catalog
//! lookups and the quoted form interpolated into the scan query.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{AppError, AppResult};

pub const DEFAULT_SCHEMA: &str = "main";

fn bare_ident_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("static identifier regex"))
}

/// Normalize an identifier according to SQL rules:
/// - If enclosed in double-quotes, strip quotes and preserve case
/// - Otherwise, keep as written
/// The catalog lookup ignores case either way, preferring an exact spelling.
pub fn normalize_identifier(ident: &str) -> String {
    let trimmed = ident.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].replace("\"\"", "\"")
    } else {
        trimmed.to_string()
    }
}

/// Wrap in double quotes, doubling any embedded quote.
pub fn quote_identifier(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableIdent {
    pub schema: Option<String>,
    pub table: String,
}

impl TableIdent {
    /// An identifier naming exactly `schema.table`, as spelled in the catalog.
    pub fn exact(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self { schema: Some(schema.into()), table: table.into() }
    }

    /// `"schema"."table"` or `"table"`.
    pub fn quoted(&self) -> String {
        match &self.schema {
            Some(s) => format!("{}.{}", quote_identifier(s), quote_identifier(&self.table)),
            None => quote_identifier(&self.table),
        }
    }

    pub fn schema_or_default(&self) -> &str {
        self.schema.as_deref().unwrap_or(DEFAULT_SCHEMA)
    }
}

impl std::fmt::Display for TableIdent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.schema {
            Some(s) => write!(f, "{}.{}", s, self.table),
            None => write!(f, "{}", self.table),
        }
    }
}

/// Split on dots that are outside double quotes.
fn split_dotted(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    for ch in s.chars() {
        match ch {
            '"' => { in_quotes = !in_quotes; cur.push(ch); }
            '.' if !in_quotes => { parts.push(std::mem::take(&mut cur)); }
            _ => cur.push(ch),
        }
    }
    parts.push(cur);
    parts
}

fn check_part(raw: &str, whole: &str) -> AppResult<String> {
    let t = raw.trim();
    let quoted = t.len() >= 2 && t.starts_with('"') && t.ends_with('"');
    let norm = normalize_identifier(t);
    if norm.is_empty() || (!quoted && !bare_ident_re().is_match(&norm)) {
        return Err(AppError::data_source("invalid_table_name", format!("'{}' is not a valid table identifier", whole)));
    }
    Ok(norm)
}

/// Parse a configured table name into its optional schema and table parts.
pub fn parse_table_ident(name: &str) -> AppResult<TableIdent> {
    let parts = split_dotted(name.trim());
    match parts.as_slice() {
        [t] => Ok(TableIdent { schema: None, table: check_part(t, name)? }),
        [s, t] => Ok(TableIdent { schema: Some(check_part(s, name)?), table: check_part(t, name)? }),
        _ => Err(AppError::data_source("invalid_table_name", format!("'{}' is not a valid table identifier", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_and_qualified_names() {
        let t = parse_table_ident("token_status").unwrap();
        assert_eq!(t, TableIdent { schema: None, table: "token_status".into() });
        assert_eq!(t.quoted(), "\"token_status\"");
        assert_eq!(t.schema_or_default(), "main");

        let q = parse_table_ident("main.token_status").unwrap();
        assert_eq!(q.schema.as_deref(), Some("main"));
        assert_eq!(q.quoted(), "\"main\".\"token_status\"");
    }

    #[test]
    fn quoted_parts_keep_case_and_dots() {
        let t = parse_table_ident("\"My.Table\"").unwrap();
        assert_eq!(t.table, "My.Table");
        assert_eq!(t.quoted(), "\"My.Table\"");
    }

    #[test]
    fn injection_attempts_are_rejected() {
        assert!(parse_table_ident("t; DROP TABLE x").unwrap_err().is_data_source());
        assert!(parse_table_ident("a.b.c").is_err());
        assert!(parse_table_ident("").is_err());
    }

    #[test]
    fn mixed_case_unquoted_part_is_kept_as_written() {
        let t = parse_table_ident("Main.Token_Status").unwrap();
        assert_eq!(t.schema.as_deref(), Some("Main"));
        assert_eq!(t.table, "Token_Status");
        assert_eq!(TableIdent::exact("main", "token_status").quoted(), "\"main\".\"token_status\"");
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }
}
