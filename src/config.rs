//!
//! Viewer configuration
//! --------------------
//! The core consumes a resolved `ViewerConfig`. Defaults are constants; the
//! binaries layer environment variables and command-line flags over them
//! (flags win over env, env wins over defaults).

use std::env;
use std::path::PathBuf;

pub const DEFAULT_STORE_PATH: &str = "Token_data.duckdb";
pub const DEFAULT_TABLE_NAME: &str = "token_status";
pub const DEFAULT_HTTP_PORT: u16 = 8501;
pub const DEFAULT_SELECTION_SIZE: usize = 5;

pub const ENV_STORE_PATH: &str = "TOKEN_VIEWER_DB";
pub const ENV_TABLE_NAME: &str = "TOKEN_VIEWER_TABLE";
pub const ENV_HTTP_PORT: &str = "TOKEN_VIEWER_HTTP_PORT";

/// Which table columns play which role in the chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRoles {
    pub entity: String,
    pub timestamp: String,
    pub metric: String,
}

impl Default for ColumnRoles {
    fn default() -> Self {
        Self { entity: "name".into(), timestamp: "timestamp".into(), metric: "grad_pert".into() }
    }
}

impl ColumnRoles {
    pub fn required(&self) -> [&str; 3] {
        [self.entity.as_str(), self.timestamp.as_str(), self.metric.as_str()]
    }
}

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub store_path: PathBuf,
    pub table_name: String,
    pub columns: ColumnRoles,
    /// Number of names pre-selected when the user has not chosen any yet.
    pub default_selection_size: usize,
    pub http_port: u16,
    pub page_title: String,
    pub chart_title: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            columns: ColumnRoles::default(),
            default_selection_size: DEFAULT_SELECTION_SIZE,
            http_port: DEFAULT_HTTP_PORT,
            page_title: "Token Data Viewer".to_string(),
            chart_title: "Graduation % over time".to_string(),
        }
    }
}

impl ViewerConfig {
    pub fn new(store_path: impl Into<PathBuf>, table_name: impl Into<String>) -> Self {
        Self { store_path: store_path.into(), table_name: table_name.into(), ..Self::default() }
    }

    /// Resolve from defaults, then environment, then the given argument list.
    pub fn from_env_and_args(args: &[String]) -> Self {
        let mut cfg = Self::default();
        if let Ok(p) = env::var(ENV_STORE_PATH) { if !p.trim().is_empty() { cfg.store_path = PathBuf::from(p); } }
        if let Ok(t) = env::var(ENV_TABLE_NAME) { if !t.trim().is_empty() { cfg.table_name = t; } }
        if let Some(port) = parse_port_env(ENV_HTTP_PORT) { cfg.http_port = port; }
        cfg.apply_args(args);
        cfg
    }

    /// Overlay recognised flags; unrecognised arguments are ignored here.
    pub fn apply_args(&mut self, args: &[String]) {
        if let Some(p) = flag_value(args, "--db") { self.store_path = PathBuf::from(p); }
        if let Some(t) = flag_value(args, "--table") { self.table_name = t; }
        if let Some(port) = flag_value(args, "--http-port").and_then(|s| s.parse::<u16>().ok()) { self.http_port = port; }
    }
}

fn parse_port_env(name: &str) -> Option<u16> {
    match env::var(name) {
        Ok(val) => val.parse::<u16>().ok(),
        Err(_) => None,
    }
}

/// Value following `flag` in `args`, if any.
pub fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> { v.iter().map(|s| s.to_string()).collect() }

    #[test]
    fn defaults_match_the_token_store() {
        let cfg = ViewerConfig::default();
        assert_eq!(cfg.store_path, PathBuf::from("Token_data.duckdb"));
        assert_eq!(cfg.table_name, "token_status");
        assert_eq!(cfg.columns.required(), ["name", "timestamp", "grad_pert"]);
        assert_eq!(cfg.default_selection_size, 5);
    }

    #[test]
    fn flags_override_defaults() {
        let mut cfg = ViewerConfig::default();
        cfg.apply_args(&args(&["--db", "/tmp/x.duckdb", "--table", "main.tokens", "--http-port", "9000"]));
        assert_eq!(cfg.store_path, PathBuf::from("/tmp/x.duckdb"));
        assert_eq!(cfg.table_name, "main.tokens");
        assert_eq!(cfg.http_port, 9000);
    }

    #[test]
    fn bad_port_flag_is_ignored() {
        let mut cfg = ViewerConfig::default();
        cfg.apply_args(&args(&["--http-port", "notaport"]));
        assert_eq!(cfg.http_port, DEFAULT_HTTP_PORT);
    }

    #[test]
    fn trailing_flag_without_value() {
        assert_eq!(flag_value(&args(&["--db"]), "--db"), None);
        assert!(has_flag(&args(&["-h"]), "-h"));
    }
}
