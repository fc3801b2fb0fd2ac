//!
//! token_viewer storage module
//! ---------------------------
//! Table Loader for the embedded DuckDB store. A load opens a read-only
//! connection, discovers the column schema from `information_schema`, scans
//! the whole table into a polars `DataFrame` and drops the connection before
//! returning, on success and failure alike. Nothing is held open between loads,
//! so other readers and writers of the same file are never blocked by us.
//!
//! Column types are mapped once from the declared DuckDB types (see `schema`),
//! so an all-null column still materializes with the right dtype.

use std::path::Path;
use std::time::Instant;

use duckdb::types::Value;
use duckdb::{AccessMode, Config, Connection};
use polars::prelude::*;
use tracing::{debug, info};

use crate::cache::TableKey;
use crate::error::{AppError, AppResult};
use crate::ident::{parse_table_ident, quote_identifier, TableIdent};

pub(crate) mod schema;

use schema::{build_column, kind_for_decl, ColumnKind};

/// Source of full-table reads, keyed by store location and table name.
pub trait TableLoader: Send + Sync {
    fn load(&self, key: &TableKey) -> AppResult<DataFrame>;
}

/// Loads tables from DuckDB database files.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuckDbLoader;

impl TableLoader for DuckDbLoader {
    fn load(&self, key: &TableKey) -> AppResult<DataFrame> {
        load_table(&key.store, &key.table)
    }
}

/// Open `path` read-only. A missing file is reported without touching DuckDB,
/// which would otherwise try to create it.
fn open_read_only(path: &Path) -> AppResult<Connection> {
    if !path.is_file() {
        return Err(AppError::data_source(
            "store_not_found",
            format!("store file '{}' does not exist", path.display()),
        ));
    }
    let config = Config::default()
        .access_mode(AccessMode::ReadOnly)
        .map_err(|e| AppError::data_source("store_open_failed", e.to_string()))?;
    Connection::open_with_flags(path, config).map_err(|e| {
        AppError::data_source("store_open_failed", format!("cannot open store '{}': {}", path.display(), e))
    })
}

/// Catalog spelling of `ident`, if the table exists. Names match the way
/// DuckDB resolves them, ignoring case; an exact spelling wins over other
/// case variants.
fn resolve_table(conn: &Connection, ident: &TableIdent) -> AppResult<Option<TableIdent>> {
    let mut stmt = conn.prepare(
        "SELECT table_schema, table_name FROM information_schema.tables \
         WHERE lower(table_schema) = lower(?) AND lower(table_name) = lower(?) \
         ORDER BY table_schema, table_name",
    )?;
    let rows = stmt.query_map(duckdb::params![ident.schema_or_default(), ident.table.as_str()], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut found: Vec<(String, String)> = Vec::new();
    for r in rows { found.push(r?); }
    let pick = found
        .iter()
        .find(|(s, t)| s == ident.schema_or_default() && t == &ident.table)
        .or_else(|| found.first());
    Ok(pick.map(|(s, t)| TableIdent::exact(s.as_str(), t.as_str())))
}

/// Declared (column name, DuckDB type) pairs in ordinal order.
fn table_columns(conn: &Connection, ident: &TableIdent) -> AppResult<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT column_name, data_type FROM information_schema.columns \
         WHERE table_schema = ? AND table_name = ? ORDER BY ordinal_position",
    )?;
    let rows = stmt.query_map(duckdb::params![ident.schema_or_default(), ident.table.as_str()], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut cols = Vec::new();
    for r in rows { cols.push(r?); }
    Ok(cols)
}

fn scan(conn: &Connection, ident: &TableIdent, decls: &[(String, String)]) -> AppResult<DataFrame> {
    let kinds: Vec<ColumnKind> = decls.iter().map(|(_, t)| kind_for_decl(t)).collect();
    // Text-kind columns (VARCHAR, but also LIST, STRUCT, TIME, INTERVAL, ...)
    // come back in DuckDB's own text form.
    let select: Vec<String> = decls
        .iter()
        .zip(&kinds)
        .map(|((name, _), kind)| {
            let q = quote_identifier(name);
            if *kind == ColumnKind::Text { format!("CAST({q} AS VARCHAR) AS {q}") } else { q }
        })
        .collect();
    let sql = format!("SELECT {} FROM {}", select.join(", "), ident.quoted());
    debug!(target: "token_viewer::storage", "scan: sql='{}' kinds={:?}", sql, kinds);

    let mut values: Vec<Vec<Value>> = vec![Vec::new(); decls.len()];
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        for (i, col) in values.iter_mut().enumerate() {
            col.push(row.get::<_, Value>(i)?);
        }
    }

    let mut columns: Vec<Column> = Vec::with_capacity(decls.len());
    for (((name, _), kind), vals) in decls.iter().zip(kinds).zip(values.iter()) {
        columns.push(build_column(name, kind, vals)?);
    }
    Ok(DataFrame::new(columns)?)
}

/// Read the full contents of `table` from the DuckDB file at `path`.
///
/// The connection lives only inside this function; it is dropped before the
/// result (or error) is returned.
pub fn load_table(path: &Path, table: &str) -> AppResult<DataFrame> {
    let started = Instant::now();
    let ident = parse_table_ident(table)?;
    let conn = open_read_only(path)?;
    let Some(resolved) = resolve_table(&conn, &ident)? else {
        return Err(AppError::data_source(
            "table_not_found",
            format!("table '{}' does not exist in store '{}'", ident, path.display()),
        ));
    };
    let decls = table_columns(&conn, &resolved)?;
    let df = scan(&conn, &resolved, &decls)?;
    drop(conn);
    info!(
        target: "token_viewer::storage",
        "load_table: store='{}' table='{}' rows={} cols={} elapsed_ms={}",
        path.display(), resolved, df.height(), df.width(), started.elapsed().as_millis()
    );
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE token_status (name VARCHAR, timestamp TIMESTAMP, grad_pert DOUBLE, holders INTEGER);
             INSERT INTO token_status VALUES
               ('A', TIMESTAMP '2024-01-01 00:00:00', 10.0, 3),
               ('B', TIMESTAMP '2024-01-01 00:00:00', 20.0, NULL),
               (NULL, TIMESTAMP '2024-01-02 00:00:00', NULL, 1);",
        )
        .unwrap();
    }

    #[test]
    fn loads_all_rows_with_mapped_types() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tokens.duckdb");
        seed(&path);
        let df = load_table(&path, "token_status").unwrap();
        assert_eq!(df.height(), 3);
        let names: Vec<&str> = df.get_column_names().iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["name", "timestamp", "grad_pert", "holders"]);
        assert_eq!(df.column("timestamp").unwrap().dtype(), &DataType::Datetime(TimeUnit::Microseconds, None));
        assert_eq!(df.column("grad_pert").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("holders").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("name").unwrap().null_count(), 1);
    }

    #[test]
    fn missing_file_is_a_data_source_error_and_not_created() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("absent.duckdb");
        let err = load_table(&path, "token_status").unwrap_err();
        assert!(err.is_data_source());
        assert_eq!(err.code_str(), "store_not_found");
        assert!(!path.exists());
    }

    #[test]
    fn missing_table_is_a_data_source_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tokens.duckdb");
        seed(&path);
        let err = load_table(&path, "nope").unwrap_err();
        assert_eq!(err.code_str(), "table_not_found");
    }

    #[test]
    fn connection_is_released_after_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tokens.duckdb");
        seed(&path);
        load_table(&path, "token_status").unwrap();
        // A writer can open the file again once the load returned
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("INSERT INTO token_status VALUES ('C', TIMESTAMP '2024-01-03 00:00:00', 5.0, 2);").unwrap();
        drop(conn);
        assert_eq!(load_table(&path, "token_status").unwrap().height(), 4);
    }

    #[test]
    fn schema_qualified_table_name() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tokens.duckdb");
        seed(&path);
        assert_eq!(load_table(&path, "main.token_status").unwrap().height(), 3);
    }

    #[test]
    fn unquoted_names_resolve_case_insensitively() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tokens.duckdb");
        seed(&path);
        assert_eq!(load_table(&path, "Token_Status").unwrap().height(), 3);
        assert_eq!(load_table(&path, "MAIN.TOKEN_STATUS").unwrap().height(), 3);
        assert_eq!(load_table(&path, "\"Token_Status\"").unwrap().height(), 3);
        assert_eq!(load_table(&path, "token_statu").unwrap_err().code_str(), "table_not_found");
    }

    #[test]
    fn nested_and_time_values_use_duckdb_text() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tokens.duckdb");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE extras (tags INTEGER[], \"at\" TIME, meta STRUCT(k VARCHAR));
             INSERT INTO extras VALUES ([1, 2], TIME '12:30:00', {'k': 'v'});",
        )
        .unwrap();
        drop(conn);
        let df = load_table(&path, "extras").unwrap();
        let cell = |c: &str| df.column(c).unwrap().str().unwrap().get(0).unwrap().to_string();
        assert_eq!(cell("tags"), "[1, 2]");
        assert_eq!(cell("at"), "12:30:00");
        assert!(cell("meta").contains('v'));
        assert!(!cell("tags").contains("Int("));
    }
}
