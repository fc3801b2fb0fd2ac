//! Mapping between DuckDB declared column types / values and polars columns.

use duckdb::types::{TimeUnit as DuckTimeUnit, Value};
use polars::prelude::*;

/// Logical kind a DuckDB column is materialized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnKind {
    Int,
    Float,
    Bool,
    Date,
    Timestamp,
    Text,
}

pub(crate) fn kind_for_decl(decl: &str) -> ColumnKind {
    let up = decl.trim().to_ascii_uppercase();
    if up.starts_with("TIMESTAMP") || up == "DATETIME" { return ColumnKind::Timestamp; }
    if up == "DATE" { return ColumnKind::Date; }
    if up == "BOOLEAN" || up == "BOOL" { return ColumnKind::Bool; }
    match up.as_str() {
        "TINYINT" | "SMALLINT" | "INTEGER" | "INT" | "BIGINT"
        | "UTINYINT" | "USMALLINT" | "UINTEGER" => ColumnKind::Int,
        // Wider than i64: keep magnitude, give up exactness
        "HUGEINT" | "UHUGEINT" | "UBIGINT" => ColumnKind::Float,
        "FLOAT" | "REAL" | "DOUBLE" => ColumnKind::Float,
        _ if up.starts_with("DECIMAL") || up.starts_with("NUMERIC") => ColumnKind::Float,
        _ => ColumnKind::Text,
    }
}

pub(crate) fn dtype_for_kind(kind: ColumnKind) -> DataType {
    match kind {
        ColumnKind::Int => DataType::Int64,
        ColumnKind::Float => DataType::Float64,
        ColumnKind::Bool => DataType::Boolean,
        ColumnKind::Date => DataType::Date,
        ColumnKind::Timestamp => DataType::Datetime(TimeUnit::Microseconds, None),
        ColumnKind::Text => DataType::String,
    }
}

fn unit_to_micros(unit: DuckTimeUnit, v: i64) -> i64 {
    match unit {
        DuckTimeUnit::Second => v.saturating_mul(1_000_000),
        DuckTimeUnit::Millisecond => v.saturating_mul(1_000),
        DuckTimeUnit::Microsecond => v,
        DuckTimeUnit::Nanosecond => v / 1_000,
    }
}

fn value_i64(v: &Value) -> Option<i64> {
    match v {
        Value::TinyInt(x) => Some(*x as i64),
        Value::SmallInt(x) => Some(*x as i64),
        Value::Int(x) => Some(*x as i64),
        Value::BigInt(x) => Some(*x),
        Value::UTinyInt(x) => Some(*x as i64),
        Value::USmallInt(x) => Some(*x as i64),
        Value::UInt(x) => Some(*x as i64),
        Value::UBigInt(x) => i64::try_from(*x).ok(),
        Value::HugeInt(x) => i64::try_from(*x).ok(),
        Value::Boolean(b) => Some(*b as i64),
        _ => None,
    }
}

fn value_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Float(x) => Some(*x as f64),
        Value::Double(x) => Some(*x),
        Value::HugeInt(x) => Some(*x as f64),
        Value::UBigInt(x) => Some(*x as f64),
        Value::Decimal(d) => d.to_string().parse::<f64>().ok(),
        Value::Text(s) => s.trim().parse::<f64>().ok(),
        other => value_i64(other).map(|x| x as f64),
    }
}

fn value_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Boolean(b) => Some(*b),
        other => value_i64(other).map(|x| x != 0),
    }
}

fn value_date32(v: &Value) -> Option<i32> {
    match v {
        Value::Date32(d) => Some(*d),
        _ => None,
    }
}

fn value_timestamp_micros(v: &Value) -> Option<i64> {
    match v {
        Value::Timestamp(unit, x) => Some(unit_to_micros(*unit, *x)),
        Value::Date32(d) => Some((*d as i64) * 86_400_000_000),
        _ => None,
    }
}

fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::Text(s) | Value::Enum(s) => Some(s.clone()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Float(x) => Some(x.to_string()),
        Value::Double(x) => Some(x.to_string()),
        Value::Decimal(d) => Some(d.to_string()),
        Value::Timestamp(unit, x) => Some(
            chrono::DateTime::from_timestamp_micros(unit_to_micros(*unit, *x))
                .map(|dt| dt.naive_utc().to_string())
                .unwrap_or_else(|| x.to_string()),
        ),
        // the scan casts text-kind columns to VARCHAR, so nested values never get here
        other => value_i64(other).map(|i| i.to_string()),
    }
}

/// Build one polars column of `kind` from the values fetched for it.
pub(crate) fn build_column(name: &str, kind: ColumnKind, values: &[Value]) -> PolarsResult<Column> {
    let series = match kind {
        ColumnKind::Int => Series::new(name.into(), values.iter().map(value_i64).collect::<Vec<_>>()),
        ColumnKind::Float => Series::new(name.into(), values.iter().map(value_f64).collect::<Vec<_>>()),
        ColumnKind::Bool => Series::new(name.into(), values.iter().map(value_bool).collect::<Vec<_>>()),
        ColumnKind::Text => Series::new(name.into(), values.iter().map(value_text).collect::<Vec<_>>()),
        ColumnKind::Date => Series::new(name.into(), values.iter().map(value_date32).collect::<Vec<_>>())
            .cast(&DataType::Date)?,
        ColumnKind::Timestamp => Series::new(name.into(), values.iter().map(value_timestamp_micros).collect::<Vec<_>>())
            .cast(&dtype_for_kind(ColumnKind::Timestamp))?,
    };
    Ok(series.into_column())
}
