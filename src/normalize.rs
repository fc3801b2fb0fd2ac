//! Schema normalizer: make sure the role columns exist and have the types the
//! chart builder relies on. The timestamp column ends up as a polars
//! `Datetime`, the metric as `Float64` and the entity name as `String`.
//! Every step returns a new frame and is a no-op when the column already has
//! the target type, so normalizing twice equals normalizing once.

use polars::prelude::*;
use tracing::debug;

use crate::config::ColumnRoles;
use crate::error::{AppError, AppResult};

const TS_TARGET: DataType = DataType::Datetime(TimeUnit::Microseconds, None);

pub fn is_datetime(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Datetime(_, _))
}

/// Parse common ISO-8601 / RFC3339 shapes into epoch microseconds.
/// Naive inputs are taken as UTC; a bare date means midnight.
pub fn parse_timestamp_micros(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_micros());
    }
    if let Ok(dt) = chrono::DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.timestamp_micros());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ndt.and_utc().timestamp_micros());
        }
    }
    if let Ok(nd) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return nd.and_hms_opt(0, 0, 0).map(|ndt| ndt.and_utc().timestamp_micros());
    }
    None
}

/// Fail with `missing_column` if any role column is absent.
pub fn require_columns(df: &DataFrame, roles: &ColumnRoles) -> AppResult<()> {
    let present: Vec<&str> = df.get_column_names().iter().map(|s| s.as_str()).collect();
    let missing: Vec<&str> = roles.required().into_iter().filter(|c| !present.contains(c)).collect();
    if !missing.is_empty() {
        return Err(AppError::schema(
            "missing_column",
            format!("table is missing required column(s): {}", missing.join(", ")),
        ));
    }
    Ok(())
}

fn replace(df: &DataFrame, series: Series) -> AppResult<DataFrame> {
    let mut out = df.clone();
    out.with_column(series)?;
    Ok(out)
}

/// Guarantee `column` is a datetime column, converting strings, dates and
/// epoch-nanosecond integers. Offsets are applied and the result is naive UTC.
pub fn ensure_datetime(df: &DataFrame, column: &str) -> AppResult<DataFrame> {
    let col = df.column(column)?;
    let dtype = col.dtype().clone();
    if is_datetime(&dtype) {
        return Ok(df.clone());
    }
    debug!(target: "token_viewer::normalize", "ensure_datetime: column='{}' from dtype={:?}", column, dtype);
    let name = col.name().clone();
    let series = match dtype {
        DataType::Date | DataType::Null => col.as_materialized_series().cast(&TS_TARGET)?,
        DataType::String => {
            let ca = col.str()?;
            let mut out: Vec<Option<i64>> = Vec::with_capacity(ca.len());
            for (idx, v) in ca.into_iter().enumerate() {
                match v {
                    None => out.push(None),
                    Some(s) => match parse_timestamp_micros(s) {
                        Some(us) => out.push(Some(us)),
                        None => {
                            return Err(AppError::schema(
                                "unparseable_timestamp",
                                format!("column '{}' row {}: '{}' is not a date-time", column, idx, s),
                            ))
                        }
                    },
                }
            }
            Series::new(name, out).cast(&TS_TARGET)?
        }
        dt if dt.is_integer() => {
            let ns = col.cast(&DataType::Int64)?;
            let us: Vec<Option<i64>> = ns.i64()?.into_iter().map(|v| v.map(|x| x.div_euclid(1_000))).collect();
            Series::new(name, us).cast(&TS_TARGET)?
        }
        other => {
            return Err(AppError::schema(
                "unsupported_timestamp_type",
                format!("column '{}' has type {} which cannot be read as a date-time", column, other),
            ))
        }
    };
    replace(df, series)
}

/// Guarantee `column` is Float64. Numeric strings are parsed; anything else fails.
pub fn ensure_metric(df: &DataFrame, column: &str) -> AppResult<DataFrame> {
    let col = df.column(column)?;
    let dtype = col.dtype().clone();
    if dtype == DataType::Float64 {
        return Ok(df.clone());
    }
    let series = match dtype {
        dt if dt.is_integer() || dt.is_float() || dt == DataType::Null => {
            col.as_materialized_series().cast(&DataType::Float64)?
        }
        DataType::String => {
            let ca = col.str()?;
            let mut out: Vec<Option<f64>> = Vec::with_capacity(ca.len());
            for (idx, v) in ca.into_iter().enumerate() {
                match v.map(|s| s.trim().parse::<f64>()) {
                    None => out.push(None),
                    Some(Ok(x)) => out.push(Some(x)),
                    Some(Err(_)) => {
                        return Err(AppError::schema(
                            "non_numeric_metric",
                            format!("column '{}' row {}: '{}' is not numeric", column, idx, v.unwrap_or_default()),
                        ))
                    }
                }
            }
            Series::new(col.name().clone(), out)
        }
        other => {
            return Err(AppError::schema(
                "non_numeric_metric",
                format!("column '{}' has type {} which is not numeric", column, other),
            ))
        }
    };
    replace(df, series)
}

/// Guarantee the entity column holds strings.
pub fn ensure_entity(df: &DataFrame, column: &str) -> AppResult<DataFrame> {
    let col = df.column(column)?;
    if col.dtype() == &DataType::String {
        return Ok(df.clone());
    }
    let series = col.as_materialized_series().cast(&DataType::String)?;
    replace(df, series)
}

/// Run every normalization step for the configured role columns.
pub fn normalize(df: &DataFrame, roles: &ColumnRoles) -> AppResult<DataFrame> {
    require_columns(df, roles)?;
    let df = ensure_datetime(df, &roles.timestamp)?;
    let df = ensure_metric(&df, &roles.metric)?;
    ensure_entity(&df, &roles.entity)
}
