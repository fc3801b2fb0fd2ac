//! DataFrame rendering helpers shared by the HTTP and CLI hosts.

use polars::prelude::*;
use serde::Serialize;
use serde_json::{json, Value};

fn datetime_string(v: i64, unit: TimeUnit) -> Option<String> {
    let dt = match unit {
        TimeUnit::Nanoseconds => chrono::DateTime::from_timestamp_nanos(v),
        TimeUnit::Microseconds => chrono::DateTime::from_timestamp_micros(v)?,
        TimeUnit::Milliseconds => chrono::DateTime::from_timestamp_millis(v)?,
    };
    Some(dt.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string())
}

fn date_string(days: i32) -> Option<String> {
    chrono::NaiveDate::from_num_days_from_ce_opt(days + 719_163).map(|d| d.to_string())
}

/// Render a single cell as JSON. Datetimes and dates become strings.
fn cell_json(av: AnyValue) -> Value {
    match av {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(v) => json!(v),
        AnyValue::Int32(v) => json!(v),
        AnyValue::Int64(v) => json!(v),
        AnyValue::UInt32(v) => json!(v),
        AnyValue::UInt64(v) => json!(v),
        AnyValue::Float32(v) => json!(v),
        AnyValue::Float64(v) => if v.is_finite() { json!(v) } else { Value::Null },
        AnyValue::String(v) => json!(v),
        AnyValue::StringOwned(v) => json!(v.as_str()),
        AnyValue::Datetime(v, unit, _) => datetime_string(v, unit).map(Value::String).unwrap_or(Value::Null),
        AnyValue::Date(d) => date_string(d).map(Value::String).unwrap_or(Value::Null),
        other => Value::String(other.to_string()),
    }
}

fn cell_text(av: AnyValue) -> Option<String> {
    match cell_json(av) {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Convert a DataFrame into a vector of row objects keyed by column name.
pub fn dataframe_to_json(df: &DataFrame) -> Value {
    let cols = df.get_column_names();
    let mut out = Vec::with_capacity(df.height());
    for row_idx in 0..df.height() {
        let mut map = serde_json::Map::with_capacity(cols.len());
        for c in df.get_columns() {
            let v = c.get(row_idx).map(cell_json).unwrap_or(Value::Null);
            map.insert(c.name().to_string(), v);
        }
        out.push(Value::Object(map));
    }
    Value::Array(out)
}

/// Column headers plus rows of optional display strings, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableView {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl TableView {
    pub fn from_frame(df: &DataFrame) -> Self {
        let columns: Vec<String> = df.get_column_names().into_iter().map(|s| s.to_string()).collect();
        let mut rows: Vec<Vec<Option<String>>> = Vec::with_capacity(df.height());
        for row_idx in 0..df.height() {
            let row = df
                .get_columns()
                .iter()
                .map(|c| c.get(row_idx).ok().and_then(cell_text))
                .collect();
            rows.push(row);
        }
        Self { columns, rows }
    }

    pub fn height(&self) -> usize { self.rows.len() }
}
