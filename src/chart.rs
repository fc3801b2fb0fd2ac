//!
//! Projection & chart builder
//! --------------------------
//! Turns (table, selection) into either a Vega-Lite line chart or an
//! informational message. The output is a pure function of its inputs: rows
//! are filtered to the selection, rows missing a timestamp or metric are
//! dropped, the rest are stably sorted by time, and colors are assigned by
//! position in the sorted entity list.
//!
//! The chart mirrors what the page used to draw with Altair: a line per
//! entity with point markers, a nominal color legend titled "Token", a
//! three-field tooltip and an interval parameter bound to the scales so the
//! chart pans and zooms.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::ColumnRoles;
use crate::error::{AppError, AppResult};
use crate::selection::{entity_universe, Selection};

pub const VEGA_LITE_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";
pub const EMPTY_SELECTION_MESSAGE: &str = "Select at least one token to see the plot.";

/// Tableau10, the default categorical scheme of Vega-Lite.
const PALETTE: [&str; 10] = [
    "#4c78a8", "#f58518", "#e45756", "#72b7b2", "#54a24b",
    "#eeca3b", "#b279a2", "#ff9da6", "#9d755d", "#bab0ac",
];

/// Distinct color for the `idx`-th entity. Past the palette, hues are spread
/// by the golden angle so neighbours stay distinguishable.
pub fn color_for_index(idx: usize) -> String {
    match PALETTE.get(idx) {
        Some(c) => (*c).to_string(),
        None => {
            let hue = ((idx - PALETTE.len()) as f64 * 137.508) % 360.0;
            format!("hsl({:.1}, 62%, 48%)", hue)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub entity: String,
    pub color: String,
    pub points: Vec<ChartPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartOutcome {
    Chart { series: Vec<ChartSeries>, spec: Value },
    Message { message: String },
}

impl ChartOutcome {
    pub fn spec(&self) -> Option<&Value> {
        match self {
            ChartOutcome::Chart { spec, .. } => Some(spec),
            ChartOutcome::Message { .. } => None,
        }
    }

    pub fn series(&self) -> &[ChartSeries] {
        match self {
            ChartOutcome::Chart { series, .. } => series,
            ChartOutcome::Message { .. } => &[],
        }
    }

    pub fn is_message(&self) -> bool { matches!(self, ChartOutcome::Message { .. }) }
}

/// Rows of `df` for the selected entities with a timestamp and a real metric
/// value (null and NaN both count as missing), ordered by timestamp (ties
/// keep their original order).
pub fn project(df: &DataFrame, roles: &ColumnRoles, selection: &Selection) -> AppResult<DataFrame> {
    let names = df.column(&roles.entity)?.str()?;
    let metric = df.column(&roles.metric)?.cast(&DataType::Float64)?;
    let metric = metric.f64()?;
    let mask: Vec<bool> = names
        .into_iter()
        .zip(metric.into_iter())
        .map(|(n, v)| n.is_some_and(|n| selection.contains(n)) && v.is_some_and(|v| !v.is_nan()))
        .collect();
    let mask_series = Series::new("__mask".into(), mask);
    let filtered = df.filter(mask_series.bool()?)?;

    let ts = roles.timestamp.as_str();
    let opts = SortMultipleOptions { descending: vec![false], nulls_last: vec![true], maintain_order: true, multithreaded: false, limit: None };
    let out = filtered
        .lazy()
        .filter(col(ts).is_not_null())
        .sort_by_exprs(vec![col(ts)], opts)
        .collect()?;
    debug!(target: "token_viewer::chart", "project: selected={} rows_in={} rows_out={}", selection.len(), df.height(), out.height());
    Ok(out)
}

fn micros_per_unit(unit: TimeUnit) -> (i64, i64) {
    // (multiplier, divisor) to reach microseconds
    match unit {
        TimeUnit::Nanoseconds => (1, 1_000),
        TimeUnit::Microseconds => (1, 1),
        TimeUnit::Milliseconds => (1_000, 1),
    }
}

fn timestamps(df: &DataFrame, column: &str) -> AppResult<Vec<Option<NaiveDateTime>>> {
    let c = df.column(column)?;
    let (mul, div) = match c.dtype() {
        DataType::Datetime(unit, _) => micros_per_unit(*unit),
        other => {
            return Err(AppError::schema(
                "unsupported_timestamp_type",
                format!("column '{}' must be normalized to a date-time before charting, found {}", column, other),
            ))
        }
    };
    let phys = c.cast(&DataType::Int64)?;
    Ok(phys
        .i64()?
        .into_iter()
        .map(|v| v.and_then(|x| chrono::DateTime::from_timestamp_micros(x.saturating_mul(mul) / div)).map(|dt| dt.naive_utc()))
        .collect())
}

/// One series per selected entity that exists in `table`, in sorted order.
/// An entity whose rows were all dropped still gets an (empty) series.
pub fn chart_series(table: &DataFrame, projected: &DataFrame, roles: &ColumnRoles, selection: &Selection) -> AppResult<Vec<ChartSeries>> {
    let present = entity_universe(table, &roles.entity)?;
    let mut grouped: BTreeMap<String, Vec<ChartPoint>> = selection
        .iter()
        .filter(|n| present.binary_search_by(|p| p.as_str().cmp(n)).is_ok())
        .map(|n| (n.to_string(), Vec::new()))
        .collect();

    let names = projected.column(&roles.entity)?.str()?;
    let values = projected.column(&roles.metric)?.cast(&DataType::Float64)?;
    let values = values.f64()?;
    let times = timestamps(projected, &roles.timestamp)?;
    for ((name, ts), value) in names.into_iter().zip(times).zip(values.into_iter()) {
        if let (Some(name), Some(timestamp), Some(value)) = (name, ts, value) {
            if let Some(points) = grouped.get_mut(name) {
                points.push(ChartPoint { timestamp, value });
            }
        }
    }

    Ok(grouped
        .into_iter()
        .enumerate()
        .map(|(idx, (entity, points))| ChartSeries { entity, color: color_for_index(idx), points })
        .collect())
}

fn iso(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

/// Vega-Lite document for the given series. Data rows are emitted in global
/// timestamp order, matching the projection.
pub fn vega_lite_spec(projected: &DataFrame, series: &[ChartSeries], roles: &ColumnRoles) -> AppResult<Value> {
    let domain: Vec<&str> = series.iter().map(|s| s.entity.as_str()).collect();
    let range: Vec<&str> = series.iter().map(|s| s.color.as_str()).collect();

    let names = projected.column(&roles.entity)?.str()?;
    let values = projected.column(&roles.metric)?.cast(&DataType::Float64)?;
    let values = values.f64()?;
    let times = timestamps(projected, &roles.timestamp)?;
    let mut data: Vec<Value> = Vec::with_capacity(projected.height());
    for ((name, ts), value) in names.into_iter().zip(times).zip(values.into_iter()) {
        if let (Some(name), Some(ts), Some(value)) = (name, ts, value) {
            if !domain.contains(&name) { continue; }
            let mut row = Map::with_capacity(3);
            row.insert(roles.entity.clone(), json!(name));
            row.insert(roles.timestamp.clone(), json!(iso(&ts)));
            row.insert(roles.metric.clone(), json!(value));
            data.push(Value::Object(row));
        }
    }

    Ok(json!({
        "$schema": VEGA_LITE_SCHEMA,
        "width": "container",
        "data": { "values": data },
        "mark": { "type": "line", "point": true },
        "encoding": {
            "x": { "field": roles.timestamp, "type": "temporal", "title": "Time" },
            "y": { "field": roles.metric, "type": "quantitative", "title": roles.metric },
            "color": {
                "field": roles.entity,
                "type": "nominal",
                "title": "Token",
                "scale": { "domain": domain, "range": range }
            },
            "tooltip": [
                { "field": roles.entity, "type": "nominal" },
                { "field": roles.timestamp, "type": "temporal" },
                { "field": roles.metric, "type": "quantitative" }
            ]
        },
        "params": [
            { "name": "zoom", "select": { "type": "interval", "encodings": ["x", "y"] }, "bind": "scales" }
        ]
    }))
}

/// The whole selection-to-visualization step.
pub fn build_chart(table: &DataFrame, selection: &Selection, roles: &ColumnRoles) -> AppResult<ChartOutcome> {
    if selection.is_empty() {
        return Ok(ChartOutcome::Message { message: EMPTY_SELECTION_MESSAGE.to_string() });
    }
    let projected = project(table, roles, selection)?;
    let series = chart_series(table, &projected, roles, selection)?;
    let spec = vega_lite_spec(&projected, &series, roles)?;
    Ok(ChartOutcome::Chart { series, spec })
}
