//!
//! Command-line host
//! -----------------
//! Renders one page to the terminal: the raw table, the selectable token
//! names with the default selection, and either the Vega-Lite chart spec for
//! the chosen tokens or the informational message when none are chosen.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::chart::ChartOutcome;
use crate::config::{flag_value, has_flag};
use crate::frame::TableView;
use crate::selection::Selection;
use crate::viewer::ViewerState;

pub mod outputformatter;

pub const DEFAULT_MAX_ROWS: usize = 50;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOptions {
    /// `None` means the default selection; `Some(empty)` means nothing selected.
    pub select: Option<Selection>,
    pub out: Option<PathBuf>,
    pub max_rows: Option<usize>,
    /// Grid width; the terminal width when unset.
    pub width: Option<usize>,
    pub table_json: bool,
}

impl CliOptions {
    pub fn from_args(args: &[String]) -> Self {
        let select = flag_value(args, "--select").map(|s| parse_selection(&s));
        let out = flag_value(args, "--out").map(PathBuf::from);
        let max_rows = match flag_value(args, "--max-rows").and_then(|s| s.parse::<usize>().ok()) {
            Some(0) => None,
            Some(n) => Some(n),
            None => Some(DEFAULT_MAX_ROWS),
        };
        Self { select, out, max_rows, width: None, table_json: has_flag(args, "--json") }
    }
}

/// Comma separated names; blanks are skipped so `""` is the empty selection.
pub fn parse_selection(s: &str) -> Selection {
    s.split(',').map(str::trim).filter(|n| !n.is_empty()).collect()
}

pub fn usage(program: &str) -> String {
    format!(
        "Usage:\n  {program} [--db PATH] [--table NAME] [--select A,B,...] [--out FILE] [--max-rows N] [--json]\n\nOptions:\n  --db PATH        DuckDB store file (env: TOKEN_VIEWER_DB, default Token_data.duckdb)\n  --table NAME     table to load (env: TOKEN_VIEWER_TABLE, default token_status)\n  --select LIST    comma separated token names to chart; omit for the default selection, pass \"\" for none\n  --out FILE       write the chart spec to FILE instead of stdout\n  --max-rows N     rows of the raw table to print (default {DEFAULT_MAX_ROWS}, 0 = all)\n  --json           print the raw table as JSON rows instead of a grid\n"
    )
}

/// Render a page for `opts` to `out`. The raw table is written before the
/// chart, so a selection error still leaves the table on screen.
pub fn run<W: Write>(state: &ViewerState, opts: &CliOptions, out: &mut W) -> Result<()> {
    let cfg = state.config();
    writeln!(out, "{}", cfg.page_title)?;
    writeln!(out)?;
    if opts.table_json {
        let rows = serde_json::to_string_pretty(&state.table_json()?)?;
        writeln!(out, "Raw table")?;
        writeln!(out, "{}", rows)?;
    } else {
        let view: TableView = state.table_view()?;
        writeln!(out, "Raw table")?;
        let width = opts.width.unwrap_or_else(outputformatter::terminal_width);
        crate::tprintln!("[cli] rendering raw table at width={}", width);
        for line in outputformatter::render_table(&view, width, opts.max_rows) {
            writeln!(out, "{}", line)?;
        }
    }

    let entities = state.entities()?;
    writeln!(out)?;
    writeln!(out, "{}", cfg.chart_title)?;
    writeln!(out, "Tokens: {}", entities.universe.join(", "))?;
    if let Some(sel) = &opts.select {
        sel.validate_against(&entities.universe)?;
    }
    let selection = opts.select.clone().unwrap_or_else(|| entities.default_selection.clone());
    writeln!(out, "Selected: {}", selection.iter().collect::<Vec<_>>().join(", "))?;

    match state.chart(Some(&selection))? {
        ChartOutcome::Message { message } => writeln!(out, "{}", message)?,
        ChartOutcome::Chart { spec, series } => {
            let text = serde_json::to_string_pretty(&spec)?;
            match &opts.out {
                Some(path) => {
                    std::fs::write(path, &text).with_context(|| format!("writing chart spec to {}", path.display()))?;
                    let points: usize = series.iter().map(|s| s.points.len()).sum();
                    writeln!(out, "chart spec written to {} ({} series, {} points)", path.display(), series.len(), points)?;
                }
                None => writeln!(out, "{}", text)?,
            }
        }
    }
    Ok(())
}
