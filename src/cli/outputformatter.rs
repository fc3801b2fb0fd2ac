use terminal_size::{terminal_size, Height, Width};

use crate::frame::TableView;

const NULL_CELL: &str = "NULL";

/// Render a table view as ASCII grid lines fitted to `termw` columns.
/// At most `max_rows` rows are drawn; a footer reports what was elided.
pub fn render_table(view: &TableView, termw: usize, max_rows: Option<usize>) -> Vec<String> {
    let cols = &view.columns;
    let shown = max_rows.map(|m| m.min(view.rows.len())).unwrap_or(view.rows.len());
    let rows: Vec<Vec<String>> = view.rows[..shown]
        .iter()
        .map(|r| r.iter().map(|c| c.clone().unwrap_or_else(|| NULL_CELL.to_string())).collect())
        .collect();

    let mut widths: Vec<usize> = cols.iter().map(|s| visible_len(s).min(termw)).collect();
    for r in &rows {
        for (i, cell) in r.iter().enumerate().take(cols.len()) {
            let w = visible_len(cell);
            if w > widths[i] { widths[i] = w.min(termw); }
        }
    }

    let mut out = Vec::with_capacity(rows.len() + 5);
    let sep = build_separator(&widths);
    out.push(fit_line_to_width(&sep, termw));
    out.push(fit_line_to_width(&build_row_header_colored(cols, &widths), termw));
    out.push(fit_line_to_width(&sep, termw));
    for r in &rows {
        out.push(fit_line_to_width(&build_row(r, &widths), termw));
    }
    out.push(fit_line_to_width(&sep, termw));

    let mut summary = format!("rows: {}, cols: {}", view.rows.len(), cols.len());
    if shown < view.rows.len() {
        summary.push_str(&format!(" (showing first {})", shown));
    }
    out.push(fit_line_to_width(&summary, termw));
    out
}

fn build_separator(widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('+');
    for w in widths {
        s.push_str(&"-".repeat(*w + 2));
        s.push('+');
    }
    s
}

fn build_row(cells: &[String], widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('|');
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).cloned().unwrap_or_default();
        let (text, align_right) = (truncate(&cell, *w), is_numeric_like(&cell));
        let pad = w.saturating_sub(visible_len(&text));
        s.push(' ');
        if align_right {
            s.push_str(&" ".repeat(pad));
            s.push_str(&text);
        } else {
            s.push_str(&text);
            s.push_str(&" ".repeat(pad));
        }
        s.push(' ');
        s.push('|');
    }
    s
}

// Header row with column names colored green. Padding follows visible width.
fn build_row_header_colored(cells: &[String], widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('|');
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).cloned().unwrap_or_default();
        let text = truncate(&cell, *w);
        s.push(' ');
        s.push_str(&format!("\x1b[32m{}\x1b[0m", text));
        s.push_str(&" ".repeat(w.saturating_sub(visible_len(&text))));
        s.push(' ');
        s.push('|');
    }
    s
}

fn truncate(s: &str, max: usize) -> String {
    let len = s.chars().count();
    if len <= max { return s.to_string(); }
    if max <= 1 { return "…".to_string(); }
    s.chars().take(max - 1).collect::<String>() + "…"
}

fn is_numeric_like(s: &str) -> bool {
    // crude detection for aligning numbers to right
    let st = s.trim();
    if st.is_empty() { return false; }
    let mut has_digit = false;
    for ch in st.chars() {
        if ch.is_ascii_digit() { has_digit = true; continue; }
        if ".-+eE,_".contains(ch) { continue; }
        return false;
    }
    has_digit
}

/// Usable width of the attached terminal, 80 when not a terminal.
pub fn terminal_width() -> usize {
    match terminal_size() {
        Some((Width(w), Height(_h))) => (w as usize).saturating_sub(4).max(20),
        None => 80,
    }
}

/// A run of printable text or one ANSI CSI escape (`ESC [ ... letter`).
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Escape(String),
}

fn split_ansi(s: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\x1b' {
            text.push(ch);
            continue;
        }
        if !text.is_empty() {
            segments.push(Segment::Text(std::mem::take(&mut text)));
        }
        let mut esc = String::from(ch);
        if chars.next_if_eq(&'[').is_some() {
            esc.push('[');
            for c in chars.by_ref() {
                esc.push(c);
                if c.is_ascii_alphabetic() { break; }
            }
        }
        segments.push(Segment::Escape(esc));
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    segments
}

/// Printable width of `s`; escapes take no columns.
fn visible_len(s: &str) -> usize {
    split_ansi(s)
        .iter()
        .map(|seg| match seg {
            Segment::Text(t) => t.chars().count(),
            Segment::Escape(_) => 0,
        })
        .sum()
}

fn fit_line_to_width(s: &str, maxw: usize) -> String {
    if visible_len(s) <= maxw { s.to_string() } else { elide_middle(s, maxw) }
}

/// Keep the start and end of `s` around a `...` marker so the result is
/// exactly `maxw` columns. Escapes are kept wherever they fall inside the
/// kept text, and a reset is appended in case a color was left open.
fn elide_middle(s: &str, maxw: usize) -> String {
    if maxw <= 3 { return "…".repeat(maxw.min(1)); }
    let keep = maxw - 3;
    let head_budget = keep / 2;
    let tail_budget = keep - head_budget;
    let segments = split_ansi(s);

    let mut head = String::new();
    let mut taken = 0usize;
    for seg in &segments {
        match seg {
            Segment::Escape(e) => head.push_str(e),
            Segment::Text(t) => {
                let n = t.chars().count().min(head_budget - taken);
                head.extend(t.chars().take(n));
                taken += n;
            }
        }
        if taken == head_budget { break; }
    }

    let mut tail_parts: Vec<String> = Vec::new();
    let mut taken = 0usize;
    for seg in segments.iter().rev() {
        match seg {
            Segment::Escape(e) => tail_parts.push(e.clone()),
            Segment::Text(t) => {
                let len = t.chars().count();
                let n = len.min(tail_budget - taken);
                tail_parts.push(t.chars().skip(len - n).collect());
                taken += n;
            }
        }
        if taken == tail_budget { break; }
    }
    tail_parts.reverse();

    format!("{}...{}\x1b[0m", head, tail_parts.concat())
}
