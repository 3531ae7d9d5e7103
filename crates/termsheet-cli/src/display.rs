//! Terminal rendering for validation results, documents and highlight segments.
//!
//! Everything here writes to stdout; logging goes to stderr through tracing.

use termsheet_core::summary::ValidationSummary;
use termsheet_core::{
    Anomaly, DocumentView, FieldValue, PortfolioSummary, Severity, TextSegment, TradeValidation,
    ValidationResult, ValidationStatus,
};
use termsheet_sync::TraderStats;

const TERM_WIDTH: usize = 26;
const VALUE_WIDTH: usize = 22;
const MAX_SEGMENT_ROWS: usize = 40;

// ── Results ──

/// Print results as a fixed-width table.
pub fn print_results_table(results: &[&ValidationResult]) {
    if results.is_empty() {
        println!("  (no fields)");
        return;
    }
    println!(
        "  {:<TERM_WIDTH$} {:<VALUE_WIDTH$} {:<VALUE_WIDTH$} {:>5}  {}",
        "Term", "Extracted", "Expected", "Conf", "Status"
    );
    for r in results {
        println!(
            "  {:<TERM_WIDTH$} {:<VALUE_WIDTH$} {:<VALUE_WIDTH$} {:>4}%  {}",
            truncate(&r.term, TERM_WIDTH),
            truncate(&cell(&r.extracted_value), VALUE_WIDTH),
            truncate(&cell(&r.expected_value), VALUE_WIDTH),
            r.confidence,
            status_marker(r.status),
        );
    }
}

pub fn print_summary(summary: &ValidationSummary) {
    println!(
        "  {} fields: {} validated, {} warning, {} error ({}% complete)",
        summary.total, summary.validated, summary.warning, summary.error, summary.completion_rate
    );
}

/// One trade as a card: header, table, summary line.
pub fn print_trade_card(trade: &TradeValidation) {
    let summary = termsheet_core::summary::summarize(&trade.results);
    println!("=== {} ===", trade.trade_id);
    let rows: Vec<&ValidationResult> = trade.results.iter().collect();
    print_results_table(&rows);
    print_summary(&summary);
    println!();
}

pub fn print_portfolio(p: &PortfolioSummary) {
    println!("Portfolio");
    println!("  {:<TERM_WIDTH$} {}", "documents", p.total_documents);
    println!("  {:<TERM_WIDTH$} {}", "fully validated", p.fully_validated);
    println!("  {:<TERM_WIDTH$} {}", "flagged", p.flagged);
    println!("  {:<TERM_WIDTH$} {}", "failed", p.failed);
    println!("  {:<TERM_WIDTH$} {:.2}%", "validation rate", p.validation_rate);
    println!("  {:<TERM_WIDTH$} {}", "unvalidated fields", p.unvalidated_fields);
}

pub fn print_trader_stats(email: &str, stats: &TraderStats) {
    println!("=== {email} ===");
    println!("  {:<TERM_WIDTH$} {}", "documents", stats.total_documents);
    println!("  {:<TERM_WIDTH$} {:.2}%", "validation rate", stats.validation_rate);
    println!(
        "  {:<TERM_WIDTH$} {}",
        "unvalidated fields", stats.total_unvalidated_fields
    );
}

// ── Documents ──

pub fn print_document_card(view: &DocumentView) {
    println!("=== {} ===", view.name);
    println!("  {:<TERM_WIDTH$} {}", "id", view.id);
    if let Some(date) = &view.upload_date {
        println!("  {:<TERM_WIDTH$} {}", "uploaded", date);
    }
    println!("  {:<TERM_WIDTH$} {}", "status", view.status);
    println!();

    if !view.segments.is_empty() {
        println!("Text");
        println!("  {}", render_inline(&view.segments));
        println!();
        print_highlights(&view.segments);
    }

    println!("Validation");
    let rows: Vec<&ValidationResult> = view.results.iter().collect();
    print_results_table(&rows);
    print_summary(&view.summary);
    println!();

    if !view.anomalies.is_empty() {
        print_anomalies(&view.anomalies);
    }
}

/// One line per document, for list views.
pub fn print_document_row(view: &DocumentView) {
    println!(
        "  {:<36} {:<10} {:>3}%  {}",
        truncate(&view.name, 36),
        view.status.as_str(),
        view.summary.completion_rate,
        view.upload_date.as_deref().unwrap_or("-"),
    );
}

// ── Rules ──

/// Rule findings, high severity first.
pub fn print_anomalies(anomalies: &[Anomaly]) {
    if anomalies.is_empty() {
        println!("  (no anomalies)");
        return;
    }
    let mut sorted: Vec<&Anomaly> = anomalies.iter().collect();
    sorted.sort_by(|a, b| b.severity.cmp(&a.severity));

    println!("Anomalies ({})", anomalies.len());
    for a in sorted {
        println!(
            "  {:<6} {:<TERM_WIDTH$} {}",
            severity_marker(a.severity),
            truncate(&a.field, TERM_WIDTH),
            a.issue
        );
        if let Some(current) = &a.current_value {
            println!("  {:<6} {:<TERM_WIDTH$} {}", "", "  current", current);
        }
        if let Some(expected) = &a.expected_value {
            println!("  {:<6} {:<TERM_WIDTH$} {}", "", "  expected", expected);
        }
    }
    println!();
}

// ── Segments ──

/// Render segments on one line with highlights bracketed: `Rate: [3.25%]`.
pub fn render_inline(segments: &[TextSegment]) -> String {
    let mut out = String::new();
    for seg in segments {
        match seg {
            TextSegment::Plain { text } => out.push_str(text),
            TextSegment::Highlighted { text, .. } => {
                out.push('[');
                out.push_str(text);
                out.push(']');
            }
        }
    }
    out
}

/// List highlighted segments with their char offsets.
pub fn print_highlights(segments: &[TextSegment]) {
    let mut offset = 0usize;
    let mut rows = Vec::new();
    for seg in segments {
        let len = seg.text().chars().count();
        if let TextSegment::Highlighted { text, label, value } = seg {
            rows.push((offset, offset + len, label.as_str(), text.as_str(), value.as_deref()));
        }
        offset += len;
    }
    if rows.is_empty() {
        println!("  (no highlights)");
        return;
    }

    println!("Highlights ({})", rows.len());
    for (start, end, label, text, value) in rows.iter().take(MAX_SEGMENT_ROWS) {
        print!("  {:>5}..{:<5} {:<TERM_WIDTH$} {}", start, end, truncate(label, TERM_WIDTH), text);
        if let Some(v) = value
            && v != text
        {
            print!("  (value: {v})");
        }
        println!();
    }
    if rows.len() > MAX_SEGMENT_ROWS {
        println!("  ... and {} more", rows.len() - MAX_SEGMENT_ROWS);
    }
    println!();
}

// ── Helpers ──

fn cell(value: &FieldValue) -> String {
    value.display_currency()
}

fn status_marker(status: ValidationStatus) -> &'static str {
    match status {
        ValidationStatus::Validated => "ok validated",
        ValidationStatus::Warning => "!  warning",
        ValidationStatus::Error => "x  error",
    }
}

fn severity_marker(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "HIGH",
        Severity::Medium => "medium",
    }
}

/// Shorten to `max` chars, ending in `...` when cut.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_rendering_brackets_highlights() {
        let segs = vec![
            TextSegment::Plain {
                text: "Rate: ".into(),
            },
            TextSegment::Highlighted {
                text: "3.25%".into(),
                label: "Fixed Rate".into(),
                value: None,
            },
            TextSegment::Plain {
                text: " fixed".into(),
            },
        ];
        assert_eq!(render_inline(&segs), "Rate: [3.25%] fixed");
    }

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Floating Rate Index Spread", 12), "Floating ...");
        assert_eq!(truncate("€€€€€€", 5), "€€...");
    }

    #[test]
    fn every_status_has_a_marker() {
        let markers: Vec<&str> = ValidationStatus::ALL.iter().map(|s| status_marker(*s)).collect();
        assert_eq!(markers, vec!["ok validated", "!  warning", "x  error"]);
    }

    #[test]
    fn cells_use_currency_formatting() {
        assert_eq!(cell(&FieldValue::Numeric(20_000_000.0)), "$20,000,000.00");
        assert_eq!(cell(&FieldValue::Null), "-");
        assert_eq!(cell(&FieldValue::text("SOFR")), "SOFR");
    }
}
