//! Handles all user-facing output for the CLI.
//!
//! Colors are only used when the stream is a terminal.

use difference::{Changeset, Difference};
use serde_json::json;
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::engine::FamilyReport;
use crate::runtime::Value;

// ============================================================================
// STREAMS
// ============================================================================

fn choice_for(stream: atty::Stream) -> ColorChoice {
    if atty::is(stream) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

pub fn stdout() -> StandardStream {
    StandardStream::stdout(choice_for(atty::Stream::Stdout))
}

pub fn stderr() -> StandardStream {
    StandardStream::stderr(choice_for(atty::Stream::Stderr))
}

// ============================================================================
// PROCESS SUMMARY
// ============================================================================

/// Counters collected by the `process` command.
#[derive(Debug, Default)]
pub struct ProcessSummary {
    pub transformed: usize,
    pub changed: usize,
    pub copied: usize,
    pub diagnostics: usize,
}

/// Prints the `process` summary to stderr so stdout stays clean.
pub fn print_summary(summary: &ProcessSummary) {
    let mut out = stderr();
    let _ = out.set_color(ColorSpec::new().set_bold(true));
    let _ = writeln!(out, "Summary");
    let _ = out.reset();

    let _ = out.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
    let _ = writeln!(
        out,
        "  transformed: {} ({} changed)",
        summary.transformed, summary.changed
    );
    let _ = out.reset();
    let _ = writeln!(out, "  copied:      {}", summary.copied);

    if summary.diagnostics > 0 {
        let _ = out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)));
    }
    let _ = writeln!(out, "  diagnostics: {}", summary.diagnostics);
    let _ = out.reset();
}

// ============================================================================
// REGIONS
// ============================================================================

pub fn print_regions(reports: &[FamilyReport]) {
    let mut out = stdout();

    for report in reports {
        if report.regions.is_empty() {
            continue;
        }
        let _ = out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true));
        let _ = writeln!(out, "{}", report.family);
        let _ = out.reset();

        for region in &report.regions {
            let (first, last) = region.span.line_range(&report.text);
            let _ = write!(
                out,
                "{}{} {}  lines {}-{}  ",
                "  ".repeat(region.level + 1),
                region.kind,
                region.condition,
                first,
                last
            );
            let (label, color) = if region.result {
                ("kept", Color::Green)
            } else {
                ("removed", Color::Red)
            };
            let _ = out.set_color(ColorSpec::new().set_fg(Some(color)));
            let _ = writeln!(out, "{}", label);
            let _ = out.reset();
        }
    }
}

pub fn regions_json(reports: &[FamilyReport]) -> serde_json::Value {
    let families: Vec<serde_json::Value> = reports
        .iter()
        .map(|report| {
            let regions: Vec<serde_json::Value> = report
                .regions
                .iter()
                .map(|region| {
                    let (first, last) = region.span.line_range(&report.text);
                    json!({
                        "kind": region.kind.directive(),
                        "condition": region.condition,
                        "level": region.level,
                        "result": region.result,
                        "lines": [first, last],
                    })
                })
                .collect();
            json!({
                "family": report.family.as_str(),
                "regions": regions,
                "diagnostics": report
                    .diagnostics
                    .iter()
                    .map(|d| d.to_string())
                    .collect::<Vec<_>>(),
            })
        })
        .collect();
    serde_json::Value::Array(families)
}

// ============================================================================
// EVAL
// ============================================================================

pub fn print_eval(value: &Value, result: bool) {
    let mut out = stdout();
    let _ = writeln!(out, "value:  {} ({})", display_value(value), value.type_name());
    let color = if result { Color::Green } else { Color::Red };
    let _ = write!(out, "result: ");
    let _ = out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
    let _ = writeln!(out, "{}", result);
    let _ = out.reset();
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{:?}", s),
        other => other.to_string(),
    }
}

// ============================================================================
// DIFF
// ============================================================================

/// Prints a line diff between `before` and `after`.
pub fn print_file_diff(before: &str, after: &str) {
    let mut out = stdout();
    let changeset = Changeset::new(before, after, "\n");
    print_diff(&mut out, &changeset.diffs);
}

fn print_diff(out: &mut StandardStream, diffs: &[Difference]) {
    for diff in diffs {
        let (prefix, text, color) = match diff {
            Difference::Same(x) => (' ', x, None),
            Difference::Add(x) => ('+', x, Some(Color::Green)),
            Difference::Rem(x) => ('-', x, Some(Color::Red)),
        };
        for line in text.split('\n') {
            let _ = out.set_color(ColorSpec::new().set_fg(color));
            let _ = writeln!(out, "{}{}", prefix, line);
        }
    }
    let _ = out.reset();
}
