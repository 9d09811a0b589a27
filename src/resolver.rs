//! Region resolution.
//!
//! Pairs each start marker of one syntax family with its end marker,
//! computes nesting levels and condition results, and rewrites the text by
//! offset range. A region moves through `open -> closed -> substituted` and
//! never back.

use serde::Serialize;

use crate::errors::{to_source_span, ErrorKind, ErrorReporting, IfdefError, ReportContext, SourceContext};
use crate::markers::{self, MarkerKind, MarkerOccurrence, SyntaxFamily};
use crate::runtime::{evaluate, Definitions};
use crate::syntax::Span;

/// A resolved start/end pairing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    pub kind: MarkerKind,
    pub condition: String,
    /// From the first byte of the start marker to the last byte of the end marker.
    pub span: Span,
    /// Between the end of the start marker and the start of the end marker.
    pub inner: Span,
    /// 0 for outermost regions.
    pub level: usize,
    pub result: bool,
}

impl Region {
    /// The text this region replaces.
    pub fn full_text<'a>(&self, text: &'a str) -> &'a str {
        &text[self.span.start..self.span.end]
    }

    /// The text kept when the condition holds.
    pub fn inner_text<'a>(&self, text: &'a str) -> &'a str {
        &text[self.inner.start..self.inner.end]
    }
}

/// Regions of one family plus the condition diagnostics raised while
/// evaluating them.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Sorted by start offset; parents precede their children.
    pub regions: Vec<Region>,
    pub diagnostics: Vec<IfdefError>,
}

/// A start marker whose end marker has not been seen yet.
struct OpenRegion<'m> {
    start: &'m MarkerOccurrence,
    level: usize,
    result: bool,
}

// ============================================================================
// MATCHING
// ============================================================================

/// Pairs `starts` with `ends` for one family.
///
/// Fails with an imbalance-class error when the counts differ, when an end
/// marker precedes every start it could close, or when a region is left
/// open; the caller then leaves this family's text untouched.
pub fn resolve(
    family: SyntaxFamily,
    starts: &[MarkerOccurrence],
    ends: &[MarkerOccurrence],
    definitions: &Definitions,
    source: &SourceContext,
) -> Result<Resolution, IfdefError> {
    let ctx = ReportContext::new(source.clone(), "markers");

    if starts.len() != ends.len() {
        let first = starts.first().or(ends.first()).map(|m| m.span).unwrap_or_default();
        return Err(ctx.report(
            ErrorKind::ImbalancedMarkers {
                family,
                path: source.name.clone(),
                starts: starts.len(),
                ends: ends.len(),
            },
            to_source_span(first),
        ));
    }

    let mut resolution = Resolution::default();
    let mut open: Vec<OpenRegion> = Vec::new();
    let mut cursor = 0usize;

    for (i, start) in starts.iter().enumerate() {
        let next = starts.get(i + 1);
        let result = evaluate_start(start, definitions, source, &mut resolution.diagnostics);

        let Some(end) = ends.get(cursor) else {
            return Err(unclosed(&ctx, family, start));
        };
        if end.span.start < start.span.end {
            return Err(stray_end(&ctx, family, end));
        }

        let closes_here = next.map_or(true, |n| n.span.start > end.span.start);
        if !closes_here {
            // An enclosing region: its end lies beyond the next start
            open.push(OpenRegion {
                start,
                level: open.len(),
                result,
            });
            continue;
        }

        resolution.regions.push(close(start, end, open.len(), result));
        cursor += 1;

        // Cascade: the following end markers may close enclosing regions too,
        // as long as no start marker comes before them.
        while let Some(end) = ends.get(cursor) {
            if next.is_some_and(|n| n.span.start < end.span.start) {
                break;
            }
            let Some(parent) = open.pop() else {
                return Err(stray_end(&ctx, family, end));
            };
            resolution.regions.push(close(parent.start, end, parent.level, parent.result));
            cursor += 1;
        }
    }

    if let Some(parent) = open.first() {
        return Err(unclosed(&ctx, family, parent.start));
    }
    if let Some(end) = ends.get(cursor) {
        return Err(stray_end(&ctx, family, end));
    }

    resolution.regions.sort_by_key(|r| r.span.start);
    Ok(resolution)
}

fn evaluate_start(
    start: &MarkerOccurrence,
    definitions: &Definitions,
    source: &SourceContext,
    diagnostics: &mut Vec<IfdefError>,
) -> bool {
    let Some(condition) = start.condition.as_ref() else {
        return false;
    };
    match evaluate(start.kind, &condition.value, definitions) {
        Ok(result) => result,
        Err(error) => {
            diagnostics.push(error.with_source(source, condition.span.start));
            false
        }
    }
}

fn close(start: &MarkerOccurrence, end: &MarkerOccurrence, level: usize, result: bool) -> Region {
    Region {
        kind: start.kind,
        condition: start
            .condition
            .as_ref()
            .map(|c| c.value.clone())
            .unwrap_or_default(),
        span: Span::new(start.span.start, end.span.end),
        inner: Span::new(start.span.end, end.span.start),
        level,
        result,
    }
}

fn unclosed(ctx: &ReportContext, family: SyntaxFamily, start: &MarkerOccurrence) -> IfdefError {
    ctx.report(
        ErrorKind::UnclosedRegion {
            family,
            path: ctx.source.name.clone(),
        },
        to_source_span(start.span),
    )
}

fn stray_end(ctx: &ReportContext, family: SyntaxFamily, end: &MarkerOccurrence) -> IfdefError {
    ctx.report(
        ErrorKind::StrayEndMarker {
            family,
            path: ctx.source.name.clone(),
        },
        to_source_span(end.span),
    )
}

// ============================================================================
// SUBSTITUTION
// ============================================================================

/// Rewrites `text`, replacing each region by its inner text (condition true)
/// or by nothing (condition false).
///
/// Works on offset ranges, so identical region text elsewhere in the buffer
/// can never be hit by mistake. A discarded region drops its children with it.
pub fn rewrite(text: &str, regions: &[Region]) -> String {
    let mut sorted: Vec<&Region> = regions.iter().collect();
    sorted.sort_by_key(|r| r.span.start);

    let mut out = String::with_capacity(text.len());
    splice(text, Span::new(0, text.len()), &sorted, &mut out);
    out
}

/// Emits `range` of `text` with `regions` (all inside `range`, sorted by
/// start) substituted.
fn splice(text: &str, range: Span, regions: &[&Region], out: &mut String) {
    let mut pos = range.start;
    let mut i = 0;

    while i < regions.len() {
        let region = regions[i];
        // Everything after `region` that starts before its end is a descendant
        let subtree_end = regions[i + 1..]
            .iter()
            .position(|r| r.span.start >= region.span.end)
            .map_or(regions.len(), |p| i + 1 + p);

        out.push_str(&text[pos..region.span.start]);
        if region.result {
            splice(text, region.inner, &regions[i + 1..subtree_end], out);
        }
        pos = region.span.end;
        i = subtree_end;
    }

    out.push_str(&text[pos..range.end]);
}

// ============================================================================
// FAMILY PASS
// ============================================================================

/// Runs locate, resolve and rewrite for one family.
///
/// On a structural error the text is returned unchanged and the error is
/// the only diagnostic.
pub fn apply_family(
    family: SyntaxFamily,
    text: &str,
    definitions: &Definitions,
    source_name: &str,
) -> (String, Vec<IfdefError>) {
    let (starts, ends) = markers::locate(family, text);
    if starts.is_empty() && ends.is_empty() {
        return (text.to_string(), Vec::new());
    }

    let source = SourceContext::from_file(source_name, text);
    match resolve(family, &starts, &ends, definitions, &source) {
        Ok(resolution) => (rewrite(text, &resolution.regions), resolution.diagnostics),
        Err(error) => (text.to_string(), vec![error]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Value;

    fn defs(pairs: &[(&str, bool)]) -> Definitions {
        pairs.iter().map(|(k, v)| (*k, Value::Bool(*v))).collect()
    }

    fn resolve_line(text: &str, d: &Definitions) -> Result<Resolution, IfdefError> {
        let (starts, ends) = markers::locate(SyntaxFamily::Line, text);
        resolve(SyntaxFamily::Line, &starts, &ends, d, &SourceContext::from_file("t.js", text))
    }

    #[test]
    fn test_sibling_regions_share_level_zero() {
        let text = "// #ifdef A\na\n// #endif\n// #ifdef B\nb\n// #endif\n";
        let res = resolve_line(text, &defs(&[("A", true)])).unwrap();
        assert_eq!(res.regions.len(), 2);
        assert!(res.regions.iter().all(|r| r.level == 0));
        assert!(res.regions[0].result);
        assert!(!res.regions[1].result);
        assert_eq!(res.regions[0].inner_text(text), "a\n");
    }

    #[test]
    fn test_nested_levels_and_spans() {
        let text = "// #ifdef A\nx\n// #ifdef B\ny\n// #endif\nz\n// #endif\n";
        let res = resolve_line(text, &defs(&[])).unwrap();
        assert_eq!(res.regions.len(), 2);
        let (outer, inner) = (&res.regions[0], &res.regions[1]);
        assert_eq!(outer.level, 0);
        assert_eq!(inner.level, 1);
        assert!(outer.span.contains(&inner.span));
        assert_eq!(outer.full_text(text), text);
        assert_eq!(inner.inner_text(text), "y\n");
    }

    #[test]
    fn test_cascading_closure() {
        // one region closing three levels in a row
        let text = "// #ifdef A\n// #ifdef B\n// #ifdef C\nc\n// #endif\n// #endif\n// #endif\ntail\n";
        let res = resolve_line(text, &defs(&[("A", true), ("B", true), ("C", true)])).unwrap();
        let levels: Vec<usize> = res.regions.iter().map(|r| r.level).collect();
        assert_eq!(levels, vec![0, 1, 2]);
        assert_eq!(rewrite(text, &res.regions), "c\ntail\n");
    }

    #[test]
    fn test_partial_cascade_then_sibling() {
        let text = "// #ifdef A\n// #ifdef B\nb\n// #endif\n// #ifdef C\nc\n// #endif\n// #endif\n";
        let res = resolve_line(text, &defs(&[("A", true), ("B", false), ("C", true)])).unwrap();
        let levels: Vec<usize> = res.regions.iter().map(|r| r.level).collect();
        assert_eq!(levels, vec![0, 1, 1]);
        assert_eq!(rewrite(text, &res.regions), "c\n");
    }

    #[test]
    fn test_outer_false_drops_true_child() {
        let text = "head\n// #ifdef A\nx\n// #ifdef B\nX\n// #endif\n// #endif\ntail\n";
        let res = resolve_line(text, &defs(&[("A", false), ("B", true)])).unwrap();
        assert_eq!(rewrite(text, &res.regions), "head\ntail\n");
    }

    #[test]
    fn test_outer_true_inner_false() {
        let text = "// #ifdef A\nx\n// #ifdef B\nX\n// #endif\ny\n// #endif\n";
        let res = resolve_line(text, &defs(&[("A", true), ("B", false)])).unwrap();
        assert_eq!(rewrite(text, &res.regions), "x\ny\n");
    }

    #[test]
    fn test_duplicate_region_text_is_replaced_by_position() {
        let text = "// #ifdef A\nsame\n// #endif\n// #ifndef A\nsame\n// #endif\n// #ifdef A\nsame\n// #endif\n";
        let res = resolve_line(text, &defs(&[("A", true)])).unwrap();
        assert_eq!(rewrite(text, &res.regions), "same\nsame\n");
    }

    #[test]
    fn test_imbalance_is_an_error() {
        let text = "// #ifdef A\n// #ifdef B\n// #endif\n";
        let err = resolve_line(text, &defs(&[])).unwrap_err();
        match err.kind {
            ErrorKind::ImbalancedMarkers { starts, ends, .. } => {
                assert_eq!((starts, ends), (2, 1));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_end_before_start_is_stray() {
        let text = "// #endif\n// #ifdef A\nx\n";
        let err = resolve_line(text, &defs(&[])).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::StrayEndMarker { .. }));
    }

    #[test]
    fn test_interleaved_unbalanced_order_is_rejected() {
        // balanced counts, but the second pair is reversed
        let text = "// #ifdef A\na\n// #endif\n// #endif\n// #ifdef B\nb\n";
        assert!(resolve_line(text, &defs(&[])).is_err());
    }

    #[test]
    fn test_malformed_condition_is_false_with_diagnostic() {
        let text = "// #ifndef (A\nx\n// #endif\ny\n";
        let res = resolve_line(text, &defs(&[])).unwrap();
        assert!(!res.regions[0].result);
        assert_eq!(res.diagnostics.len(), 1);
        assert_eq!(res.diagnostics[0].source_info.source.name(), "t.js");
        assert_eq!(rewrite(text, &res.regions), "y\n");
    }

    #[test]
    fn test_apply_family_leaves_text_on_error() {
        let text = "// #ifdef A\n// #ifdef B\nx\n// #endif\n";
        let (out, diags) = apply_family(SyntaxFamily::Line, text, &defs(&[]), "t.js");
        assert_eq!(out, text);
        assert_eq!(diags.len(), 1);
    }
}
