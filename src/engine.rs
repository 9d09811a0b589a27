//! Transform pipeline.
//!
//! Runs the three marker families over a source buffer in
//! [`SyntaxFamily::PASS_ORDER`], each pass seeing the previous pass's output.
//! Nothing in here reads files or prints; hosts feed text in and route the
//! diagnostics to a [`DiagnosticSink`].

use std::path::{Path, PathBuf};

use crate::{
    config::Config,
    diagnostics::DiagnosticSink,
    errors::{IfdefError, SourceContext},
    filter::FileFilter,
    markers::{self, SyntaxFamily},
    resolver::{self, Region, Resolution},
    runtime::Definitions,
};

// ============================================================================
// TRANSFORM OUTPUT
// ============================================================================

/// Result of transforming one source buffer.
#[derive(Debug)]
pub struct TransformOutput {
    /// The rewritten text.
    pub code: String,
    /// Everything reported along the way; never fatal.
    pub diagnostics: Vec<IfdefError>,
    /// Whether `code` differs from the input.
    pub changed: bool,
}

impl TransformOutput {
    /// Forwards every diagnostic to `sink`, in the order they were raised.
    pub fn report(&self, sink: &mut dyn DiagnosticSink) {
        for diagnostic in &self.diagnostics {
            sink.report(diagnostic);
        }
    }

    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Applies every family pass to `source`.
///
/// Diagnostics from a pass never stop later passes: a family with broken
/// markers is left as it was and the next family still runs.
pub fn transform_source(source: &str, path: &str, definitions: &Definitions) -> TransformOutput {
    let mut code = source.to_string();
    let mut diagnostics = Vec::new();

    for family in SyntaxFamily::PASS_ORDER {
        let (next, mut found) = resolver::apply_family(family, &code, definitions, path);
        code = next;
        diagnostics.append(&mut found);
    }

    let changed = code != source;
    TransformOutput {
        code,
        diagnostics,
        changed,
    }
}

/// Resolved regions of one family, for inspection.
#[derive(Debug)]
pub struct FamilyReport {
    pub family: SyntaxFamily,
    /// The text this family was resolved against (the output of earlier passes).
    pub text: String,
    pub regions: Vec<Region>,
    pub diagnostics: Vec<IfdefError>,
}

/// Resolves each family in pass order without keeping the rewrite, so that
/// a caller can see what every pass would do.
///
/// Families are still resolved against the rewritten output of earlier
/// passes, exactly as [`transform_source`] sees them.
pub fn inspect_source(source: &str, path: &str, definitions: &Definitions) -> Vec<FamilyReport> {
    let mut text = source.to_string();
    let mut reports = Vec::new();

    for family in SyntaxFamily::PASS_ORDER {
        let (starts, ends) = markers::locate(family, &text);
        let context = SourceContext::from_file(path, text.clone());
        let (regions, diagnostics, next) =
            match resolver::resolve(family, &starts, &ends, definitions, &context) {
                Ok(Resolution { regions, diagnostics }) => {
                    let next = resolver::rewrite(&text, &regions);
                    (regions, diagnostics, next)
                }
                Err(error) => (Vec::new(), vec![error], text.clone()),
            };

        reports.push(FamilyReport {
            family,
            text: std::mem::replace(&mut text, next),
            regions,
            diagnostics,
        });
    }

    reports
}

// ============================================================================
// TRANSFORMER - filter-aware entry points
// ============================================================================

/// A configured transformer: definitions plus file selection.
///
/// Built once per session from an immutable [`Config`] and reused for every
/// file.
#[derive(Debug, Clone)]
pub struct Transformer {
    config: Config,
    filter: FileFilter,
}

impl Transformer {
    pub fn new(config: Config) -> Result<Self, IfdefError> {
        let filter = FileFilter::new(config.root.clone(), &config.include, &config.exclude)?;
        Ok(Self { config, filter })
    }

    pub fn filter(&self) -> &FileFilter {
        &self.filter
    }

    /// Whether `path` is selected for transformation.
    pub fn selects(&self, path: impl AsRef<Path>) -> bool {
        self.filter.matches(path)
    }

    /// Transforms a module's source. `None` means the file is not selected
    /// and passes through untouched.
    pub fn transform(&self, source: &str, path: impl AsRef<Path>) -> Option<TransformOutput> {
        let path = path.as_ref();
        if !self.selects(path) {
            return None;
        }
        Some(transform_source(source, &path.to_string_lossy(), &self.config.definitions))
    }

    /// Transforms an HTML entry document, returning the rewritten text.
    ///
    /// A filtered-out document comes back unchanged; diagnostics go to `sink`.
    pub fn transform_html(&self, html: &str, path: impl AsRef<Path>, sink: &mut dyn DiagnosticSink) -> String {
        match self.transform(html, path) {
            Some(output) => {
                output.report(sink);
                output.code
            }
            None => html.to_string(),
        }
    }

    /// Lists the selected files under `dir`.
    pub fn discover(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, IfdefError> {
        self.filter.discover(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{BufferSink, CountingSink, NullSink};
    use crate::runtime::Value;

    fn defs(pairs: &[(&str, bool)]) -> Definitions {
        pairs.iter().map(|(k, v)| (*k, Value::Bool(*v))).collect()
    }

    #[test]
    fn test_transform_source_runs_all_families() {
        let src = "<!-- #ifdef A -->\n<a/>\n<!-- #endif -->\n// #ifdef B\nb();\n// #endif\n/* #ifndef A */\n.c{}\n/* #endif */\n";
        let out = transform_source(src, "page.vue", &defs(&[("A", true)]));
        assert_eq!(out.code, "<a/>\n");
        assert!(out.changed);
        assert!(!out.has_diagnostics());
    }

    #[test]
    fn test_broken_family_does_not_block_the_next() {
        let src = "// #ifdef A\nx\n/* #ifdef A */\ny\n/* #endif */\n";
        let out = transform_source(src, "a.js", &defs(&[("A", true)]));
        assert_eq!(out.code, "// #ifdef A\nx\ny\n");
        assert_eq!(out.diagnostics.len(), 1);
        let mut sink = BufferSink::new();
        out.report(&mut sink);
        assert!(sink.codes[0].ends_with("imbalanced_markers"));
    }

    #[test]
    fn test_unchanged_source() {
        let out = transform_source("plain text\n", "a.txt", &Definitions::new());
        assert!(!out.changed);
        assert_eq!(out.code, "plain text\n");
    }

    #[test]
    fn test_transform_html_keeps_broken_document() {
        let transformer = Transformer::new(Config::with_definitions(defs(&[("MP", false)]))).unwrap();
        let html = "<head>\n<!-- #ifdef MP -->\n<script></script>\n</head>\n";
        let mut null = NullSink;
        let mut sink = CountingSink::new(&mut null);
        assert_eq!(transformer.transform_html(html, "index.html", &mut sink), html);
        assert_eq!(sink.count, 1);
    }

    #[test]
    fn test_inspect_reports_each_family() {
        let src = "// #ifdef A\n<!-- #ifdef B -->\nx\n<!-- #endif -->\n// #endif\n";
        let reports = inspect_source(src, "a.html", &defs(&[("A", true)]));
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].family, SyntaxFamily::Html);
        assert_eq!(reports[0].regions.len(), 1);
        assert!(!reports[0].regions[0].result);
        assert_eq!(reports[1].text, "// #ifdef A\n// #endif\n");
        assert_eq!(reports[1].regions.len(), 1);
        assert!(reports[2].regions.is_empty());
    }
}
