//! region-ifdef Error Handling - Unified Encapsulated API
//!
//! Every failure mode of the crate, from an unbalanced marker pair to an
//! unreadable config file, is an [`IfdefError`]. None of them stop a build:
//! the pipeline turns them into diagnostics and keeps going.

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::markers::SyntaxFamily;
use crate::syntax::Span;

// ============================================================================
// SOURCE CONTEXT - Error reporting infrastructure
// ============================================================================

/// Named source text that errors point into.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: String,
}

impl SourceContext {
    /// Create a source context from real file content
    pub fn from_file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Convert to NamedSource for use with miette error reporting
    pub fn to_named_source(&self) -> Arc<NamedSource<String>> {
        Arc::new(NamedSource::new(self.name.clone(), self.content.clone()))
    }
}

/// The single error type
#[derive(Debug, Clone)]
pub struct IfdefError {
    /// What went wrong
    pub kind: ErrorKind,
    /// Where it happened
    pub source_info: SourceInfo,
    /// How to help
    pub diagnostic_info: DiagnosticInfo,
}

/// All error kinds as a clean enum
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    // Marker structure
    #[error("imbalanced {family} markers in {path}: {starts} start marker(s), {ends} end marker(s)")]
    ImbalancedMarkers {
        family: SyntaxFamily,
        path: String,
        starts: usize,
        ends: usize,
    },
    #[error("{family} end marker in {path} does not close any open region")]
    StrayEndMarker { family: SyntaxFamily, path: String },
    #[error("{family} region in {path} is never closed")]
    UnclosedRegion { family: SyntaxFamily, path: String },

    // Conditions
    #[error("malformed condition `{expression}`: {reason}")]
    MalformedCondition { expression: String, reason: String },

    // Configuration and file selection
    #[error("invalid glob pattern `{pattern}`: {reason}")]
    InvalidGlob { pattern: String, reason: String },
    #[error("invalid path '{path}'")]
    InvalidPath { path: String },
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
    #[error("invalid definition `{text}`, expected KEY or KEY=VALUE")]
    InvalidDefinition { text: String },
}

/// Context-specific source information
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub source: Arc<NamedSource<String>>,
    pub primary_span: SourceSpan,
    pub phase: String,
}

/// Diagnostic enhancement data
#[derive(Debug, Clone)]
pub struct DiagnosticInfo {
    pub help: Option<String>,
    pub error_code: String,
}

/// Context-aware error creation - each context knows how to create appropriate errors
pub trait ErrorReporting {
    /// Create an error with context-appropriate enhancements
    fn report(&self, kind: ErrorKind, span: SourceSpan) -> IfdefError;

    fn malformed_condition(&self, expression: &str, reason: &str, span: SourceSpan) -> IfdefError {
        self.report(
            ErrorKind::MalformedCondition {
                expression: expression.into(),
                reason: reason.into(),
            },
            span,
        )
    }

    fn invalid_config(&self, message: impl Into<String>) -> IfdefError {
        self.report(
            ErrorKind::InvalidConfig {
                message: message.into(),
            },
            unspanned(),
        )
    }
}

impl ErrorKind {
    /// Get the error category for test assertions
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ImbalancedMarkers { .. }
            | Self::StrayEndMarker { .. }
            | Self::UnclosedRegion { .. } => ErrorCategory::Marker,

            Self::MalformedCondition { .. } => ErrorCategory::Condition,

            Self::InvalidGlob { .. }
            | Self::InvalidPath { .. }
            | Self::InvalidConfig { .. }
            | Self::InvalidDefinition { .. } => ErrorCategory::Config,
        }
    }

    /// Get error code suffix for diagnostic codes
    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::ImbalancedMarkers { .. } => "imbalanced_markers",
            Self::StrayEndMarker { .. } => "stray_end_marker",
            Self::UnclosedRegion { .. } => "unclosed_region",
            Self::MalformedCondition { .. } => "malformed_condition",
            Self::InvalidGlob { .. } => "invalid_glob",
            Self::InvalidPath { .. } => "invalid_path",
            Self::InvalidConfig { .. } => "invalid_config",
            Self::InvalidDefinition { .. } => "invalid_definition",
        }
    }

    fn default_help(&self) -> Option<String> {
        match self {
            Self::ImbalancedMarkers { .. } | Self::StrayEndMarker { .. } | Self::UnclosedRegion { .. } => Some(
                "every #ifdef/#ifndef needs exactly one matching #endif in the same comment style; this comment style was left untouched".into(),
            ),
            Self::MalformedCondition { .. } => {
                Some("the region was excluded; fix the condition to include it".into())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Marker,
    Condition,
    Config,
}

impl IfdefError {
    /// Shifts this error onto a larger source, e.g. from a condition string
    /// into the file that contains it.
    pub fn with_source(mut self, source: &SourceContext, offset: usize) -> Self {
        let span = self.source_info.primary_span;
        self.source_info.source = source.to_named_source();
        self.source_info.primary_span = SourceSpan::from((span.offset() + offset, span.len()));
        self
    }

    fn primary_label(&self) -> String {
        match &self.kind {
            ErrorKind::ImbalancedMarkers { .. } => "first marker of this style".into(),
            ErrorKind::StrayEndMarker { .. } => "nothing to close here".into(),
            ErrorKind::UnclosedRegion { .. } => "opened here".into(),
            ErrorKind::MalformedCondition { .. } => "syntax error".into(),
            ErrorKind::InvalidGlob { .. } => "invalid glob".into(),
            ErrorKind::InvalidPath { .. } => "invalid path".into(),
            ErrorKind::InvalidConfig { .. } => "invalid configuration".into(),
            ErrorKind::InvalidDefinition { .. } => "invalid definition".into(),
        }
    }
}

impl std::error::Error for IfdefError {}

impl fmt::Display for IfdefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl Diagnostic for IfdefError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(&self.diagnostic_info.error_code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diagnostic_info
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display + 'a>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        if self.source_info.source.inner().is_empty() {
            return None;
        }
        let labels = vec![LabeledSpan::new_with_span(
            Some(self.primary_label()),
            self.source_info.primary_span,
        )];
        Some(Box::new(labels.into_iter()))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&*self.source_info.source)
    }
}

/// Creates a placeholder span for errors not tied to a source location,
/// such as I/O or configuration failures.
pub fn unspanned() -> SourceSpan {
    SourceSpan::from(0..0)
}

/// Converts a crate [`Span`] to a miette SourceSpan.
pub fn to_source_span(span: Span) -> SourceSpan {
    SourceSpan::from(span.start..span.end)
}

/// General-purpose error creation context: a source plus the pipeline phase
/// that is reporting.
pub struct ReportContext {
    pub source: SourceContext,
    pub phase: String,
}

impl ReportContext {
    pub fn new(source: SourceContext, phase: impl Into<String>) -> Self {
        Self {
            source,
            phase: phase.into(),
        }
    }

    /// A context for failures that have no source text (I/O, config).
    pub fn unsourced(phase: impl Into<String>) -> Self {
        Self::new(SourceContext::from_file("", ""), phase)
    }
}

impl ErrorReporting for ReportContext {
    fn report(&self, kind: ErrorKind, span: SourceSpan) -> IfdefError {
        let error_code = format!("region_ifdef::{}::{}", self.phase, kind.code_suffix());
        let help = kind.default_help();

        IfdefError {
            kind,
            source_info: SourceInfo {
                source: self.source.to_named_source(),
                primary_span: span,
                phase: self.phase.clone(),
            },
            diagnostic_info: DiagnosticInfo { help, error_code },
        }
    }
}

// ============================================================================
// ERROR FORMATTING UTILITIES
// ============================================================================

/// Prints an IfdefError with full miette diagnostics
pub fn print_error(error: IfdefError) {
    use miette::Report;
    let report = Report::new(error);
    eprintln!("{report:?}");
}
