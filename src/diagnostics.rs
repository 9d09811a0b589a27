//! Diagnostic sinks.
//!
//! The transform pipeline never prints. It hands its diagnostics to a
//! [`DiagnosticSink`], and the host decides where they go: stderr for the
//! CLI, a buffer for tests and embedders, nowhere at all.

use miette::Report;

use crate::errors::IfdefError;

/// Receives the diagnostics of a transform.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: &IfdefError);
}

/// Renders each diagnostic as a miette report on stderr.
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn report(&mut self, diagnostic: &IfdefError) {
        eprintln!("{:?}", Report::new(diagnostic.clone()));
    }
}

/// Collects rendered diagnostics for testing or programmatic capture.
#[derive(Debug, Default)]
pub struct BufferSink {
    pub messages: Vec<String>,
    pub codes: Vec<String>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl DiagnosticSink for BufferSink {
    fn report(&mut self, diagnostic: &IfdefError) {
        self.messages.push(diagnostic.to_string());
        self.codes.push(diagnostic.diagnostic_info.error_code.clone());
    }
}

/// A sink that drops everything.
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn report(&mut self, _diagnostic: &IfdefError) {}
}

/// Counts what passes through while forwarding to another sink.
pub struct CountingSink<'a> {
    inner: &'a mut dyn DiagnosticSink,
    pub count: usize,
}

impl<'a> CountingSink<'a> {
    pub fn new(inner: &'a mut dyn DiagnosticSink) -> Self {
        Self { inner, count: 0 }
    }
}

impl DiagnosticSink for CountingSink<'_> {
    fn report(&mut self, diagnostic: &IfdefError) {
        self.count += 1;
        self.inner.report(diagnostic);
    }
}
