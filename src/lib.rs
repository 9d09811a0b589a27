//! Comment-embedded conditional compilation.
//!
//! Source files carry `#ifdef`-style markers inside comments (`//`, `<!-- -->`
//! or `/* */`). Given a set of definitions, each marked region is either kept
//! without its markers or dropped entirely.

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod errors;
pub mod filter;
pub mod markers;
pub mod resolver;
pub mod runtime;
pub mod syntax;

pub use crate::config::{Config, ConfigBuilder};
pub use crate::diagnostics::{BufferSink, DiagnosticSink, NullSink, StderrSink};
pub use crate::engine::{transform_source, TransformOutput, Transformer};
pub use crate::errors::{ErrorKind, IfdefError};
pub use crate::markers::SyntaxFamily;
pub use crate::runtime::{Definitions, Value};
