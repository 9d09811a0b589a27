//! The region-ifdef Command-Line Interface.
//!
//! This module is the main entry point for all CLI commands and orchestrates
//! the core library functions.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    process,
};

use clap::{Args, Parser, Subcommand};
use walkdir::WalkDir;

use crate::{
    config::{Config, ConfigBuilder},
    diagnostics::{CountingSink, DiagnosticSink, StderrSink},
    engine::{inspect_source, Transformer},
    errors::{print_error, unspanned, ErrorKind, ErrorReporting, IfdefError, ReportContext},
    markers::MarkerKind,
    runtime::{evaluate, evaluate_value},
};

pub mod output;

use output::ProcessSummary;

// ============================================================================
// CLI ARGUMENTS - Command-line argument definitions
// ============================================================================

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "region-ifdef",
    version,
    about = "Strip or keep #ifdef regions written in comments, driven by env definitions."
)]
pub struct IfdefArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: ArgsCommand,
}

/// Options that shape the [`Config`], shared by every subcommand.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Define KEY (as true) or KEY=VALUE; repeatable, applied last.
    #[arg(short = 'D', long = "define", value_name = "KEY[=VALUE]", global = true)]
    pub defines: Vec<String>,

    /// Mode selecting the `.env.<mode>` files (default: NODE_ENV or development).
    #[arg(long, global = true)]
    pub mode: Option<String>,

    /// Directory to read `.env*` files from (default: current directory).
    #[arg(long, value_name = "DIR", global = true)]
    pub env_dir: Option<PathBuf>,

    /// Options file (.json, .yaml or .yml).
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub options_file: Option<PathBuf>,

    /// Include glob; repeatable. Replaces the configured include list.
    #[arg(long, value_name = "GLOB", global = true)]
    pub include: Vec<String>,

    /// Exclude glob; repeatable. Replaces the configured exclude list.
    #[arg(long, value_name = "GLOB", global = true)]
    pub exclude: Vec<String>,

    /// Do not layer the process environment into the definitions.
    #[arg(long, global = true)]
    pub no_process_env: bool,

    /// Exit with status 1 when any diagnostic is produced.
    #[arg(long, global = true)]
    pub strict: bool,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum ArgsCommand {
    /// Transform one file and print the result.
    Transform {
        /// The file to transform.
        #[arg(required = true)]
        file: PathBuf,
        /// Write the result back to the file instead of printing it.
        #[arg(long)]
        in_place: bool,
    },
    /// Transform every selected file of a directory into a mirrored tree.
    Process {
        /// The directory to read.
        src_dir: PathBuf,
        /// The directory to write; created if missing.
        out_dir: PathBuf,
    },
    /// List the regions of a file, per comment style.
    Regions {
        /// The file to inspect.
        #[arg(required = true)]
        file: PathBuf,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Evaluate a condition against the current definitions.
    Eval {
        /// The condition, e.g. "DEBUG && PLATFORM == 'h5'".
        expression: String,
        /// Apply the #ifndef negation to the outcome.
        #[arg(long)]
        ifndef: bool,
    },
    /// Show what a transform would change in a file.
    Diff {
        /// The file to diff.
        #[arg(required = true)]
        file: PathBuf,
    },
}

impl ConfigArgs {
    /// Builds the session config with `root` as the filter root.
    pub fn build(&self, root: &Path) -> Result<Config, IfdefError> {
        let mut builder = ConfigBuilder::new(root)
            .use_process_env(!self.no_process_env)
            .include(self.include.iter().cloned())
            .exclude(self.exclude.iter().cloned());

        builder = builder.env_dir(self.env_dir.clone().unwrap_or_else(|| PathBuf::from(".")));
        if let Some(mode) = &self.mode {
            builder = builder.mode(mode);
        }
        if let Some(path) = &self.options_file {
            builder = builder.options_file(path);
        }
        for define in &self.defines {
            builder = builder.define(define);
        }
        builder.build()
    }
}

// ============================================================================
// MAIN ENTRY POINT
// ============================================================================

/// The main entry point for the CLI.
pub fn run() {
    let args = IfdefArgs::parse();
    let strict = args.config.strict;
    let mut stderr = StderrSink;
    let mut sink = CountingSink::new(&mut stderr);

    let result = match &args.command {
        ArgsCommand::Transform { file, in_place } => {
            handle_transform(&args.config, file, *in_place, &mut sink)
        }
        ArgsCommand::Process { src_dir, out_dir } => {
            handle_process(&args.config, src_dir, out_dir, &mut sink)
        }
        ArgsCommand::Regions { file, json } => handle_regions(&args.config, file, *json, &mut sink),
        ArgsCommand::Eval { expression, ifndef } => handle_eval(&args.config, expression, *ifndef),
        ArgsCommand::Diff { file } => handle_diff(&args.config, file, &mut sink),
    };

    if let Err(e) = result {
        print_error(e);
        process::exit(1);
    }
    if strict && sink.count > 0 {
        process::exit(1);
    }
}

// ============================================================================
// COMMAND HANDLERS
// ============================================================================

fn handle_transform(
    args: &ConfigArgs,
    file: &Path,
    in_place: bool,
    sink: &mut dyn DiagnosticSink,
) -> Result<(), IfdefError> {
    let transformer = Transformer::new(args.build(Path::new("."))?)?;
    let source = read_file(file)?;

    let code = match transformer.transform(&source, file) {
        Some(output) => {
            output.report(sink);
            output.code
        }
        None => source,
    };

    if in_place {
        write_file(file, code.as_bytes())
    } else {
        print!("{}", code);
        Ok(())
    }
}

fn handle_process(
    args: &ConfigArgs,
    src_dir: &Path,
    out_dir: &Path,
    sink: &mut dyn DiagnosticSink,
) -> Result<(), IfdefError> {
    // Canonical roots, so `process . dist` skips its own output
    let src_root = canonical(src_dir)?;
    fs::create_dir_all(out_dir).map_err(|e| invalid_path(format!("{} ({})", out_dir.display(), e)))?;
    let out_root = canonical(out_dir)?;
    if src_root == out_root {
        return Err(invalid_path(format!(
            "{} (output directory must differ from the source directory)",
            out_dir.display()
        )));
    }

    let transformer = Transformer::new(args.build(&src_root)?)?;
    let selected: HashSet<PathBuf> = transformer
        .filter()
        .discover_excluding(&src_root, &out_root)?
        .into_iter()
        .collect();
    let mut summary = ProcessSummary::default();

    let walker = WalkDir::new(&src_root)
        .into_iter()
        .filter_entry(|entry| entry.path() != out_root.as_path());

    for entry in walker {
        let entry = entry.map_err(|e| invalid_path(format!("failed to walk directory: {}", e)))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path
            .strip_prefix(&src_root)
            .map_err(|_| invalid_path(path.display().to_string()))?;
        let target = out_root.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| invalid_path(format!("{} ({})", parent.display(), e)))?;
        }

        // Non-UTF-8 files are copied even when selected
        let text = if selected.contains(path) {
            fs::read_to_string(path).ok()
        } else {
            None
        };

        match text.and_then(|source| transformer.transform(&source, path)) {
            Some(output) => {
                summary.transformed += 1;
                summary.changed += usize::from(output.changed);
                summary.diagnostics += output.diagnostics.len();
                output.report(sink);
                write_file(&target, output.code.as_bytes())?;
            }
            None => {
                summary.copied += 1;
                fs::copy(path, &target)
                    .map_err(|e| invalid_path(format!("{} ({})", path.display(), e)))?;
            }
        }
    }

    output::print_summary(&summary);
    Ok(())
}

fn handle_regions(
    args: &ConfigArgs,
    file: &Path,
    json: bool,
    sink: &mut dyn DiagnosticSink,
) -> Result<(), IfdefError> {
    let config = args.build(Path::new("."))?;
    let source = read_file(file)?;
    let reports = inspect_source(&source, &file.to_string_lossy(), &config.definitions);

    for diagnostic in reports.iter().flat_map(|r| &r.diagnostics) {
        sink.report(diagnostic);
    }

    if json {
        let value = output::regions_json(&reports);
        let text = serde_json::to_string_pretty(&value)
            .map_err(|e| ReportContext::unsourced("cli").invalid_config(e.to_string()))?;
        println!("{}", text);
    } else {
        output::print_regions(&reports);
    }
    Ok(())
}

fn handle_eval(args: &ConfigArgs, expression: &str, ifndef: bool) -> Result<(), IfdefError> {
    let config = args.build(Path::new("."))?;
    let kind = if ifndef { MarkerKind::Ifndef } else { MarkerKind::Ifdef };

    // A condition that does not parse is the command's own input error
    let value = evaluate_value(expression, &config.definitions)?;
    let result = evaluate(kind, expression, &config.definitions)?;

    output::print_eval(&value, result);
    Ok(())
}

fn handle_diff(args: &ConfigArgs, file: &Path, sink: &mut dyn DiagnosticSink) -> Result<(), IfdefError> {
    let transformer = Transformer::new(args.build(Path::new("."))?)?;
    let source = read_file(file)?;

    if let Some(output) = transformer.transform(&source, file) {
        output.report(sink);
        output::print_file_diff(&source, &output.code);
    }
    Ok(())
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn invalid_path(path: String) -> IfdefError {
    ReportContext::unsourced("file-system").report(ErrorKind::InvalidPath { path }, unspanned())
}

fn canonical(path: &Path) -> Result<PathBuf, IfdefError> {
    path.canonicalize()
        .map_err(|error| invalid_path(format!("{} ({})", path.display(), error)))
}

fn read_file(path: &Path) -> Result<String, IfdefError> {
    fs::read_to_string(path).map_err(|error| invalid_path(format!("{} ({})", path.display(), error)))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), IfdefError> {
    fs::write(path, bytes).map_err(|error| invalid_path(format!("{} ({})", path.display(), error)))
}
