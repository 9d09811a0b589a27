//! Configuration.
//!
//! Builds the immutable [`Config`] a session runs with: which files are
//! transformed and the [`Definitions`] their conditions see. Definitions are
//! layered, later layers overriding earlier ones:
//!
//! 1. `.env`, `.env.local`, `.env.<mode>`, `.env.<mode>.local`
//! 2. the process environment (opt-in)
//! 3. the options file, top-level keys first and then its `env` map
//! 4. command-line defines

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{
    errors::{unspanned, ErrorKind, ErrorReporting, IfdefError, ReportContext},
    runtime::{Definitions, Value},
};

pub const DEFAULT_MODE: &str = "development";

/// Include patterns used when nothing else is configured.
pub fn default_include() -> Vec<String> {
    vec!["**/*".to_string()]
}

/// Exclude patterns used when nothing else is configured.
pub fn default_exclude() -> Vec<String> {
    vec!["**/node_modules/**".to_string(), "**/.git/**".to_string()]
}

/// Session configuration. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory relative paths are resolved against.
    pub root: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub definitions: Definitions,
    pub mode: String,
}

impl Config {
    /// Defaults with the given definitions; nothing is read from disk.
    pub fn with_definitions(definitions: Definitions) -> Self {
        Self {
            root: PathBuf::from("."),
            include: default_include(),
            exclude: default_exclude(),
            definitions,
            mode: DEFAULT_MODE.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::with_definitions(Definitions::new())
    }
}

// ============================================================================
// OPTIONS FILE
// ============================================================================

/// The options file as written by the user (JSON or YAML).
#[derive(Debug, Default, Deserialize)]
pub struct OptionsFile {
    #[serde(default)]
    pub include: Option<Vec<String>>,
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub env: HashMap<String, serde_json::Value>,
    /// Every other top-level key.
    #[serde(flatten)]
    pub definitions: HashMap<String, serde_json::Value>,
}

impl OptionsFile {
    /// Loads an options file, picking the format from its extension.
    pub fn load(path: &Path) -> Result<Self, IfdefError> {
        let ctx = ReportContext::unsourced("config");
        let content = read_config_file(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();

        match ext {
            "json" => serde_json::from_str(&content)
                .map_err(|e| ctx.invalid_config(format!("{}: {}", path.display(), e))),
            "yaml" | "yml" => serde_yaml::from_str(&content)
                .map_err(|e| ctx.invalid_config(format!("{}: {}", path.display(), e))),
            other => Err(ctx.invalid_config(format!(
                "{}: unsupported options file extension `{}`, expected json, yaml or yml",
                path.display(),
                other
            ))),
        }
    }

    /// Top-level keys, then the `env` map on top.
    pub fn to_definitions(&self) -> Definitions {
        let mut defs: Definitions = self
            .definitions
            .iter()
            .map(|(k, v)| (k.clone(), json_to_value(v)))
            .collect();
        defs.merge(self.env.iter().map(|(k, v)| (k.clone(), json_to_value(v))).collect());
        defs
    }
}

/// Scalars map onto [`Value`]; arrays and objects are kept as their JSON
/// text, which makes them truthy.
fn json_to_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
        serde_json::Value::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

// ============================================================================
// ENV FILES
// ============================================================================

/// Parses dotenv-style text into ordered key/value pairs.
///
/// Supports `#` comments, an `export ` prefix and single or double quoted
/// values. Double-quoted values understand `\n`.
pub fn parse_env_file(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);
        let Some((key, raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        pairs.push((key.to_string(), env_value(raw.trim())));
    }

    pairs
}

fn env_value(raw: &str) -> String {
    let quoted = |q: char| raw.len() >= 2 && raw.starts_with(q) && raw.ends_with(q);
    if quoted('"') {
        return raw[1..raw.len() - 1].replace("\\n", "\n");
    }
    if quoted('\'') {
        return raw[1..raw.len() - 1].to_string();
    }
    // unquoted: a ` #` starts a trailing comment
    match raw.find(" #") {
        Some(i) => raw[..i].trim_end().to_string(),
        None => raw.to_string(),
    }
}

/// The env files read for `mode`, in load order.
pub fn env_file_names(mode: &str) -> Vec<String> {
    vec![
        ".env".to_string(),
        ".env.local".to_string(),
        format!(".env.{}", mode),
        format!(".env.{}.local", mode),
    ]
}

/// Loads the env files for `mode` from `dir`. Missing files are skipped.
pub fn load_env_files(dir: &Path, mode: &str) -> Result<Definitions, IfdefError> {
    let mut defs = Definitions::new();
    for name in env_file_names(mode) {
        let path = dir.join(&name);
        if !path.is_file() {
            continue;
        }
        let content = read_config_file(&path)?;
        for (key, value) in parse_env_file(&content) {
            defs.insert(key, value);
        }
    }
    Ok(defs)
}

// ============================================================================
// COMMAND-LINE DEFINES
// ============================================================================

/// Parses `KEY` or `KEY=VALUE`. A bare key means `true`.
pub fn parse_define(text: &str) -> Result<(String, Value), IfdefError> {
    let (key, value) = match text.split_once('=') {
        Some((key, value)) => (key.trim(), Value::from_literal(value)),
        None => (text.trim(), Value::Bool(true)),
    };
    if key.is_empty() {
        return Err(ReportContext::unsourced("config").report(
            ErrorKind::InvalidDefinition {
                text: text.to_string(),
            },
            unspanned(),
        ));
    }
    Ok((key.to_string(), value))
}

// ============================================================================
// BUILDER
// ============================================================================

/// Assembles a [`Config`] from its layers.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    root: PathBuf,
    env_dir: Option<PathBuf>,
    mode: Option<String>,
    options_file: Option<PathBuf>,
    use_process_env: bool,
    /// Stands in for the real process environment when set.
    process_env: Option<HashMap<String, String>>,
    include: Vec<String>,
    exclude: Vec<String>,
    defines: Vec<String>,
}

impl ConfigBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Directory the env files are read from; defaults to the root.
    pub fn env_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.env_dir = Some(dir.into());
        self
    }

    pub fn mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn options_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.options_file = Some(path.into());
        self
    }

    /// Layers the process environment over the env files.
    pub fn use_process_env(mut self, enabled: bool) -> Self {
        self.use_process_env = enabled;
        self
    }

    /// Replaces the process environment seen by the builder, both for the
    /// definitions layer and for `NODE_ENV`.
    pub fn process_env<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.process_env = Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Include patterns that override the defaults and the options file.
    pub fn include(mut self, patterns: impl IntoIterator<Item = String>) -> Self {
        self.include.extend(patterns);
        self
    }

    /// Exclude patterns that override the defaults and the options file.
    pub fn exclude(mut self, patterns: impl IntoIterator<Item = String>) -> Self {
        self.exclude.extend(patterns);
        self
    }

    /// A `KEY[=VALUE]` define, applied last.
    pub fn define(mut self, text: impl Into<String>) -> Self {
        self.defines.push(text.into());
        self
    }

    pub fn build(self) -> Result<Config, IfdefError> {
        let options = match &self.options_file {
            Some(path) => OptionsFile::load(path)?,
            None => OptionsFile::default(),
        };
        let vars = self
            .process_env
            .clone()
            .unwrap_or_else(|| std::env::vars().collect());

        let mode = self
            .mode
            .clone()
            .or_else(|| options.mode.clone())
            .or_else(|| vars.get("NODE_ENV").cloned())
            .unwrap_or_else(|| DEFAULT_MODE.to_string());

        let env_dir = self.env_dir.clone().unwrap_or_else(|| self.root.clone());
        let mut definitions = load_env_files(&env_dir, &mode)?;

        if self.use_process_env {
            definitions.merge(vars.into_iter().collect());
        }

        definitions.merge(options.to_definitions());

        for text in &self.defines {
            let (key, value) = parse_define(text)?;
            definitions.insert(key, value);
        }

        let include = pick(self.include, options.include, default_include);
        let exclude = pick(self.exclude, options.exclude, default_exclude);

        Ok(Config {
            root: self.root,
            include,
            exclude,
            definitions,
            mode,
        })
    }
}

fn pick(cli: Vec<String>, file: Option<Vec<String>>, default: fn() -> Vec<String>) -> Vec<String> {
    if !cli.is_empty() {
        cli
    } else {
        file.unwrap_or_else(default)
    }
}

fn read_config_file(path: &Path) -> Result<String, IfdefError> {
    fs::read_to_string(path).map_err(|error| {
        ReportContext::unsourced("config").report(
            ErrorKind::InvalidPath {
                path: format!("{} ({})", path.display(), error),
            },
            unspanned(),
        )
    })
}
