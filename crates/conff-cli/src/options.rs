// crates/conff-cli/src/options.rs

use clap::{ArgAction, Parser, ValueEnum};
use conff_eval::evaluator::{EvalConfig, Posture, DEFAULT_ETYPE};
use conff_eval::{Mapping, Value};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "conff.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Expected KEY=VALUE, got '{0}'")]
    Assignment(String),

    #[error("Unknown output format '{0}'")]
    Format(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            "json" => Ok(OutputFormat::Json),
            _ => Err(ConfigError::Format(s.to_string())),
        }
    }
}

/// Configuration that can be loaded from `conff.toml`
#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    // Path handling
    pub include: Option<String>,
    pub pathsep: Option<String>,

    // Encryption
    pub etype: Option<String>,
    pub ekey: Option<String>,

    // Output
    pub format: Option<String>,
    pub strict: Option<bool>,

    #[serde(default)]
    pub params: Mapping,
    #[serde(default)]
    pub names: Mapping,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Like [`FileConfig::from_file`], but a missing file is `None`.
    pub fn from_file_if_exists(path: &Path) -> Result<Option<Self>, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Some(toml::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConfigError::Io(e)),
        }
    }
}

#[derive(Parser, Debug, Default)]
#[command(
    name = "conff",
    about = "Resolve expressions, merges and foreach blocks in YAML/JSON configuration"
)]
pub struct Args {
    /// Documents to resolve
    #[arg(
        required_unless_present = "generate_key",
        help = "One or more YAML or JSON documents"
    )]
    pub files: Vec<PathBuf>,

    /// Parameters exposed as `P`
    #[arg(
        long = "param",
        value_name = "KEY=VALUE",
        action = ArgAction::Append,
        help = "Parameter visible as P.KEY; VALUE is read as a YAML scalar"
    )]
    pub params: Vec<String>,

    /// Free names visible to every expression
    #[arg(
        long = "name",
        value_name = "KEY=VALUE",
        action = ArgAction::Append,
        help = "Name visible to expressions; VALUE is read as a YAML scalar"
    )]
    pub names: Vec<String>,

    /// Encryption key
    #[arg(long, help = "Key used by F.encrypt and F.decrypt")]
    pub ekey: Option<String>,

    /// Cipher tag
    #[arg(long, help = "Cipher used by F.encrypt and F.decrypt (default: fernet)")]
    pub etype: Option<String>,

    /// Separated list of import search paths
    #[arg(long, help = "Pathsep-separated list of import search paths")]
    pub include: Option<String>,

    /// Path separator for include paths
    #[arg(
        long = "pathsep",
        help = "Path separator character (; on Windows, : on Unix-like systems)"
    )]
    pub pathsep: Option<String>,

    #[arg(long, value_enum, help = "Output format (default: yaml)")]
    pub format: Option<OutputFormat>,

    #[arg(short, long, help = "Write the result to this file instead of stdout")]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Abort with the error message on the first fatal error")]
    pub strict: bool,

    #[arg(long = "generate-key", help = "Print a fresh key for --etype and exit")]
    pub generate_key: bool,

    /// Config file path
    #[arg(long, help = "Path to config file (default: ./conff.toml if present)")]
    pub config: Option<PathBuf>,

    #[arg(short, long, action = ArgAction::Count, help = "More log output (-v, -vv, -vvv)")]
    pub verbose: u8,
}

#[derive(Debug)]
pub struct Options {
    pub files: Vec<PathBuf>,
    pub params: Mapping,
    pub names: Mapping,
    pub include_paths: Vec<PathBuf>,
    pub etype: String,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub strict: bool,
    pub generate_key: bool,
}

fn default_pathsep() -> String {
    if cfg!(windows) {
        ";".into()
    } else {
        ":".into()
    }
}

/// Split `KEY=VALUE`; the value is read as a YAML scalar (`3` is a number,
/// `true` a bool, anything unparsable stays a string).
pub fn parse_assignment(raw: &str) -> Result<(String, Value), ConfigError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| ConfigError::Assignment(raw.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(ConfigError::Assignment(raw.to_string()));
    }
    if value.trim().is_empty() {
        return Ok((key.to_string(), Value::Str(value.to_string())));
    }
    let value = match serde_yaml::from_str::<Value>(value) {
        Ok(v @ (Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_))) => v,
        _ => Value::Str(value.to_string()),
    };
    Ok((key.to_string(), value))
}

impl Options {
    pub fn from_args_and_config(args: Args) -> Result<Self, ConfigError> {
        let file_config = match args.config.as_ref() {
            Some(path) => FileConfig::from_file(path)?,
            None => FileConfig::from_file_if_exists(Path::new(DEFAULT_CONFIG_FILE))?
                .unwrap_or_default(),
        };

        // Command line args take precedence over config file
        let mut params = file_config.params;
        for raw in &args.params {
            let (key, value) = parse_assignment(raw)?;
            params.insert(key, value);
        }
        let mut names = file_config.names;
        for raw in &args.names {
            let (key, value) = parse_assignment(raw)?;
            names.insert(key, value);
        }

        let etype = args
            .etype
            .or(file_config.etype)
            .or_else(|| params.get("etype").and_then(Value::as_str).map(String::from))
            .unwrap_or_else(|| DEFAULT_ETYPE.to_string());
        params.insert("etype".to_string(), Value::Str(etype.clone()));
        if let Some(ekey) = args.ekey.or(file_config.ekey) {
            params.insert("ekey".to_string(), Value::Str(ekey));
        }

        let pathsep = args
            .pathsep
            .or(file_config.pathsep)
            .unwrap_or_else(default_pathsep);
        let include = args
            .include
            .or(file_config.include)
            .unwrap_or_else(|| ".".into());
        let include_paths = include
            .split(pathsep.as_str())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .collect();

        let format = match (args.format, file_config.format) {
            (Some(format), _) => format,
            (None, Some(name)) => name.parse()?,
            (None, None) => OutputFormat::default(),
        };

        Ok(Self {
            files: args.files,
            params,
            names,
            include_paths,
            etype,
            format,
            output: args.output,
            strict: args.strict || file_config.strict.unwrap_or(false),
            generate_key: args.generate_key,
        })
    }

    pub fn eval_config(&self) -> EvalConfig {
        EvalConfig {
            names: self.names.clone(),
            params: self.params.clone(),
            include_paths: self.include_paths.clone(),
            posture: if self.strict {
                Posture::Strict
            } else {
                Posture::Tolerant
            },
        }
    }
}
