// crates/conff-cli/src/pipeline.rs

use conff_eval::conff_api;
use conff_eval::evaluator::{ConffError, ErrorLog, Evaluator};
use conff_eval::Value;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::options::{ConfigError, Options, OutputFormat};

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Conff(#[from] ConffError),

    #[error("{0} document(s) could not be resolved")]
    Unresolved(usize),

    #[error("Unknown cipher '{0}'")]
    UnknownCipher(String),

    #[error("Failed to write {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Failed to write output: {0}")]
    Stdout(#[from] io::Error),

    #[error("YAML output error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON output error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Print every logged issue as `path: cause` on stderr.
pub fn report(file: &Path, errors: &ErrorLog) {
    for entry in errors.entries() {
        eprintln!("{}: {}", file.display(), entry);
    }
}

/// Serialize resolved documents. Several documents become a YAML stream or
/// a JSON array.
pub fn render(documents: &[Value], format: OutputFormat) -> Result<String, CliError> {
    match format {
        OutputFormat::Yaml => {
            let mut parts = Vec::with_capacity(documents.len());
            for doc in documents {
                parts.push(serde_yaml::to_string(doc)?);
            }
            Ok(parts.join("---\n"))
        }
        OutputFormat::Json => {
            let mut out = match documents {
                [single] => serde_json::to_string_pretty(single)?,
                many => serde_json::to_string_pretty(many)?,
            };
            out.push('\n');
            Ok(out)
        }
    }
}

pub fn write_output(output: Option<&Path>, content: &str) -> Result<(), CliError> {
    match output {
        Some(path) => std::fs::write(path, content).map_err(|source| CliError::Write {
            path: path.to_path_buf(),
            source,
        }),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}

pub fn run(options: &Options) -> Result<(), CliError> {
    if options.generate_key {
        let key = conff_api::generate_key(&options.etype)
            .ok_or_else(|| CliError::UnknownCipher(options.etype.clone()))?;
        return write_output(options.output.as_deref(), &format!("{key}\n"));
    }

    let evaluator = Evaluator::new(options.eval_config());
    let mut documents = Vec::with_capacity(options.files.len());
    let mut unresolved = 0;
    for file in &options.files {
        log::info!("resolving {}", file.display());
        let mut errors = ErrorLog::new();
        let resolved = evaluator.run_file(file, &mut errors);
        report(file, &errors);
        match resolved? {
            Some(value) => documents.push(value),
            None => unresolved += 1,
        }
    }
    if unresolved > 0 {
        return Err(CliError::Unresolved(unresolved));
    }

    let rendered = render(&documents, options.format)?;
    write_output(options.output.as_deref(), &rendered)
}
