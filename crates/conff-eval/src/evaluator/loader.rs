// crates/conff-eval/src/evaluator/loader.rs

use std::path::{Path, PathBuf};

use super::errors::LoadError;
use crate::types::Value;

/// A parsed document together with the file it came from, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    /// Canonical location, used for cycle detection and relative imports.
    pub path: Option<PathBuf>,
    pub value: Value,
}

/// Source of documents named by `import` directives.
pub trait DocumentLoader {
    /// `relative_to` is the directory of the importing document.
    fn load(&self, reference: &str, relative_to: Option<&Path>) -> Result<LoadedDocument, LoadError>;
}

/// Loads YAML or JSON files from disk.
#[derive(Debug, Clone, Default)]
pub struct FsLoader {
    include_paths: Vec<PathBuf>,
}

impl FsLoader {
    pub fn new(include_paths: Vec<PathBuf>) -> Self {
        FsLoader { include_paths }
    }

    fn find_file(&self, reference: &str, relative_to: Option<&Path>) -> Option<PathBuf> {
        let p = Path::new(reference);
        if p.is_absolute() {
            return p.is_file().then(|| p.to_path_buf());
        }
        relative_to
            .into_iter()
            .chain(self.include_paths.iter().map(PathBuf::as_path))
            .map(|dir| dir.join(reference))
            .find(|candidate| candidate.is_file())
    }
}

impl DocumentLoader for FsLoader {
    fn load(&self, reference: &str, relative_to: Option<&Path>) -> Result<LoadedDocument, LoadError> {
        let path = self
            .find_file(reference, relative_to)
            .ok_or_else(|| LoadError::NotFound(reference.to_string()))?;
        read_document(&path)
    }
}

/// Read and parse one file. `.json` goes through serde_json, everything else
/// through serde_yaml. An empty file is `Null`.
pub fn read_document(path: &Path) -> Result<LoadedDocument, LoadError> {
    let canonical = path.canonicalize().map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = std::fs::read_to_string(&canonical).map_err(|source| LoadError::Io {
        path: canonical.clone(),
        source,
    })?;
    let is_json = canonical
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let value = if is_json {
        parse_json(&text, &canonical)?
    } else {
        parse_yaml(&text, &canonical)?
    };
    log::debug!("loaded {}", canonical.display());
    Ok(LoadedDocument {
        path: Some(canonical),
        value,
    })
}

pub fn parse_yaml(text: &str, origin: &Path) -> Result<Value, LoadError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_yaml::from_str(text).map_err(|source| LoadError::Yaml {
        path: origin.to_path_buf(),
        source,
    })
}

pub fn parse_json(text: &str, origin: &Path) -> Result<Value, LoadError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|source| LoadError::Json {
        path: origin.to_path_buf(),
        source,
    })
}
