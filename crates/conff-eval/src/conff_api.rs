// crates/conff-eval/src/conff_api.rs

use std::path::Path;

use crate::evaluator::crypto::{self, CryptoContext};
use crate::evaluator::{ConffError, ErrorLog, EvalConfig, EvalResult, Evaluator, Posture};
use crate::types::{Mapping, Value};

/// Load and resolve `path`. A fatal error is recorded in `errors` and gives `None`.
pub fn load(path: &Path, config: EvalConfig, errors: &mut ErrorLog) -> Option<Value> {
    let config = EvalConfig {
        posture: Posture::Tolerant,
        ..config
    };
    Evaluator::new(config)
        .run_file(path, errors)
        .ok()
        .flatten()
}

pub fn load_strict(path: &Path, config: EvalConfig, errors: &mut ErrorLog) -> Result<Value, ConffError> {
    Evaluator::new(config).parse_file(path, errors)
}

/// Resolve YAML or JSON text. A fatal error is recorded in `errors` and gives `None`.
pub fn parse(source: &str, config: EvalConfig, errors: &mut ErrorLog) -> Option<Value> {
    let evaluator = Evaluator::new(config);
    match evaluator.parse_text(source, errors) {
        Ok(value) => Some(value),
        Err(ConffError::Structural(e)) => {
            log::error!("{e}");
            errors.record_fatal(e);
            None
        }
        Err(e) => {
            log::error!("{e}");
            None
        }
    }
}

pub fn parse_strict(source: &str, config: EvalConfig, errors: &mut ErrorLog) -> Result<Value, ConffError> {
    Evaluator::new(config).parse_text(source, errors)
}

/// Fresh key for the cipher named by `etype`.
pub fn generate_key(etype: &str) -> Option<String> {
    crypto::generate_key(etype)
}

/// Encrypt with the cipher and key found in `params` (`etype`, `ekey`).
pub fn encrypt(params: &Mapping, plaintext: &str) -> EvalResult<String> {
    context(params)?.encrypt(plaintext)
}

pub fn decrypt(params: &Mapping, token: &str) -> EvalResult<String> {
    context(params)?.decrypt(token)
}

fn context(params: &Mapping) -> EvalResult<CryptoContext> {
    if params.get("ekey").and_then(Value::as_str).is_none() {
        return Err(crate::evaluator::EvalError::Crypto(
            "params carry no 'ekey'".into(),
        ));
    }
    Ok(CryptoContext::from_params(params))
}
