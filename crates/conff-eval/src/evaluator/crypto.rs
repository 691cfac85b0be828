// crates/conff-eval/src/evaluator/crypto.rs

use fernet::Fernet;

use super::errors::{EvalError, EvalResult};
use crate::types::{Mapping, Value};

pub const DEFAULT_ETYPE: &str = "fernet";

/// Cipher constructions selectable through `etype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cipher {
    Fernet,
}

impl Cipher {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "fernet" => Some(Cipher::Fernet),
            _ => None,
        }
    }

    pub fn generate_key(self) -> String {
        match self {
            Cipher::Fernet => Fernet::generate_key(),
        }
    }
}

/// Fresh key for the cipher named by `etype`, or `None` for an unknown tag.
pub fn generate_key(etype: &str) -> Option<String> {
    Cipher::from_tag(etype).map(Cipher::generate_key)
}

/// Cipher tag and key used by `F.encrypt` / `F.decrypt`.
#[derive(Debug, Clone)]
pub struct CryptoContext {
    etype: String,
    key: Option<String>,
}

impl Default for CryptoContext {
    fn default() -> Self {
        CryptoContext::new(None, None)
    }
}

impl CryptoContext {
    /// A missing key is generated for the cipher; an unknown cipher leaves no key.
    pub fn new(etype: Option<&str>, key: Option<&str>) -> Self {
        let etype = etype.unwrap_or(DEFAULT_ETYPE).to_string();
        let key = match key {
            Some(k) => Some(k.to_string()),
            None => generate_key(&etype),
        };
        CryptoContext { etype, key }
    }

    /// Reads `etype` and `ekey` from a params mapping.
    pub fn from_params(params: &Mapping) -> Self {
        let etype = params.get("etype").and_then(Value::as_str);
        let key = params.get("ekey").and_then(Value::as_str);
        CryptoContext::new(etype, key)
    }

    pub fn etype(&self) -> &str {
        &self.etype
    }

    pub fn set_etype(&mut self, etype: impl Into<String>) {
        self.etype = etype.into();
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Replaces the key with a fresh one. Unknown cipher: key cleared, `None`.
    pub fn generate_key(&mut self) -> Option<String> {
        self.key = generate_key(&self.etype);
        if self.key.is_none() {
            log::warn!("unknown cipher '{}', no key generated", self.etype);
        }
        self.key.clone()
    }

    fn cipher(&self) -> EvalResult<Fernet> {
        match Cipher::from_tag(&self.etype) {
            Some(Cipher::Fernet) => {}
            None => {
                return Err(EvalError::Crypto(format!(
                    "unknown cipher '{}'",
                    self.etype
                )))
            }
        }
        let key = self
            .key
            .as_deref()
            .ok_or_else(|| EvalError::Crypto("no encryption key".into()))?;
        Fernet::new(key).ok_or_else(|| EvalError::Crypto("invalid encryption key".into()))
    }

    pub fn encrypt(&self, plaintext: &str) -> EvalResult<String> {
        Ok(self.cipher()?.encrypt(plaintext.as_bytes()))
    }

    pub fn decrypt(&self, token: &str) -> EvalResult<String> {
        let bytes = self
            .cipher()?
            .decrypt(token)
            .map_err(|_| EvalError::Decryption("invalid token or key".into()))?;
        String::from_utf8(bytes)
            .map_err(|_| EvalError::Decryption("plaintext is not valid UTF-8".into()))
    }
}
