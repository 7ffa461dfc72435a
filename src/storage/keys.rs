//! Key codec for the code-graph records.
//!
//! Every record kind owns a fixed textual prefix so prefix scans over the
//! ordered store touch only matching keys:
//!
//! - `@path:<lang>:<path>` — one per indexed file
//! - `@sym:<lang>:<name>` — one per project-wide symbol name
//! - `@callee:<name>:<param_count>` — reverse call index
//! - `@meta:<type>` — small per-project flags
//!
//! Encoding is reversible: `GraphKey::parse(&key.encode())` returns the
//! original key. Kind tests are plain byte-prefix checks and never allocate.

use crate::parsing::Language;
use crate::storage::{StorageError, StorageResult};

pub const PATH_PREFIX: &str = "@path:";
pub const SYMBOL_PREFIX: &str = "@sym:";
pub const CALLEE_PREFIX: &str = "@callee:";
pub const META_PREFIX: &str = "@meta:";

/// A typed key into a project's record namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphKey {
    Path { language: Language, path: String },
    Symbol { language: Language, name: String },
    Callee { name: String, param_count: u32 },
    Meta { kind: String },
}

impl GraphKey {
    pub fn path(language: Language, path: impl Into<String>) -> Self {
        Self::Path {
            language,
            path: normalize_separators(&path.into()),
        }
    }

    pub fn symbol(language: Language, name: impl Into<String>) -> Self {
        Self::Symbol {
            language,
            name: name.into(),
        }
    }

    pub fn callee(name: impl Into<String>, param_count: u32) -> Self {
        Self::Callee {
            name: name.into(),
            param_count,
        }
    }

    pub fn meta(kind: impl Into<String>) -> Self {
        Self::Meta { kind: kind.into() }
    }

    /// Canonical byte encoding of this key.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Path { language, path } => {
                format!("{PATH_PREFIX}{}:{path}", language.as_str()).into_bytes()
            }
            Self::Symbol { language, name } => {
                format!("{SYMBOL_PREFIX}{}:{name}", language.as_str()).into_bytes()
            }
            Self::Callee { name, param_count } => {
                format!("{CALLEE_PREFIX}{name}:{param_count}").into_bytes()
            }
            Self::Meta { kind } => format!("{META_PREFIX}{kind}").into_bytes(),
        }
    }

    /// Parse a stored key back into its typed form.
    pub fn parse(bytes: &[u8]) -> StorageResult<Self> {
        let text = std::str::from_utf8(bytes).map_err(|_| StorageError::KeyFormat {
            key: String::from_utf8_lossy(bytes).into_owned(),
        })?;
        let malformed = || StorageError::KeyFormat {
            key: text.to_string(),
        };

        if let Some(rest) = text.strip_prefix(PATH_PREFIX) {
            let (lang, path) = rest.split_once(':').ok_or_else(malformed)?;
            let language = Language::from_name(lang).ok_or_else(malformed)?;
            if path.is_empty() {
                return Err(malformed());
            }
            return Ok(Self::Path {
                language,
                path: path.to_string(),
            });
        }
        if let Some(rest) = text.strip_prefix(SYMBOL_PREFIX) {
            let (lang, name) = rest.split_once(':').ok_or_else(malformed)?;
            let language = Language::from_name(lang).ok_or_else(malformed)?;
            if name.is_empty() {
                return Err(malformed());
            }
            return Ok(Self::Symbol {
                language,
                name: name.to_string(),
            });
        }
        if let Some(rest) = text.strip_prefix(CALLEE_PREFIX) {
            // The arity is the suffix after the last separator; the name may
            // not contain one, but parse defensively from the end anyway.
            let (name, count) = rest.rsplit_once(':').ok_or_else(malformed)?;
            let param_count: u32 = count.parse().map_err(|_| malformed())?;
            if name.is_empty() {
                return Err(malformed());
            }
            return Ok(Self::Callee {
                name: name.to_string(),
                param_count,
            });
        }
        if let Some(kind) = text.strip_prefix(META_PREFIX) {
            if kind.is_empty() {
                return Err(malformed());
            }
            return Ok(Self::Meta {
                kind: kind.to_string(),
            });
        }

        Err(malformed())
    }
}

/// Kind tests over raw key bytes; no parse, no allocation.
pub fn is_path_key(key: &[u8]) -> bool {
    key.starts_with(PATH_PREFIX.as_bytes())
}

pub fn is_symbol_key(key: &[u8]) -> bool {
    key.starts_with(SYMBOL_PREFIX.as_bytes())
}

pub fn is_callee_key(key: &[u8]) -> bool {
    key.starts_with(CALLEE_PREFIX.as_bytes())
}

pub fn is_meta_key(key: &[u8]) -> bool {
    key.starts_with(META_PREFIX.as_bytes())
}

/// Normalize path separators to the platform's native separator so stored
/// keys sort lexicographically by the native path form.
pub fn normalize_separators(path: &str) -> String {
    let sep = std::path::MAIN_SEPARATOR;
    let alt = if sep == '/' { '\\' } else { '/' };
    path.replace(alt, &sep.to_string())
}
