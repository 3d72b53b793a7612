//! Per-section merge of YAML layers.
//!
//! Only two sections are read: `session` and `logging`. Their keys merge one
//! by one, so an overlay that sets `session.port` keeps the base layer's
//! `session.host`. Any other top-level section is carried as a name only and
//! surfaces through [`LoadedConfig::check_unused`](crate::LoadedConfig::check_unused),
//! which is where a misspelled `sesion:` gets caught.

use std::collections::BTreeSet;

use serde_yaml::{Mapping, Value};

use crate::error::ConfigError;

pub(crate) const SESSION: &str = "session";
pub(crate) const LOGGING: &str = "logging";

/// Credentials go in the environment. A string starting with one of these
/// (and at least 8 chars long) refuses the whole load.
const TOKEN_PREFIXES: &[&str] = &[
    "-----BEGIN", "AKIA", "sk-", "sk_live", "sk_test", "ghp_", "gho_", "glpat-", "xoxb-",
    "xoxp-",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Default)]
pub(crate) struct MergedLayers {
    pub session: Mapping,
    pub logging: Mapping,
    pub unused: BTreeSet<String>,
}

impl MergedLayers {
    pub fn apply(&mut self, layer: usize, doc: Value) -> Result<(), ConfigError> {
        let sections = match doc {
            // An empty document is an empty layer.
            Value::Null => return Ok(()),
            Value::Mapping(m) => m,
            _ => return Err(ConfigError::NotAMapping { layer }),
        };

        if let Some(key) = sections
            .iter()
            .find_map(|(name, body)| find_token(body, &key_name(name)))
        {
            return Err(ConfigError::SecretDetected { key, layer });
        }

        for (name, body) in sections {
            match name.as_str() {
                Some(SESSION) => overlay(&mut self.session, SESSION, layer, body)?,
                Some(LOGGING) => overlay(&mut self.logging, LOGGING, layer, body)?,
                _ => {
                    self.unused.insert(key_name(&name));
                }
            }
        }
        Ok(())
    }
}

fn overlay(
    into: &mut Mapping,
    section: &'static str,
    layer: usize,
    body: Value,
) -> Result<(), ConfigError> {
    match body {
        Value::Null => Ok(()),
        Value::Mapping(keys) => {
            for (k, v) in keys {
                into.insert(k, v);
            }
            Ok(())
        }
        _ => Err(ConfigError::SectionShape { section, layer }),
    }
}

/// Dotted path of the first string value that looks like a credential.
fn find_token(value: &Value, path: &str) -> Option<String> {
    match value {
        Value::String(s) if looks_like_token(s) => Some(path.to_string()),
        Value::Mapping(m) => m
            .iter()
            .find_map(|(k, v)| find_token(v, &format!("{path}.{}", key_name(k)))),
        Value::Sequence(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, v)| find_token(v, &format!("{path}[{i}]"))),
        Value::Tagged(t) => find_token(&t.value, path),
        _ => None,
    }
}

fn key_name(key: &Value) -> String {
    match key.as_str() {
        Some(s) => s.to_string(),
        None => format!("{key:?}"),
    }
}

fn looks_like_token(s: &str) -> bool {
    let s = s.trim();
    s.len() >= 8 && TOKEN_PREFIXES.iter().any(|p| s.starts_with(p))
}
