//! Layered YAML configuration for a broker session.
//!
//! Layers are applied in order, later keys overriding earlier ones inside the
//! `session` and `logging` sections. The hash is taken over the *effective*
//! typed config, defaults included, so spelling out `port: 4002` and leaving
//! it out yield the same `config_hash`.

use std::fs;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

mod error;
mod layers;
mod session;

pub use error::ConfigError;
pub use layers::UnusedKeyPolicy;
pub use session::{LoggingConfig, SessionConfig};

use layers::MergedLayers;

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    /// Sorted-key compact JSON of `{logging, session}`.
    pub canonical_json: String,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
    /// Top-level sections present in some layer that nothing reads (sorted).
    pub unused_sections: Vec<String>,
}

#[derive(Serialize)]
struct Effective<'a> {
    session: &'a SessionConfig,
    logging: &'a LoggingConfig,
}

impl LoadedConfig {
    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    pub fn log_filter(&self) -> Option<&str> {
        self.logging.filter.as_deref()
    }

    /// `Fail` turns any unread section into `CONFIG_UNUSED_KEYS`; `Warn`
    /// leaves reporting to the caller.
    pub fn check_unused(&self, policy: UnusedKeyPolicy) -> Result<(), ConfigError> {
        if policy == UnusedKeyPolicy::Fail && !self.unused_sections.is_empty() {
            return Err(ConfigError::UnusedSections {
                sections: self.unused_sections.clone(),
            });
        }
        Ok(())
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig, ConfigError> {
    let docs = paths
        .iter()
        .map(|path| {
            fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_string(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let doc_refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig, ConfigError> {
    let mut merged = MergedLayers::default();
    for (layer, raw) in yaml_docs.iter().enumerate() {
        let doc = serde_yaml::from_str(raw).map_err(|source| ConfigError::Yaml { layer, source })?;
        merged.apply(layer, doc)?;
    }

    let session = SessionConfig::from_section(merged.session)?;
    let logging = LoggingConfig::from_section(merged.logging)?;

    // serde_json's default map is ordered, so the round trip sorts keys.
    let canonical_json = serde_json::to_string(&serde_json::to_value(Effective {
        session: &session,
        logging: &logging,
    })?)?;
    let config_hash = hex::encode(Sha256::digest(canonical_json.as_bytes()));
    debug!(%config_hash, layers = yaml_docs.len(), "config loaded");

    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        session,
        logging,
        unused_sections: merged.unused.into_iter().collect(),
    })
}
