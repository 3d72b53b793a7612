//! Command handlers for the `ibk` CLI.
//!
//! Shared helpers live here; the session simulation has its own module.

pub mod simulate;

use anyhow::{Context, Result};
use ibk_config::{LoadedConfig, UnusedKeyPolicy};
use tracing::warn;

pub fn load_config(paths: &[String]) -> Result<LoadedConfig> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    ibk_config::load_layered_yaml(&path_refs)
        .with_context(|| format!("load config failed: {}", paths.join(", ")))
}

pub fn config_hash(loaded: &LoadedConfig, strict: bool) -> Result<()> {
    let policy = if strict {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    loaded.check_unused(policy)?;
    if !loaded.unused_sections.is_empty() {
        warn!(sections = ?loaded.unused_sections, "config sections nothing reads");
    }

    println!("config_hash={}", loaded.config_hash);
    println!("{}", loaded.canonical_json);
    Ok(())
}
