use thiserror::Error;

/// Display always leads with a stable `CONFIG_*` code.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("CONFIG_READ path={path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CONFIG_YAML layer={layer}: {source}")]
    Yaml {
        layer: usize,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("CONFIG_INVALID layer={layer}: top level must be a mapping of sections")]
    NotAMapping { layer: usize },

    #[error("CONFIG_INVALID section=/{section} layer={layer}: expected a mapping of keys")]
    SectionShape { section: &'static str, layer: usize },

    #[error("CONFIG_INVALID section=/{section}: {source}")]
    Invalid {
        section: &'static str,
        #[source]
        source: serde_yaml::Error,
    },

    /// The value itself is never echoed.
    #[error("CONFIG_SECRET_DETECTED key={key} layer={layer} value=REDACTED")]
    SecretDetected { key: String, layer: usize },

    #[error("CONFIG_UNUSED_KEYS: sections nothing reads: {}", sections.join(", "))]
    UnusedSections { sections: Vec<String> },

    #[error("CONFIG_CANONICAL: {0}")]
    Canonical(#[from] serde_json::Error),
}
