use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::ConfigError;

/// Typed `/session` section. Every field has a default, so an absent section
/// yields a loopback paper-gateway session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub client_id: i32,
    /// Post-connect grace window and reconnect delay.
    pub connection_delay_ms: u64,
    /// Ceiling for observing `Disconnected` after the monitor starts.
    pub start_timeout_ms: u64,
    /// How long `close` waits for the monitor thread to exit.
    pub close_grace_ms: u64,
    pub poll_interval_ms: u64,
    pub reader_idle_ms: u64,
    pub reader_stop_grace_ms: u64,
    pub first_request_id: i32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4002,
            client_id: 0,
            connection_delay_ms: 1000,
            start_timeout_ms: 60_000,
            close_grace_ms: 10_000,
            poll_interval_ms: 100,
            reader_idle_ms: 100,
            reader_stop_grace_ms: 1000,
            first_request_id: 1,
        }
    }
}

impl SessionConfig {
    /// The merged `session` keys of every layer over the defaults.
    pub(crate) fn from_section(keys: Mapping) -> Result<Self, ConfigError> {
        typed_section(keys, crate::layers::SESSION)
    }

    pub fn connection_delay(&self) -> Duration {
        Duration::from_millis(self.connection_delay_ms)
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reader_idle(&self) -> Duration {
        Duration::from_millis(self.reader_idle_ms)
    }

    pub fn reader_stop_grace(&self) -> Duration {
        Duration::from_millis(self.reader_stop_grace_ms)
    }
}

/// `logging` section. `filter` is an `EnvFilter` directive that `RUST_LOG`
/// still overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl LoggingConfig {
    pub(crate) fn from_section(keys: Mapping) -> Result<Self, ConfigError> {
        typed_section(keys, crate::layers::LOGGING)
    }
}

fn typed_section<T: DeserializeOwned>(
    keys: Mapping,
    section: &'static str,
) -> Result<T, ConfigError> {
    serde_yaml::from_value(Value::Mapping(keys))
        .map_err(|source| ConfigError::Invalid { section, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn empty_section_gives_defaults() {
        let cfg = SessionConfig::from_section(Mapping::new()).unwrap();
        assert_eq!(cfg, SessionConfig::default());
        assert_eq!(cfg.port, 4002);
        assert_eq!(cfg.start_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg =
            SessionConfig::from_section(keys("port: 7497\nconnection_delay_ms: 250\n")).unwrap();
        assert_eq!(cfg.port, 7497);
        assert_eq!(cfg.connection_delay(), Duration::from_millis(250));
        assert_eq!(cfg.host, "127.0.0.1");
    }

    #[test]
    fn misspelled_key_is_an_error() {
        let err = SessionConfig::from_section(keys("prot: 1\n")).unwrap_err();
        assert!(err.to_string().starts_with("CONFIG_INVALID section=/session"));
    }

    #[test]
    fn port_out_of_range_is_an_error() {
        assert!(SessionConfig::from_section(keys("port: 70000\n")).is_err());
    }

    #[test]
    fn logging_filter_is_optional() {
        assert_eq!(LoggingConfig::from_section(Mapping::new()).unwrap().filter, None);
        let cfg = LoggingConfig::from_section(keys("filter: ibk=debug\n")).unwrap();
        assert_eq!(cfg.filter.as_deref(), Some("ibk=debug"));
    }
}
