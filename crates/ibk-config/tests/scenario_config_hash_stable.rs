//! Config hash stability.
//!
//! GREEN when:
//! - the same inputs produce the same hash on every call;
//! - reordering keys within YAML doesn't change the hash;
//! - different values produce different hashes;
//! - an overlay layer takes effect and still hashes stably;
//! - writing a default out explicitly is the same config as omitting it.

use ibk_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
session:
  host: "127.0.0.1"
  port: 4002
  client_id: 7
  connection_delay_ms: 1000
logging:
  filter: "info"
"#;

const BASE_YAML_REORDERED: &str = r#"
logging:
  filter: "info"
session:
  connection_delay_ms: 1000
  client_id: 7
  port: 4002
  host: "127.0.0.1"
"#;

const OVERLAY_YAML: &str = r#"
session:
  port: 7497
logging:
  filter: "ibk_requests=debug,info"
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();

    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();

    assert_eq!(
        original.config_hash, reordered.config_hash,
        "reordering keys in YAML must not change the hash"
    );
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, "session:\n  client_id: 8\n"]).unwrap();

    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn merged_layers_produce_stable_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);

    let session = a.session();
    assert_eq!(session.port, 7497, "overlay should override base port");
    assert_eq!(session.client_id, 7, "base value survives the overlay");
    assert_eq!(a.log_filter(), Some("ibk_requests=debug,info"));
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();

    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn empty_config_hashes_the_defaults() {
    let empty = load_layered_yaml_from_strings(&["{}"]).unwrap();
    let spelled_out = load_layered_yaml_from_strings(&[r#"
session:
  host: "127.0.0.1"
  port: 4002
  client_id: 0
  connection_delay_ms: 1000
"#])
    .unwrap();

    assert_eq!(empty.config_hash, spelled_out.config_hash);
    assert!(empty.canonical_json.contains(r#""port":4002"#));
}
