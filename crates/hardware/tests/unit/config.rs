//! # Configuration Tests
//!
//! Defaults and JSON deserialization of the framework configuration.

use boardsim_core::Config;
use pretty_assertions::assert_eq;

#[test]
fn test_config_defaults() {
    let config = Config::default();
    assert_eq!(config.open_bus, 0xFF);
    assert_eq!(config.sched_slice, 64);
}

#[test]
fn test_config_from_json() {
    let config: Config = serde_json::from_str(r#"{"open_bus": 0, "sched_slice": 8}"#).unwrap();
    assert_eq!(config.open_bus, 0x00);
    assert_eq!(config.sched_slice, 8);
}

#[test]
fn test_partial_json_falls_back_to_defaults() {
    let config: Config = serde_json::from_str(r#"{"open_bus": 90}"#).unwrap();
    assert_eq!(config.open_bus, 90);
    assert_eq!(config.sched_slice, 64);
}
