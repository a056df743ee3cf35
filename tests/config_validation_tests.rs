//! Config Validation Tests
//!
//! Typo detection and rule validation for `sentinel.toml`, exercised
//! independently from the detection loop.

use cabai_sentinel::config::validation::{
    known_config_keys, suggest_correction, validate_unknown_keys,
};
use cabai_sentinel::config::{ConfigError, SentinelConfig};
use std::io::Write;

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_telemetry_key_warns_with_suggestion() {
    let toml_str = r#"
[telemetry]
brokr = "mqtt.local"
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("brokr"));
    assert_eq!(warnings[0].suggestion.as_deref(), Some("telemetry.broker"));
}

#[test]
fn led_channel_names_are_not_flagged() {
    let toml_str = r#"
[actuator.channels]
antraknosa = 17
cabai_normal = 27
lalat_buah = 22
"#;
    assert!(validate_unknown_keys(toml_str).is_empty());
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[cadence]
frame_skip = 2
sample_every = 10

[classifier]
known_labels = ["antraknosa", "cabai_normal", "lalat_buah"]
min_confidence = 0.6

[positioning]
enabled = true
device = "/dev/ttyAMA0"

[telemetry]
enabled = true
topic = "farm/plot-3/detections"

[display]
enabled = false
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
}

#[test]
fn far_off_key_has_no_suggestion() {
    let known = known_config_keys();
    assert_eq!(suggest_correction("completely_unrelated_key", &known), None);
}

#[test]
fn unknown_keys_do_not_fail_loading() {
    let config = SentinelConfig::from_toml_str(
        r#"
[cadence]
sample_evry = 5
"#,
    )
    .unwrap();
    assert_eq!(config.cadence.sample_every, 20, "typo falls back to default");
}

// ============================================================================
// Rule Validation
// ============================================================================

#[test]
fn zero_cadence_is_rejected() {
    let err = SentinelConfig::from_toml_str(
        r#"
[cadence]
frame_skip = 0
sample_every = 0
"#,
    )
    .unwrap_err();
    match err {
        ConfigError::Validation(errors) => {
            assert_eq!(errors.len(), 2, "both violations reported: {errors:?}");
            assert!(errors.iter().any(|e| e.contains("frame_skip")));
            assert!(errors.iter().any(|e| e.contains("sample_every")));
        }
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn led_for_unknown_label_is_rejected() {
    let err = SentinelConfig::from_toml_str(
        r#"
[actuator.channels]
busuk_batang = 5
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("busuk_batang"));
}

#[test]
fn min_confidence_out_of_range_is_rejected() {
    let mut config = SentinelConfig::default();
    config.classifier.min_confidence = 1.5;
    assert!(config.validate().is_err());

    config.classifier.min_confidence = f32::NAN;
    assert!(config.validate().is_err());
}

#[test]
fn enabled_telemetry_needs_a_topic() {
    let mut config = SentinelConfig::default();
    config.telemetry.enabled = true;
    config.telemetry.topic = "  ".to_string();
    assert!(config.validate().is_err());

    config.telemetry.enabled = false;
    assert!(config.validate().is_ok(), "topic only matters when enabled");
}

#[test]
fn type_error_is_a_parse_error() {
    let err = SentinelConfig::from_toml_str(
        r#"
[cadence]
frame_skip = "often"
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Parse(..)));
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn explicit_file_round_trips_through_to_toml() {
    let mut config = SentinelConfig::default();
    config.cadence.sample_every = 7;
    config.telemetry.topic = "farm/detections".to_string();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(config.to_toml().unwrap().as_bytes()).unwrap();

    let loaded = SentinelConfig::load(Some(file.path())).unwrap();
    assert_eq!(loaded.cadence.sample_every, 7);
    assert_eq!(loaded.telemetry.topic, "farm/detections");
    assert_eq!(loaded.actuator.channels, config.actuator.channels);
}

