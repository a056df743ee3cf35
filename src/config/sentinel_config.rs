//! Sentinel Configuration - every loop tunable as an operator-editable TOML value
//!
//! Each struct implements `Default` with the values the detector ships with,
//! so a missing file or a missing section behaves exactly like the defaults.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::defaults;

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "CABAI_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "sentinel.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one detector deployment.
///
/// Load with `SentinelConfig::load()` which searches:
/// 1. an explicit path (`--config`)
/// 2. `$CABAI_CONFIG`
/// 3. `./sentinel.toml`
/// 4. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentinelConfig {
    /// Inference and sampling cadence
    #[serde(default)]
    pub cadence: CadenceConfig,

    /// Label set and confidence floor
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// LED outputs
    #[serde(default)]
    pub actuator: ActuatorConfig,

    /// GPS serial provider
    #[serde(default)]
    pub positioning: PositioningConfig,

    /// MQTT publishing
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Session log files
    #[serde(default)]
    pub session: SessionConfig,

    /// Console output
    #[serde(default)]
    pub display: DisplayConfig,
}

impl SentinelConfig {
    /// Load configuration using the standard search order.
    ///
    /// An explicit path must load; the env var and local file fall back to
    /// defaults with a warning when they are broken.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            let config = Self::load_from_file(path)?;
            info!(path = %path.display(), "Loaded sentinel config");
            return Ok(config);
        }

        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded sentinel config from {}", CONFIG_ENV_VAR);
                        return Ok(config);
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        // 2. Check ./sentinel.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded sentinel config from ./{}", LOCAL_CONFIG_FILE);
                    return Ok(config);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        // 3. Defaults
        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Ok(Self::default())
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys only warn; type errors and rule violations fail.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate every section, collecting all violations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.cadence.frame_skip == 0 {
            errors.push("cadence.frame_skip must be >= 1".to_string());
        }
        if self.cadence.sample_every == 0 {
            errors.push("cadence.sample_every must be >= 1".to_string());
        }

        let c = &self.classifier;
        if c.known_labels.is_empty() {
            errors.push("classifier.known_labels must not be empty".to_string());
        }
        if c.known_labels.iter().any(|l| l.trim().is_empty()) {
            errors.push("classifier.known_labels must not contain blank labels".to_string());
        }
        if !c.min_confidence.is_finite() || !(0.0..=1.0).contains(&c.min_confidence) {
            errors.push(format!(
                "classifier.min_confidence ({}) must be within [0, 1]",
                c.min_confidence
            ));
        }

        let mut owners: HashMap<u32, &str> = HashMap::new();
        for (label, channel) in &self.actuator.channels {
            if !c.known_labels.iter().any(|l| l == label) {
                errors.push(format!(
                    "actuator.channels.{label} does not name a known label"
                ));
            }
            if let Some(other) = owners.insert(*channel, label) {
                errors.push(format!(
                    "actuator.channels: '{other}' and '{label}' share channel {channel}"
                ));
            }
        }

        let p = &self.positioning;
        if p.poll_interval_ms == 0 {
            errors.push("positioning.poll_interval_ms must be > 0".to_string());
        }
        if p.read_timeout_ms == 0 {
            errors.push("positioning.read_timeout_ms must be > 0".to_string());
        }

        let t = &self.telemetry;
        if t.publish_timeout_ms == 0 {
            errors.push("telemetry.publish_timeout_ms must be > 0".to_string());
        }
        if t.connect_timeout_secs == 0 {
            errors.push("telemetry.connect_timeout_secs must be > 0".to_string());
        }
        if t.enabled {
            if t.broker.trim().is_empty() {
                errors.push("telemetry.broker must be set when telemetry is enabled".to_string());
            }
            if t.topic.trim().is_empty() {
                errors.push("telemetry.topic must be set when telemetry is enabled".to_string());
            }
        }

        if self.session.current_file.trim().is_empty() {
            errors.push("session.current_file must not be empty".to_string());
        }

        if self.display.stats_interval_secs == 0 {
            errors.push("display.stats_interval_secs must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Sections
// ============================================================================

/// How often inference runs and how often its results are sampled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    /// Process every Nth frame (1 = every frame)
    pub frame_skip: u32,
    /// Log and publish on every Kth inference
    pub sample_every: u32,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            frame_skip: defaults::DEFAULT_FRAME_SKIP,
            sample_every: defaults::DEFAULT_SAMPLE_EVERY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub known_labels: Vec<String>,
    pub min_confidence: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            known_labels: defaults::DEFAULT_KNOWN_LABELS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            min_confidence: defaults::DEFAULT_MIN_CONFIDENCE,
        }
    }
}

/// LED outputs, one channel per label.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    pub enabled: bool,
    pub sysfs_root: PathBuf,
    /// Added to every channel before it is exported (newer kernels number
    /// the Pi header from 512).
    pub pin_offset: u32,
    pub channels: BTreeMap<String, u32>,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sysfs_root: PathBuf::from(defaults::DEFAULT_GPIO_SYSFS_ROOT),
            pin_offset: 0,
            channels: defaults::DEFAULT_LED_CHANNELS
                .iter()
                .map(|(label, pin)| ((*label).to_string(), *pin))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PositioningConfig {
    pub enabled: bool,
    pub device: PathBuf,
    pub poll_interval_ms: u64,
    pub read_timeout_ms: u64,
}

impl PositioningConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for PositioningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            device: PathBuf::from(defaults::DEFAULT_GPS_DEVICE),
            poll_interval_ms: defaults::DEFAULT_POSITION_POLL_INTERVAL_MS,
            read_timeout_ms: defaults::DEFAULT_POSITION_READ_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub broker: String,
    pub port: u16,
    pub topic: String,
    pub client_id_prefix: String,
    pub keep_alive_secs: u64,
    pub connect_timeout_secs: u64,
    pub publish_timeout_ms: u64,
}

impl TelemetryConfig {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            broker: defaults::DEFAULT_MQTT_BROKER.to_string(),
            port: defaults::DEFAULT_MQTT_PORT,
            topic: defaults::DEFAULT_MQTT_TOPIC.to_string(),
            client_id_prefix: defaults::DEFAULT_MQTT_CLIENT_PREFIX.to_string(),
            keep_alive_secs: defaults::DEFAULT_MQTT_KEEP_ALIVE_SECS,
            connect_timeout_secs: defaults::DEFAULT_MQTT_CONNECT_TIMEOUT_SECS,
            publish_timeout_ms: defaults::DEFAULT_PUBLISH_TIMEOUT_MS,
        }
    }
}

/// Where the session log lives. Archives are written next to the current file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub directory: PathBuf,
    pub current_file: String,
}

impl SessionConfig {
    pub fn current_path(&self) -> PathBuf {
        self.directory.join(&self.current_file)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            current_file: defaults::CURRENT_SESSION_FILE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub enabled: bool,
    pub stats_interval_secs: u64,
}

impl DisplayConfig {
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stats_interval_secs: defaults::DEFAULT_STATS_INTERVAL_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SentinelConfig::default().validate().is_ok());
    }

    #[test]
    fn default_channels_cover_known_labels() {
        let config = SentinelConfig::default();
        for label in &config.classifier.known_labels {
            assert!(config.actuator.channels.contains_key(label), "{label} has no LED");
        }
        assert_eq!(config.actuator.channels["antraknosa"], 17);
        assert_eq!(config.actuator.channels["cabai_normal"], 27);
        assert_eq!(config.actuator.channels["lalat_buah"], 22);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = SentinelConfig::from_toml_str(
            r#"
[cadence]
frame_skip = 3
"#,
        )
        .unwrap();
        assert_eq!(config.cadence.frame_skip, 3);
        assert_eq!(config.cadence.sample_every, defaults::DEFAULT_SAMPLE_EVERY);
        assert_eq!(config.telemetry.topic, defaults::DEFAULT_MQTT_TOPIC);
    }

    #[test]
    fn zero_frame_skip_rejected() {
        let err = SentinelConfig::from_toml_str("[cadence]\nframe_skip = 0\n").unwrap_err();
        assert!(err.to_string().contains("frame_skip"));
    }

    #[test]
    fn shared_channel_rejected() {
        let mut config = SentinelConfig::default();
        config.actuator.channels.insert("lalat_buah".to_string(), 17);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("share channel 17"));
    }

    #[test]
    fn channel_for_unknown_label_rejected() {
        let mut config = SentinelConfig::default();
        config.actuator.channels.insert("daun_kuning".to_string(), 5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let result = SentinelConfig::load(Some(Path::new("/nonexistent/sentinel.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_, _))));
    }

    #[test]
    fn toml_roundtrip_preserves_values() {
        let mut config = SentinelConfig::default();
        config.cadence.sample_every = 7;
        config.telemetry.enabled = true;
        let text = config.to_toml().unwrap();
        let back = SentinelConfig::from_toml_str(&text).unwrap();
        assert_eq!(back.cadence.sample_every, 7);
        assert!(back.telemetry.enabled);
    }
}
