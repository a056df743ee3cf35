//! System-wide default constants.
//!
//! Named, overridable values for everything the loop would otherwise hard-code.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Cadence
// ============================================================================

/// Run inference on every Nth frame.
pub const DEFAULT_FRAME_SKIP: u32 = 1;

/// Promote detections to events on every Kth inference.
///
/// Disk and network I/O per event costs far more than one inference on a Pi 4,
/// so only every 20th inference is logged and published.
pub const DEFAULT_SAMPLE_EVERY: u32 = 20;

// ============================================================================
// Classifier
// ============================================================================

/// Labels the system acts on. Anything else the model emits is noise.
pub const DEFAULT_KNOWN_LABELS: [&str; 3] = ["antraknosa", "cabai_normal", "lalat_buah"];

/// Detections below this confidence are discarded with the unknown labels.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;

// ============================================================================
// Actuator
// ============================================================================

/// BCM pin per label: red, green, blue LED.
pub const DEFAULT_LED_CHANNELS: [(&str, u32); 3] =
    [("antraknosa", 17), ("cabai_normal", 27), ("lalat_buah", 22)];

/// sysfs GPIO root.
pub const DEFAULT_GPIO_SYSFS_ROOT: &str = "/sys/class/gpio";

// ============================================================================
// Positioning
// ============================================================================

/// Serial device the GPS module is wired to (Pi UART).
pub const DEFAULT_GPS_DEVICE: &str = "/dev/serial0";

/// Interval between provider polls (milliseconds).
pub const DEFAULT_POSITION_POLL_INTERVAL_MS: u64 = 100;

/// Maximum time a single poll may wait for a sentence (milliseconds).
pub const DEFAULT_POSITION_READ_TIMEOUT_MS: u64 = 500;

// ============================================================================
// Telemetry
// ============================================================================

pub const DEFAULT_MQTT_BROKER: &str = "broker.hivemq.com";

pub const DEFAULT_MQTT_PORT: u16 = 1883;

pub const DEFAULT_MQTT_TOPIC: &str = "chili/detections";

/// Client ids are `<prefix>_<unix seconds>`.
pub const DEFAULT_MQTT_CLIENT_PREFIX: &str = "chili_monitor";

pub const DEFAULT_MQTT_KEEP_ALIVE_SECS: u64 = 60;

/// Time allowed for CONNACK at startup (seconds).
pub const DEFAULT_MQTT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Upper bound on one publish attempt before the event is dropped (milliseconds).
pub const DEFAULT_PUBLISH_TIMEOUT_MS: u64 = 250;

/// Outgoing request queue capacity of the MQTT client.
pub const MQTT_REQUEST_CHANNEL_CAPACITY: usize = 16;

// ============================================================================
// Session storage
// ============================================================================

/// File the dashboard reads for the active run.
pub const CURRENT_SESSION_FILE: &str = "current_session.json";

/// Per-run archive files are `<prefix><run id>.json`.
pub const ARCHIVE_FILE_PREFIX: &str = "detections_";

/// Directory name prefix used by the `archive` subcommand.
pub const ARCHIVE_DIR_PREFIX: &str = "detections_archive_";

// ============================================================================
// Display
// ============================================================================

/// Wall-clock interval between periodic stats lines (seconds).
pub const DEFAULT_STATS_INTERVAL_SECS: u64 = 5;

// ============================================================================
// Shutdown
// ============================================================================

/// Bound on waiting for background tasks to exit during draining (milliseconds).
pub const BACKGROUND_JOIN_TIMEOUT_MS: u64 = 2_000;

/// Bound on runtime shutdown once the run has finished (milliseconds).
///
/// Reads parked on the blocking pool (stdin, the GPS serial device) cannot be
/// interrupted; they are abandoned after this long.
pub const RUNTIME_SHUTDOWN_GRACE_MS: u64 = 1_000;
