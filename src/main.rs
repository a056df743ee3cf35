//! Cabai Sentinel - chili crop disease detection on the edge
//!
//! Pulls frames, classifies them, drives one LED per detected label and
//! records sampled detection events (with GPS location when available) to a
//! crash-safe session log and, optionally, an MQTT topic.
//!
//! # Usage
//!
//! ```bash
//! # Synthetic frames and detections, no hardware needed
//! cargo run --release
//!
//! # Replay a recorded session headless, publishing to the default broker
//! ./cabai-sentinel --source replay:field_run.jsonl --model replay --no-display --mqtt
//!
//! # Field rig with GPS on the Pi UART
//! ./cabai-sentinel --gps --gps-device /dev/serial0 --mqtt
//!
//! # Tidy up finished runs
//! ./cabai-sentinel archive --dir sessions
//!
//! # Watch what a field rig is publishing
//! ./cabai-sentinel monitor --topic chili/detections
//! ```
//!
//! # Environment Variables
//!
//! - `CABAI_CONFIG`: Path to a `sentinel.toml` (default: `./sentinel.toml`)
//! - `CABAI_MQTT_BROKER`: Broker host, overrides the config file
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{bail, Context, Result};
use cabai_sentinel::actuator::{ActuatorDriver, ActuatorSync, SysfsGpioDriver};
use cabai_sentinel::classifier::ModelSpec;
use cabai_sentinel::config::{defaults, SentinelConfig};
use cabai_sentinel::pipeline::{runtime, Orchestrator, OrchestratorSettings, SourceSpec};
use cabai_sentinel::positioning::NmeaSerialProvider;
use cabai_sentinel::storage::{archive_runs, ArchiveMode, ProcessLock, SessionStore};
use cabai_sentinel::telemetry::monitor::{run_monitor, MonitorOptions};
use cabai_sentinel::telemetry::{MqttTransport, TelemetryPublisher};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cabai Sentinel - chili disease detection
#[derive(Parser, Debug)]
#[command(name = "cabai-sentinel")]
#[command(about = "Real-time chili crop disease detection with GPS tagging, LEDs and MQTT")]
#[command(version)]
struct CliArgs {
    /// Classifier: replay, synthetic[:<seed>] or constant:<label>[:<confidence>]
    #[arg(long, default_value = "synthetic")]
    model: ModelSpec,

    /// Frame source: replay:<file>, stdin or synthetic[:<frames>]
    #[arg(long, default_value = "synthetic")]
    source: SourceSpec,

    /// Headless mode: no per-frame status or per-event lines
    #[arg(long)]
    no_display: bool,

    /// Classify every Nth frame
    #[arg(long, value_name = "N")]
    frame_skip: Option<u32>,

    /// Record and publish on every Kth inference
    #[arg(long, value_name = "K")]
    sample_every: Option<u32>,

    /// Publish detection events over MQTT
    #[arg(long)]
    mqtt: bool,

    /// MQTT broker host
    #[arg(long, env = "CABAI_MQTT_BROKER")]
    mqtt_broker: Option<String>,

    /// MQTT broker port
    #[arg(long)]
    mqtt_port: Option<u16>,

    /// MQTT topic for detection events
    #[arg(long)]
    mqtt_topic: Option<String>,

    /// Tag events with GPS location
    #[arg(long)]
    gps: bool,

    /// NMEA serial device (baud rate set by the OS)
    #[arg(long, value_name = "PATH")]
    gps_device: Option<PathBuf>,

    /// Do not drive the indicator LEDs
    #[arg(long)]
    no_leds: bool,

    /// Path to sentinel.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory for the session log and run archives
    #[arg(long, value_name = "DIR")]
    session_dir: Option<PathBuf>,

    /// Pace replay and synthetic sources to this many frames per second
    #[arg(long, value_name = "F")]
    fps: Option<f64>,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(Subcommand, Debug)]
enum SubCommand {
    /// Move finished run archives into a timestamped directory, or delete them
    Archive {
        /// Delete instead of moving
        #[arg(long)]
        delete: bool,
        /// Directory holding the archives (default: the session directory)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Print detection events as they arrive on the MQTT topic
    Monitor {
        #[arg(long)]
        broker: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        topic: Option<String>,
    },
}

fn main() -> Result<()> {
    let rt = runtime::build().context("Failed to start async runtime")?;
    runtime::block_on_bounded(
        rt,
        async_main(),
        Duration::from_millis(defaults::RUNTIME_SHUTDOWN_GRACE_MS),
    )
}

async fn async_main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let mut config =
        SentinelConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    apply_overrides(&mut config, &args);
    config.validate().context("Invalid configuration")?;

    match args.command {
        Some(SubCommand::Archive { delete, dir, yes }) => {
            let dir = dir.unwrap_or_else(|| config.session.directory.clone());
            archive_command(dir, delete, yes)
        }
        Some(SubCommand::Monitor {
            broker,
            port,
            topic,
        }) => {
            let options = MonitorOptions {
                broker: broker.unwrap_or(config.telemetry.broker),
                port: port.unwrap_or(config.telemetry.port),
                topic: topic.unwrap_or(config.telemetry.topic),
                client_id_prefix: config.telemetry.client_id_prefix,
                keep_alive: Duration::from_secs(config.telemetry.keep_alive_secs),
            };
            monitor_command(options).await
        }
        None => {
            let model = args.model.clone();
            let source = args.source.clone();
            run_detector(config, model, source, args.fps).await
        }
    }
}

/// Command-line flags win over the config file.
fn apply_overrides(config: &mut SentinelConfig, args: &CliArgs) {
    if args.no_display {
        config.display.enabled = false;
    }
    if let Some(n) = args.frame_skip {
        config.cadence.frame_skip = n;
    }
    if let Some(k) = args.sample_every {
        config.cadence.sample_every = k;
    }
    if args.mqtt {
        config.telemetry.enabled = true;
    }
    if let Some(ref broker) = args.mqtt_broker {
        config.telemetry.broker = broker.clone();
    }
    if let Some(port) = args.mqtt_port {
        config.telemetry.port = port;
    }
    if let Some(ref topic) = args.mqtt_topic {
        config.telemetry.topic = topic.clone();
    }
    if args.gps {
        config.positioning.enabled = true;
    }
    if let Some(ref device) = args.gps_device {
        config.positioning.device = device.clone();
    }
    if args.no_leds {
        config.actuator.enabled = false;
    }
    if let Some(ref dir) = args.session_dir {
        config.session.directory = dir.clone();
    }
}

async fn run_detector(
    config: SentinelConfig,
    model: ModelSpec,
    source: SourceSpec,
    fps: Option<f64>,
) -> Result<()> {
    let _lock = ProcessLock::acquire(&config.session.directory)?;

    info!("");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("🌶  CABAI SENTINEL - Chili Disease Detection");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("   Source:       {:?}", source);
    info!("   Model:        {:?}", model);
    info!(
        "   Cadence:      every {} frame(s), sample every {} inference(s)",
        config.cadence.frame_skip, config.cadence.sample_every
    );
    info!("   Session:      {}", config.session.current_path().display());
    info!("   GPS:          {}", enabled(config.positioning.enabled));
    info!("   MQTT:         {}", enabled(config.telemetry.enabled));
    info!("   LEDs:         {}", enabled(config.actuator.enabled));
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("");

    let settings = OrchestratorSettings::from_config(&config);
    let classifier = model.build(settings.known_labels.labels());
    let frame_source = source.build(fps);
    let session = SessionStore::from_config(&config.session);

    // Setup graceful shutdown
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let mut orchestrator =
        Orchestrator::new(settings, frame_source, classifier, session, cancel_token)
            .context("Failed to build detection loop")?;

    if config.positioning.enabled {
        orchestrator = orchestrator.with_positioning(Box::new(NmeaSerialProvider::new(
            config.positioning.device.clone(),
            config.positioning.read_timeout(),
        )));
    }

    if config.actuator.enabled {
        let driver: Box<dyn ActuatorDriver> = Box::new(SysfsGpioDriver::new(
            config.actuator.sysfs_root.clone(),
            config.actuator.pin_offset,
        ));
        orchestrator = orchestrator
            .with_actuator(ActuatorSync::new(Some(driver), config.actuator.channels.clone()));
    }

    if config.telemetry.enabled {
        let transport = MqttTransport::new(&config.telemetry);
        orchestrator = orchestrator.with_telemetry(TelemetryPublisher::new(
            Some(Box::new(transport)),
            config.telemetry.topic.clone(),
            config.telemetry.publish_timeout(),
        ));
    }

    let summary = orchestrator.run().await.context("Detection run failed")?;
    info!(
        "Run finished: {} frames, {} events ({})",
        summary.frames, summary.events, summary.end_reason
    );
    Ok(())
}

fn enabled(on: bool) -> &'static str {
    if on {
        "enabled"
    } else {
        "disabled"
    }
}

fn archive_command(dir: PathBuf, delete: bool, yes: bool) -> Result<()> {
    let mut lock = ProcessLock::acquire(&dir)?;

    let (verb, mode) = if delete {
        ("Delete", ArchiveMode::Delete)
    } else {
        ("Archive", ArchiveMode::Move)
    };

    let question = format!(
        "{} all {}*.json in {}?",
        verb,
        defaults::ARCHIVE_FILE_PREFIX,
        dir.display()
    );
    if !yes && !confirm(&question)? {
        info!("Cancelled");
        lock.release();
        return Ok(());
    }

    let outcome = archive_runs(&dir, mode, chrono::Local::now())
        .with_context(|| format!("Failed to archive runs in {}", dir.display()))?;
    lock.release();

    if outcome.files.is_empty() {
        info!("No run archives found in {}", dir.display());
        return Ok(());
    }
    match outcome.destination {
        Some(dest) => info!("Moved {} file(s) to {}", outcome.files.len(), dest.display()),
        None => info!("Deleted {} file(s)", outcome.files.len()),
    }
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} (yes/no): ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "yes" | "y"))
}

async fn monitor_command(options: MonitorOptions) -> Result<()> {
    if options.topic.is_empty() {
        bail!("Monitor topic must not be empty");
    }
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        shutdown_token.cancel();
    });

    match run_monitor(options, cancel_token).await {
        Ok(count) => {
            info!("Monitor stopped after {} message(s)", count);
            Ok(())
        }
        Err(e) => {
            warn!("Monitor failed: {}", e);
            Err(e.into())
        }
    }
}
