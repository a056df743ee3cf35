//! Cabai Sentinel: real-time chili crop disease detection on edge hardware
//!
//! ## Architecture
//!
//! - **Pipeline**: frame source, cadence gates and the orchestrating loop
//! - **Classifier**: detection contract and known-label filtering
//! - **Positioning**: GPS fixes polled in the background into a sticky cache
//! - **Actuator**: one LED per label, switched on diffs
//! - **Telemetry**: best-effort MQTT publishing of sampled events
//! - **Storage**: crash-safe session log and run archives

pub mod actuator;
pub mod classifier;
pub mod config;
pub mod pipeline;
pub mod positioning;
pub mod storage;
pub mod telemetry;
pub mod types;

pub use config::SentinelConfig;

pub use types::{BoundingBox, Detection, DetectionEvent, Frame, Position};

pub use pipeline::{Capabilities, Orchestrator, OrchestratorError, OrchestratorSettings, RunSummary};
