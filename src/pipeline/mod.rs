//! Detection pipeline
//!
//! ```text
//! FrameSource ─► CadenceController ─► Classifier ─► KnownLabelSet
//!                                                        │
//!                          ┌─────────────────────────────┤
//!                          ▼                             ▼
//!                    ActuatorSync            sample gate ─► SessionStore
//!                                                        └─► TelemetryPublisher
//! ```
//!
//! The [`Orchestrator`] drives all of it from one loop.

pub mod cadence;
pub mod orchestrator;
pub mod runtime;
pub mod source;
pub mod stats;

pub use cadence::{CadenceController, CadenceError, CadenceState};
pub use orchestrator::{Capabilities, Orchestrator, OrchestratorError, OrchestratorSettings, Phase};
pub use source::{FrameEvent, FrameSource, SourceError, SourceSpec};
pub use stats::{EndReason, RunSummary};
