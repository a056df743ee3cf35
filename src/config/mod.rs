//! Sentinel Configuration Module
//!
//! Per-deployment configuration loaded from TOML, replacing the loop's
//! magic numbers (sample cadence, stats interval, LED pins, broker) with
//! operator-tunable values.
//!
//! ## Loading Order
//!
//! 1. `--config <path>` on the command line
//! 2. `CABAI_CONFIG` environment variable (path to TOML file)
//! 3. `sentinel.toml` in the current working directory
//! 4. Built-in defaults
//!
//! The loaded config is passed explicitly to whoever needs it; there is no
//! process-wide config global.

mod sentinel_config;
pub mod defaults;
pub mod validation;

pub use sentinel_config::*;
