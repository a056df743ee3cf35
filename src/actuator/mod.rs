//! LED actuators: driver contract and diff-based label sync
//!
//! One output channel per known label. Every processed frame hands its
//! active label set to [`ActuatorSync::apply`], which switches only the
//! channels whose state changed.

use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, info, warn};

mod gpio;

pub use gpio::SysfsGpioDriver;

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("actuator unavailable: {0}")]
    Unavailable(String),

    #[error("GPIO {pin}: {source}")]
    Io {
        pin: u32,
        #[source]
        source: std::io::Error,
    },
}

/// Hardware outputs addressed by channel number.
pub trait ActuatorDriver: Send {
    /// Claim the channels as outputs. Failure means no actuator for the run.
    fn setup(&mut self, channels: &[u32]) -> Result<(), ActuatorError>;

    fn set_output(&mut self, channel: u32, on: bool) -> Result<(), ActuatorError>;

    /// Drive everything low and give the channels back. Best effort.
    fn release(&mut self, channels: &[u32]);

    fn name(&self) -> &str;
}

/// Keeps the outputs in step with the labels of the latest processed frame.
pub struct ActuatorSync {
    driver: Option<Box<dyn ActuatorDriver>>,
    channels: BTreeMap<String, u32>,
    applied: BTreeSet<String>,
    transitions: u64,
    live: bool,
}

impl ActuatorSync {
    pub fn new(driver: Option<Box<dyn ActuatorDriver>>, channels: BTreeMap<String, u32>) -> Self {
        Self {
            driver,
            channels,
            applied: BTreeSet::new(),
            transitions: 0,
            live: false,
        }
    }

    /// Set up the driver and switch every channel off.
    ///
    /// Returns whether the actuator is live. A driver that fails setup is
    /// dropped and every later call becomes bookkeeping only.
    pub fn initialize(&mut self) -> bool {
        let channels: Vec<u32> = self.channels.values().copied().collect();
        let Some(driver) = self.driver.as_mut() else {
            return false;
        };

        if let Err(e) = driver.setup(&channels) {
            warn!(driver = driver.name(), error = %e, "LEDs unavailable, continuing without actuator");
            self.driver = None;
            return false;
        }

        for &channel in &channels {
            if let Err(e) = driver.set_output(channel, false) {
                warn!(channel, error = %e, "Failed to switch LED off");
            }
        }
        info!(driver = driver.name(), channels = channels.len(), "LEDs initialized");
        self.applied.clear();
        self.live = true;
        true
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Apply this frame's active labels, switching only what changed.
    ///
    /// A failed write leaves that label's recorded state as it was, so the
    /// next frame retries it. Without a live driver the applied set simply
    /// follows `active`.
    pub fn apply(&mut self, active: &BTreeSet<String>) {
        let driver = match self.driver.as_mut() {
            Some(driver) if self.live => driver,
            _ => {
                self.applied.clone_from(active);
                return;
            }
        };

        let changes: Vec<(String, bool)> = self
            .applied
            .difference(active)
            .map(|l| (l.clone(), false))
            .chain(active.difference(&self.applied).map(|l| (l.clone(), true)))
            .collect();

        for (label, on) in changes {
            if let Some(&channel) = self.channels.get(&label) {
                if let Err(e) = driver.set_output(channel, on) {
                    warn!(label = %label, channel, error = %e, "LED write failed, retrying next frame");
                    continue;
                }
                self.transitions += 1;
                debug!(label = %label, channel, on, "LED transition");
            }
            if on {
                self.applied.insert(label);
            } else {
                self.applied.remove(&label);
            }
        }
    }

    /// Labels whose outputs are currently on.
    pub fn applied(&self) -> &BTreeSet<String> {
        &self.applied
    }

    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// All outputs off; the driver is released and dropped.
    ///
    /// A driver that was never set up is dropped untouched.
    pub fn release(&mut self) {
        let live = std::mem::replace(&mut self.live, false);
        if let Some(mut driver) = self.driver.take().filter(|_| live) {
            let channels: Vec<u32> = self.channels.values().copied().collect();
            driver.release(&channels);
            info!(driver = driver.name(), "LEDs released");
        }
        self.applied.clear();
    }
}

impl Drop for ActuatorSync {
    fn drop(&mut self) {
        self.release();
    }
}
