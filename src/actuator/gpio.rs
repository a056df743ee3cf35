//! Linux sysfs GPIO driver
//!
//! `<root>/export` claims a pin, `<root>/gpioN/direction` and
//! `<root>/gpioN/value` drive it, `<root>/unexport` gives it back.

use super::{ActuatorDriver, ActuatorError};
use std::fs;
use std::path::{Path, PathBuf};

pub struct SysfsGpioDriver {
    root: PathBuf,
    pin_offset: u32,
    exported: Vec<u32>,
}

impl SysfsGpioDriver {
    pub fn new(root: impl Into<PathBuf>, pin_offset: u32) -> Self {
        Self {
            root: root.into(),
            pin_offset,
            exported: Vec::new(),
        }
    }

    fn pin(&self, channel: u32) -> u32 {
        channel + self.pin_offset
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{pin}"))
    }

    fn write(path: &Path, pin: u32, value: &str) -> Result<(), ActuatorError> {
        fs::write(path, value).map_err(|source| ActuatorError::Io { pin, source })
    }

    fn claim(&mut self, channels: &[u32]) -> Result<(), ActuatorError> {
        // A driver whose setup failed is dropped without `release`.
        self.claim(channels).inspect_err(|_| self.unexport_all())
    }

    /// Give back every pin this driver exported.
    fn unexport_all(&mut self) {
        for pin in self.exported.drain(..) {
            if let Err(e) = fs::write(self.root.join("unexport"), pin.to_string()) {
                tracing::debug!(pin, error = %e, "GPIO unexport failed");
            }
        }
    }
}

impl ActuatorDriver for SysfsGpioDriver {
    fn setup(&mut self, channels: &[u32]) -> Result<(), ActuatorError> {
        if !self.root.is_dir() {
            return Err(ActuatorError::Unavailable(format!(
                "{} not found",
                self.root.display()
            )));
        }

        // A driver whose setup failed is dropped without `release`.
        self.claim(channels).inspect_err(|_| self.unexport_all())
    }

    fn set_output(&mut self, channel: u32, on: bool) -> Result<(), ActuatorError> {
        let pin = self.pin(channel);
        Self::write(&self.pin_dir(pin).join("value"), pin, if on { "1" } else { "0" })
    }

    fn release(&mut self, channels: &[u32]) {
        for &channel in channels {
            if let Err(e) = self.set_output(channel, false) {
                tracing::debug!(channel, error = %e, "GPIO off on release failed");
            }
        }
        self.unexport_all();
    }

    fn name(&self) -> &str {
        "sysfs-gpio"
    }
}
