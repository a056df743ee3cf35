//! Position fix from the positional telemetry provider

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One valid GPS fix.
///
/// Built whole by the provider and never mutated afterwards; the position
/// cache swaps entire fixes, so readers always see a consistent set of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Decimal degrees, south negative
    pub latitude: f64,
    /// Decimal degrees, west negative
    pub longitude: f64,
    /// Metres above mean sea level
    pub altitude: f64,
    /// Satellites used in the fix
    pub satellites: u32,
    /// GGA fix quality indicator (0 = invalid)
    pub fix_quality: u8,
    pub observed_at: DateTime<Utc>,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}
