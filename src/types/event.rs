//! DetectionEvent: a detection promoted at a sample boundary

use super::{Detection, Position};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A sampled detection.
///
/// Serialized field names (`timestamp`, `class`, `location`) are the ones the
/// dashboard and the topic monitor read, so they must not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    #[serde(rename = "timestamp")]
    pub captured_at: DateTime<Utc>,
    #[serde(rename = "class")]
    pub label: String,
    pub confidence: f32,
    #[serde(rename = "location")]
    pub position: Option<Position>,
}

impl DetectionEvent {
    /// Build an event stamped with the current wall clock.
    pub fn from_detection(detection: &Detection, position: Option<Position>) -> Self {
        Self {
            captured_at: Utc::now(),
            label: detection.label.clone(),
            confidence: detection.confidence,
            position,
        }
    }
}

impl std::fmt::Display for DetectionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:.2})", self.label, self.confidence)?;
        if let Some(ref pos) = self.position {
            write!(f, " @ {pos}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_dashboard_field_names() {
        let event = DetectionEvent::from_detection(&Detection::new("cabai_normal", 0.9), None);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["class"], "cabai_normal");
        assert!(json["location"].is_null());
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn display_includes_location_when_present() {
        let pos = Position {
            latitude: -6.2,
            longitude: 106.816666,
            altitude: 12.0,
            satellites: 7,
            fix_quality: 1,
            observed_at: Utc::now(),
        };
        let event = DetectionEvent::from_detection(&Detection::new("antraknosa", 0.75), Some(pos));
        assert_eq!(event.to_string(), "antraknosa (0.75) @ (-6.200000, 106.816666)");
    }
}
