//! Classifier for recorded frame logs: each frame carries its own detections.
//!
//! Accepted payloads:
//!
//! ```json
//! {"detections":[{"label":"antraknosa","confidence":0.91,"bbox":[12,40,180,200]}]}
//! [{"label":"cabai_normal","confidence":0.8}]
//! ```

use super::{Classifier, ClassifierError};
use crate::types::{Detection, Frame};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum ReplayPayload {
    Wrapped { detections: Vec<Detection> },
    Bare(Vec<Detection>),
}

#[derive(Debug, Default)]
pub struct ReplayClassifier;

impl ReplayClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl Classifier for ReplayClassifier {
    fn classify(&mut self, frame: &Frame) -> Result<Vec<Detection>, ClassifierError> {
        match serde_json::from_slice::<ReplayPayload>(frame.data()) {
            Ok(ReplayPayload::Wrapped { detections } | ReplayPayload::Bare(detections)) => {
                Ok(detections)
            }
            Err(e) => Err(ClassifierError::InvalidFrame {
                sequence: frame.sequence(),
                reason: e.to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "replay"
    }
}
