//! Classifier contract, known-label filtering and model selection
//!
//! The classifier itself is a black box: a synchronous call from frame to
//! detections. Everything downstream only ever sees what survives
//! [`KnownLabelSet::filter`].

use crate::config::ClassifierConfig;
use crate::types::{Detection, Frame};
use std::collections::BTreeSet;
use std::str::FromStr;
use thiserror::Error;

mod replay;
mod synthetic;

pub use replay::ReplayClassifier;
pub use synthetic::{ConstantClassifier, SyntheticClassifier};

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("frame {sequence} could not be classified: {reason}")]
    InvalidFrame { sequence: u64, reason: String },

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Frame in, detections out.
///
/// Implementations must not keep a reference to the frame after returning.
pub trait Classifier: Send {
    fn classify(&mut self, frame: &Frame) -> Result<Vec<Detection>, ClassifierError>;

    fn name(&self) -> &str;
}

/// The labels the system acts on, plus the confidence floor.
#[derive(Debug, Clone)]
pub struct KnownLabelSet {
    labels: BTreeSet<String>,
    min_confidence: f32,
}

impl KnownLabelSet {
    pub fn new<I, S>(labels: I, min_confidence: f32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            min_confidence,
        }
    }

    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self::new(config.known_labels.iter().cloned(), config.min_confidence)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    pub fn labels(&self) -> &BTreeSet<String> {
        &self.labels
    }

    /// Keep known labels with a usable confidence. Everything else is
    /// dropped silently.
    pub fn filter(&self, detections: Vec<Detection>) -> Vec<Detection> {
        detections
            .into_iter()
            .filter(|d| {
                let keep = self.labels.contains(&d.label)
                    && d.confidence.is_finite()
                    && (self.min_confidence..=1.0).contains(&d.confidence);
                if !keep {
                    tracing::debug!(label = %d.label, confidence = d.confidence, "Detection dropped");
                }
                keep
            })
            .collect()
    }
}

/// Labels present in a filtered detection list.
pub fn active_labels(detections: &[Detection]) -> BTreeSet<String> {
    detections.iter().map(|d| d.label.clone()).collect()
}

// ============================================================================
// Model selection
// ============================================================================

/// Confidence used by `constant:<label>` when none is given.
const DEFAULT_CONSTANT_CONFIDENCE: f32 = 0.9;

/// `--model` selector.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSpec {
    /// Detections embedded in replayed frames.
    Replay,
    Synthetic { seed: Option<u64> },
    Constant { label: String, confidence: f32 },
}

impl FromStr for ModelSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("replay"), None, None) => Ok(Self::Replay),
            (Some("synthetic"), None, None) => Ok(Self::Synthetic { seed: None }),
            (Some("synthetic"), Some(seed), None) => seed
                .parse()
                .map(|seed| Self::Synthetic { seed: Some(seed) })
                .map_err(|_| format!("invalid synthetic seed '{seed}'")),
            (Some("constant"), Some(label), conf) if !label.is_empty() => {
                let confidence = match conf {
                    Some(c) => c
                        .parse::<f32>()
                        .map_err(|_| format!("invalid confidence '{c}'"))?,
                    None => DEFAULT_CONSTANT_CONFIDENCE,
                };
                Ok(Self::Constant {
                    label: label.to_string(),
                    confidence,
                })
            }
            _ => Err(format!(
                "unknown model '{s}' (expected replay, synthetic[:<seed>], constant:<label>[:<confidence>])"
            )),
        }
    }
}

impl ModelSpec {
    /// Build the classifier. Synthetic output draws from `known_labels`.
    pub fn build(&self, known_labels: &BTreeSet<String>) -> Box<dyn Classifier> {
        match self {
            Self::Replay => Box::new(ReplayClassifier::new()),
            Self::Synthetic { seed } => {
                Box::new(SyntheticClassifier::new(known_labels.iter().cloned(), *seed))
            }
            Self::Constant { label, confidence } => {
                Box::new(ConstantClassifier::new(Detection::new(label.clone(), *confidence)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> KnownLabelSet {
        KnownLabelSet::new(["antraknosa", "cabai_normal", "lalat_buah"], 0.5)
    }

    #[test]
    fn unknown_labels_are_dropped() {
        let kept = known().filter(vec![
            Detection::new("antraknosa", 0.9),
            Detection::new("daun_kering", 0.99),
            Detection::new("person", 0.8),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].label, "antraknosa");
    }

    #[test]
    fn low_and_invalid_confidences_are_dropped() {
        let kept = known().filter(vec![
            Detection::new("cabai_normal", 0.49),
            Detection::new("cabai_normal", 0.5),
            Detection::new("cabai_normal", f32::NAN),
            Detection::new("cabai_normal", 1.5),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.5);
    }

    #[test]
    fn active_labels_deduplicates() {
        let dets = vec![
            Detection::new("lalat_buah", 0.9),
            Detection::new("lalat_buah", 0.7),
            Detection::new("antraknosa", 0.6),
        ];
        let active = active_labels(&dets);
        assert_eq!(active.len(), 2);
        assert!(active.contains("lalat_buah"));
    }

    #[test]
    fn parses_model_selectors() {
        assert_eq!("replay".parse::<ModelSpec>().unwrap(), ModelSpec::Replay);
        assert_eq!(
            "synthetic:7".parse::<ModelSpec>().unwrap(),
            ModelSpec::Synthetic { seed: Some(7) }
        );
        assert_eq!(
            "constant:cabai_normal".parse::<ModelSpec>().unwrap(),
            ModelSpec::Constant {
                label: "cabai_normal".to_string(),
                confidence: 0.9
            }
        );
        assert_eq!(
            "constant:antraknosa:0.75".parse::<ModelSpec>().unwrap(),
            ModelSpec::Constant {
                label: "antraknosa".to_string(),
                confidence: 0.75
            }
        );
        assert!("best.onnx".parse::<ModelSpec>().is_err());
        assert!("constant:".parse::<ModelSpec>().is_err());
        assert!("synthetic:x".parse::<ModelSpec>().is_err());
    }
}
