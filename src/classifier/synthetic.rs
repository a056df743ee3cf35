//! Stand-in classifiers for bench runs and demos.

use super::{Classifier, ClassifierError};
use crate::types::{BoundingBox, Detection, Frame};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Label the synthetic model emits that no deployment knows about.
const NOISE_LABEL: &str = "daun_kering";

/// Nominal input size of the detector (square, pixels).
const INPUT_SIZE: f32 = 416.0;

/// Emits 0-2 random detections per frame from the known labels plus noise.
pub struct SyntheticClassifier {
    labels: Vec<String>,
    rng: StdRng,
}

impl SyntheticClassifier {
    pub fn new<I: IntoIterator<Item = String>>(known_labels: I, seed: Option<u64>) -> Self {
        let mut labels: Vec<String> = known_labels.into_iter().collect();
        labels.push(NOISE_LABEL.to_string());
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { labels, rng }
    }
}

impl Classifier for SyntheticClassifier {
    fn classify(&mut self, _frame: &Frame) -> Result<Vec<Detection>, ClassifierError> {
        let count = self.rng.gen_range(0..=2);
        let mut detections = Vec::with_capacity(count);
        for _ in 0..count {
            let Some(label) = self.labels.choose(&mut self.rng) else {
                break;
            };
            let label = label.clone();
            let x1 = self.rng.gen_range(0.0..INPUT_SIZE * 0.75);
            let y1 = self.rng.gen_range(0.0..INPUT_SIZE * 0.75);
            let size = self.rng.gen_range(16.0..INPUT_SIZE * 0.25);
            let confidence = self.rng.gen_range(0.3..1.0);
            detections.push(Detection::new(label, confidence).with_geometry(BoundingBox {
                x1,
                y1,
                x2: x1 + size,
                y2: y1 + size,
            }));
        }
        Ok(detections)
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

/// Returns the same detection for every frame.
pub struct ConstantClassifier {
    detection: Detection,
}

impl ConstantClassifier {
    pub fn new(detection: Detection) -> Self {
        Self { detection }
    }
}

impl Classifier for ConstantClassifier {
    fn classify(&mut self, _frame: &Frame) -> Result<Vec<Detection>, ClassifierError> {
        Ok(vec![self.detection.clone()])
    }

    fn name(&self) -> &str {
        "constant"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec!["antraknosa".to_string(), "cabai_normal".to_string()]
    }

    #[test]
    fn seeded_output_is_repeatable() {
        let frame = Frame::new(1, vec![]);
        let mut a = SyntheticClassifier::new(labels(), Some(11));
        let mut b = SyntheticClassifier::new(labels(), Some(11));
        for _ in 0..20 {
            assert_eq!(a.classify(&frame).unwrap(), b.classify(&frame).unwrap());
        }
    }

    #[test]
    fn output_stays_in_bounds() {
        let frame = Frame::new(1, vec![]);
        let mut classifier = SyntheticClassifier::new(labels(), Some(3));
        for _ in 0..200 {
            let dets = classifier.classify(&frame).unwrap();
            assert!(dets.len() <= 2);
            for d in dets {
                assert!((0.3..1.0).contains(&d.confidence));
                assert!(d.label == NOISE_LABEL || labels().contains(&d.label));
            }
        }
    }

    #[test]
    fn constant_repeats_its_detection() {
        let mut classifier = ConstantClassifier::new(Detection::new("cabai_normal", 0.9));
        let frame = Frame::new(5, vec![1, 2, 3]);
        assert_eq!(classifier.classify(&frame).unwrap(), vec![Detection::new("cabai_normal", 0.9)]);
    }
}
