//! Cadence control: which frames get inference, which inferences get sampled.
//!
//! Both gates are pure functions of monotonic counters. There are no timers
//! here, so a run with the same frame sequence always makes the same choices.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CadenceError {
    #[error("frame_skip must be >= 1 (got {0})")]
    InvalidFrameSkip(u32),

    #[error("sample_every must be >= 1 (got {0})")]
    InvalidSampleEvery(u32),
}

/// Counters and divisors for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CadenceState {
    /// Frames pulled so far (first frame is 1)
    pub frame_counter: u64,
    /// Inferences that actually ran
    pub inference_counter: u64,
    pub frame_skip: u32,
    pub sample_every: u32,
}

/// Owns the run's [`CadenceState`]; mutated once per frame by the orchestrator.
#[derive(Debug, Clone)]
pub struct CadenceController {
    state: CadenceState,
}

impl CadenceController {
    pub fn new(frame_skip: u32, sample_every: u32) -> Result<Self, CadenceError> {
        if frame_skip == 0 {
            return Err(CadenceError::InvalidFrameSkip(frame_skip));
        }
        if sample_every == 0 {
            return Err(CadenceError::InvalidSampleEvery(sample_every));
        }
        Ok(Self {
            state: CadenceState {
                frame_counter: 0,
                inference_counter: 0,
                frame_skip,
                sample_every,
            },
        })
    }

    /// Process gate: true iff `frame_counter mod frame_skip == 0`.
    pub fn process_gate(frame_counter: u64, frame_skip: u32) -> bool {
        frame_counter % u64::from(frame_skip) == 0
    }

    /// Sample gate: true iff `inference_counter mod sample_every == 0`.
    pub fn sample_gate(inference_counter: u64, sample_every: u32) -> bool {
        inference_counter % u64::from(sample_every) == 0
    }

    /// Count a pulled frame and report whether inference should run on it.
    pub fn on_frame(&mut self) -> bool {
        self.state.frame_counter += 1;
        Self::process_gate(self.state.frame_counter, self.state.frame_skip)
    }

    /// Count a completed inference and report whether its detections are sampled.
    ///
    /// Call only when the classifier actually returned; a failed call is not
    /// an inference.
    pub fn on_inference(&mut self) -> bool {
        self.state.inference_counter += 1;
        Self::sample_gate(self.state.inference_counter, self.state.sample_every)
    }

    pub fn state(&self) -> CadenceState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_frames(ctrl: &mut CadenceController, frames: u64) -> u64 {
        (0..frames).filter(|_| ctrl.on_frame()).count() as u64
    }

    #[test]
    fn rejects_zero_divisors() {
        assert_eq!(
            CadenceController::new(0, 20).unwrap_err(),
            CadenceError::InvalidFrameSkip(0)
        );
        assert_eq!(
            CadenceController::new(1, 0).unwrap_err(),
            CadenceError::InvalidSampleEvery(0)
        );
    }

    #[test]
    fn frame_skip_one_processes_every_frame() {
        let mut ctrl = CadenceController::new(1, 20).unwrap();
        assert_eq!(run_frames(&mut ctrl, 17), 17);
    }

    #[test]
    fn inference_count_is_floor_of_frames_over_skip() {
        for skip in 1..=7u32 {
            for frames in 0..=50u64 {
                let mut ctrl = CadenceController::new(skip, 1).unwrap();
                assert_eq!(
                    run_frames(&mut ctrl, frames),
                    frames / u64::from(skip),
                    "skip={skip} frames={frames}"
                );
            }
        }
    }

    #[test]
    fn first_processed_frame_is_the_nth() {
        let mut ctrl = CadenceController::new(3, 1).unwrap();
        assert!(!ctrl.on_frame());
        assert!(!ctrl.on_frame());
        assert!(ctrl.on_frame());
        assert_eq!(ctrl.state().frame_counter, 3);
    }

    #[test]
    fn sample_count_is_floor_of_inferences_over_k() {
        for k in 1..=25u32 {
            let mut ctrl = CadenceController::new(1, k).unwrap();
            let sampled = (0..100).filter(|_| ctrl.on_inference()).count() as u64;
            assert_eq!(sampled, 100 / u64::from(k), "k={k}");
        }
    }

    #[test]
    fn default_sampling_hits_twentieth_inference() {
        let mut ctrl = CadenceController::new(1, 20).unwrap();
        let hits: Vec<u64> = (1..=60).filter(|_| ctrl.on_inference()).collect();
        assert_eq!(hits, vec![20, 40, 60]);
    }

    #[test]
    fn counters_are_independent() {
        let mut ctrl = CadenceController::new(2, 1).unwrap();
        ctrl.on_frame();
        ctrl.on_frame();
        ctrl.on_inference();
        let state = ctrl.state();
        assert_eq!(state.frame_counter, 2);
        assert_eq!(state.inference_counter, 1);
    }
}
