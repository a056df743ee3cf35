//! Frame: one captured image and its sequence number

/// A captured frame.
///
/// The payload is opaque to everything except the classifier. A frame is
/// consumed by exactly one classify call and dropped at the end of its cycle.
#[derive(Debug, Clone)]
pub struct Frame {
    sequence: u64,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(sequence: u64, data: Vec<u8>) -> Self {
        Self { sequence, data }
    }

    /// Monotonic sequence number assigned by the source (first frame is 1).
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
