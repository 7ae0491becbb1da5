use std::collections::VecDeque;

use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::Detection;

/// Scripted stub backend for tests and model-free deployments.
///
/// Constructed with a per-frame script: call `n` returns the `n`-th scripted
/// detection list. An exhausted (or empty) script yields no detections, so
/// the stub doubles as a "camera with nothing in front of it".
pub struct StubBackend {
    script: VecDeque<Vec<Detection>>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
        }
    }

    pub fn with_script(frames: Vec<Vec<Detection>>) -> Self {
        Self {
            script: frames.into(),
        }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<Vec<Detection>> {
        Ok(self.script.pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoundingBox;

    #[test]
    fn script_is_consumed_in_order_then_empty() {
        let det = Detection::new(
            BoundingBox { x1: 1, y1: 2, x2: 30, y2: 40 },
            "car",
            0.8,
        );
        let mut backend = StubBackend::with_script(vec![vec![], vec![det.clone()]]);

        assert!(backend.detect(&[], 640, 480).unwrap().is_empty());
        assert_eq!(backend.detect(&[], 640, 480).unwrap(), vec![det]);
        assert!(backend.detect(&[], 640, 480).unwrap().is_empty());
    }
}
