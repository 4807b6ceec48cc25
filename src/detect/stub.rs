//! Stub detector for the demo binary.

use crate::capture::synthetic::square_at;
use crate::capture::Frame;
use crate::detect::backend::Detector;
use crate::detect::types::{BoundingBox, Detection};
use crate::error::PipelineError;

/// Recomputes the synthetic source's orbiting square from each frame's
/// sequence number instead of running a model.
pub struct MovingBoxDetector {
    class_id: u32,
    confidence: f32,
}

impl MovingBoxDetector {
    pub fn new(class_id: u32, confidence: f32) -> Self {
        Self {
            class_id,
            confidence,
        }
    }
}

impl Default for MovingBoxDetector {
    fn default() -> Self {
        Self::new(3, 0.87)
    }
}

impl Detector for MovingBoxDetector {
    fn infer(
        &mut self,
        batch: &[Frame],
        confidence_floor: f32,
    ) -> Result<Vec<Vec<Detection>>, PipelineError> {
        Ok(batch
            .iter()
            .map(|frame| {
                if self.confidence < confidence_floor {
                    return Vec::new();
                }
                let (x1, y1, x2, y2) = square_at(frame.sequence(), frame.width(), frame.height());
                vec![Detection::new(
                    BoundingBox::new(x1, y1, x2, y2),
                    self.confidence,
                    self.class_id,
                )]
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureSource, SyntheticSource};

    #[test]
    fn one_result_per_input_frame() {
        let mut src = SyntheticSource::new(64, 64, 0.0);
        src.open().unwrap();
        let batch: Vec<Frame> = (0..3).map(|_| src.read_frame().unwrap()).collect();

        let mut detector = MovingBoxDetector::default();
        let results = detector.infer(&batch, 0.5).unwrap();
        assert_eq!(results.len(), 3);
        for dets in &results {
            assert_eq!(dets.len(), 1);
            assert!(dets[0].bbox.is_valid());
        }
    }

    #[test]
    fn floor_above_stub_confidence_suppresses_output() {
        let mut src = SyntheticSource::new(64, 64, 0.0);
        src.open().unwrap();
        let batch = vec![src.read_frame().unwrap()];

        let mut detector = MovingBoxDetector::new(0, 0.4);
        let results = detector.infer(&batch, 0.9).unwrap();
        assert!(results[0].is_empty());
    }
}
