//! Inference and tracking seams.
//!
//! The model and the multi-object tracker are opaque capabilities: the
//! pipeline hands them batches of frames (or per-frame detections) and gets
//! results back in input order. Connect a real backend by implementing
//! [`Detector`], and optionally [`ObjectTracker`].

use crate::capture::Frame;
use crate::detect::types::Detection;
use crate::error::PipelineError;

/// Batch inference capability. One result vector per input frame,
/// order-preserving.
pub trait Detector: Send {
    fn infer(
        &mut self,
        batch: &[Frame],
        confidence_floor: f32,
    ) -> Result<Vec<Vec<Detection>>, PipelineError>;
}

/// Optional tracking capability: detections in, detections with persistent
/// track ids out.
pub trait ObjectTracker: Send {
    fn update(&mut self, detections: &[Detection], frame: &Frame) -> Vec<Detection>;
}

/// Centroid-distance tracker used by the demo binary.
///
/// Matches each detection to the nearest previous centroid within a gate
/// radius, otherwise assigns a fresh id. Not a substitute for a real tracker;
/// good enough to exercise the track-id path end to end.
pub struct CentroidTracker {
    tracks: Vec<(u64, f32, f32)>,
    next_id: u64,
    gate_radius: f32,
}

impl CentroidTracker {
    pub fn new(gate_radius: f32) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            gate_radius,
        }
    }
}

impl Default for CentroidTracker {
    fn default() -> Self {
        Self::new(64.0)
    }
}

impl ObjectTracker for CentroidTracker {
    fn update(&mut self, detections: &[Detection], _frame: &Frame) -> Vec<Detection> {
        let mut out = Vec::with_capacity(detections.len());
        let mut next_tracks = Vec::with_capacity(detections.len());

        for det in detections {
            let (cx, cy) = det.bbox.center();
            let nearest = self
                .tracks
                .iter()
                .map(|&(id, tx, ty)| (id, ((cx - tx).powi(2) + (cy - ty).powi(2)).sqrt()))
                .filter(|&(_, dist)| dist <= self.gate_radius)
                .min_by(|a, b| a.1.total_cmp(&b.1));

            let id = match nearest {
                Some((id, _)) => id,
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    id
                }
            };

            next_tracks.push((id, cx, cy));
            let mut tracked = det.clone();
            tracked.track_id = Some(id);
            out.push(tracked);
        }

        self.tracks = next_tracks;
        out
    }
}
