//! Detection data structures shared across the pipeline.

/// Axis-aligned bounding box in frame pixel space.
///
/// Invariant: `x1 < x2`, `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn is_valid(&self) -> bool {
        self.x1 < self.x2 && self.y1 < self.y2
    }
}

/// One detected object.
#[derive(Debug, Clone)]
pub struct Detection {
    pub bbox: BoundingBox,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    pub class_id: u32,
    /// Persistent id assigned by the tracker, when tracking is enabled.
    pub track_id: Option<u64>,
}

impl Detection {
    pub fn new(bbox: BoundingBox, confidence: f32, class_id: u32) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
            track_id: None,
        }
    }
}

/// All detections for a single frame, tagged with its capture sequence.
#[derive(Debug, Clone, Default)]
pub struct DetectionResult {
    pub sequence: u64,
    pub detections: Vec<Detection>,
}

/// Default class-name table (VisDrone categories). Ids beyond the table get
/// a numeric fallback.
const CLASS_NAMES: [&str; 10] = [
    "pedestrian",
    "people",
    "bicycle",
    "car",
    "van",
    "truck",
    "tricycle",
    "awning-tricycle",
    "bus",
    "motor",
];

pub fn class_name(class_id: u32) -> String {
    CLASS_NAMES
        .get(class_id as usize)
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("class {class_id}"))
}
