pub mod backend;
pub mod stub;
pub mod types;

pub use backend::{CentroidTracker, Detector, ObjectTracker};
pub use stub::MovingBoxDetector;
pub use types::{class_name, BoundingBox, Detection, DetectionResult};
