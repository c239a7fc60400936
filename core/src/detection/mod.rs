pub mod aggregator;
pub mod detector;
pub mod model;

pub use aggregator::{AggregatedDetections, DetectionAggregator};
pub use detector::{Detector, RawDetection, ANIMAL_CLASSES};
pub use model::{BoundingBox, Detection, PixelBox, Provenance};
