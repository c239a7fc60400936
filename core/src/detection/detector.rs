use crate::prelude::{DetectorError, Frame};

/// Closed taxonomy of the specialized animal detector.
pub const ANIMAL_CLASSES: [&str; 10] = [
    "Buffalo", "Elephant", "Rhino", "Zebra", "Cheetah", "Fox", "Jaguar", "Tiger", "Lion", "Panda",
];

/// One box as returned by a detection model, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub class_id: usize,
    pub class_name: String,
    pub confidence: f32,
    /// `(x1, y1, x2, y2)` in source pixel coordinates.
    pub bbox: [f32; 4],
}

impl RawDetection {
    pub fn new(class_id: usize, class_name: impl Into<String>, confidence: f32, bbox: [f32; 4]) -> Self {
        Self {
            class_id,
            class_name: class_name.into(),
            confidence,
            bbox,
        }
    }
}

/// Boundary to an object-detection model.
///
/// Implementations apply `confidence_threshold` themselves and return every
/// box at or above it. Errors are never swallowed by the caller.
pub trait Detector {
    /// Short name used in diagnostics, e.g. `"animal"` or `"general"`.
    fn name(&self) -> &str;

    fn predict(
        &mut self,
        frame: &Frame,
        confidence_threshold: f32,
    ) -> Result<Vec<RawDetection>, DetectorError>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn predict(
        &mut self,
        frame: &Frame,
        confidence_threshold: f32,
    ) -> Result<Vec<RawDetection>, DetectorError> {
        (**self).predict(frame, confidence_threshold)
    }
}
