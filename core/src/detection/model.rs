use super::detector::RawDetection;
use serde::{Deserialize, Serialize};

/// Which detector produced a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    Specialized,
    General,
}

/// Box in source pixel coordinates, normalized so that `x1 <= x2` and `y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// Integer box, truncated toward zero from a [`BoundingBox`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn truncated(&self) -> PixelBox {
        PixelBox {
            x1: self.x1.trunc() as i32,
            y1: self.y1.trunc() as i32,
            x2: self.x2.trunc() as i32,
            y2: self.y2.trunc() as i32,
        }
    }

    pub fn center(&self) -> (i32, i32) {
        (
            ((self.x1 + self.x2) / 2.0).trunc() as i32,
            ((self.y1 + self.y2) / 2.0).trunc() as i32,
        )
    }
}

/// Normalized detection consumed within a single tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub center: (i32, i32),
    pub provenance: Provenance,
}

impl Detection {
    pub fn from_raw(raw: RawDetection, provenance: Provenance) -> Self {
        let [x1, y1, x2, y2] = raw.bbox;
        let bbox = BoundingBox::new(x1, y1, x2, y2);
        Self {
            class_label: raw.class_name,
            confidence: raw.confidence.clamp(0.0, 1.0),
            center: bbox.center(),
            bbox,
            provenance,
        }
    }

    pub fn is_animal(&self) -> bool {
        self.provenance == Provenance::Specialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_orders_corners_and_computes_center() {
        let raw = RawDetection::new(1, "Elephant", 0.83, [50.0, 60.0, 10.0, 10.0]);
        let det = Detection::from_raw(raw, Provenance::Specialized);
        assert_eq!(det.bbox, BoundingBox::new(10.0, 10.0, 50.0, 60.0));
        assert_eq!(det.center, (30, 35));
        assert!(det.is_animal());
    }

    #[test]
    fn truncation_drops_fraction_without_rounding() {
        let bbox = BoundingBox::new(10.9, 20.5, 30.99, 40.01);
        assert_eq!(
            bbox.truncated(),
            PixelBox {
                x1: 10,
                y1: 20,
                x2: 30,
                y2: 40
            }
        );
    }
}
