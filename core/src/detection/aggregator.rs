use super::model::{Detection, Provenance};
use super::detector::Detector;
use crate::prelude::{DetectorError, Frame};

/// Per-tick output of both detectors, in orchestration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedDetections {
    pub animals: Vec<Detection>,
    pub general: Vec<Detection>,
    pub saw_animal: bool,
}

impl AggregatedDetections {
    /// Animal detections first, then general ones.
    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.animals.iter().chain(self.general.iter())
    }

    pub fn len(&self) -> usize {
        self.animals.len() + self.general.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs both detectors on the same frame and threshold and tags provenance.
///
/// Overlapping boxes between the two detectors are kept as-is; a detector
/// error aborts the aggregation.
pub struct DetectionAggregator {
    threshold: f32,
}

impl DetectionAggregator {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn aggregate<S, G>(
        &self,
        frame: &Frame,
        specialized: &mut S,
        general: &mut G,
    ) -> Result<AggregatedDetections, DetectorError>
    where
        S: Detector + ?Sized,
        G: Detector + ?Sized,
    {
        let animals = specialized
            .predict(frame, self.threshold)?
            .into_iter()
            .map(|raw| Detection::from_raw(raw, Provenance::Specialized))
            .collect::<Vec<_>>();
        let general = general
            .predict(frame, self.threshold)?
            .into_iter()
            .map(|raw| Detection::from_raw(raw, Provenance::General))
            .collect::<Vec<_>>();

        Ok(AggregatedDetections {
            saw_animal: !animals.is_empty(),
            animals,
            general,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::detector::RawDetection;
    use crate::prelude::FrameSize;

    struct FixedDetector {
        name: &'static str,
        output: Vec<RawDetection>,
        seen_threshold: Option<f32>,
    }

    impl Detector for FixedDetector {
        fn name(&self) -> &str {
            self.name
        }

        fn predict(
            &mut self,
            _frame: &Frame,
            threshold: f32,
        ) -> Result<Vec<RawDetection>, DetectorError> {
            self.seen_threshold = Some(threshold);
            Ok(self.output.clone())
        }
    }

    struct FailingDetector;

    impl Detector for FailingDetector {
        fn name(&self) -> &str {
            "general"
        }

        fn predict(&mut self, _: &Frame, _: f32) -> Result<Vec<RawDetection>, DetectorError> {
            Err(DetectorError::new("general", "model crashed"))
        }
    }

    fn fixed(name: &'static str, output: Vec<RawDetection>) -> FixedDetector {
        FixedDetector {
            name,
            output,
            seen_threshold: None,
        }
    }

    #[test]
    fn aggregate_tags_provenance_and_keeps_duplicates() {
        let frame = Frame::blank(FrameSize::new(64, 64));
        let mut animal = fixed(
            "animal",
            vec![RawDetection::new(1, "Elephant", 0.9, [1.0, 1.0, 20.0, 20.0])],
        );
        let mut general = fixed(
            "general",
            vec![RawDetection::new(20, "elephant", 0.7, [1.0, 1.0, 20.0, 20.0])],
        );

        let out = DetectionAggregator::new(0.5)
            .aggregate(&frame, &mut animal, &mut general)
            .unwrap();

        assert!(out.saw_animal);
        assert_eq!(out.len(), 2);
        assert_eq!(out.animals[0].provenance, Provenance::Specialized);
        assert_eq!(out.general[0].provenance, Provenance::General);
        assert_eq!(animal.seen_threshold, Some(0.5));
        assert_eq!(general.seen_threshold, Some(0.5));
    }

    #[test]
    fn general_only_output_does_not_count_as_animal() {
        let frame = Frame::blank(FrameSize::new(8, 8));
        let mut animal = fixed("animal", vec![]);
        let mut general = fixed(
            "general",
            vec![RawDetection::new(0, "person", 0.8, [0.0, 0.0, 4.0, 4.0])],
        );

        let out = DetectionAggregator::new(0.5)
            .aggregate(&frame, &mut animal, &mut general)
            .unwrap();
        assert!(!out.saw_animal);
        assert_eq!(out.general.len(), 1);
    }

    #[test]
    fn detector_error_propagates() {
        let frame = Frame::blank(FrameSize::new(8, 8));
        let mut animal = fixed("animal", vec![]);
        let err = DetectionAggregator::new(0.5)
            .aggregate(&frame, &mut animal, &mut FailingDetector)
            .unwrap_err();
        assert_eq!(err.detector, "general");
    }
}
