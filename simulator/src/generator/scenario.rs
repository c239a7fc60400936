use anyhow::Context;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use wildcore::detection::{Detector, RawDetection, ANIMAL_CLASSES};
use wildcore::prelude::{DetectorError, Frame};

/// Subset of the open general taxonomy the simulator draws from.
pub const GENERAL_CLASSES: [&str; 13] = [
    "person", "bicycle", "car", "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra",
    "giraffe", "bird", "cat",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedBox {
    pub class: String,
    pub confidence: f32,
    pub bbox: [f32; 4],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioTick {
    /// Zero-based index of the frame, counting only frames that reached the detectors.
    pub tick: usize,
    pub animals: Vec<ScriptedBox>,
    pub general: Vec<ScriptedBox>,
}

/// Scripted detector output keyed by tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub ticks: Vec<ScenarioTick>,
}

impl Scenario {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading scenario {}", path_ref.display()))?;
        Self::from_yaml(&contents).with_context(|| format!("parsing scenario {}", path_ref.display()))
    }

    pub fn from_yaml(contents: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }
}

/// Replays one taxonomy of a [`Scenario`].
pub struct ScenarioDetector {
    name: &'static str,
    closed_taxonomy: bool,
    classes: Vec<&'static str>,
    by_tick: HashMap<usize, Vec<ScriptedBox>>,
    tick: usize,
}

impl ScenarioDetector {
    pub fn animals(scenario: &Scenario) -> Self {
        Self::build("animal", true, ANIMAL_CLASSES.to_vec(), scenario, |t| &t.animals)
    }

    pub fn general(scenario: &Scenario) -> Self {
        Self::build("general", false, GENERAL_CLASSES.to_vec(), scenario, |t| &t.general)
    }

    fn build(
        name: &'static str,
        closed_taxonomy: bool,
        classes: Vec<&'static str>,
        scenario: &Scenario,
        pick: impl Fn(&ScenarioTick) -> &Vec<ScriptedBox>,
    ) -> Self {
        let mut by_tick: HashMap<usize, Vec<ScriptedBox>> = HashMap::new();
        for entry in &scenario.ticks {
            by_tick
                .entry(entry.tick)
                .or_default()
                .extend(pick(entry).iter().cloned());
        }
        Self {
            name,
            closed_taxonomy,
            classes,
            by_tick,
            tick: 0,
        }
    }

    fn class_id(&self, label: &str) -> Result<usize, DetectorError> {
        match self.classes.iter().position(|c| *c == label) {
            Some(id) => Ok(id),
            None if self.closed_taxonomy => Err(DetectorError::new(
                self.name,
                format!("class {:?} is not in the taxonomy", label),
            )),
            None => Ok(self.classes.len()),
        }
    }
}

impl Detector for ScenarioDetector {
    fn name(&self) -> &str {
        self.name
    }

    fn predict(
        &mut self,
        _frame: &Frame,
        confidence_threshold: f32,
    ) -> Result<Vec<RawDetection>, DetectorError> {
        let boxes = self.by_tick.remove(&self.tick).unwrap_or_default();
        self.tick += 1;
        boxes
            .into_iter()
            .filter(|b| b.confidence >= confidence_threshold)
            .map(|b| {
                let id = self.class_id(&b.class)?;
                Ok(RawDetection::new(id, b.class, b.confidence, b.bbox))
            })
            .collect()
    }
}

/// Emits at most one random box per frame with a fixed probability.
pub struct RandomDetector {
    name: &'static str,
    classes: &'static [&'static str],
    probability: f64,
    rng: StdRng,
}

impl RandomDetector {
    pub fn animals(probability: f64, seed: u64) -> Self {
        Self::new("animal", &ANIMAL_CLASSES, probability, seed)
    }

    pub fn general(probability: f64, seed: u64) -> Self {
        Self::new("general", &GENERAL_CLASSES, probability, seed)
    }

    fn new(
        name: &'static str,
        classes: &'static [&'static str],
        probability: f64,
        seed: u64,
    ) -> Self {
        Self {
            name,
            classes,
            probability: probability.clamp(0.0, 1.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Detector for RandomDetector {
    fn name(&self) -> &str {
        self.name
    }

    fn predict(
        &mut self,
        frame: &Frame,
        confidence_threshold: f32,
    ) -> Result<Vec<RawDetection>, DetectorError> {
        if self.probability == 0.0 || !self.rng.gen_bool(self.probability) {
            return Ok(Vec::new());
        }

        let size = frame.size();
        let (w, h) = (size.width.max(4) as f32, size.height.max(4) as f32);
        let class_id = self.rng.gen_range(0..self.classes.len());
        let floor = confidence_threshold.clamp(0.0, 1.0);
        let confidence = if floor < 1.0 {
            self.rng.gen_range(floor..1.0)
        } else {
            1.0
        };
        let x1 = self.rng.gen_range(0.0..w / 2.0);
        let y1 = self.rng.gen_range(0.0..h / 2.0);
        let x2 = x1 + self.rng.gen_range(1.0..w / 2.0);
        let y2 = y1 + self.rng.gen_range(1.0..h / 2.0);

        Ok(vec![RawDetection::new(
            class_id,
            self.classes[class_id],
            confidence,
            [x1, y1, x2, y2],
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wildcore::prelude::FrameSize;

    const SCENARIO: &str = r#"
ticks:
  - tick: 0
    animals:
      - { class: Elephant, confidence: 0.83, bbox: [10, 10, 50, 60] }
      - { class: Zebra, confidence: 0.3, bbox: [0, 0, 5, 5] }
    general:
      - { class: person, confidence: 0.7, bbox: [1, 2, 3, 4] }
  - tick: 2
    animals:
      - { class: Lion, confidence: 0.9, bbox: [5, 5, 20, 20] }
"#;

    fn frame() -> Frame {
        Frame::blank(FrameSize::new(64, 48))
    }

    #[test]
    fn scenario_replays_per_tick_and_applies_threshold() {
        let scenario = Scenario::from_yaml(SCENARIO).unwrap();
        let mut animals = ScenarioDetector::animals(&scenario);
        let mut general = ScenarioDetector::general(&scenario);

        let first = animals.predict(&frame(), 0.5).unwrap();
        assert_eq!(
            first,
            vec![RawDetection::new(1, "Elephant", 0.83, [10.0, 10.0, 50.0, 60.0])]
        );
        assert_eq!(general.predict(&frame(), 0.5).unwrap()[0].class_id, 0);

        assert!(animals.predict(&frame(), 0.5).unwrap().is_empty());
        let third = animals.predict(&frame(), 0.5).unwrap();
        assert_eq!(third[0].class_name, "Lion");
        assert_eq!(third[0].class_id, 8);
    }

    #[test]
    fn unknown_animal_class_is_a_detector_error() {
        let scenario = Scenario::from_yaml(
            "ticks:\n  - tick: 0\n    animals:\n      - { class: Dragon, confidence: 0.9, bbox: [0, 0, 1, 1] }\n",
        )
        .unwrap();
        let mut animals = ScenarioDetector::animals(&scenario);
        let err = animals.predict(&frame(), 0.5).unwrap_err();
        assert_eq!(err.detector, "animal");
    }

    #[test]
    fn random_detector_respects_probability_and_threshold() {
        let mut never = RandomDetector::animals(0.0, 1);
        assert!(never.predict(&frame(), 0.5).unwrap().is_empty());

        let mut always = RandomDetector::general(1.0, 1);
        for _ in 0..20 {
            let out = always.predict(&frame(), 0.5).unwrap();
            assert_eq!(out.len(), 1);
            assert!(out[0].confidence >= 0.5);
            let [x1, y1, x2, y2] = out[0].bbox;
            assert!(x1 < x2 && y1 < y2);
        }
    }
}
