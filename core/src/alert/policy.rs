use crate::detection::{Detection, ANIMAL_CLASSES};
use crate::prelude::AlertConfig;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertAction {
    Play,
    Silent,
}

/// Class label to alert action. Labels absent from the table are silent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertPolicy {
    table: HashMap<String, AlertAction>,
}

impl AlertPolicy {
    pub fn from_species<I, S>(species: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: species
                .into_iter()
                .map(|label| (label.into(), AlertAction::Play))
                .collect(),
        }
    }

    /// Configured species play; the rest of the animal taxonomy is explicitly silent.
    pub fn from_config(config: &AlertConfig) -> Self {
        ANIMAL_CLASSES.iter().fold(
            Self::from_species(config.dangerous_species.iter().cloned()),
            |policy, label| {
                if policy.table.contains_key(*label) {
                    policy
                } else {
                    policy.with_action(*label, AlertAction::Silent)
                }
            },
        )
    }

    pub fn with_action(mut self, label: impl Into<String>, action: AlertAction) -> Self {
        self.table.insert(label.into(), action);
        self
    }

    pub fn action_for(&self, label: &str) -> AlertAction {
        self.table.get(label).copied().unwrap_or(AlertAction::Silent)
    }

    /// Only specialized-taxonomy detections are ever alerted.
    pub fn should_alert(&self, detection: &Detection) -> bool {
        detection.is_animal() && self.action_for(&detection.class_label) == AlertAction::Play
    }

    pub fn alerting_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self
            .table
            .iter()
            .filter(|(_, action)| **action == AlertAction::Play)
            .map(|(label, _)| label.as_str())
            .collect();
        labels.sort_unstable();
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Provenance, RawDetection};

    fn det(label: &str, provenance: Provenance) -> Detection {
        Detection::from_raw(RawDetection::new(0, label, 0.9, [0.0, 0.0, 1.0, 1.0]), provenance)
    }

    fn stock() -> AlertPolicy {
        AlertPolicy::from_config(&AlertConfig::default())
    }

    #[test]
    fn stock_policy_covers_taxonomy() {
        let policy = stock();
        let alerting: Vec<&str> = ANIMAL_CLASSES
            .iter()
            .copied()
            .filter(|label| policy.action_for(label) == AlertAction::Play)
            .collect();
        assert_eq!(
            alerting,
            vec!["Buffalo", "Elephant", "Rhino", "Cheetah", "Jaguar", "Tiger", "Lion"]
        );
        for label in ["Zebra", "Fox", "Panda"] {
            assert_eq!(policy.action_for(label), AlertAction::Silent);
        }
        assert_eq!(policy.alerting_labels().len(), 7);
    }

    #[test]
    fn matching_is_exact() {
        let policy = stock();
        assert!(!policy.should_alert(&det("rhino", Provenance::Specialized)));
        assert!(policy.should_alert(&det("Rhino", Provenance::Specialized)));
    }

    #[test]
    fn general_detections_never_alert() {
        let policy = stock();
        assert!(!policy.should_alert(&det("Lion", Provenance::General)));
    }

    #[test]
    fn configured_species_replace_defaults() {
        let policy = AlertPolicy::from_config(&AlertConfig {
            dangerous_species: vec!["Zebra".into()],
            ..AlertConfig::default()
        });
        assert!(policy.should_alert(&det("Zebra", Provenance::Specialized)));
        assert!(!policy.should_alert(&det("Lion", Provenance::Specialized)));
        assert_eq!(policy.alerting_labels(), vec!["Zebra"]);
        assert_eq!(policy.action_for("Lion"), AlertAction::Silent);
    }
}
