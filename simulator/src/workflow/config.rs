use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use wildcore::prelude::PipelineConfig;

/// Synthetic camera settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    /// Chance that a read yields no frame.
    pub drop_probability: f64,
    /// End the stream after this many frames.
    pub max_frames: Option<usize>,
    /// Advance a simulated clock by `1 / fps` per frame instead of using wall time.
    pub simulated_fps: Option<f64>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            seed: 0,
            drop_probability: 0.0,
            max_frames: None,
            simulated_fps: None,
        }
    }
}

/// Random detector settings, used when no scenario file is given.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub scenario: Option<PathBuf>,
    pub animal_probability: f64,
    pub general_probability: f64,
    pub seed: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            scenario: None,
            animal_probability: 0.05,
            general_probability: 0.2,
            seed: 7,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub max_ticks: Option<usize>,
    /// Save the last annotated frame here on close; the extension picks the format.
    pub snapshot: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub pipeline: PipelineConfig,
    pub camera: CameraConfig,
    pub detectors: DetectorConfig,
    pub display: DisplayConfig,
    /// Audio player command line; the asset path is appended.
    pub player: Option<String>,
    pub encoder: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            camera: CameraConfig::default(),
            detectors: DetectorConfig::default(),
            display: DisplayConfig::default(),
            player: None,
            encoder: "ffmpeg".into(),
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_args(threshold: f32, width: u32, height: u32, save_folder: PathBuf) -> Self {
        let mut config = Self::default();
        config.pipeline.confidence_threshold = threshold;
        config.pipeline.save_folder = save_folder;
        config.camera.width = width;
        config.camera.height = height;
        config
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let threshold = self.pipeline.confidence_threshold;
        anyhow::ensure!(
            (0.0..=1.0).contains(&threshold),
            "confidence_threshold {} outside 0..=1",
            threshold
        );
        let recording = &self.pipeline.recording;
        anyhow::ensure!(
            recording.fps.is_finite() && recording.fps > 0.0,
            "recording fps {} must be positive and finite",
            recording.fps
        );
        anyhow::ensure!(
            recording.duration_secs.is_finite() && recording.duration_secs > 0.0,
            "recording duration_secs {} must be positive and finite",
            recording.duration_secs
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.camera.drop_probability),
            "drop_probability outside 0..=1"
        );
        if let Some(fps) = self.camera.simulated_fps {
            anyhow::ensure!(
                frame_interval(fps).is_some(),
                "simulated_fps {} does not give a usable frame interval",
                fps
            );
        }
        Ok(())
    }
}

/// `1 / fps` as a `Duration`, or `None` when `fps` is not a positive rate
/// whose interval fits.
pub fn frame_interval(fps: f64) -> Option<Duration> {
    if !(fps.is_finite() && fps > 0.0) {
        return None;
    }
    Duration::try_from_secs_f64(1.0 / fps).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_sets_pipeline_and_camera() {
        let cfg = WorkflowConfig::from_args(0.4, 320, 240, PathBuf::from("out"));
        assert_eq!(cfg.pipeline.confidence_threshold, 0.4);
        assert_eq!(cfg.pipeline.log_path(), PathBuf::from("out/detection_log.txt"));
        assert_eq!((cfg.camera.width, cfg.camera.height), (320, 240));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn config_load_reads_yaml_with_defaults() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"pipeline:\n  confidence_threshold: 0.6\n  recording:\n    duration_secs: 2.5\n  alerts:\n    dangerous_species: [Lion]\ncamera:\n  width: 160\n  height: 120\n  max_frames: 10\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();

        assert_eq!(cfg.pipeline.confidence_threshold, 0.6);
        assert_eq!(cfg.pipeline.recording.duration_secs, 2.5);
        assert_eq!(cfg.pipeline.recording.fps, 20.0);
        assert_eq!(cfg.pipeline.alerts.dangerous_species, vec!["Lion".to_string()]);
        assert_eq!(cfg.camera.max_frames, Some(10));
        assert_eq!(cfg.encoder, "ffmpeg");
    }

    #[test]
    fn config_load_rejects_bad_threshold() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"pipeline:\n  confidence_threshold: 1.5\n").unwrap();
        let path = temp.into_temp_path();
        assert!(WorkflowConfig::load(&path).is_err());
    }

    #[test]
    fn validate_rejects_unrepresentable_durations_and_rates() {
        let mut cfg = WorkflowConfig::default();
        cfg.pipeline.recording.duration_secs = f64::INFINITY;
        assert!(cfg.validate().is_err());
        cfg.pipeline.recording.duration_secs = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = WorkflowConfig::default();
        cfg.camera.simulated_fps = Some(1e-300);
        assert!(cfg.validate().is_err());
        cfg.camera.simulated_fps = Some(f64::NAN);
        assert!(cfg.validate().is_err());
        cfg.camera.simulated_fps = Some(25.0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn config_load_rejects_infinite_duration() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"pipeline:\n  recording:\n    duration_secs: .inf\n")
            .unwrap();
        let path = temp.into_temp_path();
        let err = WorkflowConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("duration_secs"));
    }

    #[test]
    fn frame_interval_matches_rate() {
        assert_eq!(frame_interval(20.0), Some(Duration::from_millis(50)));
        assert_eq!(frame_interval(0.0), None);
        assert_eq!(frame_interval(1e-300), None);
    }
}
