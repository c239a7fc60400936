use image::{ImageBuffer, Rgb, RgbImage};
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::PathBuf;
use std::time::Duration;

/// Pixel dimensions of a camera frame or video session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A single BGR frame laid out as `(height, width, channel)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pixels: Array3<u8>,
}

impl Frame {
    pub const CHANNELS: usize = 3;

    pub fn new(pixels: Array3<u8>) -> Self {
        Self { pixels }
    }

    /// Wraps packed BGR bytes; `None` if the length does not match `size`.
    pub fn from_bgr(size: FrameSize, bytes: Vec<u8>) -> Option<Self> {
        Array3::from_shape_vec(
            (size.height as usize, size.width as usize, Self::CHANNELS),
            bytes,
        )
        .ok()
        .map(Self::new)
    }

    pub fn blank(size: FrameSize) -> Self {
        Self {
            pixels: Array3::zeros((size.height as usize, size.width as usize, Self::CHANNELS)),
        }
    }

    pub fn size(&self) -> FrameSize {
        let (height, width, _) = self.pixels.dim();
        FrameSize::new(width as u32, height as u32)
    }

    pub fn pixels(&self) -> &Array3<u8> {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut Array3<u8> {
        &mut self.pixels
    }

    /// Row-major BGR bytes, copied only when the array is not contiguous.
    pub fn as_bytes(&self) -> Cow<'_, [u8]> {
        match self.pixels.as_slice() {
            Some(bytes) => Cow::Borrowed(bytes),
            None => Cow::Owned(self.pixels.iter().copied().collect()),
        }
    }

    /// Mutable image view over the pixel buffer for drawing. Channels keep
    /// their BGR order, so colors passed to it must be BGR as well.
    pub fn canvas_mut(&mut self) -> Option<ImageBuffer<Rgb<u8>, &mut [u8]>> {
        if !self.pixels.is_standard_layout() {
            self.pixels = self.pixels.as_standard_layout().into_owned();
        }
        let FrameSize { width, height } = self.size();
        ImageBuffer::from_raw(width, height, self.pixels.as_slice_mut()?)
    }

    /// Copy of the frame in RGB order, ready for `image` encoders.
    pub fn to_rgb_image(&self) -> RgbImage {
        let FrameSize { width, height } = self.size();
        RgbImage::from_fn(width, height, |x, y| {
            let (x, y) = (x as usize, y as usize);
            Rgb([
                self.pixels[[y, x, 2]],
                self.pixels[[y, x, 1]],
                self.pixels[[y, x, 0]],
            ])
        })
    }
}

/// Settings for recording sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub duration_secs: f64,
    pub fps: f64,
    pub codec: String,
    pub container_extension: String,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            duration_secs: 5.0,
            fps: 20.0,
            codec: "XVID".into(),
            container_extension: "avi".into(),
        }
    }
}

impl RecordingConfig {
    /// Session length. Values too large for a `Duration` saturate instead of panicking.
    pub fn duration(&self) -> Duration {
        if self.duration_secs.is_nan() || self.duration_secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(self.duration_secs).unwrap_or(Duration::MAX)
    }
}

/// Settings for the alert dispatcher and its policy table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub asset: PathBuf,
    pub dangerous_species: Vec<String>,
    pub workers: usize,
    pub queue_capacity: usize,
    pub shutdown_timeout_ms: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            asset: PathBuf::from("lion.mp3"),
            dangerous_species: crate::alert::DEFAULT_DANGEROUS_SPECIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            workers: 4,
            queue_capacity: 32,
            shutdown_timeout_ms: 2_000,
        }
    }
}

impl AlertConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Backoff applied by the run loop while the camera yields no frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 1,
            max_backoff_ms: 50,
        }
    }
}

/// Shared configuration for the whole pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub confidence_threshold: f32,
    pub save_folder: PathBuf,
    pub log_file: String,
    pub recording: RecordingConfig,
    pub alerts: AlertConfig,
    pub frame_retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            save_folder: PathBuf::from("detections"),
            log_file: "detection_log.txt".into(),
            recording: RecordingConfig::default(),
            alerts: AlertConfig::default(),
            frame_retry: RetryConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn log_path(&self) -> PathBuf {
        self.save_folder.join(&self.log_file)
    }
}

/// Failure reported by one of the two detectors.
#[derive(thiserror::Error, Debug)]
#[error("{detector} detector failed: {reason}")]
pub struct DetectorError {
    pub detector: String,
    pub reason: String,
}

impl DetectorError {
    pub fn new(detector: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            detector: detector.into(),
            reason: reason.into(),
        }
    }
}

/// Video writer failures. None of them may be swallowed.
#[derive(thiserror::Error, Debug)]
pub enum RecordingError {
    #[error("failed to open video writer {path}: {reason}")]
    Open { path: PathBuf, reason: String },
    #[error("failed to write frame to {path}: {reason}")]
    Write { path: PathBuf, reason: String },
    #[error("failed to close video writer {path}: {reason}")]
    Close { path: PathBuf, reason: String },
    #[error("frame is {actual:?} but the session records {expected:?}")]
    FrameSize {
        expected: FrameSize,
        actual: FrameSize,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum LogWriteError {
    #[error("failed to append to event log {target}: {source}")]
    Io {
        target: String,
        #[source]
        source: std::io::Error,
    },
    #[error("event log lock poisoned")]
    Poisoned,
}

#[derive(thiserror::Error, Debug)]
pub enum AlertError {
    #[error("alert runtime unavailable: {0}")]
    Runtime(String),
    #[error("playback failed: {0}")]
    Playback(String),
}

/// Error taxonomy for a tick and for pipeline startup. A missing frame is
/// not an error; it is reported as a tick outcome.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("camera initialization failed: {0}")]
    CameraInit(String),
    #[error(transparent)]
    Detector(#[from] DetectorError),
    #[error(transparent)]
    Recording(#[from] RecordingError),
    #[error(transparent)]
    LogWrite(#[from] LogWriteError),
    #[error(transparent)]
    Alert(#[from] AlertError),
    #[error("render surface failure: {0}")]
    Render(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
