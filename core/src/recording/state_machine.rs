use super::sink::{FrameWriter, VideoSink, VideoSpec};
use crate::pipeline::clock::Timestamp;
use crate::prelude::{Frame, FrameSize, RecordingConfig, RecordingError};
use crate::telemetry::log::LogManager;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Video file names are `<YYYYMMDD_HHMMSS>.<extension>`.
pub const VIDEO_NAME_FORMAT: &str = "%Y%m%d_%H%M%S";

/// The single live video-writing interval.
pub struct RecordingSession {
    started_at: Duration,
    video_path: PathBuf,
    frames_written: u64,
    writer: Box<dyn FrameWriter>,
}

impl RecordingSession {
    pub fn started_at(&self) -> Duration {
        self.started_at
    }

    pub fn video_path(&self) -> &Path {
        &self.video_path
    }
}

impl fmt::Debug for RecordingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingSession")
            .field("started_at", &self.started_at)
            .field("video_path", &self.video_path)
            .field("frames_written", &self.frames_written)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub enum RecorderState {
    #[default]
    Idle,
    Recording(RecordingSession),
}

/// Observable effect of feeding the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Stay,
    Started {
        path: PathBuf,
        at: Duration,
    },
    Stopped {
        path: PathBuf,
        elapsed: Duration,
        frames: u64,
    },
}

/// Owns the recorder state and the only live [`FrameWriter`].
///
/// `Idle -> Recording` on the first tick that saw an animal. A session lasts
/// a fixed duration from its start; later detections neither extend nor
/// restart it.
pub struct RecordingStateMachine {
    state: RecorderState,
    sink: Box<dyn VideoSink>,
    config: RecordingConfig,
    folder: PathBuf,
    frame_size: FrameSize,
    logger: LogManager,
}

impl RecordingStateMachine {
    pub fn new(
        sink: Box<dyn VideoSink>,
        config: RecordingConfig,
        folder: impl Into<PathBuf>,
        frame_size: FrameSize,
    ) -> Self {
        Self {
            state: RecorderState::Idle,
            sink,
            config,
            folder: folder.into(),
            frame_size,
            logger: LogManager::new("recorder"),
        }
    }

    pub fn state(&self) -> &RecorderState {
        &self.state
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, RecorderState::Recording(_))
    }

    pub fn active_video(&self) -> Option<&Path> {
        match &self.state {
            RecorderState::Recording(session) => Some(session.video_path()),
            RecorderState::Idle => None,
        }
    }

    pub fn video_path_for(&self, now: &Timestamp) -> PathBuf {
        self.folder.join(format!(
            "{}.{}",
            now.wall.format(VIDEO_NAME_FORMAT),
            self.config.container_extension
        ))
    }

    /// Applies this tick's detection outcome. A failed open leaves the machine idle.
    pub fn observe(
        &mut self,
        saw_animal: bool,
        now: &Timestamp,
    ) -> Result<Transition, RecordingError> {
        if !saw_animal || self.is_recording() {
            return Ok(Transition::Stay);
        }

        let spec = VideoSpec {
            path: self.video_path_for(now),
            codec: self.config.codec.clone(),
            fps: self.config.fps,
            frame_size: self.frame_size,
        };
        let writer = self.sink.open(&spec)?;
        self.logger
            .record(&format!("Recording started: {}", spec.path.display()));
        self.state = RecorderState::Recording(RecordingSession {
            started_at: now.monotonic,
            video_path: spec.path.clone(),
            frames_written: 0,
            writer,
        });

        Ok(Transition::Started {
            path: spec.path,
            at: now.monotonic,
        })
    }

    /// Appends the tick's frame to the live session, then closes it once the
    /// configured duration has elapsed.
    ///
    /// A failed write abandons the session so the next animal opens a fresh file.
    pub fn append(&mut self, frame: &Frame, now: &Timestamp) -> Result<Transition, RecordingError> {
        let RecorderState::Recording(session) = &mut self.state else {
            return Ok(Transition::Stay);
        };

        if let Err(err) = session.writer.write(frame) {
            if let RecorderState::Recording(session) = std::mem::take(&mut self.state) {
                if let Err(close_err) = session.writer.close() {
                    self.logger
                        .warn(&format!("closing abandoned session failed: {}", close_err));
                }
            }
            self.logger.fail(&format!("Recording aborted: {}", err));
            return Err(err);
        }
        session.frames_written += 1;

        if now.monotonic.saturating_sub(session.started_at) >= self.config.duration() {
            return self.close(now);
        }
        Ok(Transition::Stay)
    }

    /// Closes the live session, if any. Used at the duration boundary and on shutdown.
    pub fn close(&mut self, now: &Timestamp) -> Result<Transition, RecordingError> {
        let RecorderState::Recording(session) = std::mem::take(&mut self.state) else {
            return Ok(Transition::Stay);
        };
        let RecordingSession {
            started_at,
            video_path,
            frames_written,
            writer,
        } = session;
        writer.close()?;

        self.logger.record(&format!(
            "Recording stopped: {} ({} frames)",
            video_path.display(),
            frames_written
        ));
        Ok(Transition::Stopped {
            path: video_path,
            elapsed: now.monotonic.saturating_sub(started_at),
            frames: frames_written,
        })
    }
}
