use super::sink::{FrameWriter, VideoSink, VideoSpec};
use crate::prelude::{Frame, FrameSize, RecordingError};
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread;
use std::time::Duration;

/// How long `open` waits before checking that the encoder is still running.
const STARTUP_GRACE: Duration = Duration::from_millis(150);

/// Encodes sessions by piping raw BGR frames into an `ffmpeg` child process.
pub struct FfmpegSink {
    program: String,
}

impl FfmpegSink {
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments for one session, output path last.
    pub fn arguments(spec: &VideoSpec) -> Vec<String> {
        let size = format!("{}x{}", spec.frame_size.width, spec.frame_size.height);
        let mut args: Vec<String> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-y",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "bgr24",
            "-s",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(size);
        args.extend(["-r".to_string(), spec.fps.to_string()]);
        args.extend(["-i", "-", "-an", "-c:v"].iter().map(|s| s.to_string()));
        args.push(encoder_for(&spec.codec).to_string());
        args.extend(["-vtag".to_string(), spec.codec.clone()]);
        args.push(spec.path.display().to_string());
        args
    }
}

impl Default for FfmpegSink {
    fn default() -> Self {
        Self::new()
    }
}

fn encoder_for(fourcc: &str) -> &'static str {
    match fourcc.to_ascii_uppercase().as_str() {
        "MJPG" => "mjpeg",
        "H264" | "X264" | "AVC1" => "libx264",
        _ => "mpeg4",
    }
}

impl VideoSink for FfmpegSink {
    fn open(&mut self, spec: &VideoSpec) -> Result<Box<dyn FrameWriter>, RecordingError> {
        let open_err = |reason: String| RecordingError::Open {
            path: spec.path.clone(),
            reason,
        };
        if let Some(parent) = spec.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| open_err(e.to_string()))?;
        }

        let mut child = Command::new(&self.program)
            .args(Self::arguments(spec))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| open_err(format!("spawning {}: {}", self.program, e)))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| open_err("encoder stdin not captured".into()))?;

        // An encoder that rejects its arguments or output path exits right away.
        thread::sleep(STARTUP_GRACE);
        match child.try_wait() {
            Ok(None) => {}
            Ok(Some(status)) => {
                drop(stdin);
                let mut stderr = String::new();
                if let Some(mut pipe) = child.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr);
                }
                return Err(open_err(format!(
                    "encoder exited with {} before the first frame: {}",
                    status,
                    stderr.trim()
                )));
            }
            Err(e) => {
                drop(stdin);
                let _ = child.kill();
                let _ = child.wait();
                return Err(open_err(format!("polling encoder: {}", e)));
            }
        }

        Ok(Box::new(FfmpegWriter {
            path: spec.path.clone(),
            frame_size: spec.frame_size,
            stdin: Some(stdin),
            child: Some(child),
        }))
    }
}

struct FfmpegWriter {
    path: PathBuf,
    frame_size: FrameSize,
    stdin: Option<ChildStdin>,
    child: Option<Child>,
}

impl FrameWriter for FfmpegWriter {
    fn write(&mut self, frame: &Frame) -> Result<(), RecordingError> {
        if frame.size() != self.frame_size {
            return Err(RecordingError::FrameSize {
                expected: self.frame_size,
                actual: frame.size(),
            });
        }
        let stdin = self.stdin.as_mut().ok_or_else(|| RecordingError::Write {
            path: self.path.clone(),
            reason: "encoder input already closed".into(),
        })?;
        stdin
            .write_all(&frame.as_bytes())
            .map_err(|e| RecordingError::Write {
                path: self.path.clone(),
                reason: e.to_string(),
            })
    }

    fn close(mut self: Box<Self>) -> Result<(), RecordingError> {
        drop(self.stdin.take());
        let Some(child) = self.child.take() else {
            return Ok(());
        };
        let output = child.wait_with_output().map_err(|e| RecordingError::Close {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        if output.status.success() {
            Ok(())
        } else {
            Err(RecordingError::Close {
                path: self.path.clone(),
                reason: format!(
                    "encoder exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            })
        }
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(codec: &str) -> VideoSpec {
        VideoSpec {
            path: PathBuf::from("detections/20240309_101500.avi"),
            codec: codec.into(),
            fps: 20.0,
            frame_size: FrameSize::new(640, 480),
        }
    }

    #[test]
    fn arguments_describe_raw_input_and_codec_tag() {
        let args = FfmpegSink::arguments(&spec("XVID"));
        let joined = args.join(" ");
        assert!(joined.contains("-pix_fmt bgr24 -s 640x480 -r 20 -i -"));
        assert!(joined.contains("-c:v mpeg4 -vtag XVID"));
        assert_eq!(args.last().unwrap(), "detections/20240309_101500.avi");
    }

    #[test]
    fn mjpg_maps_to_mjpeg_encoder() {
        let args = FfmpegSink::arguments(&spec("MJPG"));
        assert!(args.join(" ").contains("-c:v mjpeg"));
    }

    #[test]
    fn missing_encoder_binary_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FfmpegSink::with_program("definitely-not-an-encoder-binary");
        let mut spec = spec("XVID");
        spec.path = dir.path().join("out.avi");
        let err = sink.open(&spec).err().unwrap();
        assert!(matches!(err, RecordingError::Open { .. }));
    }

    #[test]
    fn encoder_that_exits_at_startup_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        for program in ["false", "true"] {
            let mut sink = FfmpegSink::with_program(program);
            let mut spec = spec("XVID");
            spec.path = dir.path().join("out.avi");
            let err = sink.open(&spec).err().unwrap();
            match err {
                RecordingError::Open { path, reason } => {
                    assert_eq!(path, spec.path);
                    assert!(reason.contains("exited"), "{}", reason);
                }
                other => panic!("expected open error, got {:?}", other),
            }
        }
    }

    #[test]
    fn recorder_stays_idle_when_encoder_dies_at_startup() {
        use crate::pipeline::clock::{Clock, ManualClock};
        use crate::prelude::RecordingConfig;
        use crate::recording::RecordingStateMachine;
        use crate::testing::start_time;

        let dir = tempfile::tempdir().unwrap();
        let mut recorder = RecordingStateMachine::new(
            Box::new(FfmpegSink::with_program("false")),
            RecordingConfig::default(),
            dir.path(),
            FrameSize::new(4, 4),
        );
        let now = ManualClock::starting_at(start_time()).now();

        assert!(recorder.observe(true, &now).is_err());
        assert!(!recorder.is_recording());
        assert_eq!(recorder.active_video(), None);
    }
}
