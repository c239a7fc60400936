pub mod ffmpeg;
pub mod sink;
pub mod state_machine;

pub use ffmpeg::FfmpegSink;
pub use sink::{FrameWriter, VideoSink, VideoSpec};
pub use state_machine::{RecorderState, RecordingSession, RecordingStateMachine, Transition};
