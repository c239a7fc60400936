use crate::prelude::{Frame, FrameSize, RecordingError};
use std::path::PathBuf;

/// Everything a sink needs to open one session file.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSpec {
    pub path: PathBuf,
    /// FourCC codec tag, e.g. `XVID`.
    pub codec: String,
    pub fps: f64,
    pub frame_size: FrameSize,
}

/// Live writer for a single session file.
pub trait FrameWriter: Send {
    fn write(&mut self, frame: &Frame) -> Result<(), RecordingError>;

    /// Finalizes the file. The writer is consumed either way.
    fn close(self: Box<Self>) -> Result<(), RecordingError>;
}

/// Factory for [`FrameWriter`]s.
pub trait VideoSink: Send {
    fn open(&mut self, spec: &VideoSpec) -> Result<Box<dyn FrameWriter>, RecordingError>;
}
