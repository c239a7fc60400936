use crate::prelude::{Frame, FrameSize, PipelineResult};

/// Result of one attempt to acquire a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameRead {
    Frame(Frame),
    /// Transient: nothing this time, try again.
    Unavailable,
    EndOfStream,
}

/// Camera or other frame producer, exclusively owned by the orchestrator.
pub trait FrameSource {
    /// Resolution sampled once at startup; sizes the display and every recording.
    fn resolution(&self) -> FrameSize;

    fn read(&mut self) -> PipelineResult<FrameRead>;

    fn release(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayStatus {
    Open,
    /// The operator closed the surface; the run loop tears everything down.
    Closed,
}

/// Display surface receiving each annotated frame.
pub trait Renderer {
    fn open(&mut self, _size: FrameSize) -> PipelineResult<()> {
        Ok(())
    }

    fn present(&mut self, frame: &Frame) -> PipelineResult<DisplayStatus>;

    /// Whether the operator has closed the surface since the last `present`.
    /// Polled while no frames arrive.
    fn is_closed(&self) -> bool {
        false
    }

    fn close(&mut self) {}
}
