//! In-memory collaborators shared by the unit tests.

use crate::alert::AudioPlayer;
use crate::detection::{Detector, RawDetection};
use crate::pipeline::ports::{DisplayStatus, FrameRead, FrameSource, Renderer};
use crate::prelude::{
    AlertError, DetectorError, Frame, FrameSize, PipelineResult, RecordingError,
};
use crate::recording::{FrameWriter, VideoSink, VideoSpec};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::VecDeque;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 9)
        .unwrap()
        .and_hms_opt(10, 15, 0)
        .unwrap()
}

#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct SinkState {
    opened: Vec<VideoSpec>,
    frames: Vec<usize>,
    closed: Vec<PathBuf>,
    fail_open: bool,
    fail_write: bool,
}

#[derive(Clone, Default)]
pub struct MemorySink(Arc<Mutex<SinkState>>);

impl MemorySink {
    pub fn opened(&self) -> Vec<VideoSpec> {
        self.0.lock().unwrap().opened.clone()
    }

    pub fn closed(&self) -> Vec<PathBuf> {
        self.0.lock().unwrap().closed.clone()
    }

    pub fn frames_for(&self, session: usize) -> usize {
        self.0.lock().unwrap().frames[session]
    }

    pub fn fail_open(&self, fail: bool) {
        self.0.lock().unwrap().fail_open = fail;
    }

    pub fn fail_write(&self, fail: bool) {
        self.0.lock().unwrap().fail_write = fail;
    }
}

impl VideoSink for MemorySink {
    fn open(&mut self, spec: &VideoSpec) -> Result<Box<dyn FrameWriter>, RecordingError> {
        let mut state = self.0.lock().unwrap();
        if state.fail_open {
            return Err(RecordingError::Open {
                path: spec.path.clone(),
                reason: "codec unavailable".into(),
            });
        }
        state.opened.push(spec.clone());
        state.frames.push(0);
        Ok(Box::new(MemoryWriter {
            state: Arc::clone(&self.0),
            index: state.frames.len() - 1,
            path: spec.path.clone(),
        }))
    }
}

struct MemoryWriter {
    state: Arc<Mutex<SinkState>>,
    index: usize,
    path: PathBuf,
}

impl FrameWriter for MemoryWriter {
    fn write(&mut self, _frame: &Frame) -> Result<(), RecordingError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_write {
            return Err(RecordingError::Write {
                path: self.path.clone(),
                reason: "disk full".into(),
            });
        }
        state.frames[self.index] += 1;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), RecordingError> {
        self.state.lock().unwrap().closed.push(self.path.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct CountingPlayer(Arc<Mutex<Vec<PathBuf>>>);

impl CountingPlayer {
    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn assets(&self) -> Vec<PathBuf> {
        self.0.lock().unwrap().clone()
    }
}

impl AudioPlayer for CountingPlayer {
    fn play(&self, asset: &Path) -> Result<(), AlertError> {
        self.0.lock().unwrap().push(asset.to_path_buf());
        Ok(())
    }
}

pub struct ScriptedSource {
    size: FrameSize,
    reads: VecDeque<FrameRead>,
    released: bool,
}

impl ScriptedSource {
    pub fn new(size: FrameSize, reads: Vec<FrameRead>) -> Self {
        Self {
            size,
            reads: reads.into(),
            released: false,
        }
    }

    pub fn frames(size: FrameSize, count: usize) -> Self {
        Self::new(
            size,
            (0..count).map(|_| FrameRead::Frame(Frame::blank(size))).collect(),
        )
    }
}

impl FrameSource for ScriptedSource {
    fn resolution(&self) -> FrameSize {
        self.size
    }

    fn read(&mut self) -> PipelineResult<FrameRead> {
        if self.released {
            return Ok(FrameRead::EndOfStream);
        }
        Ok(self.reads.pop_front().unwrap_or(FrameRead::EndOfStream))
    }

    fn release(&mut self) {
        self.released = true;
    }
}

/// Returns one scripted batch per call, then nothing.
pub struct ScriptedDetector {
    name: &'static str,
    batches: VecDeque<Vec<RawDetection>>,
    fail_after: Option<usize>,
    calls: usize,
}

impl ScriptedDetector {
    pub fn new(name: &'static str, batches: Vec<Vec<RawDetection>>) -> Self {
        Self {
            name,
            batches: batches.into(),
            fail_after: None,
            calls: 0,
        }
    }

    pub fn empty(name: &'static str) -> Self {
        Self::new(name, Vec::new())
    }

    pub fn failing(name: &'static str) -> Self {
        Self::empty(name).failing_after(0)
    }

    pub fn failing_after(mut self, calls: usize) -> Self {
        self.fail_after = Some(calls);
        self
    }
}

impl Detector for ScriptedDetector {
    fn name(&self) -> &str {
        self.name
    }

    fn predict(&mut self, _: &Frame, _: f32) -> Result<Vec<RawDetection>, DetectorError> {
        if self.fail_after.is_some_and(|limit| self.calls >= limit) {
            return Err(DetectorError::new(self.name, "inference failed"));
        }
        self.calls += 1;
        Ok(self.batches.pop_front().unwrap_or_default())
    }
}

#[derive(Default)]
struct RendererState {
    presented: usize,
    close_after: Option<usize>,
    operator_closed: bool,
    closed: bool,
}

#[derive(Clone, Default)]
pub struct CollectingRenderer(Arc<Mutex<RendererState>>);

impl CollectingRenderer {
    pub fn close_after(&self, frames: usize) {
        self.0.lock().unwrap().close_after = Some(frames);
    }

    /// Simulates the operator closing the window before the next frame.
    pub fn close_now(&self) {
        self.0.lock().unwrap().operator_closed = true;
    }

    pub fn presented(&self) -> usize {
        self.0.lock().unwrap().presented
    }

    pub fn was_closed(&self) -> bool {
        self.0.lock().unwrap().closed
    }
}

impl Renderer for CollectingRenderer {
    fn present(&mut self, _frame: &Frame) -> PipelineResult<DisplayStatus> {
        let mut state = self.0.lock().unwrap();
        state.presented += 1;
        Ok(match state.close_after {
            Some(limit) if state.presented >= limit => DisplayStatus::Closed,
            _ => DisplayStatus::Open,
        })
    }

    fn is_closed(&self) -> bool {
        self.0.lock().unwrap().operator_closed
    }

    fn close(&mut self) {
        self.0.lock().unwrap().closed = true;
    }
}
