use crate::workflow::config::DisplayConfig;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use wildcore::pipeline::{DisplayStatus, Renderer};
use wildcore::prelude::{Frame, FrameSize, PipelineError, PipelineResult};

/// Renderer without a window. Reports `Closed` once the operator flag is
/// raised or the tick limit is reached, and can dump the last frame on close.
pub struct HeadlessDisplay {
    shutdown: Arc<AtomicBool>,
    max_ticks: Option<usize>,
    snapshot: Option<PathBuf>,
    presented: usize,
    last_frame: Option<Frame>,
}

impl HeadlessDisplay {
    pub fn new(config: &DisplayConfig, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            shutdown,
            max_ticks: config.max_ticks,
            snapshot: config.snapshot.clone(),
            presented: 0,
            last_frame: None,
        }
    }

    pub fn presented(&self) -> usize {
        self.presented
    }
}

impl Renderer for HeadlessDisplay {
    fn open(&mut self, size: FrameSize) -> PipelineResult<()> {
        info!("headless display {}x{}", size.width, size.height);
        Ok(())
    }

    fn present(&mut self, frame: &Frame) -> PipelineResult<DisplayStatus> {
        self.presented += 1;
        if self.snapshot.is_some() {
            self.last_frame = Some(frame.clone());
        }

        let limit_reached = self.max_ticks.is_some_and(|max| self.presented >= max);
        if limit_reached || self.is_closed() {
            return Ok(DisplayStatus::Closed);
        }
        Ok(DisplayStatus::Open)
    }

    fn is_closed(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn close(&mut self) {
        let (Some(path), Some(frame)) = (self.snapshot.as_ref(), self.last_frame.take()) else {
            return;
        };
        match write_snapshot(path, &frame) {
            Ok(()) => info!("snapshot written to {}", path.display()),
            Err(err) => warn!("snapshot {} failed: {}", path.display(), err),
        }
    }
}

/// Saves `frame` as an image; the format follows the file extension.
pub fn write_snapshot(path: &Path, frame: &Frame) -> PipelineResult<()> {
    let render_err = |e: String| PipelineError::Render(format!("{}: {}", path.display(), e));
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| render_err(e.to_string()))?;
    }
    frame.to_rgb_image().save(path).map_err(|e| render_err(e.to_string()))
}
