use crate::workflow::config::{frame_interval, CameraConfig};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use wildcore::pipeline::{FrameRead, FrameSource, ManualClock};
use wildcore::prelude::{Frame, FrameSize, PipelineError, PipelineResult};

/// Camera stand-in producing seeded noise frames.
pub struct SyntheticCamera {
    size: FrameSize,
    rng: StdRng,
    drop_probability: f64,
    remaining: Option<usize>,
    clock: Option<(Arc<ManualClock>, Duration)>,
    released: bool,
}

impl SyntheticCamera {
    pub fn open(config: &CameraConfig) -> PipelineResult<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(PipelineError::CameraInit(format!(
                "unsupported resolution {}x{}",
                config.width, config.height
            )));
        }
        Ok(Self {
            size: FrameSize::new(config.width, config.height),
            rng: StdRng::seed_from_u64(config.seed),
            drop_probability: config.drop_probability.clamp(0.0, 1.0),
            remaining: config.max_frames,
            clock: None,
            released: false,
        })
    }

    /// Steps `clock` by one frame interval on every delivered frame.
    pub fn with_simulated_clock(
        mut self,
        clock: Arc<ManualClock>,
        fps: f64,
    ) -> PipelineResult<Self> {
        let step = frame_interval(fps).ok_or_else(|| {
            PipelineError::CameraInit(format!("unsupported simulated frame rate {}", fps))
        })?;
        self.clock = Some((clock, step));
        Ok(self)
    }
}

impl FrameSource for SyntheticCamera {
    fn resolution(&self) -> FrameSize {
        self.size
    }

    fn read(&mut self) -> PipelineResult<FrameRead> {
        if self.released || self.remaining == Some(0) {
            return Ok(FrameRead::EndOfStream);
        }
        if self.drop_probability > 0.0 && self.rng.gen_bool(self.drop_probability) {
            return Ok(FrameRead::Unavailable);
        }

        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        if let Some((clock, step)) = &self.clock {
            clock.advance(*step);
        }
        let len = self.size.width as usize * self.size.height as usize * Frame::CHANNELS;
        let mut bytes = vec![0u8; len];
        self.rng.fill(bytes.as_mut_slice());
        let frame = Frame::from_bgr(self.size, bytes).ok_or_else(|| {
            PipelineError::CameraInit("frame buffer does not match resolution".into())
        })?;
        Ok(FrameRead::Frame(frame))
    }

    fn release(&mut self) {
        self.released = true;
    }
}
