use crate::display::headless::HeadlessDisplay;
use crate::generator::profile::SyntheticCamera;
use crate::generator::scenario::{RandomDetector, Scenario, ScenarioDetector};
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use chrono::Local;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use wildcore::alert::CommandPlayer;
use wildcore::detection::Detector;
use wildcore::pipeline::{Clock, ManualClock, SystemClock};
use wildcore::recording::FfmpegSink;
use wildcore::telemetry::{EventLogger, MetricsSnapshot};
use wildcore::{Orchestrator, PipelineParts};

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Assembles the camera, detectors and sinks into an orchestrator.
    pub fn build(&self, shutdown: Arc<AtomicBool>) -> anyhow::Result<Orchestrator> {
        let pipeline = &self.config.pipeline;

        let camera = SyntheticCamera::open(&self.config.camera).context("opening camera")?;
        let (camera, clock): (SyntheticCamera, Arc<dyn Clock>) =
            match self.config.camera.simulated_fps {
                Some(fps) => {
                    let clock = Arc::new(ManualClock::starting_at(Local::now().naive_local()));
                    let camera = camera
                        .with_simulated_clock(Arc::clone(&clock), fps)
                        .context("configuring simulated clock")?;
                    (camera, clock)
                }
                None => (camera, Arc::new(SystemClock::new())),
            };

        let (specialized, general) = self.detectors()?;

        let log_path = pipeline.log_path();
        let event_log = EventLogger::open(&log_path)
            .with_context(|| format!("opening event log {}", log_path.display()))?;

        let player = match self.config.player.as_deref() {
            Some(line) => CommandPlayer::from_command_line(line)
                .with_context(|| format!("invalid player command {:?}", line))?,
            None => CommandPlayer::default(),
        };

        let parts = PipelineParts {
            source: Box::new(camera),
            specialized,
            general,
            event_log,
            video_sink: Box::new(FfmpegSink::with_program(self.config.encoder.clone())),
            player: Arc::new(player),
            renderer: Box::new(HeadlessDisplay::new(&self.config.display, shutdown)),
            clock,
        };
        Orchestrator::new(pipeline, parts).context("starting pipeline")
    }

    fn detectors(&self) -> anyhow::Result<(Box<dyn Detector>, Box<dyn Detector>)> {
        let detectors = &self.config.detectors;
        match &detectors.scenario {
            Some(path) => {
                let scenario = Scenario::load(path)?;
                Ok((
                    Box::new(ScenarioDetector::animals(&scenario)),
                    Box::new(ScenarioDetector::general(&scenario)),
                ))
            }
            None => Ok((
                Box::new(RandomDetector::animals(
                    detectors.animal_probability,
                    detectors.seed,
                )),
                Box::new(RandomDetector::general(
                    detectors.general_probability,
                    detectors.seed.wrapping_add(1),
                )),
            )),
        }
    }

    pub fn execute(&self, shutdown: Arc<AtomicBool>) -> anyhow::Result<MetricsSnapshot> {
        let mut orchestrator = self.build(shutdown)?;
        orchestrator.run().context("running pipeline")
    }
}
