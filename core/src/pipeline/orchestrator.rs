use super::clock::{Clock, Timestamp};
use super::overlay;
use super::ports::{DisplayStatus, FrameRead, FrameSource, Renderer};
use super::retry::Backoff;
use crate::alert::{AlertDispatcher, AudioPlayer, DispatchOutcome};
use crate::detection::{DetectionAggregator, Detector};
use crate::prelude::{PipelineConfig, PipelineResult, RetryConfig};
use crate::recording::{RecordingStateMachine, Transition, VideoSink};
use crate::telemetry::event_log::{EventLogger, LogRecord};
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::{MetricsRecorder, MetricsSnapshot};
use std::sync::Arc;
use std::thread;

/// External collaborators the orchestrator is assembled from.
pub struct PipelineParts {
    pub source: Box<dyn FrameSource>,
    pub specialized: Box<dyn Detector>,
    pub general: Box<dyn Detector>,
    pub event_log: EventLogger,
    pub video_sink: Box<dyn VideoSink>,
    pub player: Arc<dyn AudioPlayer>,
    pub renderer: Box<dyn Renderer>,
    pub clock: Arc<dyn Clock>,
}

/// Everything a completed tick did, in the order it did it.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub at: Timestamp,
    pub saw_animal: bool,
    pub records: Vec<LogRecord>,
    pub transitions: Vec<Transition>,
    pub alerts: Vec<DispatchOutcome>,
    pub display: DisplayStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No frame this time. Nothing was detected, logged, recorded or alerted.
    FrameUnavailable,
    EndOfStream,
    Completed(TickReport),
}

/// Drives one tick per acquired frame on the calling thread.
///
/// Per tick: detect with both detectors, let the recorder react to an animal
/// sighting, log animal then general detections, draw the overlay, append
/// the frame to the live session, dispatch alerts, hand the frame to the
/// renderer.
pub struct Orchestrator {
    source: Box<dyn FrameSource>,
    specialized: Box<dyn Detector>,
    general: Box<dyn Detector>,
    aggregator: DetectionAggregator,
    event_log: EventLogger,
    recorder: RecordingStateMachine,
    alerts: AlertDispatcher,
    renderer: Box<dyn Renderer>,
    clock: Arc<dyn Clock>,
    retry: RetryConfig,
    metrics: MetricsRecorder,
    logger: LogManager,
    released: bool,
}

impl Orchestrator {
    pub fn new(config: &PipelineConfig, parts: PipelineParts) -> PipelineResult<Self> {
        let PipelineParts {
            source,
            specialized,
            general,
            event_log,
            video_sink,
            player,
            mut renderer,
            clock,
        } = parts;

        let frame_size = source.resolution();
        renderer.open(frame_size)?;
        let recorder = RecordingStateMachine::new(
            video_sink,
            config.recording.clone(),
            config.save_folder.clone(),
            frame_size,
        );
        let alerts = AlertDispatcher::new(&config.alerts, player)?;

        let aggregator = DetectionAggregator::new(config.confidence_threshold);

        let logger = LogManager::new("orchestrator");
        logger.record(&format!(
            "pipeline ready: {}x{} source, detectors {} + {}, threshold {:.2}, log {}, alerting on {}",
            frame_size.width,
            frame_size.height,
            specialized.name(),
            general.name(),
            aggregator.threshold(),
            event_log.target(),
            alerts.policy().alerting_labels().join("/")
        ));

        Ok(Self {
            source,
            specialized,
            general,
            aggregator,
            event_log,
            recorder,
            alerts,
            renderer,
            clock,
            retry: config.frame_retry.clone(),
            metrics: MetricsRecorder::new(),
            logger,
            released: false,
        })
    }

    pub fn recorder(&self) -> &RecordingStateMachine {
        &self.recorder
    }

    pub fn alerts(&self) -> &AlertDispatcher {
        &self.alerts
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn tick(&mut self) -> PipelineResult<TickOutcome> {
        let mut frame = match self.source.read()? {
            FrameRead::Frame(frame) => frame,
            FrameRead::Unavailable => {
                self.metrics.record_unavailable();
                return Ok(TickOutcome::FrameUnavailable);
            }
            FrameRead::EndOfStream => return Ok(TickOutcome::EndOfStream),
        };
        let now = self.clock.now();

        let detections =
            self.aggregator
                .aggregate(&frame, self.specialized.as_mut(), self.general.as_mut())?;

        let mut transitions = Vec::new();
        let opened = self.recorder.observe(detections.saw_animal, &now)?;
        if opened != Transition::Stay {
            self.metrics.record_session_opened();
            transitions.push(opened);
        }

        let mut records = Vec::with_capacity(detections.len());
        for detection in detections.iter() {
            records.push(self.event_log.log(
                now.wall,
                detection,
                detection.is_animal(),
                self.recorder.active_video(),
            )?);
        }

        overlay::annotate(&mut frame, &detections.animals);
        let closed = self.recorder.append(&frame, &now)?;
        if closed != Transition::Stay {
            self.metrics.record_session_closed();
            transitions.push(closed);
        }

        let alerts: Vec<DispatchOutcome> = detections
            .animals
            .iter()
            .map(|detection| self.alerts.maybe_alert(detection))
            .collect();
        let queued = alerts.iter().filter(|o| **o == DispatchOutcome::Queued).count();
        let rejected = alerts.iter().filter(|o| **o == DispatchOutcome::Rejected).count();
        self.metrics.record_alerts(queued, rejected);

        let display = self.renderer.present(&frame)?;
        self.metrics.record_tick(records.len());

        Ok(TickOutcome::Completed(TickReport {
            at: now,
            saw_animal: detections.saw_animal,
            records,
            transitions,
            alerts,
            display,
        }))
    }

    /// Ticks until the display closes, the source ends, or a tick fails.
    /// Teardown runs in every case.
    pub fn run(&mut self) -> PipelineResult<MetricsSnapshot> {
        let mut backoff = Backoff::new(&self.retry);
        let outcome = loop {
            match self.tick() {
                Ok(TickOutcome::FrameUnavailable) => {
                    if self.renderer.is_closed() {
                        self.logger.record("display closed while waiting for frames");
                        break Ok(());
                    }
                    let delay = backoff.next_delay();
                    self.logger
                        .trace(&format!("frame unavailable, retrying in {:?}", delay));
                    thread::sleep(delay);
                }
                Ok(TickOutcome::EndOfStream) => {
                    self.logger.record("frame source ended");
                    break Ok(());
                }
                Ok(TickOutcome::Completed(report)) => {
                    backoff.reset();
                    if report.display == DisplayStatus::Closed {
                        self.logger.record("display closed");
                        break Ok(());
                    }
                }
                Err(err) => {
                    self.metrics.record_error();
                    self.logger.fail(&format!("tick failed: {}", err));
                    break Err(err);
                }
            }
        };

        let teardown = self.shutdown();
        outcome?;
        teardown?;
        Ok(self.metrics.snapshot())
    }

    /// Releases the camera, closes any live recording and joins alert
    /// playback. Safe to call more than once.
    pub fn shutdown(&mut self) -> PipelineResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        self.source.release();
        let closed = self.recorder.close(&self.clock.now());
        if matches!(closed, Ok(Transition::Stopped { .. })) {
            self.metrics.record_session_closed();
        }
        self.alerts.shutdown();
        self.renderer.close();

        let snapshot = self.metrics.snapshot();
        self.logger.record(&format!(
            "shutdown after {} ticks, {} records, {} sessions, {} alerts ({} rejected)",
            snapshot.ticks,
            snapshot.log_records,
            snapshot.sessions_opened,
            snapshot.alerts_queued,
            snapshot.alerts_rejected
        ));
        closed.map(|_| ()).map_err(Into::into)
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            self.logger.fail(&format!("teardown failed: {}", err));
        }
    }
}
