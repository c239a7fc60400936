//! Frame-orchestration core for the Rust wildlife watch platform.
//!
//! Each tick runs two detectors over a camera frame, appends one event-log
//! line per detection, drives a time-bounded recording state machine, and
//! hands qualifying sightings to a bounded alert pool.

pub mod alert;
pub mod detection;
pub mod pipeline;
pub mod prelude;
pub mod recording;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use pipeline::{Orchestrator, PipelineParts, TickOutcome};
pub use prelude::{Frame, FrameSize, PipelineConfig, PipelineError, PipelineResult};
