pub mod clock;
pub mod orchestrator;
pub mod overlay;
pub mod ports;
pub mod retry;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use orchestrator::{Orchestrator, PipelineParts, TickOutcome, TickReport};
pub use ports::{DisplayStatus, FrameRead, FrameSource, Renderer};
pub use retry::Backoff;
