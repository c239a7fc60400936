pub mod event_log;
pub mod log;
pub mod metrics;

pub use event_log::{EventLogger, LogParseError, LogRecord, LoggedLine, TIMESTAMP_FORMAT};
pub use self::log::LogManager;
pub use metrics::{MetricsRecorder, MetricsSnapshot};
