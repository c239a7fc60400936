use serde::Serialize;
use std::sync::Mutex;

pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

/// Counters accumulated over a pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub ticks: usize,
    pub frames_unavailable: usize,
    pub log_records: usize,
    pub sessions_opened: usize,
    pub sessions_closed: usize,
    pub alerts_queued: usize,
    pub alerts_rejected: usize,
    pub errors: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics);
        }
    }

    pub fn record_tick(&self, log_records: usize) {
        self.update(|m| {
            m.ticks += 1;
            m.log_records += log_records;
        });
    }

    pub fn record_unavailable(&self) {
        self.update(|m| m.frames_unavailable += 1);
    }

    pub fn record_session_opened(&self) {
        self.update(|m| m.sessions_opened += 1);
    }

    pub fn record_session_closed(&self) {
        self.update(|m| m.sessions_closed += 1);
    }

    pub fn record_alerts(&self, queued: usize, rejected: usize) {
        self.update(|m| {
            m.alerts_queued += queued;
            m.alerts_rejected += rejected;
        });
    }

    pub fn record_error(&self) {
        self.update(|m| m.errors += 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().map(|m| *m).unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
