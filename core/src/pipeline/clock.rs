use chrono::{Local, NaiveDateTime};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Time of a tick: monotonic offset for session timing, wall clock for names and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub monotonic: Duration,
    pub wall: NaiveDateTime,
}

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp {
            monotonic: self.origin.elapsed(),
            wall: Local::now().naive_local(),
        }
    }
}

/// Clock that only moves when told to. Drives offline runs and tests.
pub struct ManualClock {
    current: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn starting_at(wall: NaiveDateTime) -> Self {
        Self {
            current: Mutex::new(Timestamp {
                monotonic: Duration::ZERO,
                wall,
            }),
        }
    }

    pub fn advance(&self, step: Duration) {
        if let Ok(mut current) = self.current.lock() {
            current.monotonic += step;
            let delta = chrono::Duration::from_std(step).unwrap_or_else(|_| chrono::Duration::zero());
            current.wall = current.wall.checked_add_signed(delta).unwrap_or(current.wall);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        match self.current.lock() {
            Ok(current) => *current,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
