use crate::prelude::RetryConfig;
use std::time::Duration;

/// Exponential backoff between failed frame reads.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(config: &RetryConfig) -> Self {
        let initial = Duration::from_millis(config.initial_backoff_ms);
        let max = Duration::from_millis(config.max_backoff_ms).max(initial);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_cap_and_resets() {
        let mut backoff = Backoff::new(&RetryConfig {
            initial_backoff_ms: 2,
            max_backoff_ms: 10,
        });
        let delays: Vec<u128> = (0..5).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![2, 4, 8, 10, 10]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(2));
    }

    #[test]
    fn zero_initial_never_sleeps() {
        let mut backoff = Backoff::new(&RetryConfig {
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        });
        assert_eq!(backoff.next_delay(), Duration::ZERO);
        assert_eq!(backoff.next_delay(), Duration::ZERO);
    }
}
