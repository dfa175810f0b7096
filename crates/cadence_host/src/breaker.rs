// breaker.rs - Per-module circuit breaker
//
// Closed -> Open after `failure_threshold` consecutive failures; Open ->
// HalfOpen after the reset timeout; the half-open trial closes the breaker
// on success and re-opens it on failure.

use std::time::{Duration, Instant};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

pub struct CircuitBreaker {
    state: BreakerState,
    consecutive_failures: u32,
    failure_threshold: u32,
    reset_timeout: Duration,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            opened_at: None,
        }
    }

    /// May a dispatch proceed right now? Transitions Open -> HalfOpen when
    /// the reset timeout has elapsed.
    pub fn allow(&mut self) -> bool {
        match self.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let elapsed = self
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.reset_timeout {
                    self.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.state = BreakerState::Closed;
        self.opened_at = None;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        let trip = match self.state {
            // The half-open trial failed.
            BreakerState::HalfOpen => true,
            _ => self.consecutive_failures >= self.failure_threshold,
        };
        if trip {
            self.state = BreakerState::Open;
            self.opened_at = Some(Instant::now());
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_consecutive_failures() {
        let mut breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.allow());
    }

    #[test]
    fn success_resets_the_failure_run() {
        let mut breaker = CircuitBreaker::new(2, Duration::from_secs(60));
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_trial_closes_or_reopens() {
        let mut breaker = CircuitBreaker::new(1, Duration::ZERO);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);

        // Zero reset timeout: the next allow is the half-open trial.
        assert!(breaker.allow());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);

        assert!(breaker.allow());
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}
