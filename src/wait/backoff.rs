//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::BackoffConfig;

/// Exponential backoff schedule.
///
/// Each call to [`Backoff::step`] returns the current delay perturbed by
/// `± delay * jitter * U(0,1)` and multiplies the base delay by `factor`.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    /// Delay before the second attempt.
    pub duration: Duration,
    /// Growth applied after every step.
    pub factor: f64,
    /// Maximum number of attempts.
    pub steps: u32,
    /// Jitter fraction in [0, 1).
    pub jitter: f64,
    /// Upper bound for the base delay.
    pub cap: Option<Duration>,
}

impl Backoff {
    pub fn new(duration: Duration, factor: f64, steps: u32) -> Self {
        Self {
            duration,
            factor,
            steps,
            jitter: 0.0,
            cap: None,
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_cap(mut self, cap: Duration) -> Self {
        self.cap = Some(cap);
        self
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self {
            duration: Duration::from_millis(config.initial_ms),
            factor: config.factor,
            steps: config.steps,
            jitter: config.jitter,
            cap: config.max_delay_ms.map(Duration::from_millis),
        }
    }

    /// Return the next delay and advance the schedule.
    pub fn step(&mut self) -> Duration {
        let base = self.duration;
        self.duration = self.grow(base);
        jittered(base, self.jitter)
    }

    /// Nominal delays slept between attempts, ignoring jitter.
    pub fn schedule(&self) -> Vec<Duration> {
        let mut delays = Vec::new();
        let mut current = self.duration;
        for _ in 1..self.steps.max(1) {
            delays.push(current);
            current = self.grow(current);
        }
        delays
    }

    fn grow(&self, delay: Duration) -> Duration {
        let next = Duration::try_from_secs_f64(delay.as_secs_f64() * self.factor)
            .unwrap_or(Duration::MAX);
        match self.cap {
            Some(cap) => next.min(cap),
            None => next,
        }
    }
}

impl Default for Backoff {
    /// Cloud API polling schedule: 1s, 1.5s, 2.25s, ... over 10 attempts.
    fn default() -> Self {
        Self::from_config(&BackoffConfig::default())
    }
}

fn jittered(delay: Duration, jitter: f64) -> Duration {
    if jitter <= 0.0 || delay.is_zero() {
        return delay;
    }
    let offset = rand::thread_rng().gen_range(-1.0..=1.0) * jitter;
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + offset).max(0.0)).unwrap_or(delay)
}
