//! Retry policy implementation

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{EventKind, NormalizedEvent};

/// Control value stamped on retry timers so they can be told apart from
/// timers the workflow starts itself
pub(crate) const RETRY_CONTROL: &str = "replayflow:retry";

/// Errors raised when a retry policy is attached to an action
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RetryPolicyError {
    #[error("initial interval {initial:?} exceeds maximum interval {maximum:?}")]
    InitialExceedsMaximum { initial: Duration, maximum: Duration },

    #[error("initial interval {initial:?} exceeds expiration interval {expiration:?}")]
    InitialExceedsExpiration {
        initial: Duration,
        expiration: Duration,
    },

    #[error("backoff coefficient must be a finite number >= 1.0, got {0}")]
    InvalidCoefficient(f64),
}

/// Configuration for action retries
///
/// Retries are driven entirely by history: every retry is a timer started
/// with a private control value, and the number of such timers already in
/// history is the retry count. Nothing about the schedule is random, so a
/// replay always computes the same delay.
///
/// # Example
///
/// ```
/// use replayflow_decider::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::exponential()
///     .with_initial_interval(Duration::from_secs(5))
///     .with_maximum_interval(Duration::from_secs(60))
///     .with_maximum_attempts(5);
///
/// // 5s, 10s, 20s, 40s, 60s
/// assert!(policy.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Delay before the first retry
    #[serde(with = "crate::duration_serde")]
    pub initial_interval: Duration,

    /// Upper bound on any single delay; unbounded when `None`
    #[serde(
        default,
        with = "crate::duration_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub maximum_interval: Option<Duration>,

    /// Total retry window measured from the first retry timer; unbounded when `None`
    #[serde(
        default,
        with = "crate::duration_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiration_interval: Option<Duration>,

    /// Maximum number of retries; unbounded when `None`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_attempts: Option<u32>,

    /// Backoff multiplier (e.g., 2.0 for exponential)
    pub backoff_coefficient: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential()
    }
}

impl RetryPolicy {
    /// Create an exponential backoff retry policy
    ///
    /// - 1 second initial interval
    /// - 2x backoff coefficient
    /// - no maximum interval, expiration or attempt limit
    pub fn exponential() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            maximum_interval: None,
            expiration_interval: None,
            maximum_attempts: None,
            backoff_coefficient: 2.0,
        }
    }

    /// Create a policy with fixed intervals (no backoff)
    pub fn fixed(interval: Duration, maximum_attempts: u32) -> Self {
        Self {
            initial_interval: interval,
            maximum_interval: Some(interval),
            expiration_interval: None,
            maximum_attempts: Some(maximum_attempts),
            backoff_coefficient: 1.0,
        }
    }

    /// Set the initial retry interval
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Set the maximum retry interval
    pub fn with_maximum_interval(mut self, interval: Duration) -> Self {
        self.maximum_interval = Some(interval);
        self
    }

    /// Set the expiration interval
    pub fn with_expiration_interval(mut self, interval: Duration) -> Self {
        self.expiration_interval = Some(interval);
        self
    }

    /// Set the maximum number of retries
    pub fn with_maximum_attempts(mut self, attempts: u32) -> Self {
        self.maximum_attempts = Some(attempts);
        self
    }

    /// Set the backoff coefficient
    pub fn with_backoff_coefficient(mut self, coefficient: f64) -> Self {
        self.backoff_coefficient = coefficient;
        self
    }

    /// Check the policy is usable
    pub fn validate(&self) -> Result<(), RetryPolicyError> {
        if let Some(maximum) = self.maximum_interval {
            if self.initial_interval > maximum {
                return Err(RetryPolicyError::InitialExceedsMaximum {
                    initial: self.initial_interval,
                    maximum,
                });
            }
        }
        if let Some(expiration) = self.expiration_interval {
            if self.initial_interval > expiration {
                return Err(RetryPolicyError::InitialExceedsExpiration {
                    initial: self.initial_interval,
                    expiration,
                });
            }
        }
        if !self.backoff_coefficient.is_finite() || self.backoff_coefficient < 1.0 {
            return Err(RetryPolicyError::InvalidCoefficient(self.backoff_coefficient));
        }
        Ok(())
    }

    /// Whether `event` is a retry timer of this unit firing
    ///
    /// `retry_timers` are the unit's retry timer start events.
    pub fn is_retry_event(event: &NormalizedEvent, retry_timers: &[&NormalizedEvent]) -> bool {
        event.kind() == EventKind::TimerFired
            && retry_timers
                .iter()
                .any(|timer| Some(timer.sequence_id()) == event.correlation_id())
    }

    /// Whether `event` starts a retry timer
    pub fn is_retry_timer(event: &NormalizedEvent) -> bool {
        event.kind() == EventKind::TimerStarted && event.data("control") == Some(RETRY_CONTROL)
    }

    /// Delay before the next retry, or `None` once retries are exhausted
    ///
    /// `retry_timers` are the retry timers already started for the unit, oldest
    /// first; `failed_at` is the timestamp of the error being handled. The
    /// result is always a whole number of seconds.
    pub fn next_delay(
        &self,
        retry_timers: &[&NormalizedEvent],
        failed_at: DateTime<Utc>,
    ) -> Option<Duration> {
        let attempts = retry_timers.len() as u64;
        if attempts == 0 {
            return Some(Duration::from_secs(whole_secs(
                self.initial_interval.as_secs_f64(),
            )));
        }

        if let Some(maximum) = self.maximum_attempts {
            if attempts > u64::from(maximum) {
                return None;
            }
        }

        let exponent = i32::try_from(attempts - 1).unwrap_or(i32::MAX);
        let mut interval =
            self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
        if let Some(maximum) = self.maximum_interval {
            interval = interval.min(maximum.as_secs_f64());
        }
        let interval = Duration::from_secs(whole_secs(interval));

        if let Some(expiration) = self.expiration_interval {
            let first = retry_timers.first()?.timestamp();
            let elapsed = (failed_at - first).to_std().unwrap_or(Duration::ZERO);
            match elapsed.checked_add(interval) {
                Some(total) if total <= expiration => {}
                _ => return None,
            }
        }

        Some(interval)
    }
}

/// Round a non-negative second count up to a whole number, saturating
fn whole_secs(secs: f64) -> u64 {
    if secs.is_nan() || secs <= 0.0 {
        0
    } else {
        secs.ceil() as u64
    }
}
