use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{FailureClass, PipelineError, ProviderError};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_EXP_BASE: f64 = 7.0;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(600);
pub const DEFAULT_JITTER_FRACTION: f64 = 0.1;
pub const DEFAULT_RETRYABLE_STATUS: &[u16] = &[429, 500, 503, 504];

pub trait Classify {
    fn classify(&self, policy: &RetryPolicy) -> FailureClass;
}

impl Classify for ProviderError {
    fn classify(&self, policy: &RetryPolicy) -> FailureClass {
        match self {
            ProviderError::Status { status, .. } if policy.is_retryable_status(*status) => {
                FailureClass::Transient
            }
            ProviderError::Transport(_) | ProviderError::Timeout => FailureClass::Transient,
            ProviderError::Status { .. }
            | ProviderError::InvalidResponse(_)
            | ProviderError::NotConfigured(_) => FailureClass::Fatal,
        }
    }
}

impl Classify for anyhow::Error {
    fn classify(&self, _policy: &RetryPolicy) -> FailureClass {
        FailureClass::Transient
    }
}

#[derive(Debug)]
pub enum RetryError<E> {
    Fatal(E),
    Exhausted { attempts: u32, last: E },
    Cancelled,
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fatal(err) => write!(f, "{err}"),
            Self::Exhausted { attempts, last } => {
                write!(f, "gave up after {attempts} attempts: {last}")
            }
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    exp_base: f64,
    max_delay: Duration,
    jitter_fraction: f64,
    retryable_status: BTreeSet<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_DELAY,
            exp_base: DEFAULT_EXP_BASE,
            max_delay: DEFAULT_MAX_DELAY,
            jitter_fraction: DEFAULT_JITTER_FRACTION,
            retryable_status: DEFAULT_RETRYABLE_STATUS.iter().copied().collect(),
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        exp_base: f64,
    ) -> Result<Self, PipelineError> {
        if max_attempts == 0 {
            return Err(PipelineError::InvalidConfig(
                "retry attempts must be at least 1".into(),
            ));
        }
        if !exp_base.is_finite() || exp_base <= 1.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "retry exponential base must be greater than 1, got {exp_base}"
            )));
        }

        Ok(Self {
            max_attempts,
            initial_delay,
            exp_base,
            ..Self::default()
        })
    }

    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, fraction: f64) -> Result<Self, PipelineError> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(PipelineError::InvalidConfig(format!(
                "jitter fraction must be within 0..=1, got {fraction}"
            )));
        }
        self.jitter_fraction = fraction;
        Ok(self)
    }

    pub fn with_retryable_status(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_status = codes.into_iter().collect();
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status.contains(&status)
    }

    pub fn base_delay(&self, attempt: u32) -> Duration {
        if self.initial_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.exp_base.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    pub fn compute_delay(&self, attempt: u32) -> Duration {
        let delay = self.base_delay(attempt);
        if self.jitter_fraction <= 0.0 || delay.is_zero() {
            return delay;
        }
        let factor = rand::thread_rng().gen_range(0.0..=self.jitter_fraction);
        delay + delay.mul_f64(factor)
    }

    /// `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                outcome = op(attempt) => outcome,
            };

            let err = match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if err.classify(self) == FailureClass::Fatal {
                debug!(attempt, error = %err, "non-retryable failure");
                return Err(RetryError::Fatal(err));
            }

            if attempt >= self.max_attempts {
                warn!(attempts = attempt, error = %err, "retry budget exhausted");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = self.compute_delay(attempt);
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying after transient error"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
