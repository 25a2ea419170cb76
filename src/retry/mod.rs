//! Retry asynchronous operations with exponential backoff.

mod classify;
#[cfg(test)]
mod tests;

#[doc(inline)]
pub use classify::*;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Decides wholesale whether an error is retried, replacing the [`ErrorConfig`].
pub type ShouldRetry<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;
/// Observer called before each backoff with the error and attempt number.
pub type OnRetry<E> = Arc<dyn Fn(&E, u32) + Send + Sync>;
/// Observer called once an operation succeeds after at least one failure.
pub type OnSuccess = Arc<dyn Fn(u32) + Send + Sync>;

// ----------------------------------------------------------------------------
// Retry Options
// ----------------------------------------------------------------------------

/// Options of [`retry_with_backoff`].
///
/// ## Examples
///
/// ```rust
/// use ncscore::retry::RetryOptions;
/// use ncscore::ApiError;
/// use std::time::Duration;
///
/// let options = RetryOptions::<ApiError>::default()
///     .max_retries(4)
///     .initial_delay(Duration::from_millis(1000))
///     .max_delay(Duration::from_millis(16000));
///
/// assert_eq!(options.delay(1), Duration::from_millis(1000));
/// assert_eq!(options.delay(3), Duration::from_millis(4000));
/// assert_eq!(options.delay(10), Duration::from_millis(16000));
/// ```
pub struct RetryOptions<E> {
    /// Upper bound on total attempts. 0 or 1 means fail on the first error.
    pub max_retries: u32,
    /// Backoff after the first failure, doubled after each subsequent one.
    pub initial_delay: Duration,
    /// Backoff ceiling.
    pub max_delay: Duration,
    /// Status code overrides, used unless `should_retry` is set.
    pub error_config: ErrorConfig,
    pub should_retry: Option<ShouldRetry<E>>,
    pub on_retry: Option<OnRetry<E>>,
    pub on_success: Option<OnSuccess>,
}

impl<E> Default for RetryOptions<E> {
    fn default() -> Self {
        RetryOptions {
            max_retries: 3,
            initial_delay: Duration::from_millis(300),
            max_delay: Duration::from_millis(3000),
            error_config: ErrorConfig::default(),
            should_retry: None,
            on_retry: None,
            on_success: None,
        }
    }
}

impl<E> Clone for RetryOptions<E> {
    fn clone(&self) -> Self {
        RetryOptions {
            max_retries: self.max_retries,
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            error_config: self.error_config.clone(),
            should_retry: self.should_retry.clone(),
            on_retry: self.on_retry.clone(),
            on_success: self.on_success.clone(),
        }
    }
}

impl<E> Debug for RetryOptions<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_retries", &self.max_retries)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("error_config", &self.error_config)
            .field("should_retry", &self.should_retry.is_some())
            .field("on_retry", &self.on_retry.is_some())
            .field("on_success", &self.on_success.is_some())
            .finish()
    }
}

impl<E> RetryOptions<E> {
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn error_config(mut self, error_config: ErrorConfig) -> Self {
        self.error_config = error_config;
        self
    }

    pub fn should_retry(mut self, should_retry: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.should_retry = Some(Arc::new(should_retry));
        self
    }

    pub fn on_retry(mut self, on_retry: impl Fn(&E, u32) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Arc::new(on_retry));
        self
    }

    pub fn on_success(mut self, on_success: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(on_success));
        self
    }

    /// Returns the backoff after failed attempt number `attempt` (1-based):
    /// `min(initial_delay * 2^(attempt - 1), max_delay)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2_u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Returns true if the error should trigger another attempt.
    pub fn is_retryable(&self, error: &E) -> bool
    where
        E: Classify,
    {
        match &self.should_retry {
            Some(should_retry) => should_retry(error),
            None => self.error_config.is_retryable(error),
        }
    }
}

// ----------------------------------------------------------------------------
// Retry State
// ----------------------------------------------------------------------------

/// Progress of a logical operation, shared across calls for display (ex. "attempt 2 of 4").
///
/// Only [`retry_with_backoff`] mutates it. Callers [`reset`](RetryState::reset) it
/// between independent operation sequences.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct RetryState {
    /// Failed attempts so far.
    pub attempts: u32,
    /// Message of the most recent failure.
    pub last_error: Option<String>,
    pub in_progress: bool,
    /// Label of the component that owns this state.
    pub component: String,
}

impl RetryState {
    pub fn new(component: &str) -> Self {
        RetryState { component: component.to_string(), ..Default::default() }
    }

    /// Clear progress, keeping the component label.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.last_error = None;
        self.in_progress = false;
    }
}

/// One [`RetryState`] per operation category.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct RetryStates {
    pub gene: RetryState,
    pub variant: RetryState,
    pub inheritance: RetryState,
}

impl RetryStates {
    pub fn new() -> Self {
        RetryStates {
            gene: RetryState::new("gene"),
            variant: RetryState::new("variant"),
            inheritance: RetryState::new("inheritance"),
        }
    }

    pub fn reset_all(&mut self) {
        self.gene.reset();
        self.variant.reset();
        self.inheritance.reset();
    }

    pub fn any_in_progress(&self) -> bool {
        self.gene.in_progress || self.variant.in_progress || self.inheritance.in_progress
    }
}

// ----------------------------------------------------------------------------
// Retry
// ----------------------------------------------------------------------------

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// [`max_retries`](RetryOptions::max_retries) attempts have failed.
///
/// The attempt counter of a caller-supplied `state` is read and incremented, it
/// is not reset. The backoff sleep is the only suspension point besides the
/// operation itself. The final error is returned unchanged.
///
/// ## Examples
///
/// ```rust
/// use ncscore::retry::{retry_with_backoff, RetryOptions, RetryState};
/// use ncscore::ApiError;
/// use std::time::Duration;
/// # use tokio_test::block_on;
///
/// let options = RetryOptions::default().initial_delay(Duration::from_millis(1));
/// let mut state = RetryState::new("example");
/// let mut calls = 0;
///
/// let result = block_on(retry_with_backoff(
///     || {
///         calls += 1;
///         let fail = calls < 2;
///         async move {
///             match fail {
///                 true => Err(ApiError::status(503, "https://example.org")),
///                 false => Ok("done"),
///             }
///         }
///     },
///     &options,
///     Some(&mut state),
/// ));
///
/// assert_eq!(result, Ok("done"));
/// assert_eq!(state.attempts, 1);
/// ```
pub async fn retry_with_backoff<T, E, F, Fut>(
    mut operation: F,
    options: &RetryOptions<E>,
    state: Option<&mut RetryState>,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + Display,
{
    let mut local = RetryState::default();
    let state = match state {
        Some(state) => state,
        None => &mut local,
    };
    state.in_progress = true;

    loop {
        match operation().await {
            Ok(result) => {
                if state.attempts > 0 {
                    info!("Succeeded after {} failed attempt(s).", state.attempts);
                    if let Some(on_success) = &options.on_success {
                        on_success(state.attempts);
                    }
                }
                state.in_progress = false;
                return Ok(result);
            }
            Err(error) => {
                state.attempts += 1;
                state.last_error = Some(error.to_string());

                if state.attempts >= options.max_retries || !options.is_retryable(&error) {
                    state.in_progress = false;
                    return Err(error);
                }

                let delay = options.delay(state.attempts);
                warn!("Retry attempt {} after error: {error}", state.attempts);
                if let Some(on_retry) = &options.on_retry {
                    on_retry(&error, state.attempts);
                }
                tokio::time::sleep(delay).await;
            }
        }
    }
}
