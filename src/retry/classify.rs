//! Decide whether a failed attempt is worth retrying.

use log::debug;
use serde::{Deserialize, Serialize};

/// Status codes that are retried unless overridden.
pub const DEFAULT_RETRYABLE_STATUS_CODES: &[u16] = &[429, 500, 501, 502, 503, 504];
/// Status codes that are never retried unless overridden.
pub const DEFAULT_NON_RETRYABLE_STATUS_CODES: &[u16] = &[400, 401, 403, 404, 405, 422];

/// What the classifier needs to know about an error.
pub trait Classify {
    /// The HTTP status of a structured response attached to the error, if any.
    fn response_status(&self) -> Option<u16>;
    /// True if the error is a transport failure from the transient network vocabulary
    /// (timeouts, connection reset or refused, failed fetch).
    fn is_network_error(&self) -> bool;
}

/// Caller overrides of the status code partitions.
///
/// Codes listed here take precedence over the defaults. If a code is listed
/// in both, it is not retried. Unlisted codes fall back to the defaults.
///
/// ## Examples
///
/// ```rust
/// use ncscore::retry::ErrorConfig;
/// use ncscore::ApiError;
///
/// let default = ErrorConfig::default();
/// assert!(default.is_retryable(&ApiError::status(503, "")));
/// assert!(!default.is_retryable(&ApiError::status(404, "")));
///
/// let config = ErrorConfig { retryable_status_codes: vec![404], ..Default::default() };
/// assert!(config.is_retryable(&ApiError::status(404, "")));
/// assert!(!config.is_retryable(&ApiError::status(401, "")));
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ErrorConfig {
    pub retryable_status_codes: Vec<u16>,
    pub non_retryable_status_codes: Vec<u16>,
}

impl ErrorConfig {
    /// Returns true if the error warrants another attempt.
    ///
    /// - No response attached: retry only transient network failures.
    /// - 429 and 5xx: retry.
    /// - 4xx: do not retry.
    /// - Anything else: do not retry.
    pub fn is_retryable<E: Classify>(&self, error: &E) -> bool {
        let status = match error.response_status() {
            Some(status) => status,
            None => {
                let retry = error.is_network_error();
                debug!("Network-level failure, retryable: {retry}");
                return retry;
            }
        };

        let retry = if self.non_retryable_status_codes.contains(&status) {
            false
        } else if self.retryable_status_codes.contains(&status) {
            true
        } else if DEFAULT_RETRYABLE_STATUS_CODES.contains(&status) {
            true
        } else if DEFAULT_NON_RETRYABLE_STATUS_CODES.contains(&status) {
            false
        } else {
            (500..600).contains(&status)
        };

        debug!("Status code {status}, retryable: {retry}");
        retry
    }
}
