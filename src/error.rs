//! Failures of the upstream gene and variant APIs.

use crate::retry::Classify;

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Words that identify a transient transport failure in an error message.
const NETWORK_VOCABULARY: &[&str] = &[
    "network",
    "timeout",
    "timed out",
    "failed to fetch",
    "connection reset",
    "connection refused",
    "connection aborted",
];

/// Error of an upstream API call.
///
/// Only [`ApiError::Status`] carries a structured HTTP response, which is what the
/// [retry classifier](crate::retry::ErrorConfig) inspects first.
#[derive(Clone, Debug, Deserialize, Error, PartialEq, Serialize)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("Network error: {message}")]
    Network { message: String, code: Option<NetworkCode> },
    /// The server responded with a non-success status code.
    #[error("Request failed with status code {status}: {url}")]
    Status { status: u16, url: String, body: String },
    /// The response body could not be decoded.
    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
    /// The request was rejected before it was sent.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Annotations could not be written in the requested output format.
    #[error("Failed to render {format} output: {message}")]
    Render { format: String, message: String },
}

/// Transport failure codes that are always considered transient.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum NetworkCode {
    Timeout,
    ConnectionAborted,
    ConnectionRefused,
    ConnectionReset,
    /// The request could not be sent or its body could not be read.
    FetchFailed,
}

impl Display for NetworkCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            NetworkCode::Timeout => "ETIMEDOUT",
            NetworkCode::ConnectionAborted => "ECONNABORTED",
            NetworkCode::ConnectionRefused => "ECONNREFUSED",
            NetworkCode::ConnectionReset => "ECONNRESET",
            NetworkCode::FetchFailed => "EFETCH",
        };
        write!(f, "{code}")
    }
}

impl ApiError {
    /// A network error without a failure code, classified by its message alone.
    pub fn network(message: impl Into<String>) -> Self {
        ApiError::Network { message: message.into(), code: None }
    }

    /// A response with a status code.
    pub fn status(status: u16, url: impl Into<String>) -> Self {
        ApiError::Status { status, url: url.into(), body: String::new() }
    }
}

impl Classify for ApiError {
    fn response_status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn is_network_error(&self) -> bool {
        match self {
            ApiError::Network { code: Some(_), .. } => true,
            ApiError::Network { message, code: None } => {
                let message = message.to_lowercase();
                NETWORK_VOCABULARY.iter().any(|word| message.contains(word))
            }
            _ => false,
        }
    }
}

#[cfg(feature = "download")]
impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        let url = error.url().map(|u| u.to_string()).unwrap_or_default();

        if let Some(status) = error.status() {
            return ApiError::Status { status: status.as_u16(), url, body: String::new() };
        }
        if error.is_decode() {
            return ApiError::Decode { url, message: error.to_string() };
        }

        let message = error.to_string();
        let lowercase = format!("{error:?}").to_lowercase();
        let code = if error.is_timeout() {
            Some(NetworkCode::Timeout)
        } else if lowercase.contains("connection reset") {
            Some(NetworkCode::ConnectionReset)
        } else if lowercase.contains("connection aborted") {
            Some(NetworkCode::ConnectionAborted)
        } else if error.is_connect() {
            Some(NetworkCode::ConnectionRefused)
        } else if error.is_request() || error.is_body() {
            Some(NetworkCode::FetchFailed)
        } else {
            None
        };

        ApiError::Network { message, code }
    }
}
