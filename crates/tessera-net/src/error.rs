use reqwest::Error as ReqwestError;
use thiserror::Error;
use url::Url;

pub type NetResult<T> = Result<T, NetError>;

/// Transport-level errors.
#[derive(Debug, Error, Clone)]
pub enum NetError {
    /// The per-request deadline expired.
    #[error("request deadline expired")]
    Timeout,

    /// Connection-level failure (DNS, reset, refused).
    #[error("connection failed: {0}")]
    Connect(String),

    /// Non-success HTTP status.
    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: Url },

    /// The response body could not be read to completion.
    #[error("body read failed: {0}")]
    Body(String),

    /// Retry budget exhausted; carries the last attempt's error.
    #[error("gave up after {attempts} attempts: {source}")]
    RetryExhausted { attempts: u32, source: Box<Self> },

    /// The request was cancelled by its owner.
    #[error("cancelled")]
    Cancelled,
}

impl NetError {
    /// Whether a fresh attempt could plausibly succeed.
    ///
    /// Timeouts, connection failures, body truncation, 5xx, 429 and 408 are
    /// transient; other statuses are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Connect(_) | Self::Body(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429 || *status == 408,
            Self::RetryExhausted { .. } | Self::Cancelled => false,
        }
    }
}

impl From<ReqwestError> for NetError {
    fn from(e: ReqwestError) -> Self {
        if e.is_timeout() {
            return Self::Timeout;
        }
        if e.is_body() || e.is_decode() {
            // {:#} includes the cause chain.
            return Self::Body(format!("{e:#}"));
        }
        Self::Connect(format!("{e:#}"))
    }
}
