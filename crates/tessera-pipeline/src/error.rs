use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Terminal segment-pipeline errors.
///
/// Retryable transport failures are consumed inside the pipeline; what
/// surfaces here is fatal for the segment.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("network error: {0}")]
    Net(#[from] tessera_net::NetError),

    #[error("payload parse failed: {0}")]
    Parse(String),

    #[error("segment not found: {0}")]
    SegmentNotFound(String),

    #[error("cancelled")]
    Cancelled,
}

impl PipelineError {
    /// True when switching representation might recover the content
    /// (e.g. a 404 on one rendition while others remain available).
    #[must_use]
    pub fn may_recover_by_switching(&self) -> bool {
        matches!(
            self,
            Self::Net(tessera_net::NetError::Status { status, .. }) if *status != 429 && (400..500).contains(status)
        )
    }
}
