use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

/// Validation errors for the media model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("adaptation has no representations")]
    EmptyAdaptation,

    #[error("duplicate bitrate {0} within adaptation")]
    DuplicateBitrate(u64),

    #[error("representation bitrate must be positive")]
    ZeroBitrate,
}
