use thiserror::Error;

pub type PlayerResult<T> = Result<T, PlayerError>;

/// Player-level error taxonomy.
///
/// Retryable trouble never reaches this type; it is consumed inside the
/// pipeline and surfaced as warnings. Everything here stopped the content.
#[derive(Debug, Error, Clone)]
pub enum PlayerError {
    #[error("network: {0}")]
    Network(String),

    #[error("segment pipeline: {0}")]
    Pipeline(String),

    #[error("manifest: {0}")]
    Manifest(String),

    #[error("media element rejected data: {0}")]
    Media(String),

    #[error("key system: {0}")]
    Key(String),

    #[error("player was disposed")]
    Disposed,

    #[error("no content loaded")]
    NotLoaded,

    #[error("invalid seek target: {0}")]
    InvalidSeek(String),
}

impl From<tessera_pipeline::PipelineError> for PlayerError {
    fn from(e: tessera_pipeline::PipelineError) -> Self {
        match e {
            tessera_pipeline::PipelineError::Net(inner) => Self::Network(inner.to_string()),
            other => Self::Pipeline(other.to_string()),
        }
    }
}
