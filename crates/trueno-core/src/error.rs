use thiserror::Error;

/// Error type for the wire types and configuration layer.
#[derive(Error, Debug)]
pub enum TruenoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown component type: {0:?}")]
    UnknownComponentType(String),

    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Unknown job status: {0}")]
    UnknownJobStatus(String),

    #[error("Unknown direction: {0}")]
    UnknownDirection(String),

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<config::ConfigError> for TruenoError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TruenoError>;
