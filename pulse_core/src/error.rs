use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Environment error: {0}")]
    Environment(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PulseError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// True for errors raised while validating setup input.
    pub fn is_config(&self) -> bool {
        matches!(self, PulseError::InvalidConfig(_))
    }
}

pub type Result<T> = std::result::Result<T, PulseError>;
