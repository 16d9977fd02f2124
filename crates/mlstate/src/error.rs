use std::error::Error as StdError;
use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, MlStateError>;

/// Errors surfaced by an [`MlState`](crate::state::MlState) and its entry points.
#[derive(Debug, Error)]
pub enum MlStateError {
    /// A construction parameter is missing or invalid.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The state was terminated before the call.
    #[error("ML state is already terminated")]
    AlreadyTerminated,

    /// The written record does not carry the training field.
    #[error("field '{0}' is missing from the record")]
    FieldMissing(String),

    /// The persisted container is structurally broken.
    #[error("corrupt state container: {0}")]
    CorruptContainer(String),

    /// The persisted container was written by an unknown format version.
    #[error("unsupported format version of state container: {0}")]
    UnsupportedFormatVersion(u8),

    /// The model reported a failure. Passed through unchanged.
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("cannot encode state metadata: {0}")]
    MetadataEncode(#[from] rmp_serde::encode::Error),

    #[error("state '{0}' is not registered")]
    StateNotFound(String),

    #[error("state '{0}' isn't an ML state")]
    NotAnMlState(String),

    #[error("state '{0}' is already registered")]
    DuplicateState(String),
}

/// An opaque failure reported by a [`Model`](crate::model::Model) or
/// [`ModelFactory`](crate::model::ModelFactory) implementation.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ModelError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl ModelError {
    /// Creates an error carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error wrapping an underlying cause.
    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for ModelError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source("model I/O failed", err)
    }
}
