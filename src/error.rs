//! Error handling for npu-uvc-link
//!
//! This module defines the crate-wide error type and a Result alias. The
//! variants follow the recovery policy of the streaming path: configuration
//! errors abort startup, while corrupt or unsupported sideband data is
//! discarded locally and the picture keeps flowing.

use crate::pipeline::PipelineError;
use crate::sideband::SidebandError;
use thiserror::Error;

/// Main error type for npu-uvc-link operations
#[derive(Error, Debug)]
pub enum Error {
    /// Bad configuration (config file, model selection, rotation...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Graph construction or wiring errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Malformed sideband metadata (the picture itself is still usable)
    #[error("Corrupt metadata: {0}")]
    CorruptMetadata(#[from] SidebandError),

    /// `model_identifier` not present in the model registry
    #[error("Unsupported model: {0:?}")]
    UnsupportedModel(String),

    /// A buffer could not be allocated for a single processing cycle
    #[error("Allocation of {requested} bytes failed")]
    Allocation { requested: usize },

    /// A collaborator (encoder, decoder, inference engine) failed
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error only invalidates the sideband data of one picture.
    ///
    /// Such errors are logged and the metadata dropped; they never stop the stream.
    pub fn is_metadata_local(&self) -> bool {
        match self {
            Error::CorruptMetadata(_) | Error::UnsupportedModel(_) => true,
            Error::WithContext { source, .. } => source.is_metadata_local(),
            _ => false,
        }
    }
}

/// Result type alias for npu-uvc-link operations
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for anyhow::Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Collaborator(format!("{:#}", e)).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| Error::Collaborator(format!("{:#}", e)).with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnsupportedModel("yolo".to_string());
        assert_eq!(err.to_string(), "Unsupported model: \"yolo\"");
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::Config("bad rotation".to_string());
        let with_ctx = err.with_context("Failed to load config");
        assert!(with_ctx.to_string().contains("Failed to load config"));
        assert!(!with_ctx.is_metadata_local());
    }

    #[test]
    fn test_metadata_errors_are_local() {
        let err = Error::from(SidebandError::ExcessivePadding { offset: 7 });
        assert!(err.is_metadata_local());
        assert!(err.with_context("extract").is_metadata_local());
        assert!(Error::UnsupportedModel("x".into()).is_metadata_local());
        assert!(!Error::Allocation { requested: 4 }.is_metadata_local());
    }

    #[test]
    fn test_anyhow_context() {
        let res: anyhow::Result<()> = Err(anyhow::anyhow!("mpp timeout"));
        let err = res.context("decode picture").unwrap_err();
        assert!(err.to_string().contains("decode picture"));
        assert!(err.to_string().contains("mpp timeout"));
    }
}
