//! Classifier error types.

use animal_models::FailureKind;
use thiserror::Error;

pub type ClassifierResult<T> = Result<T, ClassifierError>;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClassifierError {
    pub fn invalid_image(msg: impl Into<String>) -> Self {
        Self::InvalidImage(msg.into())
    }

    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::ModelNotFound(path.into())
    }

    pub fn model_load(msg: impl Into<String>) -> Self {
        Self::ModelLoad(msg.into())
    }

    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Only transport-level failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClassifierError::Network(_))
    }

    /// User-facing failure category for this error.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ClassifierError::InvalidImage(_) => FailureKind::InvalidImage,
            ClassifierError::Network(e) => FailureKind::Connection(e.to_string()),
            ClassifierError::RequestFailed(msg) | ClassifierError::InvalidResponse(msg) => {
                FailureKind::Connection(msg.clone())
            }
            ClassifierError::ModelNotFound(_)
            | ClassifierError::ModelLoad(_)
            | ClassifierError::Inference(_)
            | ClassifierError::Config(_)
            | ClassifierError::Io(_) => FailureKind::Inference(self.to_string()),
        }
    }
}
