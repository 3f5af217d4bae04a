use std::path::PathBuf;
use thiserror::Error;
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read model artifact {path}: {source}")]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model artifact is not valid JSON: {0}")]
    ModelFormat(#[from] serde_json::Error),
    #[error("model artifact rejected: {0}")]
    ModelInvalid(String),
    #[error("unknown feature `{0}` in model artifact")]
    UnknownFeature(String),
    #[error("feature vector shape mismatch: expected {expected} values, got {actual}")]
    FeatureShape { expected: usize, actual: usize },
    #[error("model produced a non-finite probability for a {features}-feature vector")]
    NonFiniteOutput { features: usize },
    #[error("cannot aggregate an empty batch")]
    EmptyBatch,
    #[error("sample acquisition failed: {0}")]
    Acquisition(String),
    #[error("sample rate must be greater than zero")]
    InvalidSampleRate,
    #[error("channel count mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
impl PipelineError {
    /// Errors that mean an upstream stage handed over malformed data.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            PipelineError::FeatureShape { .. }
                | PipelineError::NonFiniteOutput { .. }
                | PipelineError::EmptyBatch
        )
    }
}
impl From<reqwest::Error> for PipelineError {
    fn from(value: reqwest::Error) -> Self {
        PipelineError::Acquisition(value.to_string())
    }
}
