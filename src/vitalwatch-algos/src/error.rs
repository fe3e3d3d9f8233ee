use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("insufficient data: need at least {required} records, got {actual}")]
    InsufficientData { required: usize, actual: usize },
}

impl AnalysisError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}

pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;
