use intent_graph::GraphError;
use thiserror::Error;

pub type Result<T, E = RecognizeError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum RecognizeError {
    #[error("unbalanced converter markers: {0}")]
    UnbalancedConverter(String),
    #[error("unbalanced entity markers: {0}")]
    UnbalancedEntity(String),
    #[error("unknown converter: {0}")]
    UnknownConverter(String),
    #[error("converter {converter} failed: {message}")]
    Conversion { converter: String, message: String },
    #[error("path does not follow the graph: {0}")]
    InvalidPath(String),
    #[error("invalid label: {0}")]
    InvalidLabel(String),
    #[error("config error: {0}")]
    Config(String),
}

impl From<GraphError> for RecognizeError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::InvalidLabel(label) => RecognizeError::InvalidLabel(label),
            other => RecognizeError::InvalidPath(other.to_string()),
        }
    }
}
