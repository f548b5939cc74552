use template_grammar::GrammarError;
use thiserror::Error;

pub type Result<T, E = GraphError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),
    #[error("rule refers to itself: {0}")]
    RecursiveReference(String),
    #[error("no generator for slot: {0}")]
    MissingSlotGenerator(String),
    #[error("no output from slot: {0}")]
    EmptySlotOutput(String),
    #[error("slot generator {slot} failed: {message}")]
    SlotGenerator { slot: String, message: String },
    #[error("invalid graph: {0}")]
    InvalidGraph(String),
    #[error("invalid label: {0}")]
    InvalidLabel(String),
    #[error(transparent)]
    Grammar(#[from] GrammarError),
    #[error("JSON error: {0}")]
    Json(String),
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },
}

impl From<serde_json::Error> for GraphError {
    fn from(e: serde_json::Error) -> Self {
        GraphError::Json(e.to_string())
    }
}
