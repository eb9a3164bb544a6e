use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InsightsError {
    #[error("invalid insights input: {0}")]
    InvalidInput(String),
}
