use thiserror::Error;

/// Why a record's embedding could not be used for similarity.
///
/// These never abort a load. The record is kept as an isolated point and the
/// reason is logged.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding is missing")]
    Missing,

    #[error("embedding is empty")]
    Empty,

    #[error("embedding string is not a JSON number array: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("embedding component {index} is not finite")]
    NonFinite { index: usize },

    #[error("embedding has dimension {found}, batch dimension is {expected}")]
    DimensionMismatch { expected: usize, found: usize },
}
