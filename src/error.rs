/// Error kinds shared by the board, the share codec and the model bridge
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BoardError {
    /// Grid access outside 16x16. Caller bug; fails only the operation.
    #[error("cell ({row}, {col}) is outside the 16x16 board")]
    Index { row: usize, col: usize },

    /// Malformed shareable pattern.
    #[error("invalid pattern: {0}")]
    Format(String),

    #[error("generative model is not loaded yet")]
    ModelUnavailable,

    /// The model handed back exactly what it was given.
    #[error("model echoed its input unchanged")]
    DegenerateGeneration,

    #[error("a generation request is already in flight")]
    GenerationInFlight,

    #[error("model failed: {0}")]
    Model(String),
}

pub type Result<T> = std::result::Result<T, BoardError>;
