use thiserror::Error;

/// Errors from block arithmetic. All of them mean a caller broke a shape
/// precondition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("dimension mismatch: {left}x{left} vs {right}x{right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("cannot split a {0}x{0} block into quadrants")]
    OddSide(usize),

    #[error("expected {expected} values for a square block, got {actual}")]
    NotSquare { expected: usize, actual: usize },
}

/// Errors from the text wire format and the matrix input format.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid number {token:?} at position {position}")]
    InvalidNumber { token: String, position: usize },

    #[error("expected {expected} values, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("missing side length")]
    MissingSide,

    #[error("side length {0} is too large")]
    SideTooLarge(usize),

    #[error(transparent)]
    Block(#[from] BlockError),
}
