//! Error types for board and engine operations.

use std::fmt;

/// Error type for square parsing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SquareError {
    /// Square notation must be exactly 2 characters
    InvalidLength { len: usize },
    /// File or rank out of the a1..h8 range
    OutOfRange { notation: String },
}

impl fmt::Display for SquareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SquareError::InvalidLength { len } => {
                write!(f, "Square must be 2 characters, found {len}")
            }
            SquareError::OutOfRange { notation } => {
                write!(f, "Square '{notation}' is outside a1..h8")
            }
        }
    }
}

impl std::error::Error for SquareError {}

/// Error type for FEN parsing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FenError {
    /// FEN string has too few fields (needs at least 4)
    TooFewParts { found: usize },
    /// Invalid piece character in the placement field
    InvalidPiece { ch: char },
    /// Invalid side to move (must be 'w' or 'b')
    InvalidSideToMove { found: String },
    /// A rank overflows past the h-file
    TooManyFiles { rank: usize },
    /// Placement field has the wrong number of ranks
    BadRankCount { found: usize },
    /// The placement leaves a structural invariant violated
    /// (wrong king count, pawns on a back rank)
    InvariantViolated { what: &'static str },
}

impl fmt::Display for FenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FenError::TooFewParts { found } => {
                write!(f, "FEN must have at least 4 fields, found {found}")
            }
            FenError::InvalidPiece { ch } => {
                write!(f, "Invalid piece character '{ch}' in FEN")
            }
            FenError::InvalidSideToMove { found } => {
                write!(f, "Invalid side to move '{found}', expected 'w' or 'b'")
            }
            FenError::TooManyFiles { rank } => {
                write!(f, "Too many files in rank {rank}")
            }
            FenError::BadRankCount { found } => {
                write!(f, "FEN placement must have 8 ranks, found {found}")
            }
            FenError::InvariantViolated { what } => {
                write!(f, "FEN leaves the position invalid: {what}")
            }
        }
    }
}

impl std::error::Error for FenError {}

/// Error type for move-text parsing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveParseError {
    /// No legal move matches the given text
    NoMatch { notation: String },
}

impl fmt::Display for MoveParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveParseError::NoMatch { notation } => {
                write!(f, "No legal move matches '{notation}'")
            }
        }
    }
}

impl std::error::Error for MoveParseError {}

/// Error type for network-file loading failures. Fatal for search: the
/// engine refuses to search without an evaluator.
#[derive(Debug)]
pub enum NetworkError {
    /// Underlying I/O failure
    Io(std::io::Error),
    /// File ended before all weights were read
    Truncated { expected: usize, got: usize },
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::Io(e) => write!(f, "Network file I/O error: {e}"),
            NetworkError::Truncated { expected, got } => {
                write!(f, "Network file truncated: expected {expected} bytes, got {got}")
            }
        }
    }
}

impl std::error::Error for NetworkError {}

impl From<std::io::Error> for NetworkError {
    fn from(e: std::io::Error) -> Self {
        NetworkError::Io(e)
    }
}
