use thiserror::Error;

use crate::types::ExerciseStyle;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Invalid strike price")]
    InvalidStrike,

    #[error("Invalid spot price")]
    InvalidPrice,

    #[error("Invalid expiry")]
    InvalidExpiry,

    #[error("Invalid volatility")]
    InvalidVolatility,

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Model does not support {0:?} exercise")]
    UnsupportedExercise(ExerciseStyle),

    #[error("Market price outside no-arbitrage bounds")]
    PriceOutOfBounds,

    #[error("Did not converge after {0} iterations")]
    NoConvergence(usize),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("No data found for {0}")]
    SymbolNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Chart error: {0}")]
    Chart(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
