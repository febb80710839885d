//! Error types for Auralize

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuralizeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Compute error: {0}")]
    Compute(String),

    #[error("Postprocessing error: {0}")]
    Postprocess(String),

    #[error("Audio write error: {0}")]
    AudioWrite(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Render cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, AuralizeError>;
