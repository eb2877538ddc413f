//! Error types shared by the client, backend and config layers

use thiserror::Error;

#[derive(Error, Debug)]
pub enum JackedError {
    #[error("JACK client error: {0}")]
    Client(String),

    #[error("Client has already been closed")]
    Closed,

    #[error("Input data stream is not synchronized")]
    InputSync,

    #[error("Output data stream is not synchronized")]
    OutputSync,

    #[error("Timed out after {0} ms waiting for a process cycle")]
    Timeout(u64),

    #[error("Expected {expected} channels x {samples} samples, got {found_channels} x {found_samples}")]
    Shape {
        expected: usize,
        samples: usize,
        found_channels: usize,
        found_samples: usize,
    },

    #[error("Invalid capture duration: {0} s")]
    InvalidDuration(f64),

    #[error("Failed to parse config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl JackedError {
    /// True for the two per-cycle sync failures the process loop skips over
    pub fn is_sync(&self) -> bool {
        matches!(self, JackedError::InputSync | JackedError::OutputSync)
    }
}

impl From<jack::Error> for JackedError {
    fn from(err: jack::Error) -> Self {
        JackedError::Client(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, JackedError>;
