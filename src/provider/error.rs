//! Provider-level error kind, grounded on the teacher's
//! `src/brain/provider/error.rs` thiserror convention.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ProviderError {
    #[error("provider call timed out after {elapsed_secs:.2}s (deadline {deadline_secs:.2}s)")]
    Timeout { elapsed_secs: f64, deadline_secs: f64 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("http {status}: {body}")]
    Http { status: u16, body: String },

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("invalid api key")]
    InvalidApiKey,
}

pub type Result<T> = std::result::Result<T, ProviderError>;
