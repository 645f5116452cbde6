//! Error types for quizflow-client

use thiserror::Error;

/// Errors raised while constructing a client (never during stage calls)
#[derive(Error, Debug)]
pub enum ClientError {
    /// Base URL could not be parsed or cannot carry a path
    #[error("Invalid backend URL: {0}")]
    InvalidBaseUrl(String),

    /// The HTTP client could not be built
    #[error("HTTP client setup failed: {0}")]
    Http(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Http(err.to_string())
    }
}
