//! Error types for the Gemini client.

use thiserror::Error;

/// Result type for Gemini client operations.
pub type Result<T> = std::result::Result<T, GeminiError>;

/// Gemini client errors.
#[derive(Debug, Error)]
pub enum GeminiError {
    /// Configuration error (missing API key)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport error (DNS, TLS, timeout, connection reset)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-2xx response; body is truncated
    #[error("Gemini API returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Response body was not valid JSON, or the image payload was not valid base64
    #[error("Decode error: {0}")]
    Decode(String),

    /// The response contained no inline image data
    #[error("Gemini response contained no image data")]
    NoImage,
}
