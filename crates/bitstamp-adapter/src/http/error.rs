/*
[INPUT]:  Error sources (HTTP transport, response bodies, exchange envelopes, WebSocket)
[OUTPUT]: Structured error types with context and retry hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or changing response classification
*/

use std::time::Duration;

use thiserror::Error;

/// Main error type for the Bitstamp adapter
#[derive(Error, Debug)]
pub enum BitstampError {
    /// Network, DNS or TLS failure before a response body was read
    #[error("HTTP transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The exchange answered with a zero-length body
    #[error("Response body 0 length")]
    EmptyResponse,

    /// Body or field could not be decoded
    #[error("Malformed JSON: {message}")]
    MalformedJson { message: String, body: String },

    /// The exchange explicitly reported a failure
    #[error("API error: {message}")]
    Api {
        message: String,
        reason: Option<String>,
        code: Option<String>,
    },

    /// Initial WebSocket dial failed
    #[error("WebSocket connect failed: {0}")]
    Connect(#[source] tokio_tungstenite::tungstenite::Error),

    /// A frame could not be read from the socket
    #[error("WebSocket frame error: {0}")]
    Frame(String),

    /// No frame arrived within the idle timeout
    #[error("No frame received within {idle:?}")]
    FrameTimeout { idle: Duration },

    /// A text frame was not a valid event
    #[error("Event decode failed: {message}")]
    Decode { message: String, frame: String },

    /// The stream's background task is no longer running
    #[error("WebSocket not connected")]
    NotConnected,

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BitstampError {
    /// Check if the error is retryable. Nothing in the crate retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BitstampError::Transport(_)
                | BitstampError::Connect(_)
                | BitstampError::Frame(_)
                | BitstampError::FrameTimeout { .. }
        )
    }

    /// Check if the exchange itself rejected the request
    pub fn is_api_error(&self) -> bool {
        matches!(self, BitstampError::Api { .. })
    }

    /// Build a `MalformedJson` error keeping the offending body for diagnostics
    pub fn malformed(err: impl std::fmt::Display, body: impl Into<String>) -> Self {
        BitstampError::MalformedJson {
            message: err.to_string(),
            body: body.into(),
        }
    }

    /// Build an `Api` error from the `{"error": ...}` envelope
    pub fn api_message(message: impl Into<String>) -> Self {
        BitstampError::Api {
            message: message.into(),
            reason: None,
            code: None,
        }
    }

    /// Build an `Api` error from the `{"status": "error", ...}` envelope
    pub fn api_status(reason: Option<String>, code: Option<String>) -> Self {
        let message = match (&reason, &code) {
            (Some(reason), Some(code)) => format!("{reason} (code {code})"),
            (Some(reason), None) => reason.clone(),
            (None, Some(code)) => format!("status error (code {code})"),
            (None, None) => "status error".to_string(),
        };
        BitstampError::Api {
            message,
            reason,
            code,
        }
    }
}

/// Result type alias for Bitstamp operations
pub type Result<T> = std::result::Result<T, BitstampError>;
