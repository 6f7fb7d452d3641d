//! Error types for image generation and history persistence.

use std::time::Duration;

/// Banner text used when a failure carries no message of its own.
pub const FALLBACK_FAILURE_MESSAGE: &str = "Something went wrong while generating.";

/// Longest error body kept for display.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Errors that can occur while generating or storing images.
#[derive(Debug, thiserror::Error)]
pub enum GenStudioError {
    /// API key missing or invalid.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limit or quota exceeded.
    #[error("{}", describe_rate_limit(.message, .retry_after))]
    RateLimited {
        retry_after: Option<Duration>,
        message: String,
    },

    /// Request exceeded the configured timeout.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Billing is not enabled for the API key.
    #[error("billing error: {0}")]
    Billing(String),

    /// Invalid request parameters or configuration.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (e.g., saving a file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The service answered, but not with an image.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Generation failed for a reason reported verbatim by the generator.
    #[error("{0}")]
    Generation(String),
}

impl GenStudioError {
    /// Returns the message shown to the user when a generation fails.
    ///
    /// Failures without a usable message fall back to
    /// [`FALLBACK_FAILURE_MESSAGE`].
    pub fn user_message(&self) -> String {
        let message = match self {
            Self::Generation(reason) => reason.trim().to_string(),
            Self::RateLimited { message, .. } if !message.trim().is_empty() => {
                message.trim().to_string()
            }
            Self::Api { message, .. } if message.trim().is_empty() => String::new(),
            Self::ContentBlocked(reason) if reason.trim().is_empty() => String::new(),
            other => other.to_string(),
        };
        if message.is_empty() {
            FALLBACK_FAILURE_MESSAGE.to_string()
        } else {
            message
        }
    }
}

fn describe_rate_limit(message: &str, retry_after: &Option<Duration>) -> String {
    let mut text = String::from("rate limited");
    if !message.trim().is_empty() {
        text.push_str(": ");
        text.push_str(message.trim());
    }
    if let Some(wait) = retry_after {
        text.push_str(&format!(" (retry in {}s)", wait.as_secs()));
    }
    text
}

/// Parses a `Retry-After` header given in whole seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Extracts a readable message from an error body and bounds its length.
///
/// Google APIs wrap errors as `{"error": {"message": ...}}`; anything else
/// is kept as plain text.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let extracted = serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| text.trim().to_string());

    if extracted.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let truncated: String = extracted.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{truncated}...")
    } else {
        extracted
    }
}

/// Result type alias for generation and storage operations.
pub type Result<T> = std::result::Result<T, GenStudioError>;
