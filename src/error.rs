//! Error types for the CosyVoice synthesis client.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while driving a synthesis session.
///
/// A failed session surfaces exactly one of these; there is no partial
/// result reporting. Retrying is left to the caller.
#[derive(Debug, Error)]
pub enum TtsError {
    /// The request failed validation before a connection was attempted.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Connecting to the service or exchanging frames failed at the
    /// socket level.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server reported a task failure for this session.
    #[error("synthesis task failed: {message} (code: {code})")]
    TaskFailed {
        /// Server-side error code, e.g. `InvalidParameter`.
        code: String,
        /// Human-readable error description from the server.
        message: String,
    },

    /// The session did not settle before the configured deadline.
    #[error("synthesis timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    /// The connection closed cleanly but no audio bytes were received.
    #[error("no audio data received from the CosyVoice service")]
    NoAudio,
}

/// Result type for synthesis operations.
pub type TtsResult<T> = Result<T, TtsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_failed_display_includes_code_and_message() {
        let err = TtsError::TaskFailed {
            code: "InvalidParameter".to_string(),
            message: "bad voice".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "synthesis task failed: bad voice (code: InvalidParameter)"
        );
    }

    #[test]
    fn test_timeout_display_in_seconds() {
        let err = TtsError::Timeout(Duration::from_secs(180));
        assert_eq!(err.to_string(), "synthesis timed out after 180 seconds");
    }
}
