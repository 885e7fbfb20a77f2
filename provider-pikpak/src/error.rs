//! Error types for the PikPak provider

use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use thiserror::Error;

/// PikPak provider errors
#[derive(Error, Debug)]
pub enum PikPakError {
    /// Token or captcha proof could not be obtained
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Drive API answered with a non-200 status
    #[error("PikPak API error (status {status}) from {endpoint}: {body}")]
    UnexpectedStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Ranged download answered with the wrong status or range
    #[error("Expected range {expected}, got {actual}")]
    RangeMismatch { expected: String, actual: String },

    /// Download host is shedding load
    #[error("Download service unavailable: {body}")]
    ServiceUnavailable { body: String },

    /// Listing requested on an item that is not folder-like
    #[error("Not a folder: {0}")]
    NotAFolder(String),

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Bridge error
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Result type for PikPak operations
pub type Result<T> = std::result::Result<T, PikPakError>;

impl From<PikPakError> for BridgeError {
    fn from(error: PikPakError) -> Self {
        match error {
            PikPakError::Bridge(e) => e,
            PikPakError::Auth(AuthError::Bridge(e)) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = PikPakError::UnexpectedStatus {
            endpoint: "files".to_string(),
            status: 404,
            body: "file_not_found".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "PikPak API error (status 404) from files: file_not_found"
        );
    }

    #[test]
    fn test_error_conversion() {
        let error = PikPakError::RangeMismatch {
            expected: "bytes 0-9".to_string(),
            actual: "".to_string(),
        };
        let bridge_error: BridgeError = error.into();
        assert!(matches!(bridge_error, BridgeError::OperationFailed(_)));

        let timeout: BridgeError =
            PikPakError::Bridge(BridgeError::Timeout("slow".to_string())).into();
        assert!(matches!(timeout, BridgeError::Timeout(_)));
    }
}
