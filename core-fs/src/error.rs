use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use provider_pikpak::PikPakError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not a folder: {0}")]
    NotAFolder(String),

    #[error("File does not exist: {0}")]
    NotExist(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Expected range {expected}, got {actual}")]
    RangeMismatch { expected: String, actual: String },

    #[error("Unexpected status {status} from {endpoint}: {body}")]
    UnexpectedStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Too many requests, retry after {} seconds", .retry_after.as_secs())]
    TooManyRequests { retry_after: Duration, body: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Captcha proof for {action} still rejected after {attempts} attempts")]
    CaptchaRetriesExceeded { action: String, attempts: u32 },

    /// Missing or malformed credentials at the front door
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String, challenge: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Auth(AuthError),

    #[error(transparent)]
    Provider(PikPakError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl FsError {
    /// Status a filesystem-protocol server should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            FsError::NotFound(_) | FsError::NotExist(_) | FsError::NotAFolder(_) => 404,
            FsError::PermissionDenied(_) => 403,
            FsError::InvalidOperation(_) => 400,
            FsError::TooManyRequests { .. } => 429,
            FsError::AuthenticationFailed(_)
            | FsError::CaptchaRetriesExceeded { .. }
            | FsError::Unauthorized { .. } => 401,
            FsError::RangeMismatch { .. }
            | FsError::UnexpectedStatus { .. }
            | FsError::Auth(_)
            | FsError::Provider(_) => 502,
            FsError::Bridge(BridgeError::Timeout(_)) => 504,
            FsError::Cancelled | FsError::Bridge(_) => 500,
        }
    }

    /// Whether the error reports an absent path
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound(_) | FsError::NotExist(_))
    }
}

impl From<AuthError> for FsError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::AuthenticationFailed { reason, .. } => FsError::AuthenticationFailed(reason),
            AuthError::CaptchaRetriesExceeded { action, attempts } => {
                FsError::CaptchaRetriesExceeded { action, attempts }
            }
            AuthError::UnexpectedStatus {
                endpoint,
                status,
                body,
            } => FsError::UnexpectedStatus {
                endpoint,
                status,
                body,
            },
            AuthError::Bridge(e) => FsError::Bridge(e),
            other => FsError::Auth(other),
        }
    }
}

impl From<PikPakError> for FsError {
    fn from(error: PikPakError) -> Self {
        match error {
            PikPakError::Auth(e) => e.into(),
            PikPakError::NotAFolder(name) => FsError::NotAFolder(name),
            PikPakError::RangeMismatch { expected, actual } => {
                FsError::RangeMismatch { expected, actual }
            }
            PikPakError::UnexpectedStatus {
                endpoint,
                status,
                body,
            } => FsError::UnexpectedStatus {
                endpoint,
                status,
                body,
            },
            PikPakError::Bridge(e) => FsError::Bridge(e),
            other => FsError::Provider(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(FsError::NotFound("/a".into()).status_code(), 404);
        assert_eq!(FsError::PermissionDenied("/".into()).status_code(), 403);
        assert_eq!(FsError::InvalidOperation("seek".into()).status_code(), 400);
        assert_eq!(
            FsError::TooManyRequests {
                retry_after: Duration::from_secs(10),
                body: String::new()
            }
            .status_code(),
            429
        );
        assert_eq!(FsError::AuthenticationFailed("bad".into()).status_code(), 401);
        assert_eq!(
            FsError::RangeMismatch {
                expected: "bytes 0-1".into(),
                actual: "".into()
            }
            .status_code(),
            502
        );
    }

    #[test]
    fn test_provider_errors_keep_their_kind() {
        let err: FsError = PikPakError::Auth(AuthError::CaptchaRetriesExceeded {
            action: "GET:/drive/v1/files".into(),
            attempts: 2,
        })
        .into();
        assert!(matches!(err, FsError::CaptchaRetriesExceeded { attempts: 2, .. }));

        let err: FsError = PikPakError::NotAFolder("song.mp3".into()).into();
        assert!(matches!(err, FsError::NotAFolder(_)));

        let err: FsError = PikPakError::ServiceUnavailable { body: "busy".into() }.into();
        assert!(matches!(err, FsError::Provider(_)));
    }

    #[test]
    fn test_too_many_requests_display() {
        let err = FsError::TooManyRequests {
            retry_after: Duration::from_secs(10),
            body: "busy".into(),
        };
        assert_eq!(err.to_string(), "Too many requests, retry after 10 seconds");
    }
}
