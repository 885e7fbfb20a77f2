use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authentication failed (status {status:?}): {reason}")]
    AuthenticationFailed { status: Option<u16>, reason: String },

    #[error("Captcha proof for {action} still rejected after {attempts} attempts")]
    CaptchaRetriesExceeded { action: String, attempts: u32 },

    #[error("Unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Client bootstrap failed: {0}")]
    BootstrapFailed(String),

    #[error("Unexpected status {status} from {endpoint}: {body}")]
    UnexpectedStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Invalid access token: {0}")]
    InvalidToken(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl AuthError {
    pub(crate) fn authentication(status: Option<u16>, reason: impl Into<String>) -> Self {
        AuthError::AuthenticationFailed {
            status,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
