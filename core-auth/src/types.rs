use base64::Engine;
use bridge_traits::storage::StateStore;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AuthError, Result};

/// Document name of the persisted session state.
pub const STATE_DOCUMENT: &str = "state";

/// Document name of the persisted account configuration.
pub const CONFIG_DOCUMENT: &str = "config";

/// One step of the captcha-sign hash chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningAlgorithm {
    pub alg: String,
    pub salt: String,
}

impl SigningAlgorithm {
    pub fn new(alg: impl Into<String>, salt: impl Into<String>) -> Self {
        Self {
            alg: alg.into(),
            salt: salt.into(),
        }
    }
}

/// Web client parameters scraped from the bootstrap script.
///
/// These are shared by every session in the process; the device id is not
/// part of the profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientProfile {
    pub client_id: String,
    pub client_version: String,
    pub package_name: String,
    pub timestamp: String,
    pub algorithms: Vec<SigningAlgorithm>,
}

/// Username and password of one account.
///
/// Serialized as the `config` document.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCredentials {
    pub username: String,
    pub password: String,
}

impl AccountCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub async fn load(store: &dyn StateStore) -> Result<Option<Self>> {
        load_document(store, CONFIG_DOCUMENT).await
    }

    pub async fn save(&self, store: &dyn StateStore) -> Result<()> {
        save_document(store, CONFIG_DOCUMENT, self).await
    }
}

impl fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Access/refresh token pair.
///
/// An empty string means "absent"; the persisted document uses the same
/// convention.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    pub fn clear(&mut self) {
        self.access_token.clear();
        self.refresh_token.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_empty() && self.refresh_token.is_empty()
    }
}

// Custom Debug implementation to avoid logging tokens
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &redacted(&self.access_token))
            .field("refresh_token", &redacted(&self.refresh_token))
            .finish()
    }
}

fn redacted(value: &str) -> &'static str {
    if value.is_empty() {
        "<empty>"
    } else {
        "[REDACTED]"
    }
}

/// Claims read from an access token.
///
/// The signature is not verified: the token is only inspected to decide
/// whether it is worth sending, and the remote service remains the
/// authority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub exp: Option<i64>,
}

impl TokenClaims {
    /// Decode the payload segment of a JWT
    pub fn decode(token: &str) -> Result<Self> {
        let mut segments = token.split('.');
        let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(_), Some(payload), Some(_), None) => payload,
            _ => {
                return Err(AuthError::InvalidToken(
                    "token is not a three-part JWT".to_string(),
                ))
            }
        };

        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| AuthError::InvalidToken(format!("payload is not base64url: {}", e)))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::InvalidToken(format!("payload is not valid claims: {}", e)))
    }

    /// A missing or zero `exp` never expires.
    pub fn is_valid_at(&self, unix_now: i64) -> bool {
        match self.exp {
            None | Some(0) => true,
            Some(exp) => unix_now < exp,
        }
    }
}

/// Captcha-sign material kept alongside the tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningState {
    #[serde(default)]
    pub algorithms: Vec<SigningAlgorithm>,
    #[serde(default)]
    pub captcha_sign: String,
    #[serde(default)]
    pub last_captcha_token: String,
}

/// Persisted session document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub oauth2: Credentials,
    #[serde(default)]
    pub signing: SigningState,
}

impl SessionState {
    pub async fn load(store: &dyn StateStore) -> Result<Option<Self>> {
        load_document(store, STATE_DOCUMENT).await
    }

    pub async fn save(&self, store: &dyn StateStore) -> Result<()> {
        save_document(store, STATE_DOCUMENT, self).await
    }
}

/// Session lifecycle as seen from the outside.
///
/// ```text
/// Unauthenticated -> Authenticated
///                       ^    |
///                       |    v
///                      Expired
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    Authenticated,
    Expired,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated)
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::Unauthenticated => write!(f, "Unauthenticated"),
            AuthState::Authenticated => write!(f, "Authenticated"),
            AuthState::Expired => write!(f, "Expired"),
        }
    }
}

async fn load_document<T: serde::de::DeserializeOwned>(
    store: &dyn StateStore,
    name: &str,
) -> Result<Option<T>> {
    match store.load(name).await? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| AuthError::Serialization(format!("{} document is corrupt: {}", name, e))),
        None => Ok(None),
    }
}

async fn save_document<T: Serialize>(store: &dyn StateStore, name: &str, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| AuthError::Serialization(format!("Failed to encode {}: {}", name, e)))?;
    store.save(name, Bytes::from(json)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt(payload: &str) -> String {
        let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        format!(
            "{}.{}.sig",
            engine.encode(r#"{"alg":"RS256"}"#),
            engine.encode(payload)
        )
    }

    #[test]
    fn test_claims_decode() {
        let claims = TokenClaims::decode(&jwt(r#"{"sub":"user-1","exp":2000}"#)).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.exp, Some(2000));
        assert!(claims.is_valid_at(1999));
        assert!(!claims.is_valid_at(2000));
    }

    #[test]
    fn test_claims_without_expiry_never_expire() {
        let claims = TokenClaims::decode(&jwt(r#"{"sub":"user-1"}"#)).unwrap();
        assert!(claims.is_valid_at(i64::MAX));
    }

    #[test]
    fn test_claims_reject_garbage() {
        assert!(TokenClaims::decode("").is_err());
        assert!(TokenClaims::decode("a.b").is_err());
        assert!(TokenClaims::decode("a.!!!.c").is_err());
        assert!(TokenClaims::decode(&jwt("not json")).is_err());
    }

    #[test]
    fn test_credentials_debug_redacts() {
        let creds = Credentials::new("secret-access", "");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("secret-access"));
        assert!(debug.contains("<empty>"));

        let account = AccountCredentials::new("a@b.c", "hunter2");
        assert!(!format!("{:?}", account).contains("hunter2"));
    }

    #[test]
    fn test_session_state_document_shape() {
        let state = SessionState {
            device_id: "dev".to_string(),
            oauth2: Credentials::new("at", "rt"),
            signing: SigningState {
                algorithms: vec![SigningAlgorithm::new("md5", "s1")],
                captcha_sign: "1.abc".to_string(),
                last_captcha_token: "ck".to_string(),
            },
        };

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["deviceId"], "dev");
        assert_eq!(json["oauth2"]["accessToken"], "at");
        assert_eq!(json["oauth2"]["refreshToken"], "rt");
        assert_eq!(json["signing"]["captchaSign"], "1.abc");
        assert_eq!(json["signing"]["lastCaptchaToken"], "ck");
        assert_eq!(json["signing"]["algorithms"][0]["salt"], "s1");
    }

    #[test]
    fn test_session_state_tolerates_missing_fields() {
        let state: SessionState = serde_json::from_str(r#"{"deviceId":"dev"}"#).unwrap();
        assert_eq!(state.device_id, "dev");
        assert!(state.oauth2.is_empty());
    }
}
