//! # Session Manager
//!
//! Owns one account's token pair and captcha proof.
//!
//! ## Overview
//!
//! Every drive API call needs two things: a valid bearer token and a captcha
//! proof issued for the exact `METHOD:path` action being performed. The
//! session manager produces both:
//!
//! - [`SessionManager::ensure_valid_token`] keeps the access token usable,
//!   falling back from refresh to a full sign-in.
//! - [`SessionManager::get_captcha_proof`] exchanges the device's captcha
//!   sign for a proof token, retrying once after a 401 with the access token
//!   invalidated.
//! - [`SessionManager::authorize`] does both for one request.
//!
//! ## Concurrency
//!
//! All state lives behind a single async mutex, and the whole
//! check-then-refresh sequence runs while holding it. Concurrent callers
//! that find an expired token queue up; the first one refreshes and the rest
//! observe the new token without issuing a second refresh. This matters
//! because the remote service may treat refresh tokens as single-use.
//!
//! ## Persistence
//!
//! After every mutation the session document is written through the
//! optional [`StateStore`]. Failures to persist a new token pair are
//! surfaced; failures to persist a captcha proof are only logged since the
//! proof is short-lived anyway.

use bridge_traits::{
    http::{HttpClient, HttpRequest, HttpResponse},
    storage::StateStore,
    time::{Clock, SystemClock},
};
use core_runtime::config::DriveConfig;
use core_runtime::logging::redact_if_sensitive;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{AuthError, Result};
use crate::signing::DeviceIdentity;
use crate::types::{AccountCredentials, AuthState, Credentials, SessionState, TokenClaims};

/// Substring marking actions that belong to the sign-in flow.
const SIGN_IN_ACTION_MARKER: &str = "signin";

/// Account-service endpoints derived from its base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEndpoints {
    pub sign_in: String,
    pub token: String,
    pub captcha_init: String,
}

impl SessionEndpoints {
    pub fn new(user_base_url: &str) -> Self {
        let base = user_base_url.trim_end_matches('/');
        Self {
            sign_in: format!("{}/v1/auth/signin", base),
            token: format!("{}/v1/auth/token", base),
            captcha_init: format!("{}/v1/shield/captcha/init", base),
        }
    }
}

/// Headers a drive request needs, produced under one lock acquisition.
#[derive(Clone, PartialEq, Eq)]
pub struct Authorization {
    pub access_token: String,
    pub captcha_token: String,
}

impl std::fmt::Debug for Authorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorization")
            .field("access_token", &"[REDACTED]")
            .field("captcha_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Serialize)]
struct SignInRequest<'a> {
    client_id: &'a str,
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
}

#[derive(Serialize, Default)]
struct CaptchaMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    captcha_sign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    package_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

#[derive(Serialize)]
struct CaptchaInitRequest<'a> {
    client_id: &'a str,
    action: &'a str,
    device_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    captcha_token: Option<&'a str>,
    meta: CaptchaMeta,
}

#[derive(Deserialize)]
struct CaptchaInitResponse {
    captcha_token: String,
    #[serde(default)]
    #[allow(dead_code)]
    expires_in: i64,
}

struct SessionInner {
    account: AccountCredentials,
    credentials: Credentials,
    last_captcha_token: String,
}

/// Token and captcha-proof owner for one account.
pub struct SessionManager {
    /// Account-service client; stamps identification headers itself
    http: Arc<dyn HttpClient>,
    identity: Arc<DeviceIdentity>,
    endpoints: SessionEndpoints,
    store: Option<Arc<dyn StateStore>>,
    clock: Arc<dyn Clock>,
    retry_budget: u32,
    request_timeout: Duration,
    inner: Mutex<SessionInner>,
}

impl SessionManager {
    /// Create an unauthenticated session
    ///
    /// `http` must be the account-service pipeline so that sign-in, refresh
    /// and captcha-init calls carry the device identification headers.
    pub fn new(
        http: Arc<dyn HttpClient>,
        identity: Arc<DeviceIdentity>,
        account: AccountCredentials,
        config: &DriveConfig,
    ) -> Self {
        Self {
            http,
            identity,
            endpoints: SessionEndpoints::new(&config.user_base_url),
            store: None,
            clock: Arc::new(SystemClock),
            retry_budget: config.captcha_retry_budget,
            request_timeout: config.request_timeout,
            inner: Mutex::new(SessionInner {
                account,
                credentials: Credentials::default(),
                last_captcha_token: String::new(),
            }),
        }
    }

    /// Persist state changes through `store`
    pub fn with_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use `clock` for token expiry checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Seed tokens and captcha proof from a previously saved document
    pub fn with_restored_state(mut self, state: &SessionState) -> Self {
        let inner = self.inner.get_mut();
        inner.credentials = state.oauth2.clone();
        inner.last_captcha_token = state.signing.last_captcha_token.clone();
        self
    }

    pub fn identity(&self) -> &Arc<DeviceIdentity> {
        &self.identity
    }

    pub async fn username(&self) -> String {
        self.inner.lock().await.account.username.clone()
    }

    /// Whether `password` matches the configured one
    pub async fn password_matches(&self, password: &str) -> bool {
        self.inner.lock().await.account.password == password
    }

    /// Current in-memory token pair
    pub async fn credentials(&self) -> Credentials {
        self.inner.lock().await.credentials.clone()
    }

    /// Snapshot of the session document
    pub async fn snapshot(&self) -> SessionState {
        let inner = self.inner.lock().await;
        self.state_of(&inner)
    }

    pub async fn auth_state(&self) -> AuthState {
        let inner = self.inner.lock().await;
        if self.valid_access_token(&inner).is_some() {
            AuthState::Authenticated
        } else if inner.credentials.is_empty() {
            AuthState::Unauthenticated
        } else {
            AuthState::Expired
        }
    }

    /// Make sure the access token is usable and return it
    ///
    /// A token that still decodes and has not reached its `exp` claim is
    /// returned without any HTTP call. Otherwise a refresh is attempted, and
    /// if that fails for any reason a full sign-in follows.
    #[instrument(skip(self))]
    pub async fn ensure_valid_token(&self) -> Result<String> {
        let mut inner = self.inner.lock().await;
        self.ensure_valid_token_locked(&mut inner).await
    }

    /// Sign in with username and password, replacing any tokens
    #[instrument(skip(self))]
    pub async fn sign_in(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.sign_in_locked(&mut inner).await
    }

    /// Exchange the refresh token for a new pair
    #[instrument(skip(self))]
    pub async fn refresh_token(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.refresh_locked(&mut inner).await
    }

    /// Obtain a captcha proof for `action` (`METHOD:path`)
    #[instrument(skip(self))]
    pub async fn get_captcha_proof(&self, action: &str) -> Result<String> {
        let mut inner = self.inner.lock().await;
        self.captcha_proof_locked(&mut inner, action).await
    }

    /// Captcha proof plus the bearer token for one drive request
    ///
    /// Both are produced under the same lock so the token returned is the
    /// one the proof was issued against.
    #[instrument(skip(self))]
    pub async fn authorize(&self, action: &str) -> Result<Authorization> {
        let mut inner = self.inner.lock().await;
        let captcha_token = self.captcha_proof_locked(&mut inner, action).await?;
        let access_token = self.ensure_valid_token_locked(&mut inner).await?;
        Ok(Authorization {
            access_token,
            captcha_token,
        })
    }

    /// Forget the access token so the next use triggers a refresh
    pub async fn invalidate_access_token(&self) {
        let mut inner = self.inner.lock().await;
        inner.credentials.access_token.clear();
        debug!("Access token invalidated");
    }

    /// Replace the password, drop both tokens and sign in again
    #[instrument(skip(self, password))]
    pub async fn update_password(&self, password: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.account.password = password.to_string();
        inner.credentials.clear();
        self.sign_in_locked(&mut inner).await
    }

    fn valid_access_token<'a>(&self, inner: &'a SessionInner) -> Option<&'a str> {
        let token = inner.credentials.access_token.as_str();
        if token.is_empty() {
            return None;
        }
        match TokenClaims::decode(token) {
            Ok(claims) if claims.is_valid_at(self.clock.unix_timestamp()) => Some(token),
            _ => None,
        }
    }

    async fn ensure_valid_token_locked(&self, inner: &mut SessionInner) -> Result<String> {
        if let Some(token) = self.valid_access_token(inner) {
            return Ok(token.to_string());
        }

        match self.refresh_locked(inner).await {
            Ok(()) => {
                debug!("Access token refreshed");
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, signing in again");
                self.sign_in_locked(inner).await?;
            }
        }

        Ok(inner.credentials.access_token.clone())
    }

    async fn sign_in_locked(&self, inner: &mut SessionInner) -> Result<()> {
        info!(
            username = %redact_if_sensitive("username", &inner.account.username),
            "Signing in"
        );

        let body = SignInRequest {
            client_id: self.identity.client_id(),
            username: &inner.account.username,
            password: &inner.account.password,
        };
        let request = HttpRequest::post(&self.endpoints.sign_in)
            .json(&body)?
            .timeout(self.request_timeout);

        let response = self.http.execute(request).await?;
        if response.status != 200 {
            warn!(status = response.status, "Sign-in rejected");
            return Err(AuthError::authentication(
                Some(response.status),
                response.text_lossy(),
            ));
        }

        let tokens: TokenResponse = parse_json(&response)?;
        inner.credentials = Credentials::new(tokens.access_token, tokens.refresh_token);
        self.persist(inner).await
    }

    async fn refresh_locked(&self, inner: &mut SessionInner) -> Result<()> {
        if inner.credentials.refresh_token.is_empty() {
            inner.credentials.clear();
            return Err(AuthError::authentication(None, "refresh token is empty"));
        }

        let form = serde_urlencoded::to_string(RefreshRequest {
            grant_type: "refresh_token",
            client_id: self.identity.client_id(),
            refresh_token: &inner.credentials.refresh_token,
        })
        .map_err(|e| AuthError::Serialization(format!("Failed to encode refresh form: {}", e)))?;

        let request = HttpRequest::post(&self.endpoints.token)
            .form(form)
            .timeout(self.request_timeout);

        let response = self.http.execute(request).await?;
        if response.status != 200 {
            inner.credentials.clear();
            return Err(AuthError::authentication(
                Some(response.status),
                response.text_lossy(),
            ));
        }

        let tokens: TokenResponse = parse_json(&response)?;
        inner.credentials = Credentials::new(tokens.access_token, tokens.refresh_token);
        self.persist(inner).await
    }

    async fn captcha_proof_locked(&self, inner: &mut SessionInner, action: &str) -> Result<String> {
        let attempts = self.retry_budget + 1;

        for attempt in 1..=attempts {
            let meta = if action.contains(SIGN_IN_ACTION_MARKER) {
                CaptchaMeta {
                    email: Some(inner.account.username.clone()),
                    ..CaptchaMeta::default()
                }
            } else {
                let token = self.ensure_valid_token_locked(inner).await?;
                let claims = TokenClaims::decode(&token)?;
                CaptchaMeta {
                    captcha_sign: Some(self.identity.captcha_sign().to_string()),
                    client_version: Some(self.identity.client_version().to_string()),
                    package_name: Some(self.identity.package_name().to_string()),
                    user_id: Some(claims.sub),
                    timestamp: Some(self.identity.timestamp().to_string()),
                    ..CaptchaMeta::default()
                }
            };

            let request = {
                let last_token = inner.last_captcha_token.as_str();
                let body = CaptchaInitRequest {
                    client_id: self.identity.client_id(),
                    action,
                    device_id: self.identity.device_id(),
                    captcha_token: (!last_token.is_empty()).then_some(last_token),
                    meta,
                };
                HttpRequest::post(&self.endpoints.captcha_init)
                    .json(&body)?
                    .timeout(self.request_timeout)
            };

            let response = self.http.execute(request).await?;
            match response.status {
                200 => {
                    let proof: CaptchaInitResponse = parse_json(&response)?;
                    inner.last_captcha_token = proof.captcha_token.clone();
                    if let Err(e) = self.persist(inner).await {
                        warn!(error = %e, "Failed to persist captcha proof");
                    }
                    return Ok(proof.captcha_token);
                }
                401 => {
                    warn!(attempt, attempts, "Captcha init unauthorized, invalidating access token");
                    inner.credentials.access_token.clear();
                }
                status => {
                    return Err(AuthError::UnexpectedStatus {
                        endpoint: self.endpoints.captcha_init.clone(),
                        status,
                        body: response.text_lossy(),
                    });
                }
            }
        }

        Err(AuthError::CaptchaRetriesExceeded {
            action: action.to_string(),
            attempts,
        })
    }

    fn state_of(&self, inner: &SessionInner) -> SessionState {
        SessionState {
            device_id: self.identity.device_id().to_string(),
            oauth2: inner.credentials.clone(),
            signing: self.identity.signing_state(&inner.last_captcha_token),
        }
    }

    async fn persist(&self, inner: &SessionInner) -> Result<()> {
        match &self.store {
            Some(store) => self.state_of(inner).save(store.as_ref()).await,
            None => Ok(()),
        }
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    response
        .json()
        .map_err(|e| AuthError::Serialization(e.to_string()))
}
