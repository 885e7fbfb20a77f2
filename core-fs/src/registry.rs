//! # Session Registry
//!
//! Maps inbound basic-auth credentials to warm [`Drive`] instances.
//!
//! Drives are cached by username for the configured session lifetime. A
//! request with a different password than the cached drive's forces that
//! drive to drop its tokens and sign in again with the new password; if the
//! sign-in fails the drive is evicted so the stale password cannot be used
//! either.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bridge_traits::http::HttpClient;
use core_auth::{AccountCredentials, AuthError, ClientProfile};
use core_runtime::config::DriveConfig;
use core_runtime::logging::redact_if_sensitive;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::cache::TtlCache;
use crate::drive::Drive;
use crate::error::{FsError, Result};

/// `WWW-Authenticate` value sent with every 401
pub const BASIC_CHALLENGE: &str = "Basic realm=\"pikpakdav\"";

fn unauthorized(reason: &str) -> FsError {
    FsError::Unauthorized {
        reason: reason.to_string(),
        challenge: BASIC_CHALLENGE.to_string(),
    }
}

/// Extract credentials from an `Authorization: Basic ...` header value
pub fn parse_basic_auth(header: Option<&str>) -> Result<AccountCredentials> {
    let header = header.ok_or_else(|| unauthorized("missing credentials"))?;

    let (scheme, encoded) = header
        .trim()
        .split_once(' ')
        .ok_or_else(|| unauthorized("malformed authorization header"))?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(unauthorized("unsupported authorization scheme"));
    }

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| unauthorized("malformed basic credentials"))?;
    let decoded = String::from_utf8(decoded).map_err(|_| unauthorized("malformed basic credentials"))?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| unauthorized("malformed basic credentials"))?;
    Ok(AccountCredentials::new(username, password))
}

fn sign_in_failed(error: AuthError) -> FsError {
    match FsError::from(error) {
        err @ FsError::AuthenticationFailed(_) => err,
        other => FsError::AuthenticationFailed(other.to_string()),
    }
}

/// TTL-bounded cache of signed-in drives keyed by username
pub struct SessionRegistry {
    config: DriveConfig,
    profile: ClientProfile,
    transport: Arc<dyn HttpClient>,
    /// Serializes checkouts so one username never signs in twice at once
    gate: Mutex<()>,
    drives: TtlCache<String, Arc<Drive>>,
}

impl SessionRegistry {
    pub fn new(config: DriveConfig, profile: ClientProfile, transport: Arc<dyn HttpClient>) -> Self {
        let drives = TtlCache::new(config.session_ttl);
        Self {
            config,
            profile,
            transport,
            gate: Mutex::new(()),
            drives,
        }
    }

    /// Number of cached drives, expired ones included
    pub fn len(&self) -> usize {
        self.drives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drives.is_empty()
    }

    /// Parse `header` and check out the matching drive
    pub async fn authenticate(&self, header: Option<&str>) -> Result<Arc<Drive>> {
        let credentials = parse_basic_auth(header)?;
        self.checkout(&credentials).await
    }

    /// Signed-in drive for `credentials`
    ///
    /// # Errors
    ///
    /// [`FsError::AuthenticationFailed`] when signing in fails; nothing is
    /// cached in that case.
    #[instrument(skip_all, fields(username = %redact_if_sensitive("username", &credentials.username)))]
    pub async fn checkout(&self, credentials: &AccountCredentials) -> Result<Arc<Drive>> {
        let _gate = self.gate.lock().await;

        if let Some(drive) = self.drives.get(&credentials.username) {
            if drive.session().password_matches(&credentials.password).await {
                return Ok(drive);
            }

            info!("Password changed, signing in again");
            if let Err(e) = drive.session().update_password(&credentials.password).await {
                warn!(error = %e, "Re-sign-in failed, evicting drive");
                self.drives.remove(&credentials.username);
                return Err(sign_in_failed(e));
            }
            self.drives.insert(credentials.username.clone(), Arc::clone(&drive));
            return Ok(drive);
        }

        let drive = Arc::new(Drive::new(
            self.config.clone(),
            self.profile.clone(),
            credentials.clone(),
            Arc::clone(&self.transport),
        )?);
        drive.session().sign_in().await.map_err(sign_in_failed)?;

        info!("Signed in new drive");
        self.drives
            .insert(credentials.username.clone(), Arc::clone(&drive));
        Ok(drive)
    }
}
