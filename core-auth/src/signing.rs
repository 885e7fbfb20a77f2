//! # Request Signing
//!
//! The drive API expects every authenticated call to carry a captcha proof.
//! Obtaining that proof requires a `captcha_sign`: a deterministic hash
//! chain over the client profile and the device id. Nothing here performs
//! I/O.
//!
//! ```ignore
//! use core_auth::signing::{generate_device_id, DeviceIdentity};
//!
//! let identity = DeviceIdentity::new(profile, generate_device_id())?;
//! assert!(identity.captcha_sign().starts_with("1."));
//! ```

use md5::{Digest, Md5};
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::types::{ClientProfile, SigningState};

/// Version tag prefixed to every derived signature.
const SIGN_VERSION: &str = "1.";

/// Everything a session needs to identify itself to the remote service.
///
/// Built once per session; the captcha sign is derived at construction so an
/// unusable algorithm chain fails here instead of on the first request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    device_id: String,
    profile: ClientProfile,
    captcha_sign: String,
}

impl DeviceIdentity {
    pub fn new(profile: ClientProfile, device_id: impl Into<String>) -> Result<Self> {
        let device_id = device_id.into();
        let captcha_sign = derive_captcha_sign(&profile, &device_id)?;
        Ok(Self {
            device_id,
            profile,
            captcha_sign,
        })
    }

    /// Identity with a freshly generated device id
    pub fn generate(profile: ClientProfile) -> Result<Self> {
        Self::new(profile, generate_device_id())
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn profile(&self) -> &ClientProfile {
        &self.profile
    }

    pub fn client_id(&self) -> &str {
        &self.profile.client_id
    }

    pub fn client_version(&self) -> &str {
        &self.profile.client_version
    }

    pub fn package_name(&self) -> &str {
        &self.profile.package_name
    }

    pub fn timestamp(&self) -> &str {
        &self.profile.timestamp
    }

    pub fn captcha_sign(&self) -> &str {
        &self.captcha_sign
    }

    /// Signing section of the persisted session document
    pub fn signing_state(&self, last_captcha_token: &str) -> SigningState {
        SigningState {
            algorithms: self.profile.algorithms.clone(),
            captcha_sign: self.captcha_sign.clone(),
            last_captcha_token: last_captcha_token.to_string(),
        }
    }
}

/// Derive the captcha sign for a device.
///
/// The seed is `client_id ‖ client_version ‖ package_name ‖ device_id ‖
/// timestamp`; each algorithm step replaces it with the lowercase hex digest
/// of `seed ‖ salt`.
///
/// # Errors
///
/// Returns [`AuthError::UnsupportedAlgorithm`] if any step names an algorithm
/// other than md5.
pub fn derive_captcha_sign(profile: &ClientProfile, device_id: &str) -> Result<String> {
    let mut seed = format!(
        "{}{}{}{}{}",
        profile.client_id, profile.client_version, profile.package_name, device_id, profile.timestamp
    );

    for step in &profile.algorithms {
        seed = digest_hex(&step.alg, &format!("{}{}", seed, step.salt))?;
    }

    Ok(format!("{}{}", SIGN_VERSION, seed))
}

fn digest_hex(alg: &str, input: &str) -> Result<String> {
    if alg.eq_ignore_ascii_case("md5") {
        Ok(hex::encode(Md5::digest(input.as_bytes())))
    } else {
        Err(AuthError::UnsupportedAlgorithm(alg.to_string()))
    }
}

/// Fresh 32-hex-character device id without separators.
pub fn generate_device_id() -> String {
    Uuid::new_v4().simple().to_string()
}
