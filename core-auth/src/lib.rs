//! # Authentication Module
//!
//! Session management for the drive's account service.
//!
//! ## Overview
//!
//! Talking to the drive API needs three pieces of identity, each built on
//! the previous one:
//!
//! - [`bootstrap`] scrapes the web client's [`ClientProfile`] from the public
//!   drive page.
//! - [`signing`] turns a profile plus a device id into a [`DeviceIdentity`]
//!   carrying the captcha sign.
//! - [`session`] owns the token pair and captcha proof for one account and
//!   keeps both fresh.
//!
//! ## Features
//!
//! - Password sign-in with refresh-token renewal
//! - Captcha proof per request action with a bounded 401 retry
//! - Single-flight token refresh under one lock
//! - Session document persistence through a [`bridge_traits::StateStore`]

pub mod bootstrap;
pub mod error;
pub mod session;
pub mod signing;
pub mod types;

pub use bootstrap::fetch_client_profile;
pub use error::{AuthError, Result};
pub use session::{Authorization, SessionEndpoints, SessionManager};
pub use signing::{derive_captcha_sign, generate_device_id, DeviceIdentity};
pub use types::{
    AccountCredentials, AuthState, ClientProfile, Credentials, SessionState, SigningAlgorithm,
    SigningState, TokenClaims,
};
