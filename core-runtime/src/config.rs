//! # Drive Configuration
//!
//! Tunables shared by the session, tree and download layers.
//!
//! ## Overview
//!
//! [`DriveConfig`] is built through [`DriveConfigBuilder`] and validated once
//! in [`DriveConfigBuilder::build`], so every component downstream can assume
//! non-zero cache lifetimes, at least one download slot and well-formed
//! service URLs.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::DriveConfig;
//! use std::time::Duration;
//!
//! let config = DriveConfig::builder()
//!     .listing_cache_ttl(Duration::from_secs(30))
//!     .max_download_connections(4)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use std::time::Duration;

pub const DEFAULT_WEB_BASE_URL: &str = "https://mypikpak.com";
pub const DEFAULT_USER_BASE_URL: &str = "https://user.mypikpak.com";
pub const DEFAULT_DRIVE_API_BASE_URL: &str = "https://api-drive.mypikpak.com";

/// Validated drive configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveConfig {
    /// Public web front end, source of the bootstrap page and script
    pub web_base_url: String,

    /// Account service (sign-in, token refresh, captcha init)
    pub user_base_url: String,

    /// Drive metadata API (list, fetch, trash)
    pub drive_api_base_url: String,

    /// Lifetime of resolved path entries and tombstones
    pub item_cache_ttl: Duration,

    /// Lifetime of folder listings
    pub listing_cache_ttl: Duration,

    /// Lifetime of download descriptors
    pub download_cache_ttl: Duration,

    /// Concurrent download connections per drive session
    pub max_download_connections: usize,

    /// Extra captcha-init attempts after a 401
    pub captcha_retry_budget: u32,

    /// Hint returned to callers when the upstream is rate limiting
    pub rate_limit_retry_after: Duration,

    /// Pause before reporting a rate-limit response
    ///
    /// Most clients retry immediately, so holding the response briefly
    /// keeps them from hammering the upstream.
    pub rate_limit_pause: Duration,

    /// Lifetime of a warm session in the registry
    pub session_ttl: Duration,

    /// Timeout for metadata calls; downloads are not bounded by it
    pub request_timeout: Duration,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            web_base_url: DEFAULT_WEB_BASE_URL.to_string(),
            user_base_url: DEFAULT_USER_BASE_URL.to_string(),
            drive_api_base_url: DEFAULT_DRIVE_API_BASE_URL.to_string(),
            item_cache_ttl: Duration::from_secs(60),
            listing_cache_ttl: Duration::from_secs(60),
            download_cache_ttl: Duration::from_secs(60),
            max_download_connections: 2,
            captcha_retry_budget: 1,
            rate_limit_retry_after: Duration::from_secs(10),
            rate_limit_pause: Duration::from_secs(1),
            session_ttl: Duration::from_secs(60 * 60),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl DriveConfig {
    pub fn builder() -> DriveConfigBuilder {
        DriveConfigBuilder::default()
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("web_base_url", &self.web_base_url),
            ("user_base_url", &self.user_base_url),
            ("drive_api_base_url", &self.drive_api_base_url),
        ] {
            let parsed = url::Url::parse(value)
                .map_err(|e| Error::Config(format!("{} is not a valid URL: {}", name, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::Config(format!(
                    "{} must use http or https, got {}",
                    name,
                    parsed.scheme()
                )));
            }
        }

        for (name, value) in [
            ("item_cache_ttl", self.item_cache_ttl),
            ("listing_cache_ttl", self.listing_cache_ttl),
            ("download_cache_ttl", self.download_cache_ttl),
            ("session_ttl", self.session_ttl),
            ("request_timeout", self.request_timeout),
        ] {
            if value.is_zero() {
                return Err(Error::Config(format!("{} must be greater than zero", name)));
            }
        }

        if self.max_download_connections == 0 {
            return Err(Error::Config(
                "max_download_connections must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`DriveConfig`].
#[derive(Debug, Default)]
pub struct DriveConfigBuilder {
    config: DriveConfig,
}

impl DriveConfigBuilder {
    pub fn web_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.web_base_url = trim_base(url.into());
        self
    }

    pub fn user_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.user_base_url = trim_base(url.into());
        self
    }

    pub fn drive_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.drive_api_base_url = trim_base(url.into());
        self
    }

    pub fn item_cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.item_cache_ttl = ttl;
        self
    }

    pub fn listing_cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.listing_cache_ttl = ttl;
        self
    }

    pub fn download_cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.download_cache_ttl = ttl;
        self
    }

    /// Set all three metadata cache lifetimes at once
    pub fn cache_ttl(self, ttl: Duration) -> Self {
        self.item_cache_ttl(ttl)
            .listing_cache_ttl(ttl)
            .download_cache_ttl(ttl)
    }

    pub fn max_download_connections(mut self, slots: usize) -> Self {
        self.config.max_download_connections = slots;
        self
    }

    pub fn captcha_retry_budget(mut self, retries: u32) -> Self {
        self.config.captcha_retry_budget = retries;
        self
    }

    pub fn rate_limit_retry_after(mut self, hint: Duration) -> Self {
        self.config.rate_limit_retry_after = hint;
        self
    }

    pub fn rate_limit_pause(mut self, pause: Duration) -> Self {
        self.config.rate_limit_pause = pause;
        self
    }

    pub fn session_ttl(mut self, ttl: Duration) -> Self {
        self.config.session_ttl = ttl;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Validate and return the configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a base URL does not parse or is not
    /// HTTP(S), when any lifetime is zero, or when no download slot is
    /// available.
    pub fn build(self) -> Result<DriveConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
