//! Request decorators for the three outbound clients.

use async_trait::async_trait;
use bridge_traits::http::HttpRequest;
use core_auth::{DeviceIdentity, SessionManager};
use std::sync::Arc;

use crate::error::{PikPakError, Result};
use crate::pipeline::RequestDecorator;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/87.0.4280.88 Safari/537.36";
const SEC_CH_UA: &str = r#""Google Chrome";v="87", " Not;A Brand";v="99", "Chromium";v="87""#;
const WEB_ORIGIN: &str = "https://mypikpak.com";
const WEB_REFERER: &str = "https://mypikpak.com/";
const USER_AUTHORITY: &str = "user.mypikpak.com";

/// Browser fingerprint shared by every client.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserHeaders;

#[async_trait]
impl RequestDecorator for BrowserHeaders {
    async fn decorate(&self, request: &mut HttpRequest) -> Result<()> {
        request.set_header("accept-language", "en-US,en;q=0.9");
        request.set_header("dnt", "1");
        request.set_header("Referer", WEB_REFERER);
        request.set_header("sec-ch-ua", SEC_CH_UA);
        request.set_header("sec-ch-ua-mobile", "?0");
        request.set_header("sec-ch-ua-platform", "\"macOS\"");
        request.set_header("user-agent", USER_AGENT);
        Ok(())
    }
}

/// Device identification for sign-in, refresh and captcha-init calls.
pub struct UserServiceHeaders {
    identity: Arc<DeviceIdentity>,
}

impl UserServiceHeaders {
    pub fn new(identity: Arc<DeviceIdentity>) -> Self {
        Self { identity }
    }
}

/// `x-device-sign` is the device id padded with a fixed run of `x`
fn device_sign(device_id: &str) -> String {
    format!("wdi10.{}{}", device_id, "x".repeat(32))
}

#[async_trait]
impl RequestDecorator for UserServiceHeaders {
    async fn decorate(&self, request: &mut HttpRequest) -> Result<()> {
        let identity = &self.identity;
        request.set_header("authority", USER_AUTHORITY);
        request.set_header("accept", "*/*");
        request.set_header("origin", WEB_ORIGIN);
        request.set_header("sec-fetch-dest", "empty");
        request.set_header("sec-fetch-mode", "cors");
        request.set_header("sec-fetch-site", "same-site");
        request.set_header("x-client-id", identity.client_id());
        request.set_header("x-client-version", identity.client_version());
        request.set_header("x-device-id", identity.device_id());
        request.set_header("x-device-model", "chrome%2F108.0.0.0");
        request.set_header("x-device-name", "PC-Chrome");
        request.set_header("x-device-sign", device_sign(identity.device_id()));
        request.set_header("x-net-work-type", "NONE");
        request.set_header("x-os-version", "MacIntel");
        request.set_header("x-platform-version", "1");
        request.set_header("x-protocol-version", "301");
        request.set_header("x-provider-name", "NONE");
        request.set_header("x-sdk-version", "5.2.0");
        Ok(())
    }
}

/// Bearer token and captcha proof for drive API calls.
///
/// The captcha action is `METHOD:path`, with the query string excluded.
pub struct DriveAuthorization {
    session: Arc<SessionManager>,
}

impl DriveAuthorization {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }
}

/// Captcha action for a request
pub fn request_action(request: &HttpRequest) -> Result<String> {
    let parsed = url::Url::parse(&request.url)
        .map_err(|e| PikPakError::ParseError(format!("invalid request URL: {}", e)))?;
    Ok(format!("{}:{}", request.method, parsed.path()))
}

#[async_trait]
impl RequestDecorator for DriveAuthorization {
    async fn decorate(&self, request: &mut HttpRequest) -> Result<()> {
        let action = request_action(request)?;
        let auth = self.session.authorize(&action).await?;

        request.set_header("origin", WEB_ORIGIN);
        request.set_header("x-device-id", self.session.identity().device_id());
        request.set_header("Authorization", format!("Bearer {}", auth.access_token));
        request.set_header("x-captcha-token", auth.captcha_token);
        Ok(())
    }
}

/// Device id only; download URLs are pre-signed.
pub struct DeviceIdHeader {
    device_id: String,
}

impl DeviceIdHeader {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
        }
    }
}

#[async_trait]
impl RequestDecorator for DeviceIdHeader {
    async fn decorate(&self, request: &mut HttpRequest) -> Result<()> {
        request.set_header("x-device-id", self.device_id.as_str());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_auth::ClientProfile;

    fn identity() -> Arc<DeviceIdentity> {
        let profile = ClientProfile {
            client_id: "cid".to_string(),
            client_version: "1.21.0".to_string(),
            package_name: "mypikpak.com".to_string(),
            timestamp: "1".to_string(),
            algorithms: vec![],
        };
        Arc::new(DeviceIdentity::new(profile, "0123456789abcdef0123456789abcdef").unwrap())
    }

    #[tokio::test]
    async fn test_browser_headers() {
        let mut request = HttpRequest::get("https://example.com");
        BrowserHeaders.decorate(&mut request).await.unwrap();

        assert_eq!(request.header_value("referer"), Some("https://mypikpak.com/"));
        assert_eq!(request.header_value("dnt"), Some("1"));
        assert!(request.header_value("user-agent").unwrap().contains("Chrome/87"));
    }

    #[tokio::test]
    async fn test_user_service_headers() {
        let mut request = HttpRequest::post("https://user.mypikpak.com/v1/auth/signin");
        UserServiceHeaders::new(identity())
            .decorate(&mut request)
            .await
            .unwrap();

        assert_eq!(request.header_value("x-client-id"), Some("cid"));
        assert_eq!(request.header_value("x-client-version"), Some("1.21.0"));
        assert_eq!(
            request.header_value("x-device-id"),
            Some("0123456789abcdef0123456789abcdef")
        );
        let sign = request.header_value("x-device-sign").unwrap();
        assert!(sign.starts_with("wdi10.0123456789abcdef"));
        assert!(sign.ends_with(&"x".repeat(32)));
        assert_eq!(sign.len(), "wdi10.".len() + 64);
    }

    #[test]
    fn test_request_action_strips_query() {
        let request = HttpRequest::get(
            "https://api-drive.mypikpak.com/drive/v1/files?parent_id=abc&limit=1000",
        );
        assert_eq!(request_action(&request).unwrap(), "GET:/drive/v1/files");

        let trash = HttpRequest::post("https://api-drive.mypikpak.com/drive/v1/files:batchTrash");
        assert_eq!(request_action(&trash).unwrap(), "POST:/drive/v1/files:batchTrash");
    }

    #[test]
    fn test_request_action_rejects_relative_url() {
        let request = HttpRequest::get("/drive/v1/files");
        assert!(matches!(request_action(&request), Err(PikPakError::ParseError(_))));
    }

    #[tokio::test]
    async fn test_device_id_header() {
        let mut request = HttpRequest::get("https://dl.example/file");
        DeviceIdHeader::new("dev").decorate(&mut request).await.unwrap();
        assert_eq!(request.header_value("x-device-id"), Some("dev"));
        assert!(request.header_value("authorization").is_none());
    }
}
