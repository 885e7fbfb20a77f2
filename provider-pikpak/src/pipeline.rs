//! # Client Pipelines
//!
//! Each outbound client is a transport plus an ordered list of request
//! decorators, assembled once with [`ClientPipeline::builder`].
//!
//! ```ignore
//! let user = ClientPipeline::builder("user", transport.clone())
//!     .with(UserServiceHeaders::new(identity.clone()))
//!     .with(BrowserHeaders)
//!     .build();
//! ```
//!
//! Decorators run in insertion order, so a later decorator overrides headers
//! set by an earlier one. The pipeline itself is the shared outer layer: it
//! logs method, redacted URL and status of every exchange.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, StreamingResponse};
use core_auth::{DeviceIdentity, SessionManager};
use core_runtime::logging::redact_url;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::headers::{BrowserHeaders, DeviceIdHeader, DriveAuthorization, UserServiceHeaders};

/// Mutates a request before it reaches the transport
///
/// A decorator that fails aborts the request; the error reaches the caller
/// unchanged.
#[async_trait]
pub trait RequestDecorator: Send + Sync {
    async fn decorate(&self, request: &mut HttpRequest) -> Result<()>;
}

/// Transport wrapped by an ordered decorator chain.
pub struct ClientPipeline {
    name: &'static str,
    transport: Arc<dyn HttpClient>,
    decorators: Vec<Arc<dyn RequestDecorator>>,
}

impl ClientPipeline {
    pub fn builder(name: &'static str, transport: Arc<dyn HttpClient>) -> ClientPipelineBuilder {
        ClientPipelineBuilder {
            name,
            transport,
            decorators: Vec::new(),
        }
    }

    /// Account-service client: device identification, then browser headers
    pub fn user_service(transport: Arc<dyn HttpClient>, identity: Arc<DeviceIdentity>) -> Self {
        Self::builder("user", transport)
            .with(UserServiceHeaders::new(identity))
            .with(BrowserHeaders)
            .build()
    }

    /// Drive API client: bearer token and captcha proof, then browser headers
    pub fn drive_api(transport: Arc<dyn HttpClient>, session: Arc<SessionManager>) -> Self {
        Self::builder("drive", transport)
            .with(DriveAuthorization::new(session))
            .with(BrowserHeaders)
            .build()
    }

    /// Download client: device id, then browser headers
    pub fn download(transport: Arc<dyn HttpClient>, device_id: &str) -> Self {
        Self::builder("download", transport)
            .with(DeviceIdHeader::new(device_id))
            .with(BrowserHeaders)
            .build()
    }

    /// Web client for the bootstrap page and script: browser headers only
    pub fn web(transport: Arc<dyn HttpClient>) -> Self {
        Self::builder("web", transport).with(BrowserHeaders).build()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    async fn prepare(&self, mut request: HttpRequest) -> Result<HttpRequest> {
        for decorator in &self.decorators {
            decorator.decorate(&mut request).await?;
        }
        Ok(request)
    }

    /// Decorate and send, buffering the response body
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let request = self.prepare(request).await?;
        let method = request.method;
        let url = redact_url(&request.url);

        match self.transport.execute(request).await {
            Ok(response) => {
                debug!(client = self.name, %method, %url, status = response.status, "http request");
                Ok(response)
            }
            Err(e) => {
                warn!(client = self.name, %method, %url, error = %e, "http request error");
                Err(e.into())
            }
        }
    }

    /// Decorate and send, leaving the body unread
    pub async fn send_stream(&self, request: HttpRequest) -> Result<StreamingResponse> {
        let request = self.prepare(request).await?;
        let method = request.method;
        let url = redact_url(&request.url);

        match self.transport.execute_stream(request).await {
            Ok(response) => {
                debug!(client = self.name, %method, %url, status = response.status, "http request");
                Ok(response)
            }
            Err(e) => {
                warn!(client = self.name, %method, %url, error = %e, "http request error");
                Err(e.into())
            }
        }
    }
}

/// Lets a pipeline stand in wherever a plain transport is expected, e.g. as
/// the session manager's account-service client.
#[async_trait]
impl HttpClient for ClientPipeline {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.send(request).await.map_err(Into::into)
    }

    async fn execute_stream(&self, request: HttpRequest) -> BridgeResult<StreamingResponse> {
        self.send_stream(request).await.map_err(Into::into)
    }
}

pub struct ClientPipelineBuilder {
    name: &'static str,
    transport: Arc<dyn HttpClient>,
    decorators: Vec<Arc<dyn RequestDecorator>>,
}

impl ClientPipelineBuilder {
    /// Append a decorator; it runs after every decorator added before it
    pub fn with<D: RequestDecorator + 'static>(mut self, decorator: D) -> Self {
        self.decorators.push(Arc::new(decorator));
        self
    }

    pub fn with_shared(mut self, decorator: Arc<dyn RequestDecorator>) -> Self {
        self.decorators.push(decorator);
        self
    }

    pub fn build(self) -> ClientPipeline {
        ClientPipeline {
            name: self.name,
            transport: self.transport,
            decorators: self.decorators,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PikPakError;
    use bridge_traits::error::BridgeError;
    use mockall::mock;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
            async fn execute_stream(&self, request: HttpRequest) -> BridgeResult<StreamingResponse>;
        }
    }

    struct SetHeader(&'static str, &'static str);

    #[async_trait]
    impl RequestDecorator for SetHeader {
        async fn decorate(&self, request: &mut HttpRequest) -> Result<()> {
            request.set_header(self.0, self.1);
            Ok(())
        }
    }

    struct Refuse;

    #[async_trait]
    impl RequestDecorator for Refuse {
        async fn decorate(&self, _request: &mut HttpRequest) -> Result<()> {
            Err(PikPakError::NotAFolder("refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_decorators_apply_in_order() {
        let mut transport = MockHttpClient::new();
        transport
            .expect_execute()
            .withf(|req| req.header_value("x-layer") == Some("outer") && req.header_value("x-inner") == Some("1"))
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, "ok")));

        let pipeline = ClientPipeline::builder("test", Arc::new(transport))
            .with(SetHeader("x-layer", "inner"))
            .with(SetHeader("x-inner", "1"))
            .with(SetHeader("X-Layer", "outer"))
            .build();

        let response = pipeline.send(HttpRequest::get("https://example.com/a")).await.unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_failing_decorator_aborts_request() {
        let transport = MockHttpClient::new();
        let pipeline = ClientPipeline::builder("test", Arc::new(transport))
            .with(Refuse)
            .build();

        let err = pipeline.send(HttpRequest::get("https://example.com")).await.unwrap_err();
        assert!(matches!(err, PikPakError::NotAFolder(_)));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let mut transport = MockHttpClient::new();
        transport
            .expect_execute_stream()
            .times(1)
            .returning(|_| Err(BridgeError::Timeout("connect".to_string())));

        let pipeline = ClientPipeline::builder("test", Arc::new(transport)).build();
        let err = pipeline
            .send_stream(HttpRequest::get("https://example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, PikPakError::Bridge(BridgeError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_pipeline_as_http_client() {
        let mut transport = MockHttpClient::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(204, "")));

        let pipeline: Arc<dyn HttpClient> =
            Arc::new(ClientPipeline::builder("test", Arc::new(transport)).build());
        let response = pipeline.execute(HttpRequest::get("https://example.com")).await.unwrap();
        assert_eq!(response.status, 204);
    }
}
