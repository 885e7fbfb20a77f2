//! # Download Client
//!
//! Fetches file content from pre-signed URLs.
//!
//! A session allows only a few simultaneous download connections. Each
//! request takes one slot of a shared semaphore before it is sent, and the
//! slot travels inside the returned body stream: it is released when the
//! caller drops the body, or immediately if the request fails. An owned
//! permit can only be dropped once, so a slot is never released twice.

use bridge_traits::http::{HttpRequest, StreamingResponse};
use core_runtime::logging::redact_url;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument, warn};

use crate::error::{PikPakError, Result};
use crate::pipeline::ClientPipeline;

/// Inclusive byte range `start..=end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// `Range` request header value
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Semaphore-bounded client for pre-signed download URLs.
pub struct DownloadClient {
    pipeline: ClientPipeline,
    slots: Arc<Semaphore>,
}

impl DownloadClient {
    pub fn new(pipeline: ClientPipeline, max_connections: usize) -> Self {
        Self {
            pipeline,
            slots: Arc::new(Semaphore::new(max_connections)),
        }
    }

    /// Slots not currently held by an open body
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Wait for a download slot
    ///
    /// Dropping the returned future while it waits gives up the place in
    /// the queue without taking a slot.
    pub async fn acquire_slot(&self) -> Result<OwnedSemaphorePermit> {
        Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| PikPakError::ServiceUnavailable {
                body: "download slots closed".to_string(),
            })
    }

    /// GET `url` for `range`, validating the partial response
    ///
    /// # Errors
    ///
    /// - [`PikPakError::ServiceUnavailable`] when the host answers 503
    /// - [`PikPakError::UnexpectedStatus`] for any other 4xx or 5xx, e.g. an
    ///   expired pre-signed URL
    /// - [`PikPakError::RangeMismatch`] when the status is not 206 or the
    ///   `Content-Range` range differs from the requested one
    #[instrument(skip(self, url), fields(start = range.start, end = range.end))]
    pub async fn get_range(&self, url: &str, range: ByteRange) -> Result<StreamingResponse> {
        let permit = self.acquire_slot().await?;
        let request = HttpRequest::get(url).header("Range", range.header_value());
        self.send_with_slot(request, permit).await
    }

    /// Send `request` while holding `permit`
    ///
    /// A `Range` header on the request is validated against the response the
    /// same way [`get_range`](Self::get_range) does.
    pub async fn send_with_slot(
        &self,
        request: HttpRequest,
        permit: OwnedSemaphorePermit,
    ) -> Result<StreamingResponse> {
        let expected = request
            .header_value("Range")
            .map(|value| value.replacen('=', " ", 1));
        let endpoint = redact_url(&request.url);

        let response = self.pipeline.send_stream(request).await?;

        if response.status == 503 {
            let body = response.into_bytes().await.unwrap_or_default();
            warn!("Download host returned 503");
            return Err(PikPakError::ServiceUnavailable {
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        if let Some(expected) = expected {
            if response.status >= 400 {
                let status = response.status;
                let body = response.into_bytes().await.unwrap_or_default();
                return Err(PikPakError::UnexpectedStatus {
                    endpoint,
                    status,
                    body: String::from_utf8_lossy(&body).into_owned(),
                });
            }
            if response.status != 206 {
                return Err(PikPakError::RangeMismatch {
                    expected,
                    actual: format!("status {}", response.status),
                });
            }
            let actual = response.header("Content-Range").unwrap_or_default();
            if actual.split('/').next() != Some(expected.as_str()) {
                return Err(PikPakError::RangeMismatch {
                    expected,
                    actual: actual.to_string(),
                });
            }
        }

        debug!(status = response.status, "Download started");
        Ok(hold_until_dropped(response, permit))
    }

    /// Send `request` without taking a slot or validating ranges
    ///
    /// For callers that manage their own connection limit and forward the
    /// upstream response as-is.
    pub async fn forward(&self, request: HttpRequest) -> Result<StreamingResponse> {
        self.pipeline.send_stream(request).await
    }
}

/// Tie `permit` to the lifetime of the response body
pub fn hold_until_dropped(response: StreamingResponse, permit: OwnedSemaphorePermit) -> StreamingResponse {
    let StreamingResponse {
        status,
        headers,
        body,
    } = response;

    let body = body
        .map(move |chunk| {
            let _slot = &permit;
            chunk
        })
        .boxed();

    StreamingResponse::new(status, headers, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpClient, HttpResponse};
    use bytes::Bytes;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
            async fn execute_stream(&self, request: HttpRequest) -> BridgeResult<StreamingResponse>;
        }
    }

    fn client(transport: MockHttpClient, slots: usize) -> DownloadClient {
        DownloadClient::new(
            ClientPipeline::builder("download", Arc::new(transport)).build(),
            slots,
        )
    }

    fn partial(content_range: &str, body: &'static str) -> StreamingResponse {
        let mut headers = HashMap::new();
        headers.insert("Content-Range".to_string(), content_range.to_string());
        StreamingResponse::from_bytes(206, headers, body)
    }

    #[tokio::test]
    async fn test_ranged_read_success_holds_slot_until_drop() {
        let mut transport = MockHttpClient::new();
        transport
            .expect_execute_stream()
            .withf(|req| req.header_value("range") == Some("bytes=100-199"))
            .times(1)
            .returning(|_| Ok(partial("bytes 100-199/1000", "payload")));

        let client = client(transport, 2);
        let response = client
            .get_range("https://dl.example/f", ByteRange::new(100, 199))
            .await
            .unwrap();

        assert_eq!(client.available_slots(), 1);
        assert_eq!(response.into_bytes().await.unwrap(), Bytes::from("payload"));
        assert_eq!(client.available_slots(), 2);
    }

    #[tokio::test]
    async fn test_full_response_to_ranged_request_is_range_mismatch() {
        let mut transport = MockHttpClient::new();
        transport
            .expect_execute_stream()
            .times(1)
            .returning(|_| Ok(StreamingResponse::from_bytes(200, HashMap::new(), "whole file")));

        let client = client(transport, 2);
        let err = client
            .get_range("https://dl.example/f", ByteRange::new(100, 199))
            .await
            .unwrap_err();

        assert!(matches!(err, PikPakError::RangeMismatch { ref expected, .. } if expected == "bytes 100-199"));
        assert_eq!(client.available_slots(), 2);
    }

    #[tokio::test]
    async fn test_wrong_content_range_is_range_mismatch() {
        let mut transport = MockHttpClient::new();
        transport
            .expect_execute_stream()
            .times(1)
            .returning(|_| Ok(partial("bytes 0-99/1000", "")));

        let client = client(transport, 1);
        let err = client
            .get_range("https://dl.example/f", ByteRange::new(100, 199))
            .await
            .unwrap_err();

        assert!(matches!(err, PikPakError::RangeMismatch { ref actual, .. } if actual == "bytes 0-99/1000"));
        assert_eq!(client.available_slots(), 1);
    }

    #[tokio::test]
    async fn test_longer_content_range_is_range_mismatch() {
        let mut transport = MockHttpClient::new();
        transport
            .expect_execute_stream()
            .times(1)
            .returning(|_| Ok(partial("bytes 0-99/1000", "")));

        let client = client(transport, 1);
        let err = client
            .get_range("https://dl.example/f", ByteRange::new(0, 9))
            .await
            .unwrap_err();

        assert!(matches!(err, PikPakError::RangeMismatch { ref expected, .. } if expected == "bytes 0-9"));
        assert_eq!(client.available_slots(), 1);
    }

    #[tokio::test]
    async fn test_service_unavailable() {
        let mut transport = MockHttpClient::new();
        transport
            .expect_execute_stream()
            .times(1)
            .returning(|_| Ok(StreamingResponse::from_bytes(503, HashMap::new(), "slow down")));

        let client = client(transport, 2);
        let err = client
            .get_range("https://dl.example/f", ByteRange::new(0, 9))
            .await
            .unwrap_err();

        assert!(matches!(err, PikPakError::ServiceUnavailable { ref body } if body == "slow down"));
        assert_eq!(client.available_slots(), 2);
    }

    #[tokio::test]
    async fn test_expired_link_is_unexpected_status() {
        let mut transport = MockHttpClient::new();
        transport
            .expect_execute_stream()
            .times(1)
            .returning(|_| Ok(StreamingResponse::from_bytes(403, HashMap::new(), "expired")));

        let client = client(transport, 1);
        let err = client
            .get_range("https://dl.example/f?sig=secret", ByteRange::new(0, 9))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PikPakError::UnexpectedStatus { status: 403, ref endpoint, ref body }
                if body == "expired" && !endpoint.contains("secret")
        ));
        assert_eq!(client.available_slots(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_releases_slot() {
        let mut transport = MockHttpClient::new();
        transport
            .expect_execute_stream()
            .times(1)
            .returning(|_| Err(bridge_traits::BridgeError::OperationFailed("reset".to_string())));

        let client = client(transport, 1);
        assert!(client
            .get_range("https://dl.example/f", ByteRange::new(0, 9))
            .await
            .is_err());
        assert_eq!(client.available_slots(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_wait_blocks_until_body_dropped() {
        let mut transport = MockHttpClient::new();
        transport
            .expect_execute_stream()
            .times(2)
            .returning(|_| Ok(partial("bytes 0-0/1", "x")));

        let client = Arc::new(client(transport, 1));
        let first = client
            .get_range("https://dl.example/f", ByteRange::new(0, 0))
            .await
            .unwrap();

        let waiter = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .get_range("https://dl.example/f", ByteRange::new(0, 0))
                    .await
                    .map(|_| ())
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(first);
        waiter.await.unwrap().unwrap();
        assert_eq!(client.available_slots(), 1);
    }

    #[tokio::test]
    async fn test_forward_skips_validation() {
        let mut transport = MockHttpClient::new();
        transport
            .expect_execute_stream()
            .withf(|req| req.header_value("range") == Some("bytes=5-"))
            .times(1)
            .returning(|_| Ok(StreamingResponse::from_bytes(200, HashMap::new(), "all")));

        let client = client(transport, 1);
        let response = client
            .forward(HttpRequest::get("https://dl.example/f").header("Range", "bytes=5-"))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(client.available_slots(), 1);
    }
}
