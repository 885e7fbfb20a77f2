#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, StreamingResponse};
use core_fs::{DirectDownload, DriveFileSystem, RemoteTree};
use core_runtime::config::DriveConfig;
use mockall::mock;
use provider_pikpak::{ClientPipeline, DownloadClient, DriveApi};
use std::collections::HashMap;
use std::sync::Arc;

mock! {
    pub HttpClient {}

    #[async_trait]
    impl HttpClient for HttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        async fn execute_stream(&self, request: HttpRequest) -> BridgeResult<StreamingResponse>;
    }
}

pub const DRIVE_BASE: &str = "https://api.test";
pub const DOWNLOAD_URL: &str = "https://dl.test/blob?sig=abc";

pub fn config(slots: usize) -> DriveConfig {
    DriveConfig::builder()
        .drive_api_base_url(DRIVE_BASE)
        .max_download_connections(slots)
        .build()
        .unwrap()
}

/// Tree, download client and both filesystem views over one mocked transport
pub struct Harness {
    pub tree: Arc<RemoteTree>,
    pub downloads: Arc<DownloadClient>,
    pub fs: DriveFileSystem,
    pub direct: DirectDownload,
}

impl Harness {
    pub fn new(transport: MockHttpClient) -> Self {
        Self::with_config(transport, config(2))
    }

    pub fn with_config(transport: MockHttpClient, config: DriveConfig) -> Self {
        let transport: Arc<dyn HttpClient> = Arc::new(transport);
        let api = DriveApi::new(
            ClientPipeline::builder("drive", Arc::clone(&transport)).build(),
            &config,
        );
        let tree = Arc::new(RemoteTree::new(Arc::new(api), &config));
        let downloads = Arc::new(DownloadClient::new(
            ClientPipeline::builder("download", transport).build(),
            config.max_download_connections,
        ));
        let fs = DriveFileSystem::new(
            Arc::clone(&tree),
            Arc::clone(&downloads),
            config.rate_limit_retry_after,
            config.rate_limit_pause,
        );
        let direct = DirectDownload::new(
            Arc::clone(&tree),
            Arc::clone(&downloads),
            config.max_download_connections,
            config.rate_limit_retry_after,
            config.rate_limit_pause,
        );
        Self {
            tree,
            downloads,
            fs,
            direct,
        }
    }
}

/// `(kind, id, name, size)` entries
pub fn listing(parent_id: &str, entries: &[(&str, &str, &str, &str)]) -> HttpResponse {
    let files: Vec<serde_json::Value> = entries
        .iter()
        .map(|(kind, id, name, size)| {
            serde_json::json!({
                "kind": kind,
                "id": id,
                "parent_id": parent_id,
                "name": name,
                "size": size,
                "modified_time": "2024-01-02T03:04:05.000+00:00",
            })
        })
        .collect();
    HttpResponse::new(
        200,
        serde_json::json!({ "kind": "drive#fileList", "files": files }).to_string(),
    )
}

pub fn descriptor() -> HttpResponse {
    HttpResponse::new(
        200,
        serde_json::json!({ "kind": "drive#file", "web_content_link": DOWNLOAD_URL }).to_string(),
    )
}

pub fn is_list(request: &HttpRequest, parent_id: &str) -> bool {
    request.url.starts_with(&format!("{}/drive/v1/files?", DRIVE_BASE))
        && request.url.contains(&format!("&parent_id={}&", parent_id))
}

pub fn is_fetch(request: &HttpRequest, id: &str) -> bool {
    request.url == format!("{}/drive/v1/files/{}?usage=FETCH", DRIVE_BASE, id)
}

pub fn is_trash(request: &HttpRequest, id: &str) -> bool {
    request.url == format!("{}/drive/v1/files:batchTrash", DRIVE_BASE)
        && request.body.as_deref() == Some(format!(r#"{{"ids":["{}"]}}"#, id).as_bytes())
}

pub fn partial(start: u64, end: u64, total: u64, body: &'static str) -> StreamingResponse {
    let mut headers = HashMap::new();
    headers.insert(
        "Content-Range".to_string(),
        format!("bytes {}-{}/{}", start, end, total),
    );
    StreamingResponse::from_bytes(206, headers, body)
}

/// Root holds `Music/` and `top.txt`; `Music/` holds `song.mp3` (10 bytes)
pub fn expect_library(transport: &mut MockHttpClient, root_lists: usize, music_lists: usize) {
    transport
        .expect_execute()
        .withf(|req| is_list(req, ""))
        .times(root_lists)
        .returning(|_| {
            Ok(listing(
                "",
                &[
                    ("drive#folder", "music-id", "Music", "0"),
                    ("drive#file", "top-id", "top.txt", "3"),
                ],
            ))
        });
    transport
        .expect_execute()
        .withf(|req| is_list(req, "music-id"))
        .times(music_lists)
        .returning(|_| {
            Ok(listing(
                "music-id",
                &[("drive#file", "song-id", "song.mp3", "10")],
            ))
        });
}
