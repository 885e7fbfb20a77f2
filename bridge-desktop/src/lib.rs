//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop hosts
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `StateStore` using JSON files written with `tokio::fs`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{JsonFileStateStore, ReqwestHttpClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let http = Arc::new(ReqwestHttpClient::new()?);
//!     let store = Arc::new(JsonFileStateStore::default_location());
//!     // Hand both to the drive assembly
//!     Ok(())
//! }
//! ```

mod http;
mod state_store;

pub use http::ReqwestHttpClient;
pub use state_store::JsonFileStateStore;
