//! # Host Bridge Traits
//!
//! Seams between the drive core and the host environment.
//!
//! ## Overview
//!
//! The core never talks to the network, the disk or the wall clock directly.
//! It goes through the traits defined here so that the desktop adapters in
//! `bridge-desktop` can be swapped for mocks in tests.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - single-attempt HTTP transport, buffered or streaming
//! - [`StateStore`](storage::StateStore) - named document persistence for session state
//! - [`Clock`](time::Clock) - time source for token expiry checks
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Adapters
//! convert their native errors into it and keep the original message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so a single adapter can be
//! shared by every concurrent request against a drive session.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{ByteStream, HttpClient, HttpMethod, HttpRequest, HttpResponse, StreamingResponse};
pub use storage::StateStore;
pub use time::{Clock, FixedClock, SystemClock};
