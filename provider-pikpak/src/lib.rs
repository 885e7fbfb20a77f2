//! # PikPak Provider
//!
//! Remote calls against the PikPak drive service.
//!
//! ## Overview
//!
//! This module provides:
//! - Decorator pipelines for the account, drive and download services
//! - Folder listing, download descriptors and trash via [`DriveApi`]
//! - Semaphore-bounded ranged downloads via [`DownloadClient`]

pub mod api;
pub mod download;
pub mod error;
pub mod headers;
pub mod pipeline;
pub mod types;

pub use api::DriveApi;
pub use download::{ByteRange, DownloadClient};
pub use error::{PikPakError, Result};
pub use pipeline::{ClientPipeline, RequestDecorator};
pub use types::{DownloadDescriptor, RemoteItem, RemoteListing};
