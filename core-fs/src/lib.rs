//! # Core FS
//!
//! Read-only filesystem over a PikPak drive.
//!
//! ## Overview
//!
//! - [`RemoteTree`] turns paths into drive items with a top-down walk from
//!   the root, backed by three TTL caches.
//! - [`StreamFile`] is an open handle; reads stream a ranged download from
//!   the logical cursor and seeks never perform I/O.
//! - [`DriveFileSystem`] is the [`FileSystem`] surface a protocol server
//!   drives. Mutating operations fail with [`FsError::PermissionDenied`].
//! - [`DirectDownload`] proxies a file's pre-signed URL for plain GETs.
//! - [`Drive`] wires one account's session and clients together, and
//!   [`SessionRegistry`] keeps signed-in drives warm per username.
//!
//! ## Usage
//!
//! ```ignore
//! use core_fs::{Drive, FileSystem, OpenOptions};
//!
//! let drive = Drive::from_store(config, transport, store).await?;
//! let fs = drive.file_system();
//!
//! let file = fs.open_file("/Music/song.flac", OpenOptions::read_only()).await?;
//! let mut buf = vec![0u8; 64 * 1024];
//! let n = file.read(&mut buf).await?;
//! file.close().await?;
//! ```

pub mod cache;
pub mod direct;
pub mod drive;
pub mod error;
pub mod filesystem;
pub mod path;
pub mod registry;
pub mod stream;
pub mod tree;

pub use cache::TtlCache;
pub use direct::DirectDownload;
pub use drive::Drive;
pub use error::{FsError, Result};
pub use filesystem::{DriveFileSystem, File, FileSystem, OpenOptions};
pub use registry::{parse_basic_auth, SessionRegistry, BASIC_CHALLENGE};
pub use stream::StreamFile;
pub use tree::{FileInfo, RemoteTree};
