//! # pikpakdav
//!
//! Read-only filesystem access to a PikPak cloud drive, shaped for a
//! WebDAV-style protocol server.
//!
//! This crate re-exports the workspace crates so a host can depend on one
//! package. With the default `desktop-shims` feature it also wires the
//! reqwest transport and the JSON file store into a ready [`Drive`].
//!
//! ```ignore
//! use pikpakdav::{DriveConfig, FileSystem};
//!
//! let drive = pikpakdav::open_drive(DriveConfig::default(), "/var/lib/pikpakdav").await?;
//! let info = drive.file_system().stat("/Movies").await?;
//! ```

pub use bridge_traits;
pub use core_auth;
pub use core_fs;
pub use core_runtime;
pub use provider_pikpak;

pub use core_fs::{
    DirectDownload, Drive, DriveFileSystem, File, FileInfo, FileSystem, FsError, OpenOptions,
    SessionRegistry, StreamFile,
};
pub use core_runtime::config::DriveConfig;
pub use core_runtime::logging::{init_logging, LoggingConfig};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;

/// Build a drive from the account and session documents in `state_dir`
///
/// The client profile is bootstrapped from the web client on every call;
/// the device id and tokens are reused from the session document when
/// present.
#[cfg(feature = "desktop-shims")]
pub async fn open_drive(
    config: DriveConfig,
    state_dir: impl Into<std::path::PathBuf>,
) -> core_fs::Result<Drive> {
    use std::sync::Arc;

    let transport = Arc::new(bridge_desktop::ReqwestHttpClient::with_timeout(config.request_timeout)?);
    let store = Arc::new(bridge_desktop::JsonFileStateStore::new(state_dir));
    Drive::from_store(config, transport, store).await
}
