//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the drive crates:
//! - Logging and tracing setup, including secret redaction helpers
//! - Drive configuration with validated defaults
//!
//! ## Overview
//!
//! Nothing in this crate talks to the remote service. It establishes the
//! logging conventions and the tunables (cache lifetimes, download slots,
//! rate-limit handling) that the session, tree and stream layers read.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{DriveConfig, DriveConfigBuilder};
pub use error::{Error, Result};
