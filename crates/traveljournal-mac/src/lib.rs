//! macOS-specific implementation for traveljournal.
//!
//! This crate provides the macOS glue for the traveljournal project,
//! launching navigation links with the system `open` command.

#![cfg(target_os = "macos")]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::process::Command;

use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur when launching an external viewer.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The URL is not an http(s) link.
    #[error("refusing to open non-web URL: {0}")]
    UnsupportedUrl(String),

    /// The `open` command could not be started.
    #[error("failed to run open: {0}")]
    Spawn(#[from] std::io::Error),

    /// The `open` command exited with a failure status.
    #[error("open exited with status {0}")]
    Failed(std::process::ExitStatus),
}

/// Initialize macOS-specific components.
///
/// # Errors
///
/// Returns an error if initialization fails.
pub fn init() -> Result<(), LaunchError> {
    info!("Initializing macOS platform components");
    Ok(())
}

/// Get the platform name.
#[must_use]
pub fn platform_name() -> &'static str {
    "macOS"
}

/// Open a web link in the default browser.
///
/// # Errors
///
/// Returns an error if the URL is not a web link or `open` fails.
pub fn open_url(url: &str) -> Result<(), LaunchError> {
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(LaunchError::UnsupportedUrl(url.to_string()));
    }
    debug!(url, "Opening URL");

    let status = Command::new("open").arg(url).status()?;
    if !status.success() {
        return Err(LaunchError::Failed(status));
    }
    Ok(())
}
