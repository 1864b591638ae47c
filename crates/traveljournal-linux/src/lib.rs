//! Linux-specific implementation for traveljournal
//!
//! This crate provides the Linux glue for the traveljournal project: the
//! platform name and launching navigation links through `xdg-open`.

#![cfg(target_os = "linux")]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::process::Command;

use thiserror::Error;
use tracing::{debug, info};

/// Program used to open URLs.
const OPENER: &str = "xdg-open";

/// Errors that can occur when launching an external viewer.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The URL is not an http(s) link.
    #[error("refusing to open non-web URL: {0}")]
    UnsupportedUrl(String),

    /// The opener could not be started.
    #[error("failed to run xdg-open: {0}")]
    Spawn(#[from] std::io::Error),

    /// The opener exited with a failure status.
    #[error("xdg-open exited with status {0}")]
    Failed(std::process::ExitStatus),
}

/// Initialize Linux-specific components
///
/// # Errors
///
/// Returns an error if initialization fails
pub fn init() -> Result<(), LaunchError> {
    info!("Initializing Linux platform components");
    Ok(())
}

/// Get platform name
#[must_use]
pub fn platform_name() -> &'static str {
    "Linux"
}

fn check_url(url: &str) -> Result<(), LaunchError> {
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err(LaunchError::UnsupportedUrl(url.to_string()))
    }
}

/// Open a web link in the user's browser.
///
/// # Errors
///
/// Returns an error if the URL is not a web link or `xdg-open` fails.
pub fn open_url(url: &str) -> Result<(), LaunchError> {
    check_url(url)?;
    debug!(url, "Opening URL");

    let status = Command::new(OPENER).arg(url).status()?;
    if status.success() {
        Ok(())
    } else {
        Err(LaunchError::Failed(status))
    }
}
