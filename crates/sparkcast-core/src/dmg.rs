//! Disk-image mounting via `hdiutil`.
//!
//! Images are attached read-only at a caller-chosen mountpoint so the delta
//! workflow knows exactly where bundle contents land. Detaching is advisory:
//! the publish flow logs detach failures and moves on.

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::debug;

const HDIUTIL: &str = "/usr/bin/hdiutil";

/// Errors from `hdiutil`.
#[derive(Debug, Error)]
pub enum DmgError {
    /// The disk image does not exist.
    #[error("disk image not found: {0}")]
    ImageMissing(PathBuf),

    /// `hdiutil` could not be started.
    #[error("failed to run hdiutil: {0}")]
    Spawn(#[from] std::io::Error),

    /// `hdiutil attach` exited unsuccessfully.
    #[error("hdiutil attach failed for {image}: {stderr}")]
    AttachFailed {
        /// Image that failed to mount.
        image: PathBuf,
        /// Captured stderr.
        stderr: String,
    },

    /// `hdiutil detach` exited unsuccessfully.
    #[error("hdiutil detach failed for {mountpoint}: {stderr}")]
    DetachFailed {
        /// Mountpoint that failed to detach.
        mountpoint: PathBuf,
        /// Captured stderr.
        stderr: String,
    },
}

/// Attach `image` read-only at `mountpoint`, blocking until `hdiutil`
/// finishes. The mountpoint directory must already exist.
///
/// # Errors
///
/// [`DmgError::ImageMissing`] before anything runs, otherwise spawn or
/// attach failures.
pub fn attach(image: &Path, mountpoint: &Path) -> Result<(), DmgError> {
    if !image.exists() {
        return Err(DmgError::ImageMissing(image.to_path_buf()));
    }

    debug!(image = %image.display(), mountpoint = %mountpoint.display(), "hdiutil attach");
    let output = Command::new(HDIUTIL)
        .arg("attach")
        .arg("-nobrowse")
        .arg("-readonly")
        .arg("-mountpoint")
        .arg(mountpoint)
        .arg(image)
        .output()?;
    if !output.status.success() {
        return Err(DmgError::AttachFailed {
            image: image.to_path_buf(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

/// Detach the volume mounted at `mountpoint`.
///
/// # Errors
///
/// Spawn or detach failures; callers in the publish flow treat these as
/// advisory.
pub fn detach(mountpoint: &Path) -> Result<(), DmgError> {
    debug!(mountpoint = %mountpoint.display(), "hdiutil detach");
    let output = Command::new(HDIUTIL)
        .arg("detach")
        .arg(mountpoint)
        .output()?;
    if !output.status.success() {
        return Err(DmgError::DetachFailed {
            mountpoint: mountpoint.to_path_buf(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}
