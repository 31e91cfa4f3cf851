//! The host's trash / recycle bin, as opposed to the in-app project trash

use anyhow::{Context, Result};
use std::path::Path;

pub trait TrashFacility: Send + Sync {
    /// Whether this host has a trash to send directories to
    fn is_available(&self) -> bool;

    /// Move `path` into the host trash. Blocking.
    fn move_to_trash(&self, path: &Path) -> Result<()>;
}

/// Backed by the `trash` crate (Finder, Recycle Bin, or freedesktop.org trash)
pub struct OsTrash;

impl TrashFacility for OsTrash {
    fn is_available(&self) -> bool {
        if cfg!(any(target_os = "windows", target_os = "macos")) {
            return true;
        }
        // freedesktop trash lives under the user's data dir
        cfg!(all(unix, not(target_os = "ios"), not(target_os = "android")))
            && dirs::data_dir().is_some()
    }

    fn move_to_trash(&self, path: &Path) -> Result<()> {
        trash::delete(path).with_context(|| format!("Failed to move {} to trash", path.display()))
    }
}
