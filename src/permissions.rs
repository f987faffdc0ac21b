//! Access checks gating the blur effect.
//!
//! Blurring needs read access to the current wallpaper. Hosts report that
//! capability through a [`PermissionProbe`]; the blur preference and the
//! scheduler both consult it on every evaluation rather than caching it.

use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

/// Reports whether the process may read the wallpaper.
pub trait PermissionProbe: Send + Sync {
    fn can_read_wallpaper(&self) -> bool;
}

/// Permission state set explicitly by the host, e.g. from a permission
/// prompt result.
#[derive(Debug, Default)]
pub struct PermissionFlag {
    granted: AtomicBool,
}

impl PermissionFlag {
    pub fn new(granted: bool) -> Self {
        Self {
            granted: AtomicBool::new(granted),
        }
    }

    pub fn set(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }

    pub fn granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }
}

impl PermissionProbe for PermissionFlag {
    fn can_read_wallpaper(&self) -> bool {
        self.granted()
    }
}

/// Probes by opening the wallpaper file for reading.
#[derive(Debug, Clone)]
pub struct WallpaperFileAccess {
    path: PathBuf,
}

impl WallpaperFileAccess {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PermissionProbe for WallpaperFileAccess {
    fn can_read_wallpaper(&self) -> bool {
        File::open(&self.path).is_ok()
    }
}
