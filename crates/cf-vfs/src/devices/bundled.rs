//! Bundled archive device (rom:/)
//!
//! Read-only files shipped with the front-end, typically the firmware.

use super::{list_host_dir, read_host_file, resolve_path, DirEntry, SourceKind, StorageDevice};
use cf_core::error::StorageError;
use std::path::{Path, PathBuf};

/// Bundled archive device
pub struct BundledDevice {
    /// Host path where the archive is stored
    pub host_path: PathBuf,
}

impl BundledDevice {
    /// Create a new bundled archive device
    pub fn new(host_path: PathBuf) -> Self {
        Self { host_path }
    }

    /// Get the mount point
    pub fn mount_point(&self) -> &'static str {
        SourceKind::Bundled.prefix()
    }

    /// Host directory backing the archive
    pub fn host_path(&self) -> &Path {
        &self.host_path
    }
}

impl StorageDevice for BundledDevice {
    fn kind(&self) -> SourceKind {
        SourceKind::Bundled
    }

    fn read(&mut self, relative_path: &str, max_bytes: usize) -> Result<Vec<u8>, StorageError> {
        let (host, virtual_path) = resolve_path(&self.host_path, SourceKind::Bundled, relative_path)?;
        read_host_file(&host, &virtual_path, max_bytes)
    }

    fn list_entries(&mut self) -> Result<Vec<DirEntry>, StorageError> {
        list_host_dir(&self.host_path, self.mount_point())
    }
}
