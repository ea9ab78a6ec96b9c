//! Storage devices backing the three ROM sources
//!
//! Each device is emulated by a host directory and exposed under a fixed
//! virtual prefix (`rom:/`, `sd:/press-f/`, `cpak:/`).

pub mod accessory;
pub mod bundled;
pub mod card;

use cf_core::error::StorageError;
use std::fmt;
use std::path::{Component, Path, PathBuf};

pub use accessory::{AccessoryDevice, AccessoryMount, AccessoryState, Note, StorageStats, PAGE_SIZE};
pub use bundled::BundledDevice;
pub use card::CardDevice;

/// Which medium supplied a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Read-only archive bundled with the front-end
    Bundled,
    /// SD card
    RemovableCard,
    /// Flash memory accessory
    FlashAccessory,
}

impl SourceKind {
    /// Order in which the catalog scans sources
    pub const SCAN_ORDER: [SourceKind; 3] = [
        SourceKind::FlashAccessory,
        SourceKind::Bundled,
        SourceKind::RemovableCard,
    ];

    /// Virtual root prefix
    pub fn prefix(&self) -> &'static str {
        match self {
            SourceKind::Bundled => "rom:/",
            SourceKind::RemovableCard => "sd:/press-f/",
            SourceKind::FlashAccessory => "cpak:/",
        }
    }

    /// Full virtual path of a file on this source
    pub fn virtual_path(&self, relative: &str) -> String {
        format!("{}{}", self.prefix(), relative.trim_start_matches('/'))
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Bundled => write!(f, "bundled archive"),
            SourceKind::RemovableCard => write!(f, "SD card"),
            SourceKind::FlashAccessory => write!(f, "accessory"),
        }
    }
}

/// One directory listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_file: bool,
}

/// Uniform read interface over every source
pub trait StorageDevice {
    /// Source this device serves
    fn kind(&self) -> SourceKind;

    /// Read a program image, at most `max_bytes` long
    fn read(&mut self, relative_path: &str, max_bytes: usize) -> Result<Vec<u8>, StorageError>;

    /// List the visible entries at the device root
    fn list_entries(&mut self) -> Result<Vec<DirEntry>, StorageError>;
}

/// Resolve a path relative to a device root, returning the host path and
/// the canonical virtual path
///
/// The source prefix is accepted and stripped. Parent-directory components
/// are refused so a path can never escape the device.
pub(crate) fn resolve_path(
    host_root: &Path,
    kind: SourceKind,
    path: &str,
) -> Result<(PathBuf, String), StorageError> {
    let relative = path
        .strip_prefix(kind.prefix())
        .unwrap_or(path)
        .trim_start_matches('/');

    let escapes = Path::new(relative)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if relative.is_empty() || escapes {
        return Err(StorageError::NotFound {
            path: kind.virtual_path(relative),
        });
    }

    Ok((host_root.join(relative), kind.virtual_path(relative)))
}

/// Read a whole host file, refusing anything larger than `max_bytes`
pub(crate) fn read_host_file(
    host_path: &Path,
    virtual_path: &str,
    max_bytes: usize,
) -> Result<Vec<u8>, StorageError> {
    let metadata =
        std::fs::metadata(host_path).map_err(|e| StorageError::io(virtual_path, e))?;

    if !metadata.is_file() {
        return Err(StorageError::NotFound {
            path: virtual_path.to_string(),
        });
    }

    if metadata.len() > max_bytes as u64 {
        return Err(StorageError::ImageTooLarge {
            path: virtual_path.to_string(),
            size: metadata.len(),
            max: max_bytes,
        });
    }

    let data = std::fs::read(host_path).map_err(|e| StorageError::io(virtual_path, e))?;
    tracing::debug!("Read {} bytes from {}", data.len(), virtual_path);
    Ok(data)
}

/// List a host directory, hiding dot-files and sorting by name
pub(crate) fn list_host_dir(
    host_path: &Path,
    virtual_root: &str,
) -> Result<Vec<DirEntry>, StorageError> {
    let entries = std::fs::read_dir(host_path).map_err(|e| StorageError::io(virtual_root, e))?;

    let mut listing = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry in {}: {}", virtual_root, e);
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy().to_string();
        if name.is_empty() || name.starts_with('.') {
            continue;
        }

        match std::fs::metadata(entry.path()) {
            Ok(metadata) => listing.push(DirEntry {
                name,
                is_file: metadata.is_file(),
            }),
            Err(e) => tracing::warn!("Skipping {}{}: {}", virtual_root, name, e),
        }
    }

    listing.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(listing)
}
