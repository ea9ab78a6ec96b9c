//! Flash memory accessory (cpak:/)
//!
//! The accessory is a small removable flash pak organized into 256-byte pages
//! and a fixed number of directory notes. It is emulated by a host directory:
//! the directory existing means the pak is inserted, and a `.cpakfs` marker
//! inside it means the pak is formatted. Each note is one host file carrying
//! the archive extension.
//!
//! Every access goes through an [`AccessoryMount`] guard. Dropping the guard
//! unmounts the pak, so early returns can't leave it mounted across frames.

use super::{DirEntry, SourceKind, StorageDevice};
use crate::codec;
use crate::formats::archive::{ArchiveHeader, ARCHIVE_EXTENSION, HEADER_SIZE, READ_BUFFER_SIZE};
use cf_core::config::AccessoryConfig;
use cf_core::error::StorageError;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Allocation unit in bytes
pub const PAGE_SIZE: usize = 256;

/// Marker file written by `format`
pub const FORMAT_MARKER: &str = ".cpakfs";

/// Physical state of the accessory slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessoryState {
    /// Nothing inserted
    Absent,
    /// Inserted but carrying no filesystem
    Unformatted,
    /// Inserted and formatted
    Ready,
}

/// Capacity snapshot, in pages and notes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    pub pages_used: u32,
    pub pages_total: u32,
    pub notes_used: u32,
    pub notes_total: u32,
}

impl StorageStats {
    pub fn pages_free(&self) -> u32 {
        self.pages_total.saturating_sub(self.pages_used)
    }

    pub fn notes_free(&self) -> u32 {
        self.notes_total.saturating_sub(self.notes_used)
    }
}

/// One note stored on the accessory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub name: String,
    pub size: u64,
    pub pages: u32,
}

/// Pages needed to store `bytes`
pub fn pages_for(bytes: usize) -> u32 {
    bytes.div_ceil(PAGE_SIZE) as u32
}

/// Flash accessory device
pub struct AccessoryDevice {
    /// Host directory emulating the pak
    host_path: PathBuf,
    /// Total pages available for notes
    pages_total: u32,
    /// Total directory notes
    notes_total: u32,
    /// Whether a mount guard is live
    mounted: bool,
}

impl AccessoryDevice {
    /// Create a new accessory device
    pub fn new(host_path: PathBuf, pages_total: u32, notes_total: u32) -> Self {
        Self {
            host_path,
            pages_total,
            notes_total,
            mounted: false,
        }
    }

    /// Create an accessory using configured geometry
    pub fn from_config(host_path: PathBuf, config: &AccessoryConfig) -> Self {
        Self::new(host_path, config.pages_total, config.notes_total)
    }

    /// Get the mount point
    pub fn mount_point(&self) -> &'static str {
        SourceKind::FlashAccessory.prefix()
    }

    /// Host directory backing the pak
    pub fn host_path(&self) -> &Path {
        &self.host_path
    }

    /// Probe the slot
    pub fn state(&self) -> AccessoryState {
        if !self.host_path.is_dir() {
            AccessoryState::Absent
        } else if !self.host_path.join(FORMAT_MARKER).is_file() {
            AccessoryState::Unformatted
        } else {
            AccessoryState::Ready
        }
    }

    /// Check if a pak is inserted, formatted or not
    pub fn is_present(&self) -> bool {
        self.state() != AccessoryState::Absent
    }

    /// Check if a mount guard is live
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Mount the pak for the lifetime of the returned guard
    pub fn mount(&mut self) -> Result<AccessoryMount<'_>, StorageError> {
        match self.state() {
            AccessoryState::Absent => Err(StorageError::AccessoryNotPresent),
            AccessoryState::Unformatted => {
                tracing::warn!("Accessory at {:?} is not formatted", self.host_path);
                Err(StorageError::NeedsFormat)
            }
            AccessoryState::Ready => {
                self.mounted = true;
                tracing::debug!("Accessory mounted: {:?}", self.host_path);
                Ok(AccessoryMount { device: self })
            }
        }
    }

    /// Write a fresh filesystem to an inserted pak
    ///
    /// Existing notes are kept; only the filesystem marker is (re)written.
    pub fn format(&mut self) -> Result<(), StorageError> {
        if self.state() == AccessoryState::Absent {
            return Err(StorageError::AccessoryNotPresent);
        }

        let marker = self.host_path.join(FORMAT_MARKER);
        std::fs::write(&marker, b"CPAKFS\n")
            .map_err(|e| StorageError::io(SourceKind::FlashAccessory.virtual_path(FORMAT_MARKER), e))?;

        tracing::info!("Formatted accessory at {:?}", self.host_path);
        Ok(())
    }
}

impl StorageDevice for AccessoryDevice {
    fn kind(&self) -> SourceKind {
        SourceKind::FlashAccessory
    }

    fn read(&mut self, relative_path: &str, max_bytes: usize) -> Result<Vec<u8>, StorageError> {
        let mount = self.mount()?;
        mount.read_image(relative_path, max_bytes)
    }

    fn list_entries(&mut self) -> Result<Vec<DirEntry>, StorageError> {
        let mount = self.mount()?;
        Ok(mount
            .notes()?
            .into_iter()
            .map(|note| DirEntry {
                name: note.name,
                is_file: true,
            })
            .collect())
    }
}

/// Live mount of the accessory; unmounts on drop
pub struct AccessoryMount<'a> {
    device: &'a mut AccessoryDevice,
}

impl AccessoryMount<'_> {
    /// Device behind this mount
    pub fn device(&self) -> &AccessoryDevice {
        &*self.device
    }

    /// The pak can be pulled between operations, so check before each one
    fn root(&self) -> Result<&Path, StorageError> {
        if self.device.host_path.is_dir() {
            Ok(&self.device.host_path)
        } else {
            tracing::warn!("Accessory removed while mounted");
            Err(StorageError::AccessoryNotPresent)
        }
    }

    fn note_path(&self, name: &str) -> Result<(PathBuf, String), StorageError> {
        let (host, virtual_path) = super::resolve_path(self.root()?, SourceKind::FlashAccessory, name)?;
        if !is_archive_name(&virtual_path) {
            return Err(StorageError::NotFound { path: virtual_path });
        }
        Ok((host, virtual_path))
    }

    /// All notes, sorted by name
    pub fn notes(&self) -> Result<Vec<Note>, StorageError> {
        let root = self.root()?;
        let entries = std::fs::read_dir(root)
            .map_err(|e| StorageError::io(SourceKind::FlashAccessory.prefix(), e))?;

        let mut notes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::Io {
                path: SourceKind::FlashAccessory.prefix().to_string(),
                source: e,
            })?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || !is_archive_name(&name) {
                continue;
            }

            // A note that can't be sized would let the capacity check under-count
            let metadata = std::fs::metadata(entry.path()).map_err(|e| StorageError::Io {
                path: SourceKind::FlashAccessory.virtual_path(&name),
                source: e,
            })?;
            if !metadata.is_file() {
                continue;
            }

            notes.push(Note {
                pages: pages_for(metadata.len() as usize),
                size: metadata.len(),
                name,
            });
        }

        notes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(notes)
    }

    /// Current capacity, computed fresh from the medium
    pub fn stats(&self) -> Result<StorageStats, StorageError> {
        let notes = self.notes()?;
        Ok(StorageStats {
            pages_used: notes.iter().map(|n| n.pages).sum(),
            pages_total: self.device.pages_total,
            notes_used: notes.len() as u32,
            notes_total: self.device.notes_total,
        })
    }

    /// Check whether a note exists
    pub fn contains(&self, name: &str) -> bool {
        self.note_path(name).is_ok_and(|(host, _)| host.is_file())
    }

    /// Read a note's raw bytes (header and payload)
    pub fn read_raw(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let (host, virtual_path) = self.note_path(name)?;
        super::read_host_file(&host, &virtual_path, READ_BUFFER_SIZE).map_err(|e| match e {
            StorageError::ImageTooLarge { path, size, max } => StorageError::CorruptArchive {
                path,
                detail: format!("note is {} bytes, read buffer holds {}", size, max),
            },
            other => other,
        })
    }

    /// Read and decompress a note into a program image
    pub fn read_image(&self, name: &str, max_bytes: usize) -> Result<Vec<u8>, StorageError> {
        let (_, virtual_path) = self.note_path(name)?;
        let raw = self.read_raw(name)?;

        let header = ArchiveHeader::decode(&raw).map_err(|e| e.in_file(&virtual_path))?;
        let payload = &raw[HEADER_SIZE..];
        if payload.len() < header.compressed_size as usize {
            return Err(StorageError::CorruptArchive {
                path: virtual_path,
                detail: format!(
                    "payload truncated: expected {} bytes, found {}",
                    header.compressed_size,
                    payload.len()
                ),
            });
        }

        if header.original_size as usize > max_bytes {
            return Err(StorageError::ImageTooLarge {
                path: virtual_path,
                size: header.original_size as u64,
                max: max_bytes,
            });
        }

        let image = codec::decompress(
            &payload[..header.compressed_size as usize],
            header.original_size as usize,
        )
        .map_err(|e| StorageError::CorruptArchive {
            path: virtual_path.clone(),
            detail: e.to_string(),
        })?;

        tracing::info!(
            "Loaded {} ({} bytes, {} compressed)",
            virtual_path,
            header.original_size,
            header.compressed_size
        );

        Ok(image)
    }

    /// Create a new note holding `header` followed by `payload`
    ///
    /// Returns the number of bytes that reached the medium. An existing note
    /// of the same name is never replaced. A failed write or sync is an error
    /// even when every byte was written; the partial note is left for the
    /// caller to remove.
    pub fn write_note(
        &self,
        name: &str,
        header: &ArchiveHeader,
        payload: &[u8],
    ) -> Result<usize, StorageError> {
        let (host, virtual_path) = self.note_path(name)?;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&host)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    StorageError::NoteExists {
                        name: name.to_string(),
                    }
                } else {
                    StorageError::io(virtual_path.as_str(), e)
                }
            })?;

        let result = file
            .write_all(&header.encode())
            .and_then(|_| file.write_all(payload))
            .and_then(|_| file.sync_all());
        drop(file);

        let written = std::fs::metadata(&host).map(|m| m.len() as usize).unwrap_or(0);
        if let Err(e) = result {
            tracing::warn!("Write to {} failed after {} bytes: {}", virtual_path, written, e);
            return Err(StorageError::Io {
                path: virtual_path,
                source: e,
            });
        }

        Ok(written)
    }

    /// Delete a note
    pub fn delete_note(&self, name: &str) -> Result<(), StorageError> {
        let (host, virtual_path) = self.note_path(name)?;
        std::fs::remove_file(&host).map_err(|e| StorageError::io(virtual_path.as_str(), e))?;
        tracing::info!("Deleted {}", virtual_path);
        Ok(())
    }
}

impl Drop for AccessoryMount<'_> {
    fn drop(&mut self) {
        self.device.mounted = false;
        tracing::debug!("Accessory unmounted: {:?}", self.device.host_path);
    }
}

/// Check for the archive extension, ignoring case
pub fn is_archive_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_core::config::CompressionLevel;
    use tempfile::TempDir;

    fn formatted_pak(temp_dir: &TempDir) -> AccessoryDevice {
        let mut pak = AccessoryDevice::new(temp_dir.path().to_path_buf(), 123, 16);
        pak.format().unwrap();
        pak
    }

    fn store_image(pak: &mut AccessoryDevice, name: &str, image: &[u8]) {
        let payload = codec::compress(image, CompressionLevel::Balanced).unwrap();
        let header = ArchiveHeader::new(image.len() as u16, payload.len() as u16);
        let mount = pak.mount().unwrap();
        let written = mount.write_note(name, &header, &payload).unwrap();
        assert_eq!(written, header.total_size());
    }

    #[test]
    fn test_pages_for() {
        assert_eq!(pages_for(0), 0);
        assert_eq!(pages_for(1), 1);
        assert_eq!(pages_for(256), 1);
        assert_eq!(pages_for(257), 2);
    }

    #[test]
    fn test_states() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut pak = AccessoryDevice::new(temp_dir.path().join("cpak"), 123, 16);
        assert_eq!(pak.state(), AccessoryState::Absent);
        assert!(matches!(pak.mount(), Err(StorageError::AccessoryNotPresent)));
        assert!(matches!(pak.format(), Err(StorageError::AccessoryNotPresent)));

        std::fs::create_dir(temp_dir.path().join("cpak")).unwrap();
        assert_eq!(pak.state(), AccessoryState::Unformatted);
        assert!(matches!(pak.mount(), Err(StorageError::NeedsFormat)));

        pak.format().unwrap();
        assert_eq!(pak.state(), AccessoryState::Ready);
    }

    #[test]
    fn test_mount_guard_unmounts() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut pak = formatted_pak(&temp_dir);

        {
            let mount = pak.mount().unwrap();
            assert!(mount.device().is_mounted());
            assert_eq!(mount.stats().unwrap().notes_used, 0);
        }
        assert!(!pak.is_mounted());

        assert!(pak.read("MISSING.CHF", 0x4000).is_err());
        assert!(!pak.is_mounted());
    }

    #[test]
    fn test_write_read_and_stats() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut pak = formatted_pak(&temp_dir);

        let image: Vec<u8> = (0..3000u32).map(|i| (i * 7 % 251) as u8).collect();
        store_image(&mut pak, "VIDEOCART 1.CHF", &image);

        let listing = pak.list_entries().unwrap();
        assert_eq!(listing, vec![DirEntry { name: "VIDEOCART 1.CHF".to_string(), is_file: true }]);

        assert_eq!(pak.read("VIDEOCART 1.CHF", 0x4000).unwrap(), image);
        assert_eq!(pak.read("cpak:/VIDEOCART 1.CHF", 0x4000).unwrap(), image);

        let mount = pak.mount().unwrap();
        let stats = mount.stats().unwrap();
        let size = std::fs::metadata(temp_dir.path().join("VIDEOCART 1.CHF")).unwrap().len();
        assert_eq!(stats.notes_used, 1);
        assert_eq!(stats.pages_used, pages_for(size as usize));
        assert_eq!(stats.pages_free(), 123 - stats.pages_used);
        assert_eq!(stats.notes_free(), 15);
    }

    #[test]
    fn test_foreign_files_are_ignored() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut pak = formatted_pak(&temp_dir);
        std::fs::write(temp_dir.path().join("readme.txt"), b"hello").unwrap();

        assert!(pak.list_entries().unwrap().is_empty());
        assert!(matches!(
            pak.read("readme.txt", 0x4000),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn test_bad_magic_is_invalid_format() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut pak = formatted_pak(&temp_dir);
        std::fs::write(temp_dir.path().join("RAW.CHF"), [0x55, 0x2B, 0, 0, 0, 0, 1, 2]).unwrap();

        assert!(matches!(
            pak.read("RAW.CHF", 0x4000),
            Err(StorageError::InvalidFormat { actual: 0x2B55, .. })
        ));
        assert!(!pak.is_mounted());
    }

    #[test]
    fn test_size_mismatch_is_corrupt_archive() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut pak = formatted_pak(&temp_dir);

        let image = vec![0x55u8; 1000];
        let payload = codec::compress(&image, CompressionLevel::Fast).unwrap();
        // Header claims more bytes than the stream holds
        let header = ArchiveHeader::new(1200, payload.len() as u16);
        pak.mount().unwrap().write_note("LIAR.CHF", &header, &payload).unwrap();

        match pak.read("LIAR.CHF", 0x4000) {
            Err(StorageError::CorruptArchive { path, detail }) => {
                assert_eq!(path, "cpak:/LIAR.CHF");
                assert!(detail.contains("1200"));
                assert!(detail.contains("1000"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_truncated_payload_is_corrupt_archive() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut pak = formatted_pak(&temp_dir);

        let mut raw = ArchiveHeader::new(100, 50).encode().to_vec();
        raw.extend_from_slice(&[0u8; 10]);
        std::fs::write(temp_dir.path().join("SHORT.CHF"), raw).unwrap();

        assert!(matches!(
            pak.read("SHORT.CHF", 0x4000),
            Err(StorageError::CorruptArchive { .. })
        ));
    }

    #[test]
    fn test_existing_note_not_replaced() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut pak = formatted_pak(&temp_dir);
        store_image(&mut pak, "GAME.CHF", &[0x55; 64]);

        let header = ArchiveHeader::new(1, 1);
        let mount = pak.mount().unwrap();
        assert!(mount.contains("GAME.CHF"));
        assert!(matches!(
            mount.write_note("GAME.CHF", &header, &[0]),
            Err(StorageError::NoteExists { .. })
        ));
    }

    #[test]
    fn test_delete_note() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut pak = formatted_pak(&temp_dir);
        store_image(&mut pak, "GAME.CHF", &[0x55; 64]);

        let mount = pak.mount().unwrap();
        mount.delete_note("GAME.CHF").unwrap();
        assert!(!mount.contains("GAME.CHF"));
        assert!(matches!(mount.delete_note("GAME.CHF"), Err(StorageError::NotFound { .. })));
    }

    #[test]
    fn test_removed_while_mounted() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let pak_path = temp_dir.path().join("cpak");
        std::fs::create_dir(&pak_path).unwrap();
        let mut pak = AccessoryDevice::new(pak_path.clone(), 123, 16);
        pak.format().unwrap();

        let mount = pak.mount().unwrap();
        std::fs::remove_dir_all(&pak_path).unwrap();
        assert!(matches!(mount.stats(), Err(StorageError::AccessoryNotPresent)));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_note_fails_stats() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut pak = formatted_pak(&temp_dir);
        store_image(&mut pak, "GAME.CHF", &[0x55; 64]);
        std::os::unix::fs::symlink(temp_dir.path().join("gone"), temp_dir.path().join("LOST.CHF"))
            .unwrap();

        let mount = pak.mount().unwrap();
        match mount.stats() {
            Err(StorageError::Io { path, .. }) => assert_eq!(path, "cpak:/LOST.CHF"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
