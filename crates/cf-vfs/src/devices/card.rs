//! SD card device (sd:/press-f/)
//!
//! The card may be absent or swapped at any time, so insertion is checked on
//! every access.

use super::{list_host_dir, read_host_file, resolve_path, DirEntry, SourceKind, StorageDevice};
use cf_core::error::StorageError;
use std::path::PathBuf;

/// SD card device
pub struct CardDevice {
    /// Host path of the card's ROM folder
    pub host_path: Option<PathBuf>,
}

impl CardDevice {
    /// Create a card device backed by a host folder
    pub fn new(host_path: PathBuf) -> Self {
        Self {
            host_path: Some(host_path),
        }
    }

    /// Create a card slot with nothing inserted
    pub fn empty() -> Self {
        Self { host_path: None }
    }

    /// Insert a card
    pub fn insert(&mut self, host_path: PathBuf) {
        tracing::info!("SD card inserted: {:?}", host_path);
        self.host_path = Some(host_path);
    }

    /// Eject the card
    pub fn eject(&mut self) {
        self.host_path = None;
        tracing::info!("SD card ejected");
    }

    /// Check if a card with a readable ROM folder is present
    pub fn is_inserted(&self) -> bool {
        self.host_path.as_ref().is_some_and(|p| p.is_dir())
    }

    /// Get the mount point
    pub fn mount_point(&self) -> &'static str {
        SourceKind::RemovableCard.prefix()
    }

    fn root(&self) -> Result<&PathBuf, StorageError> {
        match &self.host_path {
            Some(path) if path.is_dir() => Ok(path),
            _ => Err(StorageError::NotFound {
                path: self.mount_point().to_string(),
            }),
        }
    }
}

impl StorageDevice for CardDevice {
    fn kind(&self) -> SourceKind {
        SourceKind::RemovableCard
    }

    fn read(&mut self, relative_path: &str, max_bytes: usize) -> Result<Vec<u8>, StorageError> {
        let root = self.root()?;
        let (host, virtual_path) = resolve_path(root, SourceKind::RemovableCard, relative_path)?;
        read_host_file(&host, &virtual_path, max_bytes)
    }

    fn list_entries(&mut self) -> Result<Vec<DirEntry>, StorageError> {
        let root = self.root()?;
        list_host_dir(root, self.mount_point())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_card_device_creation() {
        let card = CardDevice::empty();
        assert!(!card.is_inserted());
        assert_eq!(card.mount_point(), "sd:/press-f/");
    }

    #[test]
    fn test_insert_and_eject() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(temp_dir.path().join("Foo (USA).bin"), [0x55, 0x08]).unwrap();

        let mut card = CardDevice::empty();
        card.insert(temp_dir.path().to_path_buf());
        assert!(card.is_inserted());
        assert_eq!(card.read("Foo (USA).bin", 0x4000).unwrap(), vec![0x55, 0x08]);

        card.eject();
        assert!(!card.is_inserted());
        assert!(matches!(
            card.list_entries(),
            Err(StorageError::NotFound { ref path }) if path == "sd:/press-f/"
        ));
    }

    #[test]
    fn test_missing_folder_is_not_inserted() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut card = CardDevice::new(temp_dir.path().join("press-f"));

        assert!(!card.is_inserted());
        assert!(card.read("game.bin", 16).is_err());
    }
}
