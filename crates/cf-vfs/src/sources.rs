//! Source set: the three storage devices behind one read interface

use crate::devices::{
    AccessoryDevice, BundledDevice, CardDevice, DirEntry, SourceKind, StorageDevice,
};
use cf_core::error::StorageError;
use cf_core::Config;

/// All storage sources known to the front-end
pub struct SourceSet {
    pub bundled: BundledDevice,
    pub card: CardDevice,
    pub accessory: AccessoryDevice,
}

impl SourceSet {
    /// Create a source set from individual devices
    pub fn new(bundled: BundledDevice, card: CardDevice, accessory: AccessoryDevice) -> Self {
        Self {
            bundled,
            card,
            accessory,
        }
    }

    /// Create a source set from the configured host directories
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            BundledDevice::new(config.paths.bundled.clone()),
            CardDevice::new(config.paths.card.clone()),
            AccessoryDevice::from_config(config.paths.accessory.clone(), &config.accessory),
        )
    }

    /// Device serving a source
    pub fn device_mut(&mut self, kind: SourceKind) -> &mut dyn StorageDevice {
        match kind {
            SourceKind::Bundled => &mut self.bundled,
            SourceKind::RemovableCard => &mut self.card,
            SourceKind::FlashAccessory => &mut self.accessory,
        }
    }

    /// Read a program image from a source
    ///
    /// Accessory notes are decoded and decompressed; other sources return
    /// the file as stored.
    pub fn read(
        &mut self,
        kind: SourceKind,
        relative_path: &str,
        max_bytes: usize,
    ) -> Result<Vec<u8>, StorageError> {
        self.device_mut(kind).read(relative_path, max_bytes)
    }

    /// List the entries of a source
    pub fn list_entries(&mut self, kind: SourceKind) -> Result<Vec<DirEntry>, StorageError> {
        self.device_mut(kind).list_entries()
    }

    /// Borrow a non-accessory source and the accessory at the same time
    pub fn split_for_copy(
        &mut self,
        kind: SourceKind,
    ) -> Result<(&mut dyn StorageDevice, &mut AccessoryDevice), StorageError> {
        let Self {
            bundled,
            card,
            accessory,
        } = self;

        let source: &mut dyn StorageDevice = match kind {
            SourceKind::Bundled => bundled,
            SourceKind::RemovableCard => card,
            SourceKind::FlashAccessory => {
                return Err(StorageError::UnsupportedSource(kind.to_string()));
            }
        };

        Ok((source, accessory))
    }
}
