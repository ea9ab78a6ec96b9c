//! Removable storage for pressf-front
//!
//! Three read sources (bundled archive, SD card, flash accessory), the
//! compressed archive format used on the accessory, and the store that
//! copies program images onto it.

pub mod codec;
pub mod devices;
pub mod formats;
pub mod sources;
pub mod store;

pub use devices::{
    AccessoryDevice, AccessoryMount, AccessoryState, BundledDevice, CardDevice, DirEntry, Note,
    SourceKind, StorageDevice, StorageStats, PAGE_SIZE,
};
pub use formats::archive::{
    ArchiveHeader, ARCHIVE_EXTENSION, ARCHIVE_MAGIC, HEADER_SIZE, MAX_IMAGE_SIZE, READ_BUFFER_SIZE,
};
pub use sources::SourceSet;
pub use store::{note_name, sanitize, AccessoryStore, WriteOutcome};
