//! Integration layer for pressf-front
//!
//! Ties the storage sources to an emulation core: the ROM and settings
//! catalogs, the settings effect table and the boot state machine.

pub mod boot;
pub mod catalog;
pub mod emulation;
pub mod options;

pub use boot::{BiosLoadFlags, BootMachine, BootState, MenuEvent, Modal, Resume, View};
pub use catalog::{Catalog, CatalogEntry, EntryKind};
pub use emulation::{EmulationCore, MemoryCore};
pub use options::OptionKey;
