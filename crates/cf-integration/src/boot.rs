//! Boot state machine
//!
//! Drives the front-end from power-on to emulation:
//!
//! ```text
//! Uninitialized -> BuildingCatalog -> CatalogReady -> Emulating
//!                                  \-> Error(modal) -> resume
//! ```
//!
//! The machine owns the storage sources and both catalogs. One [`BootMachine::tick`]
//! runs per display frame and menu input arrives as discrete [`MenuEvent`]s.
//! Every operation takes `&mut self`, so a write to the accessory always
//! finishes before the catalog can be rebuilt.

use crate::catalog::{Catalog, CatalogEntry, EntryKind};
use crate::emulation::EmulationCore;
use crate::options::{self, OptionKey};
use cf_core::error::{BootError, FrontendError, StorageError};
use cf_core::{Config, Settings};
use cf_vfs::{
    AccessoryState, AccessoryStore, SourceKind, SourceSet, StorageStats, WriteOutcome,
    MAX_IMAGE_SIZE,
};
use tracing::{debug, error, info, warn};

/// Firmware images and their load addresses
pub const FIRMWARE: [(&str, u16); 2] = [("sl31253.bin", 0x0000), ("sl31254.bin", 0x0400)];

/// Leading characters compared when recognising firmware
pub const FIRMWARE_MATCH_LEN: usize = 8;

/// Largest firmware image
pub const FIRMWARE_SIZE: usize = 0x400;

/// Where program images are loaded
pub const PROGRAM_BASE: u16 = 0x0800;

/// Program images are copied into the core in chunks of this size
pub const LOAD_CHUNK: usize = 0x400;

/// First byte of a valid cartridge image
pub const SANITY_BYTE: u8 = 0x55;

pub const ROMS_TITLE: &str = "Press F Ultra - ROMs";
pub const ROMS_SUBTITLE: &str = "Select a ROM to load.";
pub const SETTINGS_TITLE: &str = "Press F Ultra - Settings";
pub const SETTINGS_SUBTITLE: &str = "Select a setting to change.";

/// Where to go once a modal is acknowledged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    Catalog,
    Emulating,
    Terminate,
}

/// Message waiting for acknowledgement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modal {
    pub message: String,
    pub resume: Resume,
}

/// Boot machine state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootState {
    /// Nothing scanned yet
    Uninitialized,
    /// Sources are being scanned
    BuildingCatalog,
    /// A menu is shown
    CatalogReady,
    /// The core is running
    Emulating,
    /// A modal message is shown
    Error(Modal),
    /// The session is over
    Terminated,
}

/// Which catalog is on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Roms,
    Settings,
}

/// Discrete menu input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuEvent {
    Up,
    Down,
    Left,
    Right,
    Activate,
    Back,
    Refresh,
    SaveToAccessory,
    ShowRoms,
    ShowSettings,
}

/// Which firmware images have reached the core
///
/// Flags are set once per boot and never cleared, so rescanning never loads
/// firmware twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BiosLoadFlags {
    loaded: [bool; 2],
}

impl BiosLoadFlags {
    pub fn is_loaded(&self, slot: usize) -> bool {
        self.loaded.get(slot).copied().unwrap_or(false)
    }

    pub fn all_loaded(&self) -> bool {
        self.loaded.iter().all(|l| *l)
    }

    fn set(&mut self, slot: usize) {
        if let Some(flag) = self.loaded.get_mut(slot) {
            *flag = true;
        }
    }

    /// Names of the images still missing
    pub fn missing(&self) -> Vec<&'static str> {
        FIRMWARE
            .iter()
            .zip(self.loaded)
            .filter(|(_, loaded)| !loaded)
            .map(|((name, _), _)| *name)
            .collect()
    }
}

/// Firmware slot for a file name, compared on its first characters
pub fn firmware_slot(name: &str) -> Option<usize> {
    let prefix = name.as_bytes().get(..FIRMWARE_MATCH_LEN)?;
    FIRMWARE
        .iter()
        .position(|(firmware, _)| &firmware.as_bytes()[..FIRMWARE_MATCH_LEN] == prefix)
}

/// Front-end state machine
pub struct BootMachine<C: EmulationCore> {
    core: C,
    sources: SourceSet,
    store: AccessoryStore,
    settings: Settings,
    state: BootState,
    view: View,
    roms: Catalog,
    settings_menu: Catalog,
    bios: BiosLoadFlags,
    /// Whether the core has been started at least once
    started: bool,
    /// Catalog contents no longer match the media
    roms_stale: bool,
    poll_interval: u32,
    frames_since_poll: u32,
    accessory_state: AccessoryState,
}

impl<C: EmulationCore> BootMachine<C> {
    /// Create a machine; nothing is scanned until [`BootMachine::boot`]
    pub fn new(
        core: C,
        sources: SourceSet,
        store: AccessoryStore,
        settings: Settings,
        presence_poll_frames: u32,
    ) -> Self {
        let accessory_state = sources.accessory.state();
        Self {
            core,
            sources,
            store,
            settings,
            state: BootState::Uninitialized,
            view: View::Roms,
            roms: Catalog::new(ROMS_TITLE, ROMS_SUBTITLE),
            settings_menu: Catalog::new(SETTINGS_TITLE, SETTINGS_SUBTITLE),
            bios: BiosLoadFlags::default(),
            started: false,
            roms_stale: true,
            poll_interval: presence_poll_frames.max(1),
            frames_since_poll: 0,
            accessory_state,
        }
    }

    /// Create a machine over the configured media
    pub fn from_config(core: C, config: &Config) -> Self {
        Self::new(
            core,
            SourceSet::from_config(config),
            AccessoryStore::new(config.accessory.compression),
            config.settings,
            config.accessory.presence_poll_frames,
        )
    }

    pub fn state(&self) -> &BootState {
        &self.state
    }

    pub fn view(&self) -> View {
        self.view
    }

    /// Catalog currently on screen
    pub fn catalog(&self) -> &Catalog {
        match self.view {
            View::Roms => &self.roms,
            View::Settings => &self.settings_menu,
        }
    }

    fn catalog_mut(&mut self) -> &mut Catalog {
        match self.view {
            View::Roms => &mut self.roms,
            View::Settings => &mut self.settings_menu,
        }
    }

    /// Modal waiting for acknowledgement, if any
    pub fn modal(&self) -> Option<&Modal> {
        match &self.state {
            BootState::Error(modal) => Some(modal),
            _ => None,
        }
    }

    pub fn bios_flags(&self) -> BiosLoadFlags {
        self.bios
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn core(&self) -> &C {
        &self.core
    }

    pub fn sources_mut(&mut self) -> &mut SourceSet {
        &mut self.sources
    }

    pub fn is_terminated(&self) -> bool {
        self.state == BootState::Terminated
    }

    /// Scan the media and show the ROM catalog
    pub fn boot(&mut self) {
        if self.state != BootState::Uninitialized {
            warn!("Boot requested in state {:?}, ignoring", self.state);
            return;
        }
        info!("Booting front-end");
        self.core.apply_settings(&self.settings);
        self.refresh();
    }

    /// Rebuild the ROM catalog from all sources
    ///
    /// Ends in `CatalogReady`, or in a terminating modal when either
    /// firmware image is still missing.
    pub fn refresh(&mut self) {
        self.state = BootState::BuildingCatalog;

        let cursor = self.roms.cursor();
        self.roms = self.scan();
        self.roms.set_cursor(cursor);
        self.roms_stale = false;
        self.accessory_state = self.sources.accessory.state();

        let missing = self.bios.missing();
        if missing.is_empty() {
            info!("Catalog ready with {} entries", self.roms.len());
            self.state = BootState::CatalogReady;
        } else {
            let err = BootError::MissingFirmware {
                first: FIRMWARE[0].0,
                second: FIRMWARE[1].0,
                missing: missing.join(", "),
            };
            error!("{}", err);
            self.show_modal(err.to_string(), Resume::Terminate);
        }
    }

    fn scan(&mut self) -> Catalog {
        let mut catalog = Catalog::new(ROMS_TITLE, ROMS_SUBTITLE);
        catalog.push(CatalogEntry::back());

        for kind in SourceKind::SCAN_ORDER {
            let entries = match self.sources.list_entries(kind) {
                Ok(entries) => entries,
                Err(e) => {
                    info!("Skipping {}: {}", kind, e);
                    continue;
                }
            };

            for entry in entries.into_iter().filter(|e| e.is_file) {
                debug!("Found {}", kind.virtual_path(&entry.name));
                if let Some(slot) = firmware_slot(&entry.name) {
                    self.load_firmware(slot, kind, &entry.name);
                    continue;
                }
                catalog.push(CatalogEntry::file(&entry.name, kind));
            }
        }

        catalog
    }

    fn load_firmware(&mut self, slot: usize, kind: SourceKind, name: &str) {
        if self.bios.is_loaded(slot) {
            debug!("Firmware {} already loaded", FIRMWARE[slot].0);
            return;
        }

        let address = FIRMWARE[slot].1;
        match self.sources.read(kind, name, FIRMWARE_SIZE) {
            Ok(image) => {
                self.core.write(address, &image);
                self.bios.set(slot);
                info!(
                    "Loaded firmware {} ({} bytes) at 0x{:04x}",
                    kind.virtual_path(name),
                    image.len(),
                    address
                );
            }
            Err(e) => warn!("Could not load firmware {}: {}", kind.virtual_path(name), e),
        }
    }

    /// Feed one menu event
    pub fn handle(&mut self, event: MenuEvent) {
        match self.state {
            BootState::CatalogReady => self.handle_menu(event),
            BootState::Error(_) => {
                if matches!(event, MenuEvent::Activate | MenuEvent::Back) {
                    self.acknowledge();
                }
            }
            BootState::Emulating => match event {
                MenuEvent::ShowRoms => self.open_view(View::Roms),
                MenuEvent::ShowSettings => self.open_view(View::Settings),
                _ => {}
            },
            BootState::Uninitialized | BootState::BuildingCatalog | BootState::Terminated => {
                debug!("Ignoring {:?} in state {:?}", event, self.state);
            }
        }
    }

    fn handle_menu(&mut self, event: MenuEvent) {
        match event {
            MenuEvent::Up => self.catalog_mut().move_up(),
            MenuEvent::Down => self.catalog_mut().move_down(),
            MenuEvent::Left => self.edit(|catalog| catalog.adjust(-1)),
            MenuEvent::Right => self.edit(|catalog| catalog.adjust(1)),
            MenuEvent::Activate => self.activate_selected(),
            MenuEvent::Back => self.back(),
            MenuEvent::Refresh => self.refresh(),
            MenuEvent::SaveToAccessory => {
                // The outcome is reported through the modal
                let _ = self.save_to_accessory();
            }
            MenuEvent::ShowRoms => self.open_view(View::Roms),
            MenuEvent::ShowSettings => self.open_view(View::Settings),
        }
    }

    /// Move the cursor of the visible catalog
    pub fn select(&mut self, index: usize) {
        self.catalog_mut().set_cursor(index);
    }

    fn edit(&mut self, change: impl FnOnce(&mut Catalog) -> Option<(OptionKey, usize)>) {
        if let Some((key, value)) = change(self.catalog_mut()) {
            options::apply(key, &mut self.settings, value);
            self.core.apply_settings(&self.settings);
            debug!("{:?} set to {}", key, value);
        }
    }

    fn activate_selected(&mut self) {
        let Some(entry) = self.catalog().selected() else {
            return;
        };
        let (kind, source, path) = (entry.kind, entry.source, entry.path.clone());

        match kind {
            EntryKind::Back => self.boot_to_bios(),
            EntryKind::SelectableFile => self.load_program(source, &path),
            EntryKind::Boolean | EntryKind::Choice => self.edit(Catalog::cycle),
        }
    }

    fn back(&mut self) {
        match self.view {
            View::Settings => self.open_view(View::Roms),
            View::Roms if self.started => self.state = BootState::Emulating,
            View::Roms => {}
        }
    }

    fn open_view(&mut self, view: View) {
        self.view = view;
        match view {
            View::Roms if self.roms_stale => self.refresh(),
            View::Roms => self.state = BootState::CatalogReady,
            View::Settings => {
                let cursor = self.settings_menu.cursor();
                let mut menu = Catalog::new(SETTINGS_TITLE, SETTINGS_SUBTITLE);
                for entry in options::settings_entries(&self.settings) {
                    menu.push(entry);
                }
                menu.set_cursor(cursor);
                self.settings_menu = menu;
                self.state = BootState::CatalogReady;
            }
        }
    }

    /// Start the firmware with no program loaded
    fn boot_to_bios(&mut self) {
        self.core.write(PROGRAM_BASE, &[0; 4]);
        self.start_core();
        info!("Booting to BIOS");
    }

    fn load_program(&mut self, kind: SourceKind, path: &str) {
        let virtual_path = kind.virtual_path(path);
        match self.read_program(kind, path) {
            Ok(image) => {
                for (i, chunk) in image.chunks(LOAD_CHUNK).enumerate() {
                    self.core.write(PROGRAM_BASE + (i * LOAD_CHUNK) as u16, chunk);
                }
                self.start_core();
                info!(
                    "Loaded {} ({} bytes) at 0x{:04x}",
                    virtual_path,
                    image.len(),
                    PROGRAM_BASE
                );
            }
            Err(e) => {
                error!("Could not load {}: {}", virtual_path, e);
                self.show_modal(format!("Could not load {}: {}", virtual_path, e), Resume::Catalog);
            }
        }
    }

    fn read_program(&mut self, kind: SourceKind, path: &str) -> Result<Vec<u8>, StorageError> {
        let image = self.sources.read(kind, path, MAX_IMAGE_SIZE)?;
        match image.first() {
            None => {
                return Err(StorageError::SourceUnreadable {
                    path: kind.virtual_path(path),
                })
            }
            Some(&first) if first != SANITY_BYTE => warn!(
                "{} starts with 0x{:02x}, expected 0x{:02x}; loading anyway",
                kind.virtual_path(path),
                first,
                SANITY_BYTE
            ),
            Some(_) => {}
        }
        Ok(image)
    }

    fn start_core(&mut self) {
        self.core.apply_settings(&self.settings);
        self.core.reset();
        self.started = true;
        self.state = BootState::Emulating;
    }

    /// Copy the selected ROM onto the accessory
    ///
    /// The result is also shown as a modal that returns to the catalog.
    pub fn save_to_accessory(&mut self) -> Result<WriteOutcome, FrontendError> {
        let result = self.save_selected();
        let message = match &result {
            Ok(outcome) => format!(
                "Saved {} to accessory: {} pages used, {}/{} pages and {}/{} notes free",
                outcome.note_name,
                outcome.pages_used,
                outcome.stats.pages_free(),
                outcome.stats.pages_total,
                outcome.stats.notes_free(),
                outcome.stats.notes_total
            ),
            Err(e) => {
                warn!("Save to accessory failed: {}", e);
                format!("Could not save to accessory: {}", e)
            }
        };

        if result.is_ok() {
            self.accessory_changed();
        }
        self.show_modal(message, Resume::Catalog);
        result
    }

    fn save_selected(&mut self) -> Result<WriteOutcome, FrontendError> {
        if self.view != View::Roms {
            return Err(BootError::InvalidState("saving needs the ROM catalog").into());
        }
        let (source, path) = match self.roms.selected() {
            Some(entry) if entry.kind == EntryKind::SelectableFile => {
                (entry.source, entry.path.clone())
            }
            _ => return Err(BootError::InvalidState("no ROM selected").into()),
        };

        Ok(self.store.write_entry(&mut self.sources, source, &path)?)
    }

    /// Write a fresh filesystem to the accessory
    pub fn format_accessory(&mut self) -> Result<StorageStats, StorageError> {
        self.sources.accessory.format()?;
        let stats = self.store.stats(&mut self.sources)?;
        self.accessory_changed();
        Ok(stats)
    }

    /// Delete a note from the accessory
    pub fn delete_note(&mut self, name: &str) -> Result<StorageStats, StorageError> {
        let stats = self.store.delete_entry(&mut self.sources, name)?;
        self.accessory_changed();
        Ok(stats)
    }

    /// Current accessory capacity
    pub fn accessory_stats(&mut self) -> Result<StorageStats, StorageError> {
        self.store.stats(&mut self.sources)
    }

    fn accessory_changed(&mut self) {
        if self.state == BootState::CatalogReady && self.view == View::Roms {
            self.refresh();
        } else {
            self.roms_stale = true;
        }
    }

    fn show_modal(&mut self, message: String, resume: Resume) {
        self.state = BootState::Error(Modal { message, resume });
    }

    fn acknowledge(&mut self) {
        let resume = match &self.state {
            BootState::Error(modal) => modal.resume,
            _ => return,
        };
        match resume {
            Resume::Catalog => self.open_view(self.view),
            Resume::Emulating => self.state = BootState::Emulating,
            Resume::Terminate => {
                info!("Session terminated");
                self.state = BootState::Terminated;
            }
        }
    }

    /// Advance one display frame
    ///
    /// Polls the accessory slot every `presence_poll_frames` frames and
    /// rebuilds the ROM catalog when the pak was inserted, removed or
    /// formatted.
    pub fn tick(&mut self) {
        if matches!(self.state, BootState::Uninitialized | BootState::Terminated) {
            return;
        }

        self.frames_since_poll += 1;
        if self.frames_since_poll < self.poll_interval {
            return;
        }
        self.frames_since_poll = 0;

        let current = self.sources.accessory.state();
        if current != self.accessory_state {
            info!("Accessory changed: {:?} -> {:?}", self.accessory_state, current);
            self.accessory_state = current;
            self.accessory_changed();
        }
    }
}
