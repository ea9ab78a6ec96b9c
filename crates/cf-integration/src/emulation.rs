//! Seam between the front-end and the emulation core
//!
//! The front-end only ever writes bytes into the core's address space and
//! resets it. [`MemoryCore`] is a flat 64 KiB implementation used by the
//! headless binary and by tests.

use cf_core::Settings;

/// Size of the console's address space
pub const ADDRESS_SPACE: usize = 0x1_0000;

/// Operations the front-end needs from an emulation core
pub trait EmulationCore {
    /// Copy `bytes` into the address space starting at `address`
    fn write(&mut self, address: u16, bytes: &[u8]);

    /// Reset the CPU and start executing from the firmware entry point
    fn reset(&mut self);

    /// Pick up changed settings (clock, scaling, font)
    fn apply_settings(&mut self, _settings: &Settings) {}
}

/// Flat memory image standing in for a full core
pub struct MemoryCore {
    memory: Vec<u8>,
    resets: u32,
    settings: Settings,
}

impl MemoryCore {
    /// Create a core with zeroed memory
    pub fn new() -> Self {
        Self {
            memory: vec![0; ADDRESS_SPACE],
            resets: 0,
            settings: Settings::default(),
        }
    }

    /// Read back `len` bytes at `address`, clipped to the address space
    pub fn read(&self, address: u16, len: usize) -> &[u8] {
        let start = address as usize;
        let end = (start + len).min(ADDRESS_SPACE);
        &self.memory[start..end]
    }

    /// Number of resets since creation
    pub fn resets(&self) -> u32 {
        self.resets
    }

    /// Settings last applied
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// CPU clock for the applied system model
    pub fn clock_hz(&self) -> u32 {
        self.settings.model.clock_hz()
    }
}

impl Default for MemoryCore {
    fn default() -> Self {
        Self::new()
    }
}

impl EmulationCore for MemoryCore {
    fn write(&mut self, address: u16, bytes: &[u8]) {
        let start = address as usize;
        let len = bytes.len().min(ADDRESS_SPACE - start);
        if len < bytes.len() {
            tracing::warn!(
                "Write of {} bytes at 0x{:04x} runs past the address space, {} bytes dropped",
                bytes.len(),
                address,
                bytes.len() - len
            );
        }
        self.memory[start..start + len].copy_from_slice(&bytes[..len]);
    }

    fn reset(&mut self) {
        self.resets += 1;
        tracing::debug!("Core reset (#{}) at {} Hz", self.resets, self.clock_hz());
    }

    fn apply_settings(&mut self, settings: &Settings) {
        self.settings = *settings;
    }
}
