//! Configuration system for the pressf-front front-end

use crate::error::{FrontendError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub paths: PathConfig,
    pub accessory: AccessoryConfig,
    pub settings: Settings,
    pub debug: DebugConfig,
}

/// Host directories backing each storage source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Read-only bundled archive (`rom:/`)
    pub bundled: PathBuf,
    /// SD card ROM folder (`sd:/press-f/`)
    pub card: PathBuf,
    /// Flash accessory (`cpak:/`)
    pub accessory: PathBuf,
}

/// Flash accessory geometry and write settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessoryConfig {
    /// Total 256-byte pages available for notes
    pub pages_total: u32,
    /// Total directory notes
    pub notes_total: u32,
    /// Compression level used when writing notes
    pub compression: CompressionLevel,
    /// Frames between accessory presence checks
    pub presence_poll_frames: u32,
}

/// Compression level for accessory archives
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
pub enum CompressionLevel {
    Fast,
    #[default]
    Balanced,
    Best,
}

impl CompressionLevel {
    pub const ALL: [CompressionLevel; 3] = [Self::Fast, Self::Balanced, Self::Best];
}

/// User-facing emulation settings, edited from the settings catalog
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub scaling: Scaling,
    pub model: SystemModel,
    pub font: Font,
}

/// Output scaling mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum Scaling {
    #[default]
    Aspect4x3,
    PixelPerfect,
}

/// Console model, which selects the CPU clock
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum SystemModel {
    #[default]
    Ntsc,
    PalGen1,
    PalGen2,
}

impl SystemModel {
    pub const ALL: [SystemModel; 3] = [Self::Ntsc, Self::PalGen1, Self::PalGen2];

    /// CPU clock in Hz
    pub fn clock_hz(&self) -> u32 {
        match self {
            SystemModel::Ntsc => 1_789_772,
            SystemModel::PalGen1 => 2_000_000,
            SystemModel::PalGen2 => 1_970_491,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SystemModel::Ntsc => "NTSC (1.79 MHz)",
            SystemModel::PalGen1 => "PAL Gen I (2.00 MHz)",
            SystemModel::PalGen2 => "PAL Gen II (1.97 MHz)",
        }
    }
}

/// Character font used by the on-screen text
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum Font {
    #[default]
    Original,
    Alternate,
}

impl Font {
    pub const ALL: [Font; 2] = [Self::Original, Self::Alternate];

    pub fn label(&self) -> &'static str {
        match self {
            Font::Original => "Original",
            Font::Alternate => "Alternate",
        }
    }
}

/// Debug settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub log_level: LogLevel,
}

/// Logging level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive string understood by `EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

// Default implementations

impl Default for PathConfig {
    fn default() -> Self {
        let base = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pressf-front");

        Self {
            bundled: base.join("bundled"),
            card: base.join("sd"),
            accessory: base.join("cpak"),
        }
    }
}

impl Default for AccessoryConfig {
    fn default() -> Self {
        Self {
            pages_total: 123,
            notes_total: 16,
            compression: CompressionLevel::default(),
            presence_poll_frames: 60,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if path.exists() {
            Self::load_from(&path)
        } else {
            let config = Self::default();
            config.save_to(&path)?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| FrontendError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to an explicit file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| FrontendError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pressf-front")
            .join("config.toml")
    }
}
