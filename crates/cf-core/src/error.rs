//! Error types for the pressf-front front-end

use thiserror::Error;

/// Main error type for the front-end
#[derive(Error, Debug)]
pub enum FrontendError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Boot error: {0}")]
    Boot(#[from] BootError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

/// Removable-storage errors (bundled archive, SD card, flash accessory)
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File not found: {path}")]
    NotFound { path: String },

    #[error("Invalid archive format: expected magic 0x{expected:04x}, found 0x{actual:04x}")]
    InvalidFormat { expected: u16, actual: u16 },

    #[error("Corrupt archive {path}: {detail}")]
    CorruptArchive { path: String, detail: String },

    #[error("Accessory is not inserted")]
    AccessoryNotPresent,

    #[error("Accessory is not formatted")]
    NeedsFormat,

    #[error("Could not read source image {path}")]
    SourceUnreadable { path: String },

    #[error("Compression failed: {0}")]
    CompressionFailed(#[source] CodecError),

    #[error(
        "Not enough space on accessory: {pages_needed} pages needed, \
         {pages_free} pages and {notes_free} notes free"
    )]
    InsufficientSpace {
        pages_needed: u32,
        pages_free: u32,
        notes_free: u32,
    },

    #[error("Incomplete write: expected {expected} bytes, wrote {actual}")]
    WriteIncomplete { expected: usize, actual: usize },

    #[error("Image {path} is too large: {size} bytes (max {max})")]
    ImageTooLarge { path: String, size: u64, max: usize },

    #[error("Cannot copy from {0} to the accessory")]
    UnsupportedSource(String),

    #[error("A note named {name} already exists on the accessory")]
    NoteExists { name: String },

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    /// Attach a path to a corrupt-archive error raised before the path was known
    pub fn in_file(self, file: &str) -> Self {
        match self {
            StorageError::CorruptArchive { path, detail } if path.is_empty() => {
                StorageError::CorruptArchive {
                    path: file.to_string(),
                    detail,
                }
            }
            other => other,
        }
    }

    /// Wrap an IO error, mapping missing files to `NotFound`
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound { path }
        } else {
            StorageError::Io { path, source }
        }
    }
}

/// Compression codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Input of {size} bytes exceeds the {max} byte limit")]
    InputTooLarge { size: usize, max: usize },

    #[error("Compressed stream of {output} bytes exceeds the {limit} byte buffer")]
    Expansion { output: usize, limit: usize },

    #[error("Malformed compressed stream: {0}")]
    Malformed(String),

    #[error("Size mismatch: expected {expected} bytes, decoded {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Catalog and boot state machine errors
#[derive(Error, Debug)]
pub enum BootError {
    #[error("Missing firmware: {first} and {second} are both required (missing {missing})")]
    MissingFirmware {
        first: &'static str,
        second: &'static str,
        missing: String,
    },

    #[error("Not allowed here: {0}")]
    InvalidState(&'static str),
}

/// Result type alias for front-end operations
pub type Result<T> = std::result::Result<T, FrontendError>;
