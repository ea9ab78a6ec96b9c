//! Flash accessory store
//!
//! Copies a program image from the bundled archive or the SD card onto the
//! accessory as a compressed note. The sequence is fixed: mount, read the
//! source, compress, check capacity, write, verify. Capacity is always checked
//! before anything is written, and the mount guard releases the pak on every
//! path out of [`AccessoryStore::write_entry`].

use crate::codec;
use crate::devices::accessory::{pages_for, AccessoryMount, StorageStats};
use crate::devices::SourceKind;
use crate::formats::archive::{ArchiveHeader, ARCHIVE_EXTENSION, HEADER_SIZE, MAX_IMAGE_SIZE};
use crate::sources::SourceSet;
use cf_core::config::CompressionLevel;
use cf_core::error::StorageError;
use std::path::Path;

/// Longest note name, extension excluded
pub const MAX_NOTE_NAME: usize = 16;

/// Name used when nothing survives sanitizing
const FALLBACK_NOTE_NAME: &str = "UNTITLED";

/// Result of a successful write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Note file name, extension included
    pub note_name: String,
    /// Bytes stored (header and payload)
    pub bytes_used: usize,
    /// Pages the note occupies
    pub pages_used: u32,
    /// Capacity after the write
    pub stats: StorageStats,
}

/// Reduce a display name to the accessory's alphabet
///
/// Uppercase `A-Z`, digits, `-` and single spaces, no leading or trailing
/// space, at most [`MAX_NOTE_NAME`] characters. Applying it twice gives the
/// same result as applying it once.
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(MAX_NOTE_NAME);

    for c in name.chars().flat_map(char::to_uppercase) {
        let keep = c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-' || c == ' ';
        if !keep || (c == ' ' && (out.is_empty() || out.ends_with(' '))) {
            continue;
        }
        if out.len() == MAX_NOTE_NAME {
            break;
        }
        out.push(c);
    }

    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Accessory note name for a source file: sanitized stem plus extension
pub fn note_name(source_path: &str) -> String {
    let file_name = source_path.rsplit('/').next().unwrap_or(source_path);
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);

    let mut base = sanitize(stem);
    if base.is_empty() {
        base = FALLBACK_NOTE_NAME.to_string();
    }
    format!("{}.{}", base, ARCHIVE_EXTENSION)
}

/// Check a payload against the accessory's capacity
///
/// Exact fits are allowed; one page or note over is not.
pub fn check_capacity(stats: &StorageStats, total_bytes: usize) -> Result<u32, StorageError> {
    let pages_needed = pages_for(total_bytes);

    let pages_fit = stats.pages_used as u64 + pages_needed as u64 <= stats.pages_total as u64;
    let notes_fit = stats.notes_used as u64 + 1 <= stats.notes_total as u64;

    if pages_fit && notes_fit {
        Ok(pages_needed)
    } else {
        Err(StorageError::InsufficientSpace {
            pages_needed,
            pages_free: stats.pages_free(),
            notes_free: stats.notes_free(),
        })
    }
}

/// Check the result of a note write against the expected size
///
/// Any failure other than a name clash removes whatever part of the note
/// reached the medium.
fn settle_write(
    mount: &AccessoryMount<'_>,
    name: &str,
    written: Result<usize, StorageError>,
    expected: usize,
) -> Result<(), StorageError> {
    let err = match written {
        Ok(actual) if actual == expected => return Ok(()),
        Ok(actual) => StorageError::WriteIncomplete { expected, actual },
        Err(e @ StorageError::NoteExists { .. }) => return Err(e),
        Err(e) => e,
    };

    if mount.contains(name) {
        if let Err(e) = mount.delete_note(name) {
            tracing::warn!("Could not remove partial note {}: {}", name, e);
        }
    }
    Err(err)
}

/// Writer for accessory notes
#[derive(Debug, Clone, Copy)]
pub struct AccessoryStore {
    level: CompressionLevel,
}

impl AccessoryStore {
    /// Create a store compressing at `level`
    pub fn new(level: CompressionLevel) -> Self {
        Self { level }
    }

    /// Compression level in use
    pub fn level(&self) -> CompressionLevel {
        self.level
    }

    /// Copy a program image onto the accessory
    pub fn write_entry(
        &self,
        sources: &mut SourceSet,
        kind: SourceKind,
        relative_path: &str,
    ) -> Result<WriteOutcome, StorageError> {
        let (source, accessory) = sources.split_for_copy(kind)?;
        let mount = accessory.mount()?;

        let image = source.read(relative_path, MAX_IMAGE_SIZE)?;
        if image.is_empty() {
            return Err(StorageError::SourceUnreadable {
                path: kind.virtual_path(relative_path),
            });
        }

        let payload = codec::compress(&image, self.level).map_err(StorageError::CompressionFailed)?;
        let total_bytes = HEADER_SIZE + payload.len();

        let stats = mount.stats()?;
        let pages_needed = check_capacity(&stats, total_bytes)?;

        let name = note_name(relative_path);
        if mount.contains(&name) {
            return Err(StorageError::NoteExists { name });
        }

        // Sizes are bounded by MAX_IMAGE_SIZE and the read buffer, both under u16::MAX
        let header = ArchiveHeader::new(image.len() as u16, payload.len() as u16);
        let written = mount.write_note(&name, &header, &payload);
        settle_write(&mount, &name, written, total_bytes)?;

        let stats = mount.stats()?;
        tracing::info!(
            "Saved {} to cpak:/{} ({} -> {} bytes, {} pages, {}/{} pages free)",
            kind.virtual_path(relative_path),
            name,
            image.len(),
            total_bytes,
            pages_needed,
            stats.pages_free(),
            stats.pages_total
        );

        Ok(WriteOutcome {
            note_name: name,
            bytes_used: total_bytes,
            pages_used: pages_needed,
            stats,
        })
    }

    /// Remove a note from the accessory
    pub fn delete_entry(&self, sources: &mut SourceSet, name: &str) -> Result<StorageStats, StorageError> {
        let mount = sources.accessory.mount()?;
        mount.delete_note(name)?;
        mount.stats()
    }

    /// Current accessory capacity
    pub fn stats(&self, sources: &mut SourceSet) -> Result<StorageStats, StorageError> {
        sources.accessory.mount()?.stats()
    }
}

impl Default for AccessoryStore {
    fn default() -> Self {
        Self::new(CompressionLevel::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_clean(s: &str) -> bool {
        s.len() <= MAX_NOTE_NAME
            && s.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-' || c == ' ')
            && !s.starts_with(' ')
            && !s.ends_with(' ')
            && !s.contains("  ")
    }

    #[test]
    fn test_sanitize_examples() {
        assert_eq!(sanitize("Foo (USA)"), "FOO USA");
        assert_eq!(sanitize("  videocart   21 -- bowling "), "VIDEOCART 21 --");
        assert_eq!(sanitize("Pac-Man!"), "PAC-MAN");
        assert_eq!(sanitize("straße"), "STRASSE");
        assert_eq!(sanitize("((("), "");
        assert_eq!(sanitize("ABCDEFGHIJKLMNO PQRS"), "ABCDEFGHIJKLMNO");
    }

    #[test]
    fn test_sanitize_properties() {
        let samples = [
            "",
            " ",
            "a",
            "Foo (USA).bin",
            "Videocart-17 Pinball Challenge (USA, Europe)",
            "tab\tseparated\nlines",
            "   leading",
            "trailing   ",
            "x  y   z",
            "ABCDEFGHIJKLMNOP",
            "ABCDEFGHIJKLMNO P",
            "ÉCOLE élève",
            "日本語 ROM 2",
            "----",
            "0123456789 0123456789",
        ];

        for sample in samples {
            let once = sanitize(sample);
            assert!(is_clean(&once), "{:?} -> {:?}", sample, once);
            assert_eq!(sanitize(&once), once, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_sanitize_exhaustive_short_strings() {
        let alphabet = ['a', 'Z', '9', ' ', '-', '.', '('];
        let mut buf = String::new();
        // All strings of length <= 4 over the alphabet
        for len in 0..=4u32 {
            for mut index in 0..alphabet.len().pow(len) {
                buf.clear();
                for _ in 0..len {
                    buf.push(alphabet[index % alphabet.len()]);
                    index /= alphabet.len();
                }
                let once = sanitize(&buf);
                assert!(is_clean(&once));
                assert_eq!(sanitize(&once), once);
            }
        }
    }

    #[test]
    fn test_note_name() {
        assert_eq!(note_name("Foo (USA).bin"), "FOO USA.CHF");
        assert_eq!(note_name("sd:/press-f/Foo (USA).bin"), "FOO USA.CHF");
        assert_eq!(note_name("videocart.21.bin"), "VIDEOCART21.CHF");
        assert_eq!(note_name("().bin"), "UNTITLED.CHF");
    }

    #[test]
    fn test_capacity_boundaries() {
        let stats = StorageStats {
            pages_used: 100,
            pages_total: 123,
            notes_used: 15,
            notes_total: 16,
        };

        // 23 pages free: exactly 23 pages fits
        assert_eq!(check_capacity(&stats, 23 * 256).unwrap(), 23);
        // one byte more needs a 24th page
        assert!(matches!(
            check_capacity(&stats, 23 * 256 + 1),
            Err(StorageError::InsufficientSpace { pages_needed: 24, pages_free: 23, notes_free: 1 })
        ));

        let full_notes = StorageStats { notes_used: 16, ..stats };
        assert!(matches!(
            check_capacity(&full_notes, 1),
            Err(StorageError::InsufficientSpace { notes_free: 0, .. })
        ));
    }

    fn formatted_pak(temp_dir: &tempfile::TempDir) -> crate::devices::AccessoryDevice {
        let mut pak = crate::devices::AccessoryDevice::new(temp_dir.path().to_path_buf(), 123, 16);
        pak.format().unwrap();
        pak
    }

    #[test]
    fn test_short_write_removes_partial_note() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let mut pak = formatted_pak(&temp_dir);
        std::fs::write(temp_dir.path().join("GAME.CHF"), [0xC5, 0xF8, 0x00]).unwrap();

        let mount = pak.mount().unwrap();
        assert!(matches!(
            settle_write(&mount, "GAME.CHF", Ok(3), 40),
            Err(StorageError::WriteIncomplete { expected: 40, actual: 3 })
        ));
        assert!(!mount.contains("GAME.CHF"));
        assert_eq!(mount.stats().unwrap().notes_used, 0);
    }

    #[test]
    fn test_failed_sync_removes_full_note() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let mut pak = formatted_pak(&temp_dir);
        std::fs::write(temp_dir.path().join("GAME.CHF"), [0u8; 40]).unwrap();

        // Every byte landed, but the write still reported an error
        let failure = StorageError::Io {
            path: "cpak:/GAME.CHF".to_string(),
            source: std::io::Error::other("sync failed"),
        };
        let mount = pak.mount().unwrap();
        assert!(matches!(
            settle_write(&mount, "GAME.CHF", Err(failure), 40),
            Err(StorageError::Io { .. })
        ));
        assert!(!mount.contains("GAME.CHF"));
    }

    #[test]
    fn test_name_clash_keeps_existing_note() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let mut pak = formatted_pak(&temp_dir);
        std::fs::write(temp_dir.path().join("GAME.CHF"), [0u8; 40]).unwrap();

        let mount = pak.mount().unwrap();
        let clash = StorageError::NoteExists {
            name: "GAME.CHF".to_string(),
        };
        assert!(matches!(
            settle_write(&mount, "GAME.CHF", Err(clash), 40),
            Err(StorageError::NoteExists { .. })
        ));
        assert!(mount.contains("GAME.CHF"));

        assert!(settle_write(&mount, "GAME.CHF", Ok(40), 40).is_ok());
        assert!(mount.contains("GAME.CHF"));
    }
}
