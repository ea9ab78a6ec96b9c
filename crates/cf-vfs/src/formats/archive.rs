//! Accessory archive header
//!
//! Every note on the flash accessory starts with a fixed 6-byte header
//! followed by the compressed program image:
//!
//! | offset | size | field           |
//! |--------|------|-----------------|
//! | 0      | 2    | magic (LE)      |
//! | 2      | 2    | original size   |
//! | 4      | 2    | compressed size |

use cf_core::error::StorageError;

/// Header sentinel. The low byte is never 0x55, the cartridge sanity byte,
/// so an uncompressed image can't be mistaken for an archive.
pub const ARCHIVE_MAGIC: u16 = 0xF8C5;

/// Encoded header size in bytes
pub const HEADER_SIZE: usize = 6;

/// Largest program image the emulated machine accepts
pub const MAX_IMAGE_SIZE: usize = 0x4000;

/// Physical read buffer for one accessory note (header included)
pub const READ_BUFFER_SIZE: usize = 0x4400;

/// Archive file extension on the accessory
pub const ARCHIVE_EXTENSION: &str = "CHF";

/// Decoded accessory archive header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub magic: u16,
    pub original_size: u16,
    pub compressed_size: u16,
}

impl ArchiveHeader {
    /// Create a header for a payload
    pub fn new(original_size: u16, compressed_size: u16) -> Self {
        Self {
            magic: ARCHIVE_MAGIC,
            original_size,
            compressed_size,
        }
    }

    /// Encode to the on-media layout
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..2].copy_from_slice(&self.magic.to_le_bytes());
        bytes[2..4].copy_from_slice(&self.original_size.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.compressed_size.to_le_bytes());
        bytes
    }

    /// Decode and validate a header
    ///
    /// The magic is checked first; nothing else is trusted until it matches.
    pub fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        if bytes.len() < HEADER_SIZE {
            return Err(corrupt(format!(
                "header truncated: expected {} bytes, found {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        if magic != ARCHIVE_MAGIC {
            return Err(StorageError::InvalidFormat {
                expected: ARCHIVE_MAGIC,
                actual: magic,
            });
        }

        let original_size = u16::from_le_bytes([bytes[2], bytes[3]]);
        let compressed_size = u16::from_le_bytes([bytes[4], bytes[5]]);

        if original_size as usize > MAX_IMAGE_SIZE {
            return Err(corrupt(format!(
                "original size 0x{:04x} exceeds maximum 0x{:04x}",
                original_size, MAX_IMAGE_SIZE
            )));
        }

        if compressed_size as usize > READ_BUFFER_SIZE {
            return Err(corrupt(format!(
                "compressed size 0x{:04x} exceeds read buffer 0x{:04x}",
                compressed_size, READ_BUFFER_SIZE
            )));
        }

        Ok(Self {
            magic,
            original_size,
            compressed_size,
        })
    }

    /// Header plus payload length
    pub fn total_size(&self) -> usize {
        HEADER_SIZE + self.compressed_size as usize
    }
}

fn corrupt(detail: String) -> StorageError {
    StorageError::CorruptArchive {
        path: String::new(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let header = ArchiveHeader::new(0x4000, 0x0123);
        assert_eq!(header.encode(), [0xC5, 0xF8, 0x00, 0x40, 0x23, 0x01]);
        assert_eq!(header.total_size(), 6 + 0x123);
    }

    #[test]
    fn test_decode_valid() {
        let header = ArchiveHeader::decode(&[0xC5, 0xF8, 0x00, 0x08, 0x10, 0x00]).unwrap();
        assert_eq!(header.original_size, 0x0800);
        assert_eq!(header.compressed_size, 0x0010);
    }

    #[test]
    fn test_bad_magic_always_invalid_format() {
        // Every non-sentinel first pair, whatever follows, must be rejected on the magic
        for first in 0u16..=0xFFFF {
            if first == ARCHIVE_MAGIC {
                continue;
            }
            let [lo, hi] = first.to_le_bytes();
            let tail = (first as u8).wrapping_mul(31);
            let bytes = [lo, hi, tail, 0xFF, tail ^ 0x5A, 0xFF];

            match ArchiveHeader::decode(&bytes) {
                Err(StorageError::InvalidFormat { expected, actual }) => {
                    assert_eq!(expected, ARCHIVE_MAGIC);
                    assert_eq!(actual, first);
                }
                other => panic!("magic 0x{:04x} decoded as {:?}", first, other),
            }
        }
    }

    #[test]
    fn test_uncompressed_image_is_not_an_archive() {
        let image = [0x55, 0x2B, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            ArchiveHeader::decode(&image),
            Err(StorageError::InvalidFormat { actual: 0x2B55, .. })
        ));
    }

    #[test]
    fn test_oversized_fields_are_corrupt() {
        let too_big = ArchiveHeader::new(0x4001, 0x10).encode();
        assert!(matches!(
            ArchiveHeader::decode(&too_big),
            Err(StorageError::CorruptArchive { .. })
        ));

        let too_long = ArchiveHeader::new(0x4000, 0x4401).encode();
        assert!(matches!(
            ArchiveHeader::decode(&too_long),
            Err(StorageError::CorruptArchive { .. })
        ));
    }

    #[test]
    fn test_truncated_header() {
        let err = ArchiveHeader::decode(&[0xC5, 0xF8, 0x00]).unwrap_err();
        assert!(err.to_string().contains("expected 6 bytes, found 3"));
    }
}
