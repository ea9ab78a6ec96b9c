//! Compression codec for accessory archives
//!
//! Payloads are raw DEFLATE streams (LZ77 + Huffman, no zlib wrapper). Both
//! directions are bounded: inputs never exceed [`MAX_IMAGE_SIZE`] and
//! compressed output must fit the accessory read buffer after the header.

use crate::formats::archive::{HEADER_SIZE, MAX_IMAGE_SIZE, READ_BUFFER_SIZE};
use cf_core::config::CompressionLevel;
use cf_core::error::CodecError;
use miniz_oxide::inflate::TINFLStatus;

/// Largest compressed stream that still fits the read buffer
pub const MAX_COMPRESSED_SIZE: usize = READ_BUFFER_SIZE - HEADER_SIZE;

/// miniz level for each supported compression level
fn miniz_level(level: CompressionLevel) -> u8 {
    match level {
        CompressionLevel::Fast => 1,
        CompressionLevel::Balanced => 6,
        CompressionLevel::Best => 10,
    }
}

/// Compress a program image
///
/// Output is deterministic for a given input and level.
pub fn compress(input: &[u8], level: CompressionLevel) -> Result<Vec<u8>, CodecError> {
    if input.len() > MAX_IMAGE_SIZE {
        return Err(CodecError::InputTooLarge {
            size: input.len(),
            max: MAX_IMAGE_SIZE,
        });
    }

    let output = miniz_oxide::deflate::compress_to_vec(input, miniz_level(level));
    if output.len() > MAX_COMPRESSED_SIZE {
        return Err(CodecError::Expansion {
            output: output.len(),
            limit: MAX_COMPRESSED_SIZE,
        });
    }

    tracing::trace!(
        "Compressed {} bytes to {} bytes ({:?})",
        input.len(),
        output.len(),
        level
    );

    Ok(output)
}

/// Decompress a stream that must expand to exactly `expected_size` bytes
pub fn decompress(input: &[u8], expected_size: usize) -> Result<Vec<u8>, CodecError> {
    if expected_size > MAX_IMAGE_SIZE {
        return Err(CodecError::InputTooLarge {
            size: expected_size,
            max: MAX_IMAGE_SIZE,
        });
    }

    // One byte of headroom so an over-long stream is distinguishable from an exact one
    let limit = expected_size + 1;
    let output = match miniz_oxide::inflate::decompress_to_vec_with_limit(input, limit) {
        Ok(output) => output,
        Err(e) if e.status == TINFLStatus::HasMoreOutput => {
            return Err(CodecError::SizeMismatch {
                expected: expected_size,
                actual: e.output.len().max(limit),
            });
        }
        Err(e) => return Err(CodecError::Malformed(format!("{:?}", e.status))),
    };

    if output.len() != expected_size {
        return Err(CodecError::SizeMismatch {
            expected: expected_size,
            actual: output.len(),
        });
    }

    Ok(output)
}
