//! File format handlers

pub mod archive;

pub use archive::{ArchiveHeader, ARCHIVE_MAGIC, HEADER_SIZE, MAX_IMAGE_SIZE};
