//! Binary class image
//!
//! An image is a relocatable, flat rendition of every class, slot and
//! handler in an environment. Object references become 0-based indices into
//! flat record arrays (-1 for none) and are turned back into references by
//! an update pass on load.
//!
//! # Layout
//!
//! ```text
//! header      magic u64, version u32, endianness marker u32
//! pools       symbols, bitmaps, expressions, constraints
//! storage     size u64 (0 = no classes, nothing follows), 9 x i64 counts
//! data        size u64, then in order: module headers, class records,
//!             link indices, slot names, slot descriptors, template indices,
//!             slot-name maps, handlers, handler-order maps
//! trailer     CRC32 of everything before it
//! ```
//!
//! All integers are little-endian.

mod format;
mod reader;
mod writer;

pub use format::{ENDIANNESS_MARKER, IMAGE_MAGIC, IMAGE_VERSION, NO_INDEX};

use crate::error::ClassError;
use strata_common::CommonError;
use thiserror::Error;

/// Record counts written in the storage header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageCounts {
    /// Module header records
    pub modules: u64,
    /// Class records
    pub classes: u64,
    /// Link indices across all three link runs of every class
    pub links: u64,
    /// Slot-name records
    pub slot_names: u64,
    /// Slot descriptor records
    pub slots: u64,
    /// Template slot indices
    pub template_slots: u64,
    /// Slot-name map entries
    pub slot_name_map: u64,
    /// Handler records
    pub handlers: u64,
    /// One past the largest class id
    pub max_class_id: u64,
}

/// Summary of one save or load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageStats {
    /// Object section counts
    pub counts: ImageCounts,
    /// Symbols in the pool
    pub symbols: usize,
    /// Bitmaps in the pool
    pub bitmaps: usize,
    /// Expressions in the pool
    pub expressions: usize,
    /// Constraint records in the pool
    pub constraints: usize,
    /// Total image size in bytes
    pub bytes: u64,
}

/// Errors raised by image save and load
#[derive(Debug, Error)]
pub enum ImageError {
    /// The stream does not start with the image magic
    #[error("Invalid image magic number")]
    InvalidMagic,

    /// The image was written by an incompatible format version
    #[error("Incompatible image version: expected {expected}, found {actual}")]
    IncompatibleVersion {
        /// Version this build reads
        expected: u32,
        /// Version found in the header
        actual: u32,
    },

    /// The image was written with the opposite byte order
    #[error("Image byte order does not match")]
    EndiannessMismatch,

    /// A record is malformed
    #[error("Corrupted image data: {0}")]
    CorruptedData(&'static str),

    /// The trailer checksum does not match the content
    #[error("Image checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// Checksum in the trailer
        stored: u32,
        /// Checksum of the bytes read
        computed: u32,
    },

    /// A stored index points past the end of its array
    #[error("{what} index {index} out of range (length {len})")]
    IndexOutOfRange {
        /// Array the index refers to
        what: &'static str,
        /// Stored index
        index: i64,
        /// Array length
        len: usize,
    },

    /// Two class records claim the same id, or an id is out of range
    #[error("Class id {0} conflicts in image")]
    ClassIdConflict(u16),

    /// A slot name is registered under a different id than the image uses
    #[error("Slot name {name} conflicts with image id {id}")]
    SlotNameConflict {
        /// Slot name
        name: String,
        /// Id stored in the image
        id: u16,
    },

    /// Underlying stream failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The environment rejected the operation
    #[error(transparent)]
    Class(#[from] ClassError),

    /// A pooled value failed to decode
    #[error(transparent)]
    Decode(#[from] CommonError),
}

/// Result type for image operations
pub type ImageResult<T> = Result<T, ImageError>;
