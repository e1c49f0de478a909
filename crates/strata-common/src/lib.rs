//! Strata Common
//!
//! Services consumed by the strata class runtime:
//! - Ref-counted symbol interning with stable bucket hashes
//! - Scope bitmaps and a de-duplicating bitmap table
//! - Runtime values and opaque expressions
//! - Slot constraint records
//! - Little-endian binary encodings for all of the above

#![warn(missing_docs)]

pub mod bitmap;
pub mod codec;
pub mod constraint;
pub mod expression;
pub mod symbol;
pub mod value;

pub use bitmap::{Bitmap, BitmapRef, BitmapTable};
pub use constraint::{ConstraintRecord, TypeSet};
pub use expression::{Evaluator, Expression};
pub use symbol::{Symbol, SymbolTable};
pub use value::Value;

use thiserror::Error;

/// Errors raised while decoding shared records
#[derive(Debug, Error)]
pub enum CommonError {
    /// Underlying stream failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record tag that no encoder produces
    #[error("Invalid {what} tag: {tag}")]
    InvalidTag {
        /// Kind of record being decoded
        what: &'static str,
        /// Offending tag byte
        tag: u8,
    },

    /// Encoded text was not UTF-8
    #[error("Invalid UTF-8 in encoded string")]
    InvalidUtf8,

    /// A length prefix larger than the remaining input allows
    #[error("Encoded length {0} exceeds limit")]
    LengthOverflow(u64),
}

/// Result type for shared record decoding
pub type CommonResult<T> = Result<T, CommonError>;
