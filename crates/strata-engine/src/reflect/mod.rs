//! Read-only introspection over classes, slots and handlers
//!
//! Queries are keyed by class and slot name strings, the way a host's
//! command surface would call them. Reports ([`Environment::describe_class`],
//! [`Environment::browse_classes`]) are returned as text.

mod describe;
mod introspection;

use crate::error::{ClassError, ClassResult};
use crate::handler::HandlerKind;

/// Keyword that asks a query to include inherited members
pub const INHERIT_KEYWORD: &str = "inherit";

/// How a slot obtains its initial value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultKind {
    /// No default; the slot starts without a value
    NoDefault,
    /// Value fixed at definition time
    Static,
    /// Expression evaluated on every request
    Dynamic,
}

impl DefaultKind {
    /// Facet code: `NIL`, `STC` or `DYN`
    pub fn code(self) -> &'static str {
        match self {
            DefaultKind::NoDefault => "NIL",
            DefaultKind::Static => "STC",
            DefaultKind::Dynamic => "DYN",
        }
    }
}

/// One entry of a handler listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSummary {
    /// Defining class
    pub class: String,
    /// Message name
    pub name: String,
    /// Handler kind
    pub kind: HandlerKind,
}

/// Parse the optional inherit keyword of a query
///
/// A missing keyword means local members only.
pub fn parse_inherit_keyword(keyword: Option<&str>) -> ClassResult<bool> {
    match keyword {
        None => Ok(false),
        Some(INHERIT_KEYWORD) => Ok(true),
        Some(other) => Err(ClassError::InvalidKeyword {
            expected: INHERIT_KEYWORD,
            found: other.to_string(),
        }),
    }
}
