//! Classes and their hierarchy
//!
//! Every class has a dense integer id drawn from the [`ClassIdMap`], which
//! also owns the [`ClassDef`] itself. The [`ClassTable`] indexes classes by
//! name. Hierarchy edges live in [`PackedLinks`] arrays on each class.

mod def;
mod define;
mod id_map;
mod links;
mod precedence;
mod system;
mod table;
mod traversal;

pub use def::{ClassDef, ClassFlags};
pub use define::ClassBuilder;
pub use id_map::ClassIdMap;
pub use links::{LinkPosition, PackedLinks};
pub use system::SYSTEM_CLASS_NAMES;
pub use table::{scaled_bucket, ClassTable, BIG_PRIME};
pub use traversal::{TraversalId, TraversalMarks, TraversalPool};

pub(crate) use precedence::linearize;

/// Dense per-environment class id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub(crate) u16);

impl ClassId {
    /// Largest id the allocator hands out
    pub const MAX: u16 = u16::MAX - 1;

    /// Id as an array index
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw id value
    pub fn raw(self) -> u16 {
        self.0
    }
}
