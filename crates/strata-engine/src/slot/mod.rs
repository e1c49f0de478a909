//! Slots: names, descriptors and instance templates

mod descriptor;
mod name_table;
mod template;

pub use descriptor::{Accessor, DefaultValue, SlotBuilder, SlotDescriptor, SlotFacets};
pub use name_table::{SlotNameEntry, SlotNameTable, MAX_SLOT_NAMES, PUT_PREFIX};

pub(crate) use template::{build_slot_name_map, build_template};

use crate::class::ClassId;

/// Environment-wide slot-name id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotNameId(pub(crate) u16);

impl SlotNameId {
    /// Id as an array index
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw id value
    pub fn raw(self) -> u16 {
        self.0
    }
}

/// Reference to a slot declared by some class: `(owner, local index)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotRef {
    /// Declaring class
    pub class: ClassId,
    /// Index into the declaring class's local slots
    pub index: u16,
}
