//! Class definition record

use super::links::PackedLinks;
use super::traversal::TraversalMarks;
use super::ClassId;
use crate::handler::Handler;
use crate::module::ModuleId;
use crate::slot::{SlotDescriptor, SlotNameId, SlotRef};
use bitflags::bitflags;
use strata_common::{BitmapRef, Symbol};

bitflags! {
    /// Class-level flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClassFlags: u8 {
        /// Direct instances cannot be created
        const ABSTRACT = 1 << 0;
        /// Direct instances can match rule patterns
        const REACTIVE = 1 << 1;
        /// Built-in class
        const SYSTEM = 1 << 2;
    }
}

/// A defined class
///
/// `all_superclasses` is the linearized precedence list, self first and the
/// root last. `slot_name_map` is indexed by slot-name id and holds the
/// template position plus one, or zero when the class has no such slot.
#[derive(Debug)]
pub struct ClassDef {
    pub(crate) name: Symbol,
    pub(crate) id: ClassId,
    pub(crate) module: ModuleId,
    pub(crate) flags: ClassFlags,
    pub(crate) direct_superclasses: PackedLinks,
    pub(crate) direct_subclasses: PackedLinks,
    pub(crate) all_superclasses: PackedLinks,
    pub(crate) slots: Vec<SlotDescriptor>,
    pub(crate) instance_template: Vec<SlotRef>,
    pub(crate) slot_name_map: Vec<u32>,
    pub(crate) handlers: Vec<Handler>,
    pub(crate) handler_order: Vec<u32>,
    pub(crate) busy: u32,
    pub(crate) traversal: TraversalMarks,
    pub(crate) scope: BitmapRef,
}

impl ClassDef {
    /// Interned class name
    pub fn name(&self) -> Symbol {
        self.name
    }

    /// Dense class id
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Owning module
    pub fn module(&self) -> ModuleId {
        self.module
    }

    /// Class flags
    pub fn flags(&self) -> ClassFlags {
        self.flags
    }

    /// True if direct instances cannot be created
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(ClassFlags::ABSTRACT)
    }

    /// True if direct instances can match patterns
    pub fn is_reactive(&self) -> bool {
        self.flags.contains(ClassFlags::REACTIVE)
    }

    /// True for built-in classes
    pub fn is_system(&self) -> bool {
        self.flags.contains(ClassFlags::SYSTEM)
    }

    /// Direct superclasses in declaration order
    pub fn direct_superclasses(&self) -> &[ClassId] {
        self.direct_superclasses.as_slice()
    }

    /// Direct subclasses in definition order
    pub fn direct_subclasses(&self) -> &[ClassId] {
        self.direct_subclasses.as_slice()
    }

    /// Precedence list, self first
    pub fn all_superclasses(&self) -> &[ClassId] {
        self.all_superclasses.as_slice()
    }

    /// Locally declared slots
    pub fn slots(&self) -> &[SlotDescriptor] {
        &self.slots
    }

    /// Merged instance template
    pub fn instance_template(&self) -> &[SlotRef] {
        &self.instance_template
    }

    /// Slot-name id to template position map
    pub fn slot_name_map(&self) -> &[u32] {
        &self.slot_name_map
    }

    /// Locally defined handlers
    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    /// Handler positions in dispatch lookup order
    pub fn handler_order(&self) -> &[u32] {
        &self.handler_order
    }

    /// Busy count
    pub fn busy(&self) -> u32 {
        self.busy
    }

    /// Scope bitmap handle
    pub fn scope(&self) -> BitmapRef {
        self.scope
    }

    /// Position of a slot in the instance template
    pub fn template_position(&self, slot: SlotNameId) -> Option<usize> {
        match self.slot_name_map.get(slot.index()) {
            Some(&pos) if pos > 0 => Some(pos as usize - 1),
            _ => None,
        }
    }

    /// Local slot by slot-name id
    pub fn local_slot(&self, slot: SlotNameId) -> Option<(usize, &SlotDescriptor)> {
        self.slots.iter().enumerate().find(|(_, s)| s.name == slot)
    }

    /// Largest slot-name id visible on instances
    pub fn max_slot_name_id(&self) -> Option<SlotNameId> {
        self.slot_name_map
            .len()
            .checked_sub(1)
            .map(|i| SlotNameId(i as u16))
    }
}
