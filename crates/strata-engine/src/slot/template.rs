//! Instance template construction
//!
//! The template is the ordered list of slots an instance of a class
//! carries. It is built by walking the precedence list from the root
//! towards the class: a slot seen for the first time is appended, and a
//! more specific definition of an already placed name replaces it in place.
//! Ancestor slots marked no-inherit are skipped.

use super::{SlotDescriptor, SlotNameId, SlotRef};
use crate::class::{ClassId, ClassIdMap};
use rustc_hash::FxHashMap;

/// Build the template of a class that is not yet in `classes`
///
/// `precedence` starts with `this` and ends with the root.
pub(crate) fn build_template(
    this: ClassId,
    own_slots: &[SlotDescriptor],
    precedence: &[ClassId],
    classes: &ClassIdMap,
) -> Vec<SlotRef> {
    let mut template: Vec<SlotRef> = Vec::new();
    let mut placed: FxHashMap<SlotNameId, usize> = FxHashMap::default();

    for &cls in precedence.iter().rev() {
        let slots = if cls == this {
            own_slots
        } else {
            match classes.get(cls) {
                Some(def) => def.slots(),
                None => continue,
            }
        };
        for (index, slot) in slots.iter().enumerate() {
            if cls != this && slot.is_no_inherit() {
                continue;
            }
            let slot_ref = SlotRef {
                class: cls,
                index: index as u16,
            };
            match placed.get(&slot.name) {
                Some(&pos) => template[pos] = slot_ref,
                None => {
                    placed.insert(slot.name, template.len());
                    template.push(slot_ref);
                }
            }
        }
    }
    template
}

/// Slot-name id to template position map; zero marks an absent slot
pub(crate) fn build_slot_name_map(names: &[SlotNameId]) -> Vec<u32> {
    let Some(max) = names.iter().map(|n| n.index()).max() else {
        return Vec::new();
    };
    let mut map = vec![0u32; max + 1];
    for (pos, name) in names.iter().enumerate() {
        map[name.index()] = pos as u32 + 1;
    }
    map
}
