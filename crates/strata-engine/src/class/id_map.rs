//! Dense class id allocator
//!
//! The map is a vector indexed by class id that owns each [`ClassDef`]. New
//! classes take the smallest free id. The vector grows in fixed chunks and
//! only shrinks when the highest id in use is released; interior holes are
//! remembered in a free set and never compacted.

use super::def::ClassDef;
use super::ClassId;
use crate::error::{ClassError, ClassResult};
use std::collections::BTreeSet;

/// Class id map and allocator
#[derive(Debug)]
pub struct ClassIdMap {
    map: Vec<Option<ClassDef>>,
    max_class_id: usize,
    free: BTreeSet<u16>,
    chunk: usize,
    count: usize,
}

impl ClassIdMap {
    /// Create an empty map growing by `chunk` entries
    pub fn new(chunk: usize) -> Self {
        Self {
            map: Vec::new(),
            max_class_id: 0,
            free: BTreeSet::new(),
            chunk: chunk.max(1),
            count: 0,
        }
    }

    /// Id the next inserted class will receive
    pub fn next_id(&self) -> ClassResult<ClassId> {
        if let Some(&id) = self.free.first() {
            return Ok(ClassId(id));
        }
        if self.max_class_id > ClassId::MAX as usize {
            return Err(ClassError::ClassIdsExhausted);
        }
        Ok(ClassId(self.max_class_id as u16))
    }

    /// Place a class at its own id
    pub fn insert(&mut self, def: ClassDef) {
        let id = def.id.index();
        if id >= self.max_class_id {
            for hole in self.max_class_id..id {
                self.free.insert(hole as u16);
            }
            self.max_class_id = id + 1;
        } else {
            self.free.remove(&(id as u16));
        }
        if id >= self.map.len() {
            let len = (id / self.chunk + 1) * self.chunk;
            self.map.resize_with(len, || None);
        }
        if self.map[id].replace(def).is_none() {
            self.count += 1;
        }
    }

    /// Remove a class and release its id
    pub fn remove(&mut self, id: ClassId) -> Option<ClassDef> {
        let def = self.map.get_mut(id.index())?.take()?;
        self.count -= 1;

        if id.index() + 1 == self.max_class_id {
            let mut top = id.index();
            while top > 0 && self.map[top - 1].is_none() {
                top -= 1;
                self.free.remove(&(top as u16));
            }
            self.max_class_id = top;
            let len = self.max_class_id.div_ceil(self.chunk) * self.chunk;
            if len < self.map.len() {
                self.map.truncate(len);
            }
        } else {
            self.free.insert(id.raw());
        }
        Some(def)
    }

    /// Reset for image reconstruction up to `max_class_id`
    ///
    /// Fails while any class is still defined.
    pub fn reinitialize(&mut self, max_class_id: usize) -> ClassResult<()> {
        if self.count > 0 {
            return Err(ClassError::AllocatorActive(self.count));
        }
        let len = max_class_id.div_ceil(self.chunk) * self.chunk;
        self.map = Vec::new();
        self.map.resize_with(len, || None);
        self.max_class_id = 0;
        self.free.clear();
        Ok(())
    }

    /// Class by id
    pub fn get(&self, id: ClassId) -> Option<&ClassDef> {
        self.map.get(id.index()).and_then(Option::as_ref)
    }

    /// Mutable class by id
    pub fn get_mut(&mut self, id: ClassId) -> Option<&mut ClassDef> {
        self.map.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Defined classes in id order
    pub fn iter(&self) -> impl Iterator<Item = &ClassDef> {
        self.map.iter().filter_map(Option::as_ref)
    }

    /// Mutable defined classes in id order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ClassDef> {
        self.map.iter_mut().filter_map(Option::as_mut)
    }

    /// One past the highest id in use
    pub fn max_class_id(&self) -> usize {
        self.max_class_id
    }

    /// Allocated length of the map
    pub fn capacity(&self) -> usize {
        self.map.len()
    }

    /// Number of defined classes
    pub fn len(&self) -> usize {
        self.count
    }

    /// True if no class is defined
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{ClassFlags, PackedLinks, TraversalMarks};
    use crate::module::ModuleId;
    use strata_common::{Bitmap, BitmapTable, SymbolTable};

    fn stub(id: u16, symbols: &mut SymbolTable, bitmaps: &mut BitmapTable) -> ClassDef {
        ClassDef {
            name: symbols.intern(&format!("C{}", id)),
            id: ClassId(id),
            module: ModuleId::MAIN,
            flags: ClassFlags::empty(),
            direct_superclasses: PackedLinks::new(),
            direct_subclasses: PackedLinks::new(),
            all_superclasses: PackedLinks::new(),
            slots: Vec::new(),
            instance_template: Vec::new(),
            slot_name_map: Vec::new(),
            handlers: Vec::new(),
            handler_order: Vec::new(),
            busy: 0,
            traversal: TraversalMarks::default(),
            scope: bitmaps.add(Bitmap::with_bit(0)),
        }
    }

    fn fill(map: &mut ClassIdMap, n: u16) {
        let mut symbols = SymbolTable::default();
        let mut bitmaps = BitmapTable::new();
        for _ in 0..n {
            let id = map.next_id().unwrap();
            map.insert(stub(id.raw(), &mut symbols, &mut bitmaps));
        }
    }

    #[test]
    fn test_ids_are_dense() {
        let mut map = ClassIdMap::new(4);
        fill(&mut map, 3);
        assert_eq!(map.max_class_id(), 3);
        assert_eq!(map.capacity(), 4);
        assert_eq!(map.next_id().unwrap(), ClassId(3));
    }

    #[test]
    fn test_smallest_free_id_reused() {
        let mut map = ClassIdMap::new(4);
        fill(&mut map, 4);
        map.remove(ClassId(2));
        map.remove(ClassId(1));
        assert_eq!(map.max_class_id(), 4);
        assert_eq!(map.next_id().unwrap(), ClassId(1));
    }

    #[test]
    fn test_grows_in_chunks() {
        let mut map = ClassIdMap::new(4);
        fill(&mut map, 5);
        assert_eq!(map.capacity(), 8);
    }

    #[test]
    fn test_shrinks_only_on_max_release() {
        let mut map = ClassIdMap::new(4);
        fill(&mut map, 6);
        map.remove(ClassId(1));
        assert_eq!(map.capacity(), 8);
        map.remove(ClassId(5));
        map.remove(ClassId(4));
        assert_eq!(map.max_class_id(), 4);
        assert_eq!(map.capacity(), 4);
        map.remove(ClassId(3));
        map.remove(ClassId(2));
        assert_eq!(map.max_class_id(), 1);
        assert_eq!(map.next_id().unwrap(), ClassId(1));
    }

    #[test]
    fn test_reinitialize_rejected_while_active() {
        let mut map = ClassIdMap::new(4);
        fill(&mut map, 1);
        assert_eq!(map.reinitialize(10), Err(ClassError::AllocatorActive(1)));
        map.remove(ClassId(0));
        assert!(map.reinitialize(10).is_ok());
        assert_eq!(map.capacity(), 12);
    }

    #[test]
    fn test_insert_past_max_records_holes() {
        let mut map = ClassIdMap::new(4);
        let mut symbols = SymbolTable::default();
        let mut bitmaps = BitmapTable::new();
        map.insert(stub(3, &mut symbols, &mut bitmaps));
        assert_eq!(map.max_class_id(), 4);
        assert_eq!(map.next_id().unwrap(), ClassId(0));
        map.insert(stub(0, &mut symbols, &mut bitmaps));
        assert_eq!(map.next_id().unwrap(), ClassId(1));
    }
}
