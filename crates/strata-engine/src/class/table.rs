//! Class hash index keyed by name symbol
//!
//! A class's bucket is its name symbol's precomputed hash scaled by
//! [`BIG_PRIME`] and reduced modulo the table size. Slot names use the same
//! scheme.

use super::ClassId;
use strata_common::Symbol;

/// Multiplier applied to symbol hashes before bucketing
pub const BIG_PRIME: u64 = 11329;

/// Bucket for a symbol hash in a table of `size` buckets
pub fn scaled_bucket(hash: u32, size: u32) -> usize {
    ((hash as u64 * BIG_PRIME) % size.max(1) as u64) as usize
}

/// Hash index from class name to class id
#[derive(Debug)]
pub struct ClassTable {
    buckets: Vec<Vec<(Symbol, ClassId)>>,
}

impl ClassTable {
    /// Create a table with `size` buckets
    pub fn new(size: u32) -> Self {
        Self {
            buckets: vec![Vec::new(); size.max(1) as usize],
        }
    }

    fn bucket(&self, hash: u32) -> usize {
        scaled_bucket(hash, self.buckets.len() as u32)
    }

    /// Index a class under its name
    pub fn add(&mut self, name: Symbol, hash: u32, id: ClassId) {
        let b = self.bucket(hash);
        self.buckets[b].push((name, id));
    }

    /// Remove a class from the index; absence is not an error
    pub fn remove(&mut self, name: Symbol, hash: u32, id: ClassId) -> bool {
        let b = self.bucket(hash);
        let bucket = &mut self.buckets[b];
        match bucket.iter().position(|&(n, c)| n == name && c == id) {
            Some(pos) => {
                bucket.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Find a class by name symbol
    pub fn find(&self, name: Symbol, hash: u32) -> Option<ClassId> {
        self.buckets[self.bucket(hash)]
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, id)| id)
    }

    /// Number of indexed classes
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    /// True if nothing is indexed
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::SymbolTable;

    #[test]
    fn test_add_find_remove() {
        let mut symbols = SymbolTable::default();
        let mut table = ClassTable::new(167);
        let a = symbols.intern("A");
        let b = symbols.intern("B");
        table.add(a, symbols.bucket(a), ClassId(0));
        table.add(b, symbols.bucket(b), ClassId(1));
        assert_eq!(table.find(a, symbols.bucket(a)), Some(ClassId(0)));
        assert_eq!(table.find(b, symbols.bucket(b)), Some(ClassId(1)));
        assert!(table.remove(a, symbols.bucket(a), ClassId(0)));
        assert!(!table.remove(a, symbols.bucket(a), ClassId(0)));
        assert_eq!(table.find(a, symbols.bucket(a)), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_collisions_share_bucket() {
        let mut symbols = SymbolTable::default();
        let mut table = ClassTable::new(1);
        let a = symbols.intern("A");
        let b = symbols.intern("B");
        table.add(a, symbols.bucket(a), ClassId(0));
        table.add(b, symbols.bucket(b), ClassId(1));
        assert_eq!(table.find(b, symbols.bucket(b)), Some(ClassId(1)));
    }

    #[test]
    fn test_scaled_bucket_in_range() {
        for hash in [0, 1, 166, 1020, u32::MAX] {
            assert!(scaled_bucket(hash, 167) < 167);
        }
    }
}
