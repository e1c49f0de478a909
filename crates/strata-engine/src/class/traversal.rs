//! Traversal id pool
//!
//! A traversal id marks classes already visited by one recursive walk of
//! the hierarchy. Ids are leased LIFO from a bounded pool; acquiring one
//! clears its bit on every class (done by the environment).

use crate::error::{ClassError, ClassResult};
use crate::options::TRAVERSAL_RECORD_BITS;

/// Leased traversal marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalId(u16);

impl TraversalId {
    /// Bit index of this marker
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Per-class record of traversal marks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalMarks([u64; TRAVERSAL_RECORD_BITS / 64]);

impl TraversalMarks {
    /// Test a marker
    pub fn test(&self, id: TraversalId) -> bool {
        self.0[id.index() / 64] & (1 << (id.index() % 64)) != 0
    }

    /// Set a marker
    pub fn set(&mut self, id: TraversalId) {
        self.0[id.index() / 64] |= 1 << (id.index() % 64);
    }

    /// Clear a marker
    pub fn clear(&mut self, id: TraversalId) {
        self.0[id.index() / 64] &= !(1 << (id.index() % 64));
    }
}

/// Bounded LIFO pool of traversal ids
#[derive(Debug)]
pub struct TraversalPool {
    depth: usize,
    max: usize,
}

impl TraversalPool {
    /// Pool of `max` ids (clamped to the record width)
    pub fn new(max: usize) -> Self {
        Self {
            depth: 0,
            max: max.min(TRAVERSAL_RECORD_BITS),
        }
    }

    /// Lease the next id
    pub fn acquire(&mut self) -> ClassResult<TraversalId> {
        if self.depth >= self.max {
            tracing::warn!(max = self.max, "traversal id pool exhausted");
            return Err(ClassError::TraversalExhausted(self.max));
        }
        let id = TraversalId(self.depth as u16);
        self.depth += 1;
        tracing::trace!(id = id.0, "traversal id acquired");
        Ok(id)
    }

    /// Return the innermost id
    pub fn release(&mut self, id: TraversalId) -> ClassResult<()> {
        match self.depth.checked_sub(1) {
            Some(top) if top == id.index() => {
                self.depth = top;
                tracing::trace!(id = id.0, "traversal id released");
                Ok(())
            }
            top => Err(ClassError::TraversalOrder {
                expected: top.map_or(u16::MAX, |t| t as u16),
                released: id.0,
            }),
        }
    }

    /// Number of ids currently leased
    pub fn in_use(&self) -> usize {
        self.depth
    }

    /// Pool size
    pub fn capacity(&self) -> usize {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifo_nesting() {
        let mut pool = TraversalPool::new(4);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert!(matches!(
            pool.release(a),
            Err(ClassError::TraversalOrder { expected: 1, released: 0 })
        ));
        pool.release(b).unwrap();
        pool.release(a).unwrap();
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_exhaustion_keeps_held_ids() {
        let mut pool = TraversalPool::new(2);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_eq!(pool.acquire(), Err(ClassError::TraversalExhausted(2)));
        assert_eq!(pool.in_use(), 2);
        pool.release(b).unwrap();
        pool.release(a).unwrap();
    }

    #[test]
    fn test_marks_are_independent() {
        let mut marks = TraversalMarks::default();
        let mut pool = TraversalPool::new(TRAVERSAL_RECORD_BITS);
        let ids: Vec<_> = (0..70).map(|_| pool.acquire().unwrap()).collect();
        marks.set(ids[3]);
        marks.set(ids[69]);
        assert!(marks.test(ids[3]));
        assert!(marks.test(ids[69]));
        assert!(!marks.test(ids[4]));
        marks.clear(ids[69]);
        assert!(!marks.test(ids[69]));
    }
}
