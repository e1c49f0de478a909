//! Ref-counted symbol interning
//!
//! A [`Symbol`] is a stable identity for a piece of text. Interning the same
//! text twice yields the same symbol and bumps its reference count; the entry
//! disappears once every reference has been released. Each entry carries a
//! precomputed bucket hash that the class and slot-name tables scale into
//! their own bucket ranges.

use rustc_hash::FxHashMap;

/// Default number of hash buckets for symbol hash values
pub const DEFAULT_SYMBOL_TABLE_SIZE: u32 = 1021;

/// Interned text handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
    /// Raw slot of this symbol inside its table
    pub fn index(self) -> u32 {
        self.0
    }
}

#[derive(Debug)]
struct SymbolEntry {
    text: Box<str>,
    hash: u32,
    count: u32,
}

/// Compute the bucket hash of `text` modulo `range`
///
/// `h = h * 127 + byte` over the UTF-8 bytes, wrapping, then reduced.
pub fn hash_text(text: &str, range: u32) -> u32 {
    let tally = text
        .bytes()
        .fold(0u64, |tally, b| tally.wrapping_mul(127).wrapping_add(b as u64));
    (tally % range.max(1) as u64) as u32
}

/// Table of interned, reference-counted symbols
#[derive(Debug)]
pub struct SymbolTable {
    entries: Vec<Option<SymbolEntry>>,
    free: Vec<u32>,
    by_text: FxHashMap<Box<str>, Symbol>,
    size: u32,
}

impl SymbolTable {
    /// Create a table whose hashes fall in `0..size`
    pub fn new(size: u32) -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            by_text: FxHashMap::default(),
            size: size.max(1),
        }
    }

    /// Intern `text`, creating it with one reference or adding a reference
    pub fn intern(&mut self, text: &str) -> Symbol {
        if let Some(&sym) = self.by_text.get(text) {
            self.retain(sym);
            return sym;
        }

        let entry = SymbolEntry {
            text: text.into(),
            hash: hash_text(text, self.size),
            count: 1,
        };
        let sym = match self.free.pop() {
            Some(slot) => {
                self.entries[slot as usize] = Some(entry);
                Symbol(slot)
            }
            None => {
                self.entries.push(Some(entry));
                Symbol(self.entries.len() as u32 - 1)
            }
        };
        self.by_text.insert(text.into(), sym);
        sym
    }

    /// Look up `text` without touching reference counts
    pub fn find(&self, text: &str) -> Option<Symbol> {
        self.by_text.get(text).copied()
    }

    /// Add a reference to a live symbol
    pub fn retain(&mut self, sym: Symbol) {
        if let Some(Some(entry)) = self.entries.get_mut(sym.0 as usize) {
            entry.count += 1;
        }
    }

    /// Drop a reference; returns `true` when the entry was removed
    pub fn release(&mut self, sym: Symbol) -> bool {
        let Some(slot) = self.entries.get_mut(sym.0 as usize) else {
            return false;
        };
        let Some(entry) = slot.as_mut() else {
            return false;
        };
        entry.count = entry.count.saturating_sub(1);
        if entry.count > 0 {
            return false;
        }
        if let Some(entry) = slot.take() {
            self.by_text.remove(&entry.text);
        }
        self.free.push(sym.0);
        true
    }

    /// Text of a live symbol
    pub fn get(&self, sym: Symbol) -> Option<&str> {
        self.entry(sym).map(|e| &*e.text)
    }

    /// Text of a symbol, empty if it has been released
    pub fn text(&self, sym: Symbol) -> &str {
        self.get(sym).unwrap_or("")
    }

    /// Precomputed bucket hash of a symbol
    pub fn bucket(&self, sym: Symbol) -> u32 {
        self.entry(sym).map_or(0, |e| e.hash)
    }

    /// Current reference count of a symbol (0 if released)
    pub fn count(&self, sym: Symbol) -> u32 {
        self.entry(sym).map_or(0, |e| e.count)
    }

    /// Number of live symbols
    pub fn len(&self) -> usize {
        self.by_text.len()
    }

    /// True if no symbol is live
    pub fn is_empty(&self) -> bool {
        self.by_text.is_empty()
    }

    fn entry(&self, sym: Symbol) -> Option<&SymbolEntry> {
        self.entries.get(sym.0 as usize).and_then(Option::as_ref)
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new(DEFAULT_SYMBOL_TABLE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_returns_same_symbol() {
        let mut table = SymbolTable::default();
        let a = table.intern("width");
        let b = table.intern("width");
        assert_eq!(a, b);
        assert_eq!(table.count(a), 2);
        assert_eq!(table.text(a), "width");
    }

    #[test]
    fn test_find_has_no_side_effects() {
        let mut table = SymbolTable::default();
        assert!(table.find("width").is_none());
        let a = table.intern("width");
        assert_eq!(table.find("width"), Some(a));
        assert_eq!(table.count(a), 1);
    }

    #[test]
    fn test_release_removes_at_zero() {
        let mut table = SymbolTable::default();
        let a = table.intern("width");
        table.retain(a);
        assert!(!table.release(a));
        assert!(table.release(a));
        assert!(table.find("width").is_none());
        assert_eq!(table.get(a), None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_released_slot_reused() {
        let mut table = SymbolTable::default();
        let a = table.intern("a");
        table.release(a);
        let b = table.intern("b");
        assert_eq!(a.index(), b.index());
        assert_eq!(table.text(b), "b");
    }

    #[test]
    fn test_bucket_hash_is_stable() {
        let mut table = SymbolTable::new(167);
        let a = table.intern("height");
        assert_eq!(table.bucket(a), hash_text("height", 167));
        assert!(table.bucket(a) < 167);
    }
}
