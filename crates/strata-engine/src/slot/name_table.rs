//! Slot-name table
//!
//! Canonicalizes slot names to small ids unique across the environment.
//! Entries are reference counted by the slot descriptors that use them and
//! removed at zero. New names take the smallest id not in use.

use crate::class::scaled_bucket;
use crate::error::{ClassError, ClassResult};
use crate::slot::SlotNameId;
use std::collections::BTreeSet;
use strata_common::{Symbol, SymbolTable};

/// Prefix of the derived put-handler name
pub const PUT_PREFIX: &str = "put-";

/// Number of distinct slot-name ids
pub const MAX_SLOT_NAMES: usize = u16::MAX as usize + 1;

/// One registered slot name
#[derive(Debug, Clone)]
pub struct SlotNameEntry {
    pub(crate) id: SlotNameId,
    pub(crate) name: Symbol,
    pub(crate) put_handler_name: Symbol,
    pub(crate) use_count: u32,
    pub(crate) bucket: usize,
}

impl SlotNameEntry {
    /// Slot-name id
    pub fn id(&self) -> SlotNameId {
        self.id
    }

    /// Interned name
    pub fn name(&self) -> Symbol {
        self.name
    }

    /// Interned `put-<name>` handler name
    pub fn put_handler_name(&self) -> Symbol {
        self.put_handler_name
    }

    /// Number of slot descriptors using this name
    pub fn use_count(&self) -> u32 {
        self.use_count
    }

    /// Hash bucket of the entry
    pub fn bucket(&self) -> usize {
        self.bucket
    }
}

/// Environment-wide slot-name table
#[derive(Debug)]
pub struct SlotNameTable {
    entries: Vec<Option<SlotNameEntry>>,
    buckets: Vec<Vec<SlotNameId>>,
    free: BTreeSet<u16>,
}

#[cold]
fn fatal(message: String) -> ! {
    tracing::error!(%message, "slot-name table invariant violated");
    panic!("{}", message);
}

impl SlotNameTable {
    /// Create a table with `size` hash buckets
    pub fn new(size: u32) -> Self {
        Self {
            entries: Vec::new(),
            buckets: vec![Vec::new(); size.max(1) as usize],
            free: BTreeSet::new(),
        }
    }

    /// Register a use of `name`, creating the entry on first use
    pub fn intern(&mut self, symbols: &mut SymbolTable, name: &str) -> ClassResult<SlotNameId> {
        if let Some(id) = self.find(symbols, name) {
            self.retain(id);
            return Ok(id);
        }
        let id = self.next_id()?;
        Ok(self.create(symbols, name, id))
    }

    /// Id the next new name will receive
    pub fn next_id(&self) -> ClassResult<SlotNameId> {
        if let Some(&id) = self.free.first() {
            return Ok(SlotNameId(id));
        }
        if self.entries.len() >= MAX_SLOT_NAMES {
            return Err(ClassError::SlotNamesExhausted);
        }
        Ok(SlotNameId(self.entries.len() as u16))
    }

    /// Fail unless every unregistered name in `names` can get an id
    pub fn reserve<'a>(
        &self,
        symbols: &SymbolTable,
        names: impl IntoIterator<Item = &'a str>,
    ) -> ClassResult<()> {
        let needed = names
            .into_iter()
            .filter(|name| self.find(symbols, name).is_none())
            .count();
        let available = self.free.len() + (MAX_SLOT_NAMES - self.entries.len());
        if needed > available {
            return Err(ClassError::SlotNamesExhausted);
        }
        Ok(())
    }

    /// Register a use of `name` under a caller-chosen id
    ///
    /// # Panics
    ///
    /// Panics if `name` is registered under a different id, or `id` is held
    /// by a different name. Continuing would break every slot-name map.
    pub fn intern_with_id(
        &mut self,
        symbols: &mut SymbolTable,
        name: &str,
        id: SlotNameId,
    ) -> SlotNameId {
        if let Some(existing) = self.find(symbols, name) {
            if existing != id {
                fatal(format!(
                    "slot name {} is registered as id {} but id {} was requested",
                    name, existing.0, id.0
                ));
            }
            self.retain(existing);
            return existing;
        }
        if let Some(holder) = self.get(id) {
            fatal(format!(
                "slot-name id {} requested for {} is held by {}",
                id.0,
                name,
                symbols.text(holder.name)
            ));
        }
        self.create(symbols, name, id)
    }

    /// True if registering `name` as `id` would violate the table invariant
    pub fn conflicts(&self, symbols: &SymbolTable, name: &str, id: SlotNameId) -> bool {
        match self.find(symbols, name) {
            Some(existing) => existing != id,
            None => self.get(id).is_some(),
        }
    }

    fn create(&mut self, symbols: &mut SymbolTable, name: &str, id: SlotNameId) -> SlotNameId {
        let name_sym = symbols.intern(name);
        let put_sym = symbols.intern(&format!("{}{}", PUT_PREFIX, name));
        let bucket = scaled_bucket(symbols.bucket(name_sym), self.buckets.len() as u32);

        let idx = id.index();
        if idx >= self.entries.len() {
            for hole in self.entries.len()..idx {
                self.free.insert(hole as u16);
            }
            self.entries.resize_with(idx + 1, || None);
        } else {
            self.free.remove(&id.0);
        }
        self.entries[idx] = Some(SlotNameEntry {
            id,
            name: name_sym,
            put_handler_name: put_sym,
            use_count: 1,
            bucket,
        });
        self.buckets[bucket].push(id);
        tracing::debug!(slot = name, id = id.0, "slot name registered");
        id
    }

    /// Add a use to an existing entry
    pub fn retain(&mut self, id: SlotNameId) {
        if let Some(Some(entry)) = self.entries.get_mut(id.index()) {
            entry.use_count += 1;
        }
    }

    /// Drop a use; at zero the entry and its symbols are released
    ///
    /// Returns `true` when the entry was removed.
    pub fn release(&mut self, symbols: &mut SymbolTable, id: SlotNameId) -> bool {
        let Some(slot) = self.entries.get_mut(id.index()) else {
            return false;
        };
        let Some(entry) = slot.as_mut() else {
            return false;
        };
        entry.use_count = entry.use_count.saturating_sub(1);
        if entry.use_count > 0 {
            return false;
        }
        let Some(entry) = slot.take() else {
            return false;
        };
        self.buckets[entry.bucket].retain(|&i| i != id);
        tracing::debug!(slot = symbols.text(entry.name), id = id.0, "slot name removed");
        symbols.release(entry.name);
        symbols.release(entry.put_handler_name);

        self.free.insert(id.0);
        while matches!(self.entries.last(), Some(None)) {
            self.entries.pop();
            self.free.remove(&(self.entries.len() as u16));
        }
        true
    }

    /// Id of a registered name, without side effects
    pub fn find(&self, symbols: &SymbolTable, name: &str) -> Option<SlotNameId> {
        let sym = symbols.find(name)?;
        let bucket = scaled_bucket(symbols.bucket(sym), self.buckets.len() as u32);
        self.buckets[bucket]
            .iter()
            .copied()
            .find(|&id| self.get(id).is_some_and(|e| e.name == sym))
    }

    /// Entry by id
    pub fn get(&self, id: SlotNameId) -> Option<&SlotNameEntry> {
        self.entries.get(id.index()).and_then(Option::as_ref)
    }

    /// Largest registered id
    pub fn max_id(&self) -> Option<SlotNameId> {
        self.entries
            .len()
            .checked_sub(1)
            .map(|i| SlotNameId(i as u16))
    }

    /// Registered entries in id order
    pub fn iter(&self) -> impl Iterator<Item = &SlotNameEntry> {
        self.entries.iter().filter_map(Option::as_ref)
    }

    /// Number of registered names
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// True if no name is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
