//! Modules
//!
//! Every class belongs to one module. Module `MAIN` always exists with id 0.
//! A module lists its classes in definition order, which is also the order
//! classes are written to a binary image.

use crate::class::ClassId;
use strata_common::{Symbol, SymbolTable};

/// Name of the module every environment starts with
pub const MAIN_MODULE: &str = "MAIN";

/// Module index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub(crate) u16);

impl ModuleId {
    /// The `MAIN` module
    pub const MAIN: ModuleId = ModuleId(0);

    /// Id as an array index
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A module and its classes
#[derive(Debug)]
pub struct ModuleDef {
    pub(crate) name: Symbol,
    pub(crate) classes: Vec<ClassId>,
}

impl ModuleDef {
    /// Interned module name
    pub fn name(&self) -> Symbol {
        self.name
    }

    /// Classes in definition order
    pub fn classes(&self) -> &[ClassId] {
        &self.classes
    }
}

/// All modules of an environment
#[derive(Debug)]
pub struct ModuleTable {
    modules: Vec<ModuleDef>,
}

impl ModuleTable {
    /// Table holding only `MAIN`
    pub fn new(symbols: &mut SymbolTable) -> Self {
        Self {
            modules: vec![ModuleDef {
                name: symbols.intern(MAIN_MODULE),
                classes: Vec::new(),
            }],
        }
    }

    /// Add a module, or return the existing one with this name
    pub fn define(&mut self, symbols: &mut SymbolTable, name: &str) -> ModuleId {
        if let Some(id) = self.find(symbols, name) {
            return id;
        }
        self.modules.push(ModuleDef {
            name: symbols.intern(name),
            classes: Vec::new(),
        });
        ModuleId(self.modules.len() as u16 - 1)
    }

    /// Module by name
    pub fn find(&self, symbols: &SymbolTable, name: &str) -> Option<ModuleId> {
        let sym = symbols.find(name)?;
        self.modules
            .iter()
            .position(|m| m.name == sym)
            .map(|i| ModuleId(i as u16))
    }

    /// Module by id
    pub fn get(&self, id: ModuleId) -> Option<&ModuleDef> {
        self.modules.get(id.index())
    }

    pub(crate) fn push_class(&mut self, id: ModuleId, class: ClassId) {
        if let Some(module) = self.modules.get_mut(id.index()) {
            module.classes.push(class);
        }
    }

    pub(crate) fn remove_class(&mut self, id: ModuleId, class: ClassId) {
        if let Some(module) = self.modules.get_mut(id.index()) {
            module.classes.retain(|&c| c != class);
        }
    }

    pub(crate) fn clear_classes(&mut self) {
        for module in &mut self.modules {
            module.classes.clear();
        }
    }

    /// Modules in id order
    pub fn iter(&self) -> impl Iterator<Item = (ModuleId, &ModuleDef)> {
        self.modules
            .iter()
            .enumerate()
            .map(|(i, m)| (ModuleId(i as u16), m))
    }

    /// Number of modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Always false; `MAIN` exists
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_exists() {
        let mut symbols = SymbolTable::default();
        let modules = ModuleTable::new(&mut symbols);
        assert_eq!(modules.find(&symbols, MAIN_MODULE), Some(ModuleId::MAIN));
        assert_eq!(modules.len(), 1);
    }

    #[test]
    fn test_define_is_idempotent() {
        let mut symbols = SymbolTable::default();
        let mut modules = ModuleTable::new(&mut symbols);
        let a = modules.define(&mut symbols, "SHAPES");
        let b = modules.define(&mut symbols, "SHAPES");
        assert_eq!(a, b);
        assert_eq!(a, ModuleId(1));
        assert_eq!(symbols.count(modules.get(a).unwrap().name()), 1);
    }
}
