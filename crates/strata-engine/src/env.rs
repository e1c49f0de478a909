//! The environment context
//!
//! All class runtime state lives in one [`Environment`] that is passed
//! explicitly to every operation.

use crate::class::{ClassDef, ClassId, ClassIdMap, ClassTable, TraversalId, TraversalPool};
use crate::error::{ClassError, ClassResult};
use crate::image::ImageCounts;
use crate::module::{ModuleId, ModuleTable};
use crate::options::EnvOptions;
use crate::slot::{SlotDescriptor, SlotNameId, SlotNameTable, SlotRef};
use strata_common::{Bitmap, BitmapTable, SymbolTable};

/// One class runtime instance
#[derive(Debug)]
pub struct Environment {
    pub(crate) options: EnvOptions,
    pub(crate) symbols: SymbolTable,
    pub(crate) bitmaps: BitmapTable,
    pub(crate) modules: ModuleTable,
    pub(crate) classes: ClassIdMap,
    pub(crate) class_table: ClassTable,
    pub(crate) slot_names: SlotNameTable,
    pub(crate) traversals: TraversalPool,
    pub(crate) loaded_image: Option<ImageCounts>,
}

impl Environment {
    /// Environment with default options and no classes
    pub fn new() -> Self {
        Self::build(EnvOptions::default())
    }

    /// Environment with validated options
    ///
    /// Installs the system classes when the options ask for them.
    pub fn with_options(options: EnvOptions) -> ClassResult<Self> {
        options.validate()?;
        let create_system = options.create_system_classes;
        let mut env = Self::build(options);
        if create_system {
            env.create_system_classes()?;
        }
        Ok(env)
    }

    fn build(options: EnvOptions) -> Self {
        let mut symbols = SymbolTable::new(options.symbol_table_size);
        let modules = ModuleTable::new(&mut symbols);
        Self {
            classes: ClassIdMap::new(options.class_id_chunk),
            class_table: ClassTable::new(options.class_table_size),
            slot_names: SlotNameTable::new(options.slot_name_table_size),
            traversals: TraversalPool::new(options.max_traversals),
            bitmaps: BitmapTable::new(),
            loaded_image: None,
            modules,
            symbols,
            options,
        }
    }

    /// Options in effect
    pub fn options(&self) -> &EnvOptions {
        &self.options
    }

    /// Symbol table
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Bitmap table
    pub fn bitmaps(&self) -> &BitmapTable {
        &self.bitmaps
    }

    /// Module table
    pub fn modules(&self) -> &ModuleTable {
        &self.modules
    }

    /// Class id map
    pub fn class_map(&self) -> &ClassIdMap {
        &self.classes
    }

    /// Slot-name table
    pub fn slot_names(&self) -> &SlotNameTable {
        &self.slot_names
    }

    /// Counts of the loaded binary image, if one is loaded
    pub fn loaded_image(&self) -> Option<&ImageCounts> {
        self.loaded_image.as_ref()
    }

    /// Define a module, or return the existing one
    ///
    /// A new module is added to the scope of every system class.
    pub fn define_module(&mut self, name: &str) -> ModuleId {
        let before = self.modules.len();
        let id = self.modules.define(&mut self.symbols, name);
        if self.modules.len() > before {
            self.widen_system_scopes(id);
        }
        id
    }

    fn widen_system_scopes(&mut self, module: ModuleId) {
        let system: Vec<ClassId> = self
            .classes
            .iter()
            .filter(|def| def.is_system())
            .map(ClassDef::id)
            .collect();
        for id in system {
            let Some(old) = self.classes.get(id).map(|def| def.scope) else {
                continue;
            };
            let mut scope = self.bitmaps.get(old).cloned().unwrap_or_default();
            scope.set(module.index());
            let new = self.bitmaps.add(scope);
            self.bitmaps.release(old);
            if let Some(def) = self.classes.get_mut(id) {
                def.scope = new;
            }
        }
    }

    /// Class id by name, without side effects
    pub fn find_class(&self, name: &str) -> Option<ClassId> {
        let sym = self.symbols.find(name)?;
        self.class_table.find(sym, self.symbols.bucket(sym))
    }

    /// Class by id
    pub fn class(&self, id: ClassId) -> Option<&ClassDef> {
        self.classes.get(id)
    }

    /// Class by name
    pub fn class_by_name(&self, name: &str) -> Option<&ClassDef> {
        self.find_class(name).and_then(|id| self.classes.get(id))
    }

    /// Name of a class, empty for an unknown id
    pub fn class_name(&self, id: ClassId) -> &str {
        self.classes
            .get(id)
            .map_or("", |def| self.symbols.text(def.name))
    }

    /// Number of defined classes
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Defined class ids in module and definition order
    pub fn class_ids(&self) -> Vec<ClassId> {
        self.modules
            .iter()
            .flat_map(|(_, m)| m.classes().iter().copied())
            .collect()
    }

    /// Register a use of a slot name
    pub fn intern_slot_name(&mut self, name: &str) -> ClassResult<SlotNameId> {
        self.slot_names.intern(&mut self.symbols, name)
    }

    /// Drop a use of a slot name
    pub fn release_slot_name(&mut self, id: SlotNameId) -> bool {
        self.slot_names.release(&mut self.symbols, id)
    }

    /// Id of a registered slot name
    pub fn find_slot_name(&self, name: &str) -> Option<SlotNameId> {
        self.slot_names.find(&self.symbols, name)
    }

    /// Text of a registered slot name
    pub fn slot_name_text(&self, id: SlotNameId) -> &str {
        self.slot_names
            .get(id)
            .map_or("", |e| self.symbols.text(e.name))
    }

    /// Descriptor behind a slot reference
    pub fn slot(&self, slot: SlotRef) -> Option<&SlotDescriptor> {
        self.classes
            .get(slot.class)
            .and_then(|def| def.slots.get(slot.index as usize))
    }

    pub(crate) fn require_class(&self, name: &str) -> ClassResult<ClassId> {
        self.find_class(name)
            .ok_or_else(|| ClassError::UnknownClass(name.to_string()))
    }

    pub(crate) fn def(&self, id: ClassId) -> ClassResult<&ClassDef> {
        self.classes
            .get(id)
            .ok_or_else(|| ClassError::UnknownClass(format!("#{}", id.raw())))
    }

    /// Lease a traversal id and clear it on every class
    pub fn acquire_traversal(&mut self) -> ClassResult<TraversalId> {
        let id = self.traversals.acquire()?;
        for def in self.classes.iter_mut() {
            def.traversal.clear(id);
        }
        Ok(id)
    }

    /// Return the innermost traversal id
    pub fn release_traversal(&mut self, id: TraversalId) -> ClassResult<()> {
        self.traversals.release(id)
    }

    /// Collect subclasses of `root`, each once, in depth-first order
    pub(crate) fn collect_subclasses(
        &mut self,
        root: ClassId,
        inherit: bool,
    ) -> ClassResult<Vec<ClassId>> {
        let tvid = self.acquire_traversal()?;
        let mut out = Vec::new();
        self.walk_subclasses(root, inherit, tvid, &mut out);
        self.release_traversal(tvid)?;
        Ok(out)
    }

    fn walk_subclasses(
        &mut self,
        cls: ClassId,
        inherit: bool,
        tvid: TraversalId,
        out: &mut Vec<ClassId>,
    ) {
        let subs = match self.classes.get(cls) {
            Some(def) => def.direct_subclasses.as_slice().to_vec(),
            None => return,
        };
        for sub in subs {
            let Some(def) = self.classes.get_mut(sub) else {
                continue;
            };
            if def.traversal.test(tvid) {
                continue;
            }
            def.traversal.set(tvid);
            out.push(sub);
            if inherit {
                self.walk_subclasses(sub, inherit, tvid, out);
            }
        }
    }

    /// Set the bits of `root` and every transitive subclass in `map`
    pub fn mark_bitmap_subclasses(
        &mut self,
        map: &mut Bitmap,
        root: ClassId,
        set: bool,
    ) -> ClassResult<()> {
        let mut marked = vec![root];
        marked.extend(self.collect_subclasses(root, true)?);
        for cls in marked {
            if set {
                map.set(cls.index());
            } else {
                map.clear(cls.index());
            }
        }
        Ok(())
    }

    /// Bitmap of `root` and all its subclasses, keyed by class id
    pub fn subclass_bitmap(&mut self, root: ClassId) -> ClassResult<Bitmap> {
        let mut map = Bitmap::new();
        self.mark_bitmap_subclasses(&mut map, root, true)?;
        Ok(map)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassBuilder;

    #[test]
    fn test_new_environment_is_empty() {
        let env = Environment::new();
        assert_eq!(env.class_count(), 0);
        assert!(env.find_class("A").is_none());
        assert_eq!(env.modules().len(), 1);
    }

    #[test]
    fn test_with_options_rejects_invalid() {
        let options = EnvOptions {
            class_table_size: 0,
            ..EnvOptions::default()
        };
        assert!(matches!(
            Environment::with_options(options),
            Err(ClassError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_subclass_walk_visits_diamond_once() {
        let mut env = Environment::new();
        let a = env.define_class(ClassBuilder::new("A")).unwrap();
        let b = env.define_class(ClassBuilder::new("B").superclass("A")).unwrap();
        let c = env.define_class(ClassBuilder::new("C").superclass("A")).unwrap();
        let d = env
            .define_class(ClassBuilder::new("D").superclass("B").superclass("C"))
            .unwrap();
        let subs = env.collect_subclasses(a, true).unwrap();
        assert_eq!(subs, vec![b, d, c]);
        assert_eq!(env.traversals.in_use(), 0);
    }

    #[test]
    fn test_subclass_bitmap() {
        let mut env = Environment::new();
        let a = env.define_class(ClassBuilder::new("A")).unwrap();
        env.define_class(ClassBuilder::new("X")).unwrap();
        let b = env.define_class(ClassBuilder::new("B").superclass("A")).unwrap();
        let map = env.subclass_bitmap(a).unwrap();
        assert!(map.test(a.index()));
        assert!(map.test(b.index()));
        assert_eq!(map.count_ones(), 2);
    }

    #[test]
    fn test_system_scope_covers_later_modules() {
        let options = EnvOptions {
            create_system_classes: true,
            ..EnvOptions::default()
        };
        let mut env = Environment::with_options(options).unwrap();
        let shapes = env.define_module("SHAPES");
        let user = env.class_by_name("USER").unwrap().scope();
        let map = env.bitmaps().get(user).unwrap();
        assert!(map.test(ModuleId::MAIN.index()));
        assert!(map.test(shapes.index()));

        let p = env
            .define_class(ClassBuilder::new("P").module("SHAPES"))
            .unwrap();
        let scope = env.class(p).unwrap().scope();
        assert_eq!(env.bitmaps().get(scope).unwrap().count_ones(), 1);
    }

    #[test]
    fn test_nested_traversals_exhaust_pool() {
        let options = EnvOptions {
            max_traversals: 1,
            ..EnvOptions::default()
        };
        let mut env = Environment::with_options(options).unwrap();
        let a = env.define_class(ClassBuilder::new("A")).unwrap();
        let held = env.acquire_traversal().unwrap();
        assert_eq!(
            env.collect_subclasses(a, true),
            Err(ClassError::TraversalExhausted(1))
        );
        env.release_traversal(held).unwrap();
        assert!(env.collect_subclasses(a, true).is_ok());
    }
}
