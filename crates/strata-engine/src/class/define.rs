//! Class definition, installation and removal
//!
//! A class is built completely (name, slots, handlers, links, template)
//! before it is installed: installation enters it into the id map, the
//! class table, its module and the subclass lists of its superclasses.
//! Removal runs the mirror steps and then releases every reference the
//! class held.

use super::def::{ClassDef, ClassFlags};
use super::links::{LinkPosition, PackedLinks};
use super::system::USER_CLASS;
use super::traversal::TraversalMarks;
use super::{linearize, ClassId};
use crate::env::Environment;
use crate::error::{ClassError, ClassResult};
use crate::handler::{build_order_map, Handler, HandlerBuilder};
use crate::module::ModuleId;
use crate::slot::{
    build_slot_name_map, build_template, SlotBuilder, SlotDescriptor, PUT_PREFIX,
};
use strata_common::Bitmap;
use tracing::{debug, warn};

/// Class declaration consumed by [`Environment::define_class`]
#[derive(Debug, Clone)]
pub struct ClassBuilder {
    pub(crate) name: String,
    pub(crate) module: Option<String>,
    pub(crate) superclasses: Vec<String>,
    pub(crate) flags: ClassFlags,
    pub(crate) slots: Vec<SlotBuilder>,
    pub(crate) handlers: Vec<HandlerBuilder>,
}

impl ClassBuilder {
    /// Concrete, reactive class in `MAIN`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: None,
            superclasses: Vec::new(),
            flags: ClassFlags::REACTIVE,
            slots: Vec::new(),
            handlers: Vec::new(),
        }
    }

    /// Place the class in a module
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Append a direct superclass
    pub fn superclass(mut self, name: impl Into<String>) -> Self {
        self.superclasses.push(name.into());
        self
    }

    /// Forbid direct instances (abstract classes are never reactive)
    pub fn abstract_class(mut self) -> Self {
        self.flags |= ClassFlags::ABSTRACT;
        self.flags -= ClassFlags::REACTIVE;
        self
    }

    /// Exclude direct instances from pattern matching
    pub fn non_reactive(mut self) -> Self {
        self.flags -= ClassFlags::REACTIVE;
        self
    }

    pub(crate) fn system(mut self) -> Self {
        self.flags |= ClassFlags::SYSTEM;
        self
    }

    /// Declare a local slot
    pub fn slot(mut self, slot: SlotBuilder) -> Self {
        self.slots.push(slot);
        self
    }

    /// Declare a handler
    pub fn handler(mut self, handler: HandlerBuilder) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Class name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Environment {
    /// Define a class
    ///
    /// An existing class of the same name is replaced only if it is a
    /// deletable leaf. User classes declared without superclasses inherit
    /// from `USER` when the system classes are installed.
    pub fn define_class(&mut self, builder: ClassBuilder) -> ClassResult<ClassId> {
        if self.loaded_image.is_some() {
            return Err(ClassError::ImageActive);
        }
        let is_system = builder.flags.contains(ClassFlags::SYSTEM);

        let module = match &builder.module {
            Some(m) => self
                .modules
                .find(&self.symbols, m)
                .ok_or_else(|| ClassError::UnknownModule(m.clone()))?,
            None => ModuleId::MAIN,
        };

        let existing = self.find_class(&builder.name);
        if let Some(old) = existing {
            self.check_redefinable(old, &builder.name)?;
        }

        let supers = self.resolve_superclasses(&builder, is_system)?;

        for (i, slot) in builder.slots.iter().enumerate() {
            if builder.slots[..i].iter().any(|s| s.name == slot.name) {
                return Err(ClassError::DuplicateSlot {
                    class: builder.name.clone(),
                    slot: slot.name.clone(),
                });
            }
        }

        let parent_lists: Vec<&[ClassId]> = supers
            .iter()
            .filter_map(|&s| self.classes.get(s))
            .map(|def| def.all_superclasses())
            .collect();
        let ancestors = linearize(&supers, &parent_lists)
            .ok_or_else(|| ClassError::InconsistentPrecedence(builder.name.clone()))?;

        self.slot_names
            .reserve(&self.symbols, builder.slots.iter().map(|s| s.name.as_str()))?;

        // a redefined class keeps its id
        let id = match existing {
            Some(old) => old,
            None => self.classes.next_id()?,
        };
        if let Some(old) = existing {
            debug!(class = %builder.name, "redefining class");
            self.remove_class(old);
        }

        let def = self.build_class(id, module, &builder, supers, ancestors)?;
        let slot_count = def.slots.len();
        let template_len = def.instance_template.len();
        self.install_class(def);

        debug!(
            class = %builder.name,
            id = id.raw(),
            slots = slot_count,
            template = template_len,
            "class defined"
        );
        Ok(id)
    }

    fn check_redefinable(&self, old: ClassId, name: &str) -> ClassResult<()> {
        let def = self.def(old)?;
        if def.is_system() {
            return Err(ClassError::SystemClass(name.to_string()));
        }
        if !def.direct_subclasses.is_empty() {
            return Err(ClassError::AlreadyDefined(name.to_string()));
        }
        if self.is_class_being_used(old) {
            return Err(ClassError::ClassInUse(name.to_string()));
        }
        Ok(())
    }

    fn resolve_superclasses(
        &self,
        builder: &ClassBuilder,
        is_system: bool,
    ) -> ClassResult<Vec<ClassId>> {
        let mut names: Vec<&str> = builder.superclasses.iter().map(String::as_str).collect();
        if names.is_empty() && !is_system && self.find_class(USER_CLASS).is_some() {
            names.push(USER_CLASS);
        }

        let mut supers = Vec::with_capacity(names.len());
        for name in names {
            let id = if name == builder.name {
                None
            } else {
                self.find_class(name)
            };
            let id = id.ok_or_else(|| ClassError::UnknownSuperclass {
                class: builder.name.clone(),
                superclass: name.to_string(),
            })?;
            if supers.contains(&id) {
                return Err(ClassError::DuplicateSuperclass {
                    class: builder.name.clone(),
                    superclass: name.to_string(),
                });
            }
            supers.push(id);
        }
        Ok(supers)
    }

    fn build_class(
        &mut self,
        id: ClassId,
        module: ModuleId,
        builder: &ClassBuilder,
        supers: Vec<ClassId>,
        ancestors: Vec<ClassId>,
    ) -> ClassResult<ClassDef> {
        let name = self.symbols.intern(&builder.name);

        let mut slots = Vec::with_capacity(builder.slots.len());
        for sb in &builder.slots {
            let slot_name = self.slot_names.intern(&mut self.symbols, &sb.name)?;
            let override_message = match &sb.override_message {
                Some(message) => self.symbols.intern(message),
                None => {
                    let put = self
                        .slot_names
                        .get(slot_name)
                        .map(|e| e.put_handler_name);
                    match put {
                        Some(put) => {
                            self.symbols.retain(put);
                            put
                        }
                        None => self.symbols.intern(&format!("{}{}", PUT_PREFIX, sb.name)),
                    }
                }
            };
            slots.push(SlotDescriptor {
                class: id,
                name: slot_name,
                facets: sb.facets,
                default: sb.default.clone().unwrap_or_else(|| sb.derived_default()),
                constraint: sb.constraint.clone(),
                override_message,
            });
        }

        let mut precedence = Vec::with_capacity(ancestors.len() + 1);
        precedence.push(id);
        precedence.extend(ancestors);

        let instance_template = build_template(id, &slots, &precedence, &self.classes);
        let names: Vec<_> = instance_template
            .iter()
            .filter_map(|r| {
                let owner_slots = if r.class == id {
                    Some(slots.as_slice())
                } else {
                    self.classes.get(r.class).map(|d| d.slots.as_slice())
                };
                owner_slots.and_then(|s| s.get(r.index as usize)).map(|s| s.name)
            })
            .collect();
        let slot_name_map = build_slot_name_map(&names);

        let mut handlers: Vec<Handler> = Vec::with_capacity(builder.handlers.len());
        for hb in &builder.handlers {
            let handler = self.make_handler(id, hb);
            match handlers
                .iter()
                .position(|h| h.name == handler.name && h.kind == handler.kind)
            {
                Some(pos) => {
                    let old = std::mem::replace(&mut handlers[pos], handler);
                    self.symbols.release(old.name);
                }
                None => handlers.push(handler),
            }
        }
        let handler_order = build_order_map(&handlers, &self.symbols);

        // system classes are visible from every module
        let scope = if builder.flags.contains(ClassFlags::SYSTEM) {
            let mut all = Bitmap::new();
            for (m, _) in self.modules.iter() {
                all.set(m.index());
            }
            all
        } else {
            Bitmap::with_bit(module.index())
        };

        Ok(ClassDef {
            name,
            id,
            module,
            flags: builder.flags,
            direct_superclasses: PackedLinks::from_vec(supers),
            direct_subclasses: PackedLinks::new(),
            all_superclasses: PackedLinks::from_vec(precedence),
            slots,
            instance_template,
            slot_name_map,
            handlers,
            handler_order,
            busy: 0,
            traversal: TraversalMarks::default(),
            scope: self.bitmaps.add(scope),
        })
    }

    pub(crate) fn make_handler(&mut self, class: ClassId, hb: &HandlerBuilder) -> Handler {
        Handler {
            class,
            name: self.symbols.intern(&hb.name),
            kind: hb.kind,
            system: hb.system,
            min_params: hb.min_params,
            max_params: hb.max_params,
            local_var_count: hb.local_var_count,
            actions: hb.actions.clone(),
            busy: 0,
        }
    }

    /// Enter a fully built class into every index
    pub(crate) fn install_class(&mut self, def: ClassDef) {
        let id = def.id;
        let name = def.name;
        let module = def.module;
        let supers = def.direct_superclasses.as_slice().to_vec();

        self.classes.insert(def);
        self.class_table.add(name, self.symbols.bucket(name), id);
        self.modules.push_class(module, id);
        for sup in supers {
            if let Some(parent) = self.classes.get_mut(sup) {
                parent.direct_subclasses.add_link(id, LinkPosition::Append);
            }
        }
    }

    /// Release every reference a class holds
    pub(crate) fn uninstall_class(&mut self, id: ClassId) {
        let Some(def) = self.classes.get(id) else {
            return;
        };
        for slot in &def.slots {
            self.slot_names.release(&mut self.symbols, slot.name);
            self.symbols.release(slot.override_message);
        }
        for handler in &def.handlers {
            self.symbols.release(handler.name);
        }
        self.bitmaps.release(def.scope);
        self.symbols.release(def.name);
    }

    /// Unlink, unindex, uninstall and free a class without checks
    pub(crate) fn remove_class(&mut self, id: ClassId) {
        let Some(def) = self.classes.get(id) else {
            return;
        };
        let name = def.name;
        let module = def.module;
        let supers = def.direct_superclasses.as_slice().to_vec();

        for sup in supers {
            if let Some(parent) = self.classes.get_mut(sup) {
                parent.direct_subclasses.delete_link(id);
            }
        }
        self.class_table.remove(name, self.symbols.bucket(name), id);
        self.modules.remove_class(module, id);
        debug!(class = self.symbols.text(name), id = id.raw(), "class removed");
        self.uninstall_class(id);
        self.classes.remove(id);
    }

    /// True if the class, one of its handlers, or any transitive subclass
    /// is busy
    pub fn is_class_being_used(&self, id: ClassId) -> bool {
        let Some(def) = self.classes.get(id) else {
            return false;
        };
        if def.busy > 0 || def.handlers.iter().any(|h| h.busy > 0) {
            return true;
        }
        def.direct_subclasses
            .iter()
            .any(|sub| self.is_class_being_used(sub))
    }

    /// True if [`Environment::delete_class_and_subclasses`] would succeed
    pub fn is_deletable(&self, id: ClassId) -> bool {
        match self.classes.get(id) {
            Some(def) => {
                self.loaded_image.is_none() && !def.is_system() && !self.is_class_being_used(id)
            }
            None => false,
        }
    }

    /// Delete a class that has no subclasses and is not busy
    pub fn delete_class(&mut self, name: &str) -> ClassResult<()> {
        let id = self.require_class(name)?;
        self.check_deletable(id, name)?;
        if !self.def(id)?.direct_subclasses.is_empty() {
            return Err(ClassError::HasSubclasses(name.to_string()));
        }
        self.remove_class(id);
        Ok(())
    }

    /// Delete a class after deleting all of its subclasses
    pub fn delete_class_and_subclasses(&mut self, name: &str) -> ClassResult<()> {
        let id = self.require_class(name)?;
        self.check_deletable(id, name)?;
        let subs = self.collect_subclasses(id, true)?;
        let system_sub = subs
            .iter()
            .copied()
            .find(|&s| self.classes.get(s).is_some_and(ClassDef::is_system));
        if let Some(sys) = system_sub {
            return Err(ClassError::SystemClass(self.class_name(sys).to_string()));
        }
        self.delete_class_uag(id)
    }

    fn check_deletable(&self, id: ClassId, name: &str) -> ClassResult<()> {
        if self.loaded_image.is_some() {
            return Err(ClassError::ImageActive);
        }
        let def = self.def(id)?;
        if def.is_system() {
            return Err(ClassError::SystemClass(name.to_string()));
        }
        if self.is_class_being_used(id) {
            return Err(ClassError::ClassInUse(name.to_string()));
        }
        Ok(())
    }

    fn delete_class_uag(&mut self, id: ClassId) -> ClassResult<()> {
        loop {
            let (first, before) = match self.classes.get(id) {
                Some(def) => match def.direct_subclasses.as_slice().first() {
                    Some(&sub) => (sub, def.direct_subclasses.len()),
                    None => break,
                },
                None => return Ok(()),
            };
            self.delete_class_uag(first)?;
            let after = self.classes.get(id).map_or(0, |d| d.direct_subclasses.len());
            if after >= before {
                let name = self.class_name(id).to_string();
                warn!(class = %name, "subclass removal did not shrink subclass list");
                return Err(ClassError::DeleteAborted(name));
            }
        }
        self.remove_class(id);
        Ok(())
    }

    /// Remove every deletable user class, subclasses first
    ///
    /// Returns `true` when no user class remains.
    pub fn remove_all_user_classes(&mut self) -> bool {
        if self.loaded_image.is_some() {
            return false;
        }
        let mut ids = self.class_ids();
        ids.reverse();
        for id in ids {
            let Some(def) = self.classes.get(id) else {
                continue;
            };
            if def.is_system() {
                continue;
            }
            if !self.is_deletable(id) {
                warn!(class = self.class_name(id), "class not deletable");
                continue;
            }
            if let Err(err) = self.delete_class_uag(id) {
                warn!(%err, "bulk class removal failed");
            }
        }
        !self.classes.iter().any(|def| !def.is_system())
    }

    /// Mark a class busy
    pub fn increment_busy(&mut self, id: ClassId) -> ClassResult<()> {
        let def = self
            .classes
            .get_mut(id)
            .ok_or_else(|| ClassError::UnknownClass(format!("#{}", id.raw())))?;
        def.busy += 1;
        Ok(())
    }

    /// Release one busy mark
    pub fn decrement_busy(&mut self, id: ClassId) -> ClassResult<()> {
        let def = self
            .classes
            .get_mut(id)
            .ok_or_else(|| ClassError::UnknownClass(format!("#{}", id.raw())))?;
        def.busy = def.busy.saturating_sub(1);
        Ok(())
    }
}
