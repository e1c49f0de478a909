//! Class, slot and handler queries

use super::{DefaultKind, HandlerSummary};
use crate::class::{ClassDef, ClassId};
use crate::env::Environment;
use crate::error::{ClassError, ClassResult};
use crate::handler::{find_handler, HandlerKind};
use crate::slot::{DefaultValue, SlotDescriptor, SlotFacets};
use strata_common::{Evaluator, Value};

impl Environment {
    /// True if a class of this name is defined
    pub fn class_exists(&self, name: &str) -> bool {
        self.find_class(name).is_some()
    }

    /// True if direct instances cannot be created
    pub fn class_abstract(&self, name: &str) -> ClassResult<bool> {
        Ok(self.named(name)?.is_abstract())
    }

    /// True if direct instances can match patterns
    pub fn class_reactive(&self, name: &str) -> ClassResult<bool> {
        Ok(self.named(name)?.is_reactive())
    }

    /// Name of the module that owns the class
    pub fn class_module(&self, name: &str) -> ClassResult<String> {
        let module = self.named(name)?.module();
        Ok(self
            .modules
            .get(module)
            .map_or_else(String::new, |m| self.symbols.text(m.name()).to_string()))
    }

    /// True if `superclass` is a proper ancestor of `class`
    pub fn superclass_p(&self, superclass: &str, class: &str) -> ClassResult<bool> {
        let sup = self.require_class(superclass)?;
        let def = self.named(class)?;
        Ok(def.all_superclasses()[1..].contains(&sup))
    }

    /// True if `subclass` is a proper descendant of `class`
    pub fn subclass_p(&self, subclass: &str, class: &str) -> ClassResult<bool> {
        self.superclass_p(class, subclass)
    }

    /// Superclass names: direct ones, or the whole precedence list minus
    /// the class itself when `inherit` is set
    pub fn class_superclasses(&self, name: &str, inherit: bool) -> ClassResult<Vec<String>> {
        let def = self.named(name)?;
        let ids = if inherit {
            &def.all_superclasses()[1..]
        } else {
            def.direct_superclasses()
        };
        Ok(self.names_of(ids))
    }

    /// Subclass names: direct ones, or every transitive subclass once
    pub fn class_subclasses(&mut self, name: &str, inherit: bool) -> ClassResult<Vec<String>> {
        let id = self.require_class(name)?;
        let ids = if inherit {
            self.collect_subclasses(id, true)?
        } else {
            self.def(id)?.direct_subclasses().to_vec()
        };
        Ok(self.names_of(&ids))
    }

    /// Slot names: local slots, or the full instance template
    pub fn class_slots(&self, name: &str, inherit: bool) -> ClassResult<Vec<String>> {
        let def = self.named(name)?;
        let names = if inherit {
            def.instance_template()
                .iter()
                .filter_map(|&r| self.slot(r))
                .map(|s| self.slot_name_text(s.name()).to_string())
                .collect()
        } else {
            def.slots()
                .iter()
                .map(|s| self.slot_name_text(s.name()).to_string())
                .collect()
        };
        Ok(names)
    }

    /// True if the class has the slot; inherited slots count only with
    /// `inherit`
    pub fn slot_exists(&self, class: &str, slot: &str, inherit: bool) -> ClassResult<bool> {
        let def = self.named(class)?;
        Ok(match self.template_slot(def, slot) {
            Some(sd) => sd.class() == def.id() || inherit,
            None => false,
        })
    }

    /// True if the slot can be written after creation
    pub fn slot_writable(&self, class: &str, slot: &str) -> ClassResult<bool> {
        Ok(self.lookup_slot(class, slot, true, "slot-writablep")?.is_writable())
    }

    /// True if the slot can be written during initialization
    pub fn slot_initable(&self, class: &str, slot: &str) -> ClassResult<bool> {
        Ok(self.lookup_slot(class, slot, true, "slot-initablep")?.is_initable())
    }

    /// True if a locally declared slot is public
    pub fn slot_public(&self, class: &str, slot: &str) -> ClassResult<bool> {
        Ok(self.lookup_slot(class, slot, false, "slot-publicp")?.is_public())
    }

    /// True if handlers of the class may access the slot directly
    pub fn slot_direct_access(&self, class: &str, slot: &str) -> ClassResult<bool> {
        let id = self.require_class(class)?;
        let sd = self.lookup_slot(class, slot, true, "slot-direct-accessp")?;
        Ok(sd.is_public() || sd.class() == id)
    }

    /// Default kind of a locally declared slot
    pub fn slot_default_kind(&self, class: &str, slot: &str) -> ClassResult<DefaultKind> {
        let sd = self.lookup_slot(class, slot, false, "slot-default-p")?;
        Ok(default_kind(sd.default_value()))
    }

    /// Current default value of a slot
    ///
    /// Dynamic defaults are evaluated through `evaluator` on every call.
    /// A slot without a default yields the `?NONE` marker.
    pub fn slot_default_value(
        &self,
        class: &str,
        slot: &str,
        evaluator: &mut dyn Evaluator,
    ) -> ClassResult<Value> {
        let sd = self.lookup_slot(class, slot, true, "slot-default-value")?;
        match sd.default_value() {
            DefaultValue::None => Ok(Value::none_marker()),
            DefaultValue::Static(value) => Ok(value.clone()),
            DefaultValue::Dynamic(expr) => {
                let value = evaluator
                    .evaluate(expr)
                    .map_err(|message| ClassError::Evaluation {
                        slot: slot.to_string(),
                        message,
                    })?;
                Ok(if sd.is_multiple() {
                    value.into_multifield()
                } else {
                    value
                })
            }
        }
    }

    /// The ten facet codes of a slot
    pub fn slot_facets(&self, class: &str, slot: &str) -> ClassResult<Vec<String>> {
        let sd = self.lookup_slot(class, slot, true, "slot-facets")?;
        let pick = |flag: SlotFacets, yes: &'static str, no: &'static str| {
            let code = if sd.facets().contains(flag) { yes } else { no };
            code.to_string()
        };
        Ok(vec![
            pick(SlotFacets::MULTIPLE, "MLT", "SGL"),
            default_kind(sd.default_value()).code().to_string(),
            pick(SlotFacets::NO_INHERIT, "NIL", "INH"),
            access_code(sd).trim().to_string(),
            pick(SlotFacets::SHARED, "SHR", "LCL"),
            pick(SlotFacets::REACTIVE, "RCT", "NIL"),
            pick(SlotFacets::COMPOSITE, "CMP", "EXC"),
            pick(SlotFacets::PUBLIC, "PUB", "PRV"),
            sd.accessor().code().to_string(),
            self.override_text(sd).to_string(),
        ])
    }

    /// Classes contributing facets to a slot, most general first
    pub fn slot_sources(&self, class: &str, slot: &str) -> ClassResult<Vec<String>> {
        let sd = self.lookup_slot(class, slot, true, "slot-sources")?;
        Ok(self.names_of(&self.slot_source_classes(sd)))
    }

    /// Names of the primitive types a slot accepts
    pub fn slot_types(&self, class: &str, slot: &str) -> ClassResult<Vec<&'static str>> {
        let sd = self.lookup_slot(class, slot, true, "slot-types")?;
        Ok(match sd.constraint() {
            Some(cr) => cr.allowed_types().type_names(),
            None => strata_common::TypeSet::all().type_names(),
        })
    }

    /// Explicitly allowed values, `None` when unrestricted
    pub fn slot_allowed_values(&self, class: &str, slot: &str) -> ClassResult<Option<Vec<Value>>> {
        let sd = self.lookup_slot(class, slot, true, "slot-allowed-values")?;
        Ok(sd
            .constraint()
            .filter(|cr| !cr.allowed_values.is_empty())
            .map(|cr| cr.allowed_values.clone()))
    }

    /// Allowed instance classes, `None` when unrestricted
    pub fn slot_allowed_classes(
        &self,
        class: &str,
        slot: &str,
    ) -> ClassResult<Option<Vec<String>>> {
        let sd = self.lookup_slot(class, slot, true, "slot-allowed-classes")?;
        Ok(sd
            .constraint()
            .filter(|cr| !cr.allowed_classes.is_empty())
            .map(|cr| cr.allowed_classes.clone()))
    }

    /// Numeric range, `None` when the slot takes no numbers
    pub fn slot_range(&self, class: &str, slot: &str) -> ClassResult<Option<(Value, Value)>> {
        let sd = self.lookup_slot(class, slot, true, "slot-range")?;
        Ok(match sd.constraint() {
            Some(cr) if cr.allows_numbers() => Some(cr.range.clone()),
            Some(_) => None,
            None => Some((Value::negative_infinity(), Value::positive_infinity())),
        })
    }

    /// `[min, max]` field counts of a multifield slot, empty otherwise
    pub fn slot_cardinality(&self, class: &str, slot: &str) -> ClassResult<Vec<Value>> {
        let sd = self.lookup_slot(class, slot, true, "slot-cardinality")?;
        if !sd.is_multiple() {
            return Ok(Vec::new());
        }
        Ok(match sd.constraint() {
            Some(cr) => vec![cr.cardinality.0.clone(), cr.cardinality.1.clone()],
            None => vec![Value::Integer(0), Value::positive_infinity()],
        })
    }

    /// True if the class itself defines the handler
    ///
    /// The kind defaults to `primary`.
    pub fn handler_exists(&self, class: &str, name: &str, kind: Option<&str>) -> ClassResult<bool> {
        let kind = match kind {
            Some(text) => text.parse()?,
            None => HandlerKind::Primary,
        };
        let def = self.named(class)?;
        Ok(find_handler(&def.handlers, &def.handler_order, &self.symbols, name, kind).is_some())
    }

    /// Handlers of one class (with its ancestors, most general first, when
    /// `inherit` is set), or of every class when `class` is `None`
    pub fn handler_list(
        &self,
        class: Option<&str>,
        inherit: bool,
    ) -> ClassResult<Vec<HandlerSummary>> {
        let owners: Vec<ClassId> = match class {
            None => self.class_ids(),
            Some(name) => {
                let def = self.named(name)?;
                if inherit {
                    def.all_superclasses().iter().rev().copied().collect()
                } else {
                    vec![def.id()]
                }
            }
        };
        let mut out = Vec::new();
        for id in owners {
            let def = self.def(id)?;
            for h in def.handlers() {
                out.push(HandlerSummary {
                    class: self.class_name(id).to_string(),
                    name: self.symbols.text(h.name()).to_string(),
                    kind: h.kind(),
                });
            }
        }
        Ok(out)
    }

    fn named(&self, name: &str) -> ClassResult<&ClassDef> {
        let id = self.require_class(name)?;
        self.def(id)
    }

    fn names_of(&self, ids: &[ClassId]) -> Vec<String> {
        ids.iter().map(|&id| self.class_name(id).to_string()).collect()
    }

    fn template_slot(&self, def: &ClassDef, slot: &str) -> Option<&SlotDescriptor> {
        let id = self.find_slot_name(slot)?;
        let pos = def.template_position(id)?;
        def.instance_template()
            .get(pos)
            .and_then(|&r| self.slot(r))
    }

    /// Template slot of a class; rejects inherited slots unless `inherit`
    pub(crate) fn lookup_slot(
        &self,
        class: &str,
        slot: &str,
        inherit: bool,
        operation: &'static str,
    ) -> ClassResult<&SlotDescriptor> {
        let def = self.named(class)?;
        let sd = self
            .template_slot(def, slot)
            .ok_or_else(|| ClassError::UnknownSlot {
                class: class.to_string(),
                slot: slot.to_string(),
            })?;
        if !inherit && sd.class() != def.id() {
            return Err(ClassError::InheritedSlot {
                slot: slot.to_string(),
                source_class: self.class_name(sd.class()).to_string(),
                operation,
            });
        }
        Ok(sd)
    }

    /// Walk the declaring class's precedence list; composite slots keep
    /// collecting inheritable definitions until the first exclusive one
    pub(crate) fn slot_source_classes(&self, sd: &SlotDescriptor) -> Vec<ClassId> {
        let Some(owner) = self.classes.get(sd.class()) else {
            return Vec::new();
        };
        let mut sources = Vec::new();
        for (i, &cls) in owner.all_superclasses().iter().enumerate() {
            let local = self.classes.get(cls).and_then(|d| d.local_slot(sd.name()));
            let Some((_, local)) = local else {
                continue;
            };
            if i > 0 && local.is_no_inherit() {
                continue;
            }
            sources.push(cls);
            if !local.is_composite() {
                break;
            }
        }
        sources.reverse();
        sources
    }

    pub(crate) fn override_text(&self, sd: &SlotDescriptor) -> &str {
        if sd.facets().contains(SlotFacets::NO_WRITE) {
            "NIL"
        } else {
            self.symbols.text(sd.override_message())
        }
    }
}

pub(crate) fn default_kind(default: &DefaultValue) -> DefaultKind {
    match default {
        DefaultValue::None => DefaultKind::NoDefault,
        DefaultValue::Static(_) => DefaultKind::Static,
        DefaultValue::Dynamic(_) => DefaultKind::Dynamic,
    }
}

/// Access column code, padded to the report's column width
pub(crate) fn access_code(sd: &SlotDescriptor) -> &'static str {
    if sd.facets().contains(SlotFacets::INITIALIZE_ONLY) {
        "INT"
    } else if sd.facets().contains(SlotFacets::NO_WRITE) {
        " R "
    } else {
        "RW "
    }
}
