//! Text reports: `describe-class` and `browse-classes`

use super::introspection::{access_code, default_kind};
use crate::class::ClassId;
use crate::env::Environment;
use crate::error::ClassResult;
use crate::module::ModuleId;
use crate::slot::SlotDescriptor;
use std::fmt::{self, Write};
use strata_common::{ConstraintRecord, TypeSet, Value};

const REPORT_WIDTH: usize = 80;
const MIN_SLOT_COLUMN: usize = 5;
const MAX_SLOT_COLUMN: usize = 16;
const MIN_OVERRIDE_COLUMN: usize = 8;
const MAX_OVERRIDE_COLUMN: usize = 12;

fn separator(out: &mut impl Write, ch: char) -> fmt::Result {
    for _ in 0..REPORT_WIDTH {
        out.write_char(ch)?;
    }
    out.write_char('\n')
}

/// Left-justify `text` in exactly `width` columns, truncating if longer
fn column(out: &mut impl Write, text: &str, width: usize) -> fmt::Result {
    let clipped: String = text.chars().take(width).collect();
    write!(out, "{clipped:<width$}")
}

/// `describe-class` report for one class
struct ClassDescription<'a> {
    env: &'a Environment,
    id: ClassId,
}

impl fmt::Display for ClassDescription<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.env.write_description(f, self.id)
    }
}

/// `browse-classes` tree rooted at one class
struct ClassTree<'a> {
    env: &'a Environment,
    root: ClassId,
}

impl fmt::Display for ClassTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.env.browse(f, self.root, 0)
    }
}

impl Environment {
    /// Full text description of a class
    ///
    /// Lists the abstract/reactive banner, the direct superclasses, the
    /// precedence list, the direct subclasses, a facet table and a
    /// constraint table for every template slot, and the handlers the
    /// class recognizes.
    pub fn describe_class(&self, name: &str) -> ClassResult<String> {
        let id = self.require_class(name)?;
        self.def(id)?;
        Ok(ClassDescription { env: self, id }.to_string())
    }

    /// Indented subclass tree rooted at a class
    ///
    /// Each level indents two spaces; classes with more than one direct
    /// superclass are marked with `*` and appear under every parent.
    pub fn browse_classes(&self, name: &str) -> ClassResult<String> {
        let root = self.require_class(name)?;
        Ok(ClassTree { env: self, root }.to_string())
    }

    fn write_description(&self, out: &mut impl Write, id: ClassId) -> fmt::Result {
        let Some(def) = self.classes.get(id) else {
            return Ok(());
        };

        separator(out, '=')?;
        separator(out, '*')?;
        if def.is_abstract() {
            out.write_str("Abstract: direct instances of this class cannot be created.\n\n")?;
        } else {
            out.write_str("Concrete: direct instances of this class can be created.\n")?;
            if def.is_reactive() {
                out.write_str(
                    "Reactive: direct instances of this class can match defrule patterns.\n\n",
                )?;
            } else {
                out.write_str(
                    "Non-reactive: direct instances of this class cannot match defrule patterns.\n\n",
                )?;
            }
        }
        self.write_links(out, "Direct Superclasses:", def.direct_superclasses())?;
        self.write_links(out, "Inheritance Precedence:", def.all_superclasses())?;
        self.write_links(out, "Direct Subclasses:", def.direct_subclasses())?;

        let slots: Vec<&SlotDescriptor> = def
            .instance_template()
            .iter()
            .filter_map(|&r| self.slot(r))
            .collect();
        if !slots.is_empty() {
            separator(out, '-')?;
            let mut name_width = MIN_SLOT_COLUMN;
            let mut override_width = MIN_OVERRIDE_COLUMN;
            for sd in &slots {
                name_width = name_width.max(self.slot_name_text(sd.name()).len());
                override_width = override_width.max(self.override_text(sd).len());
            }
            let name_width = name_width.min(MAX_SLOT_COLUMN);
            let override_width = override_width.min(MAX_OVERRIDE_COLUMN);

            self.write_slot_facets(out, &slots, name_width, override_width)?;
            out.write_str("\nConstraint information for slots:\n\n")?;
            self.write_slot_constraints(out, &slots, name_width)?;
        }

        let has_handlers = def
            .all_superclasses()
            .iter()
            .filter_map(|&c| self.classes.get(c))
            .any(|d| !d.handlers().is_empty());
        if has_handlers {
            separator(out, '-')?;
            out.write_str("Recognized message-handlers:\n")?;
            for &cls in def.all_superclasses().iter().rev() {
                let Some(owner) = self.classes.get(cls) else {
                    continue;
                };
                for h in owner.handlers() {
                    writeln!(
                        out,
                        "{} {} in class {}",
                        self.symbols.text(h.name()),
                        h.kind(),
                        self.display_name(cls)
                    )?;
                }
            }
        }
        separator(out, '*')?;
        separator(out, '=')
    }

    fn browse(&self, out: &mut impl Write, id: ClassId, depth: usize) -> fmt::Result {
        let Some(def) = self.classes.get(id) else {
            return Ok(());
        };
        for _ in 0..depth {
            out.write_str("  ")?;
        }
        out.write_str(&self.display_name(id))?;
        if def.direct_superclasses().len() > 1 {
            out.write_str(" *")?;
        }
        out.write_char('\n')?;
        for &sub in def.direct_subclasses() {
            self.browse(out, sub, depth + 1)?;
        }
        Ok(())
    }

    /// Class name, qualified with its module outside `MAIN`
    fn display_name(&self, id: ClassId) -> String {
        match self.classes.get(id) {
            Some(def) if def.module() != ModuleId::MAIN && !def.is_system() => {
                let module = self
                    .modules
                    .get(def.module())
                    .map_or("", |m| self.symbols.text(m.name()));
                format!("{module}::{}", self.class_name(id))
            }
            _ => self.class_name(id).to_string(),
        }
    }

    fn write_links(&self, out: &mut impl Write, title: &str, links: &[ClassId]) -> fmt::Result {
        out.write_str(title)?;
        for &cls in links {
            write!(out, " {}", self.display_name(cls))?;
        }
        out.write_char('\n')
    }

    fn write_slot_facets(
        &self,
        out: &mut impl Write,
        slots: &[&SlotDescriptor],
        name_width: usize,
        override_width: usize,
    ) -> fmt::Result {
        column(out, "SLOTS", name_width)?;
        out.write_str(" : FLD DEF PRP ACC STO MCH SRC VIS CRT ")?;
        column(out, "OVRD-MSG", override_width)?;
        out.write_str(" SOURCE(S)\n")?;

        for sd in slots {
            column(out, self.slot_name_text(sd.name()), name_width)?;
            out.write_str(" : ")?;
            out.write_str(if sd.is_multiple() { "MLT " } else { "SGL " })?;
            out.write_str(default_kind(sd.default_value()).code())?;
            out.write_char(' ')?;
            out.write_str(if sd.is_no_inherit() { "NIL " } else { "INH " })?;
            out.write_str(access_code(sd))?;
            out.write_char(' ')?;
            out.write_str(if sd.is_shared() { "SHR " } else { "LCL " })?;
            out.write_str(if sd.is_reactive() { "RCT " } else { "NIL " })?;
            out.write_str(if sd.is_composite() { "CMP " } else { "EXC " })?;
            out.write_str(if sd.is_public() { "PUB " } else { "PRV " })?;
            let accessor = sd.accessor().code();
            write!(out, "{accessor:^3} ")?;
            column(out, self.override_text(sd), override_width)?;
            out.write_char(' ')?;
            let sources: Vec<String> = self
                .slot_source_classes(sd)
                .into_iter()
                .map(|c| self.display_name(c))
                .collect();
            writeln!(out, "{}", sources.join(" "))?;
        }
        Ok(())
    }

    fn write_slot_constraints(
        &self,
        out: &mut impl Write,
        slots: &[&SlotDescriptor],
        name_width: usize,
    ) -> fmt::Result {
        column(out, "SLOTS", name_width)?;
        out.write_str(" : SYM STR INN INA EXA FTA INT FLT\n")?;

        for sd in slots {
            column(out, self.slot_name_text(sd.name()), name_width)?;
            out.write_str(" : ")?;
            match sd.constraint() {
                Some(cr) => {
                    let class_restricted = !cr.allowed_classes.is_empty();
                    let codes = [
                        (TypeSet::SYMBOL, false),
                        (TypeSet::STRING, false),
                        (TypeSet::INSTANCE_NAME, class_restricted),
                        (TypeSet::INSTANCE_ADDRESS, class_restricted),
                        (TypeSet::EXTERNAL_ADDRESS, false),
                        (TypeSet::FACT_ADDRESS, false),
                        (TypeSet::INTEGER, false),
                        (TypeSet::FLOAT, false),
                    ];
                    for (ty, restricted) in codes {
                        out.write_str(constraint_code(cr, ty, restricted))?;
                    }
                    if cr.allows_numbers() {
                        write!(out, "RNG:[{}..{}] ", cr.range.0, cr.range.1)?;
                    }
                    if sd.is_multiple() {
                        write!(out, "CRD:[{}..{}]", cr.cardinality.0, cr.cardinality.1)?;
                    }
                }
                None => {
                    write!(
                        out,
                        " +   +   +   +   +   +   +   +  RNG:[{}..{}]",
                        Value::negative_infinity(),
                        Value::positive_infinity()
                    )?;
                    if sd.is_multiple() {
                        write!(out, " CRD:[0..{}]", Value::positive_infinity())?;
                    }
                }
            }
            out.write_char('\n')?;
        }
        Ok(())
    }
}

/// ` +  ` for an allowed type, ` #  ` when its values are restricted,
/// blank when the type is not allowed
fn constraint_code(cr: &ConstraintRecord, ty: TypeSet, restricted: bool) -> &'static str {
    if cr.any_allowed || cr.types.contains(ty) {
        if restricted || !cr.allowed_values.is_empty() {
            " #  "
        } else {
            " +  "
        }
    } else {
        "    "
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassBuilder;
    use crate::handler::{HandlerBuilder, HandlerKind};
    use crate::slot::SlotBuilder;

    fn env() -> Environment {
        let mut env = Environment::new();
        env.define_class(
            ClassBuilder::new("A")
                .slot(SlotBuilder::new("x").default_static(Value::Integer(0)))
                .handler(HandlerBuilder::new("show")),
        )
        .unwrap();
        env.define_class(ClassBuilder::new("B").non_reactive())
            .unwrap();
        env.define_class(
            ClassBuilder::new("C")
                .superclass("A")
                .superclass("B")
                .slot(SlotBuilder::new("items").multiple().read_only())
                .handler(HandlerBuilder::new("show").kind(HandlerKind::After)),
        )
        .unwrap();
        env
    }

    #[test]
    fn test_describe_banner_and_links() {
        let env = env();
        let text = env.describe_class("C").unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "=".repeat(80));
        assert_eq!(lines[1], "*".repeat(80));
        assert_eq!(lines[2], "Concrete: direct instances of this class can be created.");
        assert_eq!(
            lines[3],
            "Reactive: direct instances of this class can match defrule patterns."
        );
        assert!(text.contains("Direct Superclasses: A B\n"));
        assert!(text.contains("Inheritance Precedence: C A B\n"));
        assert!(text.contains("Direct Subclasses:\n"));
        assert_eq!(lines[lines.len() - 1], "=".repeat(80));
    }

    #[test]
    fn test_describe_slot_tables() {
        let env = env();
        let text = env.describe_class("C").unwrap();
        assert!(text.contains(
            "SLOTS : FLD DEF PRP ACC STO MCH SRC VIS CRT OVRD-MSG SOURCE(S)\n"
        ));
        assert!(text.contains(
            "x     : SGL STC INH RW  LCL RCT EXC PRV RW  put-x    A\n"
        ));
        assert!(text.contains(
            "items : MLT STC INH  R  LCL RCT EXC PRV RW  NIL      C\n"
        ));
        assert!(text.contains("SLOTS : SYM STR INN INA EXA FTA INT FLT\n"));
        assert!(text.contains(
            "items :  +   +   +   +   +   +   +   +  RNG:[-oo..+oo] CRD:[0..+oo]\n"
        ));
    }

    #[test]
    fn test_describe_handlers_general_first() {
        let env = env();
        let text = env.describe_class("C").unwrap();
        let start = text.find("Recognized message-handlers:\n").unwrap();
        let tail = &text[start..];
        let a = tail.find("show primary in class A").unwrap();
        let c = tail.find("show after in class C").unwrap();
        assert!(a < c);

        let b = env.describe_class("B").unwrap();
        assert!(b.contains("Non-reactive: direct instances of this class cannot match"));
        assert!(!b.contains("Recognized message-handlers"));
        assert!(!b.contains("SLOTS"));
    }

    #[test]
    fn test_browse_marks_multiple_inheritance() {
        let env = env();
        assert_eq!(env.browse_classes("A").unwrap(), "A\n  C *\n");
        assert_eq!(env.browse_classes("B").unwrap(), "B\n  C *\n");
        assert!(env.browse_classes("Z").is_err());
    }

    #[test]
    fn test_module_qualified_names() {
        let mut env = Environment::new();
        env.define_module("SHAPES");
        env.define_class(ClassBuilder::new("A")).unwrap();
        env.define_class(ClassBuilder::new("P").module("SHAPES").superclass("A"))
            .unwrap();
        assert_eq!(env.browse_classes("A").unwrap(), "A\n  SHAPES::P\n");
    }
}
