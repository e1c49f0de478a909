//! Image writer - flattens an environment into an image
//!
//! Saving is a two-phase walk: every class is first assigned a record
//! index, then each record is emitted with references replaced by those
//! indices. Symbols are pooled in first-reference order so that saving a
//! freshly loaded image reproduces the same bytes.

use super::format::{
    ClassRecord, HandlerRecord, ImageData, ImageHeader, ModuleRecord, SlotNameRecord, SlotRecord,
    Span, DEFAULT_DYNAMIC, DEFAULT_NONE, DEFAULT_STATIC, NO_INDEX,
};
use super::{ImageResult, ImageStats};
use crate::class::ClassId;
use crate::env::Environment;
use crate::slot::{DefaultValue, SlotNameId};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use strata_common::codec::write_u32;
use strata_common::{BitmapRef, Expression, Symbol};
use tracing::debug;

/// Index assignment for one save
#[derive(Default)]
struct Marks {
    symbols: FxHashMap<Symbol, i64>,
    bitmaps: FxHashMap<BitmapRef, i64>,
    classes: FxHashMap<ClassId, i64>,
    class_slots: FxHashMap<ClassId, usize>,
    slot_names: FxHashMap<SlotNameId, i64>,
}

struct ImageBuilder<'a> {
    env: &'a Environment,
    marks: Marks,
    image: ImageData,
}

impl<'a> ImageBuilder<'a> {
    fn new(env: &'a Environment) -> Self {
        Self {
            env,
            marks: Marks::default(),
            image: ImageData::default(),
        }
    }

    fn symbol(&mut self, sym: Symbol) -> i64 {
        if let Some(&index) = self.marks.symbols.get(&sym) {
            return index;
        }
        let index = self.image.symbols.len() as i64;
        self.image.symbols.push(self.env.symbols.text(sym).to_string());
        self.marks.symbols.insert(sym, index);
        index
    }

    fn bitmap(&mut self, r: BitmapRef) -> i64 {
        if let Some(&index) = self.marks.bitmaps.get(&r) {
            return index;
        }
        let index = self.image.bitmaps.len() as i64;
        let bitmap = self.env.bitmaps.get(r).cloned().unwrap_or_default();
        self.image.bitmaps.push(bitmap);
        self.marks.bitmaps.insert(r, index);
        index
    }

    fn expression(&mut self, expr: Expression) -> i64 {
        self.image.expressions.push(expr);
        self.image.expressions.len() as i64 - 1
    }

    fn link(&self, class: ClassId) -> i64 {
        self.marks.classes.get(&class).copied().unwrap_or(NO_INDEX)
    }

    fn links(&mut self, classes: &[ClassId]) -> Span {
        let start = self.image.links.len();
        for &c in classes {
            let index = self.link(c);
            self.image.links.push(index);
        }
        Span::new(start, classes.len())
    }

    /// Assign record indices to classes, global slot offsets and the
    /// slot names the slots use
    fn mark(&mut self, order: &[ClassId]) {
        let mut slot_offset = 0;
        let mut used_names = BTreeSet::new();
        for (i, &id) in order.iter().enumerate() {
            self.marks.classes.insert(id, i as i64);
            self.marks.class_slots.insert(id, slot_offset);
            if let Some(def) = self.env.classes.get(id) {
                slot_offset += def.slots.len();
                used_names.extend(def.slots.iter().map(|s| s.name));
            }
        }
        for (i, name) in used_names.into_iter().enumerate() {
            self.marks.slot_names.insert(name, i as i64);
        }
    }

    fn build(mut self) -> ImageData {
        let env = self.env;
        let order = env.class_ids();
        if order.is_empty() {
            return self.image;
        }
        self.mark(&order);
        self.image.max_class_id = env.classes.max_class_id() as u64;

        let mut first = 0usize;
        for (_, module) in env.modules.iter() {
            let count = module.classes().len();
            let (first_class, last_class) = if count == 0 {
                (NO_INDEX, NO_INDEX)
            } else {
                (first as i64, (first + count - 1) as i64)
            };
            let name = self.symbol(module.name());
            self.image.modules.push(ModuleRecord {
                name,
                first_class,
                last_class,
            });
            first += count;
        }

        for &id in &order {
            let Some(def) = env.classes.get(id) else {
                continue;
            };
            let name = self.symbol(def.name);
            let scope = self.bitmap(def.scope);

            let direct_superclasses = self.links(def.direct_superclasses.as_slice());
            let direct_subclasses = self.links(def.direct_subclasses.as_slice());
            let all_superclasses = self.links(def.all_superclasses.as_slice());

            let slots_start = self.image.slots.len();
            for slot in &def.slots {
                let slot_name = self
                    .marks
                    .slot_names
                    .get(&slot.name)
                    .copied()
                    .unwrap_or(NO_INDEX);
                let (default_kind, default) = match &slot.default {
                    DefaultValue::None => (DEFAULT_NONE, NO_INDEX),
                    DefaultValue::Static(v) => {
                        (DEFAULT_STATIC, self.expression(Expression::Constant(v.clone())))
                    }
                    DefaultValue::Dynamic(e) => (DEFAULT_DYNAMIC, self.expression(e.clone())),
                };
                let constraint = match &slot.constraint {
                    Some(cr) => {
                        self.image.constraints.push(cr.clone());
                        self.image.constraints.len() as i64 - 1
                    }
                    None => NO_INDEX,
                };
                let override_message = self.symbol(slot.override_message);
                let class = self.link(slot.class);
                self.image.slots.push(SlotRecord {
                    class,
                    slot_name,
                    facets: slot.facets.bits(),
                    default_kind,
                    default,
                    constraint,
                    override_message,
                });
            }
            let slots = Span::new(slots_start, def.slots.len());

            let template_start = self.image.template.len();
            for r in &def.instance_template {
                let base = self.marks.class_slots.get(&r.class).copied();
                let index = base.map_or(NO_INDEX, |b| (b + r.index as usize) as i64);
                self.image.template.push(index);
            }
            let template = Span::new(template_start, def.instance_template.len());

            let map_start = self.image.slot_name_maps.len();
            self.image.slot_name_maps.extend_from_slice(&def.slot_name_map);
            let slot_name_map = Span::new(map_start, def.slot_name_map.len());

            let handlers_start = self.image.handlers.len();
            for h in &def.handlers {
                let name = self.symbol(h.name);
                let actions = match &h.actions {
                    Some(e) => self.expression(e.clone()),
                    None => NO_INDEX,
                };
                let class = self.link(h.class);
                self.image.handlers.push(HandlerRecord {
                    class,
                    name,
                    kind: h.kind.code(),
                    system: h.system as u8,
                    min_params: h.min_params,
                    max_params: h.max_params,
                    local_var_count: h.local_var_count,
                    actions,
                });
            }
            self.image.handler_orders.extend_from_slice(&def.handler_order);
            let handlers = Span::new(handlers_start, def.handlers.len());

            self.image.classes.push(ClassRecord {
                name,
                id: def.id.raw(),
                module: def.module.index() as i64,
                flags: def.flags.bits(),
                direct_superclasses,
                direct_subclasses,
                all_superclasses,
                slots,
                template,
                slot_name_map,
                handlers,
                scope,
            });
        }

        let named: Vec<SlotNameId> = {
            let mut names: Vec<_> = self.marks.slot_names.iter().map(|(&n, &i)| (i, n)).collect();
            names.sort_unstable();
            names.into_iter().map(|(_, n)| n).collect()
        };
        for id in named {
            let name = match env.slot_names.get(id) {
                Some(entry) => self.symbol(entry.name),
                None => NO_INDEX,
            };
            self.image.slot_names.push(SlotNameRecord { id: id.raw(), name });
        }
        self.image
    }
}

impl Environment {
    /// Write every class, slot and handler as a binary image
    pub fn save_image(&self, writer: &mut impl Write) -> ImageResult<ImageStats> {
        let image = ImageBuilder::new(self).build();

        let mut bytes = Vec::new();
        ImageHeader::new().encode(&mut bytes)?;
        image.encode(&mut bytes)?;
        let checksum = crc32fast::hash(&bytes);
        write_u32(&mut bytes, checksum)?;
        writer.write_all(&bytes)?;

        let stats = ImageStats {
            counts: image.counts(),
            symbols: image.symbols.len(),
            bitmaps: image.bitmaps.len(),
            expressions: image.expressions.len(),
            constraints: image.constraints.len(),
            bytes: bytes.len() as u64,
        };
        debug!(
            classes = stats.counts.classes,
            slots = stats.counts.slots,
            handlers = stats.counts.handlers,
            bytes = stats.bytes,
            "image saved"
        );
        Ok(stats)
    }

    /// Write a binary image to a file
    pub fn save_image_to_file(&self, path: impl AsRef<Path>) -> ImageResult<ImageStats> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let stats = self.save_image(&mut writer)?;
        writer.flush()?;
        Ok(stats)
    }
}
