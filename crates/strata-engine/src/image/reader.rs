//! Image reader - rebuilds an environment from an image
//!
//! Loading validates the whole image before touching the environment: the
//! frame, the checksum, every stored index and every id the image claims.
//! Only then does the update pass turn indices back into references and
//! re-install the reference counts a fresh definition would hold.

use super::format::{
    ImageData, ImageHeader, Span, DEFAULT_DYNAMIC, DEFAULT_STATIC, HEADER_LEN, NO_INDEX,
};
use super::{ImageError, ImageResult, ImageStats};
use crate::class::{ClassDef, ClassFlags, ClassId, ClassIdMap, PackedLinks, TraversalMarks};
use crate::env::Environment;
use crate::error::{ClassError, ClassResult};
use crate::handler::{Handler, HandlerKind};
use crate::module::ModuleId;
use crate::slot::{DefaultValue, SlotDescriptor, SlotFacets, SlotNameId, SlotRef};
use rustc_hash::FxHashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use strata_common::codec::read_u32;
use strata_common::Expression;
use tracing::debug;

const CHECKSUM_LEN: usize = 4;

/// Verify framing and checksum, then decode the body
fn decode_image(bytes: &[u8]) -> ImageResult<ImageData> {
    if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(ImageError::CorruptedData("image too short"));
    }
    let header = ImageHeader::decode(&mut &bytes[..HEADER_LEN])?;
    header.validate()?;

    let (body, mut trailer) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    let stored = read_u32(&mut trailer)?;
    let computed = crc32fast::hash(body);
    if stored != computed {
        return Err(ImageError::ChecksumMismatch { stored, computed });
    }

    let mut r = &body[HEADER_LEN..];
    let image = ImageData::decode(&mut r)?;
    if !r.is_empty() {
        return Err(ImageError::CorruptedData("trailing bytes before checksum"));
    }
    Ok(image)
}

impl Environment {
    /// Load a binary image into an environment with no classes
    ///
    /// An image without classes loads nothing and leaves the environment
    /// open for definitions.
    pub fn load_image(&mut self, reader: &mut impl Read) -> ImageResult<ImageStats> {
        if self.loaded_image.is_some() || !self.classes.is_empty() {
            return Err(ClassError::ImageActive.into());
        }
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let image = decode_image(&bytes)?;

        let stats = ImageStats {
            counts: image.counts(),
            symbols: image.symbols.len(),
            bitmaps: image.bitmaps.len(),
            expressions: image.expressions.len(),
            constraints: image.constraints.len(),
            bytes: bytes.len() as u64,
        };
        if image.classes.is_empty() {
            debug!(bytes = stats.bytes, "empty image loaded");
            return Ok(stats);
        }

        self.check_image(&image)?;
        self.install_image(&image)?;
        self.loaded_image = Some(stats.counts);

        debug!(
            classes = stats.counts.classes,
            slots = stats.counts.slots,
            handlers = stats.counts.handlers,
            bytes = stats.bytes,
            "image loaded"
        );
        Ok(stats)
    }

    /// Load a binary image from a file
    pub fn load_image_from_file(&mut self, path: impl AsRef<Path>) -> ImageResult<ImageStats> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        self.load_image(&mut reader)
    }

    /// Cross-record consistency and conflicts with the environment
    fn check_image(&self, image: &ImageData) -> ImageResult<()> {
        if image.max_class_id > ClassId::MAX as u64 + 1 {
            return Err(ImageError::CorruptedData("max class id"));
        }
        let mut ids = FxHashSet::default();
        for c in &image.classes {
            if c.id as u64 >= image.max_class_id || !ids.insert(c.id) {
                return Err(ImageError::ClassIdConflict(c.id));
            }
        }

        for (mi, m) in image.modules.iter().enumerate() {
            if (m.first_class == NO_INDEX) != (m.last_class == NO_INDEX) {
                return Err(ImageError::CorruptedData("module class range"));
            }
            if m.first_class == NO_INDEX {
                continue;
            }
            if m.first_class > m.last_class {
                return Err(ImageError::CorruptedData("module class range"));
            }
            let range = m.first_class as usize..=m.last_class as usize;
            if image.classes[range].iter().any(|c| c.module != mi as i64) {
                return Err(ImageError::CorruptedData("module class range"));
            }
        }

        for (ci, c) in image.classes.iter().enumerate() {
            if ClassFlags::from_bits(c.flags).is_none() {
                return Err(ImageError::CorruptedData("class flags"));
            }
            if image.links[c.all_superclasses.range()].first() != Some(&(ci as i64)) {
                return Err(ImageError::CorruptedData("precedence list head"));
            }
            if c.slots.count as usize > u16::MAX as usize {
                return Err(ImageError::CorruptedData("slot count"));
            }
            if image.slots[c.slots.range()].iter().any(|s| s.class != ci as i64) {
                return Err(ImageError::CorruptedData("slot owner"));
            }
            if image.handlers[c.handlers.range()].iter().any(|h| h.class != ci as i64) {
                return Err(ImageError::CorruptedData("handler owner"));
            }
        }
        for (si, s) in image.slots.iter().enumerate() {
            if SlotFacets::from_bits(s.facets).is_none() {
                return Err(ImageError::CorruptedData("slot facets"));
            }
            if !image.classes[s.class as usize].slots.range().contains(&si) {
                return Err(ImageError::CorruptedData("slot owner"));
            }
        }
        for &t in &image.template {
            let owner = image.slots[t as usize].class as usize;
            let span = image.classes[owner].slots;
            let in_owner = (t as usize)
                .checked_sub(span.start as usize)
                .is_some_and(|offset| offset < span.count as usize);
            if !in_owner {
                return Err(ImageError::CorruptedData("template slot"));
            }
        }

        let mut slot_ids = FxHashSet::default();
        let mut slot_texts = FxHashSet::default();
        for record in &image.slot_names {
            let name = &image.symbols[record.name as usize];
            let id = SlotNameId(record.id);
            if !slot_ids.insert(record.id)
                || !slot_texts.insert(name.as_str())
                || self.slot_names.conflicts(&self.symbols, name, id)
            {
                return Err(ImageError::SlotNameConflict {
                    name: name.clone(),
                    id: record.id,
                });
            }
        }
        Ok(())
    }

    /// Update pass: indices to references, reference counts re-installed
    fn install_image(&mut self, image: &ImageData) -> ImageResult<()> {
        self.classes.reinitialize(image.max_class_id as usize)?;

        let module_ids: Vec<ModuleId> = image
            .modules
            .iter()
            .map(|m| {
                self.modules
                    .define(&mut self.symbols, &image.symbols[m.name as usize])
            })
            .collect();
        let class_ids: Vec<ClassId> = image.classes.iter().map(|c| ClassId(c.id)).collect();
        let links = |span: &Span| -> PackedLinks {
            PackedLinks::from_vec(
                image.links[span.range()]
                    .iter()
                    .map(|&l| class_ids[l as usize])
                    .collect(),
            )
        };

        for c in &image.classes {
            let id = ClassId(c.id);
            let name = self.symbols.intern(&image.symbols[c.name as usize]);

            let mut slots = Vec::with_capacity(c.slots.count as usize);
            for s in &image.slots[c.slots.range()] {
                let record = &image.slot_names[s.slot_name as usize];
                let slot_name = self.slot_names.intern_with_id(
                    &mut self.symbols,
                    &image.symbols[record.name as usize],
                    SlotNameId(record.id),
                );
                let default = match (s.default_kind, image.expressions.get(s.default as usize)) {
                    (DEFAULT_STATIC, Some(Expression::Constant(v))) => {
                        DefaultValue::Static(v.clone())
                    }
                    (DEFAULT_DYNAMIC, Some(e)) => DefaultValue::Dynamic(e.clone()),
                    _ => DefaultValue::None,
                };
                slots.push(SlotDescriptor {
                    class: id,
                    name: slot_name,
                    facets: SlotFacets::from_bits_truncate(s.facets),
                    default,
                    constraint: usize::try_from(s.constraint)
                        .ok()
                        .and_then(|i| image.constraints.get(i))
                        .cloned(),
                    override_message: self
                        .symbols
                        .intern(&image.symbols[s.override_message as usize]),
                });
            }

            let instance_template = image.template[c.template.range()]
                .iter()
                .map(|&t| {
                    let owner = image.slots[t as usize].class as usize;
                    let start = image.classes[owner].slots.start as usize;
                    let index = (t as usize)
                        .checked_sub(start)
                        .and_then(|i| u16::try_from(i).ok())
                        .ok_or(ImageError::CorruptedData("template slot"))?;
                    Ok(SlotRef {
                        class: class_ids[owner],
                        index,
                    })
                })
                .collect::<ImageResult<Vec<_>>>()?;

            let mut handlers = Vec::with_capacity(c.handlers.count as usize);
            for h in &image.handlers[c.handlers.range()] {
                handlers.push(Handler {
                    class: id,
                    name: self.symbols.intern(&image.symbols[h.name as usize]),
                    kind: HandlerKind::from_code(h.kind).unwrap_or(HandlerKind::Primary),
                    system: h.system != 0,
                    min_params: h.min_params,
                    max_params: h.max_params,
                    local_var_count: h.local_var_count,
                    actions: usize::try_from(h.actions)
                        .ok()
                        .and_then(|i| image.expressions.get(i))
                        .cloned(),
                    busy: 0,
                });
            }

            let module = module_ids[c.module as usize];
            let def = ClassDef {
                name,
                id,
                module,
                flags: ClassFlags::from_bits_truncate(c.flags),
                direct_superclasses: links(&c.direct_superclasses),
                direct_subclasses: links(&c.direct_subclasses),
                all_superclasses: links(&c.all_superclasses),
                slots,
                instance_template,
                slot_name_map: image.slot_name_maps[c.slot_name_map.range()].to_vec(),
                handlers,
                handler_order: image.handler_orders[c.handlers.range()].to_vec(),
                busy: 0,
                traversal: TraversalMarks::default(),
                scope: self.bitmaps.add(image.bitmaps[c.scope as usize].clone()),
            };
            self.classes.insert(def);
            self.class_table.add(name, self.symbols.bucket(name), id);
            self.modules.push_class(module, id);
        }
        Ok(())
    }

    /// Tear down a loaded image and reset the class id allocator
    ///
    /// Does nothing when no image is loaded.
    pub fn clear_image(&mut self) -> ClassResult<()> {
        if self.loaded_image.is_none() {
            return Ok(());
        }
        let busy = self
            .classes
            .iter()
            .find(|def| def.busy > 0 || def.handlers.iter().any(|h| h.busy > 0))
            .map(ClassDef::id);
        if let Some(id) = busy {
            return Err(ClassError::ClassInUse(self.class_name(id).to_string()));
        }

        let ids: Vec<ClassId> = self.classes.iter().map(ClassDef::id).collect();
        for &id in &ids {
            self.uninstall_class(id);
        }
        self.class_table.clear();
        self.modules.clear_classes();
        self.classes = ClassIdMap::new(self.options.class_id_chunk);
        self.loaded_image = None;

        debug!(classes = ids.len(), "image cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassBuilder;
    use crate::image::format::SlotNameRecord;
    use crate::handler::HandlerBuilder;
    use crate::options::EnvOptions;
    use crate::slot::SlotBuilder;
    use strata_common::{ConstraintRecord, TypeSet, Value};

    fn sample() -> Environment {
        let mut env = Environment::with_options(EnvOptions {
            create_system_classes: true,
            ..EnvOptions::default()
        })
        .unwrap();
        env.define_module("SHAPES");
        env.define_class(
            ClassBuilder::new("SHAPE")
                .abstract_class()
                .slot(SlotBuilder::new("name").default_dynamic(Expression::call("gensym", vec![])))
                .handler(HandlerBuilder::new("area").actions(Expression::Constant(Value::Integer(0)))),
        )
        .unwrap();
        env.define_class(
            ClassBuilder::new("RECT")
                .module("SHAPES")
                .superclass("SHAPE")
                .slot(
                    SlotBuilder::new("width")
                        .constraint(
                            ConstraintRecord::of_types(TypeSet::INTEGER)
                                .with_range(Value::Integer(0), Value::positive_infinity()),
                        )
                        .initialize_only(),
                )
                .slot(SlotBuilder::new("tags").multiple().no_default()),
        )
        .unwrap();
        env
    }

    fn save(env: &Environment) -> Vec<u8> {
        let mut bytes = Vec::new();
        env.save_image(&mut bytes).unwrap();
        bytes
    }

    /// Frame an edited image with a valid header and checksum
    fn reframe(image: &ImageData) -> Vec<u8> {
        let mut bytes = Vec::new();
        ImageHeader::new().encode(&mut bytes).unwrap();
        image.encode(&mut bytes).unwrap();
        let checksum = crc32fast::hash(&bytes);
        bytes.extend_from_slice(&checksum.to_le_bytes());
        bytes
    }

    fn class_record(image: &ImageData, name: &str) -> usize {
        image
            .classes
            .iter()
            .position(|c| image.symbols[c.name as usize] == name)
            .unwrap()
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let env = sample();
        let first = save(&env);

        let mut loaded = Environment::new();
        let stats = loaded.load_image(&mut first.as_slice()).unwrap();
        assert_eq!(stats.counts.classes as usize, env.class_count());
        assert_eq!(loaded.class_count(), env.class_count());
        assert_eq!(save(&loaded), first);
    }

    #[test]
    fn test_loaded_classes_are_queryable() {
        let env = sample();
        let mut loaded = Environment::new();
        loaded.load_image(&mut save(&env).as_slice()).unwrap();

        let rect = loaded.find_class("RECT").unwrap();
        let shape = loaded.find_class("SHAPE").unwrap();
        let def = loaded.class(rect).unwrap();
        assert_eq!(def.direct_superclasses(), &[shape]);
        assert_eq!(def.instance_template().len(), 3);
        assert_eq!(loaded.class_module("RECT").unwrap(), "SHAPES");
        assert!(loaded.class(shape).unwrap().direct_subclasses().contains(&rect));
        let width = loaded.find_slot_name("width").unwrap();
        assert_eq!(env.find_slot_name("width"), Some(width));
        assert!(def.template_position(width).is_some());
        assert!(loaded.find_handler("SHAPE", "area", HandlerKind::Primary).is_some());
    }

    #[test]
    fn test_load_requires_empty_environment() {
        let env = sample();
        let bytes = save(&env);
        let mut other = Environment::new();
        other.define_class(ClassBuilder::new("A")).unwrap();
        assert!(matches!(
            other.load_image(&mut bytes.as_slice()),
            Err(ImageError::Class(ClassError::ImageActive))
        ));
    }

    #[test]
    fn test_loaded_image_blocks_changes_until_cleared() {
        let mut loaded = Environment::new();
        loaded.load_image(&mut save(&sample()).as_slice()).unwrap();
        assert_eq!(
            loaded.define_class(ClassBuilder::new("X")),
            Err(ClassError::ImageActive)
        );
        assert_eq!(loaded.delete_class("RECT"), Err(ClassError::ImageActive));

        loaded.clear_image().unwrap();
        assert!(loaded.loaded_image().is_none());
        assert_eq!(loaded.class_count(), 0);
        assert!(loaded.slot_names().is_empty());
        assert!(loaded.symbols().find("RECT").is_none());
        let x = loaded.define_class(ClassBuilder::new("X")).unwrap();
        assert_eq!(x, ClassId(0));
    }

    #[test]
    fn test_clear_rejects_busy_class() {
        let mut loaded = Environment::new();
        loaded.load_image(&mut save(&sample()).as_slice()).unwrap();
        let rect = loaded.find_class("RECT").unwrap();
        loaded.increment_busy(rect).unwrap();
        assert_eq!(loaded.clear_image(), Err(ClassError::ClassInUse("RECT".into())));
        loaded.decrement_busy(rect).unwrap();
        assert!(loaded.clear_image().is_ok());
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut bytes = save(&sample());
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        let mut env = Environment::new();
        assert!(matches!(
            env.load_image(&mut bytes.as_slice()),
            Err(ImageError::ChecksumMismatch { .. })
        ));
        assert_eq!(env.class_count(), 0);
    }

    #[test]
    fn test_short_image_rejected() {
        let mut env = Environment::new();
        assert!(matches!(
            env.load_image(&mut [0u8; 10].as_slice()),
            Err(ImageError::CorruptedData("image too short"))
        ));
    }

    #[test]
    fn test_slot_name_conflict_leaves_environment_unchanged() {
        let bytes = save(&sample());
        let mut env = Environment::new();
        env.intern_slot_name("unrelated").unwrap();
        let err = env.load_image(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, ImageError::SlotNameConflict { id: 0, .. }));
        assert_eq!(env.class_count(), 0);
        assert!(env.loaded_image().is_none());
    }

    #[test]
    fn test_duplicate_slot_name_text_rejected() {
        let mut image = decode_image(&save(&sample())).unwrap();
        let name = image.slot_names[0].name;
        image.slot_names.push(SlotNameRecord { id: 4000, name });
        let last = image.slot_names.len() as i64 - 1;
        let slot = image.slots.iter().position(|s| s.slot_name == 1).unwrap();
        image.slots[slot].slot_name = last;

        let mut env = Environment::new();
        let err = env.load_image(&mut reframe(&image).as_slice()).unwrap_err();
        assert!(matches!(err, ImageError::SlotNameConflict { id: 4000, .. }));
        assert_eq!(env.class_count(), 0);
        assert!(env.slot_names().is_empty());
        assert!(env.loaded_image().is_none());
    }

    #[test]
    fn test_slot_outside_owner_span_rejected() {
        let mut image = decode_image(&save(&sample())).unwrap();
        let shape = class_record(&image, "SHAPE");
        let rect = class_record(&image, "RECT");
        let orphan = image.classes[shape].slots.start as usize;
        assert!((image.classes[rect].slots.start as usize) > orphan);
        image.classes[shape].slots = Span::new(orphan, 0);
        image.slots[orphan].class = rect as i64;

        let mut env = Environment::new();
        assert!(matches!(
            env.load_image(&mut reframe(&image).as_slice()),
            Err(ImageError::CorruptedData("slot owner"))
        ));
        assert_eq!(env.class_count(), 0);
        assert!(env.slot_names().is_empty());
    }

    #[test]
    fn test_empty_image_loads_nothing() {
        let bytes = save(&Environment::new());
        let mut env = Environment::new();
        let stats = env.load_image(&mut bytes.as_slice()).unwrap();
        assert_eq!(stats.counts.classes, 0);
        assert!(env.loaded_image().is_none());
        assert!(env.define_class(ClassBuilder::new("A")).is_ok());
    }
}
