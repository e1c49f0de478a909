//! Image records and their encodings
//!
//! Every record kind has a fixed layout. Cross references are `i64`
//! indices into the relevant flat array, [`NO_INDEX`] for none, and are
//! range-checked when the image is decoded so the update pass never sees a
//! dangling index.

use super::{ImageCounts, ImageError, ImageResult};
use crate::handler::HandlerKind;
use std::io::{Read, Write};
use strata_common::codec::{
    read_i16, read_i64, read_len, read_string, read_u16, read_u32, read_u64, read_u8, write_i16,
    write_i64, write_str, write_u16, write_u32, write_u64, write_u8,
};
use strata_common::{Bitmap, ConstraintRecord, Expression};

/// Magic number: "STRATA\0\0" read as a little-endian u64
pub const IMAGE_MAGIC: u64 = 0x0000_4154_4152_5453;

/// Current image format version
pub const IMAGE_VERSION: u32 = 1;

/// Reads as 0x01020304 when the writer had the same byte order
pub const ENDIANNESS_MARKER: u32 = 0x0102_0304;

const ENDIANNESS_MARKER_SWAPPED: u32 = 0x0403_0201;

/// Stored index meaning "no reference"
pub const NO_INDEX: i64 = -1;

/// Bytes of the count block that follows a non-zero storage size
pub(crate) const STORAGE_SIZE: u64 = 9 * 8;

pub(crate) const HEADER_LEN: usize = 16;

pub(crate) const DEFAULT_NONE: u8 = 0;
pub(crate) const DEFAULT_STATIC: u8 = 1;
pub(crate) const DEFAULT_DYNAMIC: u8 = 2;

/// Fixed image header
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImageHeader {
    pub magic: u64,
    pub version: u32,
    pub endianness: u32,
}

impl ImageHeader {
    pub fn new() -> Self {
        Self {
            magic: IMAGE_MAGIC,
            version: IMAGE_VERSION,
            endianness: ENDIANNESS_MARKER,
        }
    }

    pub fn validate(&self) -> ImageResult<()> {
        if self.magic != IMAGE_MAGIC {
            return Err(ImageError::InvalidMagic);
        }
        if self.version != IMAGE_VERSION {
            return Err(ImageError::IncompatibleVersion {
                expected: IMAGE_VERSION,
                actual: self.version,
            });
        }
        match self.endianness {
            ENDIANNESS_MARKER => Ok(()),
            ENDIANNESS_MARKER_SWAPPED => Err(ImageError::EndiannessMismatch),
            _ => Err(ImageError::CorruptedData("endianness marker")),
        }
    }

    pub fn encode(&self, writer: &mut impl Write) -> std::io::Result<()> {
        write_u64(writer, self.magic)?;
        write_u32(writer, self.version)?;
        write_u32(writer, self.endianness)
    }

    pub fn decode(reader: &mut impl Read) -> std::io::Result<Self> {
        Ok(Self {
            magic: read_u64(reader)?,
            version: read_u32(reader)?,
            endianness: read_u32(reader)?,
        })
    }
}

impl ImageCounts {
    fn as_array(&self) -> [u64; 9] {
        [
            self.modules,
            self.classes,
            self.links,
            self.slot_names,
            self.slots,
            self.template_slots,
            self.slot_name_map,
            self.handlers,
            self.max_class_id,
        ]
    }

    fn encode(&self, writer: &mut impl Write) -> std::io::Result<()> {
        for count in self.as_array() {
            write_i64(writer, count as i64)?;
        }
        Ok(())
    }

    fn decode(reader: &mut impl Read) -> ImageResult<Self> {
        let mut c = [0u64; 9];
        for slot in &mut c {
            let raw = read_i64(reader)?;
            *slot = u64::try_from(raw).map_err(|_| ImageError::CorruptedData("negative count"))?;
        }
        Ok(Self {
            modules: c[0],
            classes: c[1],
            links: c[2],
            slot_names: c[3],
            slots: c[4],
            template_slots: c[5],
            slot_name_map: c[6],
            handlers: c[7],
            max_class_id: c[8],
        })
    }
}

/// `{start, count}` window into a flat array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub start: i64,
    pub count: u32,
}

impl Span {
    pub fn new(start: usize, count: usize) -> Self {
        Self {
            start: if count == 0 { NO_INDEX } else { start as i64 },
            count: count as u32,
        }
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        if self.count == 0 {
            0..0
        } else {
            self.start as usize..self.start as usize + self.count as usize
        }
    }

    fn check(&self, what: &'static str, len: usize) -> ImageResult<()> {
        if self.count == 0 {
            return Ok(());
        }
        let end = self.start.checked_add(self.count as i64);
        match end {
            Some(end) if self.start >= 0 && end as u64 <= len as u64 => Ok(()),
            _ => Err(ImageError::IndexOutOfRange {
                what,
                index: self.start,
                len,
            }),
        }
    }

    fn encode(&self, writer: &mut impl Write) -> std::io::Result<()> {
        write_i64(writer, self.start)?;
        write_u32(writer, self.count)
    }

    fn decode(reader: &mut impl Read) -> std::io::Result<Self> {
        Ok(Self {
            start: read_i64(reader)?,
            count: read_u32(reader)?,
        })
    }
}

fn check_index(what: &'static str, index: i64, len: usize) -> ImageResult<usize> {
    if index >= 0 && (index as u64) < len as u64 {
        Ok(index as usize)
    } else {
        Err(ImageError::IndexOutOfRange { what, index, len })
    }
}

fn check_optional(what: &'static str, index: i64, len: usize) -> ImageResult<()> {
    if index == NO_INDEX {
        Ok(())
    } else {
        check_index(what, index, len).map(|_| ())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ModuleRecord {
    pub name: i64,
    pub first_class: i64,
    pub last_class: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ClassRecord {
    pub name: i64,
    pub id: u16,
    pub module: i64,
    pub flags: u8,
    pub direct_superclasses: Span,
    pub direct_subclasses: Span,
    pub all_superclasses: Span,
    pub slots: Span,
    pub template: Span,
    pub slot_name_map: Span,
    pub handlers: Span,
    pub scope: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SlotNameRecord {
    pub id: u16,
    pub name: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SlotRecord {
    pub class: i64,
    pub slot_name: i64,
    pub facets: u16,
    pub default_kind: u8,
    pub default: i64,
    pub constraint: i64,
    pub override_message: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HandlerRecord {
    pub class: i64,
    pub name: i64,
    pub kind: u8,
    pub system: u8,
    pub min_params: i16,
    pub max_params: i16,
    pub local_var_count: u16,
    pub actions: i64,
}

/// Decoded image, pools plus flat record arrays
#[derive(Debug, Default)]
pub(crate) struct ImageData {
    pub symbols: Vec<String>,
    pub bitmaps: Vec<Bitmap>,
    pub expressions: Vec<Expression>,
    pub constraints: Vec<ConstraintRecord>,
    pub max_class_id: u64,
    pub modules: Vec<ModuleRecord>,
    pub classes: Vec<ClassRecord>,
    pub links: Vec<i64>,
    pub slot_names: Vec<SlotNameRecord>,
    pub slots: Vec<SlotRecord>,
    pub template: Vec<i64>,
    pub slot_name_maps: Vec<u32>,
    pub handlers: Vec<HandlerRecord>,
    pub handler_orders: Vec<u32>,
}

impl ImageData {
    pub fn counts(&self) -> ImageCounts {
        ImageCounts {
            modules: self.modules.len() as u64,
            classes: self.classes.len() as u64,
            links: self.links.len() as u64,
            slot_names: self.slot_names.len() as u64,
            slots: self.slots.len() as u64,
            template_slots: self.template.len() as u64,
            slot_name_map: self.slot_name_maps.len() as u64,
            handlers: self.handlers.len() as u64,
            max_class_id: self.max_class_id,
        }
    }

    /// Encode pools and the object section; the header and trailer are the
    /// caller's
    pub fn encode(&self, writer: &mut impl Write) -> std::io::Result<()> {
        write_u32(writer, self.symbols.len() as u32)?;
        for text in &self.symbols {
            write_str(writer, text)?;
        }
        write_u32(writer, self.bitmaps.len() as u32)?;
        for bitmap in &self.bitmaps {
            bitmap.encode(writer)?;
        }
        write_u32(writer, self.expressions.len() as u32)?;
        for expr in &self.expressions {
            expr.encode(writer)?;
        }
        write_u32(writer, self.constraints.len() as u32)?;
        for cr in &self.constraints {
            cr.encode(writer)?;
        }

        if self.classes.is_empty() {
            return write_u64(writer, 0);
        }
        write_u64(writer, STORAGE_SIZE)?;
        self.counts().encode(writer)?;

        let mut data = Vec::new();
        self.encode_records(&mut data)?;
        write_u64(writer, data.len() as u64)?;
        writer.write_all(&data)
    }

    fn encode_records(&self, w: &mut Vec<u8>) -> std::io::Result<()> {
        for m in &self.modules {
            write_i64(w, m.name)?;
            write_i64(w, m.first_class)?;
            write_i64(w, m.last_class)?;
        }
        for c in &self.classes {
            write_i64(w, c.name)?;
            write_u16(w, c.id)?;
            write_i64(w, c.module)?;
            write_u8(w, c.flags)?;
            c.direct_superclasses.encode(w)?;
            c.direct_subclasses.encode(w)?;
            c.all_superclasses.encode(w)?;
            c.slots.encode(w)?;
            c.template.encode(w)?;
            c.slot_name_map.encode(w)?;
            c.handlers.encode(w)?;
            write_i64(w, c.scope)?;
        }
        for &link in &self.links {
            write_i64(w, link)?;
        }
        for s in &self.slot_names {
            write_u16(w, s.id)?;
            write_i64(w, s.name)?;
        }
        for s in &self.slots {
            write_i64(w, s.class)?;
            write_i64(w, s.slot_name)?;
            write_u16(w, s.facets)?;
            write_u8(w, s.default_kind)?;
            write_i64(w, s.default)?;
            write_i64(w, s.constraint)?;
            write_i64(w, s.override_message)?;
        }
        for &t in &self.template {
            write_i64(w, t)?;
        }
        for &pos in &self.slot_name_maps {
            write_u32(w, pos)?;
        }
        for h in &self.handlers {
            write_i64(w, h.class)?;
            write_i64(w, h.name)?;
            write_u8(w, h.kind)?;
            write_u8(w, h.system)?;
            write_i16(w, h.min_params)?;
            write_i16(w, h.max_params)?;
            write_u16(w, h.local_var_count)?;
            write_i64(w, h.actions)?;
        }
        for &pos in &self.handler_orders {
            write_u32(w, pos)?;
        }
        Ok(())
    }

    /// Decode pools and the object section, range-checking every index
    pub fn decode(reader: &mut impl Read) -> ImageResult<Self> {
        let mut image = ImageData::default();

        let n = read_len(reader)?;
        for _ in 0..n {
            image.symbols.push(read_string(reader)?);
        }
        let n = read_len(reader)?;
        for _ in 0..n {
            image.bitmaps.push(Bitmap::decode(reader)?);
        }
        let n = read_len(reader)?;
        for _ in 0..n {
            image.expressions.push(Expression::decode(reader)?);
        }
        let n = read_len(reader)?;
        for _ in 0..n {
            image.constraints.push(ConstraintRecord::decode(reader)?);
        }

        let storage = read_u64(reader)?;
        if storage == 0 {
            return Ok(image);
        }
        if storage != STORAGE_SIZE {
            return Err(ImageError::CorruptedData("storage size"));
        }
        let counts = ImageCounts::decode(reader)?;
        image.max_class_id = counts.max_class_id;

        let data_len = read_u64(reader)?;
        let mut data = Vec::new();
        reader.by_ref().take(data_len).read_to_end(&mut data)?;
        if data.len() as u64 != data_len {
            return Err(ImageError::CorruptedData("truncated data block"));
        }
        let mut r = data.as_slice();
        image.decode_records(&mut r, &counts)?;
        if !r.is_empty() {
            return Err(ImageError::CorruptedData("trailing record bytes"));
        }
        image.validate()?;
        Ok(image)
    }

    fn decode_records(&mut self, r: &mut &[u8], counts: &ImageCounts) -> ImageResult<()> {
        let fits = |count: u64, record: usize| count.saturating_mul(record as u64) <= r.len() as u64;
        if !fits(counts.modules, 24) || !fits(counts.classes, 8) || !fits(counts.links, 8) {
            return Err(ImageError::CorruptedData("record counts exceed data"));
        }

        for _ in 0..counts.modules {
            self.modules.push(ModuleRecord {
                name: read_i64(r)?,
                first_class: read_i64(r)?,
                last_class: read_i64(r)?,
            });
        }
        for _ in 0..counts.classes {
            self.classes.push(ClassRecord {
                name: read_i64(r)?,
                id: read_u16(r)?,
                module: read_i64(r)?,
                flags: read_u8(r)?,
                direct_superclasses: Span::decode(r)?,
                direct_subclasses: Span::decode(r)?,
                all_superclasses: Span::decode(r)?,
                slots: Span::decode(r)?,
                template: Span::decode(r)?,
                slot_name_map: Span::decode(r)?,
                handlers: Span::decode(r)?,
                scope: read_i64(r)?,
            });
        }
        for _ in 0..counts.links {
            self.links.push(read_i64(r)?);
        }
        for _ in 0..counts.slot_names {
            self.slot_names.push(SlotNameRecord {
                id: read_u16(r)?,
                name: read_i64(r)?,
            });
        }
        for _ in 0..counts.slots {
            self.slots.push(SlotRecord {
                class: read_i64(r)?,
                slot_name: read_i64(r)?,
                facets: read_u16(r)?,
                default_kind: read_u8(r)?,
                default: read_i64(r)?,
                constraint: read_i64(r)?,
                override_message: read_i64(r)?,
            });
        }
        for _ in 0..counts.template_slots {
            self.template.push(read_i64(r)?);
        }
        for _ in 0..counts.slot_name_map {
            self.slot_name_maps.push(read_u32(r)?);
        }
        for _ in 0..counts.handlers {
            self.handlers.push(HandlerRecord {
                class: read_i64(r)?,
                name: read_i64(r)?,
                kind: read_u8(r)?,
                system: read_u8(r)?,
                min_params: read_i16(r)?,
                max_params: read_i16(r)?,
                local_var_count: read_u16(r)?,
                actions: read_i64(r)?,
            });
        }
        for _ in 0..counts.handlers {
            self.handler_orders.push(read_u32(r)?);
        }
        Ok(())
    }

    /// Range-check every stored index
    fn validate(&self) -> ImageResult<()> {
        let classes = self.classes.len();
        for m in &self.modules {
            check_index("module name", m.name, self.symbols.len())?;
            check_optional("module first class", m.first_class, classes)?;
            check_optional("module last class", m.last_class, classes)?;
        }
        for c in &self.classes {
            check_index("class name", c.name, self.symbols.len())?;
            check_index("class module", c.module, self.modules.len())?;
            check_index("class scope", c.scope, self.bitmaps.len())?;
            c.direct_superclasses.check("superclass links", self.links.len())?;
            c.direct_subclasses.check("subclass links", self.links.len())?;
            c.all_superclasses.check("precedence links", self.links.len())?;
            c.slots.check("slots", self.slots.len())?;
            c.template.check("template", self.template.len())?;
            c.slot_name_map.check("slot-name map", self.slot_name_maps.len())?;
            c.handlers.check("handlers", self.handlers.len())?;
            if c.all_superclasses.count == 0 {
                return Err(ImageError::CorruptedData("empty precedence list"));
            }
        }
        for &link in &self.links {
            check_index("class link", link, classes)?;
        }
        for s in &self.slot_names {
            check_index("slot name", s.name, self.symbols.len())?;
        }
        for s in &self.slots {
            check_index("slot class", s.class, classes)?;
            check_index("slot name record", s.slot_name, self.slot_names.len())?;
            check_optional("slot constraint", s.constraint, self.constraints.len())?;
            check_index("override message", s.override_message, self.symbols.len())?;
            match s.default_kind {
                DEFAULT_NONE => {}
                DEFAULT_STATIC => {
                    let i = check_index("slot default", s.default, self.expressions.len())?;
                    if !matches!(self.expressions[i], Expression::Constant(_)) {
                        return Err(ImageError::CorruptedData("static default is not a constant"));
                    }
                }
                DEFAULT_DYNAMIC => {
                    check_index("slot default", s.default, self.expressions.len())?;
                }
                _ => return Err(ImageError::CorruptedData("default kind")),
            }
        }
        for &t in &self.template {
            check_index("template slot", t, self.slots.len())?;
        }
        for h in &self.handlers {
            check_index("handler class", h.class, classes)?;
            check_index("handler name", h.name, self.symbols.len())?;
            check_optional("handler actions", h.actions, self.expressions.len())?;
            if HandlerKind::from_code(h.kind).is_none() {
                return Err(ImageError::CorruptedData("handler kind"));
            }
        }
        for c in &self.classes {
            let count = c.handlers.count as usize;
            for &pos in &self.handler_orders[c.handlers.range()] {
                if pos as usize >= count {
                    return Err(ImageError::IndexOutOfRange {
                        what: "handler order",
                        index: pos as i64,
                        len: count,
                    });
                }
            }
        }
        Ok(())
    }
}
