//! Slot constraint records
//!
//! A constraint restricts the values a slot may hold: allowed primitive
//! types, an explicit list of allowed values, allowed instance classes, a
//! numeric range and, for multifield slots, a cardinality.

use crate::codec::{
    read_len, read_string, read_u16, read_u8, write_str, write_u16, write_u32, write_u8,
};
use crate::value::Value;
use crate::CommonResult;
use bitflags::bitflags;
use std::io::{Read, Write};

bitflags! {
    /// Primitive types a slot may hold
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeSet: u16 {
        /// Floating point numbers
        const FLOAT = 1 << 0;
        /// Integers
        const INTEGER = 1 << 1;
        /// Symbols
        const SYMBOL = 1 << 2;
        /// Strings
        const STRING = 1 << 3;
        /// External addresses
        const EXTERNAL_ADDRESS = 1 << 4;
        /// Fact addresses
        const FACT_ADDRESS = 1 << 5;
        /// Instance addresses
        const INSTANCE_ADDRESS = 1 << 6;
        /// Instance names
        const INSTANCE_NAME = 1 << 7;
    }
}

impl TypeSet {
    /// Primitive class names of the set types, in type-code order
    pub fn type_names(self) -> Vec<&'static str> {
        const NAMES: [(TypeSet, &str); 8] = [
            (TypeSet::FLOAT, "FLOAT"),
            (TypeSet::INTEGER, "INTEGER"),
            (TypeSet::SYMBOL, "SYMBOL"),
            (TypeSet::STRING, "STRING"),
            (TypeSet::EXTERNAL_ADDRESS, "EXTERNAL-ADDRESS"),
            (TypeSet::FACT_ADDRESS, "FACT-ADDRESS"),
            (TypeSet::INSTANCE_ADDRESS, "INSTANCE-ADDRESS"),
            (TypeSet::INSTANCE_NAME, "INSTANCE-NAME"),
        ];
        NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

/// Value restrictions attached to a slot
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintRecord {
    /// No type restriction at all
    pub any_allowed: bool,
    /// Allowed primitive types when `any_allowed` is false
    pub types: TypeSet,
    /// Explicit allowed values; empty means unrestricted
    pub allowed_values: Vec<Value>,
    /// Allowed instance classes; empty means unrestricted
    pub allowed_classes: Vec<String>,
    /// Numeric range `(min, max)`
    pub range: (Value, Value),
    /// Field count bounds `(min, max)` for multifield slots
    pub cardinality: (Value, Value),
}

impl ConstraintRecord {
    /// Unrestricted constraint
    pub fn any() -> Self {
        Self {
            any_allowed: true,
            types: TypeSet::empty(),
            allowed_values: Vec::new(),
            allowed_classes: Vec::new(),
            range: (Value::negative_infinity(), Value::positive_infinity()),
            cardinality: (Value::Integer(0), Value::positive_infinity()),
        }
    }

    /// Constraint allowing only `types`
    pub fn of_types(types: TypeSet) -> Self {
        Self {
            any_allowed: false,
            types,
            ..Self::any()
        }
    }

    /// Restrict to explicit values
    pub fn with_allowed_values(mut self, values: Vec<Value>) -> Self {
        self.allowed_values = values;
        self
    }

    /// Restrict instance classes
    pub fn with_allowed_classes(mut self, classes: Vec<String>) -> Self {
        self.allowed_classes = classes;
        self
    }

    /// Set the numeric range
    pub fn with_range(mut self, min: Value, max: Value) -> Self {
        self.range = (min, max);
        self
    }

    /// Set the cardinality bounds
    pub fn with_cardinality(mut self, min: Value, max: Value) -> Self {
        self.cardinality = (min, max);
        self
    }

    /// Effective type set, all types when unrestricted
    pub fn allowed_types(&self) -> TypeSet {
        if self.any_allowed {
            TypeSet::all()
        } else {
            self.types
        }
    }

    /// True if floats or integers may be stored
    pub fn allows_numbers(&self) -> bool {
        self.any_allowed || self.types.intersects(TypeSet::FLOAT | TypeSet::INTEGER)
    }

    /// Encode the record
    pub fn encode(&self, writer: &mut impl Write) -> std::io::Result<()> {
        write_u8(writer, self.any_allowed as u8)?;
        write_u16(writer, self.types.bits())?;
        write_u32(writer, self.allowed_values.len() as u32)?;
        for value in &self.allowed_values {
            value.encode(writer)?;
        }
        write_u32(writer, self.allowed_classes.len() as u32)?;
        for class in &self.allowed_classes {
            write_str(writer, class)?;
        }
        self.range.0.encode(writer)?;
        self.range.1.encode(writer)?;
        self.cardinality.0.encode(writer)?;
        self.cardinality.1.encode(writer)
    }

    /// Decode a record
    pub fn decode(reader: &mut impl Read) -> CommonResult<Self> {
        let any_allowed = read_u8(reader)? != 0;
        let types = TypeSet::from_bits_truncate(read_u16(reader)?);
        let count = read_len(reader)?;
        let mut allowed_values = Vec::with_capacity(count.min(256));
        for _ in 0..count {
            allowed_values.push(Value::decode(reader)?);
        }
        let count = read_len(reader)?;
        let mut allowed_classes = Vec::with_capacity(count.min(256));
        for _ in 0..count {
            allowed_classes.push(read_string(reader)?);
        }
        let range = (Value::decode(reader)?, Value::decode(reader)?);
        let cardinality = (Value::decode(reader)?, Value::decode(reader)?);
        Ok(Self {
            any_allowed,
            types,
            allowed_values,
            allowed_classes,
            range,
            cardinality,
        })
    }
}

impl Default for ConstraintRecord {
    fn default() -> Self {
        Self::any()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names_in_code_order() {
        let set = TypeSet::INSTANCE_NAME | TypeSet::SYMBOL | TypeSet::FLOAT;
        assert_eq!(set.type_names(), vec!["FLOAT", "SYMBOL", "INSTANCE-NAME"]);
    }

    #[test]
    fn test_any_allows_numbers() {
        assert!(ConstraintRecord::any().allows_numbers());
        assert!(!ConstraintRecord::of_types(TypeSet::SYMBOL).allows_numbers());
        assert!(ConstraintRecord::of_types(TypeSet::INTEGER).allows_numbers());
        assert_eq!(ConstraintRecord::any().allowed_types(), TypeSet::all());
    }

    #[test]
    fn test_record_decodes_restrictions() {
        let record = ConstraintRecord::of_types(TypeSet::SYMBOL)
            .with_allowed_values(vec![Value::symbol("red"), Value::symbol("green")])
            .with_allowed_classes(vec!["POINT".into()])
            .with_cardinality(Value::Integer(1), Value::Integer(3));
        let mut buf = Vec::new();
        record.encode(&mut buf).unwrap();
        assert_eq!(ConstraintRecord::decode(&mut &buf[..]).unwrap(), record);
    }
}
