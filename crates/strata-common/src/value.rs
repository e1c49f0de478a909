//! Runtime values stored as slot defaults and constraint bounds

use crate::codec::{
    read_f64, read_i64, read_len, read_string, read_u8, write_f64, write_i64, write_str,
    write_u32, write_u8,
};
use crate::{CommonError, CommonResult};
use std::fmt;
use std::io::{Read, Write};

/// Text of the marker returned for slots without a default
pub const NONE_MARKER: &str = "?NONE";
/// Text of the negative infinity bound
pub const NEGATIVE_INFINITY: &str = "-oo";
/// Text of the positive infinity bound
pub const POSITIVE_INFINITY: &str = "+oo";

/// A single runtime value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Unquoted symbol
    Symbol(String),
    /// Quoted string
    Str(String),
    /// 64-bit integer
    Integer(i64),
    /// 64-bit float
    Float(f64),
    /// Instance name, printed in brackets
    InstanceName(String),
    /// Ordered list of values
    Multifield(Vec<Value>),
    /// No value
    Void,
}

const TAG_SYMBOL: u8 = 0;
const TAG_STR: u8 = 1;
const TAG_INTEGER: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_INSTANCE_NAME: u8 = 4;
const TAG_MULTIFIELD: u8 = 5;
const TAG_VOID: u8 = 6;

impl Value {
    /// Symbol value from text
    pub fn symbol(text: impl Into<String>) -> Self {
        Value::Symbol(text.into())
    }

    /// The `?NONE` marker
    pub fn none_marker() -> Self {
        Value::symbol(NONE_MARKER)
    }

    /// The `-oo` bound
    pub fn negative_infinity() -> Self {
        Value::symbol(NEGATIVE_INFINITY)
    }

    /// The `+oo` bound
    pub fn positive_infinity() -> Self {
        Value::symbol(POSITIVE_INFINITY)
    }

    /// True for the `?NONE` marker
    pub fn is_none_marker(&self) -> bool {
        matches!(self, Value::Symbol(s) if s == NONE_MARKER)
    }

    /// True for integers and floats
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// Wrap in a multifield unless already one
    pub fn into_multifield(self) -> Self {
        match self {
            Value::Multifield(_) => self,
            Value::Void => Value::Multifield(Vec::new()),
            other => Value::Multifield(vec![other]),
        }
    }

    /// Encode with a one-byte type tag
    pub fn encode(&self, writer: &mut impl Write) -> std::io::Result<()> {
        match self {
            Value::Symbol(s) => {
                write_u8(writer, TAG_SYMBOL)?;
                write_str(writer, s)
            }
            Value::Str(s) => {
                write_u8(writer, TAG_STR)?;
                write_str(writer, s)
            }
            Value::Integer(i) => {
                write_u8(writer, TAG_INTEGER)?;
                write_i64(writer, *i)
            }
            Value::Float(f) => {
                write_u8(writer, TAG_FLOAT)?;
                write_f64(writer, *f)
            }
            Value::InstanceName(s) => {
                write_u8(writer, TAG_INSTANCE_NAME)?;
                write_str(writer, s)
            }
            Value::Multifield(items) => {
                write_u8(writer, TAG_MULTIFIELD)?;
                write_u32(writer, items.len() as u32)?;
                for item in items {
                    item.encode(writer)?;
                }
                Ok(())
            }
            Value::Void => write_u8(writer, TAG_VOID),
        }
    }

    /// Decode a tagged value
    pub fn decode(reader: &mut impl Read) -> CommonResult<Self> {
        let tag = read_u8(reader)?;
        Ok(match tag {
            TAG_SYMBOL => Value::Symbol(read_string(reader)?),
            TAG_STR => Value::Str(read_string(reader)?),
            TAG_INTEGER => Value::Integer(read_i64(reader)?),
            TAG_FLOAT => Value::Float(read_f64(reader)?),
            TAG_INSTANCE_NAME => Value::InstanceName(read_string(reader)?),
            TAG_MULTIFIELD => {
                let len = read_len(reader)?;
                let mut items = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    items.push(Value::decode(reader)?);
                }
                Value::Multifield(items)
            }
            TAG_VOID => Value::Void,
            tag => return Err(CommonError::InvalidTag { what: "value", tag }),
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Symbol(s) => write!(f, "{}", s),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => {
                if x.fract() == 0.0 && x.is_finite() {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{}", x)
                }
            }
            Value::InstanceName(s) => write!(f, "[{}]", s),
            Value::Multifield(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Value::Void => Ok(()),
        }
    }
}
