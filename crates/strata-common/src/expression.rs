//! Opaque expressions for dynamic defaults and handler bodies
//!
//! The class runtime never interprets an [`Expression`]; it stores, encodes
//! and hands it to a caller-supplied [`Evaluator`].

use crate::codec::{read_len, read_string, read_u8, write_str, write_u32, write_u8};
use crate::value::Value;
use crate::{CommonError, CommonResult};
use std::fmt;
use std::io::{Read, Write};

/// Unevaluated expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal value
    Constant(Value),
    /// Variable reference by name
    Variable(String),
    /// Function call
    Call {
        /// Function name
        function: String,
        /// Argument expressions
        args: Vec<Expression>,
    },
}

const TAG_CONSTANT: u8 = 0;
const TAG_VARIABLE: u8 = 1;
const TAG_CALL: u8 = 2;

impl Expression {
    /// Call expression helper
    pub fn call(function: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::Call {
            function: function.into(),
            args,
        }
    }

    /// Number of nodes in the tree
    pub fn size(&self) -> usize {
        match self {
            Expression::Call { args, .. } => 1 + args.iter().map(Expression::size).sum::<usize>(),
            _ => 1,
        }
    }

    /// Encode the tree in prefix order
    pub fn encode(&self, writer: &mut impl Write) -> std::io::Result<()> {
        match self {
            Expression::Constant(value) => {
                write_u8(writer, TAG_CONSTANT)?;
                value.encode(writer)
            }
            Expression::Variable(name) => {
                write_u8(writer, TAG_VARIABLE)?;
                write_str(writer, name)
            }
            Expression::Call { function, args } => {
                write_u8(writer, TAG_CALL)?;
                write_str(writer, function)?;
                write_u32(writer, args.len() as u32)?;
                for arg in args {
                    arg.encode(writer)?;
                }
                Ok(())
            }
        }
    }

    /// Decode a prefix-ordered tree
    pub fn decode(reader: &mut impl Read) -> CommonResult<Self> {
        let tag = read_u8(reader)?;
        Ok(match tag {
            TAG_CONSTANT => Expression::Constant(Value::decode(reader)?),
            TAG_VARIABLE => Expression::Variable(read_string(reader)?),
            TAG_CALL => {
                let function = read_string(reader)?;
                let len = read_len(reader)?;
                let mut args = Vec::with_capacity(len.min(256));
                for _ in 0..len {
                    args.push(Expression::decode(reader)?);
                }
                Expression::Call { function, args }
            }
            tag => {
                return Err(CommonError::InvalidTag {
                    what: "expression",
                    tag,
                })
            }
        })
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Constant(value) => write!(f, "{}", value),
            Expression::Variable(name) => write!(f, "?{}", name),
            Expression::Call { function, args } => {
                write!(f, "({}", function)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Evaluates expressions on behalf of the class runtime
pub trait Evaluator {
    /// Evaluate `expr`; errors are reported as text
    fn evaluate(&mut self, expr: &Expression) -> Result<Value, String>;
}

impl<F> Evaluator for F
where
    F: FnMut(&Expression) -> Result<Value, String>,
{
    fn evaluate(&mut self, expr: &Expression) -> Result<Value, String> {
        self(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_call() {
        let expr = Expression::call(
            "+",
            vec![
                Expression::Constant(Value::Integer(1)),
                Expression::Variable("x".into()),
            ],
        );
        assert_eq!(expr.to_string(), "(+ 1 ?x)");
        assert_eq!(expr.size(), 3);
    }

    #[test]
    fn test_closure_evaluator() {
        let mut calls = 0;
        let mut eval = |_: &Expression| -> Result<Value, String> {
            calls += 1;
            Ok(Value::Integer(calls))
        };
        let expr = Expression::call("gensym", vec![]);
        assert_eq!(eval.evaluate(&expr).unwrap(), Value::Integer(1));
        assert_eq!(eval.evaluate(&expr).unwrap(), Value::Integer(2));
    }

    #[test]
    fn test_decode_call_tree() {
        let expr = Expression::call(
            "create$",
            vec![Expression::Constant(Value::symbol("a"))],
        );
        let mut buf = Vec::new();
        expr.encode(&mut buf).unwrap();
        assert_eq!(Expression::decode(&mut &buf[..]).unwrap(), expr);
    }
}
