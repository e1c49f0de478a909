//! Built-in system classes
//!
//! ```text
//! OBJECT
//!   USER
//!     INITIAL-OBJECT
//!   PRIMITIVE
//!     NUMBER: INTEGER FLOAT
//!     LEXEME: SYMBOL STRING
//!     MULTIFIELD
//!     ADDRESS: EXTERNAL-ADDRESS FACT-ADDRESS INSTANCE-ADDRESS
//!     INSTANCE: INSTANCE-ADDRESS INSTANCE-NAME
//! ```
//!
//! `INSTANCE-ADDRESS` inherits from both `ADDRESS` and `INSTANCE`.
//!
//! Every system class is abstract except `INITIAL-OBJECT`, which is also
//! the only reactive one. `USER` carries the standard system handlers.

use super::define::ClassBuilder;
use crate::env::Environment;
use crate::error::ClassResult;
use crate::handler::HandlerBuilder;

/// Root of the hierarchy
pub const OBJECT_CLASS: &str = "OBJECT";
/// Implicit superclass of user classes
pub const USER_CLASS: &str = "USER";
/// Concrete system class
pub const INITIAL_OBJECT_CLASS: &str = "INITIAL-OBJECT";

/// `(class, direct superclasses)` in definition order
const LATTICE: [(&str, &[&str]); 17] = [
    (OBJECT_CLASS, &[]),
    ("PRIMITIVE", &[OBJECT_CLASS]),
    ("NUMBER", &["PRIMITIVE"]),
    ("INTEGER", &["NUMBER"]),
    ("FLOAT", &["NUMBER"]),
    ("LEXEME", &["PRIMITIVE"]),
    ("SYMBOL", &["LEXEME"]),
    ("STRING", &["LEXEME"]),
    ("MULTIFIELD", &["PRIMITIVE"]),
    ("ADDRESS", &["PRIMITIVE"]),
    ("EXTERNAL-ADDRESS", &["ADDRESS"]),
    ("FACT-ADDRESS", &["ADDRESS"]),
    ("INSTANCE", &["PRIMITIVE"]),
    ("INSTANCE-ADDRESS", &["ADDRESS", "INSTANCE"]),
    ("INSTANCE-NAME", &["INSTANCE"]),
    (USER_CLASS, &[OBJECT_CLASS]),
    (INITIAL_OBJECT_CLASS, &[USER_CLASS]),
];

/// Names of all system classes in definition order
pub const SYSTEM_CLASS_NAMES: [&str; 17] = {
    let mut names = [""; 17];
    let mut i = 0;
    while i < LATTICE.len() {
        names[i] = LATTICE[i].0;
        i += 1;
    }
    names
};

/// `(name, min args, max args)` of the handlers every user class inherits
const USER_HANDLERS: [(&str, i16, i16); 8] = [
    ("init", 0, 0),
    ("delete", 0, 0),
    ("create", 0, 0),
    ("print", 0, 0),
    ("direct-modify", 1, 1),
    ("message-modify", 1, 1),
    ("direct-duplicate", 2, 2),
    ("message-duplicate", 2, 2),
];

impl Environment {
    /// Install the system classes; a no-op if they already exist
    pub fn create_system_classes(&mut self) -> ClassResult<()> {
        if self.find_class(OBJECT_CLASS).is_some() {
            return Ok(());
        }
        for (name, superclasses) in LATTICE {
            let mut builder = ClassBuilder::new(name).system();
            builder = if name == INITIAL_OBJECT_CLASS {
                builder
            } else {
                builder.abstract_class()
            };
            for &sup in superclasses {
                builder = builder.superclass(sup);
            }
            if name == USER_CLASS {
                for (handler, min, max) in USER_HANDLERS {
                    builder =
                        builder.handler(HandlerBuilder::new(handler).params(min, max).system());
                }
            }
            self.define_class(builder)?;
        }
        tracing::debug!(count = LATTICE.len(), "system classes created");
        Ok(())
    }
}
