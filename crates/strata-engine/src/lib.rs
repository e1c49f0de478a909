//! Strata Engine
//!
//! A run-time class metadata system. An [`Environment`] owns every table:
//! - Class definitions indexed by name and by dense class id
//! - Packed hierarchy links and linearized precedence lists
//! - Slot descriptors, instance templates and slot-name maps
//! - Message-handler tables with their dispatch-order maps
//! - Introspection queries and text reports ([`reflect`])
//! - A relocatable binary image codec ([`image`])
//!
//! Environments share nothing and perform no internal locking; a host
//! that shares one across threads wraps it in a single lock.

#![warn(missing_docs)]

pub mod class;
pub mod env;
pub mod error;
pub mod handler;
pub mod image;
pub mod module;
pub mod options;
pub mod reflect;
pub mod slot;

pub use class::{ClassBuilder, ClassDef, ClassFlags, ClassId};
pub use env::Environment;
pub use error::{ClassError, ClassResult};
pub use handler::{Handler, HandlerBuilder, HandlerKind};
pub use image::{ImageError, ImageStats};
pub use module::ModuleId;
pub use options::EnvOptions;
pub use reflect::{DefaultKind, HandlerSummary};
pub use slot::{Accessor, DefaultValue, SlotBuilder, SlotDescriptor, SlotFacets, SlotNameId};

pub use strata_common::{ConstraintRecord, Evaluator, Expression, TypeSet, Value};
