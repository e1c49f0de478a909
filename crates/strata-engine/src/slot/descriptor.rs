//! Slot descriptors and facets
//!
//! Facets are stored as bits. Writability and initializability are pure
//! functions of the `NO_WRITE` and `INITIALIZE_ONLY` bits:
//!
//! | no-write | initialize-only | writable | initable |
//! |----------|-----------------|----------|----------|
//! | false    | false           | yes      | yes      |
//! | false    | true            | no       | yes      |
//! | true     | true            | no       | yes      |
//! | true     | false           | no       | no       |

use crate::class::ClassId;
use crate::slot::SlotNameId;
use bitflags::bitflags;
use strata_common::{ConstraintRecord, Expression, Symbol, TypeSet, Value};

bitflags! {
    /// Boolean slot facets
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SlotFacets: u16 {
        /// One value shared by all instances
        const SHARED = 1 << 0;
        /// Multifield slot
        const MULTIPLE = 1 << 1;
        /// Facets compose with inherited definitions
        const COMPOSITE = 1 << 2;
        /// Hidden from subclasses
        const NO_INHERIT = 1 << 3;
        /// Cannot be written after creation
        const NO_WRITE = 1 << 4;
        /// Writable only during initialization
        const INITIALIZE_ONLY = 1 << 5;
        /// Visible to subclass handlers
        const PUBLIC = 1 << 6;
        /// Generate a get- accessor
        const CREATE_READ_ACCESSOR = 1 << 7;
        /// Generate a put- accessor
        const CREATE_WRITE_ACCESSOR = 1 << 8;
        /// Changes re-trigger pattern matching
        const REACTIVE = 1 << 9;
        /// Override message was given explicitly
        const OVERRIDE_MESSAGE = 1 << 10;
    }
}

/// Which accessors are generated for a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessor {
    /// No accessors
    None,
    /// get- only
    Read,
    /// put- only
    Write,
    /// get- and put-
    ReadWrite,
}

impl Accessor {
    /// Facet bits for this accessor choice
    pub fn facets(self) -> SlotFacets {
        match self {
            Accessor::None => SlotFacets::empty(),
            Accessor::Read => SlotFacets::CREATE_READ_ACCESSOR,
            Accessor::Write => SlotFacets::CREATE_WRITE_ACCESSOR,
            Accessor::ReadWrite => {
                SlotFacets::CREATE_READ_ACCESSOR | SlotFacets::CREATE_WRITE_ACCESSOR
            }
        }
    }

    /// Short code: `R`, `W`, `RW` or `NIL`
    pub fn code(self) -> &'static str {
        match self {
            Accessor::None => "NIL",
            Accessor::Read => "R",
            Accessor::Write => "W",
            Accessor::ReadWrite => "RW",
        }
    }
}

/// Slot default
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// No default; queries report `?NONE` and nothing is evaluated
    None,
    /// Pre-evaluated value
    Static(Value),
    /// Expression re-evaluated on every request
    Dynamic(Expression),
}

/// A slot declared by a class
#[derive(Debug, Clone)]
pub struct SlotDescriptor {
    pub(crate) class: ClassId,
    pub(crate) name: SlotNameId,
    pub(crate) facets: SlotFacets,
    pub(crate) default: DefaultValue,
    pub(crate) constraint: Option<ConstraintRecord>,
    pub(crate) override_message: Symbol,
}

impl SlotDescriptor {
    /// Declaring class
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Slot-name id
    pub fn name(&self) -> SlotNameId {
        self.name
    }

    /// Facet bits
    pub fn facets(&self) -> SlotFacets {
        self.facets
    }

    /// Default value
    pub fn default_value(&self) -> &DefaultValue {
        &self.default
    }

    /// Constraint record, if any
    pub fn constraint(&self) -> Option<&ConstraintRecord> {
        self.constraint.as_ref()
    }

    /// Message sent to write the slot
    pub fn override_message(&self) -> Symbol {
        self.override_message
    }

    /// Writable after creation
    pub fn is_writable(&self) -> bool {
        !self
            .facets
            .intersects(SlotFacets::NO_WRITE | SlotFacets::INITIALIZE_ONLY)
    }

    /// Writable during initialization
    pub fn is_initable(&self) -> bool {
        !(self.facets.contains(SlotFacets::NO_WRITE)
            && !self.facets.contains(SlotFacets::INITIALIZE_ONLY))
    }

    /// Visible to subclass handlers
    pub fn is_public(&self) -> bool {
        self.facets.contains(SlotFacets::PUBLIC)
    }

    /// Multifield slot
    pub fn is_multiple(&self) -> bool {
        self.facets.contains(SlotFacets::MULTIPLE)
    }

    /// Shared slot
    pub fn is_shared(&self) -> bool {
        self.facets.contains(SlotFacets::SHARED)
    }

    /// Composite facets
    pub fn is_composite(&self) -> bool {
        self.facets.contains(SlotFacets::COMPOSITE)
    }

    /// Hidden from subclasses
    pub fn is_no_inherit(&self) -> bool {
        self.facets.contains(SlotFacets::NO_INHERIT)
    }

    /// Reactive slot
    pub fn is_reactive(&self) -> bool {
        self.facets.contains(SlotFacets::REACTIVE)
    }

    /// Generated accessors
    pub fn accessor(&self) -> Accessor {
        match (
            self.facets.contains(SlotFacets::CREATE_READ_ACCESSOR),
            self.facets.contains(SlotFacets::CREATE_WRITE_ACCESSOR),
        ) {
            (true, true) => Accessor::ReadWrite,
            (true, false) => Accessor::Read,
            (false, true) => Accessor::Write,
            (false, false) => Accessor::None,
        }
    }
}

/// Slot declaration consumed by class definition
#[derive(Debug, Clone)]
pub struct SlotBuilder {
    pub(crate) name: String,
    pub(crate) facets: SlotFacets,
    pub(crate) default: Option<DefaultValue>,
    pub(crate) constraint: Option<ConstraintRecord>,
    pub(crate) override_message: Option<String>,
}

impl SlotBuilder {
    /// Single-field, local, inheritable, read-write, private, reactive,
    /// exclusive slot with read-write accessors
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            facets: SlotFacets::REACTIVE | Accessor::ReadWrite.facets(),
            default: None,
            constraint: None,
            override_message: None,
        }
    }

    /// Make the slot multifield
    pub fn multiple(mut self) -> Self {
        self.facets |= SlotFacets::MULTIPLE;
        self
    }

    /// Share one value across instances
    pub fn shared(mut self) -> Self {
        self.facets |= SlotFacets::SHARED;
        self
    }

    /// Compose facets with inherited definitions
    pub fn composite(mut self) -> Self {
        self.facets |= SlotFacets::COMPOSITE;
        self
    }

    /// Hide from subclasses
    pub fn no_inherit(mut self) -> Self {
        self.facets |= SlotFacets::NO_INHERIT;
        self
    }

    /// Forbid all writes
    pub fn read_only(mut self) -> Self {
        self.facets |= SlotFacets::NO_WRITE;
        self.facets -= SlotFacets::INITIALIZE_ONLY;
        self
    }

    /// Allow writes only during initialization
    pub fn initialize_only(mut self) -> Self {
        self.facets |= SlotFacets::NO_WRITE | SlotFacets::INITIALIZE_ONLY;
        self
    }

    /// Visible to subclass handlers
    pub fn public(mut self) -> Self {
        self.facets |= SlotFacets::PUBLIC;
        self
    }

    /// Choose generated accessors
    pub fn create_accessor(mut self, accessor: Accessor) -> Self {
        self.facets -= Accessor::ReadWrite.facets();
        self.facets |= accessor.facets();
        self
    }

    /// Exclude from pattern matching
    pub fn non_reactive(mut self) -> Self {
        self.facets -= SlotFacets::REACTIVE;
        self
    }

    /// Static default value
    pub fn default_static(mut self, value: Value) -> Self {
        self.default = Some(DefaultValue::Static(value));
        self
    }

    /// Default re-evaluated on every request
    pub fn default_dynamic(mut self, expr: Expression) -> Self {
        self.default = Some(DefaultValue::Dynamic(expr));
        self
    }

    /// No default at all
    pub fn no_default(mut self) -> Self {
        self.default = Some(DefaultValue::None);
        self
    }

    /// Attach a constraint record
    pub fn constraint(mut self, constraint: ConstraintRecord) -> Self {
        self.constraint = Some(constraint);
        self
    }

    /// Message used to write the slot
    pub fn override_message(mut self, message: impl Into<String>) -> Self {
        self.override_message = Some(message.into());
        self.facets |= SlotFacets::OVERRIDE_MESSAGE;
        self
    }

    /// Slot name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default used when none was declared
    ///
    /// Multifield slots default to an empty multifield. Single-field slots
    /// take the first allowed value, else a range bound of the first numeric
    /// type allowed, else the empty string for string-only slots, else `nil`.
    pub(crate) fn derived_default(&self) -> DefaultValue {
        if self.facets.contains(SlotFacets::MULTIPLE) {
            return DefaultValue::Static(Value::Multifield(Vec::new()));
        }
        let Some(constraint) = &self.constraint else {
            return DefaultValue::Static(Value::symbol("nil"));
        };
        if let Some(first) = constraint.allowed_values.first() {
            return DefaultValue::Static(first.clone());
        }
        let types = constraint.allowed_types();
        let value = if types.contains(TypeSet::SYMBOL) {
            Value::symbol("nil")
        } else if types.contains(TypeSet::INTEGER) {
            range_bound(&constraint.range, Value::Integer(0))
        } else if types.contains(TypeSet::FLOAT) {
            range_bound(&constraint.range, Value::Float(0.0))
        } else if types.contains(TypeSet::STRING) {
            Value::Str(String::new())
        } else if types.contains(TypeSet::INSTANCE_NAME) {
            Value::InstanceName("nil".into())
        } else {
            Value::symbol("nil")
        };
        DefaultValue::Static(value)
    }
}

/// The finite minimum of a range, else its finite maximum, else `zero`
fn range_bound(range: &(Value, Value), zero: Value) -> Value {
    let finite = |v: &Value| matches!(v, Value::Integer(_) | Value::Float(_));
    [&range.0, &range.1]
        .into_iter()
        .find(|v| finite(v))
        .cloned()
        .unwrap_or(zero)
}
