//! Class runtime errors
//!
//! User-facing failures (unknown names, bad keywords, inheritance conflicts)
//! and structural-consistency failures (traversal exhaustion, allocator
//! misuse) are both ordinary [`ClassError`] values and leave every table
//! unchanged. Violations of the dense slot-name id invariant are not
//! errors: they panic.

use thiserror::Error;

/// Errors raised by class definition, deletion and introspection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassError {
    /// No class with this name is defined
    #[error("Unable to find class {0}")]
    UnknownClass(String),

    /// The class has no slot with this name
    #[error("Unable to find slot {slot} in class {class}")]
    UnknownSlot {
        /// Class name
        class: String,
        /// Slot name
        slot: String,
    },

    /// An inherited slot was named where only local slots are valid
    #[error("Inherited slot {slot} from class {source_class} is not valid for {operation}")]
    InheritedSlot {
        /// Slot name
        slot: String,
        /// Class that declared the slot
        source_class: String,
        /// Operation that rejected it
        operation: &'static str,
    },

    /// A keyword argument did not match the expected keyword
    #[error("Expected keyword \"{expected}\", found {found}")]
    InvalidKeyword {
        /// Keyword accepted by the operation
        expected: &'static str,
        /// Text actually supplied
        found: String,
    },

    /// Handler kind text is not around, before, primary or after
    #[error("Unrecognized message-handler type {0}")]
    UnknownHandlerKind(String),

    /// No handler with this name and kind exists on the class
    #[error("Unable to find message-handler {name} {kind} in class {class}")]
    UnknownHandler {
        /// Class name
        class: String,
        /// Handler name
        name: String,
        /// Handler kind
        kind: &'static str,
    },

    /// No module with this name is defined
    #[error("Unable to find module {0}")]
    UnknownModule(String),

    /// A class of this name exists and cannot be redefined
    #[error("Class {0} is already defined and cannot be redefined")]
    AlreadyDefined(String),

    /// A superclass named in a definition is not defined
    #[error("Unable to find superclass {superclass} of class {class}")]
    UnknownSuperclass {
        /// Class being defined
        class: String,
        /// Missing superclass
        superclass: String,
    },

    /// A superclass is named twice in one definition
    #[error("Class {superclass} appears more than once in the superclasses of {class}")]
    DuplicateSuperclass {
        /// Class being defined
        class: String,
        /// Repeated superclass
        superclass: String,
    },

    /// A slot is named twice in one definition
    #[error("Duplicate slot {slot} in class {class}")]
    DuplicateSlot {
        /// Class being defined
        class: String,
        /// Repeated slot
        slot: String,
    },

    /// No precedence list satisfies every superclass ordering
    #[error("Illegal inheritance precedence for class {0}")]
    InconsistentPrecedence(String),

    /// The class or one of its subclasses or handlers is busy
    #[error("Class {0} is in use")]
    ClassInUse(String),

    /// The class still has subclasses
    #[error("Class {0} has subclasses")]
    HasSubclasses(String),

    /// System classes cannot be changed or deleted
    #[error("System class {0} cannot be modified")]
    SystemClass(String),

    /// A handler is busy and cannot be removed
    #[error("Message-handler {name} in class {class} is in use")]
    HandlerInUse {
        /// Class name
        class: String,
        /// Handler name
        name: String,
    },

    /// A dynamic default failed to evaluate
    #[error("Evaluation of default for slot {slot} failed: {message}")]
    Evaluation {
        /// Slot name
        slot: String,
        /// Evaluator message
        message: String,
    },

    /// Every traversal id is held
    #[error("Maximum number of simultaneous class hierarchy traversals ({0}) exceeded")]
    TraversalExhausted(usize),

    /// A traversal id was released out of acquisition order
    #[error("Traversal id {released} released while {expected} is the innermost")]
    TraversalOrder {
        /// Innermost held id
        expected: u16,
        /// Id passed to release
        released: u16,
    },

    /// The class id map was re-initialized while classes exist
    #[error("Class id map re-initialized while {0} classes are defined")]
    AllocatorActive(usize),

    /// Every class id is in use
    #[error("No class ids available")]
    ClassIdsExhausted,

    /// Every slot-name id is in use
    #[error("No slot-name ids available")]
    SlotNamesExhausted,

    /// Removing a subclass did not shrink the parent's subclass list
    #[error("Deletion of class {0} aborted: subclass list did not shrink")]
    DeleteAborted(String),

    /// A binary image is loaded and its classes cannot change
    #[error("Cannot modify classes while a binary image is loaded")]
    ImageActive,

    /// Options failed validation
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
}

/// Result type for class operations
pub type ClassResult<T> = Result<T, ClassError>;
