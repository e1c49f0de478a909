//! Message handlers
//!
//! Each class stores its handlers in a flat array plus an order map listing
//! handler positions sorted by `(name, kind)`. The runtime stores, looks up
//! and persists handlers; dispatch belongs to the message-passing layer.

mod define;

use crate::class::ClassId;
use crate::error::ClassError;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use strata_common::{Expression, Symbol, SymbolTable};

/// Handler role in message dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HandlerKind {
    /// Wraps the rest of the dispatch
    Around = 0,
    /// Runs before primaries
    Before = 1,
    /// Produces the result
    Primary = 2,
    /// Runs after primaries
    After = 3,
}

impl HandlerKind {
    /// All kinds in code order
    pub const ALL: [HandlerKind; 4] = [
        HandlerKind::Around,
        HandlerKind::Before,
        HandlerKind::Primary,
        HandlerKind::After,
    ];

    /// Keyword text
    pub fn as_str(self) -> &'static str {
        match self {
            HandlerKind::Around => "around",
            HandlerKind::Before => "before",
            HandlerKind::Primary => "primary",
            HandlerKind::After => "after",
        }
    }

    /// Numeric code used in binary images
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Kind from its numeric code
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }
}

impl FromStr for HandlerKind {
    type Err = ClassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ClassError::UnknownHandlerKind(s.to_string()))
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A handler attached to a class
#[derive(Debug, Clone)]
pub struct Handler {
    pub(crate) class: ClassId,
    pub(crate) name: Symbol,
    pub(crate) kind: HandlerKind,
    pub(crate) system: bool,
    pub(crate) min_params: i16,
    pub(crate) max_params: i16,
    pub(crate) local_var_count: u16,
    pub(crate) actions: Option<Expression>,
    pub(crate) busy: u32,
}

impl Handler {
    /// Owning class
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Interned message name
    pub fn name(&self) -> Symbol {
        self.name
    }

    /// Handler kind
    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    /// Built-in handler
    pub fn is_system(&self) -> bool {
        self.system
    }

    /// Minimum argument count
    pub fn min_params(&self) -> i16 {
        self.min_params
    }

    /// Maximum argument count, -1 for a wildcard
    pub fn max_params(&self) -> i16 {
        self.max_params
    }

    /// Number of local variables the body uses
    pub fn local_var_count(&self) -> u16 {
        self.local_var_count
    }

    /// Body, opaque to the runtime
    pub fn actions(&self) -> Option<&Expression> {
        self.actions.as_ref()
    }

    /// Busy count
    pub fn busy(&self) -> u32 {
        self.busy
    }
}

/// Handler declaration
#[derive(Debug, Clone)]
pub struct HandlerBuilder {
    pub(crate) name: String,
    pub(crate) kind: HandlerKind,
    pub(crate) system: bool,
    pub(crate) min_params: i16,
    pub(crate) max_params: i16,
    pub(crate) local_var_count: u16,
    pub(crate) actions: Option<Expression>,
}

impl HandlerBuilder {
    /// Primary handler taking no arguments
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: HandlerKind::Primary,
            system: false,
            min_params: 0,
            max_params: 0,
            local_var_count: 0,
            actions: None,
        }
    }

    /// Set the kind
    pub fn kind(mut self, kind: HandlerKind) -> Self {
        self.kind = kind;
        self
    }

    /// Argument count bounds; `max < 0` accepts any number
    pub fn params(mut self, min: i16, max: i16) -> Self {
        self.min_params = min;
        self.max_params = max;
        self
    }

    /// Local variable count
    pub fn locals(mut self, count: u16) -> Self {
        self.local_var_count = count;
        self
    }

    /// Body expression
    pub fn actions(mut self, actions: Expression) -> Self {
        self.actions = Some(actions);
        self
    }

    /// Mark as built-in
    pub fn system(mut self) -> Self {
        self.system = true;
        self
    }
}

fn order_key<'a>(handler: &Handler, symbols: &'a SymbolTable) -> (&'a str, HandlerKind) {
    (symbols.text(handler.name), handler.kind)
}

/// Positions of `handlers` sorted by name text, then kind
pub(crate) fn build_order_map(handlers: &[Handler], symbols: &SymbolTable) -> Vec<u32> {
    let mut order: Vec<u32> = (0..handlers.len() as u32).collect();
    order.sort_by(|&a, &b| {
        order_key(&handlers[a as usize], symbols).cmp(&order_key(&handlers[b as usize], symbols))
    });
    order
}

/// Binary search of the order map for `(name, kind)`
pub(crate) fn find_handler(
    handlers: &[Handler],
    order: &[u32],
    symbols: &SymbolTable,
    name: &str,
    kind: HandlerKind,
) -> Option<usize> {
    order
        .binary_search_by(|&pos| match handlers.get(pos as usize) {
            Some(h) => order_key(h, symbols).cmp(&(name, kind)),
            None => Ordering::Greater,
        })
        .ok()
        .map(|i| order[i] as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(symbols: &mut SymbolTable, name: &str, kind: HandlerKind) -> Handler {
        Handler {
            class: ClassId(0),
            name: symbols.intern(name),
            kind,
            system: false,
            min_params: 0,
            max_params: 0,
            local_var_count: 0,
            actions: None,
            busy: 0,
        }
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("after".parse::<HandlerKind>().unwrap(), HandlerKind::After);
        assert_eq!(
            "sideways".parse::<HandlerKind>(),
            Err(ClassError::UnknownHandlerKind("sideways".into()))
        );
        assert_eq!(HandlerKind::from_code(1), Some(HandlerKind::Before));
        assert_eq!(HandlerKind::from_code(4), None);
    }

    #[test]
    fn test_order_map_sorted_by_name_then_kind() {
        let mut symbols = SymbolTable::default();
        let handlers = vec![
            handler(&mut symbols, "print", HandlerKind::After),
            handler(&mut symbols, "area", HandlerKind::Primary),
            handler(&mut symbols, "print", HandlerKind::Around),
        ];
        let order = build_order_map(&handlers, &symbols);
        assert_eq!(order, vec![1, 2, 0]);
        assert_eq!(
            find_handler(&handlers, &order, &symbols, "print", HandlerKind::After),
            Some(0)
        );
        assert_eq!(
            find_handler(&handlers, &order, &symbols, "print", HandlerKind::Before),
            None
        );
    }
}
