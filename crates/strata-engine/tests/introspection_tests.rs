//! Introspection Tests
//!
//! Name-keyed queries over a small vehicle hierarchy, the way a host's
//! command layer would issue them.
//!
//! # Running Tests
//! ```bash
//! cargo test --test introspection_tests
//! ```

use strata_engine::reflect::parse_inherit_keyword;
use strata_engine::{
    Accessor, ClassBuilder, ClassError, ConstraintRecord, DefaultKind, Environment, Expression,
    HandlerBuilder, HandlerKind, SlotBuilder, TypeSet, Value,
};

fn vehicles() -> Environment {
    let mut env = Environment::new();
    env.define_class(
        ClassBuilder::new("VEHICLE")
            .abstract_class()
            .slot(
                SlotBuilder::new("wheels")
                    .public()
                    .constraint(
                        ConstraintRecord::of_types(TypeSet::INTEGER)
                            .with_range(Value::Integer(0), Value::Integer(18)),
                    ),
            )
            .slot(SlotBuilder::new("serial").default_dynamic(Expression::call("gensym*", vec![])))
            .handler(HandlerBuilder::new("describe")),
    )
    .unwrap();
    env.define_class(
        ClassBuilder::new("CAR")
            .superclass("VEHICLE")
            .slot(
                SlotBuilder::new("doors")
                    .initialize_only()
                    .create_accessor(Accessor::Read),
            )
            .slot(
                SlotBuilder::new("passengers")
                    .multiple()
                    .constraint(
                        ConstraintRecord::of_types(TypeSet::SYMBOL)
                            .with_cardinality(Value::Integer(0), Value::Integer(5)),
                    ),
            )
            .handler(HandlerBuilder::new("describe").kind(HandlerKind::After)),
    )
    .unwrap();
    env
}

// ===== Classes =====

#[test]
fn test_class_queries() {
    let mut env = vehicles();
    assert!(env.class_abstract("VEHICLE").unwrap());
    assert!(!env.class_reactive("VEHICLE").unwrap());
    assert!(env.subclass_p("CAR", "VEHICLE").unwrap());
    assert!(!env.subclass_p("VEHICLE", "CAR").unwrap());
    assert_eq!(env.class_subclasses("VEHICLE", false).unwrap(), vec!["CAR"]);
    assert_eq!(
        env.class_abstract("TRUCK"),
        Err(ClassError::UnknownClass("TRUCK".into()))
    );
}

#[test]
fn test_class_slots_local_and_inherited() {
    let env = vehicles();
    assert_eq!(env.class_slots("CAR", false).unwrap(), vec!["doors", "passengers"]);
    assert_eq!(
        env.class_slots("CAR", true).unwrap(),
        vec!["wheels", "serial", "doors", "passengers"]
    );
}

// ===== Slots =====

#[test]
fn test_inherit_keyword_controls_slot_exists() {
    let env = vehicles();
    let inherit = parse_inherit_keyword(Some("inherit")).unwrap();
    assert!(env.slot_exists("CAR", "wheels", inherit).unwrap());
    assert!(!env.slot_exists("CAR", "wheels", false).unwrap());
    assert!(!env.slot_exists("CAR", "color", true).unwrap());
    assert!(parse_inherit_keyword(Some("all")).is_err());
}

#[test]
fn test_local_only_queries_reject_inherited_slots() {
    let env = vehicles();
    assert!(matches!(
        env.slot_public("CAR", "wheels"),
        Err(ClassError::InheritedSlot { .. })
    ));
    assert!(matches!(
        env.slot_default_kind("CAR", "serial"),
        Err(ClassError::InheritedSlot { .. })
    ));
    assert!(env.slot_public("VEHICLE", "wheels").unwrap());
    assert_eq!(env.slot_default_kind("VEHICLE", "serial").unwrap(), DefaultKind::Dynamic);

    assert!(env.slot_writable("CAR", "wheels").unwrap());
    assert!(env.slot_direct_access("CAR", "wheels").unwrap());
    assert!(!env.slot_writable("CAR", "doors").unwrap());
    assert!(env.slot_initable("CAR", "doors").unwrap());
}

#[test]
fn test_dynamic_default_evaluated_per_call() {
    let env = vehicles();
    let mut next = 0;
    let mut evaluator = |_: &Expression| -> Result<Value, String> {
        next += 1;
        Ok(Value::symbol(format!("gen{}", next)))
    };
    assert_eq!(
        env.slot_default_value("CAR", "serial", &mut evaluator).unwrap(),
        Value::symbol("gen1")
    );
    assert_eq!(
        env.slot_default_value("CAR", "serial", &mut evaluator).unwrap(),
        Value::symbol("gen2")
    );

    let mut failing = |_: &Expression| -> Result<Value, String> { Err("no generator".into()) };
    assert!(matches!(
        env.slot_default_value("CAR", "serial", &mut failing),
        Err(ClassError::Evaluation { .. })
    ));
}

#[test]
fn test_facet_codes() {
    let env = vehicles();
    assert_eq!(
        env.slot_facets("CAR", "doors").unwrap(),
        vec!["SGL", "STC", "INH", "INT", "LCL", "RCT", "EXC", "PRV", "R", "NIL"]
    );
    assert_eq!(
        env.slot_facets("CAR", "wheels").unwrap(),
        vec!["SGL", "STC", "INH", "RW", "LCL", "RCT", "EXC", "PUB", "RW", "put-wheels"]
    );
}

#[test]
fn test_constraint_queries() {
    let env = vehicles();
    assert_eq!(env.slot_types("CAR", "wheels").unwrap(), vec!["INTEGER"]);
    assert_eq!(
        env.slot_range("CAR", "wheels").unwrap(),
        Some((Value::Integer(0), Value::Integer(18)))
    );
    assert_eq!(env.slot_range("CAR", "passengers").unwrap(), None);
    assert_eq!(
        env.slot_cardinality("CAR", "passengers").unwrap(),
        vec![Value::Integer(0), Value::Integer(5)]
    );
    assert!(env.slot_cardinality("CAR", "doors").unwrap().is_empty());
    assert_eq!(env.slot_allowed_values("CAR", "wheels").unwrap(), None);
}

// ===== Handlers =====

#[test]
fn test_handler_queries() {
    let mut env = vehicles();
    assert!(env.handler_exists("CAR", "describe", Some("after")).unwrap());
    assert!(!env.handler_exists("CAR", "describe", None).unwrap());
    assert!(env.handler_exists("VEHICLE", "describe", None).unwrap());
    assert_eq!(
        env.handler_exists("CAR", "describe", Some("sideways")),
        Err(ClassError::UnknownHandlerKind("sideways".into()))
    );

    let listed: Vec<(String, HandlerKind)> = env
        .handler_list(Some("CAR"), true)
        .unwrap()
        .into_iter()
        .map(|h| (h.class, h.kind))
        .collect();
    assert_eq!(
        listed,
        vec![
            ("VEHICLE".to_string(), HandlerKind::Primary),
            ("CAR".to_string(), HandlerKind::After),
        ]
    );

    env.define_handler("CAR", HandlerBuilder::new("honk")).unwrap();
    assert!(env.handler_exists("CAR", "honk", None).unwrap());
    env.remove_handler("CAR", "honk", HandlerKind::Primary).unwrap();
    assert!(!env.handler_exists("CAR", "honk", None).unwrap());
}

// ===== Reports =====

#[test]
fn test_browse_and_describe() {
    let env = vehicles();
    assert_eq!(env.browse_classes("VEHICLE").unwrap(), "VEHICLE\n  CAR\n");
    let report = env.describe_class("CAR").unwrap();
    assert!(report.contains("Direct Superclasses: VEHICLE"));
    assert!(report.contains("describe after in class CAR"));
}
