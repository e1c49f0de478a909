//! Binary Image Tests
//!
//! File-backed save and load of a class graph:
//! - Byte-identical round trips
//! - Reconstructed tables answer queries like the originals
//! - Damaged or foreign files are rejected without side effects
//!
//! # Running Tests
//! ```bash
//! cargo test --test image_tests
//! ```

use std::fs;
use strata_engine::image::{ImageError, IMAGE_VERSION};
use strata_engine::{
    ClassBuilder, ClassError, ConstraintRecord, EnvOptions, Environment, Expression,
    HandlerBuilder, HandlerKind, SlotBuilder, TypeSet, Value,
};
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("strata_engine=debug")
        .try_init();
}

fn library() -> Environment {
    let mut env = Environment::with_options(EnvOptions {
        create_system_classes: true,
        ..EnvOptions::default()
    })
    .unwrap();
    env.define_module("CATALOG");
    env.define_class(
        ClassBuilder::new("ITEM")
            .abstract_class()
            .slot(SlotBuilder::new("title").public())
            .slot(
                SlotBuilder::new("added")
                    .default_dynamic(Expression::call("time", vec![]))
                    .initialize_only(),
            )
            .handler(HandlerBuilder::new("summary").params(0, 1).locals(2)),
    )
    .unwrap();
    env.define_class(
        ClassBuilder::new("BOOK")
            .module("CATALOG")
            .superclass("ITEM")
            .slot(SlotBuilder::new("authors").multiple().composite())
            .slot(
                SlotBuilder::new("pages").constraint(
                    ConstraintRecord::of_types(TypeSet::INTEGER)
                        .with_range(Value::Integer(1), Value::positive_infinity()),
                ),
            )
            .handler(
                HandlerBuilder::new("summary")
                    .kind(HandlerKind::Around)
                    .actions(Expression::Variable("self".into())),
            ),
    )
    .unwrap();
    env.define_class(ClassBuilder::new("SCRATCH")).unwrap();
    env.define_class(
        ClassBuilder::new("MAP")
            .module("CATALOG")
            .superclass("ITEM")
            .slot(SlotBuilder::new("scale").default_static(Value::Float(1.5))),
    )
    .unwrap();
    // leaves a hole in the id space
    env.delete_class("SCRATCH").unwrap();
    env
}

#[test]
fn test_file_round_trip_is_byte_identical() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("first.img");
    let second = dir.path().join("second.img");

    let env = library();
    let saved = env.save_image_to_file(&first).unwrap();

    let mut loaded = Environment::new();
    let read = loaded.load_image_from_file(&first).unwrap();
    assert_eq!(read, saved);
    loaded.save_image_to_file(&second).unwrap();

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

#[test]
fn test_reconstructed_environment_matches() {
    init_tracing();
    let env = library();
    let mut bytes = Vec::new();
    env.save_image(&mut bytes).unwrap();

    let mut loaded = Environment::new();
    loaded.load_image(&mut bytes.as_slice()).unwrap();

    assert_eq!(loaded.class_count(), env.class_count());
    assert_eq!(loaded.class_map().max_class_id(), env.class_map().max_class_id());
    for name in ["ITEM", "BOOK", "MAP", "USER", "INITIAL-OBJECT"] {
        assert_eq!(loaded.find_class(name), env.find_class(name), "{}", name);
        assert_eq!(
            loaded.class_superclasses(name, true).unwrap(),
            env.class_superclasses(name, true).unwrap()
        );
        assert_eq!(
            loaded.class_slots(name, true).unwrap(),
            env.class_slots(name, true).unwrap()
        );
    }
    assert_eq!(
        loaded.class_subclasses("ITEM", false).unwrap(),
        vec!["BOOK", "MAP"]
    );
    assert_eq!(loaded.class_module("MAP").unwrap(), "CATALOG");
    assert_eq!(
        loaded.slot_facets("BOOK", "added").unwrap(),
        env.slot_facets("BOOK", "added").unwrap()
    );
    assert_eq!(
        loaded.slot_range("BOOK", "pages").unwrap(),
        Some((Value::Integer(1), Value::positive_infinity()))
    );
    assert_eq!(loaded.slot_sources("BOOK", "title").unwrap(), vec!["ITEM"]);
    assert_eq!(loaded.describe_class("BOOK").unwrap(), env.describe_class("BOOK").unwrap());

    let handler = loaded.find_handler("ITEM", "summary", HandlerKind::Primary).unwrap();
    assert_eq!((handler.min_params(), handler.max_params()), (0, 1));
    assert_eq!(handler.local_var_count(), 2);

    // the id hole is reused only after the image is cleared
    assert_eq!(
        loaded.define_class(ClassBuilder::new("X")),
        Err(ClassError::ImageActive)
    );
    loaded.clear_image().unwrap();
    assert_eq!(loaded.class_count(), 0);
    assert!(loaded.define_class(ClassBuilder::new("X")).is_ok());
}

#[test]
fn test_wrong_version_rejected() {
    let env = library();
    let mut bytes = Vec::new();
    env.save_image(&mut bytes).unwrap();
    bytes[8..12].copy_from_slice(&(IMAGE_VERSION + 1).to_le_bytes());

    let mut loaded = Environment::new();
    assert!(matches!(
        loaded.load_image(&mut bytes.as_slice()),
        Err(ImageError::IncompatibleVersion { .. })
    ));
    assert_eq!(loaded.class_count(), 0);
}

#[test]
fn test_foreign_file_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notes.txt");
    fs::write(&path, b"this is certainly not a class image").unwrap();

    let mut env = Environment::new();
    assert!(matches!(
        env.load_image_from_file(&path),
        Err(ImageError::InvalidMagic)
    ));
    assert!(matches!(
        env.load_image_from_file(dir.path().join("missing.img")),
        Err(ImageError::Io(_))
    ));
}

#[test]
fn test_second_load_rejected() {
    let env = library();
    let mut bytes = Vec::new();
    env.save_image(&mut bytes).unwrap();

    let mut loaded = Environment::new();
    loaded.load_image(&mut bytes.as_slice()).unwrap();
    assert!(matches!(
        loaded.load_image(&mut bytes.as_slice()),
        Err(ImageError::Class(ClassError::ImageActive))
    ));
}
