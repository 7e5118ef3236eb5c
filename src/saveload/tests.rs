use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::*;
use crate::error::{CodecError, ErrorCode, ErrorReporter};
use crate::storage::PackedStorage;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
struct Pos {
    x: f32,
    y: f32,
}

impl Component for Pos {
    type Storage = PackedStorage<Self>;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Name(String);

impl Component for Name {
    type Storage = PackedStorage<Self>;
}

fn context() -> SerializationContext {
    let mut ctx = SerializationContext::new();
    ctx.register::<Pos>("Position");
    ctx.register::<Name>("Name");
    ctx
}

fn binary_context() -> SerializationContext {
    let mut ctx = SerializationContext::new();
    ctx.register_binary::<Pos>(
        "Position",
        |pos, w| {
            w.write_all(&pos.x.to_le_bytes())?;
            w.write_all(&pos.y.to_le_bytes())
        },
        |r| {
            let mut buf = [0u8; 4];
            r.read_exact(&mut buf)?;
            let x = f32::from_le_bytes(buf);
            r.read_exact(&mut buf)?;
            Ok(Pos {
                x,
                y: f32::from_le_bytes(buf),
            })
        },
    );
    ctx
}

#[derive(Default)]
struct CollectingReporter(Arc<Mutex<Vec<CodecError>>>);

impl ErrorReporter for CollectingReporter {
    fn report(&mut self, error: &CodecError) {
        self.0.lock().unwrap().push(error.clone());
    }
}

#[test]
fn json_round_trip_preserves_ids_and_components() {
    let mut world = World::new();
    let a = world.create_entity();
    world.add_component(a, Pos { x: 1.0, y: 2.0 });
    world.add_component(a, Name("a".to_string()));
    let b = world.create_entity();
    world.add_component(b, Pos { x: -3.0, y: 0.5 });

    // leave a dead slot behind to check generations survive
    let dead = world.create_entity();
    world.destroy_entity(dead);

    let mut ctx = context();
    let mut bytes = Vec::new();
    ctx.serialize(&world, &mut bytes).unwrap();

    let mut restored = World::new();
    ctx.deserialize(&mut restored, std::str::from_utf8(&bytes).unwrap())
        .unwrap();

    assert!(restored.is_alive(a));
    assert!(restored.is_alive(b));
    assert_eq!(
        restored.get_component::<Pos>(a),
        Some(&Pos { x: 1.0, y: 2.0 })
    );
    assert_eq!(
        restored.get_component::<Name>(a),
        Some(&Name("a".to_string()))
    );
    assert_eq!(
        restored.get_component::<Pos>(b),
        Some(&Pos { x: -3.0, y: 0.5 })
    );
    assert!(!restored.is_alive(dead));
}

#[test]
fn json_envelope_shape() {
    let mut world = World::new();
    let e = world.create_entity();
    world.add_component(e, Pos { x: 1.0, y: 2.0 });

    let mut ctx = context();
    let mut bytes = Vec::new();
    ctx.serialize(&world, &mut bytes).unwrap();

    let doc: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let entities = doc["entities"].as_array().unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0]["id"].as_u64(), Some(e.to_bits()));
    assert_eq!(entities[0]["components"]["Position"]["x"].as_f64(), Some(1.0));
}

#[test]
fn dead_slots_stay_dead_after_round_trip() {
    let mut world = World::new();
    let e1 = world.create_entity();
    world.destroy_entity(e1);
    let e2 = world.create_entity(); // recycled slot, generation 1
    world.add_component(e2, Pos { x: 0.0, y: 0.0 });

    let mut ctx = context();
    let mut bytes = Vec::new();
    ctx.serialize(&world, &mut bytes).unwrap();

    let mut restored = World::new();
    ctx.deserialize(&mut restored, std::str::from_utf8(&bytes).unwrap())
        .unwrap();

    assert!(!restored.is_alive(e1));
    assert!(restored.is_alive(e2));
    assert_eq!(restored.entity_at(e2.index()).generation(), 1);
}

#[test]
fn unknown_component_is_reported_but_does_not_abort() {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let mut ctx = context();
    ctx.set_error_reporter(Box::new(CollectingReporter(Arc::clone(&errors))));

    let json = r#"{"entities":[
        {"id":0,"components":{"Ghost":{},"Position":{"x":4.0,"y":5.0}}}
    ]}"#;

    let mut world = World::new();
    ctx.deserialize(&mut world, json).unwrap();

    let e = Entity::from_bits(0);
    assert_eq!(world.get_component::<Pos>(e), Some(&Pos { x: 4.0, y: 5.0 }));

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, ErrorCode::ComponentNotRegistered);
}

#[test]
fn malformed_json_is_an_invalid_payload() {
    let mut ctx = context();
    let mut world = World::new();

    let err = ctx.deserialize(&mut world, "{not json").unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidPayload);

    let err = ctx.deserialize(&mut world, r#"{"no_entities":[]}"#).unwrap_err();
    assert_eq!(err.code, ErrorCode::MissingField);
}

#[test]
fn type_mismatch_is_reported() {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let mut ctx = context();
    ctx.set_error_reporter(Box::new(CollectingReporter(Arc::clone(&errors))));

    let json = r#"{"entities":[{"id":0,"components":{"Position":{"x":"oops","y":0.0}}}]}"#;
    let mut world = World::new();
    ctx.deserialize(&mut world, json).unwrap();

    assert!(!world.has_component::<Pos>(Entity::from_bits(0)));
    assert_eq!(errors.lock().unwrap()[0].code, ErrorCode::TypeMismatch);
}

#[test]
fn binary_round_trip() {
    let mut world = World::new();
    let a = world.create_entity();
    world.add_component(a, Pos { x: 7.5, y: -2.0 });
    let dead = world.create_entity();
    world.destroy_entity(dead);
    let b = world.create_entity(); // recycled, generation 1
    world.add_component(b, Pos { x: 0.25, y: 9.0 });

    let mut ctx = binary_context();
    let mut bytes = Vec::new();
    ctx.serialize_binary(&world, &mut bytes).unwrap();

    let mut restored = World::new();
    ctx.deserialize_binary(&mut restored, bytes.as_slice()).unwrap();

    assert!(restored.is_alive(a));
    assert!(restored.is_alive(b));
    assert_eq!(
        restored.get_component::<Pos>(a),
        Some(&Pos { x: 7.5, y: -2.0 })
    );
    assert_eq!(
        restored.get_component::<Pos>(b),
        Some(&Pos { x: 0.25, y: 9.0 })
    );
}

#[test]
fn binary_envelope_layout() {
    let mut world = World::new();
    let e = world.create_entity();
    world.add_component(e, Pos { x: 1.0, y: 2.0 });

    let mut ctx = binary_context();
    let mut bytes = Vec::new();
    ctx.serialize_binary(&world, &mut bytes).unwrap();

    // u32 count, u64 id, u32 component count, u32 name len, name, 2 * f32
    let name = "Position";
    assert_eq!(bytes.len(), 4 + 8 + 4 + 4 + name.len() + 8);
    assert_eq!(u32::from_le_bytes(bytes[0..4].try_into().unwrap()), 1);
    assert_eq!(
        u64::from_le_bytes(bytes[4..12].try_into().unwrap()),
        e.to_bits()
    );
    assert_eq!(u32::from_le_bytes(bytes[12..16].try_into().unwrap()), 1);
    assert_eq!(
        u32::from_le_bytes(bytes[16..20].try_into().unwrap()),
        name.len() as u32
    );
    assert_eq!(&bytes[20..20 + name.len()], name.as_bytes());
}

#[test]
fn binary_unknown_component_aborts() {
    let mut world = World::new();
    let e = world.create_entity();
    world.add_component(e, Pos { x: 0.0, y: 0.0 });

    let mut ctx = binary_context();
    let mut bytes = Vec::new();
    ctx.serialize_binary(&world, &mut bytes).unwrap();

    let mut fresh = SerializationContext::new();
    let mut restored = World::new();
    let err = fresh
        .deserialize_binary(&mut restored, bytes.as_slice())
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ComponentNotRegistered);
}

#[test]
fn empty_binary_stream_is_ok() {
    let mut ctx = binary_context();
    let mut world = World::new();
    ctx.deserialize_binary(&mut world, [].as_slice()).unwrap();
    assert_eq!(world.entity_count(), 0);
}
