//! World serialization: name-registered component codecs, a JSON envelope
//! and a packed little-endian binary envelope.
//!
//! Components take part in serialization by being registered under a stable
//! name. [`SerializationContext::register`] covers any component that
//! implements serde's traits; [`SerializationContext::register_with`] and
//! [`SerializationContext::register_binary`] accept explicit encode/decode
//! closures for everything else.
//!
//! Deserialization recreates entities with
//! [`World::create_entity_at`](crate::World::create_entity_at), so slot
//! indices and generations survive a round trip bit-exactly: dead slots stay
//! dead with their recorded generation.

use std::io;

use fnv::FnvHashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{CodecError, ErrorCode, ErrorReporter, LogReporter};
use crate::world::{component_id, Component, Entity, World};

mod binary;
mod json;
#[cfg(test)]
mod tests;

type EncodeJsonFn = Box<dyn Fn(Entity, &World) -> Result<Value, CodecError> + Send>;
type DecodeJsonFn = Box<dyn Fn(Entity, &mut World, &Value) -> Result<(), CodecError> + Send>;
type EncodeBinaryFn =
    Box<dyn Fn(Entity, &World, &mut dyn io::Write) -> Result<(), CodecError> + Send>;
type DecodeBinaryFn =
    Box<dyn Fn(Entity, &mut World, &mut dyn io::Read) -> Result<(), CodecError> + Send>;

/// Codec slots for one registered component name.
struct ComponentCodec {
    name: String,
    component_id: usize,
    encode_json: Option<EncodeJsonFn>,
    decode_json: Option<DecodeJsonFn>,
    encode_binary: Option<EncodeBinaryFn>,
    decode_binary: Option<DecodeBinaryFn>,
}

impl ComponentCodec {
    fn new(name: String, component_id: usize) -> Self {
        ComponentCodec {
            name,
            component_id,
            encode_json: None,
            decode_json: None,
            encode_binary: None,
            decode_binary: None,
        }
    }
}

/// Registry of component codecs plus the world serialization entry points.
pub struct SerializationContext {
    codecs: Vec<ComponentCodec>,
    by_name: FnvHashMap<String, usize>,
    by_component_id: Vec<Option<usize>>,
    reporter: Box<dyn ErrorReporter>,
}

impl Default for SerializationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SerializationContext {
    /// Creates an empty context reporting through the `log` facade.
    pub fn new() -> Self {
        SerializationContext {
            codecs: Vec::new(),
            by_name: FnvHashMap::default(),
            by_component_id: Vec::new(),
            reporter: Box::new(LogReporter),
        }
    }

    /// Replaces the error reporter.
    pub fn set_error_reporter(&mut self, reporter: Box<dyn ErrorReporter>) {
        self.reporter = reporter;
    }

    pub(crate) fn reported(&mut self, err: CodecError) -> CodecError {
        self.reporter.report(&err);
        err
    }

    fn slot_for<T: Component>(&mut self, name: &str) -> usize {
        if let Some(&slot) = self.by_name.get(name) {
            return slot;
        }

        let cid = component_id::<T>();
        let slot = self.codecs.len();
        self.codecs.push(ComponentCodec::new(name.to_string(), cid));
        self.by_name.insert(name.to_string(), slot);
        if cid >= self.by_component_id.len() {
            self.by_component_id.resize(cid + 1, None);
        }
        self.by_component_id[cid] = Some(slot);
        slot
    }

    /// Registers JSON codecs for a serde-enabled component type.
    pub fn register<T>(&mut self, name: &str)
    where
        T: Component + Serialize + DeserializeOwned,
    {
        let ser_name = name.to_string();
        let de_name = name.to_string();
        self.register_with::<T>(
            name,
            move |component| {
                serde_json::to_value(component).map_err(|e| {
                    CodecError::new(
                        ErrorCode::InternalError,
                        format!("failed to encode component `{ser_name}`: {e}"),
                    )
                })
            },
            move |value| {
                serde_json::from_value(value.clone()).map_err(|e| {
                    CodecError::new(
                        ErrorCode::TypeMismatch,
                        format!("failed to decode component `{de_name}`: {e}"),
                    )
                })
            },
        );
    }

    /// Registers JSON codecs from explicit encode/decode closures.
    pub fn register_with<T: Component>(
        &mut self,
        name: &str,
        encode: impl Fn(&T) -> Result<Value, CodecError> + Send + 'static,
        decode: impl Fn(&Value) -> Result<T, CodecError> + Send + 'static,
    ) {
        let slot = self.slot_for::<T>(name);
        let missing = format!("entity lost its `{name}` component mid-serialization");

        self.codecs[slot].encode_json = Some(Box::new(move |entity, world| {
            let component = world
                .get_component::<T>(entity)
                .ok_or_else(|| CodecError::new(ErrorCode::InternalError, missing.clone()))?;
            encode(component)
        }));
        self.codecs[slot].decode_json = Some(Box::new(move |entity, world, value| {
            let component = decode(value)?;
            world.add_component(entity, component);
            Ok(())
        }));
    }

    /// Registers binary codecs from explicit streaming closures. The
    /// component body written by `encode` is opaque to the envelope; `decode`
    /// must consume exactly what `encode` produced.
    pub fn register_binary<T: Component>(
        &mut self,
        name: &str,
        encode: impl Fn(&T, &mut dyn io::Write) -> io::Result<()> + Send + 'static,
        decode: impl Fn(&mut dyn io::Read) -> io::Result<T> + Send + 'static,
    ) {
        let slot = self.slot_for::<T>(name);
        let missing = format!("entity lost its `{name}` component mid-serialization");
        let write_failed = format!("failed to write component `{name}`");
        let read_failed = format!("failed to read component `{name}`");

        self.codecs[slot].encode_binary = Some(Box::new(move |entity, world, writer| {
            let component = world
                .get_component::<T>(entity)
                .ok_or_else(|| CodecError::new(ErrorCode::InternalError, missing.clone()))?;
            encode(component, writer).map_err(|e| {
                CodecError::new(ErrorCode::InternalError, format!("{write_failed}: {e}"))
            })
        }));
        self.codecs[slot].decode_binary = Some(Box::new(move |entity, world, reader| {
            let component = decode(reader).map_err(|e| {
                CodecError::new(ErrorCode::InvalidPayload, format!("{read_failed}: {e}"))
            })?;
            world.add_component(entity, component);
            Ok(())
        }));
    }
}
