//! JSON envelope: `{"entities":[{"id":<u64>,"components":{"<Name>":…}}]}`.

use std::io;

use serde_json::{json, Map, Value};

use crate::error::{CodecError, ErrorCode};
use crate::world::{Entity, World};

use super::SerializationContext;

impl SerializationContext {
    /// Serializes every alive entity of the world, in slot-index order, with
    /// its JSON-registered components in component-id order.
    pub fn serialize<W: io::Write>(
        &mut self,
        world: &World,
        writer: W,
    ) -> Result<(), CodecError> {
        let mut entities = Vec::new();

        for index in 0..world.entity_count() as u32 {
            let id = world.entity_at(index);
            if !world.is_alive(id) {
                continue;
            }
            let Some(mask) = world.entity_mask(id).copied() else {
                continue;
            };

            let mut components = Map::new();
            for cid in 0..self.by_component_id.len() {
                let Some(slot) = self.by_component_id[cid] else {
                    continue;
                };
                if !mask.test(cid) {
                    continue;
                }
                let encoded = {
                    let codec = &self.codecs[slot];
                    match &codec.encode_json {
                        Some(encode) => encode(id, world).map(|value| (codec.name.clone(), value)),
                        None => continue,
                    }
                };
                match encoded {
                    Ok((name, value)) => {
                        components.insert(name, value);
                    }
                    Err(err) => return Err(self.reported(err)),
                }
            }

            entities.push(json!({
                "id": id.to_bits(),
                "components": Value::Object(components),
            }));
        }

        serde_json::to_writer(writer, &json!({ "entities": entities })).map_err(|e| {
            self.reported(CodecError::new(
                ErrorCode::InternalError,
                format!("failed to write world JSON: {e}"),
            ))
        })
    }

    /// Populates a world from a JSON document produced by
    /// [`serialize`](SerializationContext::serialize).
    ///
    /// Entities are recreated with their exact ids. A malformed entity entry
    /// or an unregistered component is reported and skipped; the rest of the
    /// document is still applied.
    pub fn deserialize(&mut self, world: &mut World, json: &str) -> Result<(), CodecError> {
        let doc: Value = serde_json::from_str(json).map_err(|e| {
            self.reported(CodecError::new(
                ErrorCode::InvalidPayload,
                format!("JSON parse error: {e}"),
            ))
        })?;

        let Some(entities) = doc.get("entities").and_then(Value::as_array) else {
            return Err(self.reported(CodecError::new(
                ErrorCode::MissingField,
                "missing 'entities' array",
            )));
        };

        for entry in entities {
            let Some(bits) = entry.get("id").and_then(Value::as_u64) else {
                self.reported(CodecError::new(
                    ErrorCode::MissingField,
                    "entity entry missing 'id'",
                ));
                continue;
            };
            let id = world.create_entity_at(Entity::from_bits(bits));

            let Some(components) = entry.get("components") else {
                continue;
            };
            let Some(components) = components.as_object() else {
                self.reported(CodecError::new(
                    ErrorCode::TypeMismatch,
                    "entity 'components' must be an object",
                ));
                continue;
            };

            for (name, value) in components {
                // failures are already reported; keep applying the rest
                let _ = self.deserialize_component(id, world, name, value);
            }
        }
        Ok(())
    }

    /// Decodes a single component by registered name into an entity.
    pub fn deserialize_component(
        &mut self,
        entity: Entity,
        world: &mut World,
        name: &str,
        value: &Value,
    ) -> Result<(), CodecError> {
        let Some(&slot) = self.by_name.get(name) else {
            return Err(self.reported(CodecError::new(
                ErrorCode::ComponentNotRegistered,
                format!("component not registered: {name}"),
            )));
        };

        let result = match &self.codecs[slot].decode_json {
            Some(decode) => decode(entity, world, value),
            None => Err(CodecError::new(
                ErrorCode::InternalError,
                format!("component registered without a JSON decoder: {name}"),
            )),
        };

        result.map_err(|err| self.reported(err))
    }
}
