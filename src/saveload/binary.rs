//! Packed little-endian binary envelope.
//!
//! Layout: `u32` alive-entity count, then per entity a `u64` id, a `u32`
//! component count, and per component a `u32` name length, the UTF-8 name
//! bytes, and the opaque component body written by the registered encoder.

use std::io;

use crate::error::{CodecError, ErrorCode};
use crate::world::{Entity, World};

use super::SerializationContext;

fn write_all(writer: &mut impl io::Write, bytes: &[u8]) -> Result<(), CodecError> {
    writer
        .write_all(bytes)
        .map_err(|e| CodecError::new(ErrorCode::InternalError, format!("write failed: {e}")))
}

fn read_u32(reader: &mut impl io::Read) -> io::Result<u32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_u64(reader: &mut impl io::Read) -> io::Result<u64> {
    let mut bytes = [0u8; 8];
    reader.read_exact(&mut bytes)?;
    Ok(u64::from_le_bytes(bytes))
}

impl SerializationContext {
    /// Serializes every alive entity with its binary-registered components.
    pub fn serialize_binary<W: io::Write>(
        &mut self,
        world: &World,
        mut writer: W,
    ) -> Result<(), CodecError> {
        let total = world.entity_count() as u32;
        let alive = (0..total)
            .filter(|&index| world.is_alive(world.entity_at(index)))
            .count() as u32;

        write_all(&mut writer, &alive.to_le_bytes())?;

        for index in 0..total {
            let id = world.entity_at(index);
            if !world.is_alive(id) {
                continue;
            }
            let Some(mask) = world.entity_mask(id).copied() else {
                continue;
            };

            let binary_slots: Vec<usize> = self
                .by_component_id
                .iter()
                .enumerate()
                .filter_map(|(cid, slot)| {
                    let slot = (*slot)?;
                    (mask.test(cid) && self.codecs[slot].encode_binary.is_some()).then_some(slot)
                })
                .collect();

            write_all(&mut writer, &id.to_bits().to_le_bytes())?;
            write_all(&mut writer, &(binary_slots.len() as u32).to_le_bytes())?;

            for slot in binary_slots {
                let result = {
                    let codec = &self.codecs[slot];
                    let name = codec.name.as_bytes();
                    write_all(&mut writer, &(name.len() as u32).to_le_bytes())
                        .and_then(|()| write_all(&mut writer, name))
                        .and_then(|()| {
                            // the encoder was checked when collecting slots
                            let encode = codec.encode_binary.as_ref().unwrap();
                            encode(id, world, &mut writer)
                        })
                };
                if let Err(err) = result {
                    return Err(self.reported(err));
                }
            }
        }
        Ok(())
    }

    /// Populates a world from a binary stream produced by
    /// [`serialize_binary`](SerializationContext::serialize_binary).
    ///
    /// A truncated stream is tolerated up to the point of truncation. An
    /// unregistered component name aborts with an error: the body length is
    /// unknown, so the stream position cannot be recovered.
    pub fn deserialize_binary<R: io::Read>(
        &mut self,
        world: &mut World,
        mut reader: R,
    ) -> Result<(), CodecError> {
        let Ok(entity_count) = read_u32(&mut reader) else {
            return Ok(()); // empty stream
        };

        for _ in 0..entity_count {
            let Ok(bits) = read_u64(&mut reader) else {
                return Ok(());
            };
            let id = world.create_entity_at(Entity::from_bits(bits));

            let Ok(component_count) = read_u32(&mut reader) else {
                return Ok(());
            };

            for _ in 0..component_count {
                let Ok(name_len) = read_u32(&mut reader) else {
                    return Ok(());
                };
                let mut name_bytes = vec![0u8; name_len as usize];
                if reader.read_exact(&mut name_bytes).is_err() {
                    return Ok(());
                }
                let name = match String::from_utf8(name_bytes) {
                    Ok(name) => name,
                    Err(_) => {
                        return Err(self.reported(CodecError::new(
                            ErrorCode::InvalidPayload,
                            "component name is not valid UTF-8",
                        )));
                    }
                };

                let Some(&slot) = self.by_name.get(&name) else {
                    return Err(self.reported(CodecError::new(
                        ErrorCode::ComponentNotRegistered,
                        format!("component not registered: {name}"),
                    )));
                };
                let result = match &self.codecs[slot].decode_binary {
                    Some(decode) => decode(id, world, &mut reader),
                    None => Err(CodecError::new(
                        ErrorCode::ComponentNotRegistered,
                        format!("component lacks a binary decoder: {name}"),
                    )),
                };
                if let Err(err) = result {
                    return Err(self.reported(err));
                }
            }
        }
        Ok(())
    }
}
