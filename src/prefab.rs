//! Prefabs: named frozen component sets instantiated into a world.

use fnv::FnvHashMap;
use serde_json::{Map, Value};

use crate::error::{CodecError, ErrorCode, ErrorReporter, LogReporter};
use crate::saveload::SerializationContext;
use crate::world::{Entity, World};

/// Manages entity templates that can be instantiated with pre-configured
/// component sets.
///
/// Prefabs are loaded from a JSON object mapping prefab names to component
/// objects:
///
/// ```json
/// {
///   "Player": {
///     "Position": { "x": 0.0, "y": 0.0 },
///     "Velocity": { "x": 5.0, "y": 5.0 }
///   }
/// }
/// ```
///
/// Component data is decoded through a [`SerializationContext`] by registered
/// name at instantiation time.
pub struct PrefabManager {
    prefabs: FnvHashMap<String, Map<String, Value>>,
    reporter: Box<dyn ErrorReporter>,
}

impl Default for PrefabManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PrefabManager {
    /// Creates an empty manager reporting through the `log` facade.
    pub fn new() -> Self {
        PrefabManager {
            prefabs: FnvHashMap::default(),
            reporter: Box::new(LogReporter),
        }
    }

    /// Replaces the error reporter.
    pub fn set_error_reporter(&mut self, reporter: Box<dyn ErrorReporter>) {
        self.reporter = reporter;
    }

    fn reported(&mut self, err: CodecError) -> CodecError {
        self.reporter.report(&err);
        err
    }

    /// Loads prefab definitions from a JSON string. Later loads add to and
    /// overwrite earlier definitions by name.
    ///
    /// A prefab whose value is not an object is reported and skipped; the
    /// remaining prefabs still load.
    pub fn load_prefabs(&mut self, json: &str) -> Result<(), CodecError> {
        let doc: Value = serde_json::from_str(json).map_err(|e| {
            self.reported(CodecError::new(
                ErrorCode::InvalidPayload,
                format!("JSON parse error in prefab definitions: {e}"),
            ))
        })?;

        let Some(object) = doc.as_object() else {
            return Err(self.reported(CodecError::new(
                ErrorCode::TypeMismatch,
                "prefab JSON must be an object at the top level",
            )));
        };

        for (name, data) in object {
            match data.as_object() {
                Some(components) => {
                    self.prefabs.insert(name.clone(), components.clone());
                }
                None => {
                    self.reported(CodecError::new(
                        ErrorCode::TypeMismatch,
                        format!("prefab '{name}' data must be an object"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Instantiates a prefab into the world and returns the fresh entity.
    ///
    /// Every stored component is decoded by its registered name. An unknown
    /// component name is reported but does not abort the instantiation — the
    /// entity keeps the components that did decode. An unknown prefab name is
    /// an error.
    pub fn instantiate(
        &mut self,
        name: &str,
        context: &mut SerializationContext,
        world: &mut World,
    ) -> Result<Entity, CodecError> {
        if !self.prefabs.contains_key(name) {
            return Err(self.reported(CodecError::new(
                ErrorCode::UnknownPrefab,
                format!("unknown prefab: {name}"),
            )));
        }

        let entity = world.create_entity();
        let components = &self.prefabs[name];
        for (component_name, value) in components {
            // failures are reported through the context's reporter
            let _ = context.deserialize_component(entity, world, component_name, value);
        }

        Ok(entity)
    }
}
