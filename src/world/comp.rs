use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};

use fnv::FnvHashMap;

use crate::mask::MAX_COMPONENT_TYPES;
use crate::storage::DenseStorage;

/// Abstract component type.
///
/// Components are stored in one sparse set per type. The `Storage` associated
/// type selects how the packed half of that set keeps the component values:
///
/// * [`PackedStorage`](crate::storage::PackedStorage) — the general case, a
///   packed `Vec` of values.
/// * [`NullStorage`](crate::storage::NullStorage) — for zero-sized tag
///   components whose presence is the only information.
///
/// ## Examples
///
/// ```
/// use weft::prelude::*;
///
/// pub struct Position {
///     pub x: f32,
///     pub y: f32,
/// }
///
/// impl Component for Position {
///     type Storage = PackedStorage<Self>;
/// }
///
/// #[derive(Default)]
/// pub struct Frozen;
///
/// impl Component for Frozen {
///     type Storage = NullStorage<Self>;
/// }
/// ```
pub trait Component: Any + Send + Sync + Sized {
    /// Associated storage type for this component.
    type Storage: DenseStorage<Self> + Default + Send + Sync;
}

static NEXT_COMPONENT_ID: AtomicUsize = AtomicUsize::new(0);
static COMPONENT_IDS: OnceLock<Mutex<FnvHashMap<TypeId, usize>>> = OnceLock::new();

/// Returns the runtime id of a component type.
///
/// Ids are small integers assigned the first time a type is referenced,
/// monotonically from 0 and process-wide, so they are shared across all
/// [`World`](crate::World) instances. The id indexes the per-entity
/// [`ComponentMask`](crate::ComponentMask) and the world's store table.
///
/// # Panics
///
/// Panics if more than [`MAX_COMPONENT_TYPES`] distinct component types are
/// registered.
pub fn component_id<T: Component>() -> usize {
    let ids = COMPONENT_IDS.get_or_init(|| Mutex::new(FnvHashMap::default()));
    let mut ids = ids.lock().unwrap();
    *ids.entry(TypeId::of::<T>()).or_insert_with(|| {
        let id = NEXT_COMPONENT_ID.fetch_add(1, Ordering::Relaxed);
        assert!(
            id < MAX_COMPONENT_TYPES,
            "more than {} component types registered",
            MAX_COMPONENT_TYPES
        );
        id
    })
}
