//! # weft
//!
//! A sparse-set entity component store with reactive component signals and a
//! dependency-graph system scheduler.
//!
//! The building blocks:
//!
//! * [`World`] — owns entities, their component masks, one lazily created
//!   sparse-set store per component type, and the per-type signal tables.
//!   Entity ids are generational: a destroyed slot is recycled with a higher
//!   generation, so stale ids are harmless.
//! * [`Component`] — implemented for user types, selecting a storage flavor:
//!   [`PackedStorage`](storage::PackedStorage) for data components,
//!   [`NullStorage`](storage::NullStorage) for zero-sized tags.
//! * [`View`](view::View) — a transient query over a conjunction of component
//!   types. Iteration drives over the smallest participating store and
//!   filters with the per-entity mask.
//! * [`ComponentEvent`] — Added / Removed / Modified callbacks registered per
//!   component type through [`World::on_event`], fired in a well-defined
//!   order relative to the store mutation.
//! * [`SystemScheduler`] — named work units with dependencies, executed layer
//!   by layer on a work-stealing [`ThreadPool`](pool::ThreadPool).
//! * [`SerializationContext`](saveload::SerializationContext) and
//!   [`PrefabManager`](prefab::PrefabManager) — JSON and binary world
//!   snapshots and named entity templates, both driven by name-registered
//!   component codecs.
//!
//! ## Example
//!
//! ```
//! use weft::prelude::*;
//!
//! struct Pos {
//!     x: f32,
//!     y: f32,
//! }
//!
//! impl Component for Pos {
//!     type Storage = PackedStorage<Self>;
//! }
//!
//! struct Vel {
//!     x: f32,
//!     y: f32,
//! }
//!
//! impl Component for Vel {
//!     type Storage = PackedStorage<Self>;
//! }
//!
//! let mut world = World::new();
//!
//! let e = world.create_entity();
//! world.add_component(e, Pos { x: 0.0, y: 0.0 });
//! world.add_component(e, Vel { x: 1.0, y: 2.0 });
//!
//! world.view::<(Pos, Vel)>().each(|_entity, (pos, vel)| {
//!     pos.x += vel.x;
//!     pos.y += vel.y;
//! });
//!
//! assert_eq!(world.get_component::<Pos>(e).map(|p| p.y), Some(2.0));
//! ```
//!
//! The world itself is deliberately not thread-safe: its mutating operations
//! must be serialized by the caller. Parallelism lives in the scheduler,
//! which guarantees that for every declared dependency edge `u → v`, `u`
//! completes before `v` starts, and runs each dependency layer concurrently
//! on the pool.

pub mod error;
pub mod mask;
pub mod pool;
pub mod prefab;
pub mod saveload;
pub mod scheduler;
pub mod signal;
pub mod storage;
pub mod view;
pub mod world;

pub use crate::{
    error::{CodecError, ErrorCode, ErrorReporter, LogReporter, ScheduleError, SubmitError},
    mask::{ComponentMask, MAX_COMPONENT_TYPES},
    prefab::PrefabManager,
    saveload::SerializationContext,
    scheduler::SystemScheduler,
    signal::ComponentEvent,
    world::{component_id, Component, Entity, Index, World},
};

/// Commonly used imports, bundled.
pub mod prelude {
    pub use crate::error::{CodecError, ErrorCode, ScheduleError};
    pub use crate::mask::ComponentMask;
    pub use crate::pool::ThreadPool;
    pub use crate::prefab::PrefabManager;
    pub use crate::saveload::SerializationContext;
    pub use crate::scheduler::SystemScheduler;
    pub use crate::signal::ComponentEvent;
    pub use crate::storage::{NullStorage, PackedStorage, SparseSet};
    pub use crate::view::{View, ViewSet};
    pub use crate::world::{component_id, Component, Entity, Index, World};
}
