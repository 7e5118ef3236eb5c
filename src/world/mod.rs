//! Entities, component storage registry, and general world management.

pub use self::{
    comp::{component_id, Component},
    entity::{Entity, Index},
};

use std::any::Any;

use crate::mask::ComponentMask;
use crate::signal::{removed_trigger, ComponentEvent, RemovedTrigger, SignalTable};
use crate::storage::{AnyStore, SparseSet};
use crate::view::{View, ViewSet};

use self::entity::Allocator;

mod comp;
mod entity;

/// The front door of the entity-component store.
///
/// A `World` owns the entity allocator, the per-entity component masks, one
/// sparse-set store per component type (created lazily on first use), and the
/// component-event signal tables.
///
/// The world is not thread-safe: mutating operations must be serialized by
/// the caller. Systems running on pool threads typically share it behind a
/// lock.
///
/// ## Examples
///
/// ```
/// use weft::prelude::*;
///
/// #[derive(Debug, PartialEq)]
/// struct Pos(f32, f32);
///
/// impl Component for Pos {
///     type Storage = PackedStorage<Self>;
/// }
///
/// let mut world = World::new();
/// let e = world.create_entity();
/// world.add_component(e, Pos(1.0, 2.0));
///
/// assert!(world.has_component::<Pos>(e));
/// assert_eq!(world.get_component::<Pos>(e), Some(&Pos(1.0, 2.0)));
/// ```
#[derive(Default)]
pub struct World {
    alloc: Allocator,
    pub(crate) signatures: Vec<ComponentMask>,
    pub(crate) stores: Vec<Option<Box<dyn AnyStore>>>,
    signals: Vec<Option<Box<dyn Any + Send>>>,
    removed_triggers: Vec<Option<RemovedTrigger>>,
}

impl World {
    /// Creates an empty world.
    pub fn new() -> World {
        Default::default()
    }

    fn ensure_signature(&mut self, index: Index) {
        let index = index as usize;
        if index >= self.signatures.len() {
            self.signatures.resize(index + 1, ComponentMask::new());
        }
    }

    /// Creates a new entity, recycling a destroyed slot if one exists.
    /// The returned id is alive immediately.
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.alloc.allocate();
        self.ensure_signature(entity.index());
        entity
    }

    /// Creates `count` entities at once.
    ///
    /// Equivalent to `count` sequential [`create_entity`](World::create_entity)
    /// calls — recycled slots are handed out first, LIFO — but fresh slots
    /// are appended as one block instead of one reallocation per entity.
    pub fn create_entities(&mut self, count: usize) -> Vec<Entity> {
        let entities = self.alloc.allocate_many(count);
        if let Some(max_index) = entities.iter().map(|e| e.index()).max() {
            self.ensure_signature(max_index);
        }
        entities
    }

    /// Creates or revives an entity with a specific id.
    ///
    /// If `id` is already alive this is a no-op returning `id`. Otherwise the
    /// slot takes the id's generation and an empty mask. Components a prior
    /// occupant left in the stores are *not* swept — the generation check in
    /// every store keeps them inert — so this is intended for rebuilding a
    /// world from a serialized snapshot, where slots are known consistent.
    pub fn create_entity_at(&mut self, id: Entity) -> Entity {
        self.ensure_signature(id.index());
        if self.alloc.claim(id) {
            self.signatures[id.index() as usize].clear();
        }
        id
    }

    /// Destroys an entity and removes all of its components.
    ///
    /// For every component the entity holds, the `Removed` signal fires with
    /// the still-present value, then the store entry is removed. Afterwards
    /// the mask is cleared, the slot generation bumped and the id recycled.
    /// Destroying a dead id is a no-op.
    pub fn destroy_entity(&mut self, entity: Entity) {
        if !self.alloc.is_alive(entity) {
            return;
        }

        let index = entity.index() as usize;
        let mask = self.signatures[index];
        mask.for_each_set_bit(|cid| {
            if let Some(trigger) = self.removed_triggers.get(cid).copied().flatten() {
                trigger(self, entity);
            }
            if let Some(store) = self.stores.get_mut(cid).and_then(|s| s.as_mut()) {
                store.remove(entity);
            }
        });

        self.signatures[index].clear();
        self.alloc.deallocate(entity);
    }

    /// Returns `true` if the id refers to the live occupant of its slot.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.alloc.is_alive(entity)
    }

    /// Number of entity slots ever created, dead ones included.
    pub fn entity_count(&self) -> usize {
        self.signatures.len()
    }

    /// Materializes the id currently associated with a slot index. The
    /// returned id is only meaningful together with [`is_alive`](World::is_alive).
    pub fn entity_at(&self, index: Index) -> Entity {
        self.alloc.entity_at(index)
    }

    /// Returns the component mask of an entity slot, or `None` for an index
    /// that was never allocated.
    pub fn entity_mask(&self, entity: Entity) -> Option<&ComponentMask> {
        self.signatures.get(entity.index() as usize)
    }

    pub(crate) fn store<T: Component>(&self) -> Option<&SparseSet<T>> {
        let cid = component_id::<T>();
        self.stores
            .get(cid)?
            .as_ref()?
            .as_any()
            .downcast_ref::<SparseSet<T>>()
    }

    pub(crate) fn store_mut<T: Component>(&mut self) -> Option<&mut SparseSet<T>> {
        let cid = component_id::<T>();
        self.stores
            .get_mut(cid)?
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<SparseSet<T>>()
    }

    pub(crate) fn store_or_insert<T: Component>(&mut self) -> &mut SparseSet<T> {
        let cid = component_id::<T>();
        if cid >= self.stores.len() {
            self.stores.resize_with(cid + 1, || None);
        }
        self.stores[cid]
            .get_or_insert_with(|| Box::new(SparseSet::<T>::new()))
            .as_any_mut()
            .downcast_mut::<SparseSet<T>>()
            // a component id addresses the same store type for the life of
            // the process
            .unwrap()
    }

    fn ensure_removed_trigger<T: Component>(&mut self) {
        let cid = component_id::<T>();
        if cid >= self.removed_triggers.len() {
            self.removed_triggers.resize(cid + 1, None);
        }
        if self.removed_triggers[cid].is_none() {
            self.removed_triggers[cid] = Some(removed_trigger::<T>);
        }
    }

    /// Adds a component to an entity, then fires the `Added` signal.
    ///
    /// The store for `T` is created lazily on first use. Adding a component
    /// the entity already has overwrites the value in place and fires `Added`
    /// again rather than `Modified`.
    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) {
        self.ensure_signature(entity.index());

        self.store_or_insert::<T>().insert(entity, component);

        let cid = component_id::<T>();
        self.signatures[entity.index() as usize].set(cid);

        self.ensure_removed_trigger::<T>();
        self.trigger_event::<T>(entity, ComponentEvent::Added);
    }

    /// Removes a component from an entity.
    ///
    /// The `Removed` signal fires first, while the component is still
    /// present, then the store entry is removed and the mask bit cleared.
    /// A no-op if the entity does not have the component.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) {
        let cid = component_id::<T>();
        if !self.has_component_id(entity, cid) {
            return;
        }
        // A stale-generation id may share its slot with a live successor;
        // only the exact occupant of the store entry may clear the mask bit.
        if !self.store::<T>().is_some_and(|s| s.contains(entity)) {
            return;
        }

        self.trigger_event::<T>(entity, ComponentEvent::Removed);
        if let Some(store) = self.store_mut::<T>() {
            store.remove(entity);
        }
        self.signatures[entity.index() as usize].reset(cid);
    }

    /// Applies `patch` to the entity's live component, then fires the
    /// `Modified` signal. A no-op if the entity does not have the component.
    ///
    /// No atomicity is promised: observers on the `Modified` list run after
    /// the mutator has returned, on the calling thread.
    pub fn patch_component<T: Component>(&mut self, entity: Entity, patch: impl FnOnce(&mut T)) {
        let cid = component_id::<T>();
        if !self.has_component_id(entity, cid) {
            return;
        }

        match self.store_mut::<T>().and_then(|s| s.get_mut(entity)) {
            Some(component) => patch(component),
            None => return,
        }
        self.trigger_event::<T>(entity, ComponentEvent::Modified);
    }

    /// Returns `true` if the entity has a component of type `T`.
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.has_component_id(entity, component_id::<T>())
    }

    /// Returns `true` if the entity has the component with the given runtime
    /// id.
    pub fn has_component_id(&self, entity: Entity, cid: usize) -> bool {
        match self.signatures.get(entity.index() as usize) {
            Some(signature) => signature.test(cid),
            None => false,
        }
    }

    /// Returns the entity's component, or `None` if absent.
    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.store::<T>()?.get(entity)
    }

    /// Returns the entity's component mutably, or `None` if absent.
    ///
    /// Mutations through this reference fire no signal; use
    /// [`patch_component`](World::patch_component) when observers should see
    /// the change.
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.store_mut::<T>()?.get_mut(entity)
    }

    /// Registers a callback for a component event.
    ///
    /// Callbacks are append-only and fire in registration order, on the
    /// thread performing the triggering mutation. The callback receives the
    /// entity and a mutable reference to the live component.
    pub fn on_event<T: Component>(
        &mut self,
        event: ComponentEvent,
        callback: impl FnMut(Entity, &mut T) + Send + 'static,
    ) {
        let cid = component_id::<T>();
        self.ensure_removed_trigger::<T>();

        if cid >= self.signals.len() {
            self.signals.resize_with(cid + 1, || None);
        }
        let table = self.signals[cid]
            .get_or_insert_with(|| Box::new(SignalTable::<T>::default()))
            .downcast_mut::<SignalTable<T>>()
            // same invariant as the store table: one type per slot
            .unwrap();
        table.list_mut(event).push(Box::new(callback));
    }

    /// Fires all callbacks registered for `(T, event)` with the entity's live
    /// component. Does nothing when no table exists or the component is
    /// absent.
    pub(crate) fn trigger_event<T: Component>(&mut self, entity: Entity, event: ComponentEvent) {
        let cid = component_id::<T>();
        let Some(slot) = self.signals.get_mut(cid) else {
            return;
        };
        // The table is taken out of the world for the duration of the
        // callbacks so the component can be borrowed mutably alongside it.
        let Some(mut boxed) = slot.take() else {
            return;
        };

        if let Some(table) = boxed.downcast_mut::<SignalTable<T>>() {
            if let Some(component) = self.store_mut::<T>().and_then(|s| s.get_mut(entity)) {
                for callback in table.list_mut(event).iter_mut() {
                    callback(entity, &mut *component);
                }
            }
        }

        self.signals[cid] = Some(boxed);
    }

    /// Creates a view over every entity that has all of the listed component
    /// types.
    ///
    /// ```
    /// use weft::prelude::*;
    ///
    /// struct Pos(f32);
    /// struct Vel(f32);
    ///
    /// impl Component for Pos {
    ///     type Storage = PackedStorage<Self>;
    /// }
    /// impl Component for Vel {
    ///     type Storage = PackedStorage<Self>;
    /// }
    ///
    /// let mut world = World::new();
    /// let e = world.create_entity();
    /// world.add_component(e, Pos(0.0));
    /// world.add_component(e, Vel(2.0));
    ///
    /// world.view::<(Pos, Vel)>().each(|_entity, (pos, vel)| {
    ///     pos.0 += vel.0;
    /// });
    ///
    /// assert_eq!(world.get_component::<Pos>(e).unwrap().0, 2.0);
    /// ```
    pub fn view<V: ViewSet>(&mut self) -> View<'_, V> {
        View::new(self)
    }
}
