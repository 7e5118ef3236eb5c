//! Component-event signals: ordered callback lists fired by store mutations.

use crate::world::{Component, Entity, World};

/// Component lifecycle events a callback can subscribe to via
/// [`World::on_event`].
///
/// Ordering relative to the store mutation is part of the contract:
///
/// * `Added` fires after the component is inserted and the mask bit set.
/// * `Removed` fires before the component is erased, so the callback sees the
///   final value.
/// * `Modified` fires after a [`World::patch_component`] mutator returns.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ComponentEvent {
    /// A component was inserted. Re-inserting over an existing component
    /// fires `Added` again, not `Modified`.
    Added,
    /// A component is about to be erased.
    Removed,
    /// A component was mutated through `patch_component`.
    Modified,
}

pub(crate) type ComponentCallback<T> = Box<dyn FnMut(Entity, &mut T) + Send>;

/// Per-component-type callback lists, one per event kind. Registration is
/// append-only; invocation order is registration order.
pub(crate) struct SignalTable<T> {
    added: Vec<ComponentCallback<T>>,
    removed: Vec<ComponentCallback<T>>,
    modified: Vec<ComponentCallback<T>>,
}

impl<T> Default for SignalTable<T> {
    fn default() -> Self {
        SignalTable {
            added: Vec::new(),
            removed: Vec::new(),
            modified: Vec::new(),
        }
    }
}

impl<T> SignalTable<T> {
    pub fn list_mut(&mut self, event: ComponentEvent) -> &mut Vec<ComponentCallback<T>> {
        match event {
            ComponentEvent::Added => &mut self.added,
            ComponentEvent::Removed => &mut self.removed,
            ComponentEvent::Modified => &mut self.modified,
        }
    }
}

/// Trigger slot type stored per component id.
///
/// `World::destroy_entity` only knows component ids from the mask bits; the
/// monomorphized function pointer installed here recovers the component type
/// without any runtime type-name lookup on the destroy path.
pub(crate) type RemovedTrigger = fn(&mut World, Entity);

pub(crate) fn removed_trigger<T: Component>(world: &mut World, entity: Entity) {
    world.trigger_event::<T>(entity, ComponentEvent::Removed);
}
