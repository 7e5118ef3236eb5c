//! Transient queries over conjunctions of component types.

use std::marker::PhantomData;

use crate::mask::ComponentMask;
use crate::storage::{AnyStore, SparseSet};
use crate::world::{component_id, Component, Entity, World};

/// A transient query over every entity that has all of `V`'s component
/// types, created by [`World::view`].
///
/// Iteration walks the *driving store* — the participating store with the
/// fewest components — in dense order, filters candidates with one mask
/// containment test per entity, and fetches the remaining components by
/// sparse lookup. Cost is `O(|smallest store| + k · matches)`.
///
/// The view holds the world mutably for its whole lifetime, so stores cannot
/// be mutated mid-iteration; the callback only sees the borrowed components.
pub struct View<'a, V: ViewSet> {
    world: &'a mut World,
    mask: ComponentMask,
    _marker: PhantomData<V>,
}

impl<'a, V: ViewSet> View<'a, V> {
    pub(crate) fn new(world: &'a mut World) -> Self {
        View {
            world,
            mask: V::component_mask(),
            _marker: PhantomData,
        }
    }

    /// Invokes `f` once per matching entity with mutable references to each
    /// of its components.
    pub fn each<F>(self, f: F)
    where
        F: for<'r> FnMut(Entity, V::Refs<'r>),
    {
        V::for_each(self.world, &self.mask, f);
    }
}

/// A tuple of component types usable as a view, implemented for arities 1
/// through 8.
pub trait ViewSet {
    /// The references handed to the iteration callback.
    type Refs<'r>;

    /// The combined mask of all component types in the set.
    ///
    /// # Panics
    ///
    /// Panics if the same component type appears twice — two mutable
    /// references into one store can never be handed out.
    fn component_mask() -> ComponentMask;

    /// Drives the iteration for [`View::each`].
    fn for_each<F>(world: &mut World, mask: &ComponentMask, f: F)
    where
        F: for<'r> FnMut(Entity, Self::Refs<'r>);
}

/// # Safety
///
/// `slots` must point at a store table with at least `component_id::<T>() + 1`
/// slots, and the slot for `T` must be occupied.
unsafe fn store_ptr<T: Component>(slots: *mut Option<Box<dyn AnyStore>>) -> *mut SparseSet<T> {
    let slot = &mut *slots.add(component_id::<T>());
    slot.as_mut()
        .and_then(|s| s.as_any_mut().downcast_mut::<SparseSet<T>>())
        // every store was created before the pointers are taken
        .unwrap()
}

macro_rules! impl_view_set {
    ($($ty:ident => $idx:tt),+) => {
        impl<$($ty: Component,)+> ViewSet for ($($ty,)+) {
            type Refs<'r> = ($(&'r mut $ty,)+);

            fn component_mask() -> ComponentMask {
                let mut mask = ComponentMask::new();
                $(
                    let cid = component_id::<$ty>();
                    assert!(
                        !mask.test(cid),
                        "a view must not list the same component type twice"
                    );
                    mask.set(cid);
                )+
                mask
            }

            fn for_each<F>(world: &mut World, mask: &ComponentMask, mut f: F)
            where
                F: for<'r> FnMut(Entity, Self::Refs<'r>),
            {
                // Stores are created up front so the raw pointers below stay
                // valid: growing the store table moves the boxes' slots, not
                // their contents.
                $(world.store_or_insert::<$ty>();)+

                let World { signatures, stores, .. } = world;
                // SAFETY: every requested store exists after the loop above,
                // and each pointer is taken from a distinct table slot.
                let slots = stores.as_mut_ptr();
                let ptrs = ($(unsafe { store_ptr::<$ty>(slots) },)+);

                // SAFETY: the component types are pairwise distinct (checked
                // in `component_mask`), so each pointer targets a different
                // store. References below are created at most once per store
                // per iteration step, and the callback cannot reach the
                // world while they are live.
                let sizes = [$(unsafe { (*ptrs.$idx).len() }),+];
                let mut driver = 0;
                for (i, &size) in sizes.iter().enumerate() {
                    if size < sizes[driver] {
                        driver = i;
                    }
                }

                for pos in 0..sizes[driver] {
                    let entity = $(if driver == $idx {
                        unsafe { (*ptrs.$idx).entities()[pos] }
                    } else)+ {
                        unreachable!()
                    };

                    let Some(signature) = signatures.get(entity.index() as usize) else {
                        continue;
                    };
                    if !signature.contains(mask) {
                        continue;
                    }

                    let refs = ($(
                        {
                            let store = unsafe { &mut *ptrs.$idx };
                            if driver == $idx {
                                store.dense_value_mut(pos)
                            } else {
                                // a stale dense entry can shadow the current
                                // occupant of the slot; skip on id mismatch
                                match store.get_mut(entity) {
                                    Some(value) => value,
                                    None => continue,
                                }
                            }
                        },
                    )+);

                    f(entity, refs);
                }
            }
        }
    };
}

impl_view_set!(A => 0);
impl_view_set!(A => 0, B => 1);
impl_view_set!(A => 0, B => 1, C => 2);
impl_view_set!(A => 0, B => 1, C => 2, D => 3);
impl_view_set!(A => 0, B => 1, C => 2, D => 3, E => 4);
impl_view_set!(A => 0, B => 1, C => 2, D => 3, E => 4, G => 5);
impl_view_set!(A => 0, B => 1, C => 2, D => 3, E => 4, G => 5, H => 6);
impl_view_set!(A => 0, B => 1, C => 2, D => 3, E => 4, G => 5, H => 6, I => 7);
