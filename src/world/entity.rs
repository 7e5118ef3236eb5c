use std::fmt;

/// An index is the slot half of an [`Entity`] id.
pub type Index = u32;

/// `Entity` type, as seen by the user.
///
/// A 64-bit handle: the low 32 bits are the slot index, the high 32 bits the
/// generation. Two ids with the same index but different generations refer to
/// distinct logical entities; at most one of them is alive at any time.
/// Equality and hashing are bit-identical.
#[derive(Clone, Copy, Hash, Eq, Ord, PartialEq, PartialOrd)]
pub struct Entity(u64);

impl Entity {
    /// Builds an entity id from a slot index and a generation.
    #[inline]
    pub fn from_parts(index: Index, generation: u32) -> Entity {
        Entity((u64::from(generation) << 32) | u64::from(index))
    }

    /// Returns the slot index of the entity.
    #[inline]
    pub fn index(self) -> Index {
        self.0 as u32
    }

    /// Returns the generation of the entity.
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Returns the raw 64-bit representation, suitable for serialization.
    #[inline]
    pub fn to_bits(self) -> u64 {
        self.0
    }

    /// Reconstructs an entity id from its raw 64-bit representation.
    #[inline]
    pub fn from_bits(bits: u64) -> Entity {
        Entity(bits)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index(), self.generation())
    }
}

/// Internally used structure for entity allocation.
///
/// Tracks liveness with a per-slot generation counter and recycles destroyed
/// slots through a LIFO free list. Ids on the free list already carry the
/// generation their next occupant will use.
#[derive(Default, Debug)]
pub(crate) struct Allocator {
    generations: Vec<u32>,
    free: Vec<Entity>,
}

impl Allocator {
    /// Allocates a new entity, recycling a destroyed slot if one exists.
    pub fn allocate(&mut self) -> Entity {
        if let Some(recycled) = self.free.pop() {
            return recycled;
        }

        let index = self.generations.len() as Index;
        self.generations.push(0);
        Entity::from_parts(index, 0)
    }

    /// Allocates `count` entities, recycling from the free list first and
    /// appending the remainder as one contiguous block.
    pub fn allocate_many(&mut self, count: usize) -> Vec<Entity> {
        let mut entities = Vec::with_capacity(count);

        while entities.len() < count {
            match self.free.pop() {
                Some(recycled) => entities.push(recycled),
                None => break,
            }
        }

        let missing = count - entities.len();
        if missing > 0 {
            let start = self.generations.len() as Index;
            self.generations.resize(self.generations.len() + missing, 0);
            entities.extend((0..missing as Index).map(|i| Entity::from_parts(start + i, 0)));
        }

        entities
    }

    /// Claims a specific id, resizing the slot table as needed.
    ///
    /// Returns `false` if the id was already alive (nothing changed). On a
    /// successful claim the slot takes the id's generation and any recycled
    /// id for the same index is dropped from the free list.
    pub fn claim(&mut self, id: Entity) -> bool {
        let index = id.index() as usize;
        if index >= self.generations.len() {
            self.generations.resize(index + 1, 0);
        }

        if self.is_alive(id) {
            return false;
        }

        self.free.retain(|recycled| recycled.index() != id.index());
        self.generations[index] = id.generation();
        true
    }

    /// Retires an id: bumps the slot generation and pushes the successor id
    /// onto the free list. The caller has already checked liveness.
    ///
    /// Generations wrap after 2^32 destroy cycles on one slot; at that point
    /// resurrected ids alias retired ones. The limit is documented, not
    /// handled.
    pub fn deallocate(&mut self, id: Entity) {
        let index = id.index() as usize;
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.free
            .push(Entity::from_parts(id.index(), self.generations[index]));
    }

    /// Returns `true` if the id refers to the live occupant of its slot.
    /// An out-of-range index is never alive.
    pub fn is_alive(&self, id: Entity) -> bool {
        match self.generations.get(id.index() as usize) {
            Some(&generation) => generation == id.generation(),
            None => false,
        }
    }

    /// Materializes the id currently associated with a slot index.
    pub fn entity_at(&self, index: Index) -> Entity {
        let generation = self.generations.get(index as usize).copied().unwrap_or(0);
        Entity::from_parts(index, generation)
    }

    /// Number of slots ever allocated, dead ones included.
    pub fn len(&self) -> usize {
        self.generations.len()
    }
}
