//! # Entity — Generation-Checked Slot Handles
//!
//! An [`EntityId`] is a slot index plus a generation. It owns nothing: it is a
//! lookup key into the component tables and a staleness token.
//!
//! ## Generational Indices
//!
//! ```text
//! 1. create_entity        -> EntityId { index: 5, generation: 0 }
//! 2. destroy_entity(5v0)  -> generations[5] = 1
//! 3. create_entity        -> EntityId { index: 5, generation: 1 }
//! 4. has_component(5v0)   -> Err(StaleHandle), 0 != generations[5]
//! ```
//!
//! ## Free List as a Bitset
//!
//! Instead of a `Vec` of free indices, the allocator keeps an EMPTY
//! [`BitsetTable`] in which a set bit means "slot is free". Two cursors keep
//! scans short:
//!
//! ```text
//! empty:   word 0 = 0000...0000   word 1 = 1111...1010   word 2 = 1111...1111
//!                                              ^
//!          empty_head = 32 + ctz(word 1) = 33  (lowest free slot)
//!          entity_tail = 1                     (highest word ever allocated in)
//! ```
//!
//! - `empty_head` is always the lowest free slot, or `capacity` when storage
//!   is full. Allocation takes it, then skips forward over fully-taken words
//!   and uses `trailing_zeros` to land on the next free bit.
//! - `entity_tail` bounds query scans. It grows on allocation and shrinks
//!   backward over fully-free words on destroy.

use std::fmt;

use super::bitset::{BitsetTable, WORD_BITS};
use crate::error::{EcsError, EcsResult};

/// A lightweight handle to an entity slot in a [`World`](super::World).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl EntityId {
    /// Build a handle from raw parts. Mostly useful for tests and tooling;
    /// the world decides whether it is valid.
    pub const fn from_raw_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index.
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    /// Generation captured when the handle was created.
    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }

    #[inline]
    pub(crate) fn slot(self) -> usize {
        self.index as usize
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Allocates and retires entity slots.
pub(crate) struct EntityAllocator {
    /// Set bit = free slot.
    empty: BitsetTable,
    /// Incremented on every destroy.
    generations: Vec<u32>,
    /// Lowest free slot, `capacity` when none is free.
    empty_head: usize,
    /// Highest word index that holds (or held) an allocated slot.
    entity_tail: usize,
    /// Occupied slot count.
    alive: usize,
}

impl EntityAllocator {
    pub fn new(capacity: usize) -> Self {
        Self {
            empty: BitsetTable::filled(capacity),
            generations: vec![0; capacity],
            empty_head: 0,
            entity_tail: 0,
            alive: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.generations.len()
    }

    /// Take the lowest free slot.
    ///
    /// Fails without touching any state when every slot is occupied.
    pub fn allocate(&mut self) -> EcsResult<EntityId> {
        let capacity = self.capacity();
        let index = self.empty_head;
        if index >= capacity || !self.empty.get(index) {
            return Err(EcsError::StorageExhausted { capacity });
        }

        self.empty.clear(index);
        self.empty_head = self.next_free_from(index / WORD_BITS);
        self.entity_tail = self.entity_tail.max(index / WORD_BITS);
        self.alive += 1;

        Ok(EntityId {
            index: index as u32,
            generation: self.generations[index],
        })
    }

    /// Forward scan for the first word with a free bit, starting at
    /// `word_index`. Returns `capacity` when the scan runs off the end.
    fn next_free_from(&self, mut word_index: usize) -> usize {
        let words = self.empty.word_count();
        while word_index < words {
            let word = self.empty.word(word_index);
            if word != 0 {
                return word_index * WORD_BITS + word.trailing_zeros() as usize;
            }
            word_index += 1;
        }
        self.capacity()
    }

    /// Retire a slot. The generation bump invalidates every outstanding
    /// handle to it.
    pub fn deallocate(&mut self, entity: EntityId) -> EcsResult<()> {
        if !self.is_alive(entity) {
            return Err(EcsError::StaleHandle { entity });
        }
        let index = entity.slot();

        self.empty.set(index);
        while self.entity_tail > 0 && self.empty.word_is_full(self.entity_tail) {
            self.entity_tail -= 1;
        }
        if index < self.empty_head {
            self.empty_head = index;
        }
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.alive -= 1;
        Ok(())
    }

    /// `true` if the handle refers to the current occupant of its slot.
    #[inline]
    pub fn is_alive(&self, entity: EntityId) -> bool {
        let index = entity.slot();
        index < self.capacity()
            && self.generations[index] == entity.generation
            && !self.empty.get(index)
    }

    /// Fails with `StaleHandle` unless [`is_alive`](Self::is_alive).
    #[inline]
    pub fn check(&self, entity: EntityId) -> EcsResult<()> {
        if self.is_alive(entity) {
            Ok(())
        } else {
            Err(EcsError::StaleHandle { entity })
        }
    }

    /// Current generation of `index`, `None` when out of range.
    pub fn generation(&self, index: u32) -> Option<u32> {
        self.generations.get(index as usize).copied()
    }

    #[inline]
    pub fn generations(&self) -> &[u32] {
        &self.generations
    }

    /// The EMPTY table (set = free).
    #[inline]
    pub fn free_slots(&self) -> &BitsetTable {
        &self.empty
    }

    #[inline]
    pub fn empty_head(&self) -> usize {
        self.empty_head
    }

    #[inline]
    pub fn entity_tail(&self) -> usize {
        self.entity_tail
    }

    #[inline]
    pub fn alive_count(&self) -> usize {
        self.alive
    }
}
