//! # Archetype — Bitset Intersection Queries
//!
//! An archetype is a combination of components. Rather than grouping entities
//! into per-archetype tables, this ECS answers "which entities have A and B
//! but not C?" by intersecting presence bitsets, 32 slots at a time:
//!
//! ```text
//! for word in 0..=entity_tail:
//!     w  = !EMPTY[word]          occupied slots
//!     w &= A[word] & B[word]     every include
//!     w &= ACTIVE[word]          only when the query filters on something
//!     w &= !C[word]              every exclude
//!     while w != 0:
//!         bit = ctz(w); w ^= 1 << bit
//!         visit(word * 32 + bit)
//! ```
//!
//! The scan is bounded by the allocator's `entity_tail`, never allocates, and
//! never writes to a table. Entities come out in ascending slot order.
//!
//! A query with no includes and no excludes visits every occupied slot,
//! active or not. As soon as it filters on anything, inactive entities drop
//! out.

use super::bitset::{BitsetTable, WORD_BITS};
use super::component::TableId;
use super::entity::{EntityAllocator, EntityId};
use super::registry::ComponentRegistry;
use crate::error::EcsResult;

/// Read-only view over the presence tables used by one archetype scan.
pub(crate) struct ArchetypeScan<'w> {
    registry: &'w ComponentRegistry,
    allocator: &'w EntityAllocator,
    includes: &'w [TableId],
    excludes: &'w [TableId],
}

impl<'w> ArchetypeScan<'w> {
    /// Validate every table id up front so a bad id fails before any visit.
    pub fn new(
        registry: &'w ComponentRegistry,
        allocator: &'w EntityAllocator,
        includes: &'w [TableId],
        excludes: &'w [TableId],
    ) -> EcsResult<Self> {
        for &table in includes.iter().chain(excludes) {
            registry.check(table)?;
        }
        Ok(Self {
            registry,
            allocator,
            includes,
            excludes,
        })
    }

    #[inline]
    fn presence(&self, table: TableId) -> &'w BitsetTable {
        if table == TableId::EMPTY {
            self.allocator.free_slots()
        } else {
            self.registry.presence(table)
        }
    }

    /// Slots in `word_index` that match the archetype, as a bitmask.
    #[inline]
    fn archetype_word(&self, word_index: usize) -> u32 {
        let empty = self.allocator.free_slots();
        let mut word = !empty.word(word_index) & empty.valid_mask(word_index);

        for &table in self.includes {
            word &= self.presence(table).word(word_index);
        }
        if !self.includes.is_empty() || !self.excludes.is_empty() {
            word &= self.registry.presence(TableId::ACTIVE).word(word_index);
        }
        for &table in self.excludes {
            word &= !self.presence(table).word(word_index);
        }
        word
    }

    /// Visit every matching entity in ascending slot order.
    pub fn for_each(&self, mut visit: impl FnMut(EntityId)) {
        let generations = self.allocator.generations();
        let words = self.allocator.free_slots().word_count();
        if words == 0 {
            return;
        }
        let tail = self.allocator.entity_tail().min(words - 1);

        for word_index in 0..=tail {
            let mut word = self.archetype_word(word_index);
            while word != 0 {
                let bit = word.trailing_zeros();
                word ^= 1 << bit;
                let index = word_index * WORD_BITS + bit as usize;
                visit(EntityId {
                    index: index as u32,
                    generation: generations[index],
                });
            }
        }
    }

    /// Number of matching entities, using popcount per word.
    pub fn count(&self) -> usize {
        let words = self.allocator.free_slots().word_count();
        if words == 0 {
            return 0;
        }
        let tail = self.allocator.entity_tail().min(words - 1);
        (0..=tail)
            .map(|w| self.archetype_word(w).count_ones() as usize)
            .sum()
    }
}
