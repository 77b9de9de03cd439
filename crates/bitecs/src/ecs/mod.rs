//! # Bitset ECS Storage
//!
//! Entities are slot indices with a generation. Every component type owns a
//! presence bitset and, when it carries data, a fixed-stride byte table.
//! Queries AND those bitsets 32 slots at a time.
//!
//! ## Module Overview
//!
//! - [`bitset`] — Fixed-capacity presence bits in 32-bit words
//! - [`component`] — Table ids, typed handles and byte tables
//! - [`entity`] — Generational entity ids and the bitset free list
//! - `registry` — Table id allocation and ownership
//! - `archetype` — Word-at-a-time include/exclude scan
//! - [`query`] — Typed `Read` / `Write` views over a scan
//! - [`world`] — Context owning all of the above

pub(crate) mod archetype;
pub mod bitset;
pub mod component;
pub mod entity;
pub mod query;
pub(crate) mod registry;
pub mod world;

pub use bitset::BitsetTable;
pub use component::{Component, ComponentTable, TableId};
pub use entity::EntityId;
pub use query::{Filter, QueryParam, Read, Write};
pub use world::World;
