//! # bitecs — Bitset Entity-Component Storage
//!
//! The storage core of a game engine: a generation-checked entity allocator,
//! per-component presence bitsets with raw component tables, and archetype
//! queries that AND bitsets word-at-a-time.
//!
//! Start with `use bitecs::prelude::*` and build a [`World`](ecs::World).

pub mod config;
pub mod ecs;
pub mod error;
pub mod prelude;

#[cfg(feature = "diagnostics")]
pub mod diag;
