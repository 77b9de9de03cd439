//! Convenience re-exports — `use bitecs::prelude::*` for the common items.

pub use crate::config::{RecyclePolicy, WorldConfig};
pub use crate::ecs::{Component, EntityId, Filter, Read, TableId, World, Write};
pub use crate::error::{ConfigError, EcsError, EcsResult};
#[cfg(feature = "diagnostics")]
pub use crate::diag::{StorageStats, TableStats};
