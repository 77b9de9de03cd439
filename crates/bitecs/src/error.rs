//! # Errors
//!
//! Every fallible storage operation returns [`EcsResult`]. Failures are
//! detected before any bit or byte is written, so a rejected call leaves the
//! [`World`](crate::ecs::World) exactly as it was.
//!
//! ```ignore
//! match world.destroy_entity(saved) {
//!     Ok(()) => {}
//!     Err(EcsError::StaleHandle { entity }) => log::debug!("{entity} already gone"),
//!     Err(e) => return Err(e),
//! }
//! ```
//!
//! [`ConfigError`] is kept separate: it only arises while loading a
//! [`WorldConfig`](crate::config::WorldConfig), never on the hot path.

use std::fmt;

use crate::ecs::component::TableId;
use crate::ecs::entity::EntityId;

/// Result alias used throughout the storage API.
pub type EcsResult<T> = Result<T, EcsError>;

/// Failure of a storage, registry or query operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// The handle's generation no longer matches its slot (destroyed or
    /// reused), or its index lies outside the storage.
    StaleHandle {
        entity: EntityId,
    },

    /// Every entity slot is occupied.
    StorageExhausted {
        capacity: usize,
    },

    /// A table id that was never handed out by this world's registry.
    UnknownComponentType {
        table: TableId,
        /// Number of tables registered at the time of the call.
        registered: usize,
    },

    /// Component data did not match the table's stride.
    ComponentSizeMismatch {
        table: TableId,
        expected: u32,
        actual: usize,
    },

    /// Data access on a flag table, which stores no bytes.
    NotAComponent {
        table: TableId,
    },

    /// `register::<T>()` was called with a zero-sized `T`; flags go through
    /// `register_flag`.
    ZeroSizedComponent {
        name: &'static str,
    },

    /// The Rust type is already bound to a table.
    DuplicateComponentType {
        name: &'static str,
    },

    /// Registering another table would exceed `max_component_types`.
    ComponentTypeLimit {
        limit: usize,
    },

    /// The EMPTY table is maintained by the entity allocator and cannot be
    /// written through the component API.
    ReservedTable {
        table: TableId,
    },

    /// The same table was requested twice in one query.
    AliasedComponentAccess {
        table: TableId,
    },

    /// The world configuration was rejected.
    InvalidConfig(String),
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::StaleHandle { entity } => {
                write!(f, "stale or dead entity handle {entity}")
            }
            EcsError::StorageExhausted { capacity } => {
                write!(f, "entity storage exhausted (capacity {capacity})")
            }
            EcsError::UnknownComponentType { table, registered } => write!(
                f,
                "unknown component table {table} ({registered} tables registered)"
            ),
            EcsError::ComponentSizeMismatch {
                table,
                expected,
                actual,
            } => write!(
                f,
                "component table {table} stores {expected}-byte values, got {actual} bytes"
            ),
            EcsError::NotAComponent { table } => {
                write!(f, "table {table} is a flag and holds no component data")
            }
            EcsError::ZeroSizedComponent { name } => {
                write!(f, "`{name}` is zero-sized; register it as a flag")
            }
            EcsError::DuplicateComponentType { name } => {
                write!(f, "`{name}` is already registered")
            }
            EcsError::ComponentTypeLimit { limit } => {
                write!(f, "component type limit reached ({limit} tables)")
            }
            EcsError::ReservedTable { table } => {
                write!(f, "table {table} is reserved for the entity allocator")
            }
            EcsError::AliasedComponentAccess { table } => {
                write!(f, "table {table} requested more than once in a query")
            }
            EcsError::InvalidConfig(reason) => write!(f, "invalid world config: {reason}"),
        }
    }
}

impl std::error::Error for EcsError {}

/// Failure while loading a [`WorldConfig`](crate::config::WorldConfig).
#[derive(Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    Io(std::io::Error),
    /// The JSON did not describe a config.
    Parse(serde_json::Error),
    /// The values parsed but were rejected by validation.
    Invalid(EcsError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read world config: {e}"),
            ConfigError::Parse(e) => write!(f, "failed to parse world config: {e}"),
            ConfigError::Invalid(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<EcsError> for ConfigError {
    fn from(e: EcsError) -> Self {
        ConfigError::Invalid(e)
    }
}
