//! World sizing and recycling behaviour.
//!
//! Capacities are fixed when a [`World`](crate::ecs::World) is built; nothing
//! grows afterwards. A config can be built in code or read from JSON:
//!
//! ```json
//! { "max_entities": 65536, "recycle_policy": "clear" }
//! ```
//!
//! Missing fields fall back to [`WorldConfig::default`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, EcsError, EcsResult};

/// What `destroy_entity` does to the retired slot's components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecyclePolicy {
    /// Presence bits and bytes survive the destroy. A recycled slot must be
    /// written before it is read.
    #[default]
    Retain,
    /// Clear the slot's presence bit in every table and zero its bytes.
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Number of entity slots.
    pub max_entities: usize,
    /// Number of tables, the built-in ACTIVE and EMPTY included.
    pub max_component_types: usize,
    pub recycle_policy: RecyclePolicy,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            max_entities: 16_384,
            max_component_types: 4_096,
            recycle_policy: RecyclePolicy::Retain,
        }
    }
}

impl WorldConfig {
    pub fn with_max_entities(mut self, max_entities: usize) -> Self {
        self.max_entities = max_entities;
        self
    }

    pub fn with_max_component_types(mut self, max_component_types: usize) -> Self {
        self.max_component_types = max_component_types;
        self
    }

    pub fn with_recycle_policy(mut self, policy: RecyclePolicy) -> Self {
        self.recycle_policy = policy;
        self
    }

    /// Reject configs the storage cannot represent.
    pub fn validate(&self) -> EcsResult<()> {
        if self.max_entities == 0 {
            return Err(EcsError::InvalidConfig("zero entities".into()));
        }
        if self.max_entities > u32::MAX as usize {
            return Err(EcsError::InvalidConfig(format!(
                "{} entities exceed the u32 index space",
                self.max_entities
            )));
        }
        if self.max_component_types < 2 {
            return Err(EcsError::InvalidConfig(format!(
                "max_component_types {} leaves no room for ACTIVE and EMPTY",
                self.max_component_types
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: WorldConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        log::debug!("loaded world config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = WorldConfig::default();
        assert_eq!(config.max_entities, 16_384);
        assert_eq!(config.max_component_types, 4_096);
        assert_eq!(config.recycle_policy, RecyclePolicy::Retain);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = WorldConfig::from_json_str(r#"{ "max_entities": 100 }"#).unwrap();
        assert_eq!(config.max_entities, 100);
        assert_eq!(config.max_component_types, 4_096);
        assert_eq!(config.recycle_policy, RecyclePolicy::Retain);
    }

    #[test]
    fn policy_is_snake_case() {
        let config = WorldConfig::from_json_str(r#"{ "recycle_policy": "clear" }"#).unwrap();
        assert_eq!(config.recycle_policy, RecyclePolicy::Clear);

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains(r#""recycle_policy":"clear""#));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = WorldConfig::from_json_str("{ max_entities: ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_entities_rejected() {
        let err = WorldConfig::from_json_str(r#"{ "max_entities": 0 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid(EcsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn too_few_component_types_rejected() {
        let config = WorldConfig::default().with_max_component_types(1);
        assert!(config.validate().is_err());
        assert!(WorldConfig::default().with_max_component_types(2).validate().is_ok());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = WorldConfig::load("/definitely/not/here/world.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
