//! Storage diagnostics: a serializable snapshot of slot usage and table
//! occupancy, plus logger setup.
//!
//! Enabled by the `diagnostics` feature flag (on by default).
//!
//! ```ignore
//! bitecs::diag::init_logger();
//! log::info!("{}", world.stats().to_json()?);
//! ```

use serde::Serialize;

use crate::ecs::bitset::BitsetTable;
use crate::ecs::component::TableId;
use crate::ecs::entity::EntityAllocator;
use crate::ecs::registry::ComponentRegistry;

/// Install `env_logger`, reading filters from `RUST_LOG` and defaulting to
/// `info`. Safe to call more than once; only the first call installs.
pub fn init_logger() {
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}

// ── Snapshot types ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageStats {
    pub capacity: usize,
    pub alive_count: usize,
    pub free_count: usize,
    /// Lowest free slot, `capacity` when full.
    pub empty_head: usize,
    /// Highest word scanned by queries.
    pub entity_tail: usize,
    /// Free slots below the high-water mark, as a percentage of it.
    pub fragmentation_pct: f32,
    /// Bytes held by all component tables.
    pub component_bytes: usize,
    pub tables: Vec<TableStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableStats {
    pub id: u32,
    pub name: &'static str,
    pub size: u32,
    /// Occupied slots whose presence bit is set (free slots for EMPTY).
    pub count: usize,
}

impl StorageStats {
    pub(crate) fn collect(registry: &ComponentRegistry, allocator: &EntityAllocator) -> Self {
        let free = allocator.free_slots();
        let capacity = allocator.capacity();
        let alive_count = allocator.alive_count();

        let tables = registry
            .iter()
            .map(|(id, reg)| TableStats {
                id: id.raw(),
                name: reg.name,
                size: reg.size,
                count: if id == TableId::EMPTY {
                    free.count_ones()
                } else {
                    occupied_count(&reg.presence, free)
                },
            })
            .collect();

        let component_bytes = registry
            .iter()
            .map(|(_, reg)| reg.size as usize * capacity)
            .sum();

        let high_water = ((allocator.entity_tail() + 1) * crate::ecs::bitset::WORD_BITS)
            .min(capacity);
        let fragmentation_pct = if alive_count == 0 || high_water == 0 {
            0.0
        } else {
            (high_water - alive_count) as f32 / high_water as f32 * 100.0
        };

        Self {
            capacity,
            alive_count,
            free_count: capacity - alive_count,
            empty_head: allocator.empty_head(),
            entity_tail: allocator.entity_tail(),
            fragmentation_pct,
            component_bytes,
            tables,
        }
    }

    /// Serialize as compact JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Serialize as indented JSON.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Set bits of `presence` that fall on occupied slots.
fn occupied_count(presence: &BitsetTable, free: &BitsetTable) -> usize {
    (0..presence.word_count())
        .map(|w| (presence.word(w) & !free.word(w) & free.valid_mask(w)).count_ones() as usize)
        .sum()
}

#[cfg(test)]
mod tests {
    use crate::config::WorldConfig;
    use crate::ecs::World;

    #[repr(C)]
    #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
    struct Mass(f32);

    struct Sleeping;

    #[test]
    fn counts_follow_entities() {
        let mut world = World::with_config(WorldConfig::default().with_max_entities(100)).unwrap();
        let mass = world.register::<Mass>().unwrap();
        let sleeping = world.register_flag::<Sleeping>().unwrap();

        let ids: Vec<_> = (0..10).map(|_| world.create_entity().unwrap()).collect();
        for e in &ids[..4] {
            world.add_component(*e, mass, Mass(1.0)).unwrap();
        }
        world.add_flag(ids[0], sleeping).unwrap();
        world.destroy_entity(ids[1]).unwrap();

        let stats = world.stats();
        assert_eq!(stats.capacity, 100);
        assert_eq!(stats.alive_count, 9);
        assert_eq!(stats.free_count, 91);
        assert_eq!(stats.empty_head, 1);
        assert_eq!(stats.entity_tail, 0);
        assert_eq!(stats.component_bytes, 400);

        let by_id = |id: crate::ecs::TableId| {
            stats.tables.iter().find(|t| t.id == id.raw()).unwrap().count
        };
        // The destroyed entity's retained presence bit is not counted.
        assert_eq!(by_id(mass.id()), 3);
        assert_eq!(by_id(sleeping), 1);
        assert_eq!(by_id(crate::ecs::TableId::ACTIVE), 9);
        assert_eq!(by_id(crate::ecs::TableId::EMPTY), 91);
    }

    #[test]
    fn fragmentation() {
        let mut world = World::with_config(WorldConfig::default().with_max_entities(64)).unwrap();
        let ids: Vec<_> = (0..32).map(|_| world.create_entity().unwrap()).collect();
        assert_eq!(world.stats().fragmentation_pct, 0.0);
        for e in &ids[..8] {
            world.destroy_entity(*e).unwrap();
        }
        assert_eq!(world.stats().fragmentation_pct, 25.0);
    }

    #[test]
    fn json_output() {
        let mut world = World::with_config(WorldConfig::default().with_max_entities(8)).unwrap();
        world.register::<Mass>().unwrap();
        world.create_entity().unwrap();

        let json = world.stats().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["capacity"], 8);
        assert_eq!(value["alive_count"], 1);
        assert_eq!(value["tables"][0]["name"], "ACTIVE");
        assert_eq!(value["tables"][2]["size"], 4);
    }

    #[test]
    fn init_logger_is_idempotent() {
        super::init_logger();
        super::init_logger();
    }
}
