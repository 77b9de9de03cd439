//! # World — The Storage Context
//!
//! The [`World`] owns the entity allocator and the component registry. Every
//! storage operation goes through it; there is no global state, so several
//! worlds (one per test, one per level, one for an editor preview) can live
//! side by side.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ World                                                    │
//! │                                                          │
//! │  config: WorldConfig       fixed capacities              │
//! │                                                          │
//! │  allocator: EntityAllocator                              │
//! │    EMPTY bitset (set = free), generations[capacity]      │
//! │    empty_head, entity_tail                               │
//! │                                                          │
//! │  registry: ComponentRegistry                             │
//! │    TableId -> presence BitsetTable + ComponentTable      │
//! │    TypeId  -> TableId                                    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut world = World::new();
//! let pos = world.register::<Vec3>()?;
//! let frozen = world.register_flag::<Frozen>()?;
//!
//! let e = world.create_entity()?;
//! world.add_component(e, pos, Vec3::ZERO)?;
//!
//! world.for_archetype(&[pos.id()], &[frozen], |e| println!("{e}"))?;
//! ```
//!
//! Every call validates its handles and table ids before touching storage,
//! so an `Err` always means nothing changed.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use bytemuck::Pod;

use super::archetype::ArchetypeScan;
use super::bitset::BitsetTable;
use super::component::{Component, TableId};
use super::entity::{EntityAllocator, EntityId};
use super::query::{Filter, QueryParam};
use super::registry::{ComponentRegistry, Registration};
use crate::config::{RecyclePolicy, WorldConfig};
use crate::error::{EcsError, EcsResult};

/// Entity slots, component tables and the queries over them.
pub struct World {
    config: WorldConfig,
    allocator: EntityAllocator,
    registry: ComponentRegistry,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// World with [`WorldConfig::default`] capacities.
    pub fn new() -> Self {
        Self::build(WorldConfig::default())
    }

    /// World with custom capacities. Fails with `InvalidConfig` if the config
    /// does not validate.
    pub fn with_config(config: WorldConfig) -> EcsResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: WorldConfig) -> Self {
        log::debug!(
            "world: {} entity slots, up to {} tables, {:?} on destroy",
            config.max_entities,
            config.max_component_types,
            config.recycle_policy
        );
        Self {
            allocator: EntityAllocator::new(config.max_entities),
            registry: ComponentRegistry::new(config.max_entities, config.max_component_types),
            config,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Register a sized component type. Its table holds `size_of::<T>()`
    /// bytes per slot.
    pub fn register<T: Pod>(&mut self) -> EcsResult<Component<T>> {
        let size = std::mem::size_of::<T>();
        if size == 0 {
            return Err(EcsError::ZeroSizedComponent {
                name: std::any::type_name::<T>(),
            });
        }
        let id = self.registry.register_type::<T>(size as u32)?;
        Ok(Component::new(id))
    }

    /// Register a marker type. Flags have a presence bitset and no data.
    pub fn register_flag<T: 'static>(&mut self) -> EcsResult<TableId> {
        self.registry.register_type::<T>(0)
    }

    /// Register an untyped table of `component_size` bytes per slot; 0 makes
    /// a flag.
    pub fn register_table(&mut self, component_size: u32) -> EcsResult<TableId> {
        self.registry.register("<untyped>", component_size)
    }

    /// Handle for a type previously passed to [`register`](Self::register).
    pub fn component<T: Pod>(&self) -> Option<Component<T>> {
        let id = self.registry.lookup::<T>()?;
        let reg = self.registry.get(id).ok()?;
        (reg.size > 0).then(|| Component::new(id))
    }

    /// Table id for a type previously passed to
    /// [`register_flag`](Self::register_flag).
    pub fn flag<T: 'static>(&self) -> Option<TableId> {
        let id = self.registry.lookup::<T>()?;
        let reg = self.registry.get(id).ok()?;
        (reg.size == 0).then_some(id)
    }

    /// Bytes per slot of `table`, 0 for flags.
    pub fn component_size(&self, table: TableId) -> EcsResult<u32> {
        Ok(self.registry.get(table)?.size)
    }

    /// Name `table` was registered under.
    pub fn table_name(&self, table: TableId) -> EcsResult<&'static str> {
        Ok(self.registry.get(table)?.name)
    }

    /// Number of registered tables, ACTIVE and EMPTY included.
    pub fn component_type_count(&self) -> usize {
        self.registry.len()
    }

    // ── Entities ─────────────────────────────────────────────────────

    /// Create an active entity in the lowest free slot.
    pub fn create_entity(&mut self) -> EcsResult<EntityId> {
        self.create_entity_with(true)
    }

    /// Create an entity, choosing whether it starts ACTIVE.
    pub fn create_entity_with(&mut self, set_active: bool) -> EcsResult<EntityId> {
        let entity = self.allocator.allocate().inspect_err(|e| {
            log::error!("create_entity failed: {e}");
        })?;
        self.active_mut().assign(entity.slot(), set_active);
        log::trace!("created {entity}");
        Ok(entity)
    }

    /// Retire `entity`. Its slot becomes the next candidate for reuse and
    /// every copy of the handle turns stale.
    pub fn destroy_entity(&mut self, entity: EntityId) -> EcsResult<()> {
        self.live(entity)?;
        if self.config.recycle_policy == RecyclePolicy::Clear {
            self.registry.clear_slot(entity.slot());
        }
        self.allocator.deallocate(entity)?;
        log::trace!("destroyed {entity}");
        Ok(())
    }

    /// `true` if `entity` is the current occupant of its slot.
    pub fn is_valid(&self, entity: EntityId) -> bool {
        self.allocator.is_alive(entity)
    }

    /// Number of occupied slots.
    pub fn entity_count(&self) -> usize {
        self.allocator.alive_count()
    }

    /// Number of entity slots.
    pub fn capacity(&self) -> usize {
        self.allocator.capacity()
    }

    /// Current generation of slot `index`, `None` when out of range.
    pub fn generation(&self, index: u32) -> Option<u32> {
        self.allocator.generation(index)
    }

    // ── Components and Flags ─────────────────────────────────────────

    /// Copy `data` into `entity`'s slot of `table` and mark it present.
    pub fn add_component_bytes(
        &mut self,
        entity: EntityId,
        table: TableId,
        data: &[u8],
    ) -> EcsResult<()> {
        self.live(entity)?;
        let reg = self.writable(table)?;
        let Some(storage) = reg.data.as_mut() else {
            return Err(EcsError::NotAComponent { table });
        };
        if data.len() != storage.stride() {
            return Err(EcsError::ComponentSizeMismatch {
                table,
                expected: reg.size,
                actual: data.len(),
            });
        }
        storage.write(entity.slot(), data);
        reg.presence.set(entity.slot());
        Ok(())
    }

    /// Typed [`add_component_bytes`](Self::add_component_bytes).
    pub fn add_component<T: Pod>(
        &mut self,
        entity: EntityId,
        component: Component<T>,
        value: T,
    ) -> EcsResult<()> {
        self.add_component_bytes(entity, component.id(), bytemuck::bytes_of(&value))
    }

    /// Set `entity`'s presence bit in `table`. Works on sized tables too, in
    /// which case the slot's current bytes become visible again.
    pub fn add_flag(&mut self, entity: EntityId, table: TableId) -> EcsResult<()> {
        self.live(entity)?;
        self.writable(table)?.presence.set(entity.slot());
        Ok(())
    }

    /// Clear `entity`'s presence bit in `table`.
    pub fn remove_flag(&mut self, entity: EntityId, table: TableId) -> EcsResult<()> {
        self.live(entity)?;
        self.writable(table)?.presence.clear(entity.slot());
        Ok(())
    }

    /// Clear `entity`'s presence bit in `table`. The bytes stay as they are.
    pub fn remove_component(&mut self, entity: EntityId, table: TableId) -> EcsResult<()> {
        self.remove_flag(entity, table)
    }

    /// `true` if `entity` has `table`'s presence bit.
    pub fn has_component(&self, entity: EntityId, table: TableId) -> EcsResult<bool> {
        self.live(entity)?;
        self.registry.check(table)?;
        Ok(self.presence_bit(table, entity.slot()))
    }

    /// Raw bytes of `entity`'s slot in `table`. Presence is not checked: a
    /// slot that never received the component reads as whatever it last
    /// held, or zero.
    pub fn get_component_bytes(&self, entity: EntityId, table: TableId) -> EcsResult<&[u8]> {
        self.live(entity)?;
        match self.registry.get(table)?.data.as_ref() {
            Some(storage) => Ok(storage.slot(entity.slot())),
            None => Err(EcsError::NotAComponent { table }),
        }
    }

    /// Typed view of `entity`'s slot. Presence is not checked.
    pub fn get_component<T: Pod>(
        &self,
        entity: EntityId,
        component: Component<T>,
    ) -> EcsResult<&T> {
        self.live(entity)?;
        let table = component.id();
        match self.registry.get(table)?.data.as_ref() {
            Some(storage) => {
                storage.check_type::<T>(table)?;
                Ok(storage.get::<T>(entity.slot()))
            }
            None => Err(EcsError::NotAComponent { table }),
        }
    }

    /// Typed mutable view of `entity`'s slot. Presence is not checked.
    pub fn get_component_mut<T: Pod>(
        &mut self,
        entity: EntityId,
        component: Component<T>,
    ) -> EcsResult<&mut T> {
        self.live(entity)?;
        let table = component.id();
        match self.registry.get_mut(table)?.data.as_mut() {
            Some(storage) => {
                storage.check_type::<T>(table)?;
                Ok(storage.get_mut::<T>(entity.slot()))
            }
            None => Err(EcsError::NotAComponent { table }),
        }
    }

    /// Include or drop `entity` from filtered queries.
    pub fn set_active(&mut self, entity: EntityId, active: bool) -> EcsResult<()> {
        self.live(entity)?;
        self.active_mut().assign(entity.slot(), active);
        Ok(())
    }

    pub fn is_active(&self, entity: EntityId) -> EcsResult<bool> {
        self.has_component(entity, TableId::ACTIVE)
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Visit every entity that has all of `includes` and none of `excludes`,
    /// in ascending slot order.
    ///
    /// With both lists empty every occupied slot is visited, active or not.
    /// Otherwise only ACTIVE entities match.
    pub fn for_archetype(
        &self,
        includes: &[TableId],
        excludes: &[TableId],
        visit: impl FnMut(EntityId),
    ) -> EcsResult<()> {
        ArchetypeScan::new(&self.registry, &self.allocator, includes, excludes)?.for_each(visit);
        Ok(())
    }

    /// Number of entities [`for_archetype`](Self::for_archetype) would visit.
    pub fn count_archetype(&self, includes: &[TableId], excludes: &[TableId]) -> EcsResult<usize> {
        Ok(ArchetypeScan::new(&self.registry, &self.allocator, includes, excludes)?.count())
    }

    /// Matching entities collected into a `Vec`, for applying structural
    /// changes after the scan.
    pub fn collect_archetype(
        &self,
        includes: &[TableId],
        excludes: &[TableId],
    ) -> EcsResult<Vec<EntityId>> {
        let scan = ArchetypeScan::new(&self.registry, &self.allocator, includes, excludes)?;
        let mut out = Vec::with_capacity(scan.count());
        scan.for_each(|e| out.push(e));
        Ok(out)
    }

    /// Visit every active entity that has all of `params`' components, the
    /// filter's `with` tables and none of its `without` tables, handing the
    /// closure typed views into the component data.
    ///
    /// ```ignore
    /// world.query((pos.write(), vel.read()), &Filter::new(), |_, (p, v)| {
    ///     *p += *v * dt;
    /// })?;
    /// ```
    pub fn query<Q: QueryParam>(
        &mut self,
        params: Q,
        filter: &Filter,
        mut visit: impl FnMut(EntityId, Q::Item<'_>),
    ) -> EcsResult<()> {
        let mut includes = Vec::new();
        params.table_ids(&mut includes);
        for (i, table) in includes.iter().enumerate() {
            if includes[..i].contains(table) {
                return Err(EcsError::AliasedComponentAccess { table: *table });
            }
        }
        params.validate(&self.registry)?;
        for &table in filter.includes().iter().chain(filter.excludes()) {
            self.registry.check(table)?;
        }
        includes.extend_from_slice(filter.includes());

        let mut columns = params.extract(&mut self.registry);
        // Tables go back even if `visit` panics, so a caught panic leaves the
        // world usable.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            ArchetypeScan::new(&self.registry, &self.allocator, &includes, filter.excludes())
                .map(|scan| {
                    scan.for_each(|entity| visit(entity, Q::fetch(&mut columns, entity.slot())));
                })
        }));
        Q::restore(columns, &mut self.registry);
        outcome.unwrap_or_else(|payload| panic::resume_unwind(payload))
    }

    // ── Diagnostics ──────────────────────────────────────────────────

    /// Snapshot of slot usage and per-table counts.
    #[cfg(feature = "diagnostics")]
    pub fn stats(&self) -> crate::diag::StorageStats {
        crate::diag::StorageStats::collect(&self.registry, &self.allocator)
    }

    // ── Internals ────────────────────────────────────────────────────

    fn live(&self, entity: EntityId) -> EcsResult<()> {
        self.allocator.check(entity).inspect_err(|_| {
            log::warn!("rejected stale entity handle {entity}");
        })
    }

    /// Registration that the component API may write to.
    fn writable(&mut self, table: TableId) -> EcsResult<&mut Registration> {
        if table == TableId::EMPTY {
            return Err(EcsError::ReservedTable { table });
        }
        self.registry.get_mut(table)
    }

    fn active_mut(&mut self) -> &mut BitsetTable {
        self.registry.presence_mut(TableId::ACTIVE)
    }

    fn presence_bit(&self, table: TableId, slot: usize) -> bool {
        if table == TableId::EMPTY {
            self.allocator.free_slots().get(slot)
        } else {
            self.registry.presence(table).get(slot)
        }
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.allocator.alive_count())
            .field("capacity", &self.allocator.capacity())
            .field("tables", &self.registry.len())
            .field("recycle_policy", &self.config.recycle_policy)
            .finish()
    }
}
