//! # Component Registry — Table Ids and Storage
//!
//! The registry hands out dense [`TableId`]s and owns the storage behind
//! them: a presence [`BitsetTable`] for every registration and a
//! [`ComponentTable`] for every sized one.
//!
//! ```text
//! id  name        size  presence          data
//! 0   ACTIVE      0     BitsetTable       -
//! 1   EMPTY       0     (owned by the entity allocator)
//! 2   Position    12    BitsetTable       ComponentTable(12 x capacity)
//! 3   Frozen      0     BitsetTable       -
//! ```
//!
//! Registrations are append-only: ids are never reused and tables are never
//! resized, so a `TableId` stays meaningful for the life of the world.

use std::any::TypeId;
use std::collections::HashMap;

use super::bitset::BitsetTable;
use super::component::{ComponentTable, TableId};
use crate::error::{EcsError, EcsResult};

/// One registered component or flag.
pub struct Registration {
    pub name: &'static str,
    pub size: u32,
    pub presence: BitsetTable,
    /// `None` for flags. Temporarily taken out while a typed query runs.
    pub data: Option<ComponentTable>,
}

/// All tables of one world. Query parameters move data tables in and out of
/// it; nothing outside the crate can construct one.
pub struct ComponentRegistry {
    tables: Vec<Registration>,
    by_type: HashMap<TypeId, TableId>,
    capacity: usize,
    limit: usize,
}

impl ComponentRegistry {
    /// Registry with the built-in ACTIVE and EMPTY entries.
    pub fn new(capacity: usize, limit: usize) -> Self {
        let mut registry = Self {
            tables: Vec::with_capacity(limit.min(64)),
            by_type: HashMap::new(),
            capacity,
            limit,
        };
        registry.tables.push(Registration {
            name: "ACTIVE",
            size: 0,
            presence: BitsetTable::new(capacity),
            data: None,
        });
        // The allocator owns the real EMPTY bitset; this entry only reserves
        // the id.
        registry.tables.push(Registration {
            name: "EMPTY",
            size: 0,
            presence: BitsetTable::new(0),
            data: None,
        });
        debug_assert_eq!(registry.tables.len(), TableId::FIRST_USER as usize);
        registry
    }

    /// Allocate a new table. Sized registrations also get a zeroed
    /// [`ComponentTable`].
    pub fn register(&mut self, name: &'static str, component_size: u32) -> EcsResult<TableId> {
        if self.tables.len() >= self.limit {
            return Err(EcsError::ComponentTypeLimit { limit: self.limit });
        }
        let id = TableId(self.tables.len() as u32);
        let data = (component_size > 0)
            .then(|| ComponentTable::new(component_size as usize, self.capacity));
        self.tables.push(Registration {
            name,
            size: component_size,
            presence: BitsetTable::new(self.capacity),
            data,
        });
        log::debug!("registered table {id} `{name}` ({component_size} bytes)");
        Ok(id)
    }

    /// Register a Rust type, binding its `TypeId` to the new table.
    pub fn register_type<T: 'static>(&mut self, component_size: u32) -> EcsResult<TableId> {
        let name = std::any::type_name::<T>();
        if self.by_type.contains_key(&TypeId::of::<T>()) {
            return Err(EcsError::DuplicateComponentType { name });
        }
        let id = self.register(name, component_size)?;
        self.by_type.insert(TypeId::of::<T>(), id);
        Ok(id)
    }

    pub fn lookup<T: 'static>(&self) -> Option<TableId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Number of tables, built-ins included.
    #[inline]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Fails with `UnknownComponentType` for ids never handed out.
    #[inline]
    pub fn check(&self, table: TableId) -> EcsResult<()> {
        if table.slot() < self.tables.len() {
            Ok(())
        } else {
            Err(EcsError::UnknownComponentType {
                table,
                registered: self.tables.len(),
            })
        }
    }

    pub fn get(&self, table: TableId) -> EcsResult<&Registration> {
        self.check(table)?;
        Ok(&self.tables[table.slot()])
    }

    pub fn get_mut(&mut self, table: TableId) -> EcsResult<&mut Registration> {
        self.check(table)?;
        Ok(&mut self.tables[table.slot()])
    }

    /// Presence bitset of `table`. EMPTY is answered by the allocator, never
    /// from here.
    #[inline]
    pub fn presence(&self, table: TableId) -> &BitsetTable {
        &self.tables[table.slot()].presence
    }

    #[inline]
    pub fn presence_mut(&mut self, table: TableId) -> &mut BitsetTable {
        &mut self.tables[table.slot()].presence
    }

    pub fn iter(&self) -> impl Iterator<Item = (TableId, &Registration)> {
        self.tables
            .iter()
            .enumerate()
            .map(|(i, reg)| (TableId(i as u32), reg))
    }

    /// Drop `slot` from every table: clear presence bits and zero bytes.
    pub fn clear_slot(&mut self, slot: usize) {
        for (i, reg) in self.tables.iter_mut().enumerate() {
            if i == TableId::EMPTY.slot() {
                continue;
            }
            reg.presence.clear(slot);
            if let Some(data) = reg.data.as_mut() {
                data.zero(slot);
            }
        }
    }

    /// Move the data table out for the duration of a typed query.
    pub fn take_data(&mut self, table: TableId) -> Option<ComponentTable> {
        self.tables[table.slot()].data.take()
    }

    pub fn restore_data(&mut self, table: TableId, data: ComponentTable) {
        self.tables[table.slot()].data = Some(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_occupy_first_ids() {
        let registry = ComponentRegistry::new(64, 16);
        assert_eq!(registry.len(), TableId::FIRST_USER as usize);
        assert_eq!(registry.get(TableId::ACTIVE).unwrap().name, "ACTIVE");
        assert_eq!(registry.get(TableId::EMPTY).unwrap().name, "EMPTY");
    }

    #[test]
    fn ids_are_dense_and_unique() {
        let mut registry = ComponentRegistry::new(64, 16);
        let a = registry.register("a", 4).unwrap();
        let b = registry.register("b", 0).unwrap();
        let c = registry.register("c", 4).unwrap();
        assert_eq!(a.raw(), TableId::FIRST_USER);
        assert_eq!(b.raw(), TableId::FIRST_USER + 1);
        assert_eq!(c.raw(), TableId::FIRST_USER + 2);
    }

    #[test]
    fn flags_have_no_data_table() {
        let mut registry = ComponentRegistry::new(64, 16);
        let flag = registry.register("flag", 0).unwrap();
        let sized = registry.register("sized", 8).unwrap();
        assert!(registry.get(flag).unwrap().data.is_none());
        let data = registry.get(sized).unwrap().data.as_ref().unwrap();
        assert_eq!(data.stride(), 8);
        assert_eq!(data.capacity(), 64);
        assert_eq!(registry.presence(sized).len(), 64);
    }

    #[test]
    fn limit_counts_builtins() {
        let mut registry = ComponentRegistry::new(8, 3);
        registry.register("only", 0).unwrap();
        assert_eq!(
            registry.register("one too many", 0),
            Err(EcsError::ComponentTypeLimit { limit: 3 })
        );
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn duplicate_type_rejected() {
        struct Health;
        let mut registry = ComponentRegistry::new(8, 16);
        let id = registry.register_type::<Health>(4).unwrap();
        assert_eq!(registry.lookup::<Health>(), Some(id));
        assert!(matches!(
            registry.register_type::<Health>(4),
            Err(EcsError::DuplicateComponentType { .. })
        ));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn unknown_id_rejected() {
        let registry = ComponentRegistry::new(8, 16);
        assert_eq!(
            registry.check(TableId(42)).unwrap_err(),
            EcsError::UnknownComponentType {
                table: TableId(42),
                registered: 2,
            }
        );
    }

    #[test]
    fn clear_slot_zeroes_everything() {
        let mut registry = ComponentRegistry::new(8, 16);
        let id = registry.register("n", 4).unwrap();
        {
            let reg = registry.get_mut(id).unwrap();
            reg.presence.set(3);
            reg.data.as_mut().unwrap().write(3, &[1, 2, 3, 4]);
        }
        registry.get_mut(TableId::ACTIVE).unwrap().presence.set(3);

        registry.clear_slot(3);
        let reg = registry.get(id).unwrap();
        assert!(!reg.presence.get(3));
        assert_eq!(reg.data.as_ref().unwrap().slot(3), &[0, 0, 0, 0]);
        assert!(!registry.presence(TableId::ACTIVE).get(3));
    }
}
