//! # Query — Typed Access to Matching Entities
//!
//! [`World::for_archetype`](super::World::for_archetype) yields bare
//! [`EntityId`](super::EntityId)s. Most systems also want the component data,
//! so [`World::query`](super::World::query) layers typed views on top of the
//! same bitset scan:
//!
//! ```ignore
//! world.query((pos.write(), vel.read()), &Filter::new().without(frozen), |_, (p, v)| {
//!     p.x += v.x;
//! })?;
//! ```
//!
//! ## Extract / Restore
//!
//! Handing out `&mut Position` and `&Velocity` at the same time means
//! borrowing two tables of the registry at once. The data tables a query
//! needs are moved out of the registry for the duration of the scan, iterated
//! as owned values, then put back. The borrow checker sees independent
//! locals, and no `unsafe` is needed. The references passed to the closure
//! live only for that call, so they cannot be kept past the query.
//!
//! ## The `QueryParam` Trait
//!
//! [`Read<T>`] and [`Write<T>`] are the leaf parameters; tuples of up to eight
//! parameters are parameters too.

use std::marker::PhantomData;

use bytemuck::Pod;

use super::component::{ComponentTable, TableId};
use super::registry::ComponentRegistry;
use crate::error::{EcsError, EcsResult};

/// Something that can be fetched per entity from extracted tables.
pub trait QueryParam {
    /// The item yielded per entity.
    type Item<'q>;

    /// Owned table data extracted from the registry.
    type Column;

    /// Append the tables this parameter reads or writes.
    fn table_ids(&self, out: &mut Vec<TableId>);

    /// Check every table exists, is sized, and matches the requested type.
    fn validate(&self, registry: &ComponentRegistry) -> EcsResult<()>;

    /// Move the needed table(s) out of the registry.
    fn extract(&self, registry: &mut ComponentRegistry) -> Self::Column;

    /// Put the table(s) back.
    fn restore(col: Self::Column, registry: &mut ComponentRegistry);

    /// Fetch the item for the entity in slot `index`.
    fn fetch(col: &mut Self::Column, index: usize) -> Self::Item<'_>;
}

/// Shared access to component `T`.
pub struct Read<T> {
    id: TableId,
    _marker: PhantomData<fn() -> T>,
}

/// Exclusive access to component `T`.
pub struct Write<T> {
    id: TableId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Read<T> {
    pub(crate) fn new(id: TableId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }
}

impl<T> Write<T> {
    pub(crate) fn new(id: TableId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for Read<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Read<T> {}

impl<T> Clone for Write<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Write<T> {}

fn validate_table<T: Pod>(registry: &ComponentRegistry, table: TableId) -> EcsResult<()> {
    let reg = registry.get(table)?;
    match reg.data.as_ref() {
        Some(data) => data.check_type::<T>(table),
        None => Err(EcsError::NotAComponent { table }),
    }
}

fn extract_table<T>(registry: &mut ComponentRegistry, table: TableId) -> ComponentTable {
    registry.take_data(table).unwrap_or_else(|| {
        panic!(
            "Query extract: data table {table} for `{}` is missing",
            std::any::type_name::<T>()
        )
    })
}

impl<T: Pod> QueryParam for Read<T> {
    type Item<'q> = &'q T;
    type Column = (TableId, ComponentTable);

    fn table_ids(&self, out: &mut Vec<TableId>) {
        out.push(self.id);
    }

    fn validate(&self, registry: &ComponentRegistry) -> EcsResult<()> {
        validate_table::<T>(registry, self.id)
    }

    fn extract(&self, registry: &mut ComponentRegistry) -> Self::Column {
        (self.id, extract_table::<T>(registry, self.id))
    }

    fn restore(col: Self::Column, registry: &mut ComponentRegistry) {
        registry.restore_data(col.0, col.1);
    }

    fn fetch(col: &mut Self::Column, index: usize) -> Self::Item<'_> {
        col.1.get::<T>(index)
    }
}

impl<T: Pod> QueryParam for Write<T> {
    type Item<'q> = &'q mut T;
    type Column = (TableId, ComponentTable);

    fn table_ids(&self, out: &mut Vec<TableId>) {
        out.push(self.id);
    }

    fn validate(&self, registry: &ComponentRegistry) -> EcsResult<()> {
        validate_table::<T>(registry, self.id)
    }

    fn extract(&self, registry: &mut ComponentRegistry) -> Self::Column {
        (self.id, extract_table::<T>(registry, self.id))
    }

    fn restore(col: Self::Column, registry: &mut ComponentRegistry) {
        registry.restore_data(col.0, col.1);
    }

    fn fetch(col: &mut Self::Column, index: usize) -> Self::Item<'_> {
        col.1.get_mut::<T>(index)
    }
}

macro_rules! impl_query_param_tuple {
    ($($P:ident),+) => {
        impl<$($P: QueryParam),+> QueryParam for ($($P,)+) {
            type Item<'q> = ($($P::Item<'q>,)+);
            type Column = ($($P::Column,)+);

            #[allow(non_snake_case)]
            fn table_ids(&self, out: &mut Vec<TableId>) {
                let ($($P,)+) = self;
                $($P.table_ids(out);)+
            }

            #[allow(non_snake_case)]
            fn validate(&self, registry: &ComponentRegistry) -> EcsResult<()> {
                let ($($P,)+) = self;
                $($P.validate(registry)?;)+
                Ok(())
            }

            #[allow(non_snake_case)]
            fn extract(&self, registry: &mut ComponentRegistry) -> Self::Column {
                let ($($P,)+) = self;
                ($($P.extract(registry),)+)
            }

            #[allow(non_snake_case)]
            fn restore(col: Self::Column, registry: &mut ComponentRegistry) {
                let ($($P,)+) = col;
                $($P::restore($P, registry);)+
            }

            #[allow(non_snake_case)]
            fn fetch(col: &mut Self::Column, index: usize) -> Self::Item<'_> {
                let ($($P,)+) = col;
                ($($P::fetch($P, index),)+)
            }
        }
    };
}

impl_query_param_tuple!(A);
impl_query_param_tuple!(A, B);
impl_query_param_tuple!(A, B, C);
impl_query_param_tuple!(A, B, C, D);
impl_query_param_tuple!(A, B, C, D, E);
impl_query_param_tuple!(A, B, C, D, E, F);
impl_query_param_tuple!(A, B, C, D, E, F, G);
impl_query_param_tuple!(A, B, C, D, E, F, G, H);

/// Extra include/exclude tables for a [`query`](super::World::query).
///
/// Tables named by the query's parameters are always included; `with` adds
/// presence-only requirements (typically flags) and `without` excludes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    with: Vec<TableId>,
    without: Vec<TableId>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `table` to be present.
    pub fn with(mut self, table: impl Into<TableId>) -> Self {
        self.with.push(table.into());
        self
    }

    /// Require `table` to be absent.
    pub fn without(mut self, table: impl Into<TableId>) -> Self {
        self.without.push(table.into());
        self
    }

    pub fn includes(&self) -> &[TableId] {
        &self.with
    }

    pub fn excludes(&self) -> &[TableId] {
        &self.without
    }

    pub fn is_empty(&self) -> bool {
        self.with.is_empty() && self.without.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuple_lists_tables_in_order() {
        let a: Read<u32> = Read::new(TableId(4));
        let b: Write<u64> = Write::new(TableId(2));
        let c: Read<u8> = Read::new(TableId(7));
        let mut ids = Vec::new();
        (a, b, c).table_ids(&mut ids);
        assert_eq!(ids, vec![TableId(4), TableId(2), TableId(7)]);
    }

    #[test]
    fn filter_builder() {
        let filter = Filter::new().with(TableId(3)).without(TableId(5)).without(TableId(6));
        assert_eq!(filter.includes(), &[TableId(3)]);
        assert_eq!(filter.excludes(), &[TableId(5), TableId(6)]);
        assert!(!filter.is_empty());
        assert!(Filter::new().is_empty());
    }

    #[test]
    fn extract_and_restore_round_trip() {
        let mut registry = ComponentRegistry::new(4, 8);
        let id = registry.register("n", 4).unwrap();
        let param: Write<u32> = Write::new(id);
        param.validate(&registry).unwrap();

        let mut column = param.extract(&mut registry);
        assert!(registry.get(id).unwrap().data.is_none());
        *Write::<u32>::fetch(&mut column, 2) = 99;
        Write::<u32>::restore(column, &mut registry);

        let data = registry.get(id).unwrap().data.as_ref().unwrap();
        assert_eq!(*data.get::<u32>(2), 99);
    }
}
