//! # Component — Fixed-Stride Byte Tables
//!
//! Each sized component type owns one [`ComponentTable`]: `capacity` slots of
//! `stride` bytes, laid out contiguously and indexed by entity slot.
//!
//! ```text
//! stride = size_of::<Position>() = 12
//!
//! bytes: [ slot 0 (12 B) | slot 1 (12 B) | slot 2 (12 B) | ... ]
//!          offset 0        offset 12       offset 24
//! ```
//!
//! Slots are not compacted when components are removed. A slot's bytes are
//! only meaningful while the slot's presence bit is set in the component's
//! [`BitsetTable`](super::bitset::BitsetTable); otherwise they hold whatever
//! was last written (or zero).
//!
//! ## Typed Views
//!
//! Component types implement [`bytemuck::Pod`], so a slot's bytes can be
//! reinterpreted as `&T` / `&mut T` without `unsafe` here. The backing store
//! is a `Vec<u128>`, which gives every slot offset the alignment any `Pod`
//! type up to 16 bytes of alignment needs (`stride` is always a multiple of
//! `align_of::<T>()`).
//!
//! Flags (zero-sized markers) have no table at all; only their presence bit
//! exists.

use std::fmt;
use std::marker::PhantomData;

use bytemuck::Pod;

use crate::error::{EcsError, EcsResult};

/// Dense identifier of a registered component or flag table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub(crate) u32);

impl TableId {
    /// Built-in flag set on entities that take part in filtered queries.
    pub const ACTIVE: TableId = TableId(0);
    /// Built-in free-slot table (inverted polarity: set = free).
    pub const EMPTY: TableId = TableId(1);
    /// First id handed out to user registrations.
    pub(crate) const FIRST_USER: u32 = 2;

    /// Reconstruct an id from its raw value. Unknown ids are rejected by the
    /// world with `UnknownComponentType`.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TableId::ACTIVE => f.write_str("TableId(ACTIVE)"),
            TableId::EMPTY => f.write_str("TableId(EMPTY)"),
            TableId(raw) => write!(f, "TableId({raw})"),
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Typed handle to a sized component table.
///
/// Returned by [`World::register`](super::World::register). Carries `T` so
/// that reads and writes through it are checked at compile time.
pub struct Component<T> {
    id: TableId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Component<T> {
    pub(crate) fn new(id: TableId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// The underlying table id, for `for_archetype` and filters.
    #[inline]
    pub fn id(self) -> TableId {
        self.id
    }

    /// Shared access to this component in a [`query`](super::World::query).
    pub fn read(self) -> super::query::Read<T> {
        super::query::Read::new(self.id)
    }

    /// Exclusive access to this component in a [`query`](super::World::query).
    pub fn write(self) -> super::query::Write<T> {
        super::query::Write::new(self.id)
    }
}

impl<T> Clone for Component<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Component<T> {}

impl<T> PartialEq for Component<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Component<T> {}

impl<T> fmt::Debug for Component<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component<{}>({})", std::any::type_name::<T>(), self.id)
    }
}

impl<T> From<Component<T>> for TableId {
    fn from(component: Component<T>) -> Self {
        component.id
    }
}

/// Fixed-capacity, fixed-stride byte storage for one component type.
#[derive(Default)]
pub struct ComponentTable {
    storage: Vec<u128>,
    stride: usize,
    capacity: usize,
}

impl ComponentTable {
    /// Zero-initialized table of `capacity` slots, `stride` bytes each.
    pub fn new(stride: usize, capacity: usize) -> Self {
        let bytes = stride * capacity;
        let units = bytes.div_ceil(std::mem::size_of::<u128>());
        Self {
            storage: vec![0; units],
            stride,
            capacity,
        }
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        let bytes: &[u8] = bytemuck::cast_slice(&self.storage);
        &bytes[..self.stride * self.capacity]
    }

    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        let len = self.stride * self.capacity;
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut self.storage);
        &mut bytes[..len]
    }

    /// Bytes of slot `index`.
    #[inline]
    pub fn slot(&self, index: usize) -> &[u8] {
        let start = index * self.stride;
        &self.bytes()[start..start + self.stride]
    }

    /// Mutable bytes of slot `index`.
    #[inline]
    pub fn slot_mut(&mut self, index: usize) -> &mut [u8] {
        let start = index * self.stride;
        let stride = self.stride;
        &mut self.bytes_mut()[start..start + stride]
    }

    /// Copy `data` into slot `index`. The caller has checked the length.
    #[inline]
    pub fn write(&mut self, index: usize, data: &[u8]) {
        self.slot_mut(index).copy_from_slice(data);
    }

    /// Zero slot `index`.
    #[inline]
    pub fn zero(&mut self, index: usize) {
        self.slot_mut(index).fill(0);
    }

    /// Typed view of slot `index`.
    pub fn get<T: Pod>(&self, index: usize) -> &T {
        bytemuck::from_bytes(self.slot(index))
    }

    /// Typed mutable view of slot `index`.
    pub fn get_mut<T: Pod>(&mut self, index: usize) -> &mut T {
        bytemuck::from_bytes_mut(self.slot_mut(index))
    }

    /// Checks that `T` fits this table's stride and the table's alignment
    /// guarantee, so that [`get`](Self::get) cannot panic.
    pub(crate) fn check_type<T: Pod>(&self, table: TableId) -> EcsResult<()> {
        let size = std::mem::size_of::<T>();
        if size != self.stride || std::mem::align_of::<T>() > std::mem::align_of::<u128>() {
            return Err(EcsError::ComponentSizeMismatch {
                table,
                expected: self.stride as u32,
                actual: size,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for ComponentTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentTable")
            .field("stride", &self.stride)
            .field("capacity", &self.capacity)
            .finish()
    }
}
