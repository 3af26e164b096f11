//! Per-world component registration: assigns dense `typeId`s, allocates column
//! storage, and keeps the reverse `typeId -> descriptor` map the rest of the ECS
//! (queries, entity accessors) looks components up through.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::bitset::BitSet;
use crate::component::column::Column;
use crate::component::descriptor::ComponentDescriptor;
use crate::component::kind::{FieldKind, TypeRegistry};

/// A component as registered in one particular world: its schema, its dense
/// `typeId` and single-bit mask in *this* world, and the SoA columns backing its
/// fields, one column per field in schema order.
pub struct RegisteredComponent {
    pub descriptor: Arc<ComponentDescriptor>,
    pub type_id: u32,
    pub mask: BitSet,
    pub columns: Vec<Column>,
}

impl RegisteredComponent {
    pub fn column(&self, field_index: usize) -> &Column {
        &self.columns[field_index]
    }

    pub fn column_mut(&mut self, field_index: usize) -> &mut Column {
        &mut self.columns[field_index]
    }
}

/// Assigns sequential `typeId`s to component descriptors registered in one world
/// and owns their column storage.
pub struct ComponentManager {
    capacity: usize,
    by_id: HashMap<String, u32>,
    by_type_id: Vec<RegisteredComponent>,
    type_registry: TypeRegistry,
}

impl ComponentManager {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            by_id: HashMap::new(),
            by_type_id: Vec::new(),
            type_registry: TypeRegistry::new(),
        }
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn get_type_id(&self, id: &str) -> Option<u32> {
        self.by_id.get(id).copied()
    }

    pub fn get_by_type_id(&self, type_id: u32) -> Option<&RegisteredComponent> {
        self.by_type_id.get(type_id as usize)
    }

    pub fn get_by_type_id_mut(&mut self, type_id: u32) -> Option<&mut RegisteredComponent> {
        self.by_type_id.get_mut(type_id as usize)
    }

    pub fn get_by_id(&self, id: &str) -> Option<&RegisteredComponent> {
        self.get_type_id(id)
            .and_then(|tid| self.get_by_type_id(tid))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredComponent> {
        self.by_type_id.iter()
    }

    /// Register `descriptor` in this world. A no-op returning the existing
    /// `typeId` if a component with this id is already registered.
    pub fn register(&mut self, descriptor: Arc<ComponentDescriptor>) -> u32 {
        if let Some(&type_id) = self.by_id.get(descriptor.id()) {
            return type_id;
        }

        let type_id = self.by_type_id.len() as u32;
        let mask = BitSet::single(type_id as usize);
        let columns = descriptor
            .fields()
            .iter()
            .map(|field| self.allocate_column(field.kind, &field.enum_values))
            .collect();

        debug!("registered component `{}` as typeId {type_id}", descriptor.id());
        self.by_id.insert(descriptor.id().to_string(), type_id);
        self.by_type_id.push(RegisteredComponent {
            descriptor,
            type_id,
            mask,
            columns,
        });
        type_id
    }

    fn allocate_column(&self, kind: FieldKind, enum_values: &Option<Vec<i64>>) -> Column {
        match kind {
            FieldKind::Enum => self
                .type_registry
                .allocate_enum(self.capacity, enum_values.as_deref().unwrap_or(&[])),
            other => self.type_registry.allocate(other, self.capacity),
        }
    }

    /// Grow every registered component's columns so slot `capacity - 1` is
    /// addressable. `entityCapacity` is a preallocation hint rather than a hard
    /// ceiling: the manager grows on demand the same way a `Vec` would, so
    /// creating more entities than the configured capacity never panics.
    pub fn ensure_capacity(&mut self, capacity: usize) {
        if capacity <= self.capacity {
            return;
        }
        for registered in &mut self.by_type_id {
            for (field, column) in registered
                .descriptor
                .fields()
                .iter()
                .zip(registered.columns.iter_mut())
            {
                column.grow_to(capacity, field.kind.arity());
            }
        }
        self.capacity = capacity;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
