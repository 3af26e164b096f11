//! A compact, data-oriented Entity-Component-System runtime.
//!
//! Entities are opaque `(slot, generation)` handles. Components are structure-of-
//! arrays column storage described by a runtime schema rather than a Rust type.
//! Queries are bitmask-and-predicate views over the entity set, maintained
//! incrementally as components are added, removed and mutated. Systems are
//! priority-ordered update procedures driven once per [`world::World::update`] call.

pub mod bitset;
pub mod component;
pub mod entity;
pub mod error;
pub mod query;
pub mod system;
pub mod world;

pub use bitset::BitSet;
pub use component::{create_component, Column, ComponentDescriptor, ComponentManager, FieldKind, FieldSpec, Value};
pub use entity::{Entity, EntityManager};
pub use error::{EcsError, EcsResult};
pub use query::{predicate, Query, QueryManager};
pub use system::{QueryConfig, Signal, System, SystemContext, SystemOptions};
pub use world::{EntityMut, EntityRef, World, WorldConfig};
