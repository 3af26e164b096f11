//! Component schemas, SoA column storage, and per-world component registration.
//!
//! - [`kind`]: field kinds and their backing storage (`TypeRegistry`)
//! - [`value`]: logical field values, independent of physical packing
//! - [`column`]: the physical SoA arrays a field's values live in
//! - [`descriptor`]: named schemas (`ComponentDescriptor`) and process-wide id uniqueness
//! - [`manager`]: per-world `typeId` assignment and column ownership (`ComponentManager`)

pub mod column;
pub mod descriptor;
pub mod kind;
pub mod manager;
pub mod value;

pub use column::Column;
pub use descriptor::{create_component, ComponentDescriptor, FieldSpec};
pub use kind::{FieldKind, TypeRegistry};
pub use manager::{ComponentManager, RegisteredComponent};
pub use value::{ObjectHandle, Value, ValueKey};
