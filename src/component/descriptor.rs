//! Component schemas: the named, ordered field list a [`ComponentDescriptor`] owns,
//! and the process-wide uniqueness check on component ids that `createComponent`
//! enforces before a descriptor is ever handed to a world.

use std::sync::OnceLock;

use dashmap::DashSet;

use crate::component::kind::FieldKind;
use crate::component::value::Value;
use crate::error::{EcsError, EcsResult};

/// A single field in a component's schema.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub default: Value,
    /// `Some((min, max))` for numeric fields that declare bounds; checked on every
    /// assignment when the world's `checksOn` is enabled.
    pub bounds: Option<(f64, f64)>,
    /// The declared legal values for an `Enum` field.
    pub enum_values: Option<Vec<i64>>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind, default: Value) -> Self {
        Self {
            name: name.into(),
            kind,
            default,
            bounds: None,
            enum_values: None,
        }
    }

    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.bounds = Some((min, max));
        self
    }

    pub fn with_enum_values(mut self, values: Vec<i64>) -> Self {
        self.enum_values = Some(values);
        self
    }
}

/// A named schema of fields, not yet registered with any world.
///
/// Identity is the `id` string, which is unique process-wide once created —
/// enforced by [`create_component`] against a lazily-initialized, lock-free set
/// shared by every world in the process. The per-world `typeId` and bitmask are
/// *not* stored here: they are assigned by a world's
/// [`crate::component::manager::ComponentManager`] at registration time, since the
/// same descriptor id may be registered (and so assigned a different dense
/// typeId) in more than one world.
#[derive(Debug)]
pub struct ComponentDescriptor {
    id: String,
    fields: Vec<FieldSpec>,
}

impl ComponentDescriptor {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

fn used_component_ids() -> &'static DashSet<String> {
    static IDS: OnceLock<DashSet<String>> = OnceLock::new();
    IDS.get_or_init(DashSet::new)
}

/// Validate a schema and, if valid, register `id` in the process-wide uniqueness
/// set and return an unregistered [`ComponentDescriptor`].
///
/// Validates that every enum field declares a non-empty set of legal values, every
/// vector field's default has the kind's exact arity, and every numeric field's
/// default falls within its declared bounds (if any). Fails with
/// [`EcsError::DuplicateComponentId`] if `id` has already been used by any
/// `create_component` call in this process, or [`EcsError::InvalidSchema`] if the
/// schema itself is malformed.
pub fn create_component(
    id: impl Into<String>,
    fields: Vec<FieldSpec>,
) -> EcsResult<ComponentDescriptor> {
    let id = id.into();

    for field in &fields {
        validate_field(&id, field)?;
    }

    if !used_component_ids().insert(id.clone()) {
        return Err(EcsError::DuplicateComponentId(id));
    }

    Ok(ComponentDescriptor { id, fields })
}

fn validate_field(component_id: &str, field: &FieldSpec) -> EcsResult<()> {
    let schema_error = |reason: String| {
        Err(EcsError::InvalidSchema {
            component: component_id.to_string(),
            reason,
        })
    };

    match field.kind {
        FieldKind::Enum => {
            let Some(values) = &field.enum_values else {
                return schema_error(format!(
                    "enum field `{}` does not declare its legal values",
                    field.name
                ));
            };
            if values.is_empty() {
                return schema_error(format!(
                    "enum field `{}` declares an empty set of legal values",
                    field.name
                ));
            }
            let Value::Enum(default) = &field.default else {
                return schema_error(format!(
                    "enum field `{}` has a non-enum default value",
                    field.name
                ));
            };
            if !values.contains(default) {
                return schema_error(format!(
                    "enum field `{}` default value {default} is not among its declared values",
                    field.name
                ));
            }
        }
        FieldKind::Vec2 | FieldKind::Vec3 | FieldKind::Vec4 => {
            let Value::Vector(lanes) = &field.default else {
                return schema_error(format!(
                    "vector field `{}` has a non-vector default value",
                    field.name
                ));
            };
            if lanes.len() != field.kind.arity() {
                return schema_error(format!(
                    "vector field `{}` default has {} lanes, expected {}",
                    field.name,
                    lanes.len(),
                    field.kind.arity()
                ));
            }
        }
        _ => {}
    }

    if let Some((min, max)) = field.bounds {
        if !field.kind.is_numeric() {
            return schema_error(format!(
                "field `{}` declares numeric bounds but is not a numeric kind",
                field.name
            ));
        }
        if min > max {
            return schema_error(format!(
                "field `{}` declares bounds [{min}, {max}] with min > max",
                field.name
            ));
        }
        if let Some(default) = field.default.as_numeric() {
            if default < min || default > max {
                return schema_error(format!(
                    "field `{}` default value {default} is outside of declared bounds [{min}, {max}]",
                    field.name
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_schema_registers_successfully() {
        let desc = create_component(
            "descriptor_tests::Position",
            vec![
                FieldSpec::new("x", FieldKind::Float32, Value::Float(0.0)),
                FieldSpec::new("y", FieldKind::Float32, Value::Float(0.0)),
            ],
        )
        .unwrap();
        assert_eq!(desc.id(), "descriptor_tests::Position");
        assert_eq!(desc.field_index("y"), Some(1));
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let first = create_component("descriptor_tests::Dup", vec![]);
        assert!(first.is_ok());

        let second = create_component("descriptor_tests::Dup", vec![]);
        assert!(matches!(second, Err(EcsError::DuplicateComponentId(id)) if id == "descriptor_tests::Dup"));
    }

    #[test]
    fn enum_field_without_declared_values_is_rejected() {
        let result = create_component(
            "descriptor_tests::MissingEnum",
            vec![FieldSpec::new("state", FieldKind::Enum, Value::Enum(0))],
        );
        assert!(matches!(result, Err(EcsError::InvalidSchema { .. })));
    }

    #[test]
    fn vector_default_with_wrong_arity_is_rejected() {
        let result = create_component(
            "descriptor_tests::BadVec",
            vec![FieldSpec::new(
                "dir",
                FieldKind::Vec3,
                Value::Vector(vec![0.0, 0.0]),
            )],
        );
        assert!(matches!(result, Err(EcsError::InvalidSchema { .. })));
    }

    #[test]
    fn default_outside_declared_bounds_is_rejected() {
        let result = create_component(
            "descriptor_tests::BadBounds",
            vec![FieldSpec::new("value", FieldKind::Int16, Value::Int(500))
                .with_bounds(0.0, 100.0)],
        );
        assert!(matches!(result, Err(EcsError::InvalidSchema { .. })));
    }
}
