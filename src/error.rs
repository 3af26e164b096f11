//! The crate's error taxonomy.
//!
//! Every fallible public operation returns [`EcsResult`]. A failed call leaves the
//! world exactly as it was before the call — there are no partial commits.
//!
//! Two dispositions are deliberately not errors: mutating a destroyed entity and
//! re-registering an already-registered system both log a [`log::warn!`] and return
//! `Ok(())` having done nothing, rather than constructing an [`EcsError`].

use thiserror::Error;

/// The crate-wide result type. Used by every fallible operation in [`crate::world`],
/// [`crate::component`], [`crate::entity`] and [`crate::query`].
pub type EcsResult<T> = Result<T, EcsError>;

/// The error taxonomy for the ECS core.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EcsError {
    /// Component registration failed schema validation.
    #[error("invalid schema for component `{component}`: {reason}")]
    InvalidSchema { component: String, reason: String },

    /// An enum field was assigned a value outside its declared set.
    #[error(
        "field `{field}` on component `{component}` rejected value {value}: not a declared enum value"
    )]
    InvalidEnumValue {
        component: String,
        field: String,
        value: i64,
    },

    /// A numeric field was assigned a value outside its declared `[min, max]`.
    #[error(
        "field `{field}` on component `{component}` rejected value {value}: outside of range [{min}, {max}]"
    )]
    ValueOutOfRange {
        component: String,
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A query configuration failed validation at registration time.
    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    /// A second component was created with an id already in use.
    #[error("component id `{0}` is already in use")]
    DuplicateComponentId(String),

    /// A field was referenced that does not exist on the component's schema.
    #[error("component `{component}` has no field named `{field}`")]
    UnknownField { component: String, field: String },
}
