//! Value predicates: the `(component, field, operator, expected)` tuples a query
//! can layer on top of its required/excluded component masks.

use std::collections::HashSet;
use std::sync::Arc;

use crate::component::{ComponentDescriptor, Value, ValueKey};

/// A predicate comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Nin,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Lt => "lt",
            Operator::Le => "le",
            Operator::Gt => "gt",
            Operator::Ge => "ge",
            Operator::In => "in",
            Operator::Nin => "nin",
        }
    }

    /// `lt/le/gt/ge` require a numeric field; all other operators accept any kind.
    pub fn requires_numeric_field(self) -> bool {
        matches!(self, Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge)
    }

    pub fn requires_set_operand(self) -> bool {
        matches!(self, Operator::In | Operator::Nin)
    }
}

/// The right-hand side of a predicate: either a single expected value (`eq/ne/lt/le/gt/ge`)
/// or a membership set (`in/nin`), pre-hashed for O(1) testing.
#[derive(Debug, Clone)]
pub enum Operand {
    Single(Value),
    Set {
        /// Kept for building the canonical query id in a stable order.
        values: Vec<Value>,
        keys: HashSet<ValueKey>,
    },
}

/// A single `(component, field, operator, expected)` condition a query filters on.
///
/// Possessing the named component is implied: registering a query with a predicate
/// auto-registers the component (if needed) and folds its mask into the query's
/// required mask, so a predicate can never match an entity that lacks the field.
#[derive(Debug, Clone)]
pub struct Predicate {
    pub component: Arc<ComponentDescriptor>,
    pub field: String,
    pub op: Operator,
    pub operand: Operand,
}

impl Predicate {
    fn single(
        component: Arc<ComponentDescriptor>,
        field: impl Into<String>,
        op: Operator,
        value: Value,
    ) -> Self {
        Self {
            component,
            field: field.into(),
            op,
            operand: Operand::Single(value),
        }
    }

    fn set(
        component: Arc<ComponentDescriptor>,
        field: impl Into<String>,
        op: Operator,
        values: Vec<Value>,
    ) -> Self {
        let keys = values.iter().filter_map(Value::to_key).collect();
        Self {
            component,
            field: field.into(),
            op,
            operand: Operand::Set { values, keys },
        }
    }
}

pub fn eq(component: Arc<ComponentDescriptor>, field: impl Into<String>, value: Value) -> Predicate {
    Predicate::single(component, field, Operator::Eq, value)
}

pub fn ne(component: Arc<ComponentDescriptor>, field: impl Into<String>, value: Value) -> Predicate {
    Predicate::single(component, field, Operator::Ne, value)
}

pub fn lt(component: Arc<ComponentDescriptor>, field: impl Into<String>, value: Value) -> Predicate {
    Predicate::single(component, field, Operator::Lt, value)
}

pub fn le(component: Arc<ComponentDescriptor>, field: impl Into<String>, value: Value) -> Predicate {
    Predicate::single(component, field, Operator::Le, value)
}

pub fn gt(component: Arc<ComponentDescriptor>, field: impl Into<String>, value: Value) -> Predicate {
    Predicate::single(component, field, Operator::Gt, value)
}

pub fn ge(component: Arc<ComponentDescriptor>, field: impl Into<String>, value: Value) -> Predicate {
    Predicate::single(component, field, Operator::Ge, value)
}

/// `in` is a Rust keyword, so the predicate builder is spelled `in_`.
pub fn in_(
    component: Arc<ComponentDescriptor>,
    field: impl Into<String>,
    values: Vec<Value>,
) -> Predicate {
    Predicate::set(component, field, Operator::In, values)
}

pub fn nin(
    component: Arc<ComponentDescriptor>,
    field: impl Into<String>,
    values: Vec<Value>,
) -> Predicate {
    Predicate::set(component, field, Operator::Nin, values)
}
