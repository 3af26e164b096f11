//! Queries: a live, incrementally-maintained view over every entity whose component
//! bitmask and field values satisfy a set of required/excluded masks and predicates.
//!
//! - [`predicate`]: the `(component, field, operator, expected)` conditions a query
//!   can layer on top of its masks
//! - [`result`]: the result-set container a query's matching entities live in
//! - [`manager`]: registration, indexing and incremental transition bookkeeping
//!   (`QueryManager`)

pub mod manager;
pub mod predicate;
pub mod result;

pub use manager::QueryManager;
pub use predicate::{eq, ge, gt, in_, le, lt, ne, nin, Operand, Operator, Predicate};
pub use result::ResultSet;

use std::sync::Arc;

use crate::bitset::BitSet;
use crate::component::{Column, ComponentDescriptor, ComponentManager, FieldKind, Value};
use crate::entity::{Entity, EntityManager};

/// Which side of a qualify/disqualify transition a subscriber is listening for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Qualify,
    Disqualify,
}

/// A handle returned by [`Query::subscribe`], used to remove that one subscriber
/// with [`Query::unsubscribe`].
#[derive(Debug, Clone)]
pub struct Subscription {
    pub query_id: String,
    pub event: Event,
    sub_id: u64,
}

/// A predicate resolved against one world's component registration: the `typeId`
/// and field index are looked up once, at query registration time, rather than by
/// string on every match test.
#[derive(Debug, Clone)]
pub struct ResolvedPredicate {
    pub component: Arc<ComponentDescriptor>,
    pub type_id: u32,
    pub field_index: usize,
    pub field_name: String,
    pub op: Operator,
    pub operand: Operand,
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    callbacks: Vec<(u64, Box<dyn FnMut(Entity)>)>,
}

impl Subscribers {
    fn subscribe(&mut self, callback: Box<dyn FnMut(Entity)>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.callbacks.push((id, callback));
        id
    }

    fn unsubscribe(&mut self, id: u64) {
        self.callbacks.retain(|(existing, _)| *existing != id);
    }

    fn fire(&mut self, entity: Entity) {
        for (_, callback) in &mut self.callbacks {
            callback(entity);
        }
    }

    fn replay(&mut self, id: u64, entities: &[Entity]) {
        if let Some((_, callback)) = self.callbacks.iter_mut().find(|(existing, _)| *existing == id) {
            for &entity in entities {
                callback(entity);
            }
        }
    }
}

/// A live, named query: required/excluded component masks plus an optional list of
/// field predicates, maintained incrementally as entities are created, mutated and
/// destroyed rather than recomputed on every read.
pub struct Query {
    id: String,
    required: BitSet,
    excluded: BitSet,
    predicates: Vec<ResolvedPredicate>,
    result: ResultSet,
    qualify: Subscribers,
    disqualify: Subscribers,
}

impl Query {
    pub(crate) fn new(
        id: String,
        required: BitSet,
        excluded: BitSet,
        predicates: Vec<ResolvedPredicate>,
    ) -> Self {
        Self {
            id,
            required,
            excluded,
            predicates,
            result: ResultSet::new(),
            qualify: Subscribers::default(),
            disqualify: Subscribers::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn required_mask(&self) -> &BitSet {
        &self.required
    }

    pub fn excluded_mask(&self) -> &BitSet {
        &self.excluded
    }

    pub fn predicates(&self) -> &[ResolvedPredicate] {
        &self.predicates
    }

    /// The entities currently in this query's result set, in no particular order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.result.iter()
    }

    pub fn contains(&self, entity: &Entity) -> bool {
        self.result.contains(entity)
    }

    pub fn len(&self) -> usize {
        self.result.len()
    }

    pub fn is_empty(&self) -> bool {
        self.result.is_empty()
    }

    /// Register a callback for `event`. If `replay_existing` is set and `event` is
    /// [`Event::Qualify`], the callback is invoked once immediately for every entity
    /// already in the result set, as if each had just qualified.
    ///
    /// Returns a [`Subscription`] token; pass it to [`Query::unsubscribe`] to stop
    /// receiving callbacks.
    pub fn subscribe(
        &mut self,
        event: Event,
        callback: impl FnMut(Entity) + 'static,
        replay_existing: bool,
    ) -> Subscription {
        let sub_id = match event {
            Event::Qualify => self.qualify.subscribe(Box::new(callback)),
            Event::Disqualify => self.disqualify.subscribe(Box::new(callback)),
        };

        if replay_existing && event == Event::Qualify {
            let existing: Vec<Entity> = self.result.iter().collect();
            self.qualify.replay(sub_id, &existing);
        }

        Subscription {
            query_id: self.id.clone(),
            event,
            sub_id,
        }
    }

    pub fn unsubscribe(&mut self, subscription: &Subscription) {
        match subscription.event {
            Event::Qualify => self.qualify.unsubscribe(subscription.sub_id),
            Event::Disqualify => self.disqualify.unsubscribe(subscription.sub_id),
        }
    }

    /// Whether a live entity currently satisfies this query's masks and predicates.
    /// Does not consult or mutate the result set.
    pub fn matches(
        &self,
        entity: Entity,
        entity_manager: &EntityManager,
        component_manager: &ComponentManager,
    ) -> bool {
        let Some(bitmask) = entity_manager.bitmask(entity) else {
            return false;
        };
        if !self.excluded.is_empty() && bitmask.intersects(&self.excluded) {
            return false;
        }
        if !bitmask.contains(&self.required) {
            return false;
        }
        self.predicates
            .iter()
            .all(|predicate| predicate.eval(entity, entity_manager, component_manager))
    }

    /// Reconcile this query's result set against whether `entity` currently
    /// matches, firing qualify/disqualify callbacks on any transition. Returns the
    /// transition that occurred, if any.
    pub(crate) fn reconcile(
        &mut self,
        entity: Entity,
        entity_manager: &EntityManager,
        component_manager: &ComponentManager,
    ) -> Option<Event> {
        let now_matches = self.matches(entity, entity_manager, component_manager);
        let was_in_result = self.result.contains(&entity);

        if now_matches && !was_in_result {
            self.result.insert(entity);
            self.qualify.fire(entity);
            Some(Event::Qualify)
        } else if !now_matches && was_in_result {
            self.result.remove(entity);
            self.disqualify.fire(entity);
            Some(Event::Disqualify)
        } else {
            None
        }
    }

    /// Unconditionally remove `entity` from the result set, firing disqualify if it
    /// was present. Used when an entity is destroyed outright, where `matches` can
    /// no longer be evaluated because its bitmask is already gone.
    pub(crate) fn evict(&mut self, entity: Entity) {
        if self.result.remove(entity) {
            self.disqualify.fire(entity);
        }
    }
}

impl ResolvedPredicate {
    fn eval(
        &self,
        entity: Entity,
        entity_manager: &EntityManager,
        component_manager: &ComponentManager,
    ) -> bool {
        let Some(registered) = component_manager.get_by_type_id(self.type_id) else {
            return false;
        };
        let field = &registered.descriptor.fields()[self.field_index];
        let slot = entity.slot() as usize;
        let actual = read_field_value(
            registered.column(self.field_index),
            slot,
            field.kind,
            entity_manager,
        );
        eval_operator(self.op, &actual, &self.operand)
    }
}

pub(crate) fn read_field_value(
    column: &Column,
    slot: usize,
    kind: FieldKind,
    entity_manager: &EntityManager,
) -> Value {
    match kind {
        FieldKind::Vec2 | FieldKind::Vec3 | FieldKind::Vec4 => {
            Value::Vector(column.read_vector(slot, kind.arity()))
        }
        FieldKind::EntityRef => {
            let raw = column.read_entity_ref_raw(slot);
            if raw < 0 {
                Value::EntityRef(None)
            } else {
                Value::EntityRef(entity_manager.get_entity_by_index(raw as u32))
            }
        }
        _ => column.read_scalar(slot),
    }
}

fn eval_operator(op: Operator, actual: &Value, operand: &Operand) -> bool {
    match op {
        Operator::Eq => matches!(operand, Operand::Single(expected) if actual == expected),
        Operator::Ne => matches!(operand, Operand::Single(expected) if actual != expected),
        Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => {
            let Operand::Single(expected) = operand else {
                return false;
            };
            let (Some(a), Some(b)) = (actual.as_numeric(), expected.as_numeric()) else {
                return false;
            };
            match op {
                Operator::Lt => a < b,
                Operator::Le => a <= b,
                Operator::Gt => a > b,
                Operator::Ge => a >= b,
                _ => unreachable!(),
            }
        }
        Operator::In => match operand {
            Operand::Set { keys, .. } => actual.to_key().is_some_and(|k| keys.contains(&k)),
            _ => false,
        },
        Operator::Nin => match operand {
            Operand::Set { keys, .. } => actual.to_key().is_none_or(|k| !keys.contains(&k)),
            _ => false,
        },
    }
}
