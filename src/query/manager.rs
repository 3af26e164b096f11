//! Query registration and incremental maintenance.
//!
//! A query's canonical id is built from its required/excluded masks and its
//! predicate list, so registering the same query twice (by content, not by
//! reference) returns the already-registered query rather than creating a
//! duplicate. Maintenance is incremental: rather than re-evaluating every query
//! against every entity on every tick, each query is indexed under the component
//! `typeId`s it cares about, and a mutation only reconciles the queries indexed
//! under the `typeId` that changed.

use std::collections::HashMap;
use std::sync::Arc;

use crate::bitset::BitSet;
use crate::component::{ComponentDescriptor, ComponentManager, Value};
use crate::entity::{Entity, EntityManager};
use crate::error::{EcsError, EcsResult};
use crate::query::predicate::{Operand, Predicate};
use crate::query::{Query, ResolvedPredicate};

/// Sentinel `by_component` key for a query with an empty required mask, an empty
/// excluded mask and no predicates — one that matches every entity regardless of
/// which components it carries. Such a query has no real component bit to index
/// under, so it is indexed here instead, and reconciled on entity creation as well
/// as on every ordinary component/value change.
const MATCH_ALL: u32 = u32::MAX;

/// Registers and incrementally maintains every [`Query`] live in a world.
#[derive(Default)]
pub struct QueryManager {
    queries: HashMap<String, Query>,
    by_component: HashMap<u32, Vec<String>>,
}

impl QueryManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Query> {
        self.queries.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Query> {
        self.queries.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Query> {
        self.queries.values()
    }

    /// Register a query, auto-registering any component referenced by `required`,
    /// `excluded` or a predicate that isn't already registered in `component_manager`.
    /// Returns the query's canonical id, which is stable across repeated calls with
    /// equivalent arguments.
    pub fn register_query(
        &mut self,
        component_manager: &mut ComponentManager,
        required: Vec<Arc<ComponentDescriptor>>,
        excluded: Vec<Arc<ComponentDescriptor>>,
        predicates: Vec<Predicate>,
    ) -> EcsResult<String> {
        for descriptor in required.iter().chain(excluded.iter()) {
            component_manager.register(descriptor.clone());
        }
        for predicate in &predicates {
            component_manager.register(predicate.component.clone());
        }

        let mut required_mask = BitSet::new();
        for descriptor in &required {
            let type_id = component_manager.get_type_id(descriptor.id()).expect("just registered");
            required_mask.set(type_id as usize, true);
        }

        let mut excluded_mask = BitSet::new();
        for descriptor in &excluded {
            let type_id = component_manager.get_type_id(descriptor.id()).expect("just registered");
            excluded_mask.set(type_id as usize, true);
        }

        let mut resolved_predicates = Vec::with_capacity(predicates.len());
        for predicate in predicates {
            let type_id = component_manager
                .get_type_id(predicate.component.id())
                .expect("just registered");
            // Possessing the predicate's component is implied: fold it into the
            // required mask so a predicate can never match an entity lacking the field.
            required_mask.set(type_id as usize, true);

            let field_index = predicate.component.field_index(&predicate.field).ok_or_else(|| {
                EcsError::UnknownField {
                    component: predicate.component.id().to_string(),
                    field: predicate.field.clone(),
                }
            })?;
            let field = &predicate.component.fields()[field_index];
            if predicate.op.requires_numeric_field() && !field.kind.is_numeric() {
                return Err(EcsError::InvalidQuery {
                    reason: format!(
                        "operator `{}` requires a numeric field, but `{}` on `{}` is not numeric",
                        predicate.op.symbol(),
                        predicate.field,
                        predicate.component.id()
                    ),
                });
            }
            if predicate.op.requires_set_operand() && !matches!(predicate.operand, Operand::Set { .. }) {
                return Err(EcsError::InvalidQuery {
                    reason: format!(
                        "operator `{}` on `{}` of `{}` requires a set of expected values",
                        predicate.op.symbol(),
                        predicate.field,
                        predicate.component.id()
                    ),
                });
            }

            resolved_predicates.push(ResolvedPredicate {
                component: predicate.component,
                type_id,
                field_index,
                field_name: predicate.field,
                op: predicate.op,
                operand: predicate.operand,
            });
        }

        resolved_predicates.sort_by(|a, b| {
            (a.type_id, &a.field_name, a.op.symbol()).cmp(&(b.type_id, &b.field_name, b.op.symbol()))
        });

        let id = canonical_id(&required_mask, &excluded_mask, &resolved_predicates);
        if self.queries.contains_key(&id) {
            return Ok(id);
        }

        let mut indexed_bits = required_mask.or(&excluded_mask);
        for predicate in &resolved_predicates {
            indexed_bits.set(predicate.type_id as usize, true);
        }
        if indexed_bits.is_empty() {
            self.by_component.entry(MATCH_ALL).or_default().push(id.clone());
        } else {
            for bit in indexed_bits.to_array() {
                self.by_component.entry(bit as u32).or_default().push(id.clone());
            }
        }

        let query = Query::new(id.clone(), required_mask, excluded_mask, resolved_predicates);
        self.queries.insert(id.clone(), query);
        Ok(id)
    }

    /// Populate a freshly registered query's result set by scanning every live
    /// entity. A no-op for entities already correctly reconciled, so calling this
    /// again on an already-populated query (as happens when `register_query`
    /// returns an existing canonical id) is harmless.
    pub fn populate(&mut self, id: &str, entity_manager: &EntityManager, component_manager: &ComponentManager) {
        let Some(query) = self.queries.get_mut(id) else {
            return;
        };
        for entity in entity_manager.live_entities() {
            query.reconcile(entity, entity_manager, component_manager);
        }
    }

    /// Reconcile every query indexed under `type_id` against `entity`, plus every
    /// match-all query (one with an empty required mask, empty excluded mask and no
    /// predicates, which has no component bit of its own to index under). Call
    /// after a component is added to or removed from `entity`, or after one of its
    /// field values changes (the same index serves all three cases, since
    /// predicate components are folded into a query's required mask at registration).
    pub fn update_entity(
        &mut self,
        entity: Entity,
        type_id: u32,
        entity_manager: &EntityManager,
        component_manager: &ComponentManager,
    ) {
        for id in self.ids_for(type_id) {
            if let Some(query) = self.queries.get_mut(&id) {
                query.reconcile(entity, entity_manager, component_manager);
            }
        }
    }

    fn ids_for(&self, type_id: u32) -> Vec<String> {
        let mut ids = self.by_component.get(&type_id).cloned().unwrap_or_default();
        if type_id != MATCH_ALL {
            if let Some(match_all) = self.by_component.get(&MATCH_ALL) {
                ids.extend(match_all.iter().cloned());
            }
        }
        ids
    }

    /// Qualify a freshly created entity into every match-all query. A query with a
    /// real required/excluded/predicate bit is reconciled lazily the first time a
    /// component is added to the entity; a match-all query never gets that first
    /// `update_entity` call if the entity is never given any component, so it needs
    /// reconciling right away instead.
    pub fn qualify_new_entity(
        &mut self,
        entity: Entity,
        entity_manager: &EntityManager,
        component_manager: &ComponentManager,
    ) {
        let Some(ids) = self.by_component.get(&MATCH_ALL) else {
            return;
        };
        for id in ids.clone() {
            if let Some(query) = self.queries.get_mut(&id) {
                query.reconcile(entity, entity_manager, component_manager);
            }
        }
    }

    /// Evict `entity` from every query's result set, firing disqualify for any
    /// query it was a member of. Used on entity destruction, where the entity's
    /// bitmask is already gone and `matches` can no longer be evaluated.
    pub fn evict_entity(&mut self, entity: Entity) {
        for query in self.queries.values_mut() {
            query.evict(entity);
        }
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Str(s) => s.clone(),
        Value::Enum(i) => i.to_string(),
        Value::EntityRef(Some(e)) => e.slot().to_string(),
        Value::EntityRef(None) => "null".to_string(),
        Value::Vector(lanes) => format!(
            "[{}]",
            lanes.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
        ),
        Value::Object(_) => "<object>".to_string(),
    }
}

fn format_operand(operand: &Operand) -> String {
    match operand {
        Operand::Single(value) => format_value(value),
        Operand::Set { values, .. } => format!(
            "[{}]",
            values.iter().map(format_value).collect::<Vec<_>>().join(",")
        ),
    }
}

fn canonical_id(required: &BitSet, excluded: &BitSet, predicates: &[ResolvedPredicate]) -> String {
    let where_clause = predicates
        .iter()
        .map(|p| format!("{}:{}:{}={}", p.type_id, p.field_name, p.op.symbol(), format_operand(&p.operand)))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "required:{}|excluded:{}|where:{}",
        required.to_stable_string(),
        excluded.to_stable_string(),
        where_clause
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{create_component, FieldKind, FieldSpec};
    use crate::query::predicate;

    fn position() -> Arc<ComponentDescriptor> {
        Arc::new(
            create_component(
                "query_manager_tests::Position",
                vec![FieldSpec::new("x", FieldKind::Float32, Value::Float(0.0))],
            )
            .unwrap(),
        )
    }

    fn velocity() -> Arc<ComponentDescriptor> {
        Arc::new(
            create_component(
                "query_manager_tests::Velocity",
                vec![FieldSpec::new("vx", FieldKind::Float32, Value::Float(0.0))],
            )
            .unwrap(),
        )
    }

    #[test]
    fn registering_the_same_query_twice_returns_the_same_id() {
        let mut cm = ComponentManager::new(4);
        let mut qm = QueryManager::new();
        let pos = position();

        let id1 = qm.register_query(&mut cm, vec![pos.clone()], vec![], vec![]).unwrap();
        let id2 = qm.register_query(&mut cm, vec![pos], vec![], vec![]).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(qm.iter().count(), 1);
    }

    #[test]
    fn adding_required_component_qualifies_then_removing_disqualifies() {
        let mut em = EntityManager::new();
        let mut cm = ComponentManager::new(4);
        let mut qm = QueryManager::new();
        let pos = position();
        let vel = velocity();

        let query_id = qm
            .register_query(&mut cm, vec![pos.clone()], vec![vel.clone()], vec![])
            .unwrap();

        let entity = em.request_entity_instance();
        let pos_type = cm.get_type_id(pos.id()).unwrap();
        let vel_type = cm.get_type_id(vel.id()).unwrap();

        em.bitmask_mut(entity).unwrap().set(pos_type as usize, true);
        qm.update_entity(entity, pos_type, &em, &cm);
        assert!(qm.get(&query_id).unwrap().contains(&entity));

        em.bitmask_mut(entity).unwrap().set(vel_type as usize, true);
        qm.update_entity(entity, vel_type, &em, &cm);
        assert!(!qm.get(&query_id).unwrap().contains(&entity));
    }

    #[test]
    fn destroying_an_entity_evicts_it_from_every_query() {
        let mut em = EntityManager::new();
        let mut cm = ComponentManager::new(4);
        let mut qm = QueryManager::new();
        let pos = position();

        let query_id = qm.register_query(&mut cm, vec![pos.clone()], vec![], vec![]).unwrap();
        let entity = em.request_entity_instance();
        let pos_type = cm.get_type_id(pos.id()).unwrap();
        em.bitmask_mut(entity).unwrap().set(pos_type as usize, true);
        qm.update_entity(entity, pos_type, &em, &cm);
        assert!(qm.get(&query_id).unwrap().contains(&entity));

        em.deactivate(entity);
        qm.evict_entity(entity);
        assert!(!qm.get(&query_id).unwrap().contains(&entity));
    }

    #[test]
    fn value_predicate_transition_is_driven_by_update_entity() {
        let mut em = EntityManager::new();
        let mut cm = ComponentManager::new(4);
        let mut qm = QueryManager::new();
        let health = Arc::new(
            create_component(
                "query_manager_tests::Health",
                vec![FieldSpec::new("hp", FieldKind::Float32, Value::Float(100.0))],
            )
            .unwrap(),
        );

        let query_id = qm
            .register_query(
                &mut cm,
                vec![],
                vec![],
                vec![predicate::le(health.clone(), "hp", Value::Float(10.0))],
            )
            .unwrap();

        let entity = em.request_entity_instance();
        let type_id = cm.get_type_id(health.id()).unwrap();
        em.bitmask_mut(entity).unwrap().set(type_id as usize, true);
        qm.update_entity(entity, type_id, &em, &cm);
        assert!(!qm.get(&query_id).unwrap().contains(&entity));

        cm.get_by_type_id_mut(type_id)
            .unwrap()
            .column_mut(0)
            .write_scalar(entity.slot() as usize, &Value::Float(5.0));
        qm.update_entity(entity, type_id, &em, &cm);
        assert!(qm.get(&query_id).unwrap().contains(&entity));
    }

    #[test]
    fn match_all_query_qualifies_a_bare_entity_on_creation() {
        let mut em = EntityManager::new();
        let mut cm = ComponentManager::new(4);
        let mut qm = QueryManager::new();

        let query_id = qm.register_query(&mut cm, vec![], vec![], vec![]).unwrap();

        let entity = em.request_entity_instance();
        // No components are ever added to this entity; only qualify_new_entity
        // can put it in a match-all query's result set.
        qm.qualify_new_entity(entity, &em, &cm);
        assert!(qm.get(&query_id).unwrap().contains(&entity));
    }

    #[test]
    fn match_all_query_also_reconciles_through_update_entity() {
        let mut em = EntityManager::new();
        let mut cm = ComponentManager::new(4);
        let mut qm = QueryManager::new();
        let pos = position();

        let query_id = qm.register_query(&mut cm, vec![], vec![], vec![]).unwrap();
        let entity = em.request_entity_instance();
        qm.qualify_new_entity(entity, &em, &cm);

        let pos_type = cm.get_type_id(pos.id()).unwrap();
        em.bitmask_mut(entity).unwrap().set(pos_type as usize, true);
        qm.update_entity(entity, pos_type, &em, &cm);
        assert!(qm.get(&query_id).unwrap().contains(&entity));
    }
}
