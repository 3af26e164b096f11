//! `World`: the orchestrator that owns every manager, the ordered systems list
//! and the globals map, and drives ticks.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, trace, warn};

use crate::component::{Column, ComponentDescriptor, ComponentManager, FieldKind, FieldSpec, Value};
use crate::entity::{Entity, EntityManager};
use crate::error::{EcsError, EcsResult};
use crate::query::{Predicate, Query, QueryManager};
use crate::system::{RegisteredSystem, Signal, System, SystemContext, SystemOptions};

/// Construction options for a [`World`].
pub struct WorldConfig {
    /// Preallocation hint for every component's column storage; columns still grow
    /// on demand past this, so it is never a hard ceiling.
    pub entity_capacity: usize,
    /// When `false`, the coercion assertions in entity mutation (enum membership,
    /// numeric bounds) become no-ops. Default `true`.
    pub checks_on: bool,
    /// Invoked with each entity handle just before its slot is released back to
    /// the free list.
    pub entity_release_callback: Option<Box<dyn FnMut(Entity)>>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            entity_capacity: 1000,
            checks_on: true,
            entity_release_callback: None,
        }
    }
}

/// Orchestrates the ECS runtime: owns component/entity/query managers, the
/// priority-ordered systems list, and a process-wide globals map.
pub struct World {
    checks_on: bool,
    entity_release_callback: Option<Box<dyn FnMut(Entity)>>,
    entities: EntityManager,
    components: ComponentManager,
    queries: QueryManager,
    systems: Vec<RegisteredSystem>,
    registered_system_types: HashSet<TypeId>,
    globals: HashMap<String, Value>,
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            checks_on: config.checks_on,
            entity_release_callback: config.entity_release_callback,
            entities: EntityManager::with_capacity(config.entity_capacity),
            components: ComponentManager::new(config.entity_capacity),
            queries: QueryManager::new(),
            systems: Vec::new(),
            registered_system_types: HashSet::new(),
            globals: HashMap::new(),
        }
    }

    pub fn globals(&self) -> &HashMap<String, Value> {
        &self.globals
    }

    pub fn globals_mut(&mut self) -> &mut HashMap<String, Value> {
        &mut self.globals
    }

    pub fn get_query(&self, id: &str) -> Option<&Query> {
        self.queries.get(id)
    }

    pub fn get_query_mut(&mut self, id: &str) -> Option<&mut Query> {
        self.queries.get_mut(id)
    }

    // -- components --------------------------------------------------------

    pub fn register_component(&mut self, descriptor: Arc<ComponentDescriptor>) -> u32 {
        self.components.register(descriptor)
    }

    pub fn has_component(&self, id: &str) -> bool {
        self.components.is_registered(id)
    }

    // -- entities ------------------------------------------------------------

    pub fn create_entity(&mut self) -> EntityMut<'_> {
        let entity = self.entities.request_entity_instance();
        trace!("created entity at slot {} generation {}", entity.slot(), entity.generation());
        self.components.ensure_capacity(entity.slot() as usize + 1);
        self.queries.qualify_new_entity(entity, &self.entities, &self.components);
        EntityMut {
            world: self,
            entity,
        }
    }

    pub fn entity_mut(&mut self, entity: Entity) -> EntityMut<'_> {
        EntityMut {
            world: self,
            entity,
        }
    }

    pub fn entity_ref(&self, entity: Entity) -> EntityRef<'_> {
        EntityRef {
            world: self,
            entity,
        }
    }

    pub fn live_entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.live_entities()
    }

    // -- queries ---------------------------------------------------------------

    pub fn register_query(
        &mut self,
        required: Vec<Arc<ComponentDescriptor>>,
        excluded: Vec<Arc<ComponentDescriptor>>,
        predicates: Vec<Predicate>,
    ) -> EcsResult<String> {
        let id = self
            .queries
            .register_query(&mut self.components, required, excluded, predicates)?;
        self.queries.populate(&id, &self.entities, &self.components);
        Ok(id)
    }

    // -- systems -----------------------------------------------------------

    /// Register `system`. A no-op (warn and return) if an instance of `T` is
    /// already registered.
    pub fn register_system<T: System + 'static>(
        &mut self,
        system: T,
        options: SystemOptions,
    ) -> EcsResult<()> {
        let type_id = TypeId::of::<T>();
        if self.registered_system_types.contains(&type_id) {
            warn!("system `{}` is already registered; ignoring", std::any::type_name::<T>());
            return Ok(());
        }

        let mut boxed: Box<dyn System> = Box::new(system);

        let mut queries = HashMap::new();
        for (name, config) in boxed.query_configs() {
            let query_id = self.register_query(config.required, config.excluded, config.predicates)?;
            queries.insert(name, query_id);
        }

        let mut config = HashMap::new();
        for (name, default) in boxed.config_schema() {
            config.insert(name, Signal::new(default));
        }
        for (name, value) in &options.config_overrides {
            if let Some(signal) = config.get_mut(name) {
                signal.set(value.clone());
            }
        }

        {
            let mut ctx = SystemContext::new(self, &queries, &mut config);
            boxed.init(&mut ctx);
        }

        let registered = RegisteredSystem {
            name: std::any::type_name::<T>().to_string(),
            type_id,
            priority: options.priority,
            paused: false,
            system: boxed,
            queries,
            config,
        };

        let insert_at = self
            .systems
            .iter()
            .position(|existing| existing.priority > registered.priority)
            .unwrap_or(self.systems.len());
        debug!("registered system `{}` at priority {}", std::any::type_name::<T>(), options.priority);
        self.systems.insert(insert_at, registered);
        self.registered_system_types.insert(type_id);
        Ok(())
    }

    pub fn unregister_system<T: System + 'static>(&mut self) {
        let type_id = TypeId::of::<T>();
        let Some(pos) = self.systems.iter().position(|s| s.type_id == type_id) else {
            return;
        };
        let mut registered = self.systems.remove(pos);
        {
            let mut ctx = SystemContext::new(self, &registered.queries, &mut registered.config);
            registered.system.destroy(&mut ctx);
        }
        self.registered_system_types.remove(&type_id);
        debug!("unregistered system `{}`", std::any::type_name::<T>());
    }

    pub fn has_system<T: System + 'static>(&self) -> bool {
        self.registered_system_types.contains(&TypeId::of::<T>())
    }

    pub fn get_system<T: System + 'static>(&self) -> Option<&dyn System> {
        let type_id = TypeId::of::<T>();
        self.systems
            .iter()
            .find(|s| s.type_id == type_id)
            .map(|s| s.system.as_ref())
    }

    pub fn get_systems(&self) -> impl Iterator<Item = &dyn System> {
        self.systems.iter().map(|s| s.system.as_ref())
    }

    pub fn play_system<T: System + 'static>(&mut self) {
        let type_id = TypeId::of::<T>();
        if let Some(s) = self.systems.iter_mut().find(|s| s.type_id == type_id) {
            s.play();
        }
    }

    pub fn stop_system<T: System + 'static>(&mut self) {
        let type_id = TypeId::of::<T>();
        if let Some(s) = self.systems.iter_mut().find(|s| s.type_id == type_id) {
            s.stop();
        }
    }

    /// Run every non-paused system, in priority order, once.
    ///
    /// Systems are temporarily taken out of `self` so each can borrow the rest of
    /// the world mutably (to create/mutate entities) while also borrowing its own
    /// bound queries and config — the two borrows are disjoint because `systems`
    /// is no longer a field of `self` for the duration of the loop.
    pub fn update(&mut self, delta: f64, time: f64) -> EcsResult<()> {
        let mut systems = std::mem::take(&mut self.systems);
        let mut result = Ok(());
        for registered in systems.iter_mut() {
            if registered.paused {
                continue;
            }
            let mut ctx = SystemContext::new(self, &registered.queries, &mut registered.config);
            if let Err(err) = registered.system.update(&mut ctx, delta, time) {
                result = Err(err);
                break;
            }
        }
        self.systems = systems;
        result
    }
}

/// A mutable accessor bound to one entity, since a bare [`Entity`] carries no
/// reference to its world.
pub struct EntityMut<'w> {
    world: &'w mut World,
    entity: Entity,
}

impl<'w> EntityMut<'w> {
    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn slot(&self) -> u32 {
        self.entity.slot()
    }

    pub fn generation(&self) -> u8 {
        self.entity.generation()
    }

    pub fn active(&self) -> bool {
        self.world.entities.is_active(self.entity)
    }

    pub fn has_component(&self, descriptor: &ComponentDescriptor) -> bool {
        has_component_impl(self.world, self.entity, descriptor)
    }

    pub fn get_components(&self) -> Vec<Arc<ComponentDescriptor>> {
        get_components_impl(self.world, self.entity)
    }

    pub fn get_value(&self, descriptor: &ComponentDescriptor, field: &str) -> Option<Value> {
        get_value_impl(self.world, self.entity, descriptor, field)
    }

    pub fn add_component(
        &mut self,
        descriptor: Arc<ComponentDescriptor>,
        initial: HashMap<String, Value>,
    ) -> EcsResult<()> {
        if !self.world.entities.is_active(self.entity) {
            warn!("addComponent on a destroyed entity at slot {}; ignoring", self.entity.slot());
            return Ok(());
        }

        let type_id = self.world.components.register(descriptor.clone());
        let fields: Vec<FieldSpec> = descriptor.fields().to_vec();
        let slot = self.entity.slot() as usize;

        // Coerce and validate every field before writing any of them, so a
        // rejected field leaves every column untouched rather than partially written.
        let mut coerced_fields = Vec::with_capacity(fields.len());
        for field in &fields {
            let value = initial.get(&field.name).cloned().unwrap_or_else(|| field.default.clone());
            let coerced = coerce_and_validate(descriptor.id(), field, value, self.world.checks_on)?;
            coerced_fields.push(coerced);
        }

        let registered = self.world.components.get_by_type_id_mut(type_id).expect("just registered");
        for (field_index, (field, coerced)) in fields.iter().zip(coerced_fields).enumerate() {
            write_field(registered.column_mut(field_index), slot, field.kind, &coerced);
        }

        self.world
            .entities
            .bitmask_mut(self.entity)
            .expect("checked active above")
            .set(type_id as usize, true);

        self.world
            .queries
            .update_entity(self.entity, type_id, &self.world.entities, &self.world.components);
        Ok(())
    }

    pub fn remove_component(&mut self, descriptor: &ComponentDescriptor) -> EcsResult<()> {
        if !self.world.entities.is_active(self.entity) {
            warn!("removeComponent on a destroyed entity at slot {}; ignoring", self.entity.slot());
            return Ok(());
        }
        let Some(type_id) = self.world.components.get_type_id(descriptor.id()) else {
            return Ok(());
        };
        let Some(mask) = self.world.entities.bitmask_mut(self.entity) else {
            return Ok(());
        };
        if !mask.get(type_id as usize) {
            return Ok(());
        }
        mask.set(type_id as usize, false);
        self.world
            .queries
            .update_entity(self.entity, type_id, &self.world.entities, &self.world.components);
        Ok(())
    }

    pub fn set_value(&mut self, descriptor: &ComponentDescriptor, field: &str, value: Value) -> EcsResult<()> {
        if !self.world.entities.is_active(self.entity) {
            warn!("setValue on a destroyed entity at slot {}; ignoring", self.entity.slot());
            return Ok(());
        }
        let Some(type_id) = self.world.components.get_type_id(descriptor.id()) else {
            return Err(EcsError::UnknownField {
                component: descriptor.id().to_string(),
                field: field.to_string(),
            });
        };
        let Some(field_index) = descriptor.field_index(field) else {
            return Err(EcsError::UnknownField {
                component: descriptor.id().to_string(),
                field: field.to_string(),
            });
        };
        let field_spec = descriptor.fields()[field_index].clone();
        let coerced = coerce_and_validate(descriptor.id(), &field_spec, value, self.world.checks_on)?;

        let slot = self.entity.slot() as usize;
        let registered = self.world.components.get_by_type_id_mut(type_id).expect("checked above");
        write_field(registered.column_mut(field_index), slot, field_spec.kind, &coerced);

        self.world
            .queries
            .update_entity(self.entity, type_id, &self.world.entities, &self.world.components);
        Ok(())
    }

    /// A mutable view over the lanes of a `Vec2/Vec3/Vec4` field. Rust's ownership
    /// model doesn't admit caching a live mutable reference across calls, so each
    /// call simply borrows the column directly, which costs nothing more than a
    /// cached view would.
    pub fn get_vector_view(&mut self, descriptor: &ComponentDescriptor, field: &str) -> Option<&mut [f32]> {
        let type_id = self.world.components.get_type_id(descriptor.id())?;
        let field_index = descriptor.field_index(field)?;
        let kind = descriptor.fields()[field_index].kind;
        if !matches!(kind, FieldKind::Vec2 | FieldKind::Vec3 | FieldKind::Vec4) {
            return None;
        }
        let arity = kind.arity();
        let slot = self.entity.slot() as usize;
        let registered = self.world.components.get_by_type_id_mut(type_id)?;
        Some(registered.column_mut(field_index).vector_lanes_mut(slot, arity))
    }

    /// Deactivate, evict from every query (firing disqualify), invoke the release
    /// callback, then bump the generation and free the slot — in that order, so
    /// subscribers and the release callback still observe a consistent handle.
    pub fn destroy(self) {
        if !self.world.entities.deactivate(self.entity) {
            return;
        }
        self.world.queries.evict_entity(self.entity);
        if let Some(callback) = self.world.entity_release_callback.as_mut() {
            callback(self.entity);
        }
        self.world.entities.finalize_release(self.entity);
    }
}

/// A read-only accessor bound to one entity.
pub struct EntityRef<'w> {
    world: &'w World,
    entity: Entity,
}

impl<'w> EntityRef<'w> {
    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn active(&self) -> bool {
        self.world.entities.is_active(self.entity)
    }

    pub fn has_component(&self, descriptor: &ComponentDescriptor) -> bool {
        has_component_impl(self.world, self.entity, descriptor)
    }

    pub fn get_components(&self) -> Vec<Arc<ComponentDescriptor>> {
        get_components_impl(self.world, self.entity)
    }

    pub fn get_value(&self, descriptor: &ComponentDescriptor, field: &str) -> Option<Value> {
        get_value_impl(self.world, self.entity, descriptor, field)
    }
}

fn has_component_impl(world: &World, entity: Entity, descriptor: &ComponentDescriptor) -> bool {
    let Some(type_id) = world.components.get_type_id(descriptor.id()) else {
        return false;
    };
    world
        .entities
        .bitmask(entity)
        .is_some_and(|mask| mask.get(type_id as usize))
}

fn get_components_impl(world: &World, entity: Entity) -> Vec<Arc<ComponentDescriptor>> {
    let Some(mask) = world.entities.bitmask(entity) else {
        return Vec::new();
    };
    mask.to_array()
        .into_iter()
        .filter_map(|bit| world.components.get_by_type_id(bit as u32))
        .map(|registered| registered.descriptor.clone())
        .collect()
}

fn get_value_impl(world: &World, entity: Entity, descriptor: &ComponentDescriptor, field: &str) -> Option<Value> {
    let type_id = world.components.get_type_id(descriptor.id())?;
    let field_index = descriptor.field_index(field)?;
    let kind = descriptor.fields()[field_index].kind;
    let registered = world.components.get_by_type_id(type_id)?;
    Some(crate::query::read_field_value(
        registered.column(field_index),
        entity.slot() as usize,
        kind,
        &world.entities,
    ))
}

fn write_field(column: &mut Column, slot: usize, kind: FieldKind, value: &Value) {
    match kind {
        FieldKind::Vec2 | FieldKind::Vec3 | FieldKind::Vec4 => {
            let lanes = match value {
                Value::Vector(lanes) => lanes.clone(),
                _ => vec![0.0; kind.arity()],
            };
            column.write_vector(slot, kind.arity(), &lanes);
        }
        _ => column.write_scalar(slot, value),
    }
}

/// Coerce and validate `value` against `field`'s declared kind/bounds/enum before
/// it is written to a column. A no-op pass-through when `checks_on` is `false`,
/// except for the parts of validation (vector arity) that protect against an
/// out-of-bounds write rather than a logical assertion.
fn coerce_and_validate(
    component: &str,
    field: &FieldSpec,
    value: Value,
    checks_on: bool,
) -> EcsResult<Value> {
    match field.kind {
        FieldKind::Enum => {
            if checks_on {
                let declared = field.enum_values.as_deref().unwrap_or(&[]);
                let int_value = match &value {
                    Value::Enum(i) | Value::Int(i) => *i,
                    other => return Err(EcsError::InvalidSchema {
                        component: component.to_string(),
                        reason: format!("field `{}` expected an enum value, got {other:?}", field.name),
                    }),
                };
                if !declared.contains(&int_value) {
                    return Err(EcsError::InvalidEnumValue {
                        component: component.to_string(),
                        field: field.name.clone(),
                        value: int_value,
                    });
                }
            }
            Ok(value)
        }
        FieldKind::Vec2 | FieldKind::Vec3 | FieldKind::Vec4 => {
            if let Value::Vector(lanes) = &value {
                if lanes.len() != field.kind.arity() {
                    return Err(EcsError::InvalidSchema {
                        component: component.to_string(),
                        reason: format!(
                            "field `{}` expected {} lanes, got {}",
                            field.name,
                            field.kind.arity(),
                            lanes.len()
                        ),
                    });
                }
            }
            Ok(value)
        }
        _ if field.kind.is_numeric() => {
            if checks_on {
                if let Some((min, max)) = field.bounds {
                    if let Some(numeric) = value.as_numeric() {
                        if numeric < min || numeric > max {
                            return Err(EcsError::ValueOutOfRange {
                                component: component.to_string(),
                                field: field.name.clone(),
                                value: numeric,
                                min,
                                max,
                            });
                        }
                    }
                }
            }
            Ok(value)
        }
        _ => Ok(value),
    }
}
