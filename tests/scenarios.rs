//! End-to-end scenarios exercising the full create/mutate/query/tick path through
//! the public `World` API, rather than any single module in isolation.

use std::collections::HashMap;
use std::sync::Arc;

use ecs_core::query::predicate;
use ecs_core::{
    create_component, ComponentDescriptor, Entity, EntityMut, FieldKind, FieldSpec, QueryConfig,
    System, SystemContext, SystemOptions, Value, World, WorldConfig,
};

fn component(id: &str, fields: Vec<FieldSpec>) -> Arc<ComponentDescriptor> {
    Arc::new(create_component(id, fields).unwrap())
}

fn read_float(entity: &EntityMut<'_>, descriptor: &ComponentDescriptor, field: &str) -> f64 {
    match entity.get_value(descriptor, field) {
        Some(Value::Float(f)) => f,
        other => panic!("expected a float value for `{field}`, got {other:?}"),
    }
}

struct MovementSystem {
    position: Arc<ComponentDescriptor>,
    velocity: Arc<ComponentDescriptor>,
}

impl System for MovementSystem {
    fn query_configs(&self) -> Vec<(String, QueryConfig)> {
        vec![(
            "moving".to_string(),
            QueryConfig::new()
                .require(self.position.clone())
                .require(self.velocity.clone()),
        )]
    }

    fn update(&mut self, ctx: &mut SystemContext, delta: f64, _time: f64) -> ecs_core::EcsResult<()> {
        let entities: Vec<Entity> = ctx.query("moving").unwrap().entities().collect();
        for e in entities {
            let mut accessor = ctx.entity(e);
            let vx = match accessor.get_value(&self.velocity, "vx") {
                Some(Value::Float(f)) => f,
                _ => 0.0,
            };
            let x = match accessor.get_value(&self.position, "x") {
                Some(Value::Float(f)) => f,
                _ => 0.0,
            };
            accessor.set_value(&self.position, "x", Value::Float(x + vx * delta))?;
        }
        Ok(())
    }
}

#[test]
fn scenario_1_position_velocity_tick_accumulates_x() {
    let position = component(
        "scenarios::s1::Position",
        vec![
            FieldSpec::new("x", FieldKind::Float32, Value::Float(0.0)),
            FieldSpec::new("y", FieldKind::Float32, Value::Float(0.0)),
        ],
    );
    let velocity = component(
        "scenarios::s1::Velocity",
        vec![
            FieldSpec::new("vx", FieldKind::Float32, Value::Float(0.0)),
            FieldSpec::new("vy", FieldKind::Float32, Value::Float(0.0)),
        ],
    );

    let mut world = World::new(WorldConfig::default());
    world
        .register_system(
            MovementSystem {
                position: position.clone(),
                velocity: velocity.clone(),
            },
            SystemOptions::default(),
        )
        .unwrap();

    let mut entity = world.create_entity();
    entity.add_component(position.clone(), HashMap::new()).unwrap();
    entity
        .add_component(
            velocity,
            HashMap::from([("vx".to_string(), Value::Float(10.0))]),
        )
        .unwrap();
    let handle = entity.entity();

    let mut observed = Vec::new();
    for _ in 0..3 {
        world.update(1.0, 0.0).unwrap();
        observed.push(read_float(&world.entity_mut(handle), &position, "x"));
    }
    assert_eq!(observed, vec![10.0, 20.0, 30.0]);
}

struct HealthSystem {
    health: Arc<ComponentDescriptor>,
}

impl System for HealthSystem {
    fn query_configs(&self) -> Vec<(String, QueryConfig)> {
        vec![("health".to_string(), QueryConfig::new().require(self.health.clone()))]
    }

    fn config_schema(&self) -> Vec<(String, Value)> {
        vec![("healthDecreaseRate".to_string(), Value::Int(10))]
    }

    fn update(&mut self, ctx: &mut SystemContext, delta: f64, _time: f64) -> ecs_core::EcsResult<()> {
        let rate = match ctx.config("healthDecreaseRate") {
            Some(Value::Int(i)) => *i as f64,
            _ => 0.0,
        };
        let entities: Vec<Entity> = ctx.query("health").unwrap().entities().collect();
        for e in entities {
            let mut accessor = ctx.entity(e);
            let value = match accessor.get_value(&self.health, "value") {
                Some(Value::Int(i)) => i,
                _ => 0,
            };
            accessor.set_value(&self.health, "value", Value::Int(value - (rate * delta) as i64))?;
        }
        Ok(())
    }
}

#[test]
fn scenario_2_health_decreases_by_configured_rate() {
    let health = component(
        "scenarios::s2::Health",
        vec![FieldSpec::new("value", FieldKind::Int16, Value::Int(100))],
    );

    let mut world = World::new(WorldConfig::default());
    world
        .register_system(HealthSystem { health: health.clone() }, SystemOptions::default())
        .unwrap();

    let mut entity = world.create_entity();
    entity.add_component(health.clone(), HashMap::new()).unwrap();
    let handle = entity.entity();

    world.update(1.0, 0.0).unwrap();
    assert_eq!(
        world.entity_mut(handle).get_value(&health, "value"),
        Some(Value::Int(90))
    );

    world.update(2.0, 0.0).unwrap();
    assert_eq!(
        world.entity_mut(handle).get_value(&health, "value"),
        Some(Value::Int(70))
    );
}

#[test]
fn scenario_3_adding_excluded_component_disqualifies_and_fires_callback() {
    let position = component(
        "scenarios::s3::Position",
        vec![FieldSpec::new("x", FieldKind::Float32, Value::Float(0.0))],
    );
    let velocity = component(
        "scenarios::s3::Velocity",
        vec![FieldSpec::new("vx", FieldKind::Float32, Value::Float(0.0))],
    );

    let mut world = World::new(WorldConfig::default());
    let query_id = world
        .register_query(vec![position.clone()], vec![velocity.clone()], vec![])
        .unwrap();

    let mut e1 = world.create_entity();
    e1.add_component(position.clone(), HashMap::new()).unwrap();
    let e1_handle = e1.entity();
    assert!(world.get_query(&query_id).unwrap().contains(&e1_handle));

    let disqualified = Arc::new(std::sync::Mutex::new(Vec::new()));
    let disqualified_clone = disqualified.clone();
    world.get_query_mut(&query_id).unwrap().subscribe(
        ecs_core::query::Event::Disqualify,
        move |e| disqualified_clone.lock().unwrap().push(e),
        false,
    );

    world.entity_mut(e1_handle).add_component(velocity, HashMap::new()).unwrap();

    assert!(!world.get_query(&query_id).unwrap().contains(&e1_handle));
    assert_eq!(*disqualified.lock().unwrap(), vec![e1_handle]);
}

#[test]
fn scenario_4_predicate_query_tracks_id_updates() {
    let panel = component(
        "scenarios::s4::Panel",
        vec![FieldSpec::new("id", FieldKind::String, Value::Str(String::new()))],
    );

    let mut world = World::new(WorldConfig::default());
    let query_id = world
        .register_query(
            vec![],
            vec![],
            vec![predicate::eq(panel.clone(), "id", Value::Str("panel2".to_string()))],
        )
        .unwrap();

    let mut e1 = world.create_entity();
    e1.add_component(
        panel.clone(),
        HashMap::from([("id".to_string(), Value::Str("panel1".to_string()))]),
    )
    .unwrap();
    let e1_handle = e1.entity();

    let mut e2 = world.create_entity();
    e2.add_component(
        panel.clone(),
        HashMap::from([("id".to_string(), Value::Str("panel2".to_string()))]),
    )
    .unwrap();

    let mut e3 = world.create_entity();
    e3.add_component(
        panel.clone(),
        HashMap::from([("id".to_string(), Value::Str("panel3".to_string()))]),
    )
    .unwrap();

    assert_eq!(world.get_query(&query_id).unwrap().len(), 1);

    world
        .entity_mut(e1_handle)
        .set_value(&panel, "id", Value::Str("panel2".to_string()))
        .unwrap();

    assert_eq!(world.get_query(&query_id).unwrap().len(), 2);
}

#[test]
fn scenario_5_wide_bitmask_query_tracks_required_and_excluded_components() {
    let components: Vec<Arc<ComponentDescriptor>> = (0..64)
        .map(|i| component(&format!("scenarios::s5::C{i}"), vec![]))
        .collect();

    let mut world = World::new(WorldConfig::default());
    let required = vec![
        components[0].clone(),
        components[31].clone(),
        components[32].clone(),
        components[63].clone(),
    ];
    let excluded = vec![components[10].clone()];
    let query_id = world.register_query(required.clone(), excluded, vec![]).unwrap();

    let mut entity = world.create_entity();
    let handle = entity.entity();
    for desc in &required {
        entity.add_component(desc.clone(), HashMap::new()).unwrap();
    }
    assert!(world.get_query(&query_id).unwrap().contains(&handle));

    world
        .entity_mut(handle)
        .add_component(components[10].clone(), HashMap::new())
        .unwrap();
    assert!(!world.get_query(&query_id).unwrap().contains(&handle));

    world.entity_mut(handle).remove_component(&components[10]).unwrap();
    assert!(world.get_query(&query_id).unwrap().contains(&handle));
}

#[test]
fn scenario_6_entity_pool_reuses_slots_with_advanced_generation() {
    let mut world = World::new(WorldConfig::default());

    let created: Vec<Entity> = (0..5).map(|_| world.create_entity().entity()).collect();
    for &e in &created {
        world.entity_mut(e).destroy();
    }
    let recreated: Vec<Entity> = (0..5).map(|_| world.create_entity().entity()).collect();

    let expected_slots: Vec<u32> = created.iter().rev().map(|e| e.slot()).collect();
    let actual_slots: Vec<u32> = recreated.iter().map(|e| e.slot()).collect();
    assert_eq!(actual_slots, expected_slots);

    for entity in &recreated {
        let original = created.iter().find(|e| e.slot() == entity.slot()).unwrap();
        assert_eq!(entity.generation(), original.generation() + 1);
    }
}
