//! Systems: named, prioritized update procedures bound to a fixed set of queries
//! and a typed, observable configuration bag.
//!
//! A system's query and config requirements are data, not reflection: a plain
//! [`System`] trait whose [`System::query_configs`] and [`System::config_schema`]
//! methods describe what the system needs, evaluated once at registration.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::component::{ComponentDescriptor, Value};
use crate::error::EcsResult;
use crate::query::Predicate;

/// A minimal observable value cell: read with [`Signal::get`], write with
/// [`Signal::set`] (which invokes every subscriber), or [`Signal::subscribe`] to a
/// stream of future writes. No dependency graph, no batching — a write is a plain
/// synchronous fan-out.
pub struct Signal<T> {
    value: T,
    subscribers: Vec<Box<dyn FnMut(&T)>>,
}

impl<T> Signal<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            subscribers: Vec::new(),
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn set(&mut self, value: T) {
        self.value = value;
        for subscriber in &mut self.subscribers {
            subscriber(&self.value);
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&T) + 'static) {
        self.subscribers.push(Box::new(listener));
    }
}

/// The (required, excluded, predicates) shape of one query a system needs bound at
/// registration, named so the system can look the live [`crate::query::Query`]
/// back up through [`SystemContext::query`] at update time.
#[derive(Default, Clone)]
pub struct QueryConfig {
    pub required: Vec<Arc<ComponentDescriptor>>,
    pub excluded: Vec<Arc<ComponentDescriptor>>,
    pub predicates: Vec<Predicate>,
}

impl QueryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, descriptor: Arc<ComponentDescriptor>) -> Self {
        self.required.push(descriptor);
        self
    }

    pub fn exclude(mut self, descriptor: Arc<ComponentDescriptor>) -> Self {
        self.excluded.push(descriptor);
        self
    }

    pub fn where_(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }
}

/// A user-defined update procedure. Registered with [`crate::world::World::register_system`],
/// which binds [`System::query_configs`] to live queries and seeds
/// [`System::config_schema`] into per-instance [`Signal`]s before [`System::init`] runs.
pub trait System: Any {
    /// Queries this system needs, keyed by a name it uses to look the bound query
    /// back up via [`SystemContext::query`].
    fn query_configs(&self) -> Vec<(String, QueryConfig)>;

    /// Configuration schema: name -> default value. Entries become [`Signal`]s,
    /// overridable at registration by [`SystemOptions::config_overrides`].
    fn config_schema(&self) -> Vec<(String, Value)> {
        Vec::new()
    }

    /// Called once, immediately after registration and query binding.
    fn init(&mut self, _ctx: &mut SystemContext) {}

    /// Called once per tick while the system is not paused.
    fn update(&mut self, ctx: &mut SystemContext, delta: f64, time: f64) -> EcsResult<()>;

    /// Called once on unregistration.
    fn destroy(&mut self, _ctx: &mut SystemContext) {}
}

/// Per-registration options: `priority` governs scheduling order (lower runs
/// first; stable among equal priorities), `config_overrides` seeds named config
/// signals away from their schema default.
#[derive(Default)]
pub struct SystemOptions {
    pub priority: i32,
    pub config_overrides: HashMap<String, Value>,
}

impl SystemOptions {
    pub fn new(priority: i32) -> Self {
        Self {
            priority,
            config_overrides: HashMap::new(),
        }
    }

    pub fn with_config(mut self, name: impl Into<String>, value: Value) -> Self {
        self.config_overrides.insert(name.into(), value);
        self
    }
}

/// A registered system: the boxed [`System`] plus the bookkeeping the scheduler
/// and [`SystemContext`] need — its priority slot, pause flag, bound query ids
/// (by the name the system itself assigned them) and config signals.
pub(crate) struct RegisteredSystem {
    pub name: String,
    pub type_id: TypeId,
    pub priority: i32,
    pub paused: bool,
    pub system: Box<dyn System>,
    pub queries: HashMap<String, String>,
    pub config: HashMap<String, Signal<Value>>,
}

impl RegisteredSystem {
    pub fn play(&mut self) {
        self.paused = false;
    }

    pub fn stop(&mut self) {
        self.paused = true;
    }
}

pub use context::SystemContext;

mod context {
    use super::Signal;
    use crate::component::Value;
    use crate::entity::Entity;
    use crate::query::Query;
    use crate::world::{EntityMut, World};
    use std::collections::HashMap;

    /// The view a [`super::System`] gets of the world during `init`/`update`/`destroy`:
    /// its own bound queries and config signals, plus pass-throughs to the world's
    /// entity and globals operations.
    pub struct SystemContext<'w> {
        world: &'w mut World,
        queries: &'w HashMap<String, String>,
        config: &'w mut HashMap<String, Signal<Value>>,
    }

    impl<'w> SystemContext<'w> {
        pub(crate) fn new(
            world: &'w mut World,
            queries: &'w HashMap<String, String>,
            config: &'w mut HashMap<String, Signal<Value>>,
        ) -> Self {
            Self {
                world,
                queries,
                config,
            }
        }

        pub fn query(&self, name: &str) -> Option<&Query> {
            self.queries.get(name).and_then(|id| self.world.get_query(id))
        }

        pub fn config(&self, name: &str) -> Option<&Value> {
            self.config.get(name).map(Signal::get)
        }

        pub fn set_config(&mut self, name: &str, value: Value) {
            if let Some(signal) = self.config.get_mut(name) {
                signal.set(value);
            }
        }

        pub fn subscribe_config(&mut self, name: &str, listener: impl FnMut(&Value) + 'static) {
            if let Some(signal) = self.config.get_mut(name) {
                signal.subscribe(listener);
            }
        }

        pub fn globals(&self) -> &HashMap<String, Value> {
            self.world.globals()
        }

        pub fn globals_mut(&mut self) -> &mut HashMap<String, Value> {
            self.world.globals_mut()
        }

        pub fn create_entity(&mut self) -> EntityMut<'_> {
            self.world.create_entity()
        }

        pub fn entity(&mut self, entity: Entity) -> EntityMut<'_> {
            self.world.entity_mut(entity)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_set_notifies_every_subscriber() {
        let mut signal = Signal::new(0_i64);
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        signal.subscribe(move |v| seen_clone.borrow_mut().push(*v));

        signal.set(1);
        signal.set(2);

        assert_eq!(*seen.borrow(), vec![1, 2]);
        assert_eq!(*signal.get(), 2);
    }
}
