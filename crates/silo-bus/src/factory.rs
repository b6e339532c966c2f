//! # Actor Factory
//!
//! The registry of actor blueprints and local collaborators.
//!
//! A blueprint is a name bound to an in route, an out route, a serializer and a
//! closure that builds a fresh [`Workload`]. Activating it wires a new [`Actor`]
//! to the pipe and starts it on its own thread.
//!
//! Registration takes `&mut self` and activation takes `&self`, so once the
//! factory is shared for activation the blueprint map can no longer change.
//! Activation itself is safe to call from several threads at once.
//!
//! Instances are the other half: directly-addressable local objects that an
//! actor creates by name and owns, without going through the bus.

use crate::actor::{Actor, ActorConfig, ActorExit, ActorHandle, Fault};
use crate::callback::Callbacks;
use crate::error::FactoryError;
use crate::message::Arg;
use crate::monitor::Monitor;
use crate::serializer::Serializer;
use crate::transport::Endpoint;
use crate::workload::Workload;
use parking_lot::{Condvar, Mutex, RwLock};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

type WorkloadFn = Box<dyn Fn() -> Workload + Send + Sync>;

type InstanceCtor = Box<dyn Fn(&[Arg]) -> Result<Box<dyn Any + Send>, FactoryError> + Send + Sync>;

struct Blueprint {
    in_route: String,
    out_route: String,
    serializer: Serializer,
    make: WorkloadFn,
    activations: AtomicU64,
}

/// Constructors for local collaborators, keyed by name.
#[derive(Default)]
pub struct InstanceRegistry {
    constructors: RwLock<HashMap<String, InstanceCtor>>,
}

impl std::fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.constructors.read().keys()).finish()
    }
}

impl InstanceRegistry {
    /// Registers `ctor` as the way to build an `I` under `name`.
    pub fn register<I, F>(&self, name: &str, ctor: F) -> Result<(), FactoryError>
    where
        I: ?Sized + Send + 'static,
        F: Fn(&[Arg]) -> Result<Box<I>, FactoryError> + Send + Sync + 'static,
    {
        let mut constructors = self.constructors.write();
        if constructors.contains_key(name) {
            return Err(FactoryError::DuplicateBlueprint(name.to_string()));
        }
        let erased: InstanceCtor =
            Box::new(move |args| ctor(args).map(|instance| Box::new(instance) as Box<dyn Any + Send>));
        constructors.insert(name.to_string(), erased);
        Ok(())
    }

    /// Builds a new `I`. The caller owns it.
    pub fn create<I: ?Sized + Send + 'static>(&self, name: &str, args: &[Arg]) -> Result<Box<I>, FactoryError> {
        let erased = {
            let constructors = self.constructors.read();
            let ctor = constructors
                .get(name)
                .ok_or_else(|| FactoryError::UnknownInstance(name.to_string()))?;
            ctor(args)?
        };
        erased
            .downcast::<Box<I>>()
            .map(|instance| *instance)
            .map_err(|_| FactoryError::InterfaceMismatch {
                name: name.to_string(),
                interface: std::any::type_name::<I>().to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.read().contains_key(name)
    }
}

/// Count of live actors, decremented by departure notices.
#[derive(Debug, Default)]
pub struct Census {
    live: Mutex<usize>,
    changed: Condvar,
}

impl Census {
    pub fn arrive(&self) {
        *self.live.lock() += 1;
        self.changed.notify_all();
    }

    pub fn depart(&self) {
        let mut live = self.live.lock();
        *live = live.saturating_sub(1);
        self.changed.notify_all();
    }

    pub fn live(&self) -> usize {
        *self.live.lock()
    }

    /// Waits until no actor is live. Returns false on timeout.
    pub fn wait_for_zero(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut live = self.live.lock();
        while *live > 0 {
            if self.changed.wait_until(&mut live, deadline).timed_out() {
                return *live == 0;
            }
        }
        true
    }
}

/// What every activated actor gets connected to.
#[derive(Debug, Clone)]
pub struct FactoryWiring {
    /// Actors publish here.
    pub inbound: Endpoint,
    /// Actors subscribe here.
    pub outbound: Endpoint,
    pub departure_address: String,
    pub monitor: Monitor,
    pub callbacks: Callbacks,
    pub faults: Option<mpsc::UnboundedSender<Fault>>,
}

impl FactoryWiring {
    pub fn new(inbound: Endpoint, outbound: Endpoint) -> Self {
        Self {
            inbound,
            outbound,
            departure_address: crate::message::DEPARTURE_ADDRESS.to_string(),
            monitor: Monitor::tracing_only(),
            callbacks: Callbacks::default(),
            faults: None,
        }
    }
}

pub struct ActorFactory {
    wiring: FactoryWiring,
    blueprints: BTreeMap<String, Blueprint>,
    instances: Arc<InstanceRegistry>,
    census: Arc<Census>,
    handles: Mutex<Vec<ActorHandle>>,
}

impl std::fmt::Debug for ActorFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorFactory")
            .field("blueprints", &self.blueprints.keys().collect::<Vec<_>>())
            .field("instances", &self.instances)
            .field("live", &self.census.live())
            .finish()
    }
}

impl ActorFactory {
    pub fn new(wiring: FactoryWiring) -> Self {
        Self {
            wiring,
            blueprints: BTreeMap::new(),
            instances: Arc::default(),
            census: Arc::default(),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn census(&self) -> Arc<Census> {
        Arc::clone(&self.census)
    }

    pub fn register_actor<F>(
        &mut self,
        name: &str,
        in_route: &str,
        out_route: &str,
        serializer: Serializer,
        make: F,
    ) -> Result<(), FactoryError>
    where
        F: Fn() -> Workload + Send + Sync + 'static,
    {
        if self.blueprints.contains_key(name) {
            return Err(FactoryError::DuplicateBlueprint(name.to_string()));
        }
        self.blueprints.insert(
            name.to_string(),
            Blueprint {
                in_route: in_route.to_string(),
                out_route: out_route.to_string(),
                serializer,
                make: Box::new(make),
                activations: AtomicU64::new(0),
            },
        );
        debug!(blueprint = %name, in_route = %in_route, out_route = %out_route, "Registered actor");
        Ok(())
    }

    pub fn register_instance<I, F>(&mut self, name: &str, ctor: F) -> Result<(), FactoryError>
    where
        I: ?Sized + Send + 'static,
        F: Fn(&[Arg]) -> Result<Box<I>, FactoryError> + Send + Sync + 'static,
    {
        self.instances.register(name, ctor)?;
        debug!(instance = %name, "Registered instance");
        Ok(())
    }

    pub fn create_instance<I: ?Sized + Send + 'static>(&self, name: &str, args: &[Arg]) -> Result<Box<I>, FactoryError> {
        self.instances.create::<I>(name, args)
    }

    pub fn blueprints(&self) -> impl Iterator<Item = &str> {
        self.blueprints.keys().map(String::as_str)
    }

    /// Starts one new actor from blueprint `name` and returns its id.
    pub fn activate(&self, name: &str) -> Result<String, FactoryError> {
        let blueprint = self
            .blueprints
            .get(name)
            .ok_or_else(|| FactoryError::UnknownBlueprint(name.to_string()))?;
        let n = blueprint.activations.fetch_add(1, Ordering::Relaxed) + 1;
        let id = format!("{name}#{n}");

        let config = ActorConfig::new(&id, &blueprint.in_route, &blueprint.out_route)
            .with_serializer(blueprint.serializer)
            .with_departure_address(&self.wiring.departure_address);
        let mut actor = Actor::new(
            config,
            (blueprint.make)(),
            self.wiring.outbound.subscriber()?,
            self.wiring.inbound.publisher(),
        )
        .with_monitor(self.wiring.monitor.clone())
        .with_callbacks(self.wiring.callbacks.clone())
        .with_instances(Arc::clone(&self.instances));
        if let Some(faults) = &self.wiring.faults {
            actor = actor.with_fault_listener(faults.clone());
        }

        self.census.arrive();
        let handle = match actor.spawn() {
            Ok(handle) => handle,
            Err(e) => {
                self.census.depart();
                return Err(e.into());
            }
        };
        self.handles.lock().push(handle);
        info!(actor = %id, address = %blueprint.in_route, "Activated");
        Ok(id)
    }

    /// Activates every registered blueprint once, in name order.
    pub fn start_all_actors(&self) -> Result<Vec<String>, FactoryError> {
        self.blueprints.keys().map(|name| self.activate(name)).collect()
    }

    /// Actor threads that have not finished yet.
    pub fn running_actors(&self) -> usize {
        self.handles.lock().iter().filter(|handle| !handle.is_finished()).count()
    }

    /// Joins every actor started so far. Only returns once they have all exited.
    pub fn join_all(&self) -> Vec<(String, ActorExit)> {
        let handles = std::mem::take(&mut *self.handles.lock());
        handles
            .into_iter()
            .map(|handle| {
                let id = handle.id().to_string();
                let exit = handle.join();
                if let ActorExit::Panicked(reason) = &exit {
                    warn!(actor = %id, reason = %reason, "Actor had panicked");
                }
                (id, exit)
            })
            .collect()
    }
}
