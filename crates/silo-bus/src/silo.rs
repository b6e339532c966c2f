//! # Silo Host
//!
//! A silo owns one [`BusPipe`], one [`ActorFactory`] and the threads around
//! them. The lifecycle is:
//!
//! 1. **Create** with a [`SiloConfig`] and register blueprints and instances.
//! 2. **Start**: the pipe relay first, then the census that counts departure
//!    notices, then one actor per blueprint.
//! 3. **Use**: publish through [`Silo::publisher`] or call through
//!    [`Silo::scope`]; activate more actors with [`Silo::activate`].
//! 4. **Stop**: send `"stop"` to the actors and [`Silo::await_departures`],
//!    then [`Silo::stop`] closes the pipe and joins every thread. Actors still
//!    running at that point see their channel close and exit too.
//!
//! `stop` is idempotent and also runs on drop.

use crate::actor::{ActorExit, Fault};
use crate::callback::{Callbacks, Scope};
use crate::config::SiloConfig;
use crate::error::{BusError, FactoryError, SiloError};
use crate::factory::{ActorFactory, Census, FactoryWiring};
use crate::frame::{decode_message, encode_stop, Decoded};
use crate::message::{Arg, DEPARTED_MESSAGE};
use crate::monitor::{Monitor, MonitorEndpoint};
use crate::pipe::BusPipe;
use crate::serializer::Serializer;
use crate::transport::{Publisher, Subscriber};
use crate::workload::Workload;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SiloState {
    Created,
    Running,
    Stopped,
}

#[derive(Debug)]
pub struct Silo {
    config: SiloConfig,
    serializer: Serializer,
    pipe: BusPipe,
    factory: ActorFactory,
    census: Arc<Census>,
    census_thread: Option<JoinHandle<()>>,
    monitor: Option<MonitorEndpoint>,
    callbacks: Callbacks,
    faults: Option<mpsc::UnboundedReceiver<Fault>>,
    state: SiloState,
}

impl Silo {
    pub fn new(config: SiloConfig) -> Result<Self, SiloError> {
        let serializer = config.serializer();
        let pipe = BusPipe::bind(&config.pipe);
        let (monitor, endpoint) = if config.monitor {
            let (monitor, endpoint) = MonitorEndpoint::spawn()?;
            (monitor, Some(endpoint))
        } else {
            (Monitor::tracing_only(), None)
        };
        let (fault_tx, fault_rx) = mpsc::unbounded_channel();
        let callbacks = Callbacks::new();

        let wiring = FactoryWiring {
            inbound: pipe.inbound().clone(),
            outbound: pipe.outbound().clone(),
            departure_address: config.departure_address.clone(),
            monitor,
            callbacks: callbacks.clone(),
            faults: Some(fault_tx),
        };
        let factory = ActorFactory::new(wiring);
        let census = factory.census();

        Ok(Self {
            config,
            serializer,
            pipe,
            factory,
            census,
            census_thread: None,
            monitor: endpoint,
            callbacks,
            faults: Some(fault_rx),
            state: SiloState::Created,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &SiloConfig {
        &self.config
    }

    /// The silo-wide serializer from the config.
    pub fn serializer(&self) -> Serializer {
        self.serializer
    }

    pub fn register_actor<F>(
        &mut self,
        name: &str,
        in_route: &str,
        out_route: &str,
        serializer: Serializer,
        make: F,
    ) -> Result<(), SiloError>
    where
        F: Fn() -> Workload + Send + Sync + 'static,
    {
        self.ensure_created()?;
        // Stop messages and departure notices use the silo's text encoding.
        if serializer.text_encoding() != self.serializer.text_encoding() {
            return Err(SiloError::TextEncodingMismatch {
                blueprint: name.to_string(),
                expected: self.serializer.text_encoding(),
                found: serializer.text_encoding(),
            });
        }
        Ok(self.factory.register_actor(name, in_route, out_route, serializer, make)?)
    }

    pub fn register_instance<I, F>(&mut self, name: &str, ctor: F) -> Result<(), SiloError>
    where
        I: ?Sized + Send + 'static,
        F: Fn(&[Arg]) -> Result<Box<I>, FactoryError> + Send + Sync + 'static,
    {
        self.ensure_created()?;
        Ok(self.factory.register_instance(name, ctor)?)
    }

    pub fn start(&mut self) -> Result<(), SiloError> {
        self.ensure_created()?;
        self.pipe.start()?;
        self.census_thread = Some(self.spawn_census()?);
        let started = self.factory.start_all_actors()?;
        self.state = SiloState::Running;
        info!(silo = %self.config.name, actors = started.len(), "Silo started");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.state == SiloState::Running
    }

    /// Starts one more actor from a registered blueprint.
    pub fn activate(&self, blueprint: &str) -> Result<String, SiloError> {
        if self.state != SiloState::Running {
            return Err(SiloError::NotRunning);
        }
        Ok(self.factory.activate(blueprint)?)
    }

    pub fn factory(&self) -> &ActorFactory {
        &self.factory
    }

    pub fn pipe(&self) -> &BusPipe {
        &self.pipe
    }

    pub fn publisher(&self) -> Publisher {
        self.pipe.publisher()
    }

    /// A subscriber on the actors' side of the pipe.
    pub fn subscriber(&self) -> Result<Subscriber, SiloError> {
        Ok(self.pipe.subscriber()?)
    }

    pub fn scope(&self) -> Scope {
        Scope::new(self.pipe.inbound().clone(), self.serializer, self.callbacks.clone())
    }

    pub fn callbacks(&self) -> &Callbacks {
        &self.callbacks
    }

    /// Sends `"stop"` to every actor whose address matches `address`.
    pub fn send_stop(&self, address: &str) -> Result<(), SiloError> {
        Ok(self.publisher().send_multipart(encode_stop(address, &self.serializer))?)
    }

    /// Actors activated and not yet departed.
    pub fn live_actors(&self) -> usize {
        self.census.live()
    }

    /// Waits for every live actor to publish its departure.
    pub fn await_departures(&self, timeout: Duration) -> bool {
        self.census.wait_for_zero(timeout)
    }

    /// The receiving end of workload faults. Can be taken once.
    pub fn take_faults(&mut self) -> Option<mpsc::UnboundedReceiver<Fault>> {
        self.faults.take()
    }

    pub fn monitor(&self) -> Option<&MonitorEndpoint> {
        self.monitor.as_ref()
    }

    /// Closes the pipe and joins the relay, census and actor threads.
    pub fn stop(&mut self) -> Vec<(String, ActorExit)> {
        if self.state == SiloState::Stopped {
            return Vec::new();
        }
        self.pipe.close();
        if let Some(census) = self.census_thread.take() {
            if census.join().is_err() {
                warn!(silo = %self.config.name, "Census thread panicked");
            }
        }
        let exits = self.factory.join_all();
        self.state = SiloState::Stopped;
        info!(silo = %self.config.name, actors = exits.len(), "Silo stopped");
        exits
    }

    fn ensure_created(&self) -> Result<(), SiloError> {
        match self.state {
            SiloState::Created => Ok(()),
            SiloState::Running => Err(SiloError::AlreadyStarted),
            SiloState::Stopped => Err(SiloError::NotRunning),
        }
    }

    fn spawn_census(&self) -> Result<JoinHandle<()>, SiloError> {
        let serializer = self.serializer;
        let mut departures = self.pipe.subscriber()?;
        departures.subscribe_to_prefix(serializer.encode_string(&self.config.departure_address));
        let census = Arc::clone(&self.census);
        let name = format!("census:{}", self.config.name);

        std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                while let Some(frames) = departures.recv_message() {
                    match decode_message(&frames, &serializer) {
                        Ok(Decoded::Message(envelope))
                            if envelope.message_type.as_deref() == Some(DEPARTED_MESSAGE) =>
                        {
                            let actor = envelope
                                .body
                                .first()
                                .and_then(|frame| serializer.decode_string(frame).ok())
                                .unwrap_or_default();
                            census.depart();
                            debug!(actor = %actor, live = census.live(), "Departed");
                        }
                        _ => debug!("Ignored message on departure address"),
                    }
                }
            })
            .map_err(|e| {
                SiloError::Bus(BusError::Spawn {
                    name,
                    reason: e.to_string(),
                })
            })
    }
}

impl Drop for Silo {
    fn drop(&mut self) {
        self.stop();
    }
}
