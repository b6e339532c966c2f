//! # Actor Receive Loop
//!
//! An [`Actor`] owns one subscriber on the pipe's outbound side and one
//! publisher on its inbound side. It handles one message at a time:
//!
//! 1. **Receiving**: block for the first frame.
//! 2. **Decoding**: walk the frames by position with
//!    [`decode_frame_at`]. A stop or a decode error ends decoding, and the rest
//!    of the message is drained before the next wait.
//! 3. **Dispatching**: run the workload once for a cleanly decoded, non-stop
//!    message.
//!
//! A `"stop"` message flips the running flag, publishes a departure notice for
//! the host's census and ends the loop. Closing the pipe ends it too, without a
//! departure.
//!
//! Workload errors are logged and sent to the fault listener; the actor keeps
//! running. A panic in a workload is not caught: it takes the actor's thread
//! down and [`ActorHandle::join`] reports [`ActorExit::Panicked`].

use crate::callback::{token_arg, Callbacks, Completion};
use crate::error::{BusError, CodecError, DecodeFailure, WorkloadError};
use crate::factory::InstanceRegistry;
use crate::frame::{decode_frame_at, encode_departure, DecodeState, FrameSignal};
use crate::message::{Envelope, DEPARTURE_ADDRESS};
use crate::monitor::{Monitor, EXITING, RECEIVED, WAITING};
use crate::serializer::Serializer;
use crate::transport::{Publisher, Subscriber};
use crate::workload::{ActorContext, Workload, WorkloadResult};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A workload failure, as seen by the fault listener.
#[derive(Debug, Clone)]
pub struct Fault {
    pub actor: String,
    pub address: String,
    pub completion: Completion,
}

#[derive(Debug, Clone)]
pub struct ActorConfig {
    pub id: String,
    /// Subscription prefix. Empty receives everything.
    pub address: String,
    pub out_route: String,
    pub serializer: Serializer,
    pub departure_address: String,
}

impl ActorConfig {
    pub fn new(id: impl Into<String>, address: impl Into<String>, out_route: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            out_route: out_route.into(),
            serializer: Serializer::default(),
            departure_address: DEPARTURE_ADDRESS.to_string(),
        }
    }

    pub fn with_serializer(mut self, serializer: Serializer) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn with_departure_address(mut self, address: impl Into<String>) -> Self {
        self.departure_address = address.into();
        self
    }
}

/// How an actor's loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorExit {
    /// A stop message arrived.
    Stopped,
    /// The pipe was closed underneath the actor.
    Closed,
    /// A workload panicked.
    Panicked(String),
}

pub struct Actor {
    ctx: ActorContext,
    workload: Workload,
    subscriber: Subscriber,
    departure_address: String,
    monitor: Monitor,
    faults: Option<mpsc::UnboundedSender<Fault>>,
    dispatched: u64,
}

impl std::fmt::Debug for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actor")
            .field("id", &self.ctx.id())
            .field("address", &self.ctx.address())
            .field("workload", &self.workload)
            .field("running", &self.ctx.is_running())
            .finish()
    }
}

impl Actor {
    /// Wires an actor. `subscriber` is subscribed to `config.address` here.
    pub fn new(config: ActorConfig, workload: Workload, mut subscriber: Subscriber, output: Publisher) -> Self {
        subscriber.subscribe_to_prefix(config.serializer.encode_string(&config.address));
        let ctx = ActorContext::new(
            config.id,
            config.address,
            config.out_route,
            config.serializer,
            output,
        );
        Self {
            ctx,
            workload,
            subscriber,
            departure_address: config.departure_address,
            monitor: Monitor::tracing_only(),
            faults: None,
            dispatched: 0,
        }
    }

    pub fn with_monitor(mut self, monitor: Monitor) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_fault_listener(mut self, faults: mpsc::UnboundedSender<Fault>) -> Self {
        self.faults = Some(faults);
        self
    }

    pub fn with_callbacks(mut self, callbacks: Callbacks) -> Self {
        self.ctx.set_callbacks(callbacks);
        self
    }

    pub fn with_instances(mut self, instances: Arc<InstanceRegistry>) -> Self {
        self.ctx.set_instances(instances);
        self
    }

    pub fn id(&self) -> &str {
        self.ctx.id()
    }

    pub fn is_running(&self) -> bool {
        self.ctx.is_running()
    }

    pub fn context(&self) -> &ActorContext {
        &self.ctx
    }

    /// Number of workload invocations so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Runs the receive loop on the current thread until stop or close.
    pub fn run(&mut self) -> ActorExit {
        self.ctx.set_running(true);
        info!(actor = %self.ctx.id(), address = %self.ctx.address(), "Actor started");

        let exit = loop {
            self.monitor.report(self.ctx.id(), WAITING);
            let Some((first, more)) = self.subscriber.recv_frame() else {
                break ActorExit::Closed;
            };
            self.monitor.report(self.ctx.id(), RECEIVED);

            match self.decode(first, more) {
                Ok(Step::Stop) => {
                    self.on_stop();
                    break ActorExit::Stopped;
                }
                Ok(Step::Dispatch(envelope)) => self.dispatch(envelope),
                Err(failure) => {
                    warn!(actor = %self.ctx.id(), index = failure.index, error = %failure.source, "Decode failed");
                    self.monitor.report(
                        self.ctx.id(),
                        &format!("decode failure at frame {}: {}", failure.index, failure.source),
                    );
                }
            }
        };

        self.ctx.set_running(false);
        self.monitor.report(self.ctx.id(), EXITING);
        info!(actor = %self.ctx.id(), exit = ?exit, dispatched = self.dispatched, "Actor exiting");
        exit
    }

    /// Runs the loop on a new named thread.
    pub fn spawn(mut self) -> Result<ActorHandle, BusError> {
        let id = self.ctx.id().to_string();
        let thread = std::thread::Builder::new()
            .name(format!("actor:{id}"))
            .spawn(move || self.run())
            .map_err(|e| BusError::Spawn {
                name: id.clone(),
                reason: e.to_string(),
            })?;
        Ok(ActorHandle { id, thread })
    }

    fn decode(&mut self, first: crate::message::Frame, mut more: bool) -> Result<Step, DecodeFailure> {
        let serializer = *self.ctx.serializer();
        let mut state = DecodeState::new();
        let mut index = 0;
        let mut frame = first;
        loop {
            match decode_frame_at(index, &frame, &mut state, &serializer) {
                Ok(FrameSignal::Continue) => {}
                Ok(FrameSignal::Stop) => {
                    self.drain(index);
                    return Ok(Step::Stop);
                }
                Err(source) => {
                    self.drain(index);
                    self.fail_call(state.callback_token(), &source);
                    return Err(DecodeFailure { index, source });
                }
            }
            if !more {
                break;
            }
            match self.subscriber.recv_frame() {
                Some((next, next_more)) => {
                    frame = next;
                    more = next_more;
                    index += 1;
                }
                None => break,
            }
        }
        let token = state.callback_token();
        let envelope = match state.finish() {
            Ok(envelope) => envelope,
            Err(source) => {
                self.fail_call(token, &source);
                return Err(DecodeFailure { index: index + 1, source });
            }
        };

        if let Workload::Payload(payload) = &mut self.workload {
            payload
                .decode(&envelope.kind, &serializer)
                .map_err(|source| DecodeFailure { index: 1, source })?;
        }
        Ok(Step::Dispatch(envelope))
    }

    fn drain(&mut self, index: usize) {
        let drained = self.subscriber.drain();
        if drained > 0 {
            debug!(actor = %self.ctx.id(), index, drained, "Drained remaining frames");
        }
    }

    fn dispatch(&mut self, envelope: Envelope) {
        self.dispatched += 1;
        let mut token = None;
        let result: WorkloadResult = match &mut self.workload {
            Workload::Payload(payload) => payload.dispatch(&envelope.kind, &envelope.address, &mut self.ctx),
            Workload::Route(route) => route(&envelope, &mut self.ctx),
            Workload::Invoke(invoke) => match envelope.invocation {
                Some(invocation) => {
                    token = token_arg(&invocation.args);
                    invoke(&envelope.address, &invocation.handle, invocation.args, &mut self.ctx)
                }
                None => Err(WorkloadError::Codec(CodecError::NotAnInvocation(
                    envelope.message_type.clone().unwrap_or_default(),
                ))),
            },
        };

        if let Err(error) = result {
            warn!(actor = %self.ctx.id(), address = %envelope.address, error = %error, "Workload failed");
            self.fail_call(token, &error);
            if let Some(faults) = &self.faults {
                let fault = Fault {
                    actor: self.ctx.id().to_string(),
                    address: envelope.address,
                    completion: Completion::fault(&error),
                };
                if faults.send(fault).is_err() {
                    debug!(actor = %self.ctx.id(), "Fault listener gone");
                }
            }
        }
    }

    /// Completes a still-pending caller with a fault.
    fn fail_call(&self, token: Option<u64>, error: &dyn std::fmt::Display) {
        if let Some(token) = token {
            if self.ctx.complete_if_pending(token, Completion::fault(error)) {
                debug!(actor = %self.ctx.id(), token, "Completed caller with fault");
            }
        }
    }

    fn on_stop(&mut self) {
        self.ctx.set_running(false);
        let frames = encode_departure(&self.departure_address, self.ctx.id(), self.ctx.serializer());
        if let Err(e) = self.ctx.publish_frames(frames) {
            debug!(actor = %self.ctx.id(), error = %e, "Departure not published");
        }
    }
}

enum Step {
    Stop,
    Dispatch(Envelope),
}

/// The host's handle on a running actor thread.
#[derive(Debug)]
pub struct ActorHandle {
    id: String,
    thread: JoinHandle<ActorExit>,
}

impl ActorHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn join(self) -> ActorExit {
        match self.thread.join() {
            Ok(exit) => exit,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!(actor = %self.id, reason = %reason, "Actor thread panicked");
                ActorExit::Panicked(reason)
            }
        }
    }
}
