//! # Bus Pipe
//!
//! The relay every silo routes through. Producers publish on the inbound
//! endpoint; actors subscribe on the outbound endpoint; one relay thread
//! copies each frame across verbatim, keeping its `more` flag, without
//! looking at it.
//!
//! Actors are stopped with a `"stop"` message. The pipe is not: it has no
//! control frame of its own and runs until [`BusPipe::close`] tears down both
//! endpoints.
//!
//! Messages published before [`BusPipe::start`] are not relayed.

use crate::config::PipeConfig;
use crate::error::BusError;
use crate::transport::{Endpoint, Publisher, Subscriber};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct RelayStats {
    messages: AtomicU64,
    frames: AtomicU64,
}

#[derive(Debug)]
pub struct BusPipe {
    inbound: Endpoint,
    outbound: Endpoint,
    relay: Option<JoinHandle<()>>,
    stats: Arc<RelayStats>,
}

impl BusPipe {
    pub fn bind(config: &PipeConfig) -> Self {
        Self {
            inbound: Endpoint::bind(&config.inbound),
            outbound: Endpoint::bind(&config.outbound),
            relay: None,
            stats: Arc::default(),
        }
    }

    pub fn inbound(&self) -> &Endpoint {
        &self.inbound
    }

    pub fn outbound(&self) -> &Endpoint {
        &self.outbound
    }

    /// A publisher connected to the inbound side.
    pub fn publisher(&self) -> Publisher {
        self.inbound.publisher()
    }

    /// A subscriber connected to the outbound side.
    pub fn subscriber(&self) -> Result<Subscriber, BusError> {
        self.outbound.subscriber()
    }

    /// Starts the relay thread. Calling it again while running is a no-op.
    pub fn start(&mut self) -> Result<(), BusError> {
        if self.relay.is_some() {
            return Ok(());
        }
        let mut inbound = self.inbound.subscriber()?;
        inbound.subscribe_all();
        let outbound = self.outbound.publisher();
        let stats = Arc::clone(&self.stats);
        let name = format!("pipe:{}", self.inbound.name());

        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || relay(inbound, outbound, stats))
            .map_err(|e| BusError::Spawn {
                name,
                reason: e.to_string(),
            })?;
        self.relay = Some(handle);
        info!(inbound = %self.inbound.name(), outbound = %self.outbound.name(), "Pipe started");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.relay.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    pub fn messages_relayed(&self) -> u64 {
        self.stats.messages.load(Ordering::Relaxed)
    }

    pub fn frames_relayed(&self) -> u64 {
        self.stats.frames.load(Ordering::Relaxed)
    }

    /// Closes both endpoints and waits for the relay thread.
    pub fn close(&mut self) {
        self.inbound.close();
        self.outbound.close();
        if let Some(handle) = self.relay.take() {
            if handle.join().is_err() {
                warn!(inbound = %self.inbound.name(), "Relay thread panicked");
            }
            info!(
                messages = self.messages_relayed(),
                frames = self.frames_relayed(),
                "Pipe closed"
            );
        }
    }
}

impl Drop for BusPipe {
    fn drop(&mut self) {
        self.close();
    }
}

fn relay(mut inbound: Subscriber, mut outbound: Publisher, stats: Arc<RelayStats>) {
    debug!("Relay running");
    while let Some((frame, more)) = inbound.recv_frame() {
        stats.frames.fetch_add(1, Ordering::Relaxed);
        if !more {
            stats.messages.fetch_add(1, Ordering::Relaxed);
        }
        if let Err(e) = outbound.send(frame, more) {
            debug!(error = %e, "Outbound side gone");
            break;
        }
    }
    debug!("Relay exiting");
}
