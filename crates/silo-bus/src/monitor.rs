//! # Monitor Side Channel
//!
//! Actors report their progress (`waiting for message`, `received message`,
//! `exiting actor`, decode failures) as request/reply exchanges with a monitor
//! endpoint: each line is sent with a oneshot reply slot and the actor waits
//! for the `"ack"` before it goes on.
//!
//! If the endpoint has gone away the actor logs a warning and keeps going;
//! a dead monitor never wedges an actor.

use crate::error::BusError;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

pub const ACK: &str = "ack";

pub const WAITING: &str = "waiting for message";
pub const RECEIVED: &str = "received message";
pub const EXITING: &str = "exiting actor";

#[derive(Debug)]
struct MonitorRequest {
    line: String,
    respond_to: oneshot::Sender<String>,
}

/// The actor-side handle. Cheap to clone; one per actor.
#[derive(Debug, Clone, Default)]
pub struct Monitor {
    sender: Option<mpsc::UnboundedSender<MonitorRequest>>,
}

impl Monitor {
    /// Status lines only go to `tracing`.
    pub fn tracing_only() -> Self {
        Self { sender: None }
    }

    /// Reports `line` for `actor` and blocks until the endpoint acknowledges it.
    ///
    /// Must be called from a plain thread, not from inside an async runtime.
    pub fn report(&self, actor: &str, line: &str) {
        debug!(actor = %actor, "{line}");
        let Some(sender) = &self.sender else {
            return;
        };
        let (respond_to, reply) = oneshot::channel();
        let request = MonitorRequest {
            line: format!("{actor}: {line}"),
            respond_to,
        };
        if sender.send(request).is_err() {
            warn!(actor = %actor, "Monitor endpoint gone, continuing without it");
            return;
        }
        if reply.blocking_recv().is_err() {
            warn!(actor = %actor, "Monitor endpoint dropped the request");
        }
    }
}

/// The endpoint thread that acknowledges status lines and keeps them.
#[derive(Debug)]
pub struct MonitorEndpoint {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MonitorEndpoint {
    /// Starts the endpoint. It runs until every [`Monitor`] clone is dropped.
    pub fn spawn() -> Result<(Monitor, MonitorEndpoint), BusError> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<MonitorRequest>();
        let lines = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&lines);

        std::thread::Builder::new()
            .name("monitor".to_string())
            .spawn(move || {
                while let Some(request) = receiver.blocking_recv() {
                    info!(line = %request.line, "Monitor");
                    recorded.lock().push(request.line);
                    let _ = request.respond_to.send(ACK.to_string());
                }
                debug!("Monitor endpoint exiting");
            })
            .map_err(|e| BusError::Spawn {
                name: "monitor".to_string(),
                reason: e.to_string(),
            })?;

        Ok((
            Monitor {
                sender: Some(sender),
            },
            MonitorEndpoint { lines },
        ))
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Lines reported by `actor`, without the actor prefix.
    pub fn lines_for(&self, actor: &str) -> Vec<String> {
        let prefix = format!("{actor}: ");
        self.lines
            .lock()
            .iter()
            .filter_map(|line| line.strip_prefix(&prefix).map(str::to_owned))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_are_acknowledged_in_order() {
        let (monitor, endpoint) = MonitorEndpoint::spawn().unwrap();
        monitor.report("echo#1", WAITING);
        monitor.report("echo#1", RECEIVED);
        monitor.report("other#1", EXITING);

        // `report` returns only after the ack, so the lines are already recorded.
        assert_eq!(endpoint.lines_for("echo#1"), vec![WAITING, RECEIVED]);
        assert_eq!(endpoint.lines().len(), 3);
    }

    #[test]
    fn test_tracing_only_never_blocks() {
        Monitor::tracing_only().report("a#1", WAITING);
        Monitor::default().report("a#1", EXITING);
    }
}
