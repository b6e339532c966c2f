//! # Callbacks and Scope
//!
//! How a caller outside the silo gets a result back from an actor. The caller
//! registers a listener and gets a token; the token travels as the last
//! argument of the invocation; the actor completes the token when it is done.
//!
//! [`Scope`] wraps the three steps into one `call`.

use crate::error::BusError;
use crate::frame::encode_invocation;
use crate::message::{Arg, MethodHandle};
use crate::serializer::Serializer;
use crate::transport::Endpoint;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Success,
    /// The workload failed.
    Fault,
    /// The request never reached the bus.
    Disposed,
}

/// The `(resultCode, payload, error)` triple delivered to a listener.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub code: ResultCode,
    pub payload: Vec<Arg>,
    pub error: Option<String>,
}

impl Completion {
    pub fn success(payload: Vec<Arg>) -> Self {
        Self {
            code: ResultCode::Success,
            payload,
            error: None,
        }
    }

    pub fn fault(error: impl ToString) -> Self {
        Self {
            code: ResultCode::Fault,
            payload: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn disposed(error: &BusError) -> Self {
        Self {
            code: ResultCode::Disposed,
            payload: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == ResultCode::Success
    }

    pub fn into_result(self) -> Result<Vec<Arg>, String> {
        match self.code {
            ResultCode::Success => Ok(self.payload),
            code => Err(self.error.unwrap_or_else(|| format!("{code:?}"))),
        }
    }
}

#[derive(Debug, Default)]
struct Table {
    next: AtomicU64,
    pending: Mutex<HashMap<u64, oneshot::Sender<Completion>>>,
}

/// Listener registry shared by callers and actors.
#[derive(Debug, Clone, Default)]
pub struct Callbacks {
    table: Arc<Table>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self) -> (u64, oneshot::Receiver<Completion>) {
        let token = self.table.next.fetch_add(1, Ordering::Relaxed) + 1;
        let (sender, receiver) = oneshot::channel();
        self.table.pending.lock().insert(token, sender);
        (token, receiver)
    }

    /// Delivers `completion` to the listener of `token`. Returns false if the
    /// token is unknown, already completed, or its listener went away.
    pub fn complete(&self, token: u64, completion: Completion) -> bool {
        let Some(sender) = self.table.pending.lock().remove(&token) else {
            warn!(token, "Completion for unknown token");
            return false;
        };
        debug!(token, code = ?completion.code, "Completing");
        sender.send(completion).is_ok()
    }

    /// Like [`complete`](Self::complete), but quiet when the token is already gone.
    pub fn complete_if_pending(&self, token: u64, completion: Completion) -> bool {
        let Some(sender) = self.table.pending.lock().remove(&token) else {
            return false;
        };
        sender.send(completion).is_ok()
    }

    pub fn pending(&self) -> usize {
        self.table.pending.lock().len()
    }
}

/// Reads the callback token a [`Scope`] appends as the last argument.
pub fn token_arg(args: &[Arg]) -> Option<u64> {
    args.last()
        .and_then(Arg::as_i64)
        .and_then(|token| u64::try_from(token).ok())
}

/// A caller's view of the silo: publish invocations, await completions.
#[derive(Debug, Clone)]
pub struct Scope {
    inbound: Endpoint,
    serializer: Serializer,
    callbacks: Callbacks,
}

impl Scope {
    pub fn new(inbound: Endpoint, serializer: Serializer, callbacks: Callbacks) -> Self {
        Self {
            inbound,
            serializer,
            callbacks,
        }
    }

    pub fn callbacks(&self) -> &Callbacks {
        &self.callbacks
    }

    pub fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    /// Publishes `handle(args..., token)` to `address`.
    ///
    /// Never fails: if the invocation cannot be encoded or the pipe is
    /// already disposed, the returned receiver holds the failed completion.
    pub fn call(
        &self,
        address: &str,
        handle: &MethodHandle,
        mut args: Vec<Arg>,
    ) -> oneshot::Receiver<Completion> {
        let (token, receiver) = self.callbacks.register();
        args.push(Arg::Int(token as i64));

        let frames = match encode_invocation(address, handle, &args, &self.serializer) {
            Ok(frames) => frames,
            Err(e) => {
                self.callbacks.complete(token, Completion::fault(e));
                return receiver;
            }
        };
        if let Err(e) = self.inbound.publisher().send_multipart(frames) {
            debug!(address = %address, handle = %handle, error = %e, "Call not published");
            self.callbacks.complete(token, Completion::disposed(&e));
        }
        receiver
    }
}
