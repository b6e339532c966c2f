//! # In-Process Transport
//!
//! The publish/subscribe channel the core is written against. An [`Endpoint`]
//! is one bound socket address: any number of [`Publisher`]s push multi-frame
//! messages into it and every live [`Subscriber`] receives a copy.
//!
//! Frames of one logical message are buffered by the publisher until the last
//! frame (`more == false`) and then delivered to each subscriber in one piece,
//! so frames of concurrent publishers never interleave. Subscription filtering
//! is done by the subscriber, on the first frame, by byte prefix.
//!
//! Receiving blocks the calling thread; actors and the pipe relay each own a
//! dedicated OS thread, so nothing here needs a shared async runtime. Timed
//! receives build a private timer for the duration of the wait.

use crate::error::BusError;
use crate::message::Frame;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, trace};

type Delivery = mpsc::UnboundedSender<Vec<Frame>>;

struct Shared {
    name: String,
    /// `None` once the endpoint is closed.
    subscribers: Mutex<Option<Vec<Delivery>>>,
}

/// A bound broadcast address.
#[derive(Clone)]
pub struct Endpoint {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.shared.name)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl Endpoint {
    pub fn bind(name: impl Into<String>) -> Self {
        let name = name.into();
        debug!(endpoint = %name, "Bound");
        Self {
            shared: Arc::new(Shared {
                name,
                subscribers: Mutex::new(Some(Vec::new())),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Connects a new publisher.
    pub fn publisher(&self) -> Publisher {
        Publisher {
            endpoint: self.clone(),
            pending: Vec::new(),
        }
    }

    /// Connects a new subscriber with no subscriptions yet.
    pub fn subscriber(&self) -> Result<Subscriber, BusError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        match self.shared.subscribers.lock().as_mut() {
            Some(subscribers) => subscribers.push(sender),
            None => return Err(BusError::Closed(self.shared.name.clone())),
        }
        Ok(Subscriber {
            endpoint: self.shared.name.clone(),
            receiver,
            prefixes: Vec::new(),
            current: VecDeque::new(),
        })
    }

    /// Closes the endpoint. Pending publishes fail with
    /// [`BusError::ChannelDisposed`]; subscribers see end-of-stream once they
    /// have consumed what was already delivered.
    pub fn close(&self) {
        if self.shared.subscribers.lock().take().is_some() {
            debug!(endpoint = %self.shared.name, "Closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.subscribers.lock().is_none()
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared
            .subscribers
            .lock()
            .as_ref()
            .map_or(0, |subscribers| subscribers.len())
    }

    fn deliver(&self, message: Vec<Frame>) -> Result<usize, BusError> {
        let mut guard = self.shared.subscribers.lock();
        let subscribers = guard
            .as_mut()
            .ok_or_else(|| BusError::ChannelDisposed(self.shared.name.clone()))?;
        // Subscribers that went away are pruned here.
        subscribers.retain(|subscriber| subscriber.send(message.clone()).is_ok());
        trace!(endpoint = %self.shared.name, frames = message.len(), receivers = subscribers.len(), "Delivered");
        Ok(subscribers.len())
    }
}

/// The sending half of a connection to an [`Endpoint`].
pub struct Publisher {
    endpoint: Endpoint,
    pending: Vec<Frame>,
}

impl Clone for Publisher {
    /// The clone is a fresh connection: frames buffered by `self` stay with `self`.
    fn clone(&self) -> Self {
        self.endpoint.publisher()
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("endpoint", &self.endpoint.name())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl Publisher {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Sends one frame. `more` tells whether further frames of the same
    /// message follow; the message is delivered when the last frame arrives.
    pub fn send(&mut self, frame: impl Into<Frame>, more: bool) -> Result<(), BusError> {
        self.pending.push(frame.into());
        if more {
            return Ok(());
        }
        let message = std::mem::take(&mut self.pending);
        self.endpoint.deliver(message).map(|_| ())
    }

    /// Sends a whole message.
    pub fn send_multipart<I>(&mut self, frames: I) -> Result<(), BusError>
    where
        I: IntoIterator,
        I::Item: Into<Frame>,
    {
        let mut frames = frames.into_iter().peekable();
        while let Some(frame) = frames.next() {
            let more = frames.peek().is_some();
            self.send(frame, more)?;
        }
        Ok(())
    }
}

/// The receiving half of a connection to an [`Endpoint`].
pub struct Subscriber {
    endpoint: String,
    receiver: mpsc::UnboundedReceiver<Vec<Frame>>,
    prefixes: Vec<Frame>,
    current: VecDeque<Frame>,
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("endpoint", &self.endpoint)
            .field("prefixes", &self.prefixes.len())
            .finish()
    }
}

impl Subscriber {
    /// Receives messages whose first frame starts with `prefix`.
    pub fn subscribe_to_prefix(&mut self, prefix: impl AsRef<[u8]>) {
        self.prefixes.push(Frame::copy_from_slice(prefix.as_ref()));
    }

    /// Receives every message.
    pub fn subscribe_all(&mut self) {
        self.prefixes.push(Frame::new());
    }

    fn matches(&self, message: &[Frame]) -> bool {
        let first = message.first().map(|frame| &frame[..]).unwrap_or_default();
        self.prefixes.iter().any(|prefix| first.starts_with(prefix))
    }

    /// Blocks for the next frame. Returns the frame and whether more frames
    /// of the same message follow, or `None` once the endpoint is closed.
    pub fn recv_frame(&mut self) -> Option<(Frame, bool)> {
        while self.current.is_empty() {
            let message = self.receiver.blocking_recv()?;
            if self.matches(&message) {
                self.current = message.into();
            }
        }
        let frame = self.current.pop_front()?;
        Some((frame, !self.current.is_empty()))
    }

    /// Whether frames of the current message are still unread.
    pub fn has_more(&self) -> bool {
        !self.current.is_empty()
    }

    /// Discards the unread frames of the current message.
    pub fn drain(&mut self) -> usize {
        let drained = self.current.len();
        self.current.clear();
        drained
    }

    /// Blocks for the rest of the current message, or the next whole one.
    pub fn recv_message(&mut self) -> Option<Vec<Frame>> {
        let mut frames = Vec::new();
        loop {
            let (frame, more) = self.recv_frame()?;
            frames.push(frame);
            if !more {
                return Some(frames);
            }
        }
    }

    /// Returns the next matching message without blocking.
    pub fn try_recv_message(&mut self) -> Result<Option<Vec<Frame>>, BusError> {
        if self.has_more() {
            return Ok(Some(self.current.drain(..).collect()));
        }
        loop {
            match self.receiver.try_recv() {
                Ok(message) if self.matches(&message) => return Ok(Some(message)),
                Ok(_) => continue,
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => {
                    return Err(BusError::Closed(self.endpoint.clone()))
                }
            }
        }
    }

    /// Blocks for the next matching message until `timeout` elapses.
    ///
    /// Waits on a private current-thread timer, so like the other blocking
    /// receives it must not be called from async code.
    pub fn recv_message_timeout(&mut self, timeout: Duration) -> Result<Option<Vec<Frame>>, BusError> {
        if let Some(message) = self.try_recv_message()? {
            return Ok(Some(message));
        }
        let deadline = Instant::now() + timeout;
        let timer = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| BusError::Spawn {
                name: format!("{}:timer", self.endpoint),
                reason: e.to_string(),
            })?;
        timer.block_on(async {
            loop {
                match tokio::time::timeout_at(deadline, self.receiver.recv()).await {
                    Ok(Some(message)) if self.matches(&message) => return Ok(Some(message)),
                    Ok(Some(_)) => continue,
                    Ok(None) => return Err(BusError::Closed(self.endpoint.clone())),
                    Err(_) => return Ok(None),
                }
            }
        })
    }
}
