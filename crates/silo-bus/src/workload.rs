//! # Workloads
//!
//! The handler an actor runs for each decoded message. There are exactly three
//! shapes, and an actor carries one of them:
//!
//! | shape | handler receives |
//! |---|---|
//! | [`Workload::Payload`] | decoded payload, raw bytes, address, context |
//! | [`Workload::Route`] | the whole envelope, context (address, out route, output channel) |
//! | [`Workload::Invoke`] | address, method handle, argument list, context |
//!
//! Payload workloads decode in a separate step before dispatch, so a payload
//! that does not decode counts as a decode failure, not as a workload fault.

use crate::callback::{Callbacks, Completion};
use crate::error::{BusError, CodecError, FactoryError, WorkloadError};
use crate::factory::InstanceRegistry;
use crate::frame::{encode_invocation, encode_simple_message, encode_stop, encode_typed_message};
use crate::message::{Arg, Envelope, Frame, MethodHandle};
use crate::operation::OperationRegistry;
use crate::serializer::Serializer;
use crate::transport::Publisher;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

pub type WorkloadResult = Result<(), WorkloadError>;

pub type RouteFn = Box<dyn FnMut(&Envelope, &mut ActorContext) -> WorkloadResult + Send>;

pub type InvokeFn =
    Box<dyn FnMut(&str, &MethodHandle, Vec<Arg>, &mut ActorContext) -> WorkloadResult + Send>;

/// A payload handler: decode first, dispatch second.
pub trait PayloadWorkload: Send {
    fn decode(&mut self, raw: &Frame, serializer: &Serializer) -> Result<(), CodecError>;

    fn dispatch(&mut self, raw: &Frame, address: &str, ctx: &mut ActorContext) -> WorkloadResult;
}

pub enum Workload {
    Payload(Box<dyn PayloadWorkload>),
    Route(RouteFn),
    Invoke(InvokeFn),
}

impl std::fmt::Debug for Workload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shape = match self {
            Workload::Payload(_) => "Payload",
            Workload::Route(_) => "Route",
            Workload::Invoke(_) => "Invoke",
        };
        f.write_str(shape)
    }
}

impl Workload {
    /// Payload workload over the message text.
    pub fn text<F>(handler: F) -> Self
    where
        F: FnMut(String, &Frame, &str, &mut ActorContext) -> WorkloadResult + Send + 'static,
    {
        Workload::Payload(Box::new(TextWorkload {
            handler,
            pending: None,
        }))
    }

    /// Payload workload over a serializer-decoded `T`.
    pub fn typed<T, F>(handler: F) -> Self
    where
        T: DeserializeOwned + Send + 'static,
        F: FnMut(T, &Frame, &str, &mut ActorContext) -> WorkloadResult + Send + 'static,
    {
        Workload::Payload(Box::new(TypedWorkload {
            handler,
            pending: None,
            _payload: PhantomData,
        }))
    }

    pub fn route<F>(handler: F) -> Self
    where
        F: FnMut(&Envelope, &mut ActorContext) -> WorkloadResult + Send + 'static,
    {
        Workload::Route(Box::new(handler))
    }

    pub fn invoke<F>(handler: F) -> Self
    where
        F: FnMut(&str, &MethodHandle, Vec<Arg>, &mut ActorContext) -> WorkloadResult + Send + 'static,
    {
        Workload::Invoke(Box::new(handler))
    }

    /// Invocation workload that resolves handles through `operations`.
    pub fn dispatch(mut operations: OperationRegistry) -> Self {
        Workload::invoke(move |address, handle, args, ctx| operations.call(address, handle, args, ctx))
    }
}

struct TextWorkload<F> {
    handler: F,
    pending: Option<String>,
}

impl<F> PayloadWorkload for TextWorkload<F>
where
    F: FnMut(String, &Frame, &str, &mut ActorContext) -> WorkloadResult + Send,
{
    fn decode(&mut self, raw: &Frame, serializer: &Serializer) -> Result<(), CodecError> {
        self.pending = Some(serializer.decode_string(raw)?);
        Ok(())
    }

    fn dispatch(&mut self, raw: &Frame, address: &str, ctx: &mut ActorContext) -> WorkloadResult {
        let text = self
            .pending
            .take()
            .ok_or_else(|| WorkloadError::Failed("dispatch without decoded payload".into()))?;
        (self.handler)(text, raw, address, ctx)
    }
}

struct TypedWorkload<T, F> {
    handler: F,
    pending: Option<T>,
    _payload: PhantomData<fn() -> T>,
}

impl<T, F> PayloadWorkload for TypedWorkload<T, F>
where
    T: DeserializeOwned + Send,
    F: FnMut(T, &Frame, &str, &mut ActorContext) -> WorkloadResult + Send,
{
    fn decode(&mut self, raw: &Frame, serializer: &Serializer) -> Result<(), CodecError> {
        self.pending = Some(serializer.decode(raw)?);
        Ok(())
    }

    fn dispatch(&mut self, raw: &Frame, address: &str, ctx: &mut ActorContext) -> WorkloadResult {
        let payload = self
            .pending
            .take()
            .ok_or_else(|| WorkloadError::Failed("dispatch without decoded payload".into()))?;
        (self.handler)(payload, raw, address, ctx)
    }
}

/// String-keyed per-actor state. Only the owning actor's thread touches it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyBag {
    values: HashMap<String, Value>,
}

impl PropertyBag {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Adds one to an integer property (missing counts as zero).
    pub fn increment(&mut self, key: &str) -> i64 {
        let next = self.values.get(key).and_then(Value::as_i64).unwrap_or(0) + 1;
        self.values.insert(key.to_string(), Value::from(next));
        next
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Everything a workload can reach while it handles a message.
#[derive(Debug)]
pub struct ActorContext {
    id: String,
    address: String,
    out_route: String,
    serializer: Serializer,
    properties: PropertyBag,
    output: Publisher,
    callbacks: Callbacks,
    instances: Arc<InstanceRegistry>,
    running: bool,
}

impl ActorContext {
    pub(crate) fn new(
        id: String,
        address: String,
        out_route: String,
        serializer: Serializer,
        output: Publisher,
    ) -> Self {
        Self {
            id,
            address,
            out_route,
            serializer,
            properties: PropertyBag::default(),
            output,
            callbacks: Callbacks::default(),
            instances: Arc::default(),
            running: false,
        }
    }

    pub(crate) fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub(crate) fn set_callbacks(&mut self, callbacks: Callbacks) {
        self.callbacks = callbacks;
    }

    pub(crate) fn set_instances(&mut self, instances: Arc<InstanceRegistry>) {
        self.instances = instances;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The subscription filter. Empty means every message.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn out_route(&self) -> &str {
        &self.out_route
    }

    pub fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertyBag {
        &mut self.properties
    }

    /// The output channel, connected to the pipe's inbound side.
    pub fn output(&mut self) -> &mut Publisher {
        &mut self.output
    }

    pub fn publish_frames<I>(&mut self, frames: I) -> Result<(), BusError>
    where
        I: IntoIterator,
        I::Item: Into<Frame>,
    {
        self.output.send_multipart(frames)
    }

    pub fn publish_text(&mut self, address: &str, text: &str) -> Result<(), BusError> {
        let frames = encode_simple_message(address, text, &self.serializer);
        self.output.send_multipart(frames)
    }

    /// Publishes `text` on this actor's out route.
    pub fn reply_text(&mut self, text: &str) -> Result<(), BusError> {
        let frames = encode_simple_message(&self.out_route, text, &self.serializer);
        self.output.send_multipart(frames)
    }

    pub fn publish_typed<T: Serialize + ?Sized>(
        &mut self,
        address: &str,
        payload: &T,
    ) -> Result<(), WorkloadError> {
        let frames = encode_typed_message(address, payload, &self.serializer)?;
        Ok(self.output.send_multipart(frames)?)
    }

    pub fn publish_invocation(
        &mut self,
        address: &str,
        handle: &MethodHandle,
        args: &[Arg],
    ) -> Result<(), WorkloadError> {
        let frames = encode_invocation(address, handle, args, &self.serializer)?;
        Ok(self.output.send_multipart(frames)?)
    }

    pub fn publish_stop(&mut self, address: &str) -> Result<(), BusError> {
        let frames = encode_stop(address, &self.serializer);
        self.output.send_multipart(frames)
    }

    /// Completes a caller's pending callback.
    pub fn complete(&self, token: u64, completion: Completion) -> bool {
        self.callbacks.complete(token, completion)
    }

    pub(crate) fn complete_if_pending(&self, token: u64, completion: Completion) -> bool {
        self.callbacks.complete_if_pending(token, completion)
    }

    /// Creates a local collaborator registered with the factory.
    pub fn create_instance<I: ?Sized + Send + 'static>(
        &self,
        name: &str,
        args: &[Arg],
    ) -> Result<Box<I>, FactoryError> {
        self.instances.create::<I>(name, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Endpoint;
    use bytes::Bytes;
    use serde::Deserialize;

    fn context(endpoint: &Endpoint) -> ActorContext {
        ActorContext::new(
            "test#1".into(),
            "in".into(),
            "out".into(),
            Serializer::json(),
            endpoint.publisher(),
        )
    }

    #[test]
    fn test_property_bag_increment() {
        let mut bag = PropertyBag::default();
        assert_eq!(bag.increment("count"), 1);
        assert_eq!(bag.increment("count"), 2);
        bag.set("name", "echo");
        assert_eq!(bag.get_as::<String>("name").as_deref(), Some("echo"));
        assert_eq!(bag.get_as::<i64>("count"), Some(2));
        assert_eq!(bag.len(), 2);
    }

    #[test]
    fn test_text_workload_decodes_before_dispatch() {
        let endpoint = Endpoint::bind("inproc://workload");
        let mut ctx = context(&endpoint);
        let mut seen = Vec::new();
        let raw = Bytes::from_static(b"hello");
        {
            let mut workload = TextWorkload {
                handler: |text: String, _: &Frame, address: &str, _: &mut ActorContext| {
                    seen.push(format!("{address}:{text}"));
                    Ok(())
                },
                pending: None,
            };
            // Without a decode there is nothing to dispatch.
            assert!(workload.dispatch(&raw, "a", &mut ctx).is_err());
            workload.decode(&raw, ctx.serializer()).unwrap();
            workload.dispatch(&raw, "a", &mut ctx).unwrap();
        }
        assert_eq!(seen, vec!["a:hello"]);
    }

    #[test]
    fn test_typed_workload_rejects_bad_payload() {
        #[derive(Debug, Deserialize)]
        struct Point {
            #[allow(dead_code)]
            x: i32,
        }
        let Workload::Payload(mut workload) =
            Workload::typed(|_: Point, _: &Frame, _: &str, _: &mut ActorContext| Ok(()))
        else {
            panic!("expected payload shape");
        };
        let err = workload
            .decode(&Bytes::from_static(b"not json"), &Serializer::json())
            .unwrap_err();
        assert!(matches!(err, CodecError::Json(_)));
    }

    #[test]
    fn test_reply_goes_to_out_route() {
        let endpoint = Endpoint::bind("inproc://reply");
        let mut subscriber = endpoint.subscriber().unwrap();
        subscriber.subscribe_to_prefix("out");
        let mut ctx = context(&endpoint);

        ctx.reply_text("pong").unwrap();
        let frames = subscriber.try_recv_message().unwrap().unwrap();
        assert_eq!(&frames[1][..], b"pong");
    }
}
