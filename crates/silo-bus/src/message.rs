//! # Messages
//!
//! Types that describe what travels over the bus: raw frames, the reserved
//! control values, invocation arguments and the decoded [`Envelope`] handed to
//! workloads.

use crate::error::CodecError;
use crate::serializer::Serializer;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One opaque byte buffer within a multi-part bus message.
pub type Frame = Bytes;

/// Reserved message type that terminates an actor's receive loop.
pub const STOP_MESSAGE: &str = "stop";

/// Message type marker of the method-invocation variant.
pub const INVOKE_MESSAGE: &str = "invoke";

/// Message type of the departure notice an actor publishes when it stops.
pub const DEPARTED_MESSAGE: &str = "departed";

/// Default address departure notices are published on.
pub const DEPARTURE_ADDRESS: &str = "silo.departures";

/// Prefix of the parameter count frame (`ParameterCount:<n>`).
pub const PARAMETER_COUNT_PREFIX: &str = "ParameterCount:";

/// Returns true if a message type frame carries the stop signal.
pub fn is_stop(message_type: &str) -> bool {
    message_type.eq_ignore_ascii_case(STOP_MESSAGE)
}

/// A payload type that can travel as a named record argument.
///
/// The tag is the runtime type descriptor written before the value frame, so
/// the receiver can check it decodes the record it expects.
pub trait WireType: Serialize + DeserializeOwned {
    const TYPE_TAG: &'static str;
}

/// Reference to an operation on the receiving side.
///
/// Only the owner and method names cross the wire; the receiver resolves them
/// through an [`OperationRegistry`](crate::operation::OperationRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodHandle {
    pub owner: String,
    pub method: String,
}

impl MethodHandle {
    pub fn new(owner: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            method: method.into(),
        }
    }
}

impl fmt::Display for MethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner, self.method)
    }
}

pub const BOOL_TAG: &str = "bool";
pub const INT_TAG: &str = "i64";
pub const FLOAT_TAG: &str = "f64";
pub const TEXT_TAG: &str = "string";
pub const BYTES_TAG: &str = "bytes";

/// A decoded invocation parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Bytes),
    /// A named record, still in its serialized form.
    Record { tag: String, data: Bytes },
}

impl Arg {
    /// Serializes `value` into a record argument tagged with its type.
    pub fn record<T: WireType>(value: &T, serializer: &Serializer) -> Result<Self, CodecError> {
        Ok(Arg::Record {
            tag: T::TYPE_TAG.to_string(),
            data: serializer.encode(value)?,
        })
    }

    /// The type descriptor written before this argument's value frame.
    pub fn type_tag(&self) -> &str {
        match self {
            Arg::Bool(_) => BOOL_TAG,
            Arg::Int(_) => INT_TAG,
            Arg::Float(_) => FLOAT_TAG,
            Arg::Text(_) => TEXT_TAG,
            Arg::Bytes(_) => BYTES_TAG,
            Arg::Record { tag, .. } => tag,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Arg::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Arg::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Arg::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Arg::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// Decodes a record argument into `T`, checking the type tag first.
    pub fn decode_record<T: WireType>(&self, serializer: &Serializer) -> Result<T, CodecError> {
        match self {
            Arg::Record { tag, data } if tag == T::TYPE_TAG => serializer.decode(data),
            other => Err(CodecError::TypeMismatch {
                expected: T::TYPE_TAG.to_string(),
                found: other.type_tag().to_string(),
            }),
        }
    }
}

impl From<bool> for Arg {
    fn from(v: bool) -> Self {
        Arg::Bool(v)
    }
}

impl From<i64> for Arg {
    fn from(v: i64) -> Self {
        Arg::Int(v)
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Arg::Float(v)
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::Text(v.to_string())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::Text(v)
    }
}

/// The method-invocation part of a decoded message.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub handle: MethodHandle,
    pub args: Vec<Arg>,
}

/// A fully decoded message, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub address: String,
    /// The second frame, untouched. For simple and typed messages this is the payload.
    pub kind: Frame,
    /// The second frame as text, when it decodes as text.
    pub message_type: Option<String>,
    pub invocation: Option<Invocation>,
    /// Trailing frames of a non-invocation message.
    pub body: Vec<Frame>,
}

impl Envelope {
    pub fn is_invocation(&self) -> bool {
        self.invocation.is_some()
    }
}
