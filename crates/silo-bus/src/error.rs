//! # Framework Errors
//!
//! Error types shared by the bus, the actor loop and the host. Each layer gets
//! its own enum so callers can tell a malformed frame from a closed socket from
//! a missing blueprint.

use crate::serializer::TextEncoding;

/// Errors raised by the in-process transport.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum BusError {
    /// Publishing through an endpoint that has already been torn down.
    #[error("Channel disposed: {0}")]
    ChannelDisposed(String),
    /// The receiving side of an endpoint has been closed.
    #[error("Channel closed: {0}")]
    Closed(String),
    #[error("Failed to spawn thread {name}: {reason}")]
    Spawn { name: String, reason: String },
}

/// Encoding and decoding failures for frames and payloads.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Invalid text frame: {0}")]
    InvalidText(String),
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Binary codec error: {0}")]
    Binary(#[from] bincode::Error),
    #[error("Malformed parameter count frame: {0:?}")]
    MalformedParameterCount(String),
    #[error("Parameter count mismatch: declared {declared}, received {received}")]
    ParameterCountMismatch { declared: usize, received: usize },
    #[error("Value frame missing for type tag {0:?}")]
    DanglingTypeTag(String),
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("Message is not an invocation (message type {0:?})")]
    NotAnInvocation(String),
    #[error("Message ended before the {0} frame")]
    Truncated(&'static str),
}

/// A codec error tagged with the frame index it happened at.
#[derive(Debug, thiserror::Error)]
#[error("Frame {index} failed to decode: {source}")]
pub struct DecodeFailure {
    pub index: usize,
    #[source]
    pub source: CodecError,
}

/// Errors reported by a workload. The actor loop logs them and forwards them
/// to the fault listener; they never cross the actor boundary as panics.
#[derive(Debug, thiserror::Error)]
pub enum WorkloadError {
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),
    #[error("Bad argument: {0}")]
    BadArgument(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error(transparent)]
    Factory(#[from] FactoryError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Workload failed: {0}")]
    Failed(String),
}

/// Blueprint registration and activation errors.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum FactoryError {
    #[error("Blueprint already registered: {0}")]
    DuplicateBlueprint(String),
    #[error("Unknown blueprint: {0}")]
    UnknownBlueprint(String),
    #[error("Unknown instance blueprint: {0}")]
    UnknownInstance(String),
    #[error("Instance {name} does not provide {interface}")]
    InterfaceMismatch { name: String, interface: String },
    #[error("Instance {name} could not be constructed: {reason}")]
    Construction { name: String, reason: String },
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Failures of the storage collaborator.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store rejected record: {0}")]
    Rejected(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {key}: {value}")]
    Invalid { key: String, value: String },
}

/// Host lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum SiloError {
    #[error("Silo already started")]
    AlreadyStarted,
    #[error("Silo is not running")]
    NotRunning,
    #[error("Blueprint {blueprint} encodes text as {found:?}, the silo as {expected:?}")]
    TextEncodingMismatch {
        blueprint: String,
        expected: TextEncoding,
        found: TextEncoding,
    },
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error(transparent)]
    Factory(#[from] FactoryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
