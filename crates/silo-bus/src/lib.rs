//! # Silo Bus
//!
//! An actor runtime where actors share nothing and talk only through
//! addressed, multi-frame messages on a broadcast pipe.
//!
//! ## Architecture Overview
//!
//! ```text
//!  producers ──► inbound ══ BusPipe relay ══► outbound ──► actor (prefix "XXXX")
//!      ▲                                          ├──────► actor (prefix "hello")
//!      │                                          └──────► census ("silo.departures")
//!      └──────────────── actor output ◄───────────────────────┘
//! ```
//!
//! 1. **Wire layer** ([`frame`], [`serializer`]): fixed-position frames
//!    (address, message type, method handle, parameter count, typed values)
//!    decoded one position at a time.
//! 2. **Transport layer** ([`transport`], [`pipe`]): publish/subscribe
//!    endpoints with prefix filtering, joined by a relay thread.
//! 3. **Runtime layer** ([`actor`], [`factory`], [`silo`]): one receive loop per
//!    actor thread, blueprints that create actors, and the host that starts and
//!    stops them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use silo_bus::{ActorContext, Frame, Serializer, Silo, SiloConfig, Workload};
//! use std::time::Duration;
//!
//! let mut silo = Silo::new(SiloConfig::default()).unwrap();
//! silo.register_actor("echo", "XXXX", "XXXX.out", Serializer::json(), || {
//!     Workload::text(|text: String, _: &Frame, _: &str, ctx: &mut ActorContext| {
//!         Ok(ctx.reply_text(&text)?)
//!     })
//! })
//! .unwrap();
//! silo.start().unwrap();
//!
//! silo.publisher()
//!     .send_multipart(silo_bus::frame::encode_simple_message("XXXX", "hello its me", &silo.serializer()))
//!     .unwrap();
//!
//! silo.send_stop("XXXX").unwrap();
//! assert!(silo.await_departures(Duration::from_secs(1)));
//! silo.stop();
//! ```
//!
//! ## Stopping
//!
//! A message whose type is `"stop"` (any case) ends the receive loop of every
//! actor it reaches. The stopping actor publishes a departure notice that the
//! silo counts, so the host can wait until every actor is gone before closing
//! the pipe. The pipe itself has no stop message; it runs until closed.
//!
//! ## Failures
//!
//! Decode errors are local: logged, reported to the monitor, the rest of the
//! message drained. Workload errors are logged and handed to the fault
//! listener ([`Silo::take_faults`]). Panics are not caught.
//!
//! ## Testing
//!
//! [`mock::MockStore`] scripts the storage boundary; [`MonitorEndpoint`]
//! records actor status lines for assertions.

pub mod actor;
pub mod callback;
pub mod client_trait;
pub mod config;
pub mod error;
pub mod factory;
pub mod frame;
pub mod message;
pub mod mock;
pub mod monitor;
pub mod operation;
pub mod pipe;
pub mod serializer;
pub mod silo;
pub mod store;
pub mod tracing;
pub mod transport;
pub mod workload;

pub use actor::{Actor, ActorConfig, ActorExit, ActorHandle, Fault};
pub use callback::{token_arg, Callbacks, Completion, ResultCode, Scope};
pub use client_trait::BusClient;
pub use config::{PipeConfig, SiloConfig};
pub use error::{
    BusError, CodecError, ConfigError, DecodeFailure, FactoryError, SiloError, StoreError, WorkloadError,
};
pub use factory::{ActorFactory, FactoryWiring, InstanceRegistry};
pub use message::{Arg, Envelope, Frame, Invocation, MethodHandle, WireType};
pub use monitor::{Monitor, MonitorEndpoint};
pub use operation::OperationRegistry;
pub use pipe::BusPipe;
pub use serializer::{Format, Serializer, TextEncoding};
pub use silo::Silo;
pub use store::Store;
pub use transport::{Endpoint, Publisher, Subscriber};
pub use workload::{ActorContext, PropertyBag, Workload, WorkloadResult};
