//! # Silo Lifecycle & Orchestration
//!
//! Wiring the sample actors into one running silo, and taking it down again.
//!
//! ## The SampleSilo Pattern
//!
//! [`SampleSilo::new`] does the whole start-up in order:
//!
//! 1. **Blueprints**: register one blueprint per actor (address, reply route,
//!    workload constructor). Nothing runs yet.
//! 2. **Instances**: register the local `LineWriter` constructor the reader
//!    asks for at run time.
//! 3. **Start**: the silo starts the pipe, the departure census and one actor
//!    per blueprint.
//! 4. **Clients**: hand out typed clients bound to the silo's scope.
//!
//! Actors never hold references to each other. Everything they know about the
//! rest of the system is an address.
//!
//! ## Graceful Shutdown
//!
//! [`SampleSilo::shutdown`] sends `"stop"` to every actor address, waits for
//! the departure notices, and only then closes the pipe. Actors that missed the
//! stop (or did not answer within [`SHUTDOWN_GRACE`]) exit when their channel
//! closes; the returned list shows which path each actor took.
//!
//! ## Observability
//!
//! [`setup_tracing`] installs the compact subscriber; set `RUST_LOG=debug` to
//! see monitor lines and drained frames.

pub mod sample_silo;

pub use sample_silo::*;
pub use silo_bus::tracing::setup_tracing;
