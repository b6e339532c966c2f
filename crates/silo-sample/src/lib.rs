//! # Silo Sample Library
//!
//! The sample actors and their wiring, exposed for integration testing.
//!
//! - **[echo_actor]**: text in, `"<count>:<text>"` out.
//! - **[hex_actor]**: validates and decodes hex text.
//! - **[customer_actor]**: an invocation actor in front of a [`Store`](silo_bus::Store).
//! - **[reader_actor]**: a route actor that owns a local line writer.
//! - **[clients]**: typed request/reply wrappers over [`Scope`](silo_bus::Scope).
//! - **[lifecycle]**: [`SampleSilo`](lifecycle::SampleSilo), which starts and stops all of it.

pub mod clients;
pub mod customer_actor;
pub mod echo_actor;
pub mod hex_actor;
pub mod lifecycle;
pub mod model;
pub mod reader_actor;
