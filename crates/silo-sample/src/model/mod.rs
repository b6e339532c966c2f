//! # Domain Model
//!
//! Payload types that travel over the bus between the sample actors.

pub mod customer;

pub use customer::*;
