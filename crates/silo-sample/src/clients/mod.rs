//! Typed clients for the sample actors.

pub mod customer_client;

pub use customer_client::CustomerClient;
