//! Error types for the customer store actor and its client.

use silo_bus::CodecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CustomerError {
    /// The save reached the actor but the store refused it.
    #[error("Customer store error: {0}")]
    StoreError(String),

    #[error("Customer payload error: {0}")]
    Codec(#[from] CodecError),

    /// The completion carried no record id.
    #[error("Customer store returned no id")]
    MissingId,

    /// An error occurred while communicating with the actor system.
    #[error("Actor communication error: {0}")]
    ActorCommunicationError(String),
}

impl From<String> for CustomerError {
    fn from(msg: String) -> Self {
        CustomerError::ActorCommunicationError(msg)
    }
}
