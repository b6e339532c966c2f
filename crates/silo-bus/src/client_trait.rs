//! # BusClient Trait
//!
//! A common interface for typed clients of an invocation actor. Implementors
//! say where the actor lives and how to turn a failed completion into their own
//! error type; `call` and `call_with_timeout` come for free.
//!
//! ```rust,ignore
//! struct CustomerClient {
//!     scope: Scope,
//! }
//!
//! #[async_trait]
//! impl BusClient for CustomerClient {
//!     type Error = CustomerError;
//!
//!     fn scope(&self) -> &Scope { &self.scope }
//!     fn address(&self) -> &str { "customers" }
//! }
//!
//! let ids = client.call(MethodHandle::new("CustomerStore", "save"), args).await?;
//! ```
use crate::callback::Scope;
use crate::message::{Arg, MethodHandle};
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait BusClient: Send + Sync {
    /// The client-specific error type.
    type Error: From<String> + Send;

    fn scope(&self) -> &Scope;

    /// The address the target actor subscribes to.
    fn address(&self) -> &str;

    /// Maps the error text of a failed completion. Transport problems
    /// (dropped listener, timeout) go through `From<String>` instead.
    fn map_fault(error: String) -> Self::Error {
        Self::Error::from(error)
    }

    /// Invokes `handle` and waits for the actor to complete the callback.
    #[tracing::instrument(skip(self, args))]
    async fn call(&self, handle: MethodHandle, args: Vec<Arg>) -> Result<Vec<Arg>, Self::Error> {
        tracing::debug!("Sending invocation");
        let completion = self
            .scope()
            .call(self.address(), &handle, args)
            .await
            .map_err(|_| Self::Error::from(format!("{handle} was dropped without completing")))?;
        completion.into_result().map_err(Self::map_fault)
    }

    /// Like [`call`](Self::call), bounded by `timeout`.
    async fn call_with_timeout(
        &self,
        handle: MethodHandle,
        args: Vec<Arg>,
        timeout: Duration,
    ) -> Result<Vec<Arg>, Self::Error> {
        let label = handle.to_string();
        tokio::time::timeout(timeout, self.call(handle, args))
            .await
            .map_err(|_| Self::Error::from(format!("{label} timed out after {timeout:?}")))?
    }
}
