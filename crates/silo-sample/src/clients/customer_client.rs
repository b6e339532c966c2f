//! # Customer Client
//!
//! Calls `CustomerStore::save` through a [`Scope`] and waits for the id.
use crate::customer_actor::{save_handle, CustomerError};
use crate::model::{Customer, CustomerId};
use async_trait::async_trait;
use silo_bus::{Arg, BusClient, Scope};
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct CustomerClient {
    scope: Scope,
    address: String,
}

impl CustomerClient {
    pub fn new(scope: Scope, address: impl Into<String>) -> Self {
        Self {
            scope,
            address: address.into(),
        }
    }
}

#[async_trait]
impl BusClient for CustomerClient {
    type Error = CustomerError;

    fn scope(&self) -> &Scope {
        &self.scope
    }

    fn address(&self) -> &str {
        &self.address
    }

    fn map_fault(error: String) -> Self::Error {
        CustomerError::StoreError(error)
    }
}

impl CustomerClient {
    #[instrument(skip(self))]
    pub async fn save(&self, customer: &Customer) -> Result<CustomerId, CustomerError> {
        debug!("Sending request");
        let record = Arg::record(customer, self.scope.serializer())?;
        let payload = self.call(save_handle(), vec![record]).await?;
        payload
            .first()
            .and_then(Arg::as_i64)
            .ok_or(CustomerError::MissingId)
    }
}
