use serde::{Deserialize, Serialize};
use silo_bus::WireType;

/// Id the store assigns to a saved customer record.
pub type CustomerId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub firstname: String,
    pub lastname: String,
}

impl Customer {
    pub fn new(firstname: impl Into<String>, lastname: impl Into<String>) -> Self {
        Self {
            firstname: firstname.into(),
            lastname: lastname.into(),
        }
    }
}

impl WireType for Customer {
    const TYPE_TAG: &'static str = "Customer";
}
