//! Operation registry.
//!
//! Invocation messages carry a [`MethodHandle`] (owner and method names) and
//! argument values, nothing executable. The receiving actor looks the handle
//! up here.

use crate::error::WorkloadError;
use crate::message::{Arg, MethodHandle};
use crate::workload::{ActorContext, WorkloadResult};
use std::collections::HashMap;

pub type Operation = Box<dyn FnMut(&str, Vec<Arg>, &mut ActorContext) -> WorkloadResult + Send>;

#[derive(Default)]
pub struct OperationRegistry {
    operations: HashMap<MethodHandle, Operation>,
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.operations.keys()).finish()
    }
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, handle: MethodHandle, operation: F) -> &mut Self
    where
        F: FnMut(&str, Vec<Arg>, &mut ActorContext) -> WorkloadResult + Send + 'static,
    {
        self.operations.insert(handle, Box::new(operation));
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<F>(mut self, handle: MethodHandle, operation: F) -> Self
    where
        F: FnMut(&str, Vec<Arg>, &mut ActorContext) -> WorkloadResult + Send + 'static,
    {
        self.register(handle, operation);
        self
    }

    pub fn contains(&self, handle: &MethodHandle) -> bool {
        self.operations.contains_key(handle)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn call(
        &mut self,
        address: &str,
        handle: &MethodHandle,
        args: Vec<Arg>,
        ctx: &mut ActorContext,
    ) -> WorkloadResult {
        let operation = self
            .operations
            .get_mut(handle)
            .ok_or_else(|| WorkloadError::UnknownOperation(handle.to_string()))?;
        operation(address, args, ctx)
    }
}
