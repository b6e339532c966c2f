//! # Customer Store Actor
//!
//! An invocation actor exposing one operation, `CustomerStore::save`.
//!
//! ## Protocol
//!
//! The call carries two arguments: the [`Customer`] record and the caller's
//! callback token (appended by [`Scope::call`](silo_bus::Scope::call)). The
//! actor re-serializes the customer, hands the bytes to its [`Store`], and
//! completes the token with the new id.
//!
//! Any failure is returned as a workload error. The actor loop completes the
//! caller's token with a fault and reports it on the silo's fault listener.
//!
//! ## Structure
//!
//! - [`error`]: [`CustomerError`] for the client side
//! - [`store`]: [`MemoryStore`], the in-process backend

pub mod error;
pub mod store;

pub use error::*;
pub use store::*;

use crate::model::Customer;
use silo_bus::{
    token_arg, ActorContext, Arg, Completion, MethodHandle, OperationRegistry, Store, Workload,
    WorkloadError, WorkloadResult,
};
use std::sync::Arc;
use tracing::{info, warn};

pub const OWNER: &str = "CustomerStore";
pub const SAVE: &str = "save";

pub fn save_handle() -> MethodHandle {
    MethodHandle::new(OWNER, SAVE)
}

pub fn workload(store: Arc<dyn Store>) -> Workload {
    Workload::dispatch(
        OperationRegistry::new().with(save_handle(), move |_address, args, ctx| save(&*store, args, ctx)),
    )
}

fn save(store: &dyn Store, args: Vec<Arg>, ctx: &mut ActorContext) -> WorkloadResult {
    let token = token_arg(&args).ok_or_else(|| WorkloadError::BadArgument("missing callback token".into()))?;
    let record = args
        .first()
        .filter(|_| args.len() == 2)
        .ok_or_else(|| WorkloadError::BadArgument(format!("expected 2 arguments, got {}", args.len())))?;

    let customer: Customer = record.decode_record(ctx.serializer())?;
    let raw = ctx.serializer().encode(&customer)?;

    let id = store.save(&raw).inspect_err(|e| {
        warn!(actor = %ctx.id(), error = %e, "Store refused customer");
    })?;
    info!(actor = %ctx.id(), customer_id = id, lastname = %customer.lastname, "Saved customer");
    ctx.complete(token, Completion::success(vec![Arg::Int(id)]));
    Ok(())
}
