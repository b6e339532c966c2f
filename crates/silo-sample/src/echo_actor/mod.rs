//! # Echo Actor
//!
//! Replies to every text message on its out route with `"<count>:<text>"`,
//! where `count` is how many messages this actor instance has seen. The count
//! lives in the actor's property bag.

use silo_bus::{ActorContext, Frame, Workload, WorkloadResult};
use tracing::debug;

pub const COUNT_PROPERTY: &str = "count";

pub fn workload() -> Workload {
    Workload::text(echo)
}

fn echo(text: String, _raw: &Frame, address: &str, ctx: &mut ActorContext) -> WorkloadResult {
    let count = ctx.properties_mut().increment(COUNT_PROPERTY);
    debug!(actor = %ctx.id(), address = %address, count, "Echo");
    ctx.reply_text(&format!("{count}:{text}"))?;
    Ok(())
}
