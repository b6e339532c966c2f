//! # Reader / Writer
//!
//! The reader is a route actor. On its first message it asks the factory for
//! a local [`LineWriter`] (registered under [`WRITER_INSTANCE`]) and keeps it;
//! every message body after that is handed to the writer directly, on the
//! reader's own thread, without another bus hop.
//!
//! The writer is never an actor: it has no address and no thread, and the
//! reader owns it.

pub mod writer;

pub use writer::*;

use silo_bus::{ActorContext, Arg, Envelope, Workload, WorkloadError};
use tracing::debug;

pub const WRITER_INSTANCE: &str = "writer";

pub fn workload() -> Workload {
    let mut writer: Option<Box<dyn LineWriter>> = None;
    Workload::route(move |envelope: &Envelope, ctx: &mut ActorContext| {
        let line = envelope
            .message_type
            .as_deref()
            .ok_or_else(|| WorkloadError::BadArgument("line is not text".into()))?;

        if writer.is_none() {
            let created = ctx.create_instance::<dyn LineWriter>(WRITER_INSTANCE, &[Arg::from(ctx.id())])?;
            debug!(actor = %ctx.id(), "Created line writer");
            writer = Some(created);
        }
        if let Some(writer) = writer.as_mut() {
            writer.write_line(line).map_err(WorkloadError::Failed)?;
            ctx.reply_text(&format!("written:{}", writer.lines_written()))?;
        }
        Ok(())
    })
}
