//! # Silo Sample
//!
//! Starts the sample silo, talks to each actor once, and shuts it down
//! through the stop protocol.
//!
//! Set `SILO_CONFIG` to a TOML file to override the defaults; `SILO_*`
//! environment variables override both.

use silo_bus::{Frame, SiloConfig, SiloError};
use silo_sample::customer_actor::MemoryStore;
use silo_sample::lifecycle::{
    setup_tracing, SampleSilo, ECHO_ADDRESS, ECHO_REPLY, HEX_ADDRESS, HEX_REPLY, LINES_ADDRESS, LINES_REPLY,
};
use silo_sample::model::Customer;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Instrument};

const REPLY_WAIT: Duration = Duration::from_secs(2);

fn load_config() -> Result<SiloConfig, SiloError> {
    let config = match std::env::var("SILO_CONFIG") {
        Ok(path) => SiloConfig::load(path)?,
        Err(_) => SiloConfig::default().apply_env_overrides()?,
    };
    Ok(config)
}

/// Sends `text` to `address` and waits for one reply on `reply_to`.
async fn ask(system: &SampleSilo, address: &str, reply_to: &str, text: &str) -> Result<String, String> {
    let mut replies = system.replies(reply_to).map_err(|e| e.to_string())?;
    system.say(address, text).map_err(|e| e.to_string())?;
    let serializer = system.silo().serializer();

    let frames: Vec<Frame> = tokio::task::spawn_blocking(move || replies.recv_message_timeout(REPLY_WAIT))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("no reply on {reply_to}"))?;
    let body = frames.get(1).ok_or_else(|| "reply without a body".to_string())?;
    serializer.decode_string(body).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    let config = load_config().map_err(|e| e.to_string())?;
    info!(silo = %config.name, "Starting sample silo");
    let system = SampleSilo::new(config, Arc::new(MemoryStore::new())).map_err(|e| e.to_string())?;

    let span = tracing::info_span!("echo");
    async {
        for text in ["hello its me", "still me"] {
            let reply = ask(&system, ECHO_ADDRESS, ECHO_REPLY, text).await?;
            info!(reply = %reply, "Echo replied");
        }
        Ok::<_, String>(())
    }
    .instrument(span)
    .await?;

    for text in ["48656c6c6f", "abc", "zz"] {
        let reply = ask(&system, HEX_ADDRESS, HEX_REPLY, text).await?;
        info!(input = %text, reply = %reply, "Hex validator replied");
    }

    let span = tracing::info_span!("customer_save");
    let saved = async {
        info!("Saving customer");
        system.customer_client.save(&Customer::new("John", "Wilson")).await
    }
    .instrument(span)
    .await;
    match saved {
        Ok(id) => info!(customer_id = id, "Customer saved"),
        Err(e) => error!(error = %e, "Customer save failed"),
    }

    for line in ["first line", "second line"] {
        let reply = ask(&system, LINES_ADDRESS, LINES_REPLY, line).await?;
        info!(reply = %reply, "Reader replied");
    }
    info!(lines = ?system.written_lines(), "Writer output");

    let exits = tokio::task::spawn_blocking(move || system.shutdown())
        .await
        .map_err(|e| e.to_string())?;
    for (actor, exit) in exits {
        info!(actor = %actor, exit = ?exit, "Actor exited");
    }

    info!("Sample completed");
    Ok(())
}
