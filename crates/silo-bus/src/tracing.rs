//! # Observability & Tracing
//!
//! [`setup_tracing`] installs a compact `tracing-subscriber` formatter filtered
//! by `RUST_LOG`. Module paths are hidden; events carry `actor`, `address` and
//! `index` fields instead.
//!
//! ```bash
//! RUST_LOG=info cargo run     # actor start/stop, pipe lifecycle
//! RUST_LOG=debug cargo run    # monitor lines, drains, registrations
//! RUST_LOG=trace cargo run    # every delivery on every endpoint
//! ```
//!
//! With `RUST_LOG=info` a short echo session reads:
//!
//! ```text
//! INFO Pipe started inbound="inproc://silo/inbound" outbound="inproc://silo/outbound"
//! INFO Activated actor="echo#1" address="XXXX"
//! INFO Actor started actor="echo#1" address="XXXX"
//! INFO Actor exiting actor="echo#1" exit=Stopped dispatched=2
//! INFO Pipe closed messages=5 frames=11
//! ```

/// Installs the global subscriber. Call once per process.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}

/// Like [`setup_tracing`], but does nothing if a subscriber is already set.
pub fn try_setup_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init()
        .is_ok()
}
