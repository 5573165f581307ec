//! Logging setup.
//!
//! Components log through `tracing` with structured fields such as
//! `run_id`, `assessment` and `fingerprint`. Applications call
//! [`init_tracing`] once to print them.

mod subscriber;

pub use subscriber::{init_tracing, LogFormat, DEFAULT_FILTER};
