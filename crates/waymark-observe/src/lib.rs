//! Observability setup for processes that embed the Waymark kernel.
//!
//! The library crates only emit `tracing` events; this crate installs the
//! subscriber that renders or exports them.

pub mod tracing_setup;
