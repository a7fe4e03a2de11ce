//! Planning kernel for Waymark execution manifests.
//!
//! Validates manifests, analyzes their dependency graphs, and converts them
//! to and from their stored document forms. Every operation here is
//! synchronous and works on an immutable manifest, so callers may analyze
//! distinct manifests concurrently without coordination.

pub mod config;
pub mod manifest;
