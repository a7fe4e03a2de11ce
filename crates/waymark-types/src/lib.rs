//! Shared domain types for Waymark.
//!
//! This crate contains the execution manifest data model (nodes, policies,
//! the manifest container), the validation violation taxonomy, codec and
//! graph error types, and kernel configuration.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror, schemars.

pub mod config;
pub mod error;
pub mod format;
pub mod manifest;
pub mod validation;
