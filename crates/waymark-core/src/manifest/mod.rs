//! Execution manifest engine: validation, graph analysis, and serialization.
//!
//! - `graph` -- cycle detection, transitive chains, effort rollups, execution waves
//! - `validator` -- structural, referential, and cycle checks with batch reporting
//! - `codec` -- YAML/JSON encode/decode, extension dispatch, filesystem load/save
//! - `version` -- schema version parsing and compatibility checks

pub mod codec;
pub mod graph;
pub mod validator;
pub mod version;

pub use codec::{
    decode, decode_auto, discover_manifests, encode, encode_default, load_validated, save,
    save_with_config,
};
pub use graph::{ManifestGraph, dependency_chain, has_cycle, total_effort, total_effort_for};
pub use validator::{ValidationOptions, validate, validate_with};
