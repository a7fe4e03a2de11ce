//! Schema version parsing and compatibility checks.
//!
//! Versions are dotted numeric tokens (`1`, `1.0`, `1.1.0`). They are padded
//! to three components and compared as `semver::Version`s.

use semver::Version;
use waymark_types::error::CodecError;
use waymark_types::manifest::{CURRENT_SCHEMA_VERSION, OLDEST_SUPPORTED_VERSION};

/// How a document's schema version relates to what this crate writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    /// Between the oldest supported and the current version (inclusive).
    Supported,
    /// Newer than the current version. Unknown optional fields are ignored.
    Newer,
}

/// Parse a schema version token.
pub fn parse_version(token: &str) -> Result<Version, CodecError> {
    let trimmed = token.trim();
    let parts: Vec<&str> = trimmed.split('.').collect();
    if trimmed.is_empty()
        || parts.len() > 3
        || parts
            .iter()
            .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return Err(CodecError::Version(format!(
            "'{token}' is not a valid schema version"
        )));
    }

    let mut padded = parts.clone();
    padded.resize(3, "0");
    padded
        .join(".")
        .parse::<Version>()
        .map_err(|e| CodecError::Version(format!("'{token}' is not a valid schema version: {e}")))
}

/// Check a document's declared version against the supported range.
pub fn check_compatibility(token: &str) -> Result<Compatibility, CodecError> {
    let declared = parse_version(token)?;
    let oldest = parse_version(OLDEST_SUPPORTED_VERSION)?;
    let current = parse_version(CURRENT_SCHEMA_VERSION)?;

    if declared < oldest {
        return Err(CodecError::Version(format!(
            "schema version '{token}' is older than the oldest supported version '{OLDEST_SUPPORTED_VERSION}'"
        )));
    }
    if declared > current {
        tracing::debug!(
            version = token,
            current = CURRENT_SCHEMA_VERSION,
            "decoding manifest with newer schema version; unknown fields are ignored"
        );
        return Ok(Compatibility::Newer);
    }
    Ok(Compatibility::Supported)
}
