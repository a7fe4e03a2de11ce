//! Manifest encoding, decoding, and filesystem operations.
//!
//! Converts between YAML/JSON documents and the canonical `ExecutionManifest`,
//! checks the document's schema version before mapping it into the model, and
//! provides format dispatch by file extension plus discovery of manifest files
//! on disk.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use waymark_types::config::KernelConfig;
use waymark_types::error::{CodecError, ManifestError};
use waymark_types::format::ManifestFormat;
use waymark_types::manifest::{ExecutionManifest, OLDEST_SUPPORTED_VERSION};

use super::validator::{ValidationOptions, validate_with};
use super::version::check_compatibility;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Serialize a manifest into the given document form.
pub fn encode(manifest: &ExecutionManifest, format: ManifestFormat) -> Result<String, CodecError> {
    match format {
        ManifestFormat::Yaml => serde_yaml_ng::to_string(manifest)
            .map_err(|e| CodecError::Format(format!("cannot encode manifest as YAML: {e}"))),
        ManifestFormat::Json => {
            let mut json = serde_json::to_string_pretty(manifest)
                .map_err(|e| CodecError::Format(format!("cannot encode manifest as JSON: {e}")))?;
            json.push('\n');
            Ok(json)
        }
    }
}

/// Serialize a manifest in the configured default form.
pub fn encode_default(
    manifest: &ExecutionManifest,
    config: &KernelConfig,
) -> Result<String, CodecError> {
    encode(manifest, config.default_format)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// The `version` scalar exactly as written in a YAML document.
#[derive(Deserialize)]
struct YamlVersionField {
    #[serde(default)]
    version: Option<String>,
}

/// Parse a document in the declared form into an `ExecutionManifest`.
///
/// The document is parsed only under `format`; a JSON document handed in as
/// YAML is rejected rather than accepted as YAML flow style. The `version`
/// field is checked before the rest of the document is mapped: a missing
/// version means the oldest supported one, a newer version is accepted with
/// unknown fields ignored, and an older or malformed one fails.
pub fn decode(document: &str, format: ManifestFormat) -> Result<ExecutionManifest, CodecError> {
    let mut value: Value = match format {
        ManifestFormat::Yaml => {
            ensure_block_form(document)?;
            serde_yaml_ng::from_str(document)
                .map_err(|e| CodecError::Format(format!("invalid YAML manifest: {e}")))?
        }
        ManifestFormat::Json => serde_json::from_str(document)
            .map_err(|e| CodecError::Format(format!("invalid JSON manifest: {e}")))?,
    };

    let Some(fields) = value.as_object_mut() else {
        return Err(CodecError::Format(
            "manifest document must be a mapping at the top level".to_string(),
        ));
    };

    let version = match format {
        ManifestFormat::Yaml => yaml_version_token(document)?,
        ManifestFormat::Json => json_version_token(fields.get("version"))?,
    }
    .unwrap_or_else(|| OLDEST_SUPPORTED_VERSION.to_string());
    check_compatibility(&version)?;
    fields.insert("version".to_string(), Value::String(version));

    let manifest: ExecutionManifest = serde_json::from_value(value)
        .map_err(|e| CodecError::Format(format!("manifest does not match the schema: {e}")))?;

    tracing::debug!(
        %format,
        version = %manifest.version,
        nodes = manifest.nodes.len(),
        "decoded manifest"
    );
    Ok(manifest)
}

/// Read `version` from the YAML text itself, so an unquoted `1.10` stays
/// `"1.10"` instead of going through a float.
fn yaml_version_token(document: &str) -> Result<Option<String>, CodecError> {
    serde_yaml_ng::from_str::<YamlVersionField>(document)
        .map(|field| field.version)
        .map_err(|e| CodecError::Version(format!("schema version must be a scalar: {e}")))
}

fn json_version_token(version: Option<&Value>) -> Result<Option<String>, CodecError> {
    match version {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(token)) => Ok(Some(token.clone())),
        Some(other) => Err(CodecError::Version(format!(
            "schema version must be a string, got {other}"
        ))),
    }
}

/// Reject flow-style (brace/bracket) documents declared as YAML.
fn ensure_block_form(document: &str) -> Result<(), CodecError> {
    let first = document
        .lines()
        .map(str::trim_start)
        .find(|line| {
            !(line.is_empty()
                || line.starts_with('#')
                || line.starts_with('%')
                || line.starts_with("---"))
        });
    match first {
        Some(line) if line.starts_with('{') || line.starts_with('[') => Err(CodecError::Format(
            "document is brace-delimited; expected the indentation-based YAML form".to_string(),
        )),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Filesystem operations
// ---------------------------------------------------------------------------

/// Load a manifest, inferring the format from the file extension.
pub fn decode_auto(path: &Path) -> Result<ExecutionManifest, CodecError> {
    let format = ManifestFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)?;
    decode(&content, format)
}

/// Save a manifest, inferring the format from the file extension.
///
/// Creates parent directories if they don't exist.
pub fn save(manifest: &ExecutionManifest, path: &Path) -> Result<(), CodecError> {
    let format = ManifestFormat::from_path(path)?;
    write_document(manifest, path, format)
}

/// Save a manifest, falling back to the configured default form when `path`
/// has no extension. The matching extension is appended in that case.
///
/// Returns the path actually written.
pub fn save_with_config(
    manifest: &ExecutionManifest,
    path: &Path,
    config: &KernelConfig,
) -> Result<PathBuf, CodecError> {
    let (path, format) = match path.extension() {
        Some(_) => (path.to_path_buf(), ManifestFormat::from_path(path)?),
        None => (
            path.with_extension(config.default_format.extension()),
            config.default_format,
        ),
    };
    write_document(manifest, &path, format)?;
    Ok(path)
}

fn write_document(
    manifest: &ExecutionManifest,
    path: &Path,
    format: ManifestFormat,
) -> Result<(), CodecError> {
    let document = encode(manifest, format)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(document.as_bytes())?;
    writer.flush()?;
    tracing::debug!(?path, %format, "saved manifest");
    Ok(())
}

/// Load a manifest and validate it.
pub fn load_validated(
    path: &Path,
    options: &ValidationOptions,
) -> Result<ExecutionManifest, ManifestError> {
    let manifest = decode_auto(path)?;
    validate_with(&manifest, options)?;
    Ok(manifest)
}

/// Discover all manifest files under `base_dir`.
///
/// Scans for `.yaml`, `.yml` and `.json` files recursively. Files that fail to
/// decode are skipped with a warning.
pub fn discover_manifests(
    base_dir: &Path,
) -> Result<Vec<(PathBuf, ExecutionManifest)>, CodecError> {
    let mut results = Vec::new();
    if !base_dir.exists() {
        return Ok(results);
    }
    discover_recursive(base_dir, &mut results)?;
    results.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(results)
}

fn discover_recursive(
    dir: &Path,
    results: &mut Vec<(PathBuf, ExecutionManifest)>,
) -> Result<(), CodecError> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            discover_recursive(&path, results)?;
        } else if ManifestFormat::from_path(&path).is_ok() {
            match decode_auto(&path) {
                Ok(manifest) if !manifest.nodes.is_empty() => results.push((path, manifest)),
                Ok(_) => tracing::debug!(?path, "skipping document without nodes"),
                Err(err) => tracing::warn!(?path, %err, "skipping undecodable manifest file"),
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
