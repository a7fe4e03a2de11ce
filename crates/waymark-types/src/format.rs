//! Document forms a manifest can be stored in.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Serialization form of a manifest document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestFormat {
    /// Indentation-based key/value form.
    #[default]
    Yaml,
    /// Brace-delimited key/value form.
    Json,
}

impl ManifestFormat {
    /// Infer the format from a file extension (`.yaml`, `.yml`, `.json`).
    pub fn from_path(path: &Path) -> Result<Self, CodecError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            Some(other) => Err(CodecError::Format(format!(
                "unsupported manifest extension '.{other}' for {}",
                path.display()
            ))),
            None => Err(CodecError::Format(format!(
                "cannot infer manifest format for {} (no extension)",
                path.display()
            ))),
        }
    }

    /// Preferred file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ManifestFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yaml => write!(f, "yaml"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(ManifestFormat::from_path(Path::new("m.yaml")).unwrap(), ManifestFormat::Yaml);
        assert_eq!(ManifestFormat::from_path(Path::new("m.YML")).unwrap(), ManifestFormat::Yaml);
        assert_eq!(ManifestFormat::from_path(Path::new("a/b.json")).unwrap(), ManifestFormat::Json);
    }

    #[test]
    fn test_from_path_rejects_unknown_extension() {
        let err = ManifestFormat::from_path(Path::new("m.toml")).unwrap_err();
        assert!(matches!(err, CodecError::Format(_)));
        assert!(err.to_string().contains(".toml"));

        let err = ManifestFormat::from_path(Path::new("manifest")).unwrap_err();
        assert!(err.to_string().contains("no extension"));
    }
}
