//! Kernel configuration types for Waymark.
//!
//! `KernelConfig` represents the `waymark.toml` file that tunes how manifests
//! are validated and which document form is used when no path is available.

use serde::{Deserialize, Serialize};

use crate::format::ManifestFormat;

/// Top-level configuration for the planning kernel.
///
/// All fields have sensible defaults, so an empty file is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Reject node types and policy severities outside the known set.
    #[serde(default)]
    pub strict_types: bool,

    /// Document form used when a caller has no file path to infer it from.
    #[serde(default)]
    pub default_format: ManifestFormat,

    /// Largest node count a manifest may have and still validate.
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
}

fn default_max_nodes() -> usize {
    10_000
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            strict_types: false,
            default_format: ManifestFormat::default(),
            max_nodes: default_max_nodes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_config_default_values() {
        let config = KernelConfig::default();
        assert!(!config.strict_types);
        assert_eq!(config.default_format, ManifestFormat::Yaml);
        assert_eq!(config.max_nodes, 10_000);
    }

    #[test]
    fn test_kernel_config_deserialize_with_defaults() {
        let config: KernelConfig = toml::from_str("").unwrap();
        assert_eq!(config, KernelConfig::default());
    }

    #[test]
    fn test_kernel_config_deserialize_with_values() {
        let toml_str = r#"
strict_types = true
default_format = "json"
max_nodes = 500
"#;
        let config: KernelConfig = toml::from_str(toml_str).unwrap();
        assert!(config.strict_types);
        assert_eq!(config.default_format, ManifestFormat::Json);
        assert_eq!(config.max_nodes, 500);
    }
}
