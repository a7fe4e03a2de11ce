//! Kernel configuration loader for Waymark.
//!
//! Reads `waymark.toml` from a configuration directory and deserializes it
//! into [`KernelConfig`]. Falls back to defaults when the file is missing or
//! malformed.

use std::path::Path;

use waymark_types::config::KernelConfig;

use crate::manifest::validator::ValidationOptions;

/// File name looked up inside the configuration directory.
pub const CONFIG_FILE_NAME: &str = "waymark.toml";

/// Load kernel configuration from `{config_dir}/waymark.toml`.
///
/// - If the file does not exist, returns [`KernelConfig::default()`].
/// - If the file exists but cannot be read or parsed, logs a warning and returns the default.
/// - Otherwise returns the parsed config.
pub fn load_kernel_config(config_dir: &Path) -> KernelConfig {
    let config_path = config_dir.join(CONFIG_FILE_NAME);

    let content = match std::fs::read_to_string(&config_path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {CONFIG_FILE_NAME} found at {}, using defaults", config_path.display());
            return KernelConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return KernelConfig::default();
        }
    };

    match toml::from_str::<KernelConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            KernelConfig::default()
        }
    }
}

/// Validation options derived from the configuration.
pub fn validation_options(config: &KernelConfig) -> ValidationOptions {
    ValidationOptions::from(config)
}
