//! `parley-config` — configuration for the parley engine.
//!
//! Provides:
//! - Typed config schema (fuzzy matching, catalog, detectors, logging)
//! - YAML/JSON loading with catalog file merging
//! - Default value application
//! - Validation with collected errors and warnings

pub mod defaults;
pub mod io;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use io::{config_dir, config_file_path, load_catalog, load_config, merge_catalog_file};
pub use schema::{DetectorConfig, FuzzyConfig, LoggingConfig, NluConfig};
pub use validation::{validate, ConfigValidationError, ValidationReport, KNOWN_BUILTINS};

use anyhow::Result;
use parley_core::NluError;
use std::path::Path;

/// Load, merge the catalog file, and apply defaults. No validation.
pub async fn prepare(path: &Path) -> Result<NluConfig> {
    let config = load_config(path).await?;
    let config = merge_catalog_file(config, path).await?;
    Ok(apply_all_defaults(config))
}

/// [`prepare`] and validate. Warnings are logged; errors are logged and
/// returned as [`NluError::ConfigError`].
pub async fn load_and_prepare(path: &Path) -> Result<NluConfig> {
    let config = prepare(path).await?;

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if !report.is_valid() {
        let summary = report
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(NluError::ConfigError(summary).into());
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parley.yaml");
        std::fs::write(&path, "fuzzy: { threshold: 2.0 }\nbuiltins: [phone]\n").unwrap();

        let err = load_and_prepare(&path).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NluError>(),
            Some(NluError::ConfigError(msg)) if msg.contains("fuzzy.threshold")
        ));

        std::fs::write(&path, "builtins: [phone]\n").unwrap();
        let config = load_and_prepare(&path).await.unwrap();
        assert_eq!(config.fuzzy.and_then(|f| f.threshold), Some(defaults::DEFAULT_THRESHOLD));
    }
}
