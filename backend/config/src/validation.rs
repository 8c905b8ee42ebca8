//! Config validation: collects every problem in one pass.

use crate::schema::NluConfig;
use thiserror::Error;

/// Stock detector names accepted under `builtins`.
pub const KNOWN_BUILTINS: [&str; 3] = ["email", "phone", "url"];

/// A config validation error with field path and message.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

pub fn validate(config: &NluConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_fuzzy(config, &mut report);
    validate_catalog(config, &mut report);
    validate_builtins(config, &mut report);
    validate_detectors(config, &mut report);
    report
}

fn validate_fuzzy(config: &NluConfig, report: &mut ValidationReport) {
    let Some(fuzzy) = &config.fuzzy else { return };
    if let Some(threshold) = fuzzy.threshold {
        if !(0.0..=1.0).contains(&threshold) {
            report.error("fuzzy.threshold", format!("threshold {threshold} must lie in [0, 1]"));
        }
    }
    if fuzzy.limit == Some(0) {
        report.warn("fuzzy.limit", "limit 0 suppresses every fuzzy match");
    }
}

fn validate_catalog(config: &NluConfig, report: &mut ValidationReport) {
    for (i, entry) in config.catalog.iter().enumerate() {
        if entry.entity.trim().is_empty() {
            report.error(format!("catalog[{i}].entity"), "Entity name cannot be empty");
        }
    }
    let has_builtins = config.builtins.as_ref().is_some_and(|b| !b.is_empty());
    if config.catalog.is_empty() && config.detectors.is_empty() && !has_builtins {
        report.warn("catalog", "No catalog entries or detectors configured; nothing will be detected");
    }
}

fn validate_builtins(config: &NluConfig, report: &mut ValidationReport) {
    let Some(builtins) = &config.builtins else { return };
    for (i, name) in builtins.iter().enumerate() {
        if !KNOWN_BUILTINS.iter().any(|k| k.eq_ignore_ascii_case(name.trim())) {
            report.error(
                format!("builtins[{i}]"),
                format!("Unknown builtin '{name}'. Use 'email', 'phone', or 'url'"),
            );
        }
    }
}

fn validate_detectors(config: &NluConfig, report: &mut ValidationReport) {
    let mut seen: Vec<&str> = Vec::new();
    for (i, detector) in config.detectors.iter().enumerate() {
        let path = format!("detectors[{i}]");
        let name = detector.name.trim();
        if name.is_empty() {
            report.error(format!("{path}.name"), "Detector name cannot be empty");
        } else if seen.contains(&name) {
            report.error(format!("{path}.name"), format!("Duplicate detector name '{name}'"));
        } else {
            seen.push(name);
        }
        if detector.pattern.trim().is_empty() {
            report.error(format!("{path}.pattern"), "Pattern cannot be empty");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DetectorConfig, FuzzyConfig};
    use parley_core::CatalogEntry;

    fn detector(name: &str, pattern: &str) -> DetectorConfig {
        DetectorConfig {
            name: name.into(),
            pattern: pattern.into(),
            ..Default::default()
        }
    }

    #[test]
    fn empty_config_only_warns() {
        let report = validate(&NluConfig::default());
        assert!(report.is_valid(), "errors: {:?}", report.errors);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn collects_all_errors() {
        let cfg = NluConfig {
            fuzzy: Some(FuzzyConfig {
                threshold: Some(1.5),
                limit: Some(0),
                ..Default::default()
            }),
            catalog: vec![CatalogEntry::new(" ", "Brno")],
            builtins: Some(vec!["phone".into(), "fax".into()]),
            detectors: vec![detector("room", r"\d+"), detector("room", ""), detector("", "x")],
            ..Default::default()
        };
        let report = validate(&cfg);
        let paths: Vec<&str> = report.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "fuzzy.threshold",
                "catalog[0].entity",
                "builtins[1]",
                "detectors[1].name",
                "detectors[1].pattern",
                "detectors[2].name",
            ]
        );
        assert_eq!(report.warnings[0].path, "fuzzy.limit");
    }
}
