//! Fills unset optional fields after loading.

use crate::schema::{FuzzyConfig, LoggingConfig, NluConfig};

/// Matches `parley_fuzzy::DEFAULT_THRESHOLD`.
pub const DEFAULT_THRESHOLD: f64 = 0.835;

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub fn apply_all_defaults(config: NluConfig) -> NluConfig {
    let config = apply_fuzzy_defaults(config);
    let config = apply_builtin_defaults(config);
    apply_logging_defaults(config)
}

fn apply_fuzzy_defaults(mut config: NluConfig) -> NluConfig {
    let fuzzy = config.fuzzy.get_or_insert_with(FuzzyConfig::default);
    if fuzzy.threshold.is_none() {
        fuzzy.threshold = Some(DEFAULT_THRESHOLD);
    }
    if fuzzy.keep_multiple_values.is_none() {
        fuzzy.keep_multiple_values = Some(false);
    }
    config
}

fn apply_builtin_defaults(mut config: NluConfig) -> NluConfig {
    config.builtins.get_or_insert_with(Vec::new);
    config
}

fn apply_logging_defaults(mut config: NluConfig) -> NluConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    if logging.level.is_none() {
        logging.level = Some(DEFAULT_LOG_LEVEL.to_string());
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_threshold_and_level() {
        let cfg = apply_all_defaults(NluConfig::default());
        assert_eq!(cfg.fuzzy.unwrap().threshold, Some(DEFAULT_THRESHOLD));
        assert_eq!(cfg.logging.unwrap().level.as_deref(), Some("info"));
        assert_eq!(cfg.builtins, Some(Vec::new()));
    }

    #[test]
    fn keeps_user_values() {
        let cfg = NluConfig {
            fuzzy: Some(FuzzyConfig {
                threshold: Some(0.7),
                ..Default::default()
            }),
            logging: Some(LoggingConfig {
                level: Some("debug".into()),
                dir: None,
            }),
            ..Default::default()
        };
        let cfg = apply_all_defaults(cfg);
        assert_eq!(cfg.fuzzy.unwrap().threshold, Some(0.7));
        assert_eq!(cfg.logging.unwrap().level.as_deref(), Some("debug"));
    }
}
