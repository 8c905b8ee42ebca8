use thiserror::Error;

/// Top-level error type for the entity recognition engine.
#[derive(Debug, Error)]
pub enum NluError {
    /// A detector was registered with options that can never work.
    #[error("invalid configuration of detector '{detector}': {message}")]
    DetectorConfig { detector: String, message: String },

    /// A detector returned a hit that violates the span contract.
    #[error("detector '{detector}' returned an invalid match: {message}")]
    DetectorContract { detector: String, message: String },

    #[error("invalid pattern for detector '{detector}': {message}")]
    Pattern { detector: String, message: String },

    #[error("unknown detector: {0}")]
    UnknownDetector(String),

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl NluError {
    pub fn detector_config(detector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DetectorConfig {
            detector: detector.into(),
            message: message.into(),
        }
    }

    pub fn contract(detector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DetectorContract {
            detector: detector.into(),
            message: message.into(),
        }
    }
}
