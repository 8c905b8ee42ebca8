pub mod error;
pub mod types;

pub use error::NluError;
pub use types::{CatalogEntry, DetectedEntity, EntityAlternative};

/// Convenience alias for results produced by the parley crates.
pub type Result<T, E = NluError> = std::result::Result<T, E>;
