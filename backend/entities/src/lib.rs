//! `parley-entities` — entity detection over free text.
//!
//! Provides:
//! - A registry of regex and function detectors with dependency ordering
//! - `@NAME` placeholder patterns compiled against already resolved entities
//! - Overlap resolution with expected-entity preference
//! - Anonymization of sensitive spans
//! - Built-in contact detectors and a fuzzy catalog detector

pub mod builtin;
pub mod detector;
pub mod fuzzy_detector;
pub mod overlap;
pub mod pattern;
pub mod resolver;

pub use builtin::{register_builtins, Builtin};
pub use detector::{
    Detector, DetectorOptions, DetectorOptionsPatch, EntityDetector, EntityHit, FnDetector,
    ValueExtractor, ValueFn,
};
pub use fuzzy_detector::{register_catalog, FuzzyDetector};
pub use overlap::non_overlapping;
pub use resolver::{EntityResolver, ResolvedText, MAX_DETECTOR_ITERATIONS};
