//! Builds the index and resolver described by a config.

use std::sync::Arc;

use anyhow::{Context, Result};
use parley_config::{DetectorConfig, NluConfig};
use parley_entities::{
    register_builtins, register_catalog, Builtin, Detector, DetectorOptions, DetectorOptionsPatch,
    EntityResolver, ValueExtractor,
};
use parley_fuzzy::{FuzzyIndex, SearchOptions};
use tracing::info;

pub struct Engine {
    pub index: Arc<FuzzyIndex>,
    pub resolver: EntityResolver,
    pub search_options: SearchOptions,
}

pub fn search_options(config: &NluConfig) -> SearchOptions {
    let mut options = SearchOptions::default();
    if let Some(fuzzy) = &config.fuzzy {
        if let Some(threshold) = fuzzy.threshold {
            options.threshold = threshold;
        }
        options.limit = fuzzy.limit;
        options.keep_multiple_values = fuzzy.keep_multiple_values.unwrap_or(false);
    }
    options
}

fn detector_options(detector: &DetectorConfig) -> DetectorOptions {
    let mut options = DetectorOptions::default();
    options.apply(DetectorOptionsPatch {
        anonymize: detector.anonymize,
        dependencies: Some(detector.dependencies.clone()),
        clear_overlaps: detector.clear_overlaps,
        match_whole_words: detector.match_whole_words,
        replace_diacritics: detector.replace_diacritics,
        case_sensitive_regex: detector.case_sensitive_regex,
        extract_value: Some(detector.extract_value.clone().map(ValueExtractor::Group)),
        search_sub_words: detector.search_sub_words,
    });
    options
}

pub fn build_engine(config: &NluConfig) -> Result<Engine> {
    let search_options = search_options(config);
    let index = Arc::new(FuzzyIndex::build(config.catalog.clone()));

    let mut resolver = EntityResolver::new();
    let builtins = config
        .builtins
        .iter()
        .flatten()
        .map(|name| name.parse::<Builtin>())
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid builtin detector")?;
    register_builtins(&mut resolver, &builtins)?;

    for detector in &config.detectors {
        resolver
            .set_entity_detector(
                detector.name.clone(),
                Detector::regex(detector.pattern.clone()),
                detector_options(detector),
            )
            .with_context(|| format!("Failed to register detector '{}'", detector.name))?;
    }
    register_catalog(
        &mut resolver,
        Arc::clone(&index),
        &search_options,
        &DetectorOptions::default(),
    )
    .context("Catalog entity names must not repeat detector names")?;

    info!(
        catalog_entries = index.catalog().len(),
        detectors = resolver.detector_names().len(),
        "Engine ready"
    );
    Ok(Engine {
        index,
        resolver,
        search_options,
    })
}
