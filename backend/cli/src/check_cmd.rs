//! `parley check`: validate a config and report what the engine would load.

use anyhow::{bail, Result};
use parley_config::{NluConfig, ValidationReport};

pub fn run(config: &NluConfig, report: &ValidationReport) -> Result<()> {
    println!("\n🔍 Checking parley config...\n");

    println!("Loaded:");
    println!("  • {} catalog entries", config.catalog.len());
    println!("  • {} builtin detectors", config.builtins.as_ref().map_or(0, Vec::len));
    println!("  • {} pattern detectors", config.detectors.len());

    if !report.warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &report.warnings {
            println!("  🟡 {}: {}", warning.path, warning.message);
        }
    }
    if !report.errors.is_empty() {
        println!("\nErrors:");
        for error in &report.errors {
            println!("  🔴 {}: {}", error.path, error.message);
        }
    }

    println!();
    if report.is_valid() {
        println!("✅ Config is valid.");
        Ok(())
    } else {
        println!("❌ Config has errors. Fix them before resolving text.");
        bail!("{} config error(s)", report.errors.len())
    }
}
