//! Configuration loading for Surveylab

mod schema;

pub use schema::{
    BootstrapConfig, BootstrapSettings, CleaningConfig, CleaningRules, CliOverrides, Config,
    FactorsConfig, FileVariant, H2Counts, HypothesisSwitch, PopulationConfig, PopulationRules,
    Settings, DEFAULT_ALPHA, DEFAULT_FRACTION, DEFAULT_ITERATIONS, DEFAULT_NUM_FACTORS,
    DEFAULT_SEED,
};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILENAME: &str = ".surveylabrc.json";

/// Find and load config file with extends resolution. Searches the data directory then parents.
pub fn load_config(work_dir: &Path, custom_path: Option<&Path>) -> Result<Config> {
    let path = if let Some(p) = custom_path {
        let path = if p.is_absolute() || p.exists() {
            p.to_path_buf()
        } else {
            work_dir.join(p)
        };
        if path.exists() {
            Some(path)
        } else {
            anyhow::bail!("Config file not found: {}", path.display());
        }
    } else {
        find_config_in_parents(work_dir)
    };

    match path {
        Some(path) => {
            debug!(config = %path.display(), "loading config");
            let config = load_config_with_extends(&path, &mut HashSet::new())?;
            validate(&config).with_context(|| format!("Invalid config: {}", path.display()))?;
            Ok(config)
        }
        None => Ok(Config::default()),
    }
}

/// Load a config file and resolve extends chain
fn load_config_with_extends(config_path: &Path, visited: &mut HashSet<PathBuf>) -> Result<Config> {
    // Prevent circular extends
    let canonical = config_path
        .canonicalize()
        .unwrap_or_else(|_| config_path.to_path_buf());
    if !visited.insert(canonical) {
        anyhow::bail!(
            "Circular extends detected in config: {}",
            config_path.display()
        );
    }

    let content = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config: {}", config_path.display()))?;
    let mut config: Config = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in config: {}", config_path.display()))?;

    if let Some(extends) = config.extends.take() {
        let base_config = resolve_extends(config_path, &extends, visited)?;
        config.merge_from(base_config);
    }

    Ok(config)
}

/// Resolve an extends reference relative to the extending config
fn resolve_extends(
    config_path: &Path,
    extends: &str,
    visited: &mut HashSet<PathBuf>,
) -> Result<Config> {
    let config_dir = config_path.parent().unwrap_or(Path::new("."));
    let extends_path = if Path::new(extends).is_absolute() {
        PathBuf::from(extends)
    } else {
        config_dir.join(extends)
    };

    // Ensure it has .json extension
    let extends_path = if extends_path.extension().is_none() {
        extends_path.with_extension("json")
    } else {
        extends_path
    };

    if !extends_path.exists() {
        anyhow::bail!(
            "Extended config not found: {} (referenced from {})",
            extends_path.display(),
            config_path.display()
        );
    }

    load_config_with_extends(&extends_path, visited)
}

/// Search for .surveylabrc.json in directory and its parents
fn find_config_in_parents(mut dir: &Path) -> Option<PathBuf> {
    loop {
        let candidate = dir.join(CONFIG_FILENAME);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
}

/// Reject values the analyses cannot work with
fn validate(config: &Config) -> Result<()> {
    if let Some(alpha) = config.alpha {
        if !(alpha > 0.0 && alpha < 1.0) {
            anyhow::bail!("alpha must be between 0 and 1, got {}", alpha);
        }
    }
    if let Some(fraction) = config.bootstrap.fraction {
        if !(fraction > 0.0 && fraction <= 1.0) {
            anyhow::bail!("bootstrap.fraction must be in (0, 1], got {}", fraction);
        }
    }
    if config.factors.num_factors == Some(0) {
        anyhow::bail!("factors.numFactors must be at least 1");
    }
    for entry in &config.files {
        if crate::Format::from_code(entry.format).is_none() {
            anyhow::bail!(
                "files entry `{}` has unknown format code {} (expected 1 or 2)",
                entry.glob,
                entry.format
            );
        }
    }
    Ok(())
}

/// Build a GlobSet from ignore patterns for path matching
pub fn build_ignore_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).with_context(|| format!("Invalid ignore pattern: {}", pattern))?;
        builder.add(glob);
    }
    builder.build().map_err(|e| anyhow::anyhow!("{}", e))
}

/// Check if a path should be ignored based on config glob patterns
pub fn is_ignored(path: &Path, ignore_set: &GlobSet) -> bool {
    ignore_set.is_match(path)
}

/// Default config written by `surveylab init`
pub fn default_config_json() -> String {
    let config = serde_json::json!({
        "alpha": DEFAULT_ALPHA,
        "minValid": 0,
        "ignore": ["**/archive/**"],
        "cleaning": {
            "minDurationSeconds": 1,
            "maxDurationSeconds": 3600,
            "minAnswered": 5,
            "flagStraightlining": false,
            "minTextLength": 10,
            "minTotalLength": 30
        },
        "population": {
            "roles": [2],
            "minVisitFrequency": 1,
            "minItemsForIic": 6
        },
        "factors": { "numFactors": DEFAULT_NUM_FACTORS },
        "bootstrap": {
            "enabled": true,
            "iterations": DEFAULT_ITERATIONS,
            "fraction": DEFAULT_FRACTION,
            "seed": DEFAULT_SEED
        },
        "hypotheses": {}
    });
    // A json! literal always serializes
    serde_json::to_string_pretty(&config).unwrap_or_default()
}
