//! Config schema and deserialization

use crate::{Arm, Format, Variant};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

pub const DEFAULT_ALPHA: f64 = 0.05;
pub const DEFAULT_ITERATIONS: usize = 1000;
pub const DEFAULT_FRACTION: f64 = 0.6;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_NUM_FACTORS: usize = 3;

/// Switch for a single hypothesis (on, off)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HypothesisSwitch {
    On,
    /// Skip the hypothesis entirely
    Off,
}

/// Respondent cleaning thresholds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleaningConfig {
    #[serde(default)]
    pub min_duration_seconds: Option<f64>,
    #[serde(default)]
    pub max_duration_seconds: Option<f64>,
    #[serde(default)]
    pub min_answered: Option<usize>,
    #[serde(default)]
    pub flag_straightlining: Option<bool>,
    /// Text answers shorter than this count as no answer
    #[serde(default)]
    pub min_text_length: Option<usize>,
    /// Response-length analysis only keeps totals above this
    #[serde(default)]
    pub min_total_length: Option<usize>,
}

/// Population filter for the psychometric analyses
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationConfig {
    #[serde(default)]
    pub roles: Option<Vec<u8>>,
    #[serde(default)]
    pub min_visit_frequency: Option<u8>,
    #[serde(default)]
    pub min_items_for_iic: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorsConfig {
    #[serde(default)]
    pub num_factors: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapConfig {
    #[serde(default)]
    pub iterations: Option<usize>,
    #[serde(default)]
    pub fraction: Option<f64>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// Declares the variant of every row in the files matching `glob`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileVariant {
    pub glob: String,
    /// Format code (1 = single page, 2 = slides)
    pub format: u8,
    pub arm: Arm,
}

/// Published answered / not-answered counts per box size for one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct H2Counts {
    pub label: String,
    /// [answered, not answered] with the large box
    pub large: [u64; 2],
    /// [answered, not answered] with the small box
    pub small: [u64; 2],
}

/// Root config structure for .surveylabrc.json
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Extend another config file (path relative to this config)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    /// Significance level. Default: 0.05
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,

    /// Minimum number of valid respondents (exit 1 if below). Default: 0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_valid: Option<usize>,

    /// Glob patterns for export files to skip
    #[serde(default)]
    pub ignore: Vec<String>,

    #[serde(default)]
    pub cleaning: CleaningConfig,

    #[serde(default)]
    pub population: PopulationConfig,

    #[serde(default)]
    pub factors: FactorsConfig,

    #[serde(default)]
    pub bootstrap: BootstrapConfig,

    /// Extra header names per canonical column, e.g. {"duration": ["vrijeme"]}
    #[serde(default)]
    pub column_aliases: HashMap<String, Vec<String>>,

    /// Per-file variant declarations for exports without variant columns
    #[serde(default)]
    pub files: Vec<FileVariant>,

    /// Per-hypothesis switches. Key is the lowercase id ("h1".."h4").
    #[serde(default)]
    pub hypotheses: HashMap<String, HypothesisSwitch>,

    /// Pre-tabulated box-size tables, used instead of counting respondents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h2_counts: Option<Vec<H2Counts>>,
}

impl Config {
    /// Merge CLI overrides into config. CLI values take precedence.
    pub fn merge_with_cli(mut self, cli: CliOverrides) -> Self {
        if cli.alpha.is_some() {
            self.alpha = cli.alpha;
        }
        if cli.min_valid.is_some() {
            self.min_valid = cli.min_valid;
        }
        if cli.iterations.is_some() {
            self.bootstrap.iterations = cli.iterations;
        }
        if cli.seed.is_some() {
            self.bootstrap.seed = cli.seed;
        }
        if cli.no_bootstrap {
            self.bootstrap.enabled = Some(false);
        }
        self
    }

    /// Variant declared for an export file by the first matching `files` entry
    pub fn variant_for_file(&self, file_path: &Path) -> Option<Variant> {
        self.files
            .iter()
            .find(|entry| Self::matches_glob(file_path, &entry.glob))
            .and_then(|entry| Some(Variant::new(Format::from_code(entry.format)?, entry.arm)))
    }

    /// Check if a file path matches a glob, either in full or by its trailing components
    fn matches_glob(file_path: &Path, pattern: &str) -> bool {
        let Ok(glob) = globset::Glob::new(pattern) else {
            return false;
        };
        let matcher = glob.compile_matcher();
        matcher.is_match(file_path)
            || file_path
                .file_name()
                .map(|name| matcher.is_match(Path::new(name)))
                .unwrap_or(false)
    }

    /// Merge another config into this one (for extends)
    pub fn merge_from(&mut self, base: Config) {
        // Base values are overridden by this config's values
        if self.alpha.is_none() {
            self.alpha = base.alpha;
        }
        if self.min_valid.is_none() {
            self.min_valid = base.min_valid;
        }
        if self.extends.is_none() {
            self.extends = base.extends;
        }

        let c = &mut self.cleaning;
        c.min_duration_seconds = c.min_duration_seconds.or(base.cleaning.min_duration_seconds);
        c.max_duration_seconds = c.max_duration_seconds.or(base.cleaning.max_duration_seconds);
        c.min_answered = c.min_answered.or(base.cleaning.min_answered);
        c.flag_straightlining = c.flag_straightlining.or(base.cleaning.flag_straightlining);
        c.min_text_length = c.min_text_length.or(base.cleaning.min_text_length);
        c.min_total_length = c.min_total_length.or(base.cleaning.min_total_length);

        let p = &mut self.population;
        if p.roles.is_none() {
            p.roles = base.population.roles;
        }
        p.min_visit_frequency = p.min_visit_frequency.or(base.population.min_visit_frequency);
        p.min_items_for_iic = p.min_items_for_iic.or(base.population.min_items_for_iic);

        self.factors.num_factors = self.factors.num_factors.or(base.factors.num_factors);

        let b = &mut self.bootstrap;
        b.iterations = b.iterations.or(base.bootstrap.iterations);
        b.fraction = b.fraction.or(base.bootstrap.fraction);
        b.seed = b.seed.or(base.bootstrap.seed);
        b.enabled = b.enabled.or(base.bootstrap.enabled);

        // Merge ignore patterns
        let mut all_ignores = base.ignore;
        all_ignores.append(&mut self.ignore);
        self.ignore = all_ignores;

        // Aliases accumulate per column
        for (column, aliases) in base.column_aliases {
            let entry = self.column_aliases.entry(column).or_default();
            for alias in aliases {
                if !entry.contains(&alias) {
                    entry.push(alias);
                }
            }
        }

        // This config's file entries win, so they come first
        self.files.extend(base.files);

        for (id, switch) in base.hypotheses {
            self.hypotheses.entry(id).or_insert(switch);
        }

        if self.h2_counts.is_none() {
            self.h2_counts = base.h2_counts;
        }
    }

    /// Resolve every setting to a concrete value
    pub fn settings(&self) -> Settings {
        let c = &self.cleaning;
        let p = &self.population;
        let b = &self.bootstrap;
        Settings {
            alpha: self.alpha.unwrap_or(DEFAULT_ALPHA),
            min_valid: self.min_valid.unwrap_or(0),
            cleaning: CleaningRules {
                min_duration_seconds: c.min_duration_seconds.unwrap_or(1.0),
                max_duration_seconds: c.max_duration_seconds.unwrap_or(3600.0),
                min_answered: c.min_answered.unwrap_or(5),
                flag_straightlining: c.flag_straightlining.unwrap_or(false),
                min_text_length: c.min_text_length.unwrap_or(10),
                min_total_length: c.min_total_length.unwrap_or(30),
            },
            population: PopulationRules {
                roles: p.roles.clone().unwrap_or_else(|| vec![2]),
                min_visit_frequency: p.min_visit_frequency.unwrap_or(1),
                min_items_for_iic: p.min_items_for_iic.unwrap_or(6),
            },
            num_factors: self.factors.num_factors.unwrap_or(DEFAULT_NUM_FACTORS),
            bootstrap: BootstrapSettings {
                enabled: b.enabled.unwrap_or(true),
                iterations: b.iterations.unwrap_or(DEFAULT_ITERATIONS),
                fraction: b.fraction.unwrap_or(DEFAULT_FRACTION),
                seed: b.seed.unwrap_or(DEFAULT_SEED),
            },
            disabled_hypotheses: self
                .hypotheses
                .iter()
                .filter(|(_, s)| **s == HypothesisSwitch::Off)
                .map(|(id, _)| id.to_lowercase())
                .collect(),
            h2_counts: self.h2_counts.clone(),
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub alpha: Option<f64>,
    pub min_valid: Option<usize>,
    pub iterations: Option<usize>,
    pub seed: Option<u64>,
    pub no_bootstrap: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleaningRules {
    pub min_duration_seconds: f64,
    pub max_duration_seconds: f64,
    pub min_answered: usize,
    pub flag_straightlining: bool,
    pub min_text_length: usize,
    pub min_total_length: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopulationRules {
    pub roles: Vec<u8>,
    pub min_visit_frequency: u8,
    pub min_items_for_iic: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapSettings {
    pub enabled: bool,
    pub iterations: usize,
    pub fraction: f64,
    pub seed: u64,
}

/// Effective configuration with defaults applied
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub alpha: f64,
    pub min_valid: usize,
    pub cleaning: CleaningRules,
    pub population: PopulationRules,
    pub num_factors: usize,
    pub bootstrap: BootstrapSettings,
    pub disabled_hypotheses: HashSet<String>,
    pub h2_counts: Option<Vec<H2Counts>>,
}

impl Settings {
    pub fn hypothesis_enabled(&self, id: &str) -> bool {
        !self.disabled_hypotheses.contains(&id.to_lowercase())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Config::default().settings()
    }
}
