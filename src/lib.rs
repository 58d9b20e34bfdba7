//! Surveylab: survey response harmonization and statistical testing
//!
//! This library reads the exports of a four-variant questionnaire experiment
//! (presentation format crossed with item order and input-box size), maps them
//! onto one respondent schema and runs the hypothesis battery, psychometric
//! structure analysis and bootstrap stability check behind the case-study
//! tables.

pub mod analysis;
pub mod cache;
pub mod config;
pub mod error;
pub mod ingest;
pub mod reporter;
pub mod stats;
pub mod watcher;

use analysis::bootstrap::BootstrapReport;
use analysis::psychometrics::PsychometricsReport;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use stats::inference::Magnitude;
use std::path::{Path, PathBuf};

/// Canonical grid item labels, in questionnaire order A
pub const ITEM_LABELS: [&str; 13] = [
    "g01", "g02", "g03", "g04", "g05", "g06", "g07", "g08", "g09", "g10", "g11", "g12", "g13",
];

/// Number of leading grid items that enter the factor and stability analyses
pub const FACTOR_ITEMS: usize = 12;

/// Presentation order B, as canonical item indexes. Item 13 is always last.
pub const ORDER_B: [usize; FACTOR_ITEMS] = [1, 10, 3, 0, 4, 8, 6, 2, 7, 9, 5, 11];

/// Presentation format of the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Format {
    SinglePage,
    Slides,
}

impl Format {
    /// Parse the export's format code (1 = single page, 2 = slides)
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Format::SinglePage),
            2 => Some(Format::Slides),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Format::SinglePage => 1,
            Format::Slides => 2,
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::SinglePage => write!(f, "Single Page"),
            Format::Slides => write!(f, "Slides"),
        }
    }
}

/// Randomization arm; fixes both item order and input-box size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Arm {
    A,
    B,
}

impl Arm {
    /// Derive the arm from the `hidden` randomization draw (1..100)
    pub fn from_hidden(hidden: f64) -> Self {
        if hidden < 51.0 {
            Arm::A
        } else {
            Arm::B
        }
    }

    pub fn item_order(self) -> ItemOrder {
        match self {
            Arm::A => ItemOrder::A,
            Arm::B => ItemOrder::B,
        }
    }

    pub fn box_size(self) -> BoxSize {
        match self {
            Arm::A => BoxSize::Small,
            Arm::B => BoxSize::Large,
        }
    }
}

impl std::fmt::Display for Arm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arm::A => write!(f, "A"),
            Arm::B => write!(f, "B"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemOrder {
    A,
    B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxSize {
    Small,
    Large,
}

impl std::fmt::Display for BoxSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoxSize::Small => write!(f, "Small box"),
            BoxSize::Large => write!(f, "Large box"),
        }
    }
}

/// One of the four questionnaire variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Variant {
    pub format: Format,
    pub arm: Arm,
}

impl Variant {
    pub const ALL: [Variant; 4] = [
        Variant::new(Format::SinglePage, Arm::A),
        Variant::new(Format::SinglePage, Arm::B),
        Variant::new(Format::Slides, Arm::A),
        Variant::new(Format::Slides, Arm::B),
    ];

    pub const fn new(format: Format, arm: Arm) -> Self {
        Self { format, arm }
    }

    /// Position in [`Variant::ALL`] (0..=3)
    pub fn index(self) -> usize {
        let f = match self.format {
            Format::SinglePage => 0,
            Format::Slides => 2,
        };
        f + match self.arm {
            Arm::A => 0,
            Arm::B => 1,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn label(self) -> String {
        format!("{} - Order {}", self.format, self.arm)
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Reason a respondent is excluded from the cleaned sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleaningFlag {
    TooFast,
    TooSlow,
    Incomplete,
    Straightlined,
}

impl std::fmt::Display for CleaningFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CleaningFlag::TooFast => write!(f, "too-fast"),
            CleaningFlag::TooSlow => write!(f, "too-slow"),
            CleaningFlag::Incomplete => write!(f, "incomplete"),
            CleaningFlag::Straightlined => write!(f, "straightlined"),
        }
    }
}

/// One harmonized survey response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Respondent {
    pub id: String,
    pub variant: Variant,
    /// Respondent role (2 = student)
    pub role: Option<u8>,
    pub visit_frequency: Option<u8>,
    /// Likert answers (1-5), one slot per canonical item g01..g13
    pub items: Vec<Option<f64>>,
    /// The three open-ended answers, whichever box the variant showed
    pub texts: [Option<String>; 3],
    pub started_at: Option<NaiveDateTime>,
    pub submitted_at: Option<NaiveDateTime>,
    pub duration_seconds: Option<f64>,
    pub answered_count: usize,
    pub analytics_consent: Option<u8>,
    /// Longest open-ended answer in characters; 0 when below the minimum text length
    pub response_length: usize,
    pub flags: Vec<CleaningFlag>,
}

impl Respondent {
    pub fn has_text(&self) -> bool {
        self.response_length > 0
    }

    /// All 13 grid items answered
    pub fn grid_complete(&self) -> bool {
        self.items.len() == ITEM_LABELS.len() && self.items.iter().all(Option::is_some)
    }

    pub fn is_clean(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn non_null_items(&self) -> usize {
        self.items.iter().filter(|i| i.is_some()).count()
    }

    /// The factor items (g01..g12) when all of them are present
    pub fn complete_factor_items(&self) -> Option<Vec<f64>> {
        self.items.iter().take(FACTOR_ITEMS).copied().collect()
    }
}

/// All harmonized respondents plus the files they came from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub respondents: Vec<Respondent>,
    pub sources: Vec<PathBuf>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.respondents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.respondents.is_empty()
    }

    /// Respondents without any cleaning flag
    pub fn clean(&self) -> impl Iterator<Item = &Respondent> {
        self.respondents.iter().filter(|r| r.is_clean())
    }

    pub fn valid_count(&self) -> usize {
        self.clean().count()
    }

    pub fn summary(&self) -> SampleSummary {
        let mut flag_counts: Vec<FlagCount> = Vec::new();
        for flag in self.respondents.iter().flat_map(|r| r.flags.iter()) {
            match flag_counts.iter_mut().find(|c| c.flag == *flag) {
                Some(c) => c.count += 1,
                None => flag_counts.push(FlagCount {
                    flag: *flag,
                    count: 1,
                }),
            }
        }
        flag_counts.sort_by_key(|c| c.flag);

        let variants = Variant::ALL
            .iter()
            .map(|v| {
                let members: Vec<&Respondent> = self
                    .respondents
                    .iter()
                    .filter(|r| r.variant == *v)
                    .collect();
                VariantCount {
                    variant: *v,
                    label: v.label(),
                    total: members.len(),
                    valid: members.iter().filter(|r| r.is_clean()).count(),
                }
            })
            .collect();

        SampleSummary {
            total: self.len(),
            valid: self.valid_count(),
            flag_counts,
            variants,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagCount {
    pub flag: CleaningFlag,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantCount {
    pub variant: Variant,
    pub label: String,
    pub total: usize,
    pub valid: usize,
}

/// Sample sizes before and after cleaning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleSummary {
    pub total: usize,
    pub valid: usize,
    pub flag_counts: Vec<FlagCount>,
    pub variants: Vec<VariantCount>,
}

/// Test statistic reported by a hypothesis test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatisticKind {
    U,
    ChiSquare,
    T,
    F,
}

impl std::fmt::Display for StatisticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatisticKind::U => write!(f, "U"),
            StatisticKind::ChiSquare => write!(f, "χ²"),
            StatisticKind::T => write!(f, "t"),
            StatisticKind::F => write!(f, "F"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectKind {
    Phi,
    PartialEtaSquared,
}

impl std::fmt::Display for EffectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EffectKind::Phi => write!(f, "φ"),
            EffectKind::PartialEtaSquared => write!(f, "partial η²"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectSize {
    pub kind: EffectKind,
    pub value: f64,
    pub magnitude: Magnitude,
}

impl EffectSize {
    pub fn phi(value: f64) -> Self {
        Self {
            kind: EffectKind::Phi,
            value,
            magnitude: Magnitude::from_phi(value),
        }
    }

    pub fn partial_eta_squared(value: f64) -> Self {
        Self {
            kind: EffectKind::PartialEtaSquared,
            value,
            magnitude: Magnitude::from_partial_eta_squared(value),
        }
    }
}

/// Per-group figures attached to a test result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub label: String,
    pub n: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std: Option<f64>,
    /// Response rate in percent (box-size comparisons)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
}

impl GroupSummary {
    /// Descriptive summary of a numeric group
    pub fn of(label: impl Into<String>, values: &[f64]) -> Self {
        let d = stats::Descriptives::of(values);
        Self {
            label: label.into(),
            n: values.len(),
            mean: d.as_ref().map(|d| d.mean),
            median: d.as_ref().map(|d| d.median),
            std: d.as_ref().map(|d| d.std).filter(|s| s.is_finite()),
            rate: None,
        }
    }

    /// Count-only summary with a response rate
    pub fn rate(label: impl Into<String>, answered: f64, total: f64) -> Self {
        Self {
            label: label.into(),
            n: total as usize,
            mean: None,
            median: None,
            std: None,
            rate: (total > 0.0).then(|| answered / total * 100.0),
        }
    }
}

/// Outcome of one statistical test within a hypothesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Hypothesis id (e.g. "H1")
    pub hypothesis: String,
    pub label: String,
    pub statistic: StatisticKind,
    pub value: f64,
    /// Degrees of freedom (none, one, or numerator and denominator)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub df: Vec<f64>,
    pub p_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect: Option<EffectSize>,
    pub significant: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupSummary>,
    /// Reason the test could not be run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

impl TestResult {
    pub fn new(
        hypothesis: &str,
        label: impl Into<String>,
        statistic: StatisticKind,
        value: f64,
        p_value: f64,
    ) -> Self {
        Self {
            hypothesis: hypothesis.to_string(),
            label: label.into(),
            statistic,
            value,
            df: Vec::new(),
            p_value,
            effect: None,
            significant: false,
            groups: Vec::new(),
            skipped: None,
        }
    }

    /// A test that could not be computed, with the reason
    pub fn skipped(
        hypothesis: &str,
        label: impl Into<String>,
        statistic: StatisticKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            skipped: Some(reason.into()),
            ..Self::new(hypothesis, label, statistic, f64::NAN, f64::NAN)
        }
    }

    pub fn with_df(mut self, df: &[f64]) -> Self {
        self.df = df.to_vec();
        self
    }

    pub fn with_effect(mut self, effect: EffectSize) -> Self {
        self.effect = Some(effect);
        self
    }

    pub fn with_groups(mut self, groups: Vec<GroupSummary>) -> Self {
        self.groups = groups;
        self
    }

    /// Mark significance at `alpha`
    pub fn at_alpha(mut self, alpha: f64) -> Self {
        self.significant = self.skipped.is_none() && self.p_value < alpha;
        self
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}

/// All results of one hypothesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HypothesisReport {
    pub id: String,
    pub description: String,
    pub results: Vec<TestResult>,
    /// Descriptive figures that are not tied to a single test
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub summaries: Vec<GroupSummary>,
}

impl HypothesisReport {
    pub fn significant_count(&self) -> usize {
        self.results.iter().filter(|r| r.significant).count()
    }
}

/// Everything produced by one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyReport {
    pub generated_at: DateTime<Utc>,
    pub sources: Vec<PathBuf>,
    pub alpha: f64,
    pub sample: SampleSummary,
    pub hypotheses: Vec<HypothesisReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub psychometrics: Option<PsychometricsReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<BootstrapReport>,
}

/// Public API: harmonize the exports under `path` and run the full analysis.
///
/// * `path` - a CSV export or a directory of exports
/// * `config_path` - optional path to .surveylabrc.json; if None, searches from the data directory
pub fn analyze_path(path: &Path, config_path: Option<&Path>) -> anyhow::Result<StudyReport> {
    let work_dir = data_dir(path);
    let config = config::load_config(&work_dir, config_path)?;
    let dataset = ingest::load_dataset(path, &config)?;
    let engine = analysis::AnalysisEngine::new(config.settings());
    Ok(engine.run(&dataset)?)
}

/// Directory used for config discovery and the cache file
pub fn data_dir(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.to_path_buf()
    } else {
        path.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_index_round_trip() {
        for (i, v) in Variant::ALL.iter().enumerate() {
            assert_eq!(v.index(), i);
            assert_eq!(Variant::from_index(i), Some(*v));
        }
        assert_eq!(Variant::from_index(4), None);
        assert_eq!(Variant::ALL[3].label(), "Slides - Order B");
    }

    #[test]
    fn test_arm_from_hidden_boundary() {
        assert_eq!(Arm::from_hidden(50.0), Arm::A);
        assert_eq!(Arm::from_hidden(51.0), Arm::B);
        assert_eq!(Arm::B.box_size(), BoxSize::Large);
        assert_eq!(Arm::A.item_order(), ItemOrder::A);
    }

    #[test]
    fn test_order_b_is_permutation() {
        let mut sorted = ORDER_B.to_vec();
        sorted.sort();
        assert_eq!(sorted, (0..FACTOR_ITEMS).collect::<Vec<_>>());
    }

    #[test]
    fn test_skipped_result_is_never_significant() {
        let r = TestResult::skipped("H1", "all", StatisticKind::U, "empty group").at_alpha(0.05);
        assert!(!r.significant);
        assert!(r.is_skipped());
        let r = TestResult::new("H1", "all", StatisticKind::U, 10.0, 0.01).at_alpha(0.05);
        assert!(r.significant);
    }

    #[test]
    fn test_group_rate() {
        let g = GroupSummary::rate("Large box", 90.0, 259.0);
        assert_eq!(g.n, 259);
        assert!((g.rate.unwrap() - 34.749_034_749).abs() < 1e-6);
    }
}
