//! The hypothesis battery

pub mod analytics_consent;
pub mod box_size;
pub mod completion_time;
pub mod response_length;

pub use analytics_consent::AnalyticsConsent;
pub use box_size::BoxSizeNonResponse;
pub use completion_time::CompletionTime;
pub use response_length::ResponseLength;

use crate::config::Settings;
use crate::error::{StatsError, SurveyError};
use crate::stats::inference::{chi_square_contingency, mann_whitney_u, phi};
use crate::{Dataset, EffectSize, GroupSummary, StatisticKind, TestResult};

/// Trait for one hypothesis of the battery
pub trait Hypothesis: Send + Sync {
    /// Short id, e.g. "H1"
    fn id(&self) -> &'static str;

    /// One-line statement of the hypothesis
    fn description(&self) -> &'static str;

    /// Run every test belonging to the hypothesis
    fn evaluate(&self, dataset: &Dataset, settings: &Settings)
        -> Result<Vec<TestResult>, SurveyError>;

    /// Descriptive figures reported alongside the tests
    fn summaries(&self, _dataset: &Dataset, _settings: &Settings) -> Vec<GroupSummary> {
        Vec::new()
    }
}

/// All hypotheses in report order
pub fn battery() -> Vec<Box<dyn Hypothesis>> {
    vec![
        Box::new(CompletionTime),
        Box::new(BoxSizeNonResponse),
        Box::new(ResponseLength),
        Box::new(AnalyticsConsent),
    ]
}

/// Two-group Mann-Whitney comparison; failed preconditions become a skipped result
pub(crate) fn compare_groups(
    hypothesis: &str,
    label: &str,
    first: (&str, &[f64]),
    second: (&str, &[f64]),
    alpha: f64,
) -> TestResult {
    let groups = vec![
        GroupSummary::of(first.0, first.1),
        GroupSummary::of(second.0, second.1),
    ];
    match mann_whitney_u(first.1, second.1) {
        Ok(mw) => TestResult::new(hypothesis, label, StatisticKind::U, mw.u, mw.p_value),
        Err(e) => skipped(hypothesis, label, StatisticKind::U, e),
    }
    .with_groups(groups)
    .at_alpha(alpha)
}

/// Chi-square test with phi on a contingency table of counts
pub(crate) fn contingency(
    hypothesis: &str,
    label: &str,
    table: &[Vec<f64>],
    groups: Vec<GroupSummary>,
    alpha: f64,
) -> TestResult {
    match chi_square_contingency(table) {
        Ok(chi) => {
            let result = TestResult::new(
                hypothesis,
                label,
                StatisticKind::ChiSquare,
                chi.statistic,
                chi.p_value,
            )
            .with_df(&[chi.dof as f64]);
            if chi.dof == 1 {
                result.with_effect(EffectSize::phi(phi(chi.statistic, chi.total)))
            } else {
                result
            }
        }
        Err(e) => skipped(hypothesis, label, StatisticKind::ChiSquare, e),
    }
    .with_groups(groups)
    .at_alpha(alpha)
}

pub(crate) fn skipped(
    hypothesis: &str,
    label: &str,
    statistic: StatisticKind,
    error: StatsError,
) -> TestResult {
    tracing::warn!(hypothesis, test = label, reason = %error, "test skipped");
    TestResult::skipped(hypothesis, label, statistic, error.to_string())
}
