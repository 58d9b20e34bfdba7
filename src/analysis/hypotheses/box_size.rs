//! H2: the larger text box lowers non-response to the open questions

use super::{contingency, Hypothesis};
use crate::config::{H2Counts, Settings};
use crate::error::SurveyError;
use crate::{BoxSize, Dataset, GroupSummary, Respondent, TestResult};

pub const QUESTION_LABELS: [&str; 3] = [
    "Question 1: Problems or Negative Experiences",
    "Question 2: Additional Information",
    "Question 3: Suggestions for Improvement",
];

pub const COMBINED_LABEL: &str = "All Questions Combined";

pub struct BoxSizeNonResponse;

impl BoxSizeNonResponse {
    /// [answered, not answered] counts per box size
    fn count(
        dataset: &Dataset,
        answered: impl Fn(&Respondent) -> bool,
    ) -> H2Counts {
        let mut large = [0u64; 2];
        let mut small = [0u64; 2];
        for r in dataset.clean() {
            let slot = if answered(r) { 0 } else { 1 };
            match r.variant.arm.box_size() {
                BoxSize::Large => large[slot] += 1,
                BoxSize::Small => small[slot] += 1,
            }
        }
        H2Counts {
            label: String::new(),
            large,
            small,
        }
    }

    fn tabulated(dataset: &Dataset, settings: &Settings) -> Vec<H2Counts> {
        let min_len = settings.cleaning.min_text_length;
        let mut tables: Vec<H2Counts> = (0..QUESTION_LABELS.len())
            .map(|q| H2Counts {
                label: QUESTION_LABELS[q].to_string(),
                ..Self::count(dataset, |r| {
                    r.texts[q]
                        .as_ref()
                        .map_or(false, |t| t.chars().count() >= min_len)
                })
            })
            .collect();
        tables.push(H2Counts {
            label: COMBINED_LABEL.to_string(),
            ..Self::count(dataset, Respondent::has_text)
        });
        tables
    }

    fn test(&self, counts: &H2Counts, alpha: f64) -> TestResult {
        let row = |c: [u64; 2]| vec![c[0] as f64, c[1] as f64];
        let table = vec![row(counts.large), row(counts.small)];
        let groups = vec![
            GroupSummary::rate(
                BoxSize::Large.to_string(),
                counts.large[0] as f64,
                (counts.large[0] + counts.large[1]) as f64,
            ),
            GroupSummary::rate(
                BoxSize::Small.to_string(),
                counts.small[0] as f64,
                (counts.small[0] + counts.small[1]) as f64,
            ),
        ];
        contingency(self.id(), &counts.label, &table, groups, alpha)
    }
}

impl Hypothesis for BoxSizeNonResponse {
    fn id(&self) -> &'static str {
        "H2"
    }

    fn description(&self) -> &'static str {
        "Larger text boxes reduce non-response to open-ended questions"
    }

    fn evaluate(&self, dataset: &Dataset, settings: &Settings) -> Result<Vec<TestResult>, SurveyError> {
        let tables = match &settings.h2_counts {
            Some(counts) => {
                tracing::debug!(tables = counts.len(), "using pre-tabulated box-size counts");
                counts.clone()
            }
            None => Self::tabulated(dataset, settings),
        };
        Ok(tables.iter().map(|t| self.test(t, settings.alpha)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures::{respondent, with_text, SINGLE_A, SLIDES_B};
    use crate::EffectKind;

    #[test]
    fn test_pre_tabulated_combined_table() {
        let settings = Settings {
            h2_counts: Some(vec![H2Counts {
                label: "All Questions Combined (Total Sample)".to_string(),
                large: [90, 169],
                small: [56, 175],
            }]),
            ..Settings::default()
        };
        let results = BoxSizeNonResponse
            .evaluate(&Dataset::default(), &settings)
            .unwrap();
        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert!((r.value - 5.95101).abs() < 1e-4);
        assert!((r.p_value - 0.0147089).abs() < 1e-5);
        assert_eq!(r.df, vec![1.0]);
        let effect = r.effect.as_ref().unwrap();
        assert_eq!(effect.kind, EffectKind::Phi);
        assert!((effect.value - 0.110204).abs() < 1e-5);
        assert!(r.significant);
        assert!((r.groups[0].rate.unwrap() - 34.749).abs() < 1e-3);
    }

    #[test]
    fn test_counts_from_respondents() {
        let mut respondents = Vec::new();
        for i in 0..20 {
            let r = respondent(i, SLIDES_B);
            respondents.push(if i < 12 {
                with_text(r, 1, "the large box invites writing")
            } else {
                r
            });
        }
        for i in 20..40 {
            let r = respondent(i, SINGLE_A);
            respondents.push(if i < 24 { with_text(r, 1, "too short") } else { r });
        }
        let dataset = Dataset {
            respondents,
            sources: Vec::new(),
        };
        let results = BoxSizeNonResponse
            .evaluate(&dataset, &Settings::default())
            .unwrap();
        assert_eq!(results.len(), 4);

        // Question 1 has no answers at all: a zero column
        assert!(results[0].is_skipped());

        // "too short" is below the minimum text length
        let q2 = &results[1];
        assert_eq!(q2.label, QUESTION_LABELS[1]);
        assert_eq!(q2.groups[0].rate, Some(60.0));
        assert_eq!(q2.groups[1].rate, Some(0.0));
        assert!(q2.significant);

        assert_eq!(results[3].label, COMBINED_LABEL);
    }
}
