//! H4: writing an open answer is associated with analytics consent

use super::{contingency, Hypothesis};
use crate::config::Settings;
use crate::error::SurveyError;
use crate::{Dataset, GroupSummary, StatisticKind, TestResult};
use std::collections::BTreeSet;

const LABEL: &str = "Text answer x analytics consent";

pub struct AnalyticsConsent;

impl Hypothesis for AnalyticsConsent {
    fn id(&self) -> &'static str {
        "H4"
    }

    fn description(&self) -> &'static str {
        "Respondents who write open answers consent to analytics differently"
    }

    fn evaluate(&self, dataset: &Dataset, settings: &Settings) -> Result<Vec<TestResult>, SurveyError> {
        let answered: Vec<(bool, u8)> = dataset
            .clean()
            .filter_map(|r| r.analytics_consent.map(|c| (r.has_text(), c)))
            .collect();
        if answered.is_empty() {
            tracing::warn!("no analytics consent answers; H4 skipped");
            return Ok(vec![TestResult::skipped(
                self.id(),
                LABEL,
                StatisticKind::ChiSquare,
                "no analytics consent column",
            )]);
        }

        let levels: Vec<u8> = answered
            .iter()
            .map(|(_, c)| *c)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut table = vec![vec![0.0; levels.len()]; 2];
        for (has_text, consent) in &answered {
            let row = if *has_text { 0 } else { 1 };
            if let Some(col) = levels.iter().position(|l| l == consent) {
                table[row][col] += 1.0;
            }
        }

        let groups = ["With text", "Without text"]
            .iter()
            .zip(&table)
            .map(|(label, row)| {
                let total: f64 = row.iter().sum();
                // Rate is the share answering with the highest consent code
                let consenting = row.last().copied().unwrap_or(0.0);
                GroupSummary::rate(*label, consenting, total)
            })
            .collect();
        Ok(vec![contingency(self.id(), LABEL, &table, groups, settings.alpha)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures::{respondent, with_text, SINGLE_A};

    #[test]
    fn test_missing_column_is_skipped() {
        let dataset = Dataset {
            respondents: vec![respondent(0, SINGLE_A)],
            sources: Vec::new(),
        };
        let results = AnalyticsConsent.evaluate(&dataset, &Settings::default()).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_skipped());
    }

    #[test]
    fn test_crosstab() {
        let mut respondents = Vec::new();
        for i in 0..40 {
            let mut r = respondent(i, SINGLE_A);
            if i < 20 {
                r = with_text(r, 0, "some thoughtful feedback");
            }
            // Text writers mostly consent, the rest mostly do not
            let consents = if i < 20 { i < 17 } else { i < 25 };
            r.analytics_consent = Some(if consents { 1 } else { 0 });
            respondents.push(r);
        }
        let dataset = Dataset {
            respondents,
            sources: Vec::new(),
        };
        let results = AnalyticsConsent.evaluate(&dataset, &Settings::default()).unwrap();
        let r = &results[0];
        assert!(!r.is_skipped());
        assert_eq!(r.df, vec![1.0]);
        assert!(r.effect.is_some());
        assert!(r.significant);
        assert_eq!(r.groups[0].rate, Some(85.0));
        assert_eq!(r.groups[1].rate, Some(25.0));
    }
}
