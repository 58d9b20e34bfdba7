//! H1: completion time differs between presentation formats

use super::{compare_groups, Hypothesis};
use crate::config::Settings;
use crate::error::SurveyError;
use crate::{Dataset, Format, Respondent, TestResult};

pub struct CompletionTime;

impl CompletionTime {
    fn durations<'a>(
        respondents: impl Iterator<Item = &'a Respondent>,
        format: Format,
    ) -> Vec<f64> {
        respondents
            .filter(|r| r.variant.format == format)
            .filter_map(|r| r.duration_seconds)
            .collect()
    }
}

impl Hypothesis for CompletionTime {
    fn id(&self) -> &'static str {
        "H1"
    }

    fn description(&self) -> &'static str {
        "Completion time differs between single-page and slide presentation"
    }

    fn evaluate(&self, dataset: &Dataset, settings: &Settings) -> Result<Vec<TestResult>, SurveyError> {
        let subsets: [(&str, fn(&Respondent) -> bool); 3] = [
            ("All respondents", |_| true),
            ("With text answers", Respondent::has_text),
            ("Without text answers", |r| !r.has_text()),
        ];

        let results = subsets
            .iter()
            .map(|(label, keep)| {
                let single = Self::durations(dataset.clean().filter(|r| keep(r)), Format::SinglePage);
                let slides = Self::durations(dataset.clean().filter(|r| keep(r)), Format::Slides);
                compare_groups(
                    self.id(),
                    label,
                    (&Format::SinglePage.to_string(), &single),
                    (&Format::Slides.to_string(), &slides),
                    settings.alpha,
                )
            })
            .collect();
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures::{respondent, with_text, SINGLE_A, SLIDES_B};
    use crate::CleaningFlag;

    fn dataset() -> Dataset {
        let mut respondents = Vec::new();
        for i in 0..10 {
            let mut r = respondent(i, SINGLE_A);
            r.duration_seconds = Some(200.0 + i as f64);
            respondents.push(if i % 2 == 0 { with_text(r, 0, "a long enough answer") } else { r });
        }
        for i in 10..20 {
            let mut r = respondent(i, SLIDES_B);
            r.duration_seconds = Some(400.0 + i as f64);
            respondents.push(r);
        }
        // Flagged respondents never enter the comparison
        let mut fast = respondent(99, SINGLE_A);
        fast.duration_seconds = Some(1.0);
        fast.flags.push(CleaningFlag::TooFast);
        respondents.push(fast);
        Dataset {
            respondents,
            sources: Vec::new(),
        }
    }

    #[test]
    fn test_three_subsets() {
        let results = CompletionTime.evaluate(&dataset(), &Settings::default()).unwrap();
        assert_eq!(results.len(), 3);

        let all = &results[0];
        assert_eq!(all.groups[0].n, 10);
        assert_eq!(all.groups[1].n, 10);
        // Complete separation of the two groups
        assert_eq!(all.value, 0.0);
        assert!(all.significant);
    }

    #[test]
    fn test_empty_subset_is_skipped() {
        let results = CompletionTime.evaluate(&dataset(), &Settings::default()).unwrap();
        // No slide respondent wrote text
        let with_text = &results[1];
        assert!(with_text.is_skipped());
        assert!(!with_text.significant);
        assert_eq!(with_text.groups[0].n, 5);
        assert_eq!(with_text.groups[1].n, 0);
    }
}
