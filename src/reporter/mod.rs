//! Reporter module for output formatting

pub mod console;
pub mod export;
pub mod format;
pub mod json;
pub mod markdown;
pub mod svg;

pub use console::ConsoleReporter;
pub use export::CsvExporter;
pub use json::JsonReporter;
pub use markdown::MarkdownReporter;
pub use svg::SvgReporter;

#[cfg(test)]
pub(crate) mod tests {
    use crate::{
        EffectSize, GroupSummary, HypothesisReport, SampleSummary, StatisticKind, StudyReport,
        TestResult, Variant, VariantCount,
    };
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    /// A small report with one skipped and one significant result
    pub fn sample_report() -> StudyReport {
        let skipped = TestResult::skipped("H1", "All respondents", StatisticKind::U, "first group is empty")
            .with_groups(vec![
                GroupSummary::of("Single Page", &[]),
                GroupSummary::of("Slides", &[310.0, 290.0]),
            ])
            .at_alpha(0.05);
        let chi = TestResult::new("H2", "All Questions Combined", StatisticKind::ChiSquare, 5.95101, 0.0147089)
            .with_df(&[1.0])
            .with_effect(EffectSize::phi(0.110204))
            .with_groups(vec![
                GroupSummary::rate("Large box", 90.0, 259.0),
                GroupSummary::rate("Small box", 56.0, 231.0),
            ])
            .at_alpha(0.05);

        StudyReport {
            generated_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            sources: vec![PathBuf::from("data/wave1.csv")],
            alpha: 0.05,
            sample: SampleSummary {
                total: 20,
                valid: 18,
                flag_counts: Vec::new(),
                variants: Variant::ALL
                    .iter()
                    .map(|v| VariantCount {
                        variant: *v,
                        label: v.label(),
                        total: 5,
                        valid: if v.index() < 2 { 4 } else { 5 },
                    })
                    .collect(),
            },
            hypotheses: vec![
                HypothesisReport {
                    id: "H1".to_string(),
                    description: "Completion time differs between formats".to_string(),
                    results: vec![skipped],
                    summaries: Vec::new(),
                },
                HypothesisReport {
                    id: "H2".to_string(),
                    description: "Larger boxes reduce non-response".to_string(),
                    results: vec![chi],
                    summaries: Vec::new(),
                },
            ],
            psychometrics: None,
            bootstrap: None,
        }
    }
}
