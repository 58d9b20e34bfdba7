//! H3: response length depends on presentation format and box size

use super::{compare_groups, skipped, Hypothesis};
use crate::config::Settings;
use crate::error::SurveyError;
use crate::stats::inference::{two_way_anova, welch_t};
use crate::{BoxSize, Dataset, EffectSize, Format, GroupSummary, Respondent, StatisticKind, TestResult};

const FORMAT_FACTOR: &str = "Format";
const BOX_FACTOR: &str = "Box size";

pub struct ResponseLength;

/// Label of one format x box-size cell in the summaries
pub fn cell_label(format: Format, box_size: BoxSize) -> String {
    format!("{} / {}", format, box_size)
}

impl ResponseLength {
    /// Cleaned, grid-complete respondents who wrote more than the minimum total length
    fn analysed<'a>(dataset: &'a Dataset, settings: &Settings) -> Vec<&'a Respondent> {
        dataset
            .clean()
            .filter(|r| r.grid_complete())
            .filter(|r| r.response_length > settings.cleaning.min_total_length)
            .collect()
    }

    fn lengths(respondents: &[&Respondent], format: Format) -> Vec<f64> {
        respondents
            .iter()
            .filter(|r| r.variant.format == format)
            .map(|r| r.response_length as f64)
            .collect()
    }

    fn anova(&self, subset: &[&Respondent], alpha: f64) -> Vec<TestResult> {
        let y: Vec<f64> = subset.iter().map(|r| r.response_length as f64).collect();
        let slides: Vec<bool> = subset.iter().map(|r| r.variant.format == Format::Slides).collect();
        let large: Vec<bool> = subset
            .iter()
            .map(|r| r.variant.arm.box_size() == BoxSize::Large)
            .collect();
        let interaction = format!("{}:{}", FORMAT_FACTOR, BOX_FACTOR);
        let sources = [FORMAT_FACTOR, BOX_FACTOR, interaction.as_str()];

        let table = match two_way_anova(&y, &slides, &large, (FORMAT_FACTOR, BOX_FACTOR)) {
            Ok(table) => table,
            Err(e) => {
                return sources
                    .iter()
                    .map(|s| skipped(self.id(), &format!("ANOVA: {}", s), StatisticKind::F, e.clone()))
                    .collect()
            }
        };
        let df_resid = table.row("Residual").map(|r| r.df).unwrap_or(f64::NAN);

        table
            .rows
            .iter()
            .filter_map(|row| {
                let f = row.f?;
                let p = row.p_value?;
                let mut result = TestResult::new(
                    self.id(),
                    format!("ANOVA: {}", row.source),
                    StatisticKind::F,
                    f,
                    p,
                )
                .with_df(&[row.df, df_resid]);
                if let Some(eta) = row.partial_eta_squared {
                    result = result.with_effect(EffectSize::partial_eta_squared(eta));
                }
                Some(result.at_alpha(alpha))
            })
            .collect()
    }
}

impl Hypothesis for ResponseLength {
    fn id(&self) -> &'static str {
        "H3"
    }

    fn description(&self) -> &'static str {
        "Response length depends on presentation format and text-box size"
    }

    fn evaluate(&self, dataset: &Dataset, settings: &Settings) -> Result<Vec<TestResult>, SurveyError> {
        let subset = Self::analysed(dataset, settings);
        tracing::debug!(respondents = subset.len(), "response-length subset");

        let mut results = self.anova(&subset, settings.alpha);

        let single = Self::lengths(&subset, Format::SinglePage);
        let slides = Self::lengths(&subset, Format::Slides);
        let single_label = Format::SinglePage.to_string();
        let slides_label = Format::Slides.to_string();
        results.push(compare_groups(
            self.id(),
            "Length by format (Mann-Whitney)",
            (&single_label, &single),
            (&slides_label, &slides),
            settings.alpha,
        ));

        let label = "Length by format (Welch t)";
        let groups = vec![
            GroupSummary::of(&single_label, &single),
            GroupSummary::of(&slides_label, &slides),
        ];
        let welch = match welch_t(&single, &slides) {
            Ok(w) => TestResult::new(self.id(), label, StatisticKind::T, w.t, w.p_value).with_df(&[w.df]),
            Err(e) => skipped(self.id(), label, StatisticKind::T, e),
        };
        results.push(welch.with_groups(groups).at_alpha(settings.alpha));

        Ok(results)
    }

    fn summaries(&self, dataset: &Dataset, settings: &Settings) -> Vec<GroupSummary> {
        let subset = Self::analysed(dataset, settings);
        let mut summaries = Vec::new();
        for format in [Format::SinglePage, Format::Slides] {
            for box_size in [BoxSize::Small, BoxSize::Large] {
                let lengths: Vec<f64> = subset
                    .iter()
                    .filter(|r| r.variant.format == format && r.variant.arm.box_size() == box_size)
                    .map(|r| r.response_length as f64)
                    .collect();
                summaries.push(GroupSummary::of(cell_label(format, box_size), &lengths));
            }
        }

        // Everyone who wrote something, without the grid and length filters
        for format in [Format::SinglePage, Format::Slides] {
            let lengths: Vec<f64> = dataset
                .clean()
                .filter(|r| r.variant.format == format && r.response_length > 0)
                .map(|r| r.response_length as f64)
                .collect();
            summaries.push(GroupSummary::of(format!("{} (any text)", format), &lengths));
        }
        summaries
    }
}
