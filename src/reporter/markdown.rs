//! Markdown reporter: one self-contained document with GFM tables

use super::format;
use crate::analysis::bootstrap::BootstrapReport;
use crate::analysis::psychometrics::PsychometricsReport;
use crate::{HypothesisReport, SampleSummary, StudyReport, ITEM_LABELS};
use std::fmt::Write;

pub struct MarkdownReporter {
    title: String,
}

impl MarkdownReporter {
    pub fn new() -> Self {
        Self {
            title: "Survey Analysis Report".to_string(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn report(&self, report: &StudyReport) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# {}\n", self.title);
        let _ = writeln!(
            out,
            "Generated {} from {} export(s). Significance level α = {}.\n",
            report.generated_at.format("%Y-%m-%d %H:%M UTC"),
            report.sources.len(),
            report.alpha
        );
        write_sample(&mut out, &report.sample);
        for hypothesis in &report.hypotheses {
            write_hypothesis(&mut out, hypothesis);
        }
        if let Some(psychometrics) = &report.psychometrics {
            write_psychometrics(&mut out, psychometrics);
        }
        if let Some(bootstrap) = &report.bootstrap {
            write_bootstrap(&mut out, bootstrap);
        }
        out
    }
}

impl Default for MarkdownReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Escape pipes so cell text cannot break a table row
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', "<br>")
}

fn row(out: &mut String, cells: &[String]) {
    let cells: Vec<String> = cells.iter().map(|c| cell(c)).collect();
    let _ = writeln!(out, "| {} |", cells.join(" | "));
}

fn header(out: &mut String, names: &[&str]) {
    let _ = writeln!(out, "| {} |", names.join(" | "));
    let _ = writeln!(out, "|{}", "---|".repeat(names.len()));
}

fn write_sample(out: &mut String, sample: &SampleSummary) {
    let _ = writeln!(out, "## Sample\n");
    let _ = writeln!(
        out,
        "{} respondents, {} valid after cleaning.\n",
        sample.total, sample.valid
    );
    header(out, &["Variant", "Total", "Valid"]);
    for v in &sample.variants {
        row(out, &[v.label.clone(), v.total.to_string(), v.valid.to_string()]);
    }
    if !sample.flag_counts.is_empty() {
        let _ = writeln!(out);
        for c in &sample.flag_counts {
            let _ = writeln!(out, "- {}: {}", c.flag, c.count);
        }
    }
    let _ = writeln!(out);
}

fn write_hypothesis(out: &mut String, hypothesis: &HypothesisReport) {
    let _ = writeln!(out, "## {}: {}\n", hypothesis.id, hypothesis.description);
    header(out, &["Test", "Statistic", "df", "p", "Effect", "Groups", "Significant"]);
    for r in &hypothesis.results {
        let groups = r.groups.iter().map(format::group).collect::<Vec<_>>().join("; ");
        match &r.skipped {
            Some(reason) => row(
                out,
                &[
                    r.label.clone(),
                    format!("skipped: {}", reason),
                    String::new(),
                    String::new(),
                    String::new(),
                    groups,
                    String::new(),
                ],
            ),
            None => row(
                out,
                &[
                    r.label.clone(),
                    format!("{} = {}", r.statistic, format::number(r.value, 3)),
                    format::degrees_of_freedom(&r.df),
                    format::p_value(r.p_value),
                    format::effect(r),
                    groups,
                    if r.significant { "yes" } else { "no" }.to_string(),
                ],
            ),
        }
    }
    if !hypothesis.summaries.is_empty() {
        let _ = writeln!(out);
        for summary in &hypothesis.summaries {
            let _ = writeln!(out, "- {}", format::group(summary));
        }
    }
    let _ = writeln!(out);
}

fn write_psychometrics(out: &mut String, report: &PsychometricsReport) {
    let _ = writeln!(out, "## Psychometrics\n");
    let _ = writeln!(out, "Population: {} respondents.\n", report.population);

    let _ = writeln!(out, "### Sampling adequacy\n");
    let adequacy = &report.adequacy;
    match (&adequacy.bartlett, &adequacy.kmo) {
        (Some(bartlett), Some(kmo)) => {
            let _ = writeln!(
                out,
                "Bartlett's test: χ² = {:.2}, df = {}, p = {} (n = {}).\n",
                bartlett.chi_square,
                bartlett.df,
                format::p_value(bartlett.p_value),
                adequacy.n
            );
            let _ = writeln!(out, "KMO = {:.3} ({}).\n", kmo.overall, kmo.label);
            header(out, &["Item", "KMO"]);
            for (k, v) in kmo.per_item.iter().enumerate() {
                row(out, &[ITEM_LABELS[k].to_string(), format!("{:.3}", v)]);
            }
            let _ = writeln!(out);
        }
        _ => {
            let _ = writeln!(
                out,
                "Skipped: {}.\n",
                adequacy.skipped.as_deref().unwrap_or("not computed")
            );
        }
    }

    let _ = writeln!(out, "### Factor structure\n");
    let _ = writeln!(
        out,
        "Variants are numbered 1 to {} in the order below; \
         their loadings are exported as `loadings1.csv` to `loadings{}.csv`.\n",
        report.factors.len(),
        report.factors.len()
    );
    for f in &report.factors {
        let _ = writeln!(out, "#### {} (n = {})\n", f.label, f.n);
        let Some(solution) = &f.solution else {
            let _ = writeln!(out, "Skipped: {}.\n", f.skipped.as_deref().unwrap_or(""));
            continue;
        };
        let eigen: Vec<String> = solution.eigenvalues.iter().map(|e| format!("{:.2}", e)).collect();
        let _ = writeln!(out, "Eigenvalues: {}.\n", eigen.join(", "));

        let factors = solution.loadings.cols();
        let mut names = vec!["Item".to_string()];
        names.extend((1..=factors).map(|f| format!("F{}", f)));
        names.push("h²".to_string());
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        header(out, &names);
        for i in 0..solution.loadings.rows() {
            let mut cells = vec![ITEM_LABELS[i].to_string()];
            cells.extend(solution.loadings.row(i).iter().map(|l| format!("{:.2}", l)));
            cells.push(format!("{:.2}", solution.communalities[i]));
            row(out, &cells);
        }
        let mut cells = vec!["Variance".to_string()];
        cells.extend(
            solution
                .variance_explained
                .iter()
                .map(|v| format!("{:.1}%", v * 100.0)),
        );
        cells.push(String::new());
        row(out, &cells);
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "### Inter-item correlation\n");
    let _ = writeln!(
        out,
        "Mean inter-item correlation over {} items: {} (n = {}). \
         Mean over every cell of the rounded matrix, diagonal included: {}.\n",
        report.inter_item.matrix.size(),
        format::number(report.inter_item.mean, 3),
        report.inter_item.matrix.n,
        format::number(report.inter_item.mean_with_diagonal, 3)
    );
}

fn write_bootstrap(out: &mut String, report: &BootstrapReport) {
    let _ = writeln!(out, "## Bootstrap stability\n");
    let _ = writeln!(
        out,
        "{} iterations, {:.0}% subsamples without replacement, seed {}. \
         Similarity is Kendall's τ-b between the item correlation matrices.\n",
        report.settings.iterations,
        report.settings.fraction * 100.0,
        report.settings.seed
    );
    header(out, &["Pair", "Kind", "Replicates", "2.5%", "Mean", "97.5%"]);
    for p in &report.pairs {
        let mut cells = vec![p.label(), p.kind.to_string(), p.replicates.to_string()];
        match &p.skipped {
            Some(reason) => cells.extend([format!("skipped: {}", reason), String::new(), String::new()]),
            None => cells.extend([
                format::optional(p.lower, 3),
                format::optional(p.mean, 3),
                format::optional(p.upper, 3),
            ]),
        }
        row(out, &cells);
    }
    let _ = writeln!(
        out,
        "\nMean within-variant stability {}, between-variant {}.",
        format::optional(report.within_mean, 3),
        format::optional(report.between_mean, 3)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures::{respondent, SINGLE_A, SLIDES_B};
    use crate::analysis::psychometrics;
    use crate::config::Settings;
    use crate::reporter::tests::sample_report;
    use crate::Dataset;

    #[test]
    fn test_sections_and_tables() {
        let md = MarkdownReporter::new().report(&sample_report());
        assert!(md.starts_with("# Survey Analysis Report\n"));
        assert!(md.contains("## Sample"));
        assert!(md.contains("## H1: "));
        assert!(md.contains("## H2: "));
        assert!(md.contains("| Variant | Total | Valid |\n|---|---|---|\n"));
        assert!(md.contains("| All Questions Combined | χ² = 5.951 | 1 | 0.0147 |"));
        assert!(md.contains("| All respondents | skipped: first group is empty |"));
    }

    #[test]
    fn test_psychometrics_section_names_exports() {
        let respondents = (0..8)
            .map(|i| respondent(i, if i % 2 == 0 { SINGLE_A } else { SLIDES_B }))
            .collect();
        let dataset = Dataset {
            respondents,
            sources: Vec::new(),
        };
        let mut report = sample_report();
        report.psychometrics = Some(psychometrics::analyze(&dataset, &Settings::default()));

        let md = MarkdownReporter::new().report(&report);
        assert!(md.contains("## Psychometrics"));
        assert!(md.contains("exported as `loadings1.csv` to `loadings4.csv`"));
        assert!(md.contains("diagonal included"));
    }

    #[test]
    fn test_cell_escaping() {
        assert_eq!(cell("a|b\nc"), "a\\|b<br>c");
    }
}
