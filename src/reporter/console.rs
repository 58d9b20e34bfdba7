//! Console reporter with colored output

use super::format;
use crate::analysis::bootstrap::BootstrapReport;
use crate::analysis::psychometrics::PsychometricsReport;
use crate::{HypothesisReport, SampleSummary, StudyReport, TestResult};
use colored::Colorize;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{ContentArrangement, Table};
use std::fmt::Write;

/// Reporter for terminal output
pub struct ConsoleReporter {
    /// Whether to use colors
    use_colors: bool,
    /// Whether to show descriptive summaries and per-item details
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            use_colors: true,
            verbose: false,
        }
    }

    /// Disable colors
    pub fn without_colors(mut self) -> Self {
        self.use_colors = false;
        self
    }

    /// Enable verbose output
    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    /// Print the full report
    pub fn report(&self, report: &StudyReport) {
        print!("{}", self.render(report));
    }

    /// Print one line per test result
    pub fn report_quiet(&self, report: &StudyReport) {
        print!("{}", self.render_quiet(report));
    }

    pub fn render_quiet(&self, report: &StudyReport) -> String {
        let mut out = String::new();
        for result in report.hypotheses.iter().flat_map(|h| &h.results) {
            let _ = writeln!(
                out,
                "{} {}: {}",
                result.hypothesis,
                result.label,
                self.verdict(result)
            );
        }
        out
    }

    pub fn render(&self, report: &StudyReport) -> String {
        let mut out = String::new();
        self.write_header(&mut out, report);
        self.write_sample(&mut out, &report.sample);
        for hypothesis in &report.hypotheses {
            self.write_hypothesis(&mut out, hypothesis);
        }
        if let Some(psychometrics) = &report.psychometrics {
            self.write_psychometrics(&mut out, psychometrics);
        }
        if let Some(bootstrap) = &report.bootstrap {
            self.write_bootstrap(&mut out, bootstrap);
        }
        self.write_summary(&mut out, report);
        out
    }

    fn heading(&self, text: &str) -> String {
        if self.use_colors {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn verdict(&self, result: &TestResult) -> String {
        let text = match &result.skipped {
            Some(reason) => format!("skipped ({})", reason),
            None => format!(
                "{} = {}, p {}{}",
                result.statistic,
                format::number(result.value, 3),
                match format::p_value(result.p_value) {
                    p if p.starts_with('<') => p,
                    p => format!("= {}", p),
                },
                if result.significant { " *" } else { "" }
            ),
        };
        if !self.use_colors {
            return text;
        }
        if result.is_skipped() {
            text.dimmed().to_string()
        } else if result.significant {
            text.green().to_string()
        } else {
            text
        }
    }

    fn table(&self, header: Vec<&str>) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(header);
        table
    }

    fn write_header(&self, out: &mut String, report: &StudyReport) {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{}",
            self.heading(&format!(
                "Survey Analysis: {} export(s), α = {}",
                report.sources.len(),
                report.alpha
            ))
        );
        for source in &report.sources {
            let _ = writeln!(out, "   {}", source.display());
        }
        let _ = writeln!(out);
    }

    fn write_sample(&self, out: &mut String, sample: &SampleSummary) {
        let _ = writeln!(
            out,
            "{} {} respondents, {} valid after cleaning",
            self.heading("Sample:"),
            sample.total,
            sample.valid
        );
        let mut table = self.table(vec!["Variant", "Total", "Valid"]);
        for v in &sample.variants {
            table.add_row(vec![v.label.clone(), v.total.to_string(), v.valid.to_string()]);
        }
        let _ = writeln!(out, "{}", table);
        if !sample.flag_counts.is_empty() {
            let flags: Vec<String> = sample
                .flag_counts
                .iter()
                .map(|c| format!("{} {}", c.flag, c.count))
                .collect();
            let _ = writeln!(out, "   Excluded: {}", flags.join(", "));
        }
        let _ = writeln!(out);
    }

    fn write_hypothesis(&self, out: &mut String, hypothesis: &HypothesisReport) {
        let _ = writeln!(
            out,
            "{} {}",
            self.heading(&hypothesis.id),
            hypothesis.description
        );
        let mut table = self.table(vec!["Test", "Statistic", "df", "p", "Effect", "Groups"]);
        for r in &hypothesis.results {
            let groups = r.groups.iter().map(format::group).collect::<Vec<_>>().join("\n");
            match &r.skipped {
                Some(reason) => table.add_row(vec![
                    r.label.clone(),
                    format!("skipped: {}", reason),
                    String::new(),
                    String::new(),
                    String::new(),
                    groups,
                ]),
                None => table.add_row(vec![
                    r.label.clone(),
                    format!("{} = {}", r.statistic, format::number(r.value, 3)),
                    format::degrees_of_freedom(&r.df),
                    format!(
                        "{}{}",
                        format::p_value(r.p_value),
                        if r.significant { " *" } else { "" }
                    ),
                    format::effect(r),
                    groups,
                ]),
            };
        }
        let _ = writeln!(out, "{}", table);
        if self.verbose {
            for summary in &hypothesis.summaries {
                let _ = writeln!(out, "   {}", format::group(summary));
            }
        }
        let _ = writeln!(out);
    }

    fn write_psychometrics(&self, out: &mut String, report: &PsychometricsReport) {
        let _ = writeln!(
            out,
            "{} population of {} respondents",
            self.heading("Psychometrics:"),
            report.population
        );
        let adequacy = &report.adequacy;
        match (&adequacy.bartlett, &adequacy.kmo) {
            (Some(bartlett), Some(kmo)) => {
                let _ = writeln!(
                    out,
                    "   Bartlett χ² = {:.2}, df = {}, p {} (n = {})",
                    bartlett.chi_square,
                    bartlett.df,
                    format::p_value(bartlett.p_value),
                    adequacy.n
                );
                let _ = writeln!(out, "   KMO = {:.3} ({})", kmo.overall, kmo.label);
                if self.verbose {
                    let items: Vec<String> = kmo
                        .per_item
                        .iter()
                        .enumerate()
                        .map(|(k, v)| format!("{} {:.3}", crate::ITEM_LABELS[k], v))
                        .collect();
                    let _ = writeln!(out, "   KMO per item: {}", items.join(", "));
                }
            }
            _ => {
                let _ = writeln!(
                    out,
                    "   Sampling adequacy skipped: {}",
                    adequacy.skipped.as_deref().unwrap_or("not computed")
                );
            }
        }

        let mut table = self.table(vec!["Variant", "n", "Eigenvalues > 1", "Variance explained"]);
        for f in &report.factors {
            match &f.solution {
                Some(solution) => {
                    let kaiser = solution.eigenvalues.iter().filter(|e| **e > 1.0).count();
                    let variance: Vec<String> = solution
                        .variance_explained
                        .iter()
                        .map(|v| format!("{:.1}%", v * 100.0))
                        .collect();
                    table.add_row(vec![
                        f.label.clone(),
                        f.n.to_string(),
                        kaiser.to_string(),
                        variance.join(" / "),
                    ])
                }
                None => table.add_row(vec![
                    f.label.clone(),
                    f.n.to_string(),
                    String::new(),
                    format!("skipped: {}", f.skipped.as_deref().unwrap_or("")),
                ]),
            };
        }
        let _ = writeln!(out, "{}", table);
        let _ = writeln!(
            out,
            "   Mean inter-item correlation: {} (n = {}; {} with diagonal, rounded)",
            format::number(report.inter_item.mean, 3),
            report.inter_item.matrix.n,
            format::number(report.inter_item.mean_with_diagonal, 3)
        );
        let _ = writeln!(out);
    }

    fn write_bootstrap(&self, out: &mut String, report: &BootstrapReport) {
        let _ = writeln!(
            out,
            "{} {} iterations, {:.0}% subsamples, seed {}",
            self.heading("Bootstrap stability:"),
            report.settings.iterations,
            report.settings.fraction * 100.0,
            report.settings.seed
        );
        let mut table = self.table(vec!["Pair", "Kind", "Replicates", "2.5%", "Mean", "97.5%"]);
        for p in &report.pairs {
            let mut row = vec![p.label(), p.kind.to_string(), p.replicates.to_string()];
            match &p.skipped {
                Some(reason) => row.extend([format!("skipped: {}", reason), String::new(), String::new()]),
                None => row.extend([
                    format::optional(p.lower, 3),
                    format::optional(p.mean, 3),
                    format::optional(p.upper, 3),
                ]),
            }
            table.add_row(row);
        }
        let _ = writeln!(out, "{}", table);
        let _ = writeln!(
            out,
            "   Within-variant mean {} | between-variant mean {}",
            format::optional(report.within_mean, 3),
            format::optional(report.between_mean, 3)
        );
        let _ = writeln!(out);
    }

    fn write_summary(&self, out: &mut String, report: &StudyReport) {
        let results: Vec<&TestResult> = report.hypotheses.iter().flat_map(|h| &h.results).collect();
        let significant = results.iter().filter(|r| r.significant).count();
        let skipped = results.iter().filter(|r| r.is_skipped()).count();
        let _ = writeln!(out, "{}", "═".repeat(60));
        let _ = writeln!(
            out,
            "   {} tests, {} significant at α = {}, {} skipped",
            results.len(),
            significant,
            report.alpha,
            skipped
        );
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::tests::sample_report;

    #[test]
    fn test_render_sections() {
        let text = ConsoleReporter::new().without_colors().render(&sample_report());
        assert!(text.contains("Sample: 20 respondents, 18 valid"));
        assert!(text.contains("H2"));
        assert!(text.contains("All Questions Combined"));
        assert!(text.contains("0.0147 *"));
        assert!(text.contains("φ = 0.110 (small)"));
        assert!(text.contains("skipped: first group is empty"));
        assert!(text.contains("2 tests, 1 significant"));
    }

    #[test]
    fn test_quiet_one_line_per_result() {
        let text = ConsoleReporter::new().without_colors().render_quiet(&sample_report());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("H1 All respondents: skipped"));
        assert_eq!(
            lines[1],
            "H2 All Questions Combined: χ² = 5.951, p = 0.0147 *"
        );
    }
}
