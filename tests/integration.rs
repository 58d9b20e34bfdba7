//! Integration tests: full analysis pipeline against test-data/wave1/

use std::path::Path;
use surveylab::analysis::AnalysisEngine;
use surveylab::config::{load_config, CliOverrides};
use surveylab::ingest::load_dataset;
use surveylab::{Arm, Format, StatisticKind, StudyReport, Variant};

const WAVE: &str = "test-data/wave1";

fn analyze(path: &str) -> StudyReport {
    surveylab::analyze_path(Path::new(path), None)
        .unwrap_or_else(|e| panic!("analyze({}) failed: {:#}", path, e))
}

#[test]
fn sample_counts_across_exports() {
    let report = analyze(WAVE);
    assert_eq!(report.sources.len(), 3);
    assert_eq!(report.sample.total, 128);
    assert_eq!(report.sample.valid, 125);

    let totals: Vec<usize> = report.sample.variants.iter().map(|v| v.total).collect();
    assert_eq!(totals, vec![38, 26, 32, 32]);
}

#[test]
fn positional_export_remapped_to_canonical_items() {
    let config = load_config(Path::new(WAVE), None).unwrap();
    let dataset = load_dataset(Path::new(WAVE), &config).unwrap();
    let first = dataset
        .respondents
        .iter()
        .find(|r| r.id == "sb001")
        .expect("slides B respondent");

    assert_eq!(first.variant, Variant::new(Format::Slides, Arm::B));
    // Presentation slots 1, 4, 6 and 13 hold g02, g01, g09 and g13
    assert_eq!(first.items[1], Some(4.0));
    assert_eq!(first.items[0], Some(4.0));
    assert_eq!(first.items[8], Some(2.0));
    assert_eq!(first.items[12], Some(5.0));
}

#[test]
fn every_hypothesis_reports() {
    let report = analyze(WAVE);
    let ids: Vec<&str> = report.hypotheses.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["H1", "H2", "H3", "H4"]);

    let h1 = &report.hypotheses[0];
    assert_eq!(h1.results.len(), 3);
    assert!(h1.results.iter().all(|r| r.statistic == StatisticKind::U));
    // Single page durations are drawn well above slides durations
    assert!(h1.results[0].significant, "{:?}", h1.results[0]);

    let h2 = &report.hypotheses[1];
    assert_eq!(h2.results.len(), 4);
    assert!(h2.results.iter().all(|r| r.statistic == StatisticKind::ChiSquare));

    let h3 = &report.hypotheses[2];
    assert!(h3.results.iter().any(|r| r.label == "ANOVA: Format:Box size"));
    assert!(!h3.summaries.is_empty());

    let h4 = &report.hypotheses[3];
    assert_eq!(h4.results.len(), 1);
    assert!(!h4.results[0].is_skipped());
}

#[test]
fn psychometrics_for_all_variants() {
    let report = analyze(WAVE);
    let psychometrics = report.psychometrics.expect("psychometrics");

    let kmo = psychometrics.adequacy.kmo.expect("kmo");
    assert!(kmo.overall > 0.5, "KMO {}", kmo.overall);
    let bartlett = psychometrics.adequacy.bartlett.expect("bartlett");
    assert!(bartlett.p_value < 0.001);

    assert_eq!(psychometrics.factors.len(), 4);
    for f in &psychometrics.factors {
        let solution = f.solution.as_ref().unwrap_or_else(|| panic!("{} skipped", f.label));
        assert_eq!(solution.loadings.rows(), 12);
        assert_eq!(solution.loadings.cols(), 3);
    }
    assert!(psychometrics.inter_item.mean.is_finite());
}

#[test]
fn bootstrap_is_reproducible() {
    let first = analyze(WAVE).bootstrap.expect("bootstrap");
    let second = analyze(WAVE).bootstrap.expect("bootstrap");
    assert_eq!(first, second);
    assert!(first.within_mean.is_some());
    assert!(first.between_mean.is_some());
    assert_eq!(first.settings.iterations, 40);
    assert_eq!(first.pairs.len(), 10);
    assert!(first.pairs.iter().all(|p| p.skipped.is_none()));
}

#[test]
fn different_seed_changes_bootstrap() {
    let config = load_config(Path::new(WAVE), None).unwrap();
    let dataset = load_dataset(Path::new(WAVE), &config).unwrap();
    let run = |seed| {
        let settings = config
            .clone()
            .merge_with_cli(CliOverrides {
                seed: Some(seed),
                iterations: Some(15),
                ..Default::default()
            })
            .settings();
        AnalysisEngine::new(settings)
            .without_psychometrics()
            .run(&dataset)
            .unwrap()
            .bootstrap
            .unwrap()
    };
    assert_ne!(run(1).pairs, run(2).pairs);
}
