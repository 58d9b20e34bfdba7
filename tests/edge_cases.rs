//! Edge case tests: degenerate exports must not panic.

use std::fs;
use std::path::Path;
use surveylab::error::IngestError;
use tempfile::TempDir;

fn analyze_file(dir: &TempDir, content: &str) -> anyhow::Result<surveylab::StudyReport> {
    let path = dir.path().join("wave.csv");
    fs::write(&path, content).unwrap();
    surveylab::analyze_path(&path, None)
}

#[test]
fn header_only_export_no_panic() {
    let dir = TempDir::new().unwrap();
    let report = analyze_file(&dir, "id,variant,g01,g02,g03\n").unwrap();
    assert_eq!(report.sample.total, 0);
    assert!(report
        .hypotheses
        .iter()
        .flat_map(|h| &h.results)
        .all(|r| r.is_skipped()));
}

#[test]
fn single_respondent_no_panic() {
    let dir = TempDir::new().unwrap();
    let report = analyze_file(
        &dir,
        "id,variant,interviewtime,g01,g02,g03,g04,g05,g06,g07,g08,g09,g10,g11,g12,g13\n\
         r1,1,200,3,3,4,4,2,3,3,4,5,3,2,4,4\n",
    )
    .unwrap();
    assert_eq!(report.sample.valid, 1);
    let psychometrics = report.psychometrics.unwrap();
    assert!(psychometrics.factors.iter().all(|f| f.solution.is_none()));
}

#[test]
fn constant_answers_no_panic() {
    let dir = TempDir::new().unwrap();
    let mut content =
        String::from("id,variant,interviewtime,g01,g02,g03,g04,g05,g06,g07,g08,g09,g10,g11,g12,g13\n");
    for i in 0..30 {
        content.push_str(&format!("r{},{},300,3,3,3,3,3,3,3,3,3,3,3,3,3\n", i, i % 4 + 1));
    }
    let report = analyze_file(&dir, &content).unwrap();
    assert_eq!(report.sample.total, 30);
    let psychometrics = report.psychometrics.unwrap();
    assert!(psychometrics.adequacy.skipped.is_some());
}

#[test]
fn out_of_range_likert_reports_row() {
    let dir = TempDir::new().unwrap();
    let err = analyze_file(&dir, "id,variant,g01\nr1,1,3\nr2,2,7\n").unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains(":2:"), "{}", message);
    assert!(message.contains("outside the 1-5 Likert range"), "{}", message);
}

#[test]
fn unknown_variant_code_rejected() {
    let dir = TempDir::new().unwrap();
    let err = analyze_file(&dir, "id,variant,g01\nr1,5,3\n").unwrap_err();
    assert!(format!("{:#}", err).contains("not one of 1-4"));
}

#[test]
fn empty_directory_errors() {
    let dir = TempDir::new().unwrap();
    let err = surveylab::analyze_path(dir.path(), None).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<IngestError>(),
        Some(IngestError::NoExports(_))
    ));
    assert!(!Path::new(&dir.path().join(".surveylab-cache.json")).exists());
}
