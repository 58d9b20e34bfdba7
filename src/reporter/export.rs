//! CSV exports of the loading, inter-item and Spearman matrices

use crate::analysis::psychometrics::PsychometricsReport;
use crate::error::SurveyError;
use crate::stats::ItemCorrelationMatrix;
use crate::ITEM_LABELS;
use std::path::{Path, PathBuf};
use tracing::debug;

fn cell(value: f64) -> String {
    if value.is_finite() {
        format!("{:.2}", value)
    } else {
        String::new()
    }
}

/// Write a labelled matrix with an empty top-left header cell
fn write_matrix(
    path: &Path,
    columns: &[String],
    rows: &[(String, Vec<f64>)],
) -> Result<(), SurveyError> {
    let output_error = |source: std::io::Error| SurveyError::Output {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(|e| output_error(e.into()))?;
    let mut header = vec![String::new()];
    header.extend(columns.iter().cloned());
    writer.write_record(&header).map_err(|e| output_error(e.into()))?;
    for (label, values) in rows {
        let mut record = vec![label.clone()];
        record.extend(values.iter().map(|v| cell(*v)));
        writer.write_record(&record).map_err(|e| output_error(e.into()))?;
    }
    writer.flush().map_err(output_error)?;
    debug!(file = %path.display(), "wrote matrix");
    Ok(())
}

fn correlation_rows(matrix: &ItemCorrelationMatrix) -> Vec<(String, Vec<f64>)> {
    matrix
        .labels
        .iter()
        .cloned()
        .zip(matrix.values.iter().cloned())
        .collect()
}

/// Writes the matrix CSV files of the psychometric analyses
pub struct CsvExporter {
    out_dir: PathBuf,
}

impl CsvExporter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Write all matrices; returns the files written
    pub fn report(&self, report: &PsychometricsReport) -> Result<Vec<PathBuf>, SurveyError> {
        super::svg::ensure_dir(&self.out_dir)?;
        let mut written = Vec::new();

        for (i, f) in report.factors.iter().enumerate() {
            let Some(solution) = &f.solution else { continue };
            let columns: Vec<String> = (1..=solution.loadings.cols()).map(|k| format!("F{}", k)).collect();
            let rows: Vec<(String, Vec<f64>)> = (0..solution.loadings.rows())
                .map(|k| (ITEM_LABELS[k].to_string(), solution.loadings.row(k).to_vec()))
                .collect();
            let path = self.out_dir.join(format!("loadings{}.csv", i + 1));
            write_matrix(&path, &columns, &rows)?;
            written.push(path);
        }

        let iic = &report.inter_item.matrix;
        let path = self.out_dir.join("iic_all_formats.csv");
        write_matrix(&path, &iic.labels, &correlation_rows(iic))?;
        written.push(path);

        for (i, c) in report.spearman.iter().enumerate() {
            let path = self.out_dir.join(format!("spearman_variant{}.csv", i + 1));
            write_matrix(&path, &c.matrix.labels, &correlation_rows(&c.matrix))?;
            written.push(path);
        }
        Ok(written)
    }
}
