//! SVG figures: correlation and loading heatmaps, scree plot and the
//! response-length interaction plot.

use crate::analysis::hypotheses::response_length::cell_label;
use crate::analysis::psychometrics::PsychometricsReport;
use crate::error::SurveyError;
use crate::stats::ItemCorrelationMatrix;
use crate::{BoxSize, Format, StudyReport, ITEM_LABELS};
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const CELL: f64 = 44.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_TOP: f64 = 60.0;
const PLOT_W: f64 = 520.0;
const PLOT_H: f64 = 320.0;
const SERIES_COLORS: [&str; 4] = ["#1f77b4", "#ff7f0e", "#2ca02c", "#d62728"];

/// Minimal SVG document assembled element by element
struct SvgDocument {
    width: f64,
    height: f64,
    body: String,
}

impl SvgDocument {
    fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            body: String::new(),
        }
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, fill: &str) -> &mut Self {
        let _ = writeln!(
            self.body,
            r##"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}" stroke="#ffffff"/>"##,
            x, y, w, h, fill
        );
        self
    }

    fn text(&mut self, x: f64, y: f64, content: &str, anchor: &str, size: u32) -> &mut Self {
        let _ = writeln!(
            self.body,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="{}" font-family="sans-serif" font-size="{}">{}</text>"#,
            x,
            y,
            anchor,
            size,
            escape(content)
        );
        self
    }

    fn line(&mut self, from: (f64, f64), to: (f64, f64), stroke: &str, dashed: bool) -> &mut Self {
        let dash = if dashed { r#" stroke-dasharray="6 4""# } else { "" };
        let _ = writeln!(
            self.body,
            r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="{}"{}/>"#,
            from.0, from.1, to.0, to.1, stroke, dash
        );
        self
    }

    fn polyline(&mut self, points: &[(f64, f64)], stroke: &str) -> &mut Self {
        let coords: Vec<String> = points.iter().map(|(x, y)| format!("{:.1},{:.1}", x, y)).collect();
        let _ = writeln!(
            self.body,
            r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="2"/>"#,
            coords.join(" "),
            stroke
        );
        for (x, y) in points {
            let _ = writeln!(
                self.body,
                r#"<circle cx="{:.1}" cy="{:.1}" r="3.5" fill="{}"/>"#,
                x, y, stroke
            );
        }
        self
    }

    fn finish(&self) -> String {
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w:.0}\" height=\"{h:.0}\" viewBox=\"0 0 {w:.0} {h:.0}\">\n\
             <rect width=\"100%\" height=\"100%\" fill=\"#ffffff\"/>\n{body}</svg>\n",
            w = self.width,
            h = self.height,
            body = self.body
        )
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Diverging blue-white-red color for a value clamped to [-1, 1]; grey for NaN
pub fn diverging_color(value: f64) -> String {
    if !value.is_finite() {
        return "#d9d9d9".to_string();
    }
    let v = value.clamp(-1.0, 1.0);
    let white = (247.0, 247.0, 247.0);
    let end = if v < 0.0 {
        (33.0, 102.0, 172.0)
    } else {
        (178.0, 24.0, 43.0)
    };
    let t = v.abs();
    let mix = |a: f64, b: f64| (a + (b - a) * t).round() as u8;
    format!(
        "#{:02x}{:02x}{:02x}",
        mix(white.0, end.0),
        mix(white.1, end.1),
        mix(white.2, end.2)
    )
}

/// Annotated heatmap of a row-major matrix
pub fn heatmap(title: &str, row_labels: &[String], col_labels: &[String], values: &[Vec<f64>]) -> String {
    let width = MARGIN_LEFT + CELL * col_labels.len() as f64 + 20.0;
    let height = MARGIN_TOP + CELL * row_labels.len() as f64 + 20.0;
    let mut doc = SvgDocument::new(width, height);
    doc.text(width / 2.0, 24.0, title, "middle", 15);

    for (j, label) in col_labels.iter().enumerate() {
        doc.text(MARGIN_LEFT + CELL * (j as f64 + 0.5), MARGIN_TOP - 8.0, label, "middle", 11);
    }
    for (i, label) in row_labels.iter().enumerate() {
        let y = MARGIN_TOP + CELL * i as f64;
        doc.text(MARGIN_LEFT - 8.0, y + CELL * 0.6, label, "end", 11);
        for (j, value) in values.get(i).into_iter().flatten().enumerate() {
            let x = MARGIN_LEFT + CELL * j as f64;
            doc.rect(x, y, CELL, CELL, &diverging_color(*value));
            let annotation = if value.is_finite() {
                format!("{:.2}", value)
            } else {
                String::new()
            };
            doc.text(x + CELL / 2.0, y + CELL * 0.6, &annotation, "middle", 10);
        }
    }
    doc.finish()
}

pub fn correlation_heatmap(title: &str, matrix: &ItemCorrelationMatrix) -> String {
    heatmap(title, &matrix.labels, &matrix.labels, &matrix.values)
}

/// Eigenvalues per variant with the Kaiser line at 1
pub fn scree_plot(series: &[(String, Vec<f64>)]) -> String {
    let mut doc = SvgDocument::new(MARGIN_LEFT + PLOT_W + 200.0, MARGIN_TOP + PLOT_H + 60.0);
    doc.text(MARGIN_LEFT + PLOT_W / 2.0, 24.0, "Scree plot", "middle", 15);

    let points = series.iter().map(|(_, e)| e.len()).max().unwrap_or(0).max(2);
    let top = series
        .iter()
        .flat_map(|(_, e)| e.iter().copied())
        .fold(1.5f64, f64::max)
        .ceil();
    let x_at = |k: usize| MARGIN_LEFT + PLOT_W * k as f64 / (points - 1) as f64;
    let y_at = |v: f64| MARGIN_TOP + PLOT_H * (1.0 - v.max(0.0) / top);

    let bottom = MARGIN_TOP + PLOT_H;
    doc.line((MARGIN_LEFT, bottom), (MARGIN_LEFT + PLOT_W, bottom), "#333333", false)
        .line((MARGIN_LEFT, MARGIN_TOP), (MARGIN_LEFT, bottom), "#333333", false)
        .line((MARGIN_LEFT, y_at(1.0)), (MARGIN_LEFT + PLOT_W, y_at(1.0)), "#888888", true)
        .text(MARGIN_LEFT + PLOT_W, y_at(1.0) - 6.0, "Kaiser criterion", "end", 11);
    for k in 0..points {
        doc.text(x_at(k), bottom + 18.0, &(k + 1).to_string(), "middle", 11);
    }
    for tick in 0..=top as usize {
        doc.text(MARGIN_LEFT - 8.0, y_at(tick as f64) + 4.0, &tick.to_string(), "end", 11);
    }
    doc.text(MARGIN_LEFT + PLOT_W / 2.0, bottom + 40.0, "Component", "middle", 12);

    for (s, (label, eigenvalues)) in series.iter().enumerate() {
        let color = SERIES_COLORS[s % SERIES_COLORS.len()];
        let pts: Vec<(f64, f64)> = eigenvalues.iter().enumerate().map(|(k, v)| (x_at(k), y_at(*v))).collect();
        doc.polyline(&pts, color);
        let legend_y = MARGIN_TOP + 20.0 * s as f64;
        doc.line((MARGIN_LEFT + PLOT_W + 20.0, legend_y), (MARGIN_LEFT + PLOT_W + 40.0, legend_y), color, false)
            .text(MARGIN_LEFT + PLOT_W + 46.0, legend_y + 4.0, label, "start", 11);
    }
    doc.finish()
}

/// Mean response length per format, one line per box size
pub fn interaction_plot(means: &[(BoxSize, [Option<f64>; 2])]) -> String {
    let mut doc = SvgDocument::new(MARGIN_LEFT + PLOT_W + 160.0, MARGIN_TOP + PLOT_H + 60.0);
    doc.text(
        MARGIN_LEFT + PLOT_W / 2.0,
        24.0,
        "Mean response length by format and box size",
        "middle",
        15,
    );
    let top = means
        .iter()
        .flat_map(|(_, m)| m.iter().flatten().copied())
        .fold(1.0f64, f64::max)
        * 1.1;
    let x_at = |k: usize| MARGIN_LEFT + PLOT_W * (0.2 + 0.6 * k as f64);
    let y_at = |v: f64| MARGIN_TOP + PLOT_H * (1.0 - v / top);

    let bottom = MARGIN_TOP + PLOT_H;
    doc.line((MARGIN_LEFT, bottom), (MARGIN_LEFT + PLOT_W, bottom), "#333333", false)
        .line((MARGIN_LEFT, MARGIN_TOP), (MARGIN_LEFT, bottom), "#333333", false);
    for (k, format) in [Format::SinglePage, Format::Slides].iter().enumerate() {
        doc.text(x_at(k), bottom + 18.0, &format.to_string(), "middle", 12);
    }
    for step in 0..=4 {
        let v = top * step as f64 / 4.0;
        doc.text(MARGIN_LEFT - 8.0, y_at(v) + 4.0, &format!("{:.0}", v), "end", 11);
    }

    for (s, (box_size, values)) in means.iter().enumerate() {
        let color = SERIES_COLORS[s % SERIES_COLORS.len()];
        let pts: Vec<(f64, f64)> = values
            .iter()
            .enumerate()
            .filter_map(|(k, v)| v.map(|v| (x_at(k), y_at(v))))
            .collect();
        doc.polyline(&pts, color);
        let legend_y = MARGIN_TOP + 20.0 * s as f64;
        doc.line((MARGIN_LEFT + PLOT_W + 20.0, legend_y), (MARGIN_LEFT + PLOT_W + 40.0, legend_y), color, false)
            .text(MARGIN_LEFT + PLOT_W + 46.0, legend_y + 4.0, &box_size.to_string(), "start", 11);
    }
    doc.finish()
}

/// Writes every figure of a report into a directory
pub struct SvgReporter {
    out_dir: PathBuf,
}

impl SvgReporter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    fn write(&self, name: &str, content: String, written: &mut Vec<PathBuf>) -> Result<(), SurveyError> {
        let path = self.out_dir.join(name);
        fs::write(&path, content).map_err(|source| SurveyError::Output {
            path: path.clone(),
            source,
        })?;
        debug!(file = %path.display(), "wrote figure");
        written.push(path);
        Ok(())
    }

    fn psychometric_figures(
        &self,
        report: &PsychometricsReport,
        written: &mut Vec<PathBuf>,
    ) -> Result<(), SurveyError> {
        for (i, c) in report.spearman.iter().enumerate() {
            // Order-B variants are drawn in the order respondents saw the items
            let matrix = c.presentation_order.as_ref().unwrap_or(&c.matrix);
            let title = format!("Spearman correlations: {}", c.label);
            self.write(
                &format!("spearman_variant{}.svg", i + 1),
                correlation_heatmap(&title, matrix),
                written,
            )?;
        }

        let mut scree = Vec::new();
        for (i, f) in report.factors.iter().enumerate() {
            let Some(solution) = &f.solution else { continue };
            let rows: Vec<String> = (0..solution.loadings.rows()).map(|k| ITEM_LABELS[k].to_string()).collect();
            let cols: Vec<String> = (1..=solution.loadings.cols()).map(|k| format!("F{}", k)).collect();
            let title = format!("Varimax loadings: {}", f.label);
            self.write(
                &format!("loadings_variant{}.svg", i + 1),
                heatmap(&title, &rows, &cols, &solution.loadings.to_rows()),
                written,
            )?;
            scree.push((f.label.clone(), solution.eigenvalues.clone()));
        }
        if !scree.is_empty() {
            self.write("scree.svg", scree_plot(&scree), written)?;
        }

        self.write(
            "iic_all_formats.svg",
            correlation_heatmap("Inter-item correlation (all formats)", &report.inter_item.matrix),
            written,
        )
    }

    /// Write all figures; returns the files written
    pub fn report(&self, report: &StudyReport) -> Result<Vec<PathBuf>, SurveyError> {
        ensure_dir(&self.out_dir)?;
        let mut written = Vec::new();
        if let Some(psychometrics) = &report.psychometrics {
            self.psychometric_figures(psychometrics, &mut written)?;
        }

        if let Some(h3) = report.hypotheses.iter().find(|h| h.id == "H3") {
            let mean_of = |format: Format, box_size: BoxSize| {
                let label = cell_label(format, box_size);
                h3.summaries.iter().find(|s| s.label == label).and_then(|s| s.mean)
            };
            let means: Vec<(BoxSize, [Option<f64>; 2])> = [BoxSize::Small, BoxSize::Large]
                .iter()
                .map(|b| (*b, [mean_of(Format::SinglePage, *b), mean_of(Format::Slides, *b)]))
                .collect();
            if means.iter().any(|(_, m)| m.iter().any(Option::is_some)) {
                self.write("interaction_length.svg", interaction_plot(&means), &mut written)?;
            }
        }
        Ok(written)
    }
}

pub(crate) fn ensure_dir(dir: &Path) -> Result<(), SurveyError> {
    fs::create_dir_all(dir).map_err(|source| SurveyError::Output {
        path: dir.to_path_buf(),
        source,
    })
}
