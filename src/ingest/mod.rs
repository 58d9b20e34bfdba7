//! Reading survey exports and harmonizing them into one dataset

pub mod columns;
mod harmonizer;

pub use harmonizer::{canonical_item, flag, is_missing, Harmonizer, STRAIGHTLINE_MIN_ITEMS};

use crate::config::{self, Config};
use crate::error::IngestError;
use crate::{Dataset, Respondent, ITEM_LABELS};
use globset::GlobSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// One export file as read from disk
#[derive(Debug, Clone)]
pub struct RawExport {
    pub path: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<csv::StringRecord>,
}

/// Read a CSV export, or every `*.csv` under a directory in sorted path order.
/// Paths matching `ignore` are skipped.
pub fn read_exports(path: &Path, ignore: &GlobSet) -> Result<Vec<RawExport>, IngestError> {
    let files = find_exports(path, ignore)?;
    if files.is_empty() {
        return Err(IngestError::NoExports(path.to_path_buf()));
    }
    files.iter().map(|f| read_export(f)).collect()
}

/// Discover export files without reading them
pub fn find_exports(path: &Path, ignore: &GlobSet) -> Result<Vec<PathBuf>, IngestError> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.exists() {
        return Err(IngestError::Read {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
        });
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_csv(p))
        .filter(|p| {
            let relative = p.strip_prefix(path).unwrap_or(p);
            !config::is_ignored(relative, ignore) && !config::is_ignored(p, ignore)
        })
        .collect();
    files.sort();
    Ok(files)
}

pub fn is_csv(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Read one export. The delimiter is `;` when the header has more semicolons than commas.
pub fn read_export(path: &Path) -> Result<RawExport, IngestError> {
    let bytes = fs::read(path).map_err(|source| IngestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let first_line = bytes.split(|b| *b == b'\n').next().unwrap_or(&[]);
    let semicolons = first_line.iter().filter(|b| **b == b';').count();
    let commas = first_line.iter().filter(|b| **b == b',').count();
    let delimiter = if semicolons > commas { b';' } else { b',' };

    let csv_error = |source| IngestError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(bytes.as_slice());
    let headers = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(str::to_string)
        .collect();
    let rows = reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(csv_error)?;

    debug!(file = %path.display(), rows = rows.len(), "read export");
    Ok(RawExport {
        path: path.to_path_buf(),
        headers,
        rows,
    })
}

/// Read and harmonize every export under `path` using `config`
pub fn load_dataset(path: &Path, config: &Config) -> anyhow::Result<Dataset> {
    let ignore = config::build_ignore_set(&config.ignore)?;
    let settings = config.settings();
    let harmonizer = Harmonizer::new(&settings.cleaning, &config.column_aliases);

    let exports = read_exports(path, &ignore)?;
    let mut dataset = Dataset::default();
    for raw in &exports {
        let respondents = harmonizer.harmonize(raw, config.variant_for_file(&raw.path))?;
        dataset.respondents.extend(respondents);
        dataset.sources.push(raw.path.clone());
    }
    info!(
        files = dataset.sources.len(),
        respondents = dataset.len(),
        valid = dataset.valid_count(),
        "harmonized exports"
    );
    Ok(dataset)
}

/// Header of the unified CSV schema
pub fn harmonized_headers() -> Vec<String> {
    let mut headers: Vec<String> = [
        "id",
        "variant",
        "format",
        "arm",
        "role",
        "visit_frequency",
        "started_at",
        "submitted_at",
        "duration",
        "answered",
        "analytics_consent",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    headers.extend(ITEM_LABELS.iter().map(|s| s.to_string()));
    headers.extend((0..3).map(columns::text_large));
    headers.push("response_length".to_string());
    headers.push("flags".to_string());
    headers
}

fn harmonized_record(r: &Respondent) -> Vec<String> {
    fn opt<T: ToString>(v: &Option<T>) -> String {
        v.as_ref().map(|v| v.to_string()).unwrap_or_default()
    }
    let timestamp = |t: &Option<chrono::NaiveDateTime>| {
        t.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default()
    };

    let mut record = vec![
        r.id.clone(),
        (r.variant.index() + 1).to_string(),
        r.variant.format.code().to_string(),
        r.variant.arm.to_string(),
        opt(&r.role),
        opt(&r.visit_frequency),
        timestamp(&r.started_at),
        timestamp(&r.submitted_at),
        opt(&r.duration_seconds),
        r.answered_count.to_string(),
        opt(&r.analytics_consent),
    ];
    record.extend(r.items.iter().map(opt));
    record.extend(r.texts.iter().map(opt));
    record.push(r.response_length.to_string());
    record.push(
        r.flags
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join("|"),
    );
    record
}

/// Write the dataset in the unified schema. The output can be read back as an export.
pub fn write_harmonized(dataset: &Dataset, path: &Path) -> Result<(), IngestError> {
    let csv_error = |source| IngestError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    writer.write_record(harmonized_headers()).map_err(csv_error)?;
    for r in &dataset.respondents {
        writer.write_record(harmonized_record(r)).map_err(csv_error)?;
    }
    writer.flush().map_err(|source| IngestError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), rows = dataset.len(), "wrote harmonized dataset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::build_ignore_set;
    use tempfile::TempDir;

    const EXPORT: &str = "id,formatUp,hidden,interviewtime,g01,g02,g03,g04,g05,g06,g07,g08,g09,g10,g11,g12,g13,txt01,uloga,cesto\n\
        a1,1,20,300,4,4,3,5,4,3,4,4,5,3,4,4,5,Navigation was confusing at times,2,3\n\
        a2,2,80,2,1,,,,,,,,,,,,,,2,2\n";

    #[test]
    fn test_directory_walk_sorted_and_ignored() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("archive")).unwrap();
        fs::write(dir.path().join("b.csv"), EXPORT).unwrap();
        fs::write(dir.path().join("a.CSV"), EXPORT).unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::write(dir.path().join("archive/old.csv"), EXPORT).unwrap();

        let ignore = build_ignore_set(&["archive/**".to_string()]).unwrap();
        let files = find_exports(dir.path(), &ignore).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.CSV", "b.csv"]);
    }

    #[test]
    fn test_empty_directory_errors() {
        let dir = TempDir::new().unwrap();
        let ignore = build_ignore_set(&[]).unwrap();
        assert!(matches!(
            read_exports(dir.path(), &ignore),
            Err(IngestError::NoExports(_))
        ));
    }

    #[test]
    fn test_semicolon_delimiter() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("semi.csv");
        fs::write(&path, "variant;g01;g02\n1;3;4\n").unwrap();
        let raw = read_export(&path).unwrap();
        assert_eq!(raw.headers, vec!["variant", "g01", "g02"]);
        assert_eq!(raw.rows[0].get(2), Some("4"));
    }

    #[test]
    fn test_load_and_write_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wave.csv");
        fs::write(&path, EXPORT).unwrap();
        let dataset = load_dataset(&path, &Config::default()).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.valid_count(), 1);
        assert_eq!(dataset.respondents[0].visit_frequency, Some(3));

        let out = dir.path().join("unified.csv");
        write_harmonized(&dataset, &out).unwrap();

        // The unified file is itself a readable export
        let again = load_dataset(&out, &Config::default()).unwrap();
        assert_eq!(again.respondents, dataset.respondents);
    }
}
