//! Maps raw export rows onto the unified respondent schema

use super::columns::{self, ColumnMap};
use super::RawExport;
use crate::config::CleaningRules;
use crate::error::IngestError;
use crate::{Arm, CleaningFlag, Format, Respondent, Variant, ITEM_LABELS, ORDER_B};
use chrono::NaiveDateTime;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Answered grid items needed before identical answers count as straightlining
pub const STRAIGHTLINE_MIN_ITEMS: usize = 8;

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
];

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

/// How grid items are laid out in an export
#[derive(Debug, Clone, PartialEq)]
enum ItemLayout {
    /// Columns named after canonical items
    Named(Vec<Option<usize>>),
    /// Columns in presentation order, remapped per arm
    Positional(Vec<Option<usize>>),
    Missing,
}

/// Converts raw exports into respondents
pub struct Harmonizer<'a> {
    cleaning: &'a CleaningRules,
    aliases: &'a HashMap<String, Vec<String>>,
}

impl<'a> Harmonizer<'a> {
    pub fn new(cleaning: &'a CleaningRules, aliases: &'a HashMap<String, Vec<String>>) -> Self {
        Self { cleaning, aliases }
    }

    /// Harmonize every row of one export. `file_variant` applies to rows
    /// whose own columns do not identify a variant.
    pub fn harmonize(
        &self,
        raw: &RawExport,
        file_variant: Option<Variant>,
    ) -> Result<Vec<Respondent>, IngestError> {
        let map = ColumnMap::new(raw.headers.iter().map(String::as_str), self.aliases);
        let has_variant_columns =
            map.has(columns::VARIANT) || (map.has(columns::FORMAT) && map.has(columns::HIDDEN));
        if !has_variant_columns && file_variant.is_none() {
            return Err(IngestError::MissingVariant {
                path: raw.path.clone(),
            });
        }

        let layout = detect_layout(&map);
        if layout == ItemLayout::Missing {
            warn!(file = %raw.path.display(), "no grid item columns found");
        }
        debug!(
            file = %raw.path.display(),
            rows = raw.rows.len(),
            positional = matches!(layout, ItemLayout::Positional(_)),
            "harmonizing export"
        );

        let stem = raw
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        raw.rows
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                let row_no = idx + 1;
                let view = RowView { map: &map, row };
                let fail = |message: String| IngestError::row(&raw.path, row_no, message);

                let variant = resolve_variant(&view, file_variant).map_err(fail)?;
                let items = read_items(&layout, row, variant.arm).map_err(fail)?;
                let texts: [Option<String>; 3] = std::array::from_fn(|q| {
                    let large = view.get(&columns::text_large(q)).and_then(clean_text);
                    large.or_else(|| view.get(&columns::text_small(q)).and_then(clean_text))
                });

                let started_at = view.get(columns::STARTED_AT).and_then(parse_timestamp);
                let submitted_at = view.get(columns::SUBMITTED_AT).and_then(parse_timestamp);
                let duration_seconds = match (started_at, submitted_at) {
                    (Some(s), Some(e)) => Some((e - s).num_milliseconds() as f64 / 1000.0),
                    _ => view.get(columns::DURATION).and_then(parse_number),
                };

                let non_null = items.iter().filter(|i| i.is_some()).count();
                let answered_count = view.get(columns::ANSWERED)
                    .and_then(parse_number)
                    .map(|n| n.max(0.0) as usize)
                    .unwrap_or(non_null);

                let response_length = texts
                    .iter()
                    .flatten()
                    .map(|t| t.chars().count())
                    .max()
                    .filter(|&len| len >= self.cleaning.min_text_length)
                    .unwrap_or(0);

                let mut respondent = Respondent {
                    id: view.get(columns::ID)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("{}:{}", stem, row_no)),
                    variant,
                    role: view.get(columns::ROLE).and_then(parse_code),
                    visit_frequency: view.get(columns::VISIT_FREQUENCY).and_then(parse_code),
                    items,
                    texts,
                    started_at,
                    submitted_at,
                    duration_seconds,
                    answered_count,
                    analytics_consent: view.get(columns::ANALYTICS_CONSENT).and_then(parse_code),
                    response_length,
                    flags: Vec::new(),
                };
                flag(&mut respondent, self.cleaning);
                Ok(respondent)
            })
            .collect()
    }
}

/// Attach cleaning flags according to the configured thresholds
pub fn flag(respondent: &mut Respondent, rules: &CleaningRules) {
    let mut flags = Vec::new();
    if let Some(d) = respondent.duration_seconds {
        if d <= rules.min_duration_seconds {
            flags.push(CleaningFlag::TooFast);
        }
        if d >= rules.max_duration_seconds {
            flags.push(CleaningFlag::TooSlow);
        }
    }
    if respondent.answered_count < rules.min_answered {
        flags.push(CleaningFlag::Incomplete);
    }
    if rules.flag_straightlining {
        let answered: Vec<f64> = respondent.items.iter().flatten().copied().collect();
        if answered.len() >= STRAIGHTLINE_MIN_ITEMS && answered.windows(2).all(|w| w[0] == w[1]) {
            flags.push(CleaningFlag::Straightlined);
        }
    }
    respondent.flags = flags;
}

fn detect_layout(map: &ColumnMap) -> ItemLayout {
    let named: Vec<Option<usize>> = (0..ITEM_LABELS.len())
        .map(|k| map.find(&columns::item(k)))
        .collect();
    if named.iter().any(Option::is_some) {
        return ItemLayout::Named(named);
    }
    let positional: Vec<Option<usize>> = (0..ITEM_LABELS.len())
        .map(|p| map.find(&columns::grid_slot(p)))
        .collect();
    if positional.iter().any(Option::is_some) {
        return ItemLayout::Positional(positional);
    }
    ItemLayout::Missing
}

/// Non-missing, trimmed cells of one row by canonical column
struct RowView<'r> {
    map: &'r ColumnMap,
    row: &'r csv::StringRecord,
}

impl<'r> RowView<'r> {
    fn get(&self, canonical: &str) -> Option<&'r str> {
        self.map
            .find(canonical)
            .and_then(|i| self.row.get(i))
            .filter(|v| !is_missing(v))
            .map(str::trim)
    }
}

fn resolve_variant(view: &RowView<'_>, file_variant: Option<Variant>) -> Result<Variant, String> {
    if let Some(raw) = view.get(columns::VARIANT) {
        return parse_number(raw)
            .filter(|v| v.fract() == 0.0 && (1.0..=4.0).contains(v))
            .and_then(|v| Variant::from_index(v as usize - 1))
            .ok_or_else(|| format!("variant `{}` is not one of 1-4", raw));
    }
    if let (Some(format), Some(hidden)) = (view.get(columns::FORMAT), view.get(columns::HIDDEN)) {
        let format = parse_code(format)
            .and_then(Format::from_code)
            .ok_or_else(|| format!("format code `{}` is not 1 or 2", format))?;
        let hidden = parse_number(hidden)
            .ok_or_else(|| format!("randomization value `{}` is not numeric", hidden))?;
        return Ok(Variant::new(format, Arm::from_hidden(hidden)));
    }
    file_variant.ok_or_else(|| "row has no variant, format or randomization value".to_string())
}

fn read_items(layout: &ItemLayout, row: &csv::StringRecord, arm: Arm) -> Result<Vec<Option<f64>>, String> {
    let mut items = vec![None; ITEM_LABELS.len()];
    let (slots, positional) = match layout {
        ItemLayout::Named(slots) => (slots, false),
        ItemLayout::Positional(slots) => (slots, true),
        ItemLayout::Missing => return Ok(items),
    };
    for (slot, column) in slots.iter().enumerate() {
        let Some(raw) = column.and_then(|i| row.get(i)).filter(|v| !is_missing(v)) else {
            continue;
        };
        let canonical = if positional { canonical_item(slot, arm) } else { slot };
        let value = parse_number(raw)
            .ok_or_else(|| format!("{} = `{}` is not numeric", ITEM_LABELS[canonical], raw.trim()))?;
        if !(1.0..=5.0).contains(&value) {
            return Err(format!(
                "{} = {} is outside the 1-5 Likert range",
                ITEM_LABELS[canonical], value
            ));
        }
        items[canonical] = Some(value);
    }
    Ok(items)
}

/// Canonical item shown at presentation slot `slot` for an arm
pub fn canonical_item(slot: usize, arm: Arm) -> usize {
    match arm {
        Arm::B if slot < ORDER_B.len() => ORDER_B[slot],
        _ => slot,
    }
}

/// Empty cells, NA, nan and whitespace-only strings are missing
pub fn is_missing(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v.eq_ignore_ascii_case("na") || v.eq_ignore_ascii_case("nan")
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Small integer codes, tolerating exports that write them as floats
fn parse_code(value: &str) -> Option<u8> {
    parse_number(value)
        .filter(|v| v.fract() == 0.0 && (0.0..=255.0).contains(v))
        .map(|v| v as u8)
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(value.trim(), f).ok())
}

/// Collapse whitespace runs; None when nothing is left
fn clean_text(value: &str) -> Option<String> {
    let cleaned = whitespace().replace_all(value, " ").trim().to_string();
    (!cleaned.is_empty() && !is_missing(&cleaned)).then_some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use std::path::PathBuf;

    fn raw(headers: &[&str], rows: &[&[&str]]) -> RawExport {
        RawExport {
            path: PathBuf::from("wave1.csv"),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows.iter().map(|r| csv::StringRecord::from(r.to_vec())).collect(),
        }
    }

    fn harmonize(export: &RawExport, hint: Option<Variant>) -> Result<Vec<Respondent>, IngestError> {
        let settings = Settings::default();
        let aliases = HashMap::new();
        Harmonizer::new(&settings.cleaning, &aliases).harmonize(export, hint)
    }

    const NAMED_HEADERS: [&str; 21] = [
        "id", "formatUp", "hidden", "interviewtime", "g01", "g02", "g03", "g04", "g05", "g06",
        "g07", "g08", "g09", "g10", "g11", "g12", "g13", "txt01", "txt01mali", "txt02mali",
        "uloga",
    ];

    #[test]
    fn test_named_layout() {
        let export = raw(
            &NAMED_HEADERS,
            &[&[
                "r1", "2", "77", "120", "1", "2", "3", "4", "5", "1", "2", "3", "4", "5", "1", "2",
                "", "", "Pages load too slowly", "short", "2",
            ]],
        );
        let r = &harmonize(&export, None).unwrap()[0];
        assert_eq!(r.variant, Variant::new(Format::Slides, Arm::B));
        assert_eq!(r.items[0], Some(1.0));
        assert_eq!(r.items[12], None);
        assert_eq!(r.answered_count, 12);
        assert_eq!(r.duration_seconds, Some(120.0));
        assert_eq!(r.texts[0].as_deref(), Some("Pages load too slowly"));
        assert_eq!(r.texts[1].as_deref(), Some("short"));
        assert_eq!(r.response_length, 21);
        assert_eq!(r.role, Some(2));
        assert!(r.is_clean());
        assert!(!r.grid_complete());
    }

    #[test]
    fn test_positional_arm_b_matches_named() {
        // Canonical answers g01..g12 = 1,2,3,4,5,1,2,3,4,5,1,2 and g13 = 3
        let canonical = [1, 2, 3, 4, 5, 1, 2, 3, 4, 5, 1, 2];
        let mut headers = vec!["formatUp".to_string(), "hidden".to_string()];
        let mut cells = vec!["1".to_string(), "90".to_string()];
        for (slot, &item) in ORDER_B.iter().enumerate() {
            headers.push(format!("grid[SQ{:03}]", slot + 1));
            cells.push(canonical[item].to_string());
        }
        headers.push("grid[SQ013]".to_string());
        cells.push("3".to_string());
        let export = RawExport {
            path: PathBuf::from("positional.csv"),
            headers,
            rows: vec![csv::StringRecord::from(cells)],
        };
        let r = &harmonize(&export, None).unwrap()[0];
        let expected: Vec<Option<f64>> = canonical
            .iter()
            .map(|&v| Some(v as f64))
            .chain(std::iter::once(Some(3.0)))
            .collect();
        assert_eq!(r.items, expected);
        assert!(r.grid_complete());
    }

    #[test]
    fn test_variant_column_and_file_hint() {
        let export = raw(&["variant", "g01"], &[&["3", "4"], &["", "2"]]);
        let hint = Variant::new(Format::SinglePage, Arm::B);
        let rs = harmonize(&export, Some(hint)).unwrap();
        assert_eq!(rs[0].variant, Variant::ALL[2]);
        assert_eq!(rs[1].variant, hint);
        assert_eq!(rs[1].id, "wave1:2");
    }

    #[test]
    fn test_missing_variant_is_file_error() {
        let export = raw(&["g01"], &[&["4"]]);
        assert!(matches!(
            harmonize(&export, None),
            Err(IngestError::MissingVariant { .. })
        ));
    }

    #[test]
    fn test_out_of_range_likert_names_row() {
        let export = raw(&["variant", "g01", "g02"], &[&["1", "3", "4"], &["1", "7", "4"]]);
        let err = harmonize(&export, None).unwrap_err();
        match err {
            IngestError::Row { row, message, .. } => {
                assert_eq!(row, 2);
                assert!(message.contains("g01"), "{}", message);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_missing_markers() {
        assert!(is_missing(""));
        assert!(is_missing("  "));
        assert!(is_missing("NA"));
        assert!(is_missing("nan"));
        assert!(!is_missing("0"));
        assert_eq!(clean_text("  two\n\twords "), Some("two words".to_string()));
        assert_eq!(clean_text("NaN"), None);
    }

    #[test]
    fn test_duration_from_timestamps() {
        let export = raw(
            &["variant", "startdate", "submitdate", "interviewtime"],
            &[&["1", "2024-03-01 10:00:00", "2024-03-01 10:05:30", "9999"]],
        );
        let r = &harmonize(&export, None).unwrap()[0];
        assert_eq!(r.duration_seconds, Some(330.0));
    }

    #[test]
    fn test_flags() {
        let rules = Settings::default().cleaning;
        let export = raw(&["variant", "interviewtime"], &[&["1", "1"], &["1", "4000"]]);
        let rs = harmonize(&export, None).unwrap();
        assert_eq!(rs[0].flags, vec![CleaningFlag::TooFast, CleaningFlag::Incomplete]);
        assert_eq!(rs[1].flags, vec![CleaningFlag::TooSlow, CleaningFlag::Incomplete]);

        let mut r = rs[0].clone();
        r.duration_seconds = Some(300.0);
        r.items = vec![Some(3.0); 13];
        r.answered_count = 13;
        flag(&mut r, &rules);
        assert!(r.is_clean(), "straightlining is opt-in");
        let strict = CleaningRules {
            flag_straightlining: true,
            ..rules
        };
        flag(&mut r, &strict);
        assert_eq!(r.flags, vec![CleaningFlag::Straightlined]);
    }

    #[test]
    fn test_short_text_zeroes_length() {
        let export = raw(&["variant", "txt01"], &[&["1", "too short"]]);
        let r = &harmonize(&export, None).unwrap()[0];
        assert_eq!(r.texts[0].as_deref(), Some("too short"));
        assert_eq!(r.response_length, 0);
        assert!(!r.has_text());
    }
}
