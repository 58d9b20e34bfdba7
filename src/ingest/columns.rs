//! Header lookup for survey exports.
//!
//! Each canonical column has a fixed set of built-in header names plus any
//! extra aliases from config. Matching ignores case and surrounding space.

use std::collections::HashMap;

pub const ID: &str = "id";
pub const FORMAT: &str = "format";
pub const HIDDEN: &str = "hidden";
pub const VARIANT: &str = "variant";
pub const ROLE: &str = "role";
pub const VISIT_FREQUENCY: &str = "visit_frequency";
pub const STARTED_AT: &str = "started_at";
pub const SUBMITTED_AT: &str = "submitted_at";
pub const DURATION: &str = "duration";
pub const ANSWERED: &str = "answered";
pub const ANALYTICS_CONSENT: &str = "analytics_consent";

fn builtin_aliases(canonical: &str) -> &'static [&'static str] {
    match canonical {
        ID => &["response_id", "responseid"],
        FORMAT => &["formatup", "formatupitnika"],
        ROLE => &["uloga"],
        VISIT_FREQUENCY => &["cesto", "visitfrequency"],
        STARTED_AT => &["startdate"],
        SUBMITTED_AT => &["submitdate"],
        DURATION => &["interviewtime", "vreme"],
        ANSWERED => &["brodgovora"],
        ANALYTICS_CONSENT => &["zaanalytics1[sq001]", "zaanalytics1"],
        _ => &[],
    }
}

/// Canonical name of grid item `k` (0-based)
pub fn item(k: usize) -> String {
    format!("g{:02}", k + 1)
}

/// Positional grid header for presentation slot `p` (0-based)
pub fn grid_slot(p: usize) -> String {
    format!("grid[sq{:03}]", p + 1)
}

/// Large-box text column for question `q` (0-based)
pub fn text_large(q: usize) -> String {
    format!("txt{:02}", q + 1)
}

/// Small-box text column for question `q` (0-based)
pub fn text_small(q: usize) -> String {
    format!("txt{:02}mali", q + 1)
}

fn normalize(header: &str) -> String {
    header.trim().trim_start_matches('\u{feff}').to_lowercase()
}

/// Resolved header positions of one export
#[derive(Debug, Clone)]
pub struct ColumnMap {
    positions: HashMap<String, usize>,
    extra: HashMap<String, Vec<String>>,
}

impl ColumnMap {
    pub fn new<'a>(
        headers: impl IntoIterator<Item = &'a str>,
        extra_aliases: &HashMap<String, Vec<String>>,
    ) -> Self {
        let mut positions = HashMap::new();
        for (i, h) in headers.into_iter().enumerate() {
            // First occurrence wins for duplicated headers
            positions.entry(normalize(h)).or_insert(i);
        }
        let extra = extra_aliases
            .iter()
            .map(|(k, v)| (normalize(k), v.iter().map(|a| normalize(a)).collect()))
            .collect();
        Self { positions, extra }
    }

    /// Position of a canonical column, trying its name then every alias
    pub fn find(&self, canonical: &str) -> Option<usize> {
        if let Some(&i) = self.positions.get(canonical) {
            return Some(i);
        }
        if let Some(extra) = self.extra.get(canonical) {
            if let Some(i) = extra.iter().find_map(|a| self.positions.get(a)) {
                return Some(*i);
            }
        }
        builtin_aliases(canonical)
            .iter()
            .find_map(|a| self.positions.get(*a))
            .copied()
    }

    pub fn has(&self, canonical: &str) -> bool {
        self.find(canonical).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_aliases_case_insensitive() {
        let map = ColumnMap::new(
            ["\u{feff}id", "FormatUp", "interviewtime", "zaAnalytics1[SQ001]"],
            &HashMap::new(),
        );
        assert_eq!(map.find(ID), Some(0));
        assert_eq!(map.find(FORMAT), Some(1));
        assert_eq!(map.find(DURATION), Some(2));
        assert_eq!(map.find(ANALYTICS_CONSENT), Some(3));
        assert_eq!(map.find(HIDDEN), None);
    }

    #[test]
    fn test_config_aliases() {
        let mut extra = HashMap::new();
        extra.insert("duration".to_string(), vec!["Vrijeme".to_string()]);
        let map = ColumnMap::new(["vrijeme"], &extra);
        assert_eq!(map.find(DURATION), Some(0));
    }

    #[test]
    fn test_generated_names() {
        assert_eq!(item(0), "g01");
        assert_eq!(item(12), "g13");
        assert_eq!(grid_slot(11), "grid[sq012]");
        assert_eq!(text_large(2), "txt03");
        assert_eq!(text_small(0), "txt01mali");
    }
}
