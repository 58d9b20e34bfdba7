//! JSON reporter for machine-readable output

use crate::StudyReport;

/// Reporter for JSON output
pub struct JsonReporter {
    /// Whether to pretty-print JSON
    pretty: bool,
}

impl JsonReporter {
    pub fn new() -> Self {
        Self { pretty: false }
    }

    /// Enable pretty-printing
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    /// Serialize the whole report. NaN and infinite values become `null`.
    pub fn report(&self, report: &StudyReport) -> String {
        if self.pretty {
            serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
        } else {
            serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string())
        }
    }
}

impl Default for JsonReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::tests::sample_report;

    #[test]
    fn test_json_has_expected_keys() {
        let json = JsonReporter::new().report(&sample_report());
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert!(parsed.get("generatedAt").is_some());
        assert_eq!(parsed["alpha"], 0.05);
        assert_eq!(parsed["sample"]["valid"], 18);

        let hypotheses = parsed["hypotheses"].as_array().unwrap();
        assert_eq!(hypotheses.len(), 2);
        let h2 = &hypotheses[1]["results"][0];
        assert_eq!(h2["statistic"], "chiSquare");
        assert_eq!(h2["significant"], true);
        assert_eq!(h2["effect"]["kind"], "phi");
        assert_eq!(h2["df"][0], 1.0);
    }

    #[test]
    fn test_skipped_values_serialize_as_null() {
        let json = JsonReporter::new().report(&sample_report());
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        let h1 = &parsed["hypotheses"][0]["results"][0];
        assert!(h1["value"].is_null());
        assert!(h1["pValue"].is_null());
        assert_eq!(h1["skipped"], "first group is empty");
    }

    #[test]
    fn test_json_pretty_output() {
        let json = JsonReporter::new().pretty().report(&sample_report());
        assert!(json.contains('\n'), "pretty JSON should have newlines");
        assert!(json.contains("  "), "pretty JSON should have indentation");
    }
}
