//! Number formatting shared by the text reporters

use crate::TestResult;

/// p-value to 4 decimals, or "< 0.0001"
pub fn p_value(p: f64) -> String {
    if !p.is_finite() {
        "n/a".to_string()
    } else if p < 0.0001 {
        "< 0.0001".to_string()
    } else {
        format!("{:.4}", p)
    }
}

/// Fixed decimals, "n/a" for NaN and infinities
pub fn number(value: f64, decimals: usize) -> String {
    if value.is_finite() {
        format!("{:.*}", decimals, value)
    } else {
        "n/a".to_string()
    }
}

pub fn optional(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| number(v, decimals))
}

/// "1" or "1, 16"; whole numbers without decimals
pub fn degrees_of_freedom(df: &[f64]) -> String {
    df.iter()
        .map(|d| {
            if d.fract() == 0.0 {
                format!("{}", *d as i64)
            } else {
                format!("{:.2}", d)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// "φ = 0.110 (small)" or empty
pub fn effect(result: &TestResult) -> String {
    result
        .effect
        .as_ref()
        .map(|e| format!("{} = {:.3} ({})", e.kind, e.value, e.magnitude))
        .unwrap_or_default()
}

/// Group figures: "Single Page: n=10, median 203.0" or the response rate
pub fn group(summary: &crate::GroupSummary) -> String {
    match (summary.rate, summary.median, summary.mean) {
        (Some(rate), _, _) => format!("{}: {:.1}% of {}", summary.label, rate, summary.n),
        (None, Some(median), Some(mean)) => format!(
            "{}: n={}, median {:.1}, mean {:.1}",
            summary.label, summary.n, median, mean
        ),
        _ => format!("{}: n={}", summary.label, summary.n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GroupSummary;

    #[test]
    fn test_p_value() {
        assert_eq!(p_value(0.0147089), "0.0147");
        assert_eq!(p_value(0.00001), "< 0.0001");
        assert_eq!(p_value(f64::NAN), "n/a");
    }

    #[test]
    fn test_degrees_of_freedom() {
        assert_eq!(degrees_of_freedom(&[1.0, 16.0]), "1, 16");
        assert_eq!(degrees_of_freedom(&[7.456]), "7.46");
        assert_eq!(degrees_of_freedom(&[]), "");
    }

    #[test]
    fn test_group() {
        assert_eq!(
            group(&GroupSummary::rate("Large box", 90.0, 259.0)),
            "Large box: 34.7% of 259"
        );
        assert_eq!(group(&GroupSummary::of("Slides", &[])), "Slides: n=0");
    }
}
