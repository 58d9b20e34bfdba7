//! Descriptive statistics for a single group of observations

use serde::{Deserialize, Serialize};

/// Summary of one group of observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptives {
    pub n: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (ddof = 1); NaN for a single observation
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub q25: f64,
    pub q75: f64,
}

impl Descriptives {
    /// Summarize `values`; returns None for an empty group
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        Some(Self {
            n: values.len(),
            mean: mean(values),
            median: percentile_sorted(&sorted, 50.0),
            std: std_dev(values),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            q25: percentile_sorted(&sorted, 25.0),
            q75: percentile_sorted(&sorted, 75.0),
        })
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance with ddof = 1
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Percentile with linear interpolation between closest ranks (`p` in 0..=100)
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, p)
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let h = (sorted.len() - 1) as f64 * (p / 100.0).clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

pub fn median(values: &[f64]) -> f64 {
    percentile(values, 50.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptives_basic() {
        let d = Descriptives::of(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(d.n, 4);
        assert_eq!(d.mean, 2.5);
        assert_eq!(d.median, 2.5);
        assert_eq!(d.min, 1.0);
        assert_eq!(d.max, 4.0);
        assert_eq!(d.q25, 1.75);
        assert_eq!(d.q75, 3.25);
        assert!((d.std - 1.290_994_448_735_805_6).abs() < 1e-12);
    }

    #[test]
    fn test_descriptives_empty_is_none() {
        assert!(Descriptives::of(&[]).is_none());
    }

    #[test]
    fn test_single_value_has_nan_std() {
        let d = Descriptives::of(&[7.0]).unwrap();
        assert_eq!(d.median, 7.0);
        assert!(d.std.is_nan());
    }

    #[test]
    fn test_percentile_extremes() {
        let v = [10.0, 20.0, 30.0];
        assert_eq!(percentile(&v, 0.0), 10.0);
        assert_eq!(percentile(&v, 100.0), 30.0);
        assert_eq!(percentile(&v, 2.5), 10.5);
    }
}
