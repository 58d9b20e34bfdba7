//! Correlation coefficients and item correlation matrices

use super::rank::average_ranks;
use serde::{Deserialize, Serialize};

/// Minimum number of pairwise-complete observations for a matrix entry
pub const MIN_PAIRED_OBSERVATIONS: usize = 3;

/// Correlation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    Pearson,
    Spearman,
    Kendall,
}

impl std::fmt::Display for CorrelationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorrelationMethod::Pearson => write!(f, "Pearson"),
            CorrelationMethod::Spearman => write!(f, "Spearman"),
            CorrelationMethod::Kendall => write!(f, "Kendall"),
        }
    }
}

impl CorrelationMethod {
    pub fn coefficient(self, x: &[f64], y: &[f64]) -> f64 {
        match self {
            CorrelationMethod::Pearson => pearson(x, y),
            CorrelationMethod::Spearman => spearman(x, y),
            CorrelationMethod::Kendall => kendall_tau_b(x, y),
        }
    }
}

/// Pearson product-moment correlation; NaN when undefined
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }
    let mx = x[..n].iter().sum::<f64>() / n as f64;
    let my = y[..n].iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for i in 0..n {
        let dx = x[i] - mx;
        let dy = y[i] - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
}

/// Spearman rank correlation (Pearson on average ranks)
pub fn spearman(x: &[f64], y: &[f64]) -> f64 {
    pearson(&average_ranks(x), &average_ranks(y))
}

/// Kendall tau-b, adjusted for ties in either variable
pub fn kendall_tau_b(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }
    let (mut concordant, mut discordant) = (0i64, 0i64);
    let (mut ties_x, mut ties_y) = (0i64, 0i64);
    for i in 0..n {
        for j in i + 1..n {
            let dx = x[i].total_cmp(&x[j]) as i8;
            let dy = y[i].total_cmp(&y[j]) as i8;
            match (dx, dy) {
                (0, 0) => {
                    ties_x += 1;
                    ties_y += 1;
                }
                (0, _) => ties_x += 1,
                (_, 0) => ties_y += 1,
                _ if dx == dy => concordant += 1,
                _ => discordant += 1,
            }
        }
    }
    let n0 = (n * (n - 1) / 2) as i64;
    let denom = (((n0 - ties_x) * (n0 - ties_y)) as f64).sqrt();
    if denom == 0.0 {
        return f64::NAN;
    }
    ((concordant - discordant) as f64 / denom).clamp(-1.0, 1.0)
}

/// Square, symmetric correlation matrix over named survey items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemCorrelationMatrix {
    pub method: CorrelationMethod,
    pub labels: Vec<String>,
    /// Row-major values; NaN where a pair had too few complete observations
    pub values: Vec<Vec<f64>>,
    /// Number of respondents contributing at least one value
    pub n: usize,
}

impl ItemCorrelationMatrix {
    /// Pairwise-complete correlation matrix over item columns.
    ///
    /// `columns[k][r]` is respondent `r`'s answer to item `k`.
    pub fn compute(
        labels: &[String],
        columns: &[Vec<Option<f64>>],
        method: CorrelationMethod,
    ) -> Self {
        let p = columns.len();
        let mut values = vec![vec![f64::NAN; p]; p];
        for i in 0..p {
            let present: Vec<f64> = columns[i].iter().flatten().copied().collect();
            let varies = present.windows(2).any(|w| w[0] != w[1]);
            values[i][i] = if varies { 1.0 } else { f64::NAN };
            for j in i + 1..p {
                let (xs, ys): (Vec<f64>, Vec<f64>) = columns[i]
                    .iter()
                    .zip(&columns[j])
                    .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
                    .unzip();
                let r = if xs.len() < MIN_PAIRED_OBSERVATIONS {
                    f64::NAN
                } else {
                    method.coefficient(&xs, &ys)
                };
                values[i][j] = r;
                values[j][i] = r;
            }
        }
        let n = columns
            .first()
            .map(|c| {
                (0..c.len())
                    .filter(|&r| columns.iter().any(|col| col[r].is_some()))
                    .count()
            })
            .unwrap_or(0);
        Self {
            method,
            labels: labels.to_vec(),
            values,
            n,
        }
    }

    pub fn size(&self) -> usize {
        self.labels.len()
    }

    /// Entries above the diagonal, row by row
    pub fn upper_triangle(&self) -> Vec<f64> {
        let p = self.size();
        let mut out = Vec::with_capacity(p * p.saturating_sub(1) / 2);
        for i in 0..p {
            for j in i + 1..p {
                out.push(self.values[i][j]);
            }
        }
        out
    }

    /// Mean of finite off-diagonal entries
    pub fn mean_off_diagonal(&self) -> f64 {
        let finite: Vec<f64> = self
            .upper_triangle()
            .into_iter()
            .filter(|v| v.is_finite())
            .collect();
        if finite.is_empty() {
            return f64::NAN;
        }
        finite.iter().sum::<f64>() / finite.len() as f64
    }

    /// Mean of the column means over finite entries, diagonal included
    pub fn mean_all_cells(&self) -> f64 {
        let column_means: Vec<f64> = (0..self.size())
            .filter_map(|j| {
                let finite: Vec<f64> = self
                    .values
                    .iter()
                    .map(|row| row[j])
                    .filter(|v| v.is_finite())
                    .collect();
                (!finite.is_empty()).then(|| finite.iter().sum::<f64>() / finite.len() as f64)
            })
            .collect();
        if column_means.is_empty() {
            return f64::NAN;
        }
        column_means.iter().sum::<f64>() / column_means.len() as f64
    }

    /// Same matrix with rows and columns permuted into `order`.
    /// Labels not present in the matrix are skipped.
    pub fn reordered(&self, order: &[&str]) -> Self {
        let idx: Vec<usize> = order
            .iter()
            .filter_map(|l| self.labels.iter().position(|x| x == l))
            .collect();
        Self {
            method: self.method,
            labels: idx.iter().map(|&i| self.labels[i].clone()).collect(),
            values: idx
                .iter()
                .map(|&i| idx.iter().map(|&j| self.values[i][j]).collect())
                .collect(),
            n: self.n,
        }
    }

    /// Values rounded to `decimals` places
    pub fn rounded(&self, decimals: i32) -> Self {
        let scale = 10f64.powi(decimals);
        Self {
            values: self
                .values
                .iter()
                .map(|row| row.iter().map(|v| (v * scale).round() / scale).collect())
                .collect(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn labels(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("g{:02}", i)).collect()
    }

    #[test]
    fn test_mean_all_cells_includes_diagonal() {
        let m = ItemCorrelationMatrix {
            method: CorrelationMethod::Pearson,
            labels: labels(3),
            values: vec![
                vec![1.0, 0.5, f64::NAN],
                vec![0.5, 1.0, 0.2],
                vec![f64::NAN, 0.2, 1.0],
            ],
            n: 10,
        };
        // Column means 0.75, 0.5667, 0.6
        assert!((m.mean_all_cells() - (0.75 + 1.7 / 3.0 + 0.6) / 3.0).abs() < 1e-12);
        assert!((m.mean_off_diagonal() - 0.35).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_perfect_and_inverse() {
        assert!((pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]) - 1.0).abs() < 1e-12);
        assert!((pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]) + 1.0).abs() < 1e-12);
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_nan());
    }

    #[test]
    fn test_spearman_monotone_nonlinear() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.0, 8.0, 27.0, 64.0, 125.0];
        assert!((spearman(&x, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_kendall_known_value() {
        // 4 concordant, 2 discordant, no ties: (4 - 2) / 6
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [1.0, 3.0, 2.0, 4.0];
        let tau = kendall_tau_b(&x, &y);
        assert!((tau - 4.0 / 6.0).abs() < 1e-12, "tau = {}", tau);
    }

    #[test]
    fn test_kendall_with_ties() {
        // Pairs: (1,2) tie in x; concordant 4, discordant 0, ties_x 1, ties_y 1
        let x = [1.0, 1.0, 2.0, 3.0];
        let y = [1.0, 2.0, 3.0, 3.0];
        let tau = kendall_tau_b(&x, &y);
        assert!((tau - 4.0 / 5.0).abs() < 1e-12, "tau = {}", tau);
    }

    #[test]
    fn test_matrix_pairwise_complete() {
        let cols = vec![
            vec![Some(1.0), Some(2.0), Some(3.0), None],
            vec![Some(2.0), Some(4.0), Some(6.0), Some(1.0)],
            vec![None, None, Some(1.0), Some(2.0)],
        ];
        let m = ItemCorrelationMatrix::compute(&labels(3), &cols, CorrelationMethod::Pearson);
        assert!((m.values[0][1] - 1.0).abs() < 1e-12);
        assert!(m.values[0][2].is_nan(), "only one complete pair");
        assert_eq!(m.values[1][1], 1.0);
        assert_eq!(m.n, 4);
        assert_eq!(m.upper_triangle().len(), 3);
    }

    #[test]
    fn test_reordered_and_rounded() {
        let cols = vec![
            vec![Some(1.0), Some(2.0), Some(3.0), Some(5.0)],
            vec![Some(2.0), Some(1.0), Some(4.0), Some(3.0)],
        ];
        let m = ItemCorrelationMatrix::compute(&labels(2), &cols, CorrelationMethod::Spearman);
        let r = m.reordered(&["g02", "g01"]);
        assert_eq!(r.labels, vec!["g02".to_string(), "g01".to_string()]);
        assert_eq!(r.values[0][1], m.values[1][0]);
        let rounded = m.rounded(2);
        assert_eq!(rounded.values[0][1], 0.6);
    }

    proptest! {
        #[test]
        fn coefficients_stay_in_bounds(
            pairs in prop::collection::vec((1u8..=5, 1u8..=5), 3..40)
        ) {
            let x: Vec<f64> = pairs.iter().map(|p| p.0 as f64).collect();
            let y: Vec<f64> = pairs.iter().map(|p| p.1 as f64).collect();
            for method in [CorrelationMethod::Pearson, CorrelationMethod::Spearman, CorrelationMethod::Kendall] {
                let r = method.coefficient(&x, &y);
                prop_assert!(r.is_nan() || (-1.0..=1.0).contains(&r));
            }
        }
    }
}
