//! Factorability checks and principal-component extraction with varimax
//! rotation.

use super::matrix::Matrix;
use super::special::chi_square_sf;
use crate::error::{StatsError, StatsResult};
use serde::{Deserialize, Serialize};

pub const VARIMAX_MAX_ITERATIONS: usize = 500;
pub const VARIMAX_TOLERANCE: f64 = 1e-6;

/// Bartlett's test of sphericity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bartlett {
    pub chi_square: f64,
    pub df: usize,
    pub p_value: f64,
}

/// Tests whether the correlation matrix `r` of `n` observations differs
/// from the identity.
pub fn bartlett_sphericity(r: &Matrix, n: usize) -> StatsResult<Bartlett> {
    if !r.is_square() {
        return Err(StatsError::Dimension("correlation matrix must be square".into()));
    }
    let p = r.rows();
    if n <= p {
        return Err(StatsError::TooFewObservations { needed: p + 1, got: n });
    }
    let log_det = r.log_abs_det()?;
    let chi_square = -((n as f64 - 1.0) - (2.0 * p as f64 + 5.0) / 6.0) * log_det;
    let df = p * (p - 1) / 2;
    Ok(Bartlett {
        chi_square,
        df,
        p_value: chi_square_sf(chi_square, df as f64),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KmoLabel {
    Marvelous,
    Meritorious,
    Middling,
    Mediocre,
    Miserable,
    Unacceptable,
}

impl KmoLabel {
    pub fn from_value(kmo: f64) -> Self {
        match kmo {
            v if v >= 0.9 => KmoLabel::Marvelous,
            v if v >= 0.8 => KmoLabel::Meritorious,
            v if v >= 0.7 => KmoLabel::Middling,
            v if v >= 0.6 => KmoLabel::Mediocre,
            v if v >= 0.5 => KmoLabel::Miserable,
            _ => KmoLabel::Unacceptable,
        }
    }
}

impl std::fmt::Display for KmoLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            KmoLabel::Marvelous => "Marvelous",
            KmoLabel::Meritorious => "Meritorious",
            KmoLabel::Middling => "Middling",
            KmoLabel::Mediocre => "Mediocre",
            KmoLabel::Miserable => "Miserable",
            KmoLabel::Unacceptable => "Unacceptable",
        };
        write!(f, "{}", s)
    }
}

/// Kaiser-Meyer-Olkin measure of sampling adequacy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kmo {
    pub overall: f64,
    pub per_item: Vec<f64>,
    pub label: KmoLabel,
}

/// KMO from a correlation matrix, using anti-image (partial) correlations
pub fn kmo(r: &Matrix) -> StatsResult<Kmo> {
    let inv = r.inverse()?;
    let p = r.rows();
    let mut partial = Matrix::zeros(p, p);
    for i in 0..p {
        for j in 0..p {
            if i != j {
                partial[(i, j)] = -inv[(i, j)] / (inv[(i, i)] * inv[(j, j)]).sqrt();
            }
        }
    }

    let mut per_item = Vec::with_capacity(p);
    let (mut r2_total, mut p2_total) = (0.0, 0.0);
    for i in 0..p {
        let (mut r2, mut p2) = (0.0, 0.0);
        for j in (0..p).filter(|&j| j != i) {
            r2 += r[(i, j)].powi(2);
            p2 += partial[(i, j)].powi(2);
        }
        per_item.push(r2 / (r2 + p2));
        r2_total += r2;
        p2_total += p2;
    }
    let overall = r2_total / (r2_total + p2_total);
    Ok(Kmo {
        overall,
        per_item,
        label: KmoLabel::from_value(overall),
    })
}

/// Rotated principal-component solution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorSolution {
    /// All eigenvalues of the correlation matrix, descending
    pub eigenvalues: Vec<f64>,
    /// Items x factors, after rotation
    pub loadings: Matrix,
    /// Eigenvalue of each extracted factor divided by the item count
    pub variance_explained: Vec<f64>,
    /// Row sums of squared loadings
    pub communalities: Vec<f64>,
}

/// Extracts `num_factors` principal components from a correlation matrix
/// and rotates them with varimax.
pub fn principal_varimax(r: &Matrix, num_factors: usize) -> StatsResult<FactorSolution> {
    let p = r.rows();
    if num_factors == 0 || num_factors > p {
        return Err(StatsError::Dimension(format!(
            "cannot extract {} factors from {} items",
            num_factors, p
        )));
    }
    let (eigenvalues, vectors) = r.symmetric_eigen()?;

    let mut loadings = Matrix::zeros(p, num_factors);
    for f in 0..num_factors {
        let scale = eigenvalues[f].max(0.0).sqrt();
        for i in 0..p {
            loadings[(i, f)] = vectors[(i, f)] * scale;
        }
    }
    let loadings = if num_factors > 1 {
        varimax(&loadings, VARIMAX_MAX_ITERATIONS, VARIMAX_TOLERANCE)
    } else {
        loadings
    };

    let variance_explained = eigenvalues
        .iter()
        .take(num_factors)
        .map(|l| l / p as f64)
        .collect();
    let communalities = (0..p)
        .map(|i| loadings.row(i).iter().map(|l| l * l).sum())
        .collect();

    Ok(FactorSolution {
        eigenvalues,
        loadings,
        variance_explained,
        communalities,
    })
}

/// Varimax rotation with Kaiser row normalization, by successive pairwise
/// planar rotations. Factors are sign-flipped so each column sums positive.
pub fn varimax(loadings: &Matrix, max_iterations: usize, tolerance: f64) -> Matrix {
    let p = loadings.rows();
    let k = loadings.cols();
    let norms: Vec<f64> = (0..p)
        .map(|i| loadings.row(i).iter().map(|l| l * l).sum::<f64>().sqrt())
        .collect();

    let mut x = loadings.clone();
    for (i, &h) in norms.iter().enumerate() {
        if h > 0.0 {
            for j in 0..k {
                x[(i, j)] /= h;
            }
        }
    }

    let n = p as f64;
    for _ in 0..max_iterations {
        let mut largest_angle: f64 = 0.0;
        for a in 0..k {
            for b in a + 1..k {
                let (mut sum_u, mut sum_v, mut c, mut d) = (0.0, 0.0, 0.0, 0.0);
                for i in 0..p {
                    let u = x[(i, a)].powi(2) - x[(i, b)].powi(2);
                    let v = 2.0 * x[(i, a)] * x[(i, b)];
                    sum_u += u;
                    sum_v += v;
                    c += u * u - v * v;
                    d += 2.0 * u * v;
                }
                let numerator = d - 2.0 * sum_u * sum_v / n;
                let denominator = c - (sum_u * sum_u - sum_v * sum_v) / n;
                let phi = numerator.atan2(denominator) / 4.0;
                largest_angle = largest_angle.max(phi.abs());

                let (sin, cos) = phi.sin_cos();
                for i in 0..p {
                    let xa = x[(i, a)];
                    let xb = x[(i, b)];
                    x[(i, a)] = cos * xa + sin * xb;
                    x[(i, b)] = -sin * xa + cos * xb;
                }
            }
        }
        if largest_angle < tolerance {
            break;
        }
    }

    for (i, &h) in norms.iter().enumerate() {
        if h > 0.0 {
            for j in 0..k {
                x[(i, j)] *= h;
            }
        }
    }
    for j in 0..k {
        if x.column(j).iter().sum::<f64>() < 0.0 {
            for i in 0..p {
                x[(i, j)] = -x[(i, j)];
            }
        }
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Matrix {
        Matrix::from_rows(&[
            vec![1.0, 0.5, 0.4],
            vec![0.5, 1.0, 0.3],
            vec![0.4, 0.3, 1.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_bartlett_known_value() {
        let b = bartlett_sphericity(&sample(), 100).unwrap();
        assert_eq!(b.df, 3);
        assert!((b.chi_square - 46.449_145_324_961).abs() < 1e-9);
        assert!(b.p_value < 1e-9);
    }

    #[test]
    fn test_bartlett_identity_is_not_significant() {
        let b = bartlett_sphericity(&Matrix::identity(4), 50).unwrap();
        assert!(b.chi_square.abs() < 1e-12);
        assert!((b.p_value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_bartlett_needs_more_rows_than_items() {
        assert!(matches!(
            bartlett_sphericity(&sample(), 3),
            Err(StatsError::TooFewObservations { needed: 4, got: 3 })
        ));
    }

    #[test]
    fn test_kmo_known_value() {
        let k = kmo(&sample()).unwrap();
        assert!((k.overall - 0.627_861_132_406).abs() < 1e-9);
        assert!((k.per_item[0] - 0.593_788_603_345).abs() < 1e-9);
        assert!((k.per_item[2] - 0.699_402_220_325).abs() < 1e-9);
        assert_eq!(k.label, KmoLabel::Mediocre);
    }

    #[test]
    fn test_kmo_labels() {
        assert_eq!(KmoLabel::from_value(0.95), KmoLabel::Marvelous);
        assert_eq!(KmoLabel::from_value(0.8), KmoLabel::Meritorious);
        assert_eq!(KmoLabel::from_value(0.49), KmoLabel::Unacceptable);
        assert_eq!(KmoLabel::Middling.to_string(), "Middling");
    }

    #[test]
    fn test_varimax_recovers_simple_structure() {
        let theta: f64 = 0.5;
        let base = [[0.8, 0.0], [0.7, 0.0], [0.0, 0.8], [0.0, 0.7]];
        let rotated: Vec<Vec<f64>> = base
            .iter()
            .map(|[a, b]| {
                vec![
                    a * theta.cos() - b * theta.sin(),
                    a * theta.sin() + b * theta.cos(),
                ]
            })
            .collect();
        let l = varimax(
            &Matrix::from_rows(&rotated).unwrap(),
            VARIMAX_MAX_ITERATIONS,
            VARIMAX_TOLERANCE,
        );
        for (i, [a, b]) in base.iter().enumerate() {
            let expected_major = a.max(*b);
            let row = l.row(i);
            let major = row[0].abs().max(row[1].abs());
            let minor = row[0].abs().min(row[1].abs());
            assert!((major - expected_major).abs() < 1e-6, "row {}: {:?}", i, row);
            assert!(minor < 1e-6, "row {}: {:?}", i, row);
        }
    }

    #[test]
    fn test_rotation_preserves_communalities() {
        let r = Matrix::from_rows(&[
            vec![1.0, 0.6, 0.5, 0.1, 0.1],
            vec![0.6, 1.0, 0.4, 0.2, 0.1],
            vec![0.5, 0.4, 1.0, 0.1, 0.2],
            vec![0.1, 0.2, 0.1, 1.0, 0.5],
            vec![0.1, 0.1, 0.2, 0.5, 1.0],
        ])
        .unwrap();
        let (values, vectors) = r.symmetric_eigen().unwrap();
        let solution = principal_varimax(&r, 2).unwrap();
        for i in 0..5 {
            let unrotated: f64 = (0..2).map(|f| vectors[(i, f)].powi(2) * values[f]).sum();
            assert!((solution.communalities[i] - unrotated).abs() < 1e-9);
        }
        let explained: f64 = solution.variance_explained.iter().sum();
        assert!((explained - (values[0] + values[1]) / 5.0).abs() < 1e-9);
        assert_eq!(solution.eigenvalues.len(), 5);
        for f in 0..2 {
            assert!(solution.loadings.column(f).iter().sum::<f64>() >= 0.0);
        }
    }

    #[test]
    fn test_variance_explained_is_eigenvalue_share() {
        let r = Matrix::from_rows(&[
            vec![1.0, 0.6, 0.2, 0.1],
            vec![0.6, 1.0, 0.1, 0.2],
            vec![0.2, 0.1, 1.0, 0.5],
            vec![0.1, 0.2, 0.5, 1.0],
        ])
        .unwrap();
        let solution = principal_varimax(&r, 2).unwrap();
        for f in 0..2 {
            let expected = solution.eigenvalues[f] / 4.0;
            assert!(
                (solution.variance_explained[f] - expected).abs() < 1e-12,
                "factor {}: {} vs {}",
                f,
                solution.variance_explained[f],
                expected
            );
        }
        assert!(solution.variance_explained[0] > solution.variance_explained[1]);
    }

    #[test]
    fn test_too_many_factors_rejected() {
        assert!(principal_varimax(&sample(), 4).is_err());
    }
}
