//! Small dense matrices: inversion, determinants, linear solves and the
//! Jacobi eigen-decomposition used by factor extraction.

use crate::error::{StatsError, StatsResult};
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

const PIVOT_EPS: f64 = 1e-12;
const JACOBI_MAX_SWEEPS: usize = 100;

/// Row-major dense matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m[(i, i)] = 1.0;
        }
        m
    }

    /// Build from nested rows; all rows must have the same length
    pub fn from_rows(rows: &[Vec<f64>]) -> StatsResult<Self> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        if rows.iter().any(|r| r.len() != cols) {
            return Err(StatsError::Dimension("ragged rows".to_string()));
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data: rows.iter().flatten().copied().collect(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn column(&self, j: usize) -> Vec<f64> {
        (0..self.rows).map(|i| self[(i, j)]).collect()
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.rows).map(|i| self.row(i).to_vec()).collect()
    }

    pub fn transpose(&self) -> Self {
        let mut t = Self::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                t[(j, i)] = self[(i, j)];
            }
        }
        t
    }

    pub fn mul(&self, other: &Matrix) -> StatsResult<Self> {
        if self.cols != other.rows {
            return Err(StatsError::Dimension(format!(
                "{}x{} * {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        let mut out = Self::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self[(i, k)];
                if a == 0.0 {
                    continue;
                }
                for j in 0..other.cols {
                    out[(i, j)] += a * other[(k, j)];
                }
            }
        }
        Ok(out)
    }

    /// Inverse by Gauss-Jordan elimination with partial pivoting
    pub fn inverse(&self) -> StatsResult<Self> {
        if !self.is_square() {
            return Err(StatsError::Dimension("inverse of non-square matrix".into()));
        }
        let n = self.rows;
        let mut a = self.clone();
        let mut inv = Self::identity(n);

        for col in 0..n {
            let pivot = (col..n)
                .max_by(|&x, &y| a[(x, col)].abs().total_cmp(&a[(y, col)].abs()))
                .unwrap_or(col);
            if a[(pivot, col)].abs() < PIVOT_EPS {
                return Err(StatsError::SingularMatrix);
            }
            a.swap_rows(col, pivot);
            inv.swap_rows(col, pivot);

            let p = a[(col, col)];
            for j in 0..n {
                a[(col, j)] /= p;
                inv[(col, j)] /= p;
            }
            for r in 0..n {
                if r == col {
                    continue;
                }
                let factor = a[(r, col)];
                if factor == 0.0 {
                    continue;
                }
                for j in 0..n {
                    a[(r, j)] -= factor * a[(col, j)];
                    inv[(r, j)] -= factor * inv[(col, j)];
                }
            }
        }
        Ok(inv)
    }

    /// Natural log of |det|, via LU decomposition with partial pivoting
    pub fn log_abs_det(&self) -> StatsResult<f64> {
        if !self.is_square() {
            return Err(StatsError::Dimension("determinant of non-square matrix".into()));
        }
        let n = self.rows;
        let mut a = self.clone();
        let mut log_det = 0.0;
        for col in 0..n {
            let pivot = (col..n)
                .max_by(|&x, &y| a[(x, col)].abs().total_cmp(&a[(y, col)].abs()))
                .unwrap_or(col);
            if a[(pivot, col)].abs() < PIVOT_EPS {
                return Err(StatsError::SingularMatrix);
            }
            a.swap_rows(col, pivot);
            let p = a[(col, col)];
            log_det += p.abs().ln();
            for r in col + 1..n {
                let factor = a[(r, col)] / p;
                for j in col..n {
                    a[(r, j)] -= factor * a[(col, j)];
                }
            }
        }
        Ok(log_det)
    }

    /// Solve A x = b for square A
    pub fn solve(&self, b: &[f64]) -> StatsResult<Vec<f64>> {
        if b.len() != self.rows {
            return Err(StatsError::Dimension("rhs length".into()));
        }
        let inv = self.inverse()?;
        Ok((0..self.rows)
            .map(|i| inv.row(i).iter().zip(b).map(|(a, x)| a * x).sum())
            .collect())
    }

    /// Eigen-decomposition of a symmetric matrix by cyclic Jacobi rotations.
    ///
    /// Returns eigenvalues in descending order and the matching unit
    /// eigenvectors as the columns of the second matrix. Each eigenvector is
    /// oriented so its components sum to a non-negative value.
    pub fn symmetric_eigen(&self) -> StatsResult<(Vec<f64>, Matrix)> {
        if !self.is_square() {
            return Err(StatsError::Dimension("eigen of non-square matrix".into()));
        }
        let n = self.rows;
        let mut a = self.clone();
        let mut v = Self::identity(n);

        for _ in 0..JACOBI_MAX_SWEEPS {
            let off: f64 = (0..n)
                .flat_map(|p| (p + 1..n).map(move |q| (p, q)))
                .map(|(p, q)| a[(p, q)].powi(2))
                .sum();
            if off < 1e-24 {
                break;
            }
            for p in 0..n {
                for q in p + 1..n {
                    let apq = a[(p, q)];
                    if apq.abs() < 1e-300 {
                        continue;
                    }
                    let theta = (a[(q, q)] - a[(p, p)]) / (2.0 * apq);
                    let t = if theta >= 0.0 {
                        1.0 / (theta + (theta * theta + 1.0).sqrt())
                    } else {
                        -1.0 / (-theta + (theta * theta + 1.0).sqrt())
                    };
                    let c = 1.0 / (t * t + 1.0).sqrt();
                    let s = t * c;
                    for k in 0..n {
                        let akp = a[(k, p)];
                        let akq = a[(k, q)];
                        a[(k, p)] = c * akp - s * akq;
                        a[(k, q)] = s * akp + c * akq;
                    }
                    for k in 0..n {
                        let apk = a[(p, k)];
                        let aqk = a[(q, k)];
                        a[(p, k)] = c * apk - s * aqk;
                        a[(q, k)] = s * apk + c * aqk;
                    }
                    for k in 0..n {
                        let vkp = v[(k, p)];
                        let vkq = v[(k, q)];
                        v[(k, p)] = c * vkp - s * vkq;
                        v[(k, q)] = s * vkp + c * vkq;
                    }
                }
            }
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&x, &y| a[(y, y)].total_cmp(&a[(x, x)]));

        let values: Vec<f64> = order.iter().map(|&i| a[(i, i)]).collect();
        let mut vectors = Self::zeros(n, n);
        for (dst, &src) in order.iter().enumerate() {
            let sign = if v.column(src).iter().sum::<f64>() < 0.0 {
                -1.0
            } else {
                1.0
            };
            for k in 0..n {
                vectors[(k, dst)] = sign * v[(k, src)];
            }
        }
        Ok((values, vectors))
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for j in 0..self.cols {
            self.data.swap(a * self.cols + j, b * self.cols + j);
        }
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        &self.data[i * self.cols + j]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        &mut self.data[i * self.cols + j]
    }
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
    fn test_inverse_round_trips_to_identity() {
        let m = sample();
        let product = m.mul(&m.inverse().unwrap()).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((product[(i, j)] - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_singular_matrix_rejected() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0], vec![2.0, 4.0]]).unwrap();
        assert_eq!(m.inverse(), Err(StatsError::SingularMatrix));
        assert_eq!(m.log_abs_det(), Err(StatsError::SingularMatrix));
    }

    #[test]
    fn test_log_det() {
        // det = 1 + 2(0.5)(0.3)(0.4) - 0.25 - 0.16 - 0.09 = 0.62
        assert!((sample().log_abs_det().unwrap() - 0.62f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_solve() {
        let m = Matrix::from_rows(&[vec![2.0, 1.0], vec![1.0, 3.0]]).unwrap();
        let x = m.solve(&[3.0, 5.0]).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_eigen_reconstructs_matrix() {
        let m = sample();
        let (values, vectors) = m.symmetric_eigen().unwrap();
        assert!(values.windows(2).all(|w| w[0] >= w[1]));
        assert!((values.iter().sum::<f64>() - 3.0).abs() < 1e-10);

        let mut diag = Matrix::zeros(3, 3);
        for i in 0..3 {
            diag[(i, i)] = values[i];
        }
        let rebuilt = vectors
            .mul(&diag)
            .unwrap()
            .mul(&vectors.transpose())
            .unwrap();
        for i in 0..3 {
            for j in 0..3 {
                assert!((rebuilt[(i, j)] - m[(i, j)]).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn test_eigen_of_diagonal() {
        let m = Matrix::from_rows(&[vec![2.0, 0.0], vec![0.0, 5.0]]).unwrap();
        let (values, _) = m.symmetric_eigen().unwrap();
        assert_eq!(values, vec![5.0, 2.0]);
    }
}
