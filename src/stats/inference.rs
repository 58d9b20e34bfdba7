//! Hypothesis tests: Mann-Whitney U, Welch t, chi-square contingency and
//! two-way factorial ANOVA.

use super::descriptive::{mean, variance};
use super::matrix::Matrix;
use super::rank::{average_ranks, tie_groups};
use super::special::{chi_square_sf, f_sf, normal_sf, t_two_sided};
use crate::error::{StatsError, StatsResult};
use serde::{Deserialize, Serialize};

/// Both samples at or below this size (and no ties) use the exact U distribution
const EXACT_MANN_WHITNEY_MAX: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PValueMethod {
    Exact,
    Asymptotic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MannWhitney {
    /// U statistic of the first sample
    pub u: f64,
    pub p_value: f64,
    pub method: PValueMethod,
}

/// Two-sided Mann-Whitney U test
pub fn mann_whitney_u(x: &[f64], y: &[f64]) -> StatsResult<MannWhitney> {
    if x.is_empty() {
        return Err(StatsError::EmptyGroup("first".into()));
    }
    if y.is_empty() {
        return Err(StatsError::EmptyGroup("second".into()));
    }
    let n1 = x.len();
    let n2 = y.len();
    let combined: Vec<f64> = x.iter().chain(y).copied().collect();
    let ranks = average_ranks(&combined);
    let r1: f64 = ranks[..n1].iter().sum();
    let u1 = r1 - (n1 * (n1 + 1)) as f64 / 2.0;
    let u2 = (n1 * n2) as f64 - u1;
    let u_max = u1.max(u2);

    let ties = tie_groups(&combined);
    if ties.is_empty() && n1 <= EXACT_MANN_WHITNEY_MAX && n2 <= EXACT_MANN_WHITNEY_MAX {
        let p = (2.0 * exact_u_upper_tail(n1, n2, u_max.round() as usize)).min(1.0);
        return Ok(MannWhitney {
            u: u1,
            p_value: p,
            method: PValueMethod::Exact,
        });
    }

    let n = (n1 + n2) as f64;
    let tie_term: f64 = ties
        .iter()
        .map(|&t| {
            let t = t as f64;
            t * t * t - t
        })
        .sum();
    let sigma = ((n1 * n2) as f64 / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)))).sqrt();
    let p = if sigma == 0.0 {
        1.0
    } else {
        let mu = (n1 * n2) as f64 / 2.0;
        let z = (u_max - mu - 0.5) / sigma;
        (2.0 * normal_sf(z)).min(1.0)
    };
    Ok(MannWhitney {
        u: u1,
        p_value: p,
        method: PValueMethod::Asymptotic,
    })
}

/// P(U >= k) under H0 for sample sizes (m, n) without ties
fn exact_u_upper_tail(m: usize, n: usize, k: usize) -> f64 {
    // counts[i][j][u]: arrangements of i and j observations with statistic u
    let max_u = m * n;
    let mut counts = vec![vec![vec![0u64; max_u + 1]; n + 1]; m + 1];
    for i in 0..=m {
        for j in 0..=n {
            if i == 0 || j == 0 {
                counts[i][j][0] = 1;
                continue;
            }
            for u in 0..=i * j {
                let with_x_last = if u >= j { counts[i - 1][j][u - j] } else { 0 };
                let with_y_last = counts[i][j - 1][u];
                counts[i][j][u] = with_x_last + with_y_last;
            }
        }
    }
    let total: u64 = counts[m][n].iter().sum();
    let upper: u64 = counts[m][n].iter().skip(k).sum();
    upper as f64 / total as f64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WelchT {
    pub t: f64,
    pub df: f64,
    pub p_value: f64,
}

/// Welch's unequal-variance t-test, two-sided
pub fn welch_t(x: &[f64], y: &[f64]) -> StatsResult<WelchT> {
    for len in [x.len(), y.len()] {
        if len < 2 {
            return Err(StatsError::TooFewObservations { needed: 2, got: len });
        }
    }
    let (n1, n2) = (x.len() as f64, y.len() as f64);
    let a = variance(x) / n1;
    let b = variance(y) / n2;
    let se = (a + b).sqrt();
    if se == 0.0 {
        return Err(StatsError::ZeroVariance);
    }
    let t = (mean(x) - mean(y)) / se;
    let df = (a + b).powi(2) / (a * a / (n1 - 1.0) + b * b / (n2 - 1.0));
    Ok(WelchT {
        t,
        df,
        p_value: t_two_sided(t, df),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChiSquare {
    pub statistic: f64,
    pub dof: usize,
    pub p_value: f64,
    pub expected: Vec<Vec<f64>>,
    pub total: f64,
    /// Whether Yates' continuity correction was applied
    pub yates: bool,
}

/// Pearson chi-square test of independence on an r x c table of counts.
/// Yates' correction is applied when the table has one degree of freedom.
pub fn chi_square_contingency(observed: &[Vec<f64>]) -> StatsResult<ChiSquare> {
    let rows = observed.len();
    let cols = observed.first().map(|r| r.len()).unwrap_or(0);
    if rows < 2 || cols < 2 || observed.iter().any(|r| r.len() != cols) {
        return Err(StatsError::DegenerateTable);
    }
    let row_sums: Vec<f64> = observed.iter().map(|r| r.iter().sum()).collect();
    let col_sums: Vec<f64> = (0..cols)
        .map(|j| observed.iter().map(|r| r[j]).sum())
        .collect();
    let total: f64 = row_sums.iter().sum();
    let expected: Vec<Vec<f64>> = row_sums
        .iter()
        .map(|rs| col_sums.iter().map(|cs| rs * cs / total).collect())
        .collect();
    if expected.iter().flatten().any(|&e| e == 0.0 || !e.is_finite()) {
        return Err(StatsError::ZeroExpected);
    }

    let dof = (rows - 1) * (cols - 1);
    let yates = dof == 1;
    let mut statistic = 0.0;
    for i in 0..rows {
        for j in 0..cols {
            let e = expected[i][j];
            let mut o = observed[i][j];
            if yates {
                let diff = e - o;
                o += diff.signum() * diff.abs().min(0.5);
            }
            statistic += (o - e).powi(2) / e;
        }
    }
    Ok(ChiSquare {
        statistic,
        dof,
        p_value: chi_square_sf(statistic, dof as f64),
        expected,
        total,
        yates,
    })
}

/// Phi coefficient from a chi-square statistic
pub fn phi(chi2: f64, total: f64) -> f64 {
    if total <= 0.0 {
        return f64::NAN;
    }
    (chi2 / total).sqrt()
}

/// Conventional magnitude labels for phi / Cramer's V
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Magnitude {
    Negligible,
    Small,
    Medium,
    Large,
}

impl Magnitude {
    pub fn from_phi(phi: f64) -> Self {
        if phi < 0.1 {
            Magnitude::Negligible
        } else if phi < 0.3 {
            Magnitude::Small
        } else if phi < 0.5 {
            Magnitude::Medium
        } else {
            Magnitude::Large
        }
    }

    /// Partial eta squared thresholds (0.01 / 0.06 / 0.14)
    pub fn from_partial_eta_squared(eta: f64) -> Self {
        if eta < 0.01 {
            Magnitude::Negligible
        } else if eta < 0.06 {
            Magnitude::Small
        } else if eta < 0.14 {
            Magnitude::Medium
        } else {
            Magnitude::Large
        }
    }
}

impl std::fmt::Display for Magnitude {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Magnitude::Negligible => write!(f, "negligible"),
            Magnitude::Small => write!(f, "small"),
            Magnitude::Medium => write!(f, "medium"),
            Magnitude::Large => write!(f, "large"),
        }
    }
}

/// One row of an ANOVA table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnovaRow {
    pub source: String,
    pub sum_sq: f64,
    pub df: f64,
    /// None for the residual row
    pub f: Option<f64>,
    pub p_value: Option<f64>,
    pub partial_eta_squared: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoWayAnova {
    pub rows: Vec<AnovaRow>,
    /// Cell sizes in order (a0,b0), (a0,b1), (a1,b0), (a1,b1)
    pub cell_sizes: [usize; 4],
    pub cell_means: [f64; 4],
}

impl TwoWayAnova {
    pub fn row(&self, source: &str) -> Option<&AnovaRow> {
        self.rows.iter().find(|r| r.source == source)
    }
}

/// Two-way ANOVA for a 2 x 2 design with Type III sums of squares.
///
/// `a` and `b` give each observation's level (false / true) on the two
/// factors. Cells may be unbalanced but none may be empty.
pub fn two_way_anova(
    y: &[f64],
    a: &[bool],
    b: &[bool],
    names: (&str, &str),
) -> StatsResult<TwoWayAnova> {
    if y.len() != a.len() || y.len() != b.len() {
        return Err(StatsError::Dimension("factor lengths differ".into()));
    }
    let mut cells: [Vec<f64>; 4] = Default::default();
    for i in 0..y.len() {
        cells[(a[i] as usize) * 2 + b[i] as usize].push(y[i]);
    }
    if let Some(empty) = cells.iter().position(|c| c.is_empty()) {
        return Err(StatsError::EmptyGroup(format!("cell {}", empty)));
    }
    let n = y.len();
    if n <= 4 {
        return Err(StatsError::TooFewObservations { needed: 5, got: n });
    }

    // Sum-to-zero coding: intercept, A, B, AxB
    let effect = |flag: bool| if flag { 1.0 } else { -1.0 };
    let design: Vec<[f64; 4]> = (0..n)
        .map(|i| {
            let ea = effect(a[i]);
            let eb = effect(b[i]);
            [1.0, ea, eb, ea * eb]
        })
        .collect();

    let sse_full = residual_sum_of_squares(&design, y, &[0, 1, 2, 3])?;
    let df_resid = (n - 4) as f64;
    let mse = sse_full / df_resid;
    if mse <= 0.0 {
        return Err(StatsError::ZeroVariance);
    }

    let mut rows = Vec::with_capacity(4);
    let interaction = format!("{}:{}", names.0, names.1);
    for (column, source) in [(1usize, names.0), (2, names.1), (3, interaction.as_str())] {
        let kept: Vec<usize> = (0..4).filter(|&c| c != column).collect();
        let sse_reduced = residual_sum_of_squares(&design, y, &kept)?;
        let ss = (sse_reduced - sse_full).max(0.0);
        let f = ss / mse;
        rows.push(AnovaRow {
            source: source.to_string(),
            sum_sq: ss,
            df: 1.0,
            f: Some(f),
            p_value: Some(f_sf(f, 1.0, df_resid)),
            partial_eta_squared: Some(ss / (ss + sse_full)),
        });
    }
    rows.push(AnovaRow {
        source: "Residual".to_string(),
        sum_sq: sse_full,
        df: df_resid,
        f: None,
        p_value: None,
        partial_eta_squared: None,
    });

    Ok(TwoWayAnova {
        rows,
        cell_sizes: [cells[0].len(), cells[1].len(), cells[2].len(), cells[3].len()],
        cell_means: [
            mean(&cells[0]),
            mean(&cells[1]),
            mean(&cells[2]),
            mean(&cells[3]),
        ],
    })
}

/// Residual sum of squares of an OLS fit on the selected design columns
fn residual_sum_of_squares(design: &[[f64; 4]], y: &[f64], columns: &[usize]) -> StatsResult<f64> {
    let k = columns.len();
    let mut xtx = Matrix::zeros(k, k);
    let mut xty = vec![0.0; k];
    for (row, &yi) in design.iter().zip(y) {
        for (p, &cp) in columns.iter().enumerate() {
            xty[p] += row[cp] * yi;
            for (q, &cq) in columns.iter().enumerate() {
                xtx[(p, q)] += row[cp] * row[cq];
            }
        }
    }
    let beta = xtx.solve(&xty)?;
    Ok(design
        .iter()
        .zip(y)
        .map(|(row, &yi)| {
            let fitted: f64 = columns.iter().zip(&beta).map(|(&c, b)| row[c] * b).sum();
            (yi - fitted).powi(2)
        })
        .sum())
}
