//! Bootstrap validator for the stability of item correlation structure
//! within and between questionnaire variants.

use super::psychometrics::{factor_labels, item_columns, population};
use crate::config::{BootstrapSettings, Settings};
use crate::stats::correlation::kendall_tau_b;
use crate::stats::descriptive::{mean, percentile};
use crate::stats::{CorrelationMethod, ItemCorrelationMatrix};
use crate::{Dataset, Respondent, Variant, FACTOR_ITEMS};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Smallest group that can be subsampled
pub const MIN_GROUP_SIZE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PairKind {
    Within,
    Between,
}

impl std::fmt::Display for PairKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PairKind::Within => write!(f, "within"),
            PairKind::Between => write!(f, "between"),
        }
    }
}

/// Distribution of replicate similarities for one variant pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairStability {
    pub first: Variant,
    pub second: Variant,
    pub kind: PairKind,
    /// Replicates that produced a finite similarity
    pub replicates: usize,
    /// 2.5th percentile
    pub lower: Option<f64>,
    pub mean: Option<f64>,
    /// 97.5th percentile
    pub upper: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

impl PairStability {
    pub fn label(&self) -> String {
        format!("{} vs {}", self.first.label(), self.second.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapReport {
    pub settings: BootstrapSettings,
    pub pairs: Vec<PairStability>,
    /// Mean similarity over within-variant pairs
    pub within_mean: Option<f64>,
    /// Mean similarity over between-variant pairs
    pub between_mean: Option<f64>,
}

/// All unordered variant pairs (a, b) with a <= b
pub fn variant_pairs() -> Vec<(Variant, Variant)> {
    let mut pairs = Vec::with_capacity(10);
    for a in 0..Variant::ALL.len() {
        for b in a..Variant::ALL.len() {
            pairs.push((Variant::ALL[a], Variant::ALL[b]));
        }
    }
    pairs
}

/// Subsample size for `n` rows, rounding half to even
pub fn subsample_size(n: usize, fraction: f64) -> usize {
    (n as f64 * fraction).round_ties_even() as usize
}

/// RNG seed of replicate `i` of pair (a, b)
fn replicate_seed(seed: u64, a: usize, b: usize, i: usize) -> u64 {
    seed ^ ((a as u64) << 56) ^ ((b as u64) << 48) ^ (i as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn kendall_matrix(group: &[&Respondent], rows: &[usize]) -> ItemCorrelationMatrix {
    let chosen: Vec<&Respondent> = rows.iter().map(|&i| group[i]).collect();
    ItemCorrelationMatrix::compute(
        &factor_labels(),
        &item_columns(&chosen, FACTOR_ITEMS),
        CorrelationMethod::Kendall,
    )
}

/// Kendall tau-b between two upper triangles, dropping pairs where either is NaN
fn similarity(x: &ItemCorrelationMatrix, y: &ItemCorrelationMatrix) -> f64 {
    let (xs, ys): (Vec<f64>, Vec<f64>) = x
        .upper_triangle()
        .into_iter()
        .zip(y.upper_triangle())
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .unzip();
    kendall_tau_b(&xs, &ys)
}

pub struct BootstrapValidator<'a> {
    settings: &'a BootstrapSettings,
}

impl<'a> BootstrapValidator<'a> {
    pub fn new(settings: &'a BootstrapSettings) -> Self {
        Self { settings }
    }

    fn replicate(&self, groups: (&[&Respondent], &[&Respondent]), seed: u64) -> f64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let (first, second) = groups;
        let take = |group: &[&Respondent], rng: &mut StdRng| {
            let k = subsample_size(group.len(), self.settings.fraction).min(group.len());
            rand::seq::index::sample(rng, group.len(), k).into_vec()
        };
        let rows_a = take(first, &mut rng);
        let rows_b = take(second, &mut rng);
        similarity(&kendall_matrix(first, &rows_a), &kendall_matrix(second, &rows_b))
    }

    fn pair(
        &self,
        (a, b): (Variant, Variant),
        first: &[&Respondent],
        second: &[&Respondent],
    ) -> PairStability {
        let kind = if a == b { PairKind::Within } else { PairKind::Between };
        let mut result = PairStability {
            first: a,
            second: b,
            kind,
            replicates: 0,
            lower: None,
            mean: None,
            upper: None,
            skipped: None,
        };
        let smallest = first.len().min(second.len());
        if smallest < MIN_GROUP_SIZE {
            let reason = format!(
                "group has {} respondents, need at least {}",
                smallest, MIN_GROUP_SIZE
            );
            warn!(pair = %result.label(), %reason, "bootstrap pair skipped");
            result.skipped = Some(reason);
            return result;
        }

        let (ia, ib) = (a.index(), b.index());
        let values: Vec<f64> = (0..self.settings.iterations)
            .into_par_iter()
            .map(|i| self.replicate((first, second), replicate_seed(self.settings.seed, ia, ib, i)))
            .collect::<Vec<f64>>()
            .into_iter()
            .filter(|v| v.is_finite())
            .collect();

        debug!(pair = %result.label(), replicates = values.len(), "bootstrap pair done");
        result.replicates = values.len();
        if !values.is_empty() {
            result.lower = Some(percentile(&values, 2.5));
            result.mean = Some(mean(&values));
            result.upper = Some(percentile(&values, 97.5));
        }
        result
    }

    /// Run every variant pair over the psychometric population
    pub fn run(&self, dataset: &Dataset, settings: &Settings) -> BootstrapReport {
        let population = population(dataset, &settings.population);
        let groups: Vec<Vec<&Respondent>> = Variant::ALL
            .iter()
            .map(|v| population.iter().copied().filter(|r| r.variant == *v).collect())
            .collect();

        info!(
            iterations = self.settings.iterations,
            fraction = self.settings.fraction,
            seed = self.settings.seed,
            "running bootstrap validation"
        );
        let pairs: Vec<PairStability> = variant_pairs()
            .into_iter()
            .map(|(a, b)| self.pair((a, b), &groups[a.index()], &groups[b.index()]))
            .collect();

        let kind_mean = |kind: PairKind| {
            let means: Vec<f64> = pairs
                .iter()
                .filter(|p| p.kind == kind)
                .filter_map(|p| p.mean)
                .collect();
            (!means.is_empty()).then(|| mean(&means))
        };
        BootstrapReport {
            settings: self.settings.clone(),
            within_mean: kind_mean(PairKind::Within),
            between_mean: kind_mean(PairKind::Between),
            pairs,
        }
    }
}
