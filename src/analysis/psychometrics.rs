//! Structure of the grid items: sampling adequacy, per-variant factor
//! extraction, rank correlations and inter-item correlation.

use crate::config::{PopulationRules, Settings};
use crate::error::{StatsError, StatsResult};
use crate::stats::correlation::pearson;
use crate::stats::factor::{bartlett_sphericity, kmo, principal_varimax};
use crate::stats::{
    Bartlett, CorrelationMethod, FactorSolution, ItemCorrelationMatrix, Kmo, Matrix,
};
use crate::{Arm, Dataset, Respondent, Variant, FACTOR_ITEMS, ITEM_LABELS, ORDER_B};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Bartlett and KMO on the pooled complete cases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Adequacy {
    pub n: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bartlett: Option<Bartlett>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kmo: Option<Kmo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

/// Rotated factor solution of one variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantFactors {
    pub variant: Variant,
    pub label: String,
    /// Complete cases used
    pub n: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<FactorSolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

/// Spearman matrix of one variant, in canonical and presentation order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantCorrelation {
    pub variant: Variant,
    pub label: String,
    pub matrix: ItemCorrelationMatrix,
    /// Items in the order respondents saw them; present for order-B variants
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentation_order: Option<ItemCorrelationMatrix>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterItemCorrelation {
    /// Pearson matrix over all 13 items, rounded to 2 decimals
    pub matrix: ItemCorrelationMatrix,
    /// Mean off-diagonal correlation (unrounded)
    pub mean: f64,
    /// Mean over every cell of the rounded matrix, diagonal included.
    /// Comparable with figures computed from the exported table.
    pub mean_with_diagonal: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PsychometricsReport {
    /// Respondents in the analysed population
    pub population: usize,
    pub adequacy: Adequacy,
    pub factors: Vec<VariantFactors>,
    pub spearman: Vec<VariantCorrelation>,
    pub inter_item: InterItemCorrelation,
}

/// Cleaned respondents in the configured role and visit-frequency range
pub fn population<'a>(dataset: &'a Dataset, rules: &PopulationRules) -> Vec<&'a Respondent> {
    dataset
        .clean()
        .filter(|r| r.role.map_or(false, |role| rules.roles.contains(&role)))
        .filter(|r| r.visit_frequency.map_or(false, |f| f > rules.min_visit_frequency))
        .collect()
}

/// Labels of the factor items in canonical order
pub fn factor_labels() -> Vec<String> {
    ITEM_LABELS[..FACTOR_ITEMS].iter().map(|s| s.to_string()).collect()
}

/// Factor item labels in the order shown to arm B
pub fn presentation_order_b() -> Vec<&'static str> {
    ORDER_B.iter().map(|&k| ITEM_LABELS[k]).collect()
}

/// Item columns (`columns[k][r]`) over the first `items` grid items
pub fn item_columns(respondents: &[&Respondent], items: usize) -> Vec<Vec<Option<f64>>> {
    (0..items)
        .map(|k| {
            respondents
                .iter()
                .map(|r| r.items.get(k).copied().flatten())
                .collect()
        })
        .collect()
}

/// Pearson correlation matrix of complete-case rows
pub fn correlation_matrix(rows: &[Vec<f64>]) -> StatsResult<Matrix> {
    let p = rows.first().map(Vec::len).unwrap_or(0);
    let columns: Vec<Vec<f64>> = (0..p).map(|k| rows.iter().map(|r| r[k]).collect()).collect();
    let mut r = Matrix::identity(p);
    for i in 0..p {
        for j in i + 1..p {
            let value = pearson(&columns[i], &columns[j]);
            if !value.is_finite() {
                return Err(StatsError::ZeroVariance);
            }
            r[(i, j)] = value;
            r[(j, i)] = value;
        }
    }
    Ok(r)
}

fn complete_rows(respondents: &[&Respondent]) -> Vec<Vec<f64>> {
    respondents
        .iter()
        .filter_map(|r| r.complete_factor_items())
        .collect()
}

fn adequacy_tests(rows: &[Vec<f64>]) -> StatsResult<(Bartlett, Kmo)> {
    let n = rows.len();
    if n <= FACTOR_ITEMS {
        return Err(StatsError::TooFewObservations {
            needed: FACTOR_ITEMS + 1,
            got: n,
        });
    }
    let r = correlation_matrix(rows)?;
    Ok((bartlett_sphericity(&r, n)?, kmo(&r)?))
}

fn adequacy(respondents: &[&Respondent]) -> Adequacy {
    let rows = complete_rows(respondents);
    let n = rows.len();
    let outcome = adequacy_tests(&rows);
    match outcome {
        Ok((bartlett, kmo)) => Adequacy {
            n,
            bartlett: Some(bartlett),
            kmo: Some(kmo),
            skipped: None,
        },
        Err(e) => {
            warn!(reason = %e, "sampling adequacy skipped");
            Adequacy {
                n,
                bartlett: None,
                kmo: None,
                skipped: Some(e.to_string()),
            }
        }
    }
}

fn variant_factors(variant: Variant, members: &[&Respondent], num_factors: usize) -> VariantFactors {
    let rows = complete_rows(members);
    let n = rows.len();
    let outcome = if n <= FACTOR_ITEMS {
        Err(StatsError::TooFewObservations {
            needed: FACTOR_ITEMS + 1,
            got: n,
        })
    } else {
        correlation_matrix(&rows).and_then(|r| principal_varimax(&r, num_factors))
    };
    match outcome {
        Ok(solution) => {
            debug!(variant = %variant, n, "extracted factors");
            VariantFactors {
                variant,
                label: variant.label(),
                n,
                solution: Some(solution),
                skipped: None,
            }
        }
        Err(e) => {
            warn!(variant = %variant, reason = %e, "factor extraction skipped");
            VariantFactors {
                variant,
                label: variant.label(),
                n,
                solution: None,
                skipped: Some(e.to_string()),
            }
        }
    }
}

fn variant_spearman(variant: Variant, members: &[&Respondent]) -> VariantCorrelation {
    let matrix = ItemCorrelationMatrix::compute(
        &factor_labels(),
        &item_columns(members, FACTOR_ITEMS),
        CorrelationMethod::Spearman,
    );
    let presentation_order =
        (variant.arm == Arm::B).then(|| matrix.reordered(&presentation_order_b()));
    VariantCorrelation {
        variant,
        label: variant.label(),
        matrix,
        presentation_order,
    }
}

fn inter_item(respondents: &[&Respondent], min_items: usize) -> InterItemCorrelation {
    let kept: Vec<&Respondent> = respondents
        .iter()
        .copied()
        .filter(|r| r.non_null_items() >= min_items)
        .collect();
    let labels: Vec<String> = ITEM_LABELS.iter().map(|s| s.to_string()).collect();
    let matrix = ItemCorrelationMatrix::compute(
        &labels,
        &item_columns(&kept, ITEM_LABELS.len()),
        CorrelationMethod::Pearson,
    );
    let rounded = matrix.rounded(2);
    InterItemCorrelation {
        mean: matrix.mean_off_diagonal(),
        mean_with_diagonal: rounded.mean_all_cells(),
        matrix: rounded,
    }
}

/// Run every psychometric analysis on the configured population
pub fn analyze(dataset: &Dataset, settings: &Settings) -> PsychometricsReport {
    let population = population(dataset, &settings.population);
    debug!(respondents = population.len(), "psychometric population");

    let by_variant: Vec<(Variant, Vec<&Respondent>)> = Variant::ALL
        .iter()
        .map(|v| {
            let members = population.iter().copied().filter(|r| r.variant == *v).collect();
            (*v, members)
        })
        .collect();

    PsychometricsReport {
        population: population.len(),
        adequacy: adequacy(&population),
        factors: by_variant
            .iter()
            .map(|(v, members)| variant_factors(*v, members, settings.num_factors))
            .collect(),
        spearman: by_variant
            .iter()
            .map(|(v, members)| variant_spearman(*v, members))
            .collect(),
        inter_item: inter_item(&population, settings.population.min_items_for_iic),
    }
}
