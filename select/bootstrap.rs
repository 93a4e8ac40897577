//! # Bootstrap Coefficient Uncertainty
//!
//! Resamples dataset rows with replacement, refits the same specification on
//! each replicate, and summarizes the spread of every coefficient as a
//! bootstrap standard error plus a percentile confidence interval.
//!
//! Replicates are independent, so they run in parallel; replicate `i` derives
//! its RNG seed from the base seed, keeping the summary deterministic. A
//! replicate whose resampled design matrix happens to be collinear (easy with
//! small data and few distinct values) is skipped and counted, mirroring how
//! the stepwise search treats degenerate candidates.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::data::Dataset;
use crate::engine::{self, FitError};
use crate::formula::ModelSpec;

/// Odd 64-bit increment (from splitmix64) used to derive per-replicate seeds.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone, Copy)]
pub struct BootstrapConfig {
    pub replicates: usize,
    /// Two-sided coverage of the percentile interval, e.g. 0.95.
    pub confidence_level: f64,
    pub seed: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            replicates: 1000,
            confidence_level: 0.95,
            seed: 0,
        }
    }
}

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Confidence level must be strictly between 0 and 1; got {0}.")]
    InvalidConfidenceLevel(f64),
    #[error("Replicate count must be at least 2; got {0}.")]
    TooFewReplicates(usize),
    #[error(
        "All {0} bootstrap replicates produced degenerate fits; the data cannot support this specification under resampling."
    )]
    AllReplicatesDegenerate(usize),
    #[error("Model fitting failed: {0}")]
    Fit(#[from] FitError),
}

/// Point estimate and bootstrap uncertainty for one coefficient.
#[derive(Debug, Clone)]
pub struct CoefficientInterval {
    /// Full-data estimate (not the bootstrap mean).
    pub estimate: f64,
    pub std_error: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug)]
pub struct BootstrapSummary {
    pub response: String,
    pub confidence_level: f64,
    pub replicates_used: usize,
    pub replicates_skipped: usize,
    pub intercept: CoefficientInterval,
    pub coefficients: BTreeMap<String, CoefficientInterval>,
}

/// Bootstraps the coefficients of `spec` fitted on `dataset`.
pub fn bootstrap_coefficients(
    dataset: &Dataset,
    spec: &ModelSpec,
    config: &BootstrapConfig,
) -> Result<BootstrapSummary, BootstrapError> {
    if !(config.confidence_level > 0.0 && config.confidence_level < 1.0) {
        return Err(BootstrapError::InvalidConfidenceLevel(
            config.confidence_level,
        ));
    }
    if config.replicates < 2 {
        return Err(BootstrapError::TooFewReplicates(config.replicates));
    }

    // The full-data fit provides the point estimates and validates the
    // specification up front.
    let full_fit = engine::fit(dataset, spec)?;
    let names: Vec<String> = full_fit.coefficients().keys().cloned().collect();
    let ordered: Vec<&str> = spec.ordered_names(dataset);
    debug_assert_eq!(names.len(), ordered.len());

    let n = dataset.n_rows();
    let draws: Vec<Option<Vec<f64>>> = (0..config.replicates)
        .into_par_iter()
        .map(|i| {
            let seed = config
                .seed
                .wrapping_add((i as u64).wrapping_mul(SEED_STRIDE));
            let mut rng = StdRng::seed_from_u64(seed);
            let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let resampled = dataset.subset(&rows);
            match engine::fit(&resampled, spec) {
                Ok(model) => {
                    let coefs = model.coefficients();
                    let mut row = Vec::with_capacity(1 + ordered.len());
                    row.push(model.intercept());
                    row.extend(ordered.iter().map(|name| coefs[*name]));
                    Ok(Some(row))
                }
                Err(FitError::DegenerateFit { .. }) => Ok(None),
                Err(other) => Err(BootstrapError::Fit(other)),
            }
        })
        .collect::<Result<_, _>>()?;

    let kept: Vec<&Vec<f64>> = draws.iter().flatten().collect();
    let skipped = config.replicates - kept.len();
    if kept.is_empty() {
        return Err(BootstrapError::AllReplicatesDegenerate(config.replicates));
    }
    if skipped > 0 {
        log::warn!(
            "Skipped {skipped} of {} bootstrap replicates with degenerate resampled fits.",
            config.replicates
        );
    }

    let alpha = 1.0 - config.confidence_level;
    let full_coefs = full_fit.coefficients();
    let interval = |index: usize, estimate: f64| {
        let mut values: Vec<f64> = kept.iter().map(|row| row[index]).collect();
        values.sort_by(|x, y| x.partial_cmp(y).expect("finite coefficients"));
        CoefficientInterval {
            estimate,
            std_error: std_error(&values),
            lower: quantile(&values, alpha / 2.0),
            upper: quantile(&values, 1.0 - alpha / 2.0),
        }
    };

    let intercept = interval(0, full_fit.intercept());
    let coefficients = ordered
        .iter()
        .enumerate()
        .map(|(j, name)| ((*name).to_string(), interval(1 + j, full_coefs[*name])))
        .collect();

    Ok(BootstrapSummary {
        response: full_fit.response_name().to_string(),
        confidence_level: config.confidence_level,
        replicates_used: kept.len(),
        replicates_skipped: skipped,
        intercept,
        coefficients,
    })
}

/// Linear-interpolation empirical quantile over a sorted slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let m = sorted.len();
    if m == 1 {
        return sorted[0];
    }
    let position = q * (m - 1) as f64;
    let low = position.floor() as usize;
    let high = position.ceil() as usize;
    let weight = position - low as f64;
    sorted[low] * (1.0 - weight) + sorted[high] * weight
}

/// Sample standard deviation.
fn std_error(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
    var.sqrt()
}
