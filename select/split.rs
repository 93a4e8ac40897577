//! # Train/Test Splitting and Out-of-Sample Error
//!
//! A split is a uniform random partition of row indices without replacement,
//! sized by the caller's train fraction. Randomness is injected through an
//! explicit seed so evaluations are reproducible; nothing here touches ambient
//! process-wide RNG state.
//!
//! Repeated evaluation across many splits averages out the Monte Carlo
//! variability of a single split. The splits are independent, so the batch is
//! parallelized with rayon; each split derives its own seed from the base
//! seed, which keeps the results identical regardless of scheduling.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use thiserror::Error;

use crate::data::Dataset;
use crate::engine::{self, FitError, FittedModel};
use crate::formula::ModelSpec;

/// Odd 64-bit increment (from splitmix64) used to derive per-split seeds.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error(
        "Train fraction must be strictly between 0 and 1 and leave at least one row on each side; got {fraction} over {n_rows} rows."
    )]
    InvalidTrainFraction { fraction: f64, n_rows: usize },
    #[error("Model fitting failed during evaluation: {0}")]
    Fit(#[from] FitError),
}

/// Partitions `dataset` into `(train, test)` uniformly at random without
/// replacement. Row order within each side follows the original dataset.
/// Deterministic given a seed; uniform-random otherwise.
pub fn split_dataset(
    dataset: &Dataset,
    train_fraction: f64,
    seed: Option<u64>,
) -> Result<(Dataset, Dataset), EvalError> {
    let n = dataset.n_rows();
    let invalid = |fraction| EvalError::InvalidTrainFraction {
        fraction,
        n_rows: n,
    };
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(invalid(train_fraction));
    }
    let n_train = (n as f64 * train_fraction).round() as usize;
    if n_train == 0 || n_train == n {
        return Err(invalid(train_fraction));
    }

    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);

    let (train_rows, test_rows) = indices.split_at_mut(n_train);
    train_rows.sort_unstable();
    test_rows.sort_unstable();

    Ok((dataset.subset(train_rows), dataset.subset(test_rows)))
}

/// Root-mean-squared prediction error of `model` over `test`.
pub fn rmse(model: &FittedModel, test: &Dataset) -> Result<f64, FitError> {
    let predictions = model.predict(test)?;
    let observed = test.response();
    let n = observed.len() as f64;
    let sse: f64 = predictions
        .iter()
        .zip(observed.iter())
        .map(|(p, o)| (p - o) * (p - o))
        .sum();
    Ok((sse / n).sqrt())
}

/// Splits, fits `spec` on the training side, and scores held-out RMSE.
pub fn holdout_rmse(
    dataset: &Dataset,
    spec: &ModelSpec,
    train_fraction: f64,
    seed: Option<u64>,
) -> Result<f64, EvalError> {
    let (train, test) = split_dataset(dataset, train_fraction, seed)?;
    let model = engine::fit(&train, spec)?;
    Ok(rmse(&model, &test)?)
}

/// Held-out RMSE over `repeats` independent splits, in parallel. Split `i`
/// uses seed `base_seed + i·stride`, so the returned vector is deterministic
/// given `base_seed` and indexed by split number.
pub fn repeated_holdout_rmse(
    dataset: &Dataset,
    spec: &ModelSpec,
    train_fraction: f64,
    repeats: usize,
    base_seed: u64,
) -> Result<Vec<f64>, EvalError> {
    (0..repeats)
        .into_par_iter()
        .map(|i| {
            let seed = base_seed.wrapping_add((i as u64).wrapping_mul(SEED_STRIDE));
            holdout_rmse(dataset, spec, train_fraction, Some(seed))
        })
        .collect()
}

/// Mean and sample standard deviation of a set of RMSE draws.
pub fn summarize(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}
