//! # Ordinary Least Squares Fitting and Criterion Scoring
//!
//! One fit = one `ModelSpec` evaluated against one `Dataset`. The design
//! matrix is an intercept column followed by the included predictors in the
//! dataset's declared order. Coefficients are solved through the normal
//! equations via a symmetric eigendecomposition of the Gram matrix, which
//! doubles as the rank check: an eigenvalue collapsing relative to the largest
//! means the candidate's columns are linearly dependent, and the fit is
//! reported as [`FitError::DegenerateFit`] rather than returning garbage
//! coefficients.
//!
//! Model quality is scored by an information criterion ([`Criterion`]); lower
//! is better everywhere in this crate.

use ndarray::{Array1, Array2};
use ndarray_linalg::{Eigh, UPLO};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::data::Dataset;
use crate::formula::ModelSpec;

/// Relative eigenvalue cutoff below which the Gram matrix is treated as
/// rank-deficient. Gram eigenvalues are squared singular values of the design
/// matrix, so this admits condition numbers up to about 1e5.
const RANK_TOLERANCE: f64 = 1e-10;

/// Floor applied to the residual sum of squares before taking its logarithm,
/// so an exactly interpolating fit scores as "extremely good" instead of
/// producing a non-finite criterion that would poison score comparisons.
const RSS_FLOOR: f64 = 1e-12;

/// The information criterion used to score a fitted model. Lower is better
/// under both variants; this sign convention is fixed crate-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criterion {
    /// Akaike: `n·ln(RSS/n) + 2k`. The Gaussian additive constant is omitted
    /// since it cancels in every comparison the search makes.
    Aic,
    /// Bayesian/Schwarz: `n·ln(RSS/n) + k·ln(n)`. Penalizes model size more
    /// heavily than AIC for n ≥ 8.
    Bic,
}

impl Criterion {
    /// Scores a fit from its summary statistics. `k` counts all estimated
    /// coefficients including the intercept.
    pub fn score(&self, n: usize, k: usize, rss: f64) -> f64 {
        let n_f = n as f64;
        let goodness = n_f * (rss.max(RSS_FLOOR) / n_f).ln();
        let penalty = match self {
            Criterion::Aic => 2.0 * k as f64,
            Criterion::Bic => (k as f64) * n_f.ln(),
        };
        goodness + penalty
    }

    pub fn name(&self) -> &'static str {
        match self {
            Criterion::Aic => "AIC",
            Criterion::Bic => "BIC",
        }
    }
}

/// Errors from fitting a single candidate model.
#[derive(Error, Debug)]
pub enum FitError {
    #[error("The specification references predictor '{0}', which the dataset does not declare.")]
    UnknownPredictor(String),
    #[error(
        "The design matrix for {spec} is rank-deficient (relative eigenvalue {relative_eigenvalue:.3e}); its columns are collinear and no unique least-squares solution exists."
    )]
    DegenerateFit {
        spec: String,
        relative_eigenvalue: f64,
    },
    #[error("Eigendecomposition of the Gram matrix failed: {0}")]
    Eigendecomposition(#[from] ndarray_linalg::error::LinalgError),
}

/// A fitted ordinary-least-squares model: coefficients, fit summary, and the
/// specification it was fitted under.
#[derive(Debug, Clone)]
pub struct FittedModel {
    spec: ModelSpec,
    response_name: String,
    /// Predictor names in design-matrix order (excluding the intercept).
    predictor_order: Vec<String>,
    /// Intercept first, then one slope per `predictor_order` entry.
    beta: Array1<f64>,
    n: usize,
    rss: f64,
    log_likelihood: f64,
}

/// Fits `spec` on `dataset` by ordinary least squares.
pub fn fit(dataset: &Dataset, spec: &ModelSpec) -> Result<FittedModel, FitError> {
    if let Some(name) = spec.unknown_name(dataset) {
        return Err(FitError::UnknownPredictor(name.to_string()));
    }

    let ordered = spec.ordered_names(dataset);
    let x = design_matrix(dataset, &ordered);
    let y = dataset.response().to_owned();
    let n = x.nrows();
    let k = x.ncols();

    let xtx = x.t().dot(&x);
    let xty = x.t().dot(&y);

    // Eigenvalues come back in ascending order; the smallest relative to the
    // largest is the numerical rank signal.
    let (eigenvalues, eigenvectors) = xtx.eigh(UPLO::Lower)?;
    let largest = eigenvalues[k - 1];
    let relative = if largest > 0.0 {
        eigenvalues[0] / largest
    } else {
        0.0
    };
    if largest <= 0.0 || relative < RANK_TOLERANCE {
        return Err(FitError::DegenerateFit {
            spec: spec.to_string(),
            relative_eigenvalue: relative,
        });
    }

    // beta = V diag(1/w) V^T X^T y
    let rotated = eigenvectors.t().dot(&xty);
    let scaled = &rotated / &eigenvalues;
    let beta = eigenvectors.dot(&scaled);

    let residuals = &y - &x.dot(&beta);
    let rss = residuals.dot(&residuals);
    let n_f = n as f64;
    let log_likelihood =
        -0.5 * n_f * ((2.0 * std::f64::consts::PI).ln() + (rss.max(RSS_FLOOR) / n_f).ln() + 1.0);

    Ok(FittedModel {
        spec: spec.clone(),
        response_name: dataset.response_name().to_string(),
        predictor_order: ordered.into_iter().map(String::from).collect(),
        beta,
        n,
        rss,
        log_likelihood,
    })
}

/// Assembles a design matrix: a leading intercept column of ones, then the
/// named predictors in the given order. The order is fixed at fit time and
/// reused verbatim for prediction, so coefficients always line up even when a
/// prediction dataset declares its columns differently.
fn design_matrix(dataset: &Dataset, names: &[&str]) -> Array2<f64> {
    let n = dataset.n_rows();
    let mut x = Array2::zeros((n, 1 + names.len()));
    x.column_mut(0).fill(1.0);
    for (j, name) in names.iter().enumerate() {
        let column = dataset
            .predictor_column(name)
            .expect("names validated against dataset");
        x.column_mut(1 + j).assign(&column);
    }
    x
}

impl FittedModel {
    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn response_name(&self) -> &str {
        &self.response_name
    }

    pub fn intercept(&self) -> f64 {
        self.beta[0]
    }

    /// Slope coefficients keyed by predictor name (intercept excluded; see
    /// [`FittedModel::intercept`]).
    pub fn coefficients(&self) -> BTreeMap<String, f64> {
        self.predictor_order
            .iter()
            .cloned()
            .zip(self.beta.iter().skip(1).copied())
            .collect()
    }

    /// Number of observations the model was fitted on.
    pub fn n_observations(&self) -> usize {
        self.n
    }

    /// Number of estimated coefficients, intercept included.
    pub fn n_coefficients(&self) -> usize {
        self.beta.len()
    }

    pub fn residual_sum_of_squares(&self) -> f64 {
        self.rss
    }

    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    /// The model's score under `criterion`; lower is better.
    pub fn score(&self, criterion: Criterion) -> f64 {
        criterion.score(self.n, self.beta.len(), self.rss)
    }

    /// Predicts the response for every row of `dataset`, which must declare
    /// all predictors this model uses (it may declare more).
    pub fn predict(&self, dataset: &Dataset) -> Result<Array1<f64>, FitError> {
        for name in &self.predictor_order {
            if dataset.predictor_index(name).is_none() {
                return Err(FitError::UnknownPredictor(name.clone()));
            }
        }
        let names: Vec<&str> = self.predictor_order.iter().map(String::as_str).collect();
        let x = design_matrix(dataset, &names);
        Ok(x.dot(&self.beta))
    }
}

/// Errors from saving or loading a model artifact.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Failed to read or write model file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML model file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize model to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
}

/// The saved, human-readable form of a fitted model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub response: String,
    /// Predictor names in design-matrix order.
    pub predictors: Vec<String>,
    pub intercept: f64,
    pub coefficients: BTreeMap<String, f64>,
    pub criterion: String,
    pub score: f64,
    pub n_observations: usize,
}

impl ModelArtifact {
    pub fn from_fit(model: &FittedModel, criterion: Criterion) -> Self {
        Self {
            response: model.response_name().to_string(),
            predictors: model.predictor_order.clone(),
            intercept: model.intercept(),
            coefficients: model.coefficients(),
            criterion: criterion.name().to_string(),
            score: model.score(criterion),
            n_observations: model.n_observations(),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ArtifactError> {
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn line_dataset() -> Dataset {
        // y = 1 + 2a exactly, b is an unrelated column.
        Dataset::new(
            "y",
            array![3.0, 5.0, 7.0, 9.0],
            vec!["a".to_string(), "b".to_string()],
            array![[1.0, 4.0], [2.0, 1.0], [3.0, 3.0], [4.0, 2.0]],
        )
        .unwrap()
    }

    #[test]
    fn exact_line_recovers_coefficients() {
        let data = line_dataset();
        let model = fit(&data, &ModelSpec::from_names(["a"])).unwrap();
        assert_abs_diff_eq!(model.intercept(), 1.0, epsilon = 1e-8);
        assert_abs_diff_eq!(model.coefficients()["a"], 2.0, epsilon = 1e-8);
        assert!(model.residual_sum_of_squares() < 1e-10);
    }

    #[test]
    fn intercept_only_fits_the_mean() {
        let data = line_dataset();
        let model = fit(&data, &ModelSpec::empty()).unwrap();
        assert_abs_diff_eq!(model.intercept(), 6.0, epsilon = 1e-10);
        // RSS around the mean of [3,5,7,9] is 20.
        assert_abs_diff_eq!(model.residual_sum_of_squares(), 20.0, epsilon = 1e-8);
    }

    #[test]
    fn aic_matches_hand_computation() {
        let data = line_dataset();
        let model = fit(&data, &ModelSpec::empty()).unwrap();
        // n = 4, k = 1, RSS = 20: AIC = 4 ln(5) + 2.
        let expected = 4.0 * 5.0_f64.ln() + 2.0;
        assert_abs_diff_eq!(model.score(Criterion::Aic), expected, epsilon = 1e-8);
        // BIC swaps the penalty for k ln(n) = ln(4).
        let expected_bic = 4.0 * 5.0_f64.ln() + 4.0_f64.ln();
        assert_abs_diff_eq!(model.score(Criterion::Bic), expected_bic, epsilon = 1e-8);
    }

    #[test]
    fn duplicate_column_is_degenerate() {
        let data = Dataset::new(
            "y",
            array![1.0, 2.0, 3.0, 4.0],
            vec!["a".to_string(), "a_copy".to_string()],
            array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]],
        )
        .unwrap();
        let err = fit(&data, &ModelSpec::from_names(["a", "a_copy"])).unwrap_err();
        assert!(matches!(err, FitError::DegenerateFit { .. }));
        // Either column alone is fine.
        assert!(fit(&data, &ModelSpec::from_names(["a_copy"])).is_ok());
    }

    #[test]
    fn underdetermined_fit_is_degenerate() {
        let data = Dataset::new(
            "y",
            array![1.0, 2.0],
            vec!["a".to_string(), "b".to_string()],
            array![[1.0, 4.0], [2.0, 1.0]],
        )
        .unwrap();
        // n = 2 rows cannot identify 3 coefficients.
        let err = fit(&data, &ModelSpec::from_names(["a", "b"])).unwrap_err();
        assert!(matches!(err, FitError::DegenerateFit { .. }));
    }

    #[test]
    fn unknown_predictor_rejected() {
        let data = line_dataset();
        let err = fit(&data, &ModelSpec::from_names(["zz"])).unwrap_err();
        match err {
            FitError::UnknownPredictor(name) => assert_eq!(name, "zz"),
            other => panic!("Expected UnknownPredictor, got {:?}", other),
        }
    }

    #[test]
    fn predict_on_new_rows() {
        let data = line_dataset();
        let model = fit(&data, &ModelSpec::from_names(["a"])).unwrap();
        let test = Dataset::new(
            "y",
            array![0.0, 0.0],
            vec!["a".to_string(), "b".to_string()],
            array![[10.0, 0.0], [-1.0, 0.0]],
        )
        .unwrap();
        let predictions = model.predict(&test).unwrap();
        assert_abs_diff_eq!(predictions[0], 21.0, epsilon = 1e-8);
        assert_abs_diff_eq!(predictions[1], -1.0, epsilon = 1e-8);
    }

    #[test]
    fn predict_is_insensitive_to_column_declaration_order() {
        let data = line_dataset();
        let model = fit(&data, &ModelSpec::from_names(["a", "b"])).unwrap();
        // Same rows, but the prediction dataset declares b before a.
        let reordered = Dataset::new(
            "y",
            array![0.0, 0.0],
            vec!["b".to_string(), "a".to_string()],
            array![[4.0, 1.0], [1.0, 2.0]],
        )
        .unwrap();
        let predictions = model.predict(&reordered).unwrap();
        let original = model.predict(&data).unwrap();
        assert_abs_diff_eq!(predictions[0], original[0], epsilon = 1e-10);
        assert_abs_diff_eq!(predictions[1], original[1], epsilon = 1e-10);
    }

    #[test]
    fn artifact_round_trip() {
        let data = line_dataset();
        let model = fit(&data, &ModelSpec::from_names(["a"])).unwrap();
        let artifact = ModelArtifact::from_fit(&model, Criterion::Aic);
        let file = tempfile::NamedTempFile::new().unwrap();
        artifact.save(file.path()).unwrap();
        let loaded = ModelArtifact::load(file.path()).unwrap();
        assert_eq!(loaded.response, "y");
        assert_eq!(loaded.predictors, vec!["a".to_string()]);
        assert_abs_diff_eq!(loaded.coefficients["a"], 2.0, epsilon = 1e-8);
        assert_eq!(loaded.criterion, "AIC");
    }
}
