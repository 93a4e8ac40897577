//! # Data Loading and Validation
//!
//! This module is the exclusive entry point for user-provided data. It reads
//! tabular files (TSV or CSV), validates them against the caller's declared
//! schema, and transforms them into the clean `ndarray` structures required by
//! the fitting core.
//!
//! - Missing responses are a data reality, not an error: rows whose response
//!   value is null are dropped here, so every downstream fit sees a complete
//!   response vector.
//! - Missing or non-numeric *predictor* values on retained rows are user-input
//!   errors. The `DataError` enum is designed to give actionable feedback.
//! - The order of predictor columns in the file (or in the caller's explicit
//!   list) becomes the dataset's declared predictor order, which the stepwise
//!   search uses for deterministic tie-breaking.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// A comprehensive error type for all data loading and validation failures.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The column '{column_name}' could not be converted to the expected type '{expected_type}'. It contains non-numeric data. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error(
        "Missing or null values were found in predictor column '{0}' on rows with an observed response. Predictor data must be complete for every fitted row."
    )]
    MissingValuesFound(String),
    #[error(
        "Non-finite values (NaN or Infinity) were found in column '{0}'. All fitted data must be finite."
    )]
    NonFiniteValuesFound(String),
    #[error("No usable rows remain after excluding rows with a missing response.")]
    EmptyDataset,
    #[error("Predictor column '{0}' is listed more than once.")]
    DuplicatePredictor(String),
    #[error("The response column '{0}' cannot also be used as a predictor.")]
    ResponseAmongPredictors(String),
    #[error(
        "Predictor matrix has {matrix_rows} rows and {matrix_cols} columns, but the response has {response_rows} rows and {names} predictor names were given."
    )]
    ShapeMismatch {
        matrix_rows: usize,
        matrix_cols: usize,
        response_rows: usize,
        names: usize,
    },
}

/// A validated, in-memory tabular dataset ready for model fitting.
///
/// Invariants (enforced on construction):
/// - at least one row; every value finite; no missing values,
/// - predictor names unique and distinct from the response name,
/// - `predictors` has one column per name, in declared order.
#[derive(Debug, Clone)]
pub struct Dataset {
    response_name: String,
    predictor_names: Vec<String>,
    y: Array1<f64>,
    predictors: Array2<f64>,
}

impl Dataset {
    /// Builds a dataset from in-memory arrays, validating all invariants.
    pub fn new(
        response_name: impl Into<String>,
        y: Array1<f64>,
        predictor_names: Vec<String>,
        predictors: Array2<f64>,
    ) -> Result<Self, DataError> {
        let response_name = response_name.into();
        if y.is_empty() {
            return Err(DataError::EmptyDataset);
        }
        if predictors.nrows() != y.len() || predictors.ncols() != predictor_names.len() {
            return Err(DataError::ShapeMismatch {
                matrix_rows: predictors.nrows(),
                matrix_cols: predictors.ncols(),
                response_rows: y.len(),
                names: predictor_names.len(),
            });
        }
        for (i, name) in predictor_names.iter().enumerate() {
            if *name == response_name {
                return Err(DataError::ResponseAmongPredictors(name.clone()));
            }
            if predictor_names[..i].contains(name) {
                return Err(DataError::DuplicatePredictor(name.clone()));
            }
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(DataError::NonFiniteValuesFound(response_name));
        }
        for (j, name) in predictor_names.iter().enumerate() {
            if predictors.column(j).iter().any(|v| !v.is_finite()) {
                return Err(DataError::NonFiniteValuesFound(name.clone()));
            }
        }
        Ok(Self {
            response_name,
            predictor_names,
            y,
            predictors,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.y.len()
    }

    pub fn n_predictors(&self) -> usize {
        self.predictor_names.len()
    }

    pub fn response_name(&self) -> &str {
        &self.response_name
    }

    /// Predictor names in declared order. This order is the deterministic
    /// tie-break order used by the stepwise search.
    pub fn predictor_names(&self) -> &[String] {
        &self.predictor_names
    }

    pub fn response(&self) -> ArrayView1<'_, f64> {
        self.y.view()
    }

    pub fn predictors(&self) -> ArrayView2<'_, f64> {
        self.predictors.view()
    }

    pub fn predictor_index(&self, name: &str) -> Option<usize> {
        self.predictor_names.iter().position(|n| n == name)
    }

    pub fn predictor_column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.predictor_index(name).map(|j| self.predictors.column(j))
    }

    /// Returns a new dataset containing the given rows, in the given order.
    /// Duplicate indices are allowed (used by bootstrap resampling).
    ///
    /// # Panics
    /// Panics if any index is out of bounds.
    pub fn subset(&self, rows: &[usize]) -> Dataset {
        Dataset {
            response_name: self.response_name.clone(),
            predictor_names: self.predictor_names.clone(),
            y: self.y.select(Axis(0), rows),
            predictors: self.predictors.select(Axis(0), rows),
        }
    }
}

/// Loads a dataset from a delimited text file.
///
/// The separator is inferred from the extension: `.csv` is comma-separated,
/// anything else is read as tab-separated. `predictors` selects and orders the
/// predictor columns; when `None`, every column other than the response is
/// used, in file order.
///
/// Rows whose response is null are dropped (with a log line reporting how
/// many). A null value in a *predictor* column on a retained row is an error.
pub fn load_dataset(
    path: &str,
    response: &str,
    predictors: Option<&[String]>,
) -> Result<Dataset, DataError> {
    let separator = if path.ends_with(".csv") { b',' } else { b'\t' };

    let df = CsvReader::new(File::open(Path::new(path))?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_parse_options(CsvParseOptions::default().with_separator(separator)),
        )
        .finish()?;

    log::info!(
        "Loaded '{path}': {} rows, {} columns.",
        df.height(),
        df.width()
    );

    let columns: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    if !columns.iter().any(|c| c == response) {
        return Err(DataError::ColumnNotFound(response.to_string()));
    }

    let predictor_names: Vec<String> = match predictors {
        Some(names) => {
            for name in names {
                if !columns.iter().any(|c| c == name) {
                    return Err(DataError::ColumnNotFound(name.clone()));
                }
            }
            names.to_vec()
        }
        None => columns.iter().filter(|c| *c != response).cloned().collect(),
    };

    // The response keeps its nulls through extraction; the null positions
    // define which rows are dropped.
    let response_values = internal::extract_numeric_column(&df, response)?;
    let keep: Vec<usize> = response_values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|_| i))
        .collect();

    let dropped = response_values.len() - keep.len();
    if dropped > 0 {
        log::info!("Excluded {dropped} rows with a missing '{response}' value.");
    }
    if keep.is_empty() {
        return Err(DataError::EmptyDataset);
    }

    let y: Array1<f64> = keep
        .iter()
        .map(|&i| response_values[i].expect("kept rows have a response"))
        .collect();

    let n = keep.len();
    let p = predictor_names.len();
    let mut matrix = Array2::zeros((n, p));
    for (j, name) in predictor_names.iter().enumerate() {
        let values = internal::extract_numeric_column(&df, name)?;
        for (row, &i) in keep.iter().enumerate() {
            match values[i] {
                Some(v) => matrix[[row, j]] = v,
                None => return Err(DataError::MissingValuesFound(name.clone())),
            }
        }
    }

    Dataset::new(response, y, predictor_names, matrix)
}

/// Internal module for shared column extraction logic.
mod internal {
    use super::*;

    /// Extracts a column as `f64` values, passing genuine nulls through as
    /// `None` for the caller to judge. A null is only an error on a row the
    /// caller decides to keep, so that decision cannot live here.
    pub(super) fn extract_numeric_column(
        df: &DataFrame,
        column_name: &str,
    ) -> Result<Vec<Option<f64>>, DataError> {
        let series = df.column(column_name)?;
        let nulls_before = series.null_count();

        let casted = match series.cast(&DataType::Float64) {
            Ok(casted) => casted,
            Err(_) => {
                return Err(DataError::ColumnWrongType {
                    column_name: column_name.to_string(),
                    expected_type: "f64 (numeric)",
                    found_type: format!("{:?}", series.dtype()),
                });
            }
        };

        // A cast that manufactures new nulls means the column held
        // non-numeric text, not genuinely missing data.
        if casted.null_count() > nulls_before {
            return Err(DataError::ColumnWrongType {
                column_name: column_name.to_string(),
                expected_type: "f64 (numeric)",
                found_type: format!("{:?}", series.dtype()),
            });
        }

        let chunked = casted.f64()?.rechunk();
        let values: Vec<Option<f64>> = (&chunked).into_iter().collect();
        for value in values.iter().flatten() {
            if !value.is_finite() {
                return Err(DataError::NonFiniteValuesFound(column_name.to_string()));
            }
        }
        Ok(values)
    }
}
