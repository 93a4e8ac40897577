//! Model specifications: which predictors a candidate model includes.
//!
//! A `ModelSpec` is immutable; every add or drop produces a fresh value. The
//! backing `BTreeSet` gives deterministic iteration order and cheap equality,
//! which the stepwise search relies on for its visited-set cycle guard.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::data::Dataset;

/// The set of predictor names included in one candidate model. The intercept
/// is implicit: every model carries one, and it is never a member of the set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelSpec {
    included: BTreeSet<String>,
}

impl ModelSpec {
    /// The intercept-only model.
    pub fn empty() -> Self {
        Self {
            included: BTreeSet::new(),
        }
    }

    /// A model containing every predictor the dataset declares.
    pub fn full(dataset: &Dataset) -> Self {
        Self {
            included: dataset.predictor_names().iter().cloned().collect(),
        }
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            included: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.included.contains(name)
    }

    pub fn len(&self) -> usize {
        self.included.len()
    }

    pub fn is_empty(&self) -> bool {
        self.included.is_empty()
    }

    /// Included predictor names in sorted order. For the dataset's declared
    /// order, see [`ModelSpec::ordered_names`].
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.included.iter().map(String::as_str)
    }

    /// Included predictor names in the dataset's declared order. The design
    /// matrix is always assembled in this order, so coefficients line up with
    /// the data no matter how the specification was built.
    pub fn ordered_names<'a>(&'a self, dataset: &'a Dataset) -> Vec<&'a str> {
        dataset
            .predictor_names()
            .iter()
            .map(String::as_str)
            .filter(|name| self.included.contains(*name))
            .collect()
    }

    /// Returns the first included name absent from the dataset, if any.
    pub fn unknown_name(&self, dataset: &Dataset) -> Option<&str> {
        self.included
            .iter()
            .map(String::as_str)
            .find(|name| dataset.predictor_index(name).is_none())
    }

    pub fn with_added(&self, name: &str) -> Self {
        let mut included = self.included.clone();
        included.insert(name.to_string());
        Self { included }
    }

    pub fn with_dropped(&self, name: &str) -> Self {
        let mut included = self.included.clone();
        included.remove(name);
        Self { included }
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.included.is_empty() {
            return write!(f, "{{intercept only}}");
        }
        let names: Vec<&str> = self.included.iter().map(String::as_str).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}
