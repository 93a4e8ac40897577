//! Linear model fitting and greedy stepwise predictor selection.
//!
//! The crate is organized around four concerns:
//!
//! 1. **[`data`]**: loading and validating tabular data into a [`data::Dataset`].
//!    Rows with a missing response are excluded at load time; everything the
//!    fitting core sees is complete and finite.
//! 2. **[`engine`]**: ordinary-least-squares fitting of one candidate model,
//!    producing named coefficients and an information-criterion score.
//! 3. **[`search`]**: greedy stepwise selection over predictor subsets, adding
//!    or dropping one predictor per step until no single move improves the
//!    criterion. This is a local search: it guarantees local optimality under
//!    single-predictor moves, not a global optimum.
//! 4. **[`split`] / [`bootstrap`]**: out-of-sample evaluation via seeded
//!    train/test splitting, and coefficient uncertainty via resampling.
//!
//! All randomness is injected through explicit seeds; the selector itself is
//! fully deterministic given a dataset and its declared predictor order.

pub mod bootstrap;
pub mod data;
pub mod engine;
pub mod formula;
pub mod search;
pub mod split;
