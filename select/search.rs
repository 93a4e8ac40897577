//! # Greedy Stepwise Model Selection
//!
//! A strictly-improving hill climb over predictor subsets: at every step the
//! selector fits each single-predictor add or drop permitted by the configured
//! [`Direction`], accepts the candidate whose [`Criterion`] score improves most
//! on the current model, and stops when no candidate strictly improves. The
//! result is locally optimal under single-predictor moves; global optimality
//! is not guaranteed and not claimed.
//!
//! Policy choices that stepwise routines usually hide are explicit here:
//!
//! - **Criterion and direction** are caller-supplied through
//!   [`StepwiseConfig`].
//! - **Tie-break**: exact score ties go to the earliest candidate in
//!   enumeration order, which is adds in the dataset's declared predictor
//!   order followed by drops in declared order. Runs are therefore
//!   reproducible given a fixed dataset column order.
//! - **Degeneracy**: a candidate whose design matrix is rank-deficient is
//!   skipped for that step, never fatal. Only a degenerate *initial*
//!   specification aborts the run, since there is no current score to fall
//!   back to.
//! - **Cycle guard**: a visited set over predictor-name sets refuses moves
//!   that would revisit a specification. Strict improvement already makes
//!   cycling all but impossible, but floating-point score ties are not
//!   assumed away.

use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::data::Dataset;
use crate::engine::{self, Criterion, FitError, FittedModel};
use crate::formula::ModelSpec;

/// Which single-predictor moves the search may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Add-only: grow the model from its starting point.
    Forward,
    /// Drop-only: shrink the model from its starting point.
    Backward,
    /// Either move type at every step.
    Both,
}

/// Caller-supplied selection policy.
#[derive(Debug, Clone, Copy)]
pub struct StepwiseConfig {
    pub direction: Direction,
    pub criterion: Criterion,
    /// Safety bound on accepted steps; `None` means unbounded. Strict
    /// improvement plus the visited set already guarantee termination, so
    /// this exists only as an operational cap.
    pub max_steps: Option<usize>,
}

impl Default for StepwiseConfig {
    fn default() -> Self {
        Self {
            direction: Direction::Both,
            criterion: Criterion::Aic,
            max_steps: None,
        }
    }
}

/// One atomic transition from the current specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Move {
    Add(String),
    Drop(String),
}

impl Move {
    fn apply(&self, spec: &ModelSpec) -> ModelSpec {
        match self {
            Move::Add(name) => spec.with_added(name),
            Move::Drop(name) => spec.with_dropped(name),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Move::Add(name) => write!(f, "+ {name}"),
            Move::Drop(name) => write!(f, "- {name}"),
        }
    }
}

/// One accepted step of the search, for tracing and logging.
#[derive(Debug, Clone)]
pub struct StepRecord {
    /// 1-based step number.
    pub step: usize,
    pub applied: Move,
    /// Criterion score after applying the move.
    pub score: f64,
    /// Candidates skipped this step because their fit was degenerate or their
    /// specification had already been visited.
    pub skipped: usize,
}

/// The outcome of a selection run: the final locally-optimal model, its
/// score, and the accepted path that led there.
#[derive(Debug)]
pub struct StepwiseResult {
    pub model: FittedModel,
    pub score: f64,
    pub initial_score: f64,
    pub trace: Vec<StepRecord>,
}

impl StepwiseResult {
    pub fn spec(&self) -> &ModelSpec {
        self.model.spec()
    }
}

#[derive(Error, Debug)]
pub enum SelectionError {
    #[error(
        "The initial specification references predictor '{0}', which the dataset does not declare."
    )]
    InvalidSpecification(String),
    /// A fit failed in a way the search cannot recover from: the initial
    /// specification was degenerate, or the linear algebra backend failed.
    /// Candidate-move degeneracy never reaches here; it is skipped in place.
    #[error("Model fitting failed: {0}")]
    Fit(#[from] FitError),
}

/// Runs greedy stepwise selection from `initial` under `config`.
///
/// Deterministic: given the same dataset (including column order) and initial
/// specification, repeated runs produce identical results.
pub fn select(
    dataset: &Dataset,
    initial: &ModelSpec,
    config: &StepwiseConfig,
) -> Result<StepwiseResult, SelectionError> {
    if let Some(name) = initial.unknown_name(dataset) {
        return Err(SelectionError::InvalidSpecification(name.to_string()));
    }

    let mut current_model = engine::fit(dataset, initial)?;
    let mut current_score = current_model.score(config.criterion);
    let initial_score = current_score;

    log::info!(
        "Stepwise selection ({:?}, {}): starting from {} with score {:.4}.",
        config.direction,
        config.criterion.name(),
        initial,
        current_score
    );

    let mut visited: HashSet<ModelSpec> = HashSet::new();
    visited.insert(initial.clone());

    let mut trace: Vec<StepRecord> = Vec::new();

    loop {
        if let Some(cap) = config.max_steps {
            if trace.len() >= cap {
                log::warn!("Stopping at the configured cap of {cap} steps.");
                break;
            }
        }

        let mut best: Option<(Move, FittedModel, f64)> = None;
        let mut skipped = 0usize;

        for candidate in enumerate_moves(dataset, current_model.spec(), config.direction) {
            let candidate_spec = candidate.apply(current_model.spec());
            if visited.contains(&candidate_spec) {
                skipped += 1;
                continue;
            }
            let candidate_model = match engine::fit(dataset, &candidate_spec) {
                Ok(model) => model,
                Err(FitError::DegenerateFit { .. }) => {
                    // A collinear candidate is unimprovable for this step, not
                    // a failure of the run.
                    log::debug!("Skipping degenerate candidate {candidate}.");
                    skipped += 1;
                    continue;
                }
                Err(other) => return Err(SelectionError::Fit(other)),
            };
            let candidate_score = candidate_model.score(config.criterion);
            // Strict `<` keeps the earliest candidate on an exact tie.
            let is_better = match &best {
                None => true,
                Some((_, _, best_score)) => candidate_score < *best_score,
            };
            if is_better {
                best = Some((candidate, candidate_model, candidate_score));
            }
        }

        match best {
            Some((applied, model, score)) if score < current_score => {
                let step = trace.len() + 1;
                log::info!(
                    "Step {step}: {applied}  ({} {:.4} -> {:.4})",
                    config.criterion.name(),
                    current_score,
                    score
                );
                visited.insert(model.spec().clone());
                current_model = model;
                current_score = score;
                trace.push(StepRecord {
                    step,
                    applied,
                    score,
                    skipped,
                });
            }
            _ => break,
        }
    }

    log::info!(
        "Selection finished after {} steps: {} with score {:.4}.",
        trace.len(),
        current_model.spec(),
        current_score
    );

    Ok(StepwiseResult {
        model: current_model,
        score: current_score,
        initial_score,
        trace,
    })
}

/// Enumerates permitted moves in deterministic order: adds in the dataset's
/// declared predictor order, then drops in declared order.
fn enumerate_moves(dataset: &Dataset, spec: &ModelSpec, direction: Direction) -> Vec<Move> {
    let mut moves = Vec::new();
    if matches!(direction, Direction::Forward | Direction::Both) {
        for name in dataset.predictor_names() {
            if !spec.contains(name) {
                moves.push(Move::Add(name.clone()));
            }
        }
    }
    if matches!(direction, Direction::Backward | Direction::Both) {
        for name in dataset.predictor_names() {
            if spec.contains(name) {
                moves.push(Move::Drop(name.clone()));
            }
        }
    }
    moves
}
