//! End-to-end properties of the greedy stepwise search on synthetic data.
//!
//! The central fixture builds a response whose error term is numerically
//! orthogonal to the junk predictors (and to the intercept and signal
//! columns). That makes the expected search path exact rather than
//! probabilistic: adding a junk predictor reduces the residual sum of squares
//! by nothing, so its AIC is worse by exactly the +2 penalty and the search
//! must refuse it.

use approx::assert_abs_diff_eq;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use ockham::data::Dataset;
use ockham::engine::{self, Criterion};
use ockham::formula::ModelSpec;
use ockham::search::{Direction, Move, StepwiseConfig, select};

const N: usize = 12;

fn column_a() -> Vec<f64> {
    (0..N).map(|i| i as f64).collect()
}

fn column_b() -> Vec<f64> {
    (0..N).map(|i| if (i / 3) % 2 == 0 { 0.0 } else { 1.0 }).collect()
}

fn column_c() -> Vec<f64> {
    (0..N).map(|i| (i as f64) * (i as f64) / 10.0).collect()
}

fn from_columns(columns: &[Vec<f64>]) -> Array2<f64> {
    Array2::from_shape_fn((N, columns.len()), |(i, j)| columns[j][i])
}

/// Projects an alternating seed vector onto the orthogonal complement of
/// span{1, a, b, c}, by fitting it as a response and taking the residual.
fn orthogonal_noise() -> Vec<f64> {
    let v: Vec<f64> = (0..N).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
    let helper = Dataset::new(
        "v",
        Array1::from_vec(v.clone()),
        vec!["a".to_string(), "b".to_string(), "c".to_string()],
        from_columns(&[column_a(), column_b(), column_c()]),
    )
    .unwrap();
    let fit = engine::fit(&helper, &ModelSpec::full(&helper)).unwrap();
    let projected = fit.predict(&helper).unwrap();
    v.iter().zip(projected.iter()).map(|(o, p)| o - p).collect()
}

/// y = 2a + 0.5·eps with eps orthogonal to {1, a, b, c}: a carries all the
/// signal, b and c are exactly useless.
fn signal_dataset() -> (Dataset, f64) {
    let eps = orthogonal_noise();
    let a = column_a();
    let y: Vec<f64> = a
        .iter()
        .zip(eps.iter())
        .map(|(ai, ei)| 2.0 * ai + 0.5 * ei)
        .collect();
    let rss_of_true_model: f64 = eps.iter().map(|e| 0.25 * e * e).sum();
    let dataset = Dataset::new(
        "y",
        Array1::from_vec(y),
        vec!["a".to_string(), "b".to_string(), "c".to_string()],
        from_columns(&[a, column_b(), column_c()]),
    )
    .unwrap();
    (dataset, rss_of_true_model)
}

fn forward_aic() -> StepwiseConfig {
    StepwiseConfig {
        direction: Direction::Forward,
        criterion: Criterion::Aic,
        max_steps: None,
    }
}

#[test]
fn forward_adds_the_signal_and_stops() {
    let (data, true_rss) = signal_dataset();
    let result = select(&data, &ModelSpec::empty(), &forward_aic()).unwrap();

    assert_eq!(result.trace.len(), 1);
    assert_eq!(result.trace[0].applied, Move::Add("a".to_string()));
    assert!(result.spec().contains("a"));
    assert!(!result.spec().contains("b"));
    assert!(!result.spec().contains("c"));

    // Hand-computed AIC of the final {a} model: n ln(RSS/n) + 2k with k = 2.
    let expected = (N as f64) * (true_rss / N as f64).ln() + 4.0;
    assert_abs_diff_eq!(result.score, expected, epsilon = 1e-6);
}

#[test]
fn backward_drops_exactly_the_junk() {
    let (data, _) = signal_dataset();
    let config = StepwiseConfig {
        direction: Direction::Backward,
        criterion: Criterion::Aic,
        max_steps: None,
    };
    let result = select(&data, &ModelSpec::full(&data), &config).unwrap();
    // b and c contribute nothing, so each drop gains the full +2 penalty back;
    // dropping a would surrender the entire signal.
    assert_eq!(result.trace.len(), 2);
    assert!(result.spec().contains("a"));
    assert_eq!(result.spec().len(), 1);
    for record in &result.trace {
        assert!(matches!(
            &record.applied,
            Move::Drop(name) if name == "b" || name == "c"
        ));
    }
}

#[test]
fn backward_keeps_a_fully_informative_model() {
    // y depends on every predictor with no noise at all.
    let a = column_a();
    let b = column_b();
    let c = column_c();
    let y: Vec<f64> = (0..N)
        .map(|i| 1.0 + 2.0 * a[i] - 3.0 * b[i] + 0.5 * c[i])
        .collect();
    let data = Dataset::new(
        "y",
        Array1::from_vec(y),
        vec!["a".to_string(), "b".to_string(), "c".to_string()],
        from_columns(&[a, b, c]),
    )
    .unwrap();

    let config = StepwiseConfig {
        direction: Direction::Backward,
        criterion: Criterion::Aic,
        max_steps: None,
    };
    let result = select(&data, &ModelSpec::full(&data), &config).unwrap();
    assert!(result.trace.is_empty());
    assert_eq!(result.spec(), &ModelSpec::full(&data));
}

#[test]
fn accepted_scores_improve_strictly_and_within_bound() {
    let (data, _) = signal_dataset();
    let result = select(&data, &ModelSpec::empty(), &forward_aic()).unwrap();

    // Forward from empty can accept at most one step per predictor.
    assert!(result.trace.len() <= data.n_predictors());

    let mut previous = result.initial_score;
    for record in &result.trace {
        assert!(
            record.score < previous,
            "step {} did not strictly improve: {} -> {}",
            record.step,
            previous,
            record.score
        );
        previous = record.score;
    }
    assert_abs_diff_eq!(result.score, previous, epsilon = 0.0);
}

#[test]
fn result_is_locally_optimal() {
    let (data, _) = signal_dataset();
    let result = select(&data, &ModelSpec::empty(), &forward_aic()).unwrap();

    // No single permitted move may strictly improve the final score.
    for name in data.predictor_names() {
        if result.spec().contains(name) {
            continue;
        }
        let candidate = result.spec().with_added(name);
        if let Ok(fit) = engine::fit(&data, &candidate) {
            assert!(fit.score(Criterion::Aic) >= result.score);
        }
    }
}

#[test]
fn selection_is_deterministic() {
    let (data, _) = signal_dataset();
    let config = StepwiseConfig {
        direction: Direction::Both,
        criterion: Criterion::Bic,
        max_steps: None,
    };
    let first = select(&data, &ModelSpec::full(&data), &config).unwrap();
    let second = select(&data, &ModelSpec::full(&data), &config).unwrap();

    assert_eq!(first.spec(), second.spec());
    assert_abs_diff_eq!(first.score, second.score, epsilon = 0.0);
    assert_eq!(first.trace.len(), second.trace.len());
    for (x, y) in first.trace.iter().zip(second.trace.iter()) {
        assert_eq!(x.applied, y.applied);
        assert_abs_diff_eq!(x.score, y.score, epsilon = 0.0);
    }
}

#[test]
fn duplicate_column_never_crashes_the_run() {
    // a_copy duplicates a bitwise; any model holding both is rank-deficient.
    let a = column_a();
    let y: Vec<f64> = a.iter().map(|v| 2.0 * v + 1.0).collect();
    let data = Dataset::new(
        "y",
        Array1::from_vec(y),
        vec!["a".to_string(), "a_copy".to_string(), "b".to_string()],
        from_columns(&[a.clone(), a, column_b()]),
    )
    .unwrap();

    let result = select(&data, &ModelSpec::empty(), &forward_aic()).unwrap();
    // The tie between a and a_copy breaks to the first declared name, and the
    // collinear follow-up move is skipped rather than fatal.
    assert!(result.spec().contains("a"));
    assert!(!result.spec().contains("a_copy"));
}

#[test]
fn noisy_signal_scenario_adds_the_signal_first() {
    // The classic scenario: Y = 2A + noise, B and C pure noise.
    let mut rng = StdRng::seed_from_u64(314);
    let normal = Normal::new(0.0, 1.0).unwrap();
    let n = 100;
    let a: Vec<f64> = (0..n).map(|i| i as f64 / 10.0).collect();
    let b: Vec<f64> = (0..n).map(|_| normal.sample(&mut rng)).collect();
    let c: Vec<f64> = (0..n).map(|_| normal.sample(&mut rng)).collect();
    let y: Vec<f64> = a
        .iter()
        .map(|ai| 2.0 * ai + 0.3 * normal.sample(&mut rng))
        .collect();

    let mut matrix = Array2::zeros((n, 3));
    for i in 0..n {
        matrix[[i, 0]] = a[i];
        matrix[[i, 1]] = b[i];
        matrix[[i, 2]] = c[i];
    }
    let data = Dataset::new(
        "y",
        Array1::from_vec(y),
        vec!["a".to_string(), "b".to_string(), "c".to_string()],
        matrix,
    )
    .unwrap();

    let result = select(&data, &ModelSpec::empty(), &forward_aic()).unwrap();
    assert_eq!(result.trace[0].applied, Move::Add("a".to_string()));
    assert!(result.spec().contains("a"));
}

#[test]
fn selected_model_generalizes_better_than_junk() {
    let (data, _) = signal_dataset();
    let selected = select(&data, &ModelSpec::empty(), &forward_aic()).unwrap();

    let good = ockham::split::repeated_holdout_rmse(&data, selected.spec(), 0.75, 20, 42).unwrap();
    let junk_spec = ModelSpec::from_names(["b", "c"]);
    let junk = ockham::split::repeated_holdout_rmse(&data, &junk_spec, 0.75, 20, 42).unwrap();

    let (good_mean, _) = ockham::split::summarize(&good);
    let (junk_mean, _) = ockham::split::summarize(&junk);
    assert!(good_mean < junk_mean);
}
