use clap::{Parser, Subcommand, ValueEnum};
use std::process;

use ockham::bootstrap::{BootstrapConfig, bootstrap_coefficients};
use ockham::data::load_dataset;
use ockham::engine::{Criterion, ModelArtifact};
use ockham::formula::ModelSpec;
use ockham::search::{Direction, StepwiseConfig, select};
use ockham::split::{repeated_holdout_rmse, summarize};

#[derive(Parser)]
#[command(
    name = "ockham",
    about = "Fit linear models, select predictors stepwise, and quantify uncertainty",
    long_about = "A tool for ordinary-least-squares modelling on tabular data: greedy stepwise \
                  predictor selection under AIC/BIC, held-out RMSE evaluation over repeated \
                  train/test splits, and bootstrap confidence intervals for coefficients."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    Forward,
    Backward,
    Both,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Forward => Direction::Forward,
            DirectionArg::Backward => Direction::Backward,
            DirectionArg::Both => Direction::Both,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CriterionArg {
    Aic,
    Bic,
}

impl From<CriterionArg> for Criterion {
    fn from(arg: CriterionArg) -> Self {
        match arg {
            CriterionArg::Aic => Criterion::Aic,
            CriterionArg::Bic => Criterion::Bic,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StartArg {
    /// Start from the full declared predictor set.
    Full,
    /// Start from the intercept-only model.
    Empty,
}

#[derive(Subcommand)]
enum Commands {
    /// Run greedy stepwise selection and save the chosen model
    #[command(about = "Select predictors stepwise (outputs a TOML model artifact)")]
    Select {
        /// Path to a TSV (or .csv) file with named numeric columns
        data: String,

        /// Name of the response column
        #[arg(long)]
        response: String,

        /// Which moves the search may take
        #[arg(long, value_enum, default_value = "both")]
        direction: DirectionArg,

        /// Information criterion (lower is better)
        #[arg(long, value_enum, default_value = "aic")]
        criterion: CriterionArg,

        /// Starting specification
        #[arg(long, value_enum, default_value = "full")]
        start: StartArg,

        /// Optional cap on accepted steps
        #[arg(long)]
        max_steps: Option<usize>,

        /// Output path for the selected model
        #[arg(long, default_value = "model.toml")]
        output: String,
    },

    /// Estimate out-of-sample RMSE over repeated train/test splits
    #[command(about = "Evaluate held-out RMSE for a fixed predictor set")]
    Evaluate {
        /// Path to a TSV (or .csv) file with named numeric columns
        data: String,

        /// Name of the response column
        #[arg(long)]
        response: String,

        /// Comma-separated predictor columns (default: all non-response columns)
        #[arg(long, value_delimiter = ',')]
        predictors: Option<Vec<String>>,

        /// Fraction of rows used for training in each split
        #[arg(long, default_value = "0.7")]
        train_fraction: f64,

        /// Number of independent splits
        #[arg(long, default_value = "100")]
        repeats: usize,

        /// Base seed for the split sequence
        #[arg(long, default_value = "0")]
        seed: u64,
    },

    /// Bootstrap confidence intervals for coefficients
    #[command(about = "Bootstrap coefficient uncertainty for a fixed predictor set")]
    Bootstrap {
        /// Path to a TSV (or .csv) file with named numeric columns
        data: String,

        /// Name of the response column
        #[arg(long)]
        response: String,

        /// Comma-separated predictor columns (default: all non-response columns)
        #[arg(long, value_delimiter = ',')]
        predictors: Option<Vec<String>>,

        /// Number of bootstrap replicates
        #[arg(long, default_value = "1000")]
        replicates: usize,

        /// Two-sided interval coverage
        #[arg(long, default_value = "0.95")]
        confidence: f64,

        /// Base seed for the replicate sequence
        #[arg(long, default_value = "0")]
        seed: u64,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Select {
            data,
            response,
            direction,
            criterion,
            start,
            max_steps,
            output,
        } => select_command(
            &data, &response, direction, criterion, start, max_steps, &output,
        ),
        Commands::Evaluate {
            data,
            response,
            predictors,
            train_fraction,
            repeats,
            seed,
        } => evaluate_command(
            &data,
            &response,
            predictors.as_deref(),
            train_fraction,
            repeats,
            seed,
        ),
        Commands::Bootstrap {
            data,
            response,
            predictors,
            replicates,
            confidence,
            seed,
        } => bootstrap_command(
            &data,
            &response,
            predictors.as_deref(),
            replicates,
            confidence,
            seed,
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn select_command(
    data_path: &str,
    response: &str,
    direction: DirectionArg,
    criterion: CriterionArg,
    start: StartArg,
    max_steps: Option<usize>,
    output: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = load_dataset(data_path, response, None)?;
    println!(
        "Loaded {} rows with {} candidate predictors.",
        dataset.n_rows(),
        dataset.n_predictors()
    );

    let initial = match start {
        StartArg::Full => ModelSpec::full(&dataset),
        StartArg::Empty => ModelSpec::empty(),
    };
    let criterion: Criterion = criterion.into();
    let config = StepwiseConfig {
        direction: direction.into(),
        criterion,
        max_steps,
    };

    let result = select(&dataset, &initial, &config)?;
    println!(
        "Selected {} after {} steps ({} {:.4} -> {:.4}).",
        result.spec(),
        result.trace.len(),
        criterion.name(),
        result.initial_score,
        result.score
    );
    for record in &result.trace {
        println!(
            "  step {}: {}  ({} = {:.4})",
            record.step,
            record.applied,
            criterion.name(),
            record.score
        );
    }

    let artifact = ModelArtifact::from_fit(&result.model, criterion);
    artifact.save(output)?;
    println!("Model saved to: {}", output);
    Ok(())
}

fn evaluate_command(
    data_path: &str,
    response: &str,
    predictors: Option<&[String]>,
    train_fraction: f64,
    repeats: usize,
    seed: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = load_dataset(data_path, response, predictors)?;
    let spec = ModelSpec::full(&dataset);
    println!(
        "Evaluating {} over {} splits at train fraction {:.2}.",
        spec, repeats, train_fraction
    );

    let errors = repeated_holdout_rmse(&dataset, &spec, train_fraction, repeats, seed)?;
    let (mean, sd) = summarize(&errors);
    println!("Held-out RMSE: mean {:.6}, sd {:.6} over {} splits.", mean, sd, repeats);
    Ok(())
}

fn bootstrap_command(
    data_path: &str,
    response: &str,
    predictors: Option<&[String]>,
    replicates: usize,
    confidence: f64,
    seed: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = load_dataset(data_path, response, predictors)?;
    let spec = ModelSpec::full(&dataset);
    let config = BootstrapConfig {
        replicates,
        confidence_level: confidence,
        seed,
    };

    let summary = bootstrap_coefficients(&dataset, &spec, &config)?;
    println!(
        "Bootstrap over {} replicates ({} skipped as degenerate), {:.0}% intervals:",
        summary.replicates_used,
        summary.replicates_skipped,
        summary.confidence_level * 100.0
    );
    println!(
        "  {:<20} {:>12} {:>12} {:>12} {:>12}",
        "term", "estimate", "std.error", "lower", "upper"
    );
    let row = |name: &str, interval: &ockham::bootstrap::CoefficientInterval| {
        println!(
            "  {:<20} {:>12.6} {:>12.6} {:>12.6} {:>12.6}",
            name, interval.estimate, interval.std_error, interval.lower, interval.upper
        );
    };
    row("(intercept)", &summary.intercept);
    for (name, interval) in &summary.coefficients {
        row(name, interval);
    }
    Ok(())
}
