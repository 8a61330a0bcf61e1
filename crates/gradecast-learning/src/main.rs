//! CLI entry point for training and grade prediction.

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use gradecast_learning::{
    EntityQuery, TablePrediction, TargetSummary, Trainer, TrainingConfig, TrainingResult,
};
use gradecast_processing::{
    NumericImputation, OutlierStrategy, PreprocessConfig, Preprocessor, TableOverview,
    frame_from_json,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// CLI-compatible numeric imputation strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliNumericImputation {
    /// Use the mean of non-null values
    Mean,
    /// Use the median of non-null values
    Median,
}

impl From<CliNumericImputation> for NumericImputation {
    fn from(cli: CliNumericImputation) -> Self {
        match cli {
            CliNumericImputation::Mean => NumericImputation::Mean,
            CliNumericImputation::Median => NumericImputation::Median,
        }
    }
}

/// CLI-compatible outlier strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOutlierStrategy {
    /// Replace values outside the IQR fence with the column mean
    Iqr,
    /// Replace values beyond the z-score threshold with the column mean
    Zscore,
}

impl From<CliOutlierStrategy> for OutlierStrategy {
    fn from(cli: CliOutlierStrategy) -> Self {
        match cli {
            CliOutlierStrategy::Iqr => OutlierStrategy::Iqr,
            CliOutlierStrategy::Zscore => OutlierStrategy::ZScore,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Grade prediction with cross-validated model selection",
    long_about = "Trains regression models on a table of student records and predicts scores.\n\n\
                  EXAMPLES:\n  \
                  # Train with an inferred target and print a summary\n  \
                  gradecast train -i grades.csv\n\n  \
                  # Predict the latest score of one student in one course\n  \
                  gradecast predict -i grades.csv --key-column student_id --key 1024 --filter course_id=7\n\n  \
                  # Whole-table predictions as JSON\n  \
                  gradecast table -i grades.csv --target score --json | jq .diagnostics"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and the final result)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output JSON to stdout instead of a human-readable summary
    ///
    /// Disables all logs so stdout carries only JSON.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Select, evaluate and refit a model
    Train(TrainArgs),
    /// Predict the target for one entity's latest row
    Predict(PredictArgs),
    /// Predict every row and report diagnostics
    Table(TableArgs),
    /// Run only the preprocessor and write the numeric table
    Preprocess(PreprocessArgs),
    /// Summarize the target column
    Stats(StatsArgs),
}

/// Options shared by every command that trains.
#[derive(Args, Debug)]
struct TrainingOptions {
    /// Path to the input table (.csv, or .json with an array of records)
    #[arg(short, long)]
    input: PathBuf,

    /// Target column; inferred from column names if omitted
    #[arg(short, long)]
    target: Option<String>,

    /// Fraction of rows held out for evaluation
    #[arg(long, default_value = "0.2")]
    test_size: f64,

    /// Number of cross-validation folds
    #[arg(long, default_value = "5")]
    cv_folds: usize,

    /// Seed for the split and the forest bootstrap
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Strategy for imputing missing numeric values
    #[arg(long, value_enum, default_value = "mean")]
    missing: CliNumericImputation,

    /// Strategy for handling outliers
    #[arg(long, value_enum, default_value = "iqr")]
    outliers: CliOutlierStrategy,
}

#[derive(Args, Debug)]
struct TrainArgs {
    #[command(flatten)]
    options: TrainingOptions,
}

#[derive(Args, Debug)]
struct PredictArgs {
    #[command(flatten)]
    options: TrainingOptions,

    /// Column identifying the entity, e.g. student_id
    #[arg(long)]
    key_column: String,

    /// Entity key value, compared as text
    #[arg(long)]
    key: String,

    /// Extra equality filter as column=value; repeatable
    #[arg(long = "filter", value_parser = parse_filter)]
    filters: Vec<(String, String)>,
}

#[derive(Args, Debug)]
struct TableArgs {
    #[command(flatten)]
    options: TrainingOptions,

    /// Maximum rows in each preview list
    #[arg(long, default_value = "50")]
    preview: usize,

    /// Column identifying rows in previews
    #[arg(long)]
    id_column: Option<String>,

    /// Column grouping absolute errors, e.g. class_id
    #[arg(long)]
    group_column: Option<String>,
}

#[derive(Args, Debug)]
struct PreprocessArgs {
    /// Path to the input table
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the numeric table as CSV
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "mean")]
    missing: CliNumericImputation,

    #[arg(long, value_enum, default_value = "iqr")]
    outliers: CliOutlierStrategy,
}

#[derive(Args, Debug)]
struct StatsArgs {
    /// Path to the input table
    #[arg(short, long)]
    input: PathBuf,

    /// Target column; inferred from column names if omitted
    #[arg(short, long)]
    target: Option<String>,

    /// Column whose distinct values are counted as entities
    #[arg(long)]
    entity_column: Option<String>,
}

fn parse_filter(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(column, _)| !column.is_empty())
        .map(|(column, value)| (column.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected column=value, got '{raw}'"))
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.quiet, cli.json);

    match &cli.command {
        Command::Train(args) => run_train(args, cli.json),
        Command::Predict(args) => run_predict(args, cli.json),
        Command::Table(args) => run_table(args, cli.json),
        Command::Preprocess(args) => run_preprocess(args, cli.json),
        Command::Stats(args) => run_stats(args, cli.json),
    }
}

fn preprocess_config(
    missing: CliNumericImputation,
    outliers: CliOutlierStrategy,
) -> Result<PreprocessConfig> {
    Ok(PreprocessConfig::builder()
        .missing_strategy(missing.into())
        .outlier_strategy(outliers.into())
        .build()?)
}

fn training_config(options: &TrainingOptions) -> Result<gradecast_learning::TrainingConfigBuilder> {
    let mut builder = TrainingConfig::builder()
        .test_size(options.test_size)
        .cv_folds(options.cv_folds)
        .random_seed(options.seed)
        .preprocessing(preprocess_config(options.missing, options.outliers)?);
    if let Some(target) = &options.target {
        builder = builder.target_column(target);
    }
    Ok(builder)
}

fn run_train(args: &TrainArgs, json: bool) -> Result<()> {
    let data = load_table(&args.options.input)?;
    let trainer = Trainer::builder()
        .config(training_config(&args.options)?.build()?)
        .build();

    let result = trainer.train_and_evaluate(&data)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_training_summary(&result);
    }
    Ok(())
}

fn run_predict(args: &PredictArgs, json: bool) -> Result<()> {
    let data = load_table(&args.options.input)?;
    let trainer = Trainer::builder()
        .config(training_config(&args.options)?.build()?)
        .build();

    let mut query = EntityQuery::new(&args.key_column, &args.key);
    for (column, value) in &args.filters {
        query = query.filter(column, value);
    }

    let prediction = trainer.predict_for_entity(&data, &query)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&prediction)?);
    } else {
        println!();
        println!(
            "Predicted {} for {} = {}: {:.2}",
            prediction.target_column, args.key_column, prediction.key_value, prediction.predicted
        );
        println!(
            "  ({} matching rows, held-out R² {:.3}, MAE {:.3})",
            prediction.matched_rows, prediction.metrics.r2, prediction.metrics.mae
        );
    }
    Ok(())
}

fn run_table(args: &TableArgs, json: bool) -> Result<()> {
    let data = load_table(&args.options.input)?;
    let mut builder = training_config(&args.options)?.preview_limit(args.preview);
    if let Some(id) = &args.id_column {
        builder = builder.id_column(id);
    }
    if let Some(group) = &args.group_column {
        builder = builder.group_column(group);
    }
    let trainer = Trainer::builder().config(builder.build()?).build();

    let prediction = trainer.predict_table(&data)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&prediction)?);
    } else {
        print_table_summary(&prediction);
    }
    Ok(())
}

fn run_preprocess(args: &PreprocessArgs, json: bool) -> Result<()> {
    let data = load_table(&args.input)?;
    let config = preprocess_config(args.missing, args.outliers)?;
    let table = Preprocessor::new(config).preprocess(&data)?;

    if let Some(output) = &args.output {
        let mut numeric = table.data.clone();
        let mut file = std::fs::File::create(output)
            .with_context(|| format!("cannot create {}", output.display()))?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut numeric)?;
        info!("Numeric table written to: {}", output.display());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&TableOverview::from(&table))?);
    } else {
        let summary = &table.summary;
        println!();
        println!(
            "Rows: {} -> {} ({} duplicates removed)",
            summary.rows_before, summary.rows_after, summary.duplicates_removed
        );
        println!(
            "Imputed cells: {}, outliers replaced: {}",
            summary.total_imputed(),
            summary.total_outliers()
        );
        for column in &table.columns {
            println!("  {:<24} {:<12} {}", column.name, column.role.as_str(), column.original_type);
        }
        if !table.skipped_columns.is_empty() {
            println!("Skipped: {}", table.skipped_columns.join(", "));
        }
    }
    Ok(())
}

fn run_stats(args: &StatsArgs, json: bool) -> Result<()> {
    let data = load_table(&args.input)?;
    let mut config = TrainingConfig::default();
    config.target_column = args.target.clone();
    let trainer = Trainer::builder().config(config).build();

    let summary = trainer.summarize_target(&data, args.entity_column.as_deref())?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_target_summary(&summary);
    }
    Ok(())
}

/// Load a CSV file, or a JSON array of records when the extension is `.json`.
fn load_table(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(anyhow!("Input file not found: {}", path.display()));
    }
    info!("Loading dataset from: {}", path.display());

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let data = if is_json {
        let text = std::fs::read_to_string(path)?;
        frame_from_json(&text)?
    } else {
        CsvReadOptions::default()
            .with_infer_schema_length(Some(100))
            .with_has_header(true)
            .map_parse_options(|options| options.with_try_parse_dates(true))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?
    };
    debug!("Loaded schema: {:?}", data.schema());
    info!("Dataset loaded successfully: {:?}", data.shape());
    Ok(data)
}

/// Note: `println!` is intentional here; this is the command's output.
fn print_training_summary(result: &TrainingResult) {
    println!();
    println!("{}", "=".repeat(60));
    println!("TRAINING COMPLETE");
    println!("{}", "=".repeat(60));
    println!("  Target:      {}", result.target_column);
    println!("  Best model:  {}", result.best_model_name);
    if !result.best_params.is_empty() {
        let params: Vec<String> = result
            .best_params
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        println!("  Params:      {}", params.join(", "));
    }
    println!(
        "  Rows:        {} train / {} test ({} total)",
        result.train_rows, result.test_rows, result.total_rows
    );
    println!(
        "  Held-out:    R² {:.4}  MAE {:.4}  RMSE {:.4}",
        result.metrics.r2, result.metrics.mae, result.metrics.rmse
    );
    println!();
    println!("{:<20} {:>10} {:>10} {:>10}", "Family", "Baseline", "Tuned", "Std");
    println!("{}", "-".repeat(54));
    for family in &result.model_results {
        println!(
            "{:<20} {:>10.4} {:>10.4} {:>10.4}",
            family.family.as_str(),
            family.baseline_mean,
            family.tuned_mean,
            family.tuned_std
        );
    }
    if let Some(importance) = &result.feature_importance {
        println!();
        println!("Top features:");
        for entry in importance.iter().take(5) {
            println!("  {:<24} {:.4}", entry.feature, entry.importance);
        }
    }
    for warning in &result.warnings {
        println!("warning: {warning}");
    }
    println!("{}", "=".repeat(60));
}

fn print_table_summary(prediction: &TablePrediction) {
    println!();
    println!(
        "{} predicted by {} (held-out R² {:.4})",
        prediction.target_column, prediction.best_model_name, prediction.metrics.r2
    );
    println!();
    println!("{:>6} {:<16} {:>10} {:>10}", "Row", "Id", "Predicted", "Actual");
    for row in &prediction.preview {
        let actual = row.actual.map_or_else(|| "-".to_string(), |a| format!("{a:.2}"));
        println!(
            "{:>6} {:<16} {:>10.2} {:>10}",
            row.row,
            row.id.as_deref().unwrap_or(""),
            row.predicted,
            actual
        );
    }
    if !prediction.predicted_missing.is_empty() {
        println!();
        println!("{} rows had no recorded target", prediction.predicted_missing.len());
    }
    println!();
    println!("Largest errors:");
    for error in &prediction.diagnostics.top_abs_errors {
        println!(
            "  row {:>5}: predicted {:.2}, actual {:.2} (|error| {:.2})",
            error.row, error.predicted, error.actual, error.abs_error
        );
    }
}

fn print_target_summary(summary: &TargetSummary) {
    let show = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
    println!();
    println!("Target:   {}", summary.target_column);
    println!("Records:  {} ({} with a value)", summary.total_records, summary.non_null);
    if let Some(entities) = summary.entities {
        println!("Entities: {entities}");
    }
    println!(
        "Mean {}  Min {}  Max {}",
        show(summary.mean),
        show(summary.min),
        show(summary.max)
    );
}
