//! Command-line interface for the trial wrangler.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::loaders::{load_tabular, load_tabular_many};
use crate::core::table::{Cell, Table};
use crate::core::writers;
use crate::processors::extraction::{distinct_values, CombinationExtractor, Combinations};
use crate::processors::{pivot, summary};
use crate::WranglerConfig;

#[derive(Parser)]
#[command(name = "trial-wrangler")]
#[command(about = "Extract, pivot and aggregate experiment tables", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split tables into one CSV per combination of grouping values
    Extract {
        /// Input CSV/TSV files, concatenated in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Grouping columns
        #[arg(short, long, value_delimiter = ',', required = true)]
        group: Vec<String>,
        /// Restrict a grouping column to listed values, as COLUMN=V1,V2
        #[arg(long)]
        only: Vec<String>,
        /// Write these data columns side by side instead of partitions
        #[arg(short, long, value_delimiter = ',')]
        data: Vec<String>,
        /// Output directory (partitions) or file (data columns)
        #[arg(short, long)]
        output: PathBuf,
        /// File name prefix for partitions
        #[arg(long, default_value = "")]
        base: String,
    },

    /// Convert a long table to one row per subject
    ShortFat {
        /// Input CSV/TSV file
        input: PathBuf,
        /// Output CSV file
        output: PathBuf,
        /// Per-subject column copied next to the index
        #[arg(long)]
        carry: Option<String>,
        /// Replace coded values with configured names first
        #[arg(long)]
        recode: bool,
    },

    /// Mean value per subject and run, optionally with group run averages
    RunMeans {
        /// Input CSV/TSV files, concatenated in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,
        /// Subject column
        #[arg(long, default_value = "SUBJECT")]
        entity: String,
        /// Run column
        #[arg(long, default_value = "RUN")]
        run: String,
        /// Group column; writes one run-average file per group
        #[arg(long)]
        group: Option<String>,
        /// Directory for group run-average files (defaults to the output's)
        #[arg(long)]
        group_dir: Option<PathBuf>,
    },

    /// Place one column from each input side by side
    Combine {
        /// Input CSV/TSV files; columns are named by file stem
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Column to take from every input
        #[arg(long)]
        column: String,
        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Average a time-frequency window of TFC exports per subject
    Window {
        /// TFC files named `{subject}_..{condition}..`
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Mean, standard error and optional threshold/block statistics per group
    Summary {
        /// Input CSV/TSV files, concatenated in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Grouping columns
        #[arg(short, long, value_delimiter = ',', required = true)]
        group: Vec<String>,
        /// Value column (defaults to the first configured alias present)
        #[arg(long)]
        value: Option<String>,
        /// Threshold for the percent-at-or-below statistic
        #[arg(long)]
        threshold: Option<f64>,
        /// Number of contiguous blocks to average
        #[arg(long)]
        blocks: Option<usize>,
        /// Required values per block
        #[arg(long)]
        block_len: Option<usize>,
        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let config = match &cli.config {
        Some(path) => match WranglerConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                WranglerConfig::default()
            }
        },
        None => WranglerConfig::default(),
    };

    let start = Instant::now();
    let (title, result) = match cli.command {
        Commands::Extract {
            inputs,
            group,
            only,
            data,
            output,
            base,
        } => (
            "Extraction",
            cmd_extract(&inputs, &group, &only, &data, &output, &base, &config),
        ),
        Commands::ShortFat {
            input,
            output,
            carry,
            recode,
        } => (
            "Short-fat Conversion",
            cmd_short_fat(&input, &output, carry, recode, &config),
        ),
        Commands::RunMeans {
            inputs,
            output,
            entity,
            run,
            group,
            group_dir,
        } => (
            "Run Means",
            cmd_run_means(
                &inputs,
                &output,
                &entity,
                &run,
                group.as_deref(),
                group_dir.as_deref(),
                &config,
            ),
        ),
        Commands::Combine {
            inputs,
            column,
            output,
        } => ("Combine", cmd_combine(&inputs, &column, &output)),
        Commands::Window { inputs, output } => ("Window Averages", cmd_window(&inputs, &output, &config)),
        Commands::Summary {
            inputs,
            group,
            value,
            threshold,
            blocks,
            block_len,
            output,
        } => {
            let mut aggregate = config.aggregate.clone();
            aggregate.fast_threshold = threshold.or(aggregate.fast_threshold);
            aggregate.block_count = blocks.or(aggregate.block_count);
            aggregate.expected_block_len = block_len.or(aggregate.expected_block_len);
            (
                "Trial Summary",
                cmd_summary(&inputs, &group, value.as_deref(), &aggregate, &output, &config),
            )
        }
    };

    match result {
        Ok(mut items) => {
            items.push(("Duration", format!("{:.2?}", start.elapsed())));
            print_summary(&format!("{title} Complete"), &items);
        }
        Err(e) => {
            error!("{title} failed: {e:#}");
            std::process::exit(1);
        }
    }
}

type Summary = Vec<(&'static str, String)>;

fn extractor(config: &WranglerConfig) -> CombinationExtractor {
    CombinationExtractor::new(config.extract.clone(), config.log.clone())
}

fn load_inputs(inputs: &[PathBuf]) -> Result<Table> {
    let spinner = create_spinner(&format!("Loading {} file(s)...", inputs.len()));
    let table = load_tabular_many(inputs);
    spinner.finish_and_clear();
    table.context("failed to load input tables")
}

/// Per-column value lists for `--only COLUMN=V1,V2` restrictions; unrestricted
/// columns use every distinct value.
fn combinations(table: &Table, group: &[&str], only: &[String]) -> Result<Combinations> {
    if only.is_empty() {
        return Ok(Combinations::Distinct);
    }

    let mut restricted: IndexMap<&str, Vec<Cell>> = IndexMap::new();
    for entry in only {
        let Some((column, values)) = entry.split_once('=') else {
            bail!("--only expects COLUMN=V1,V2, got '{entry}'");
        };
        if !group.contains(&column) {
            bail!("--only column '{column}' is not a grouping column");
        }
        restricted.insert(column, values.split(',').map(Cell::parse).collect());
    }

    let lists = group
        .iter()
        .map(|column| match restricted.get(column) {
            Some(values) => Ok(values.clone()),
            None => distinct_values(table, column),
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Combinations::PerColumn(lists))
}

fn cmd_extract(
    inputs: &[PathBuf],
    group: &[String],
    only: &[String],
    data: &[String],
    output: &Path,
    base: &str,
    config: &WranglerConfig,
) -> Result<Summary> {
    let table = load_inputs(inputs)?;
    let group: Vec<&str> = group.iter().map(String::as_str).collect();
    let combos = combinations(&table, &group, only)?;
    let extractor = extractor(config);

    if data.is_empty() {
        let partitions = extractor.partitions(&table, &group, &combos)?;
        let written = writers::write_partitions(output, base, &partitions)?;
        let empty = partitions.values().filter(|p| p.is_empty()).count();
        Ok(vec![
            ("Rows", table.num_rows().to_string()),
            ("Partitions", partitions.len().to_string()),
            ("Empty partitions", empty.to_string()),
            ("Files written", written.len().to_string()),
            ("Output", output.display().to_string()),
        ])
    } else {
        let data: Vec<&str> = data.iter().map(String::as_str).collect();
        let columns = extractor.columns(&table, &group, &combos, &data)?;
        writers::write_ragged_csv(output, &columns)?;
        Ok(vec![
            ("Rows", table.num_rows().to_string()),
            ("Columns", columns.num_columns().to_string()),
            ("Longest column", columns.max_len().to_string()),
            ("Output", output.display().to_string()),
        ])
    }
}

fn cmd_short_fat(
    input: &Path,
    output: &Path,
    carry: Option<String>,
    recode: bool,
    config: &WranglerConfig,
) -> Result<Summary> {
    let table = load_tabular(input)
        .with_context(|| format!("failed to load {}", input.display()))?;

    let mut pivot_config = config.pivot.clone();
    if carry.is_some() {
        pivot_config.carry_column = carry;
    }

    let table = if recode {
        pivot::apply_recodes(&table, &pivot_config)?
    } else {
        table
    };
    let wide = pivot::short_fat(&extractor(config), &table, &pivot_config)?;
    writers::write_keyed_csv(output, &wide)?;

    Ok(vec![
        ("Input file", input.display().to_string()),
        ("Subjects", wide.num_rows().to_string()),
        ("Columns", wide.num_columns().to_string()),
        ("Output", output.display().to_string()),
    ])
}

fn cmd_run_means(
    inputs: &[PathBuf],
    output: &Path,
    entity: &str,
    run: &str,
    group: Option<&str>,
    group_dir: Option<&Path>,
    config: &WranglerConfig,
) -> Result<Summary> {
    let table = load_inputs(inputs)?;
    let means = summary::partition_means(
        &extractor(config),
        &table,
        entity,
        run,
        &config.aggregate.value_aliases,
    )?;
    writers::write_aggregate_csv(output, &means)?;

    let mut items = vec![
        ("Subjects", means.len().to_string()),
        ("Runs", means.fields().len().to_string()),
        ("Output", output.display().to_string()),
    ];

    if let Some(group_column) = group {
        let dir = group_dir
            .or_else(|| output.parent())
            .unwrap_or_else(|| Path::new("."));
        let groups = summary::entity_groups(&table, entity, group_column)?;
        for (name, members) in &groups {
            let series: IndexMap<String, Vec<Option<f64>>> = members
                .iter()
                .map(|m| {
                    let values = means
                        .fields()
                        .iter()
                        .map(|field| means.get(m, field))
                        .collect();
                    (m.clone(), values)
                })
                .collect();
            let path = dir.join(format!("{name}_run_averages.csv"));
            writers::write_ragged_csv(&path, &summary::group_run_averages(&series))?;
            info!("Wrote {} subjects of group {name} to {}", members.len(), path.display());
        }
        items.push(("Groups", groups.len().to_string()));
    }

    Ok(items)
}

fn cmd_combine(inputs: &[PathBuf], column: &str, output: &Path) -> Result<Summary> {
    let mut sources = Vec::with_capacity(inputs.len());
    for path in inputs {
        let table =
            load_tabular(path).with_context(|| format!("failed to load {}", path.display()))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        sources.push((name, table));
    }

    let combined = summary::combine_columns(&sources, column)?;
    writers::write_ragged_csv(output, &combined)?;

    Ok(vec![
        ("Sources", sources.len().to_string()),
        ("Column", column.to_string()),
        ("Longest column", combined.max_len().to_string()),
        ("Output", output.display().to_string()),
    ])
}

fn cmd_window(inputs: &[PathBuf], output: &Path, config: &WranglerConfig) -> Result<Summary> {
    let eeg = &config.eeg;
    let mut matched = Vec::with_capacity(inputs.len());
    let mut skipped = 0usize;
    for path in inputs {
        let found = summary::EegInput::all_from_path(path, &eeg.conditions);
        if found.is_empty() {
            warn!("{} matches no condition; skipping", path.display());
            skipped += 1;
        }
        matched.extend(found);
    }
    if matched.is_empty() {
        bail!("no input file name contains any of: {}", eeg.conditions.join(", "));
    }

    let spinner = create_spinner("Averaging windows...");
    let averages = summary::eeg_window_averages(&matched, eeg, &config.log);
    spinner.finish_and_clear();
    let averages = averages?;
    writers::write_aggregate_csv(output, &averages)?;

    Ok(vec![
        ("Inputs", matched.len().to_string()),
        ("Skipped", skipped.to_string()),
        ("Subjects", averages.len().to_string()),
        ("Output", output.display().to_string()),
    ])
}

fn cmd_summary(
    inputs: &[PathBuf],
    group: &[String],
    value: Option<&str>,
    aggregate: &crate::config::AggregateConfig,
    output: &Path,
    config: &WranglerConfig,
) -> Result<Summary> {
    let table = load_inputs(inputs)?;
    let value_column = match value {
        Some(v) => v.to_string(),
        None => summary::resolve_column(&table, &aggregate.value_aliases)?,
    };
    let group: Vec<&str> = group.iter().map(String::as_str).collect();

    let stats = summary::trial_summary(&extractor(config), &table, &group, &value_column, aggregate)?;
    writers::write_aggregate_csv(output, &stats)?;

    Ok(vec![
        ("Rows", table.num_rows().to_string()),
        ("Value column", value_column),
        ("Partitions", stats.len().to_string()),
        ("Output", output.display().to_string()),
    ])
}
