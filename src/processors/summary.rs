//! Higher-level summaries built from extraction and aggregation: per-subject
//! run means, group run averages, column combining, TFC window averages and
//! per-partition trial statistics.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{debug, info, warn};

use super::aggregation::{
    block_average, block_average_checked, group_average, numeric_column,
    percent_below_threshold, window_mean, AggregateError,
};
use super::extraction::{distinct_values, CombinationExtractor, Combinations, ExtractError};
use crate::config::{AggregateConfig, EegConfig, LogConfig};
use crate::core::loaders::load_delimited;
use crate::core::record::AggregateTable;
use crate::core::table::{Cell, RaggedTable, Table};
use crate::error::Result;

/// Name of the row-wise mean column added by [`group_run_averages`].
pub const GROUP_AVG_COLUMN: &str = "GroupAvg";

/// First of `aliases` that names a column of `table`.
///
/// # Errors
///
/// Returns `UnknownColumn` listing every alias when none is present.
pub fn resolve_column<S: AsRef<str>>(table: &Table, aliases: &[S]) -> Result<String> {
    aliases
        .iter()
        .map(|a| a.as_ref())
        .find(|name| table.has_column(name))
        .map(str::to_string)
        .ok_or_else(|| {
            let tried: Vec<&str> = aliases.iter().map(|a| a.as_ref()).collect();
            ExtractError::UnknownColumn(tried.join(" | ")).into()
        })
}

fn mean_or_absent(values: &[Option<f64>]) -> Result<Option<f64>> {
    match group_average(values) {
        Ok(stats) => Ok(Some(stats.mean)),
        Err(AggregateError::EmptyGroup) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Mean of the value column for every entity and run.
///
/// One row per distinct entity, one field per distinct run value (both in
/// first-occurrence order). The value column is the first alias present.
/// Runs an entity never did are absent.
pub fn partition_means<S: AsRef<str>>(
    extractor: &CombinationExtractor,
    table: &Table,
    entity_column: &str,
    run_column: &str,
    aliases: &[S],
) -> Result<AggregateTable> {
    let value_column = resolve_column(table, aliases)?;
    let runs = distinct_values(table, run_column)?;
    let by_entity = extractor.partitions(table, &[entity_column], &Combinations::Distinct)?;
    let run_idx = table
        .column_index(run_column)
        .ok_or_else(|| ExtractError::UnknownColumn(run_column.to_string()))?;

    let mut out = AggregateTable::new(entity_column);
    for (entity, partition) in &by_entity {
        out.ensure_entity(entity);
        for run in &runs {
            let rows = partition.take(&partition.rows_where(&[(run_idx, run)]));
            let mean = mean_or_absent(&numeric_column(&rows, &value_column)?)?;
            if mean.is_some() {
                out.set(entity, run.to_string(), mean);
            }
        }
    }

    info!(
        "Averaged '{value_column}' for {} {entity_column} values over {} runs",
        out.len(),
        runs.len()
    );
    Ok(out)
}

/// Entities of each group, both in first-occurrence order.
pub fn entity_groups(
    table: &Table,
    entity_column: &str,
    group_column: &str,
) -> Result<IndexMap<String, Vec<String>>> {
    let missing = |name: &str| ExtractError::UnknownColumn(name.to_string());
    let entities = table.column(entity_column).ok_or_else(|| missing(entity_column))?;
    let groups = table.column(group_column).ok_or_else(|| missing(group_column))?;

    let mut out: IndexMap<String, Vec<String>> = IndexMap::new();
    for (entity, group) in entities.iter().zip(groups) {
        if entity.is_empty() || group.is_empty() {
            continue;
        }
        let members = out.entry(group.to_string()).or_default();
        let entity = entity.to_string();
        if !members.contains(&entity) {
            members.push(entity);
        }
    }
    Ok(out)
}

/// Subject series side by side plus a [`GROUP_AVG_COLUMN`] holding the mean
/// of each row over the subjects with a value there.
pub fn group_run_averages(subjects: &IndexMap<String, Vec<Option<f64>>>) -> RaggedTable {
    let mut out = RaggedTable::new();
    for (subject, series) in subjects {
        out.push_column(
            subject.clone(),
            series.iter().copied().map(Cell::from).collect(),
        );
    }

    let len = subjects.values().map(Vec::len).max().unwrap_or(0);
    let averages = (0..len)
        .map(|r| {
            let row: Vec<Option<f64>> = subjects
                .values()
                .map(|series| series.get(r).copied().flatten())
                .collect();
            Cell::from(group_average(&row).ok().map(|stats| stats.mean))
        })
        .collect();
    out.push_column(GROUP_AVG_COLUMN, averages);
    out
}

/// One column per named source holding that source's `column`.
pub fn combine_columns(sources: &[(String, Table)], column: &str) -> Result<RaggedTable> {
    let mut out = RaggedTable::new();
    for (name, table) in sources {
        let cells = table
            .column(column)
            .ok_or_else(|| ExtractError::UnknownColumn(format!("{name}: {column}")))?;
        if out.push_column(name.clone(), cells.to_vec()) {
            warn!("Source name '{name}' repeats; keeping the later column");
        }
    }
    Ok(out)
}

/// A TFC export attributed to an entity and condition.
#[derive(Debug, Clone, PartialEq)]
pub struct EegInput {
    pub entity: String,
    pub condition: String,
    pub path: PathBuf,
}

impl EegInput {
    /// Attribute a file by its name: the entity is the text before the first
    /// `_`, the condition is the first of `conditions` contained in the file
    /// name (case-insensitive). Returns `None` when no condition matches.
    ///
    /// A name containing several conditions is attributed to the first one
    /// only; use [`EegInput::all_from_path`] to keep every match.
    pub fn from_path<S: AsRef<str>>(path: &Path, conditions: &[S]) -> Option<Self> {
        Self::all_from_path(path, conditions).into_iter().next()
    }

    /// One input per condition contained in the file name, in `conditions`
    /// order. Empty when no condition matches.
    pub fn all_from_path<S: AsRef<str>>(path: &Path, conditions: &[S]) -> Vec<Self> {
        let (Some(file_name), Some(stem)) = (path.file_name(), path.file_stem()) else {
            return Vec::new();
        };
        let lower = file_name.to_string_lossy().to_lowercase();
        let stem = stem.to_string_lossy();
        let entity = stem.split('_').next().unwrap_or_default();

        conditions
            .iter()
            .map(|c| c.as_ref())
            .filter(|c| lower.contains(&c.to_lowercase()))
            .map(|condition| Self {
                entity: entity.to_string(),
                condition: condition.to_string(),
                path: path.to_path_buf(),
            })
            .collect()
    }
}

/// Window mean of every section of every input, recorded as
/// `{condition}_{section}` on the input's entity.
///
/// A section the file does not contain (an empty grid) is recorded as absent
/// and the remaining inputs are still processed.
pub fn eeg_window_averages(
    inputs: &[EegInput],
    config: &EegConfig,
    log: &LogConfig,
) -> Result<AggregateTable> {
    let mut out = AggregateTable::new("Subject");
    for input in inputs {
        let grids = load_delimited(&input.path, &config.sources)?;
        out.ensure_entity(&input.entity);
        for (label, grid) in &grids {
            if log.debug_previews {
                let (rows, cols) = grid.shape();
                debug!("{}: {label} is {rows}x{cols}", input.path.display());
            }
            let field = format!("{}_{label}", input.condition);
            let mean = if grid.is_empty() {
                warn!(
                    "{} has no {label} section; {field} left empty for {}",
                    input.path.display(),
                    input.entity
                );
                None
            } else {
                Some(window_mean(
                    grid,
                    &config.row_axis,
                    &config.col_axis,
                    &config.window,
                )?)
            };
            if out.contains(&input.entity, &field) {
                warn!(
                    "{} repeats {field} for {}; keeping the later value",
                    input.path.display(),
                    input.entity
                );
            }
            out.set(&input.entity, field, mean);
        }
    }

    info!(
        "Window averages for {} files over {} subjects",
        inputs.len(),
        out.len()
    );
    Ok(out)
}

/// Per-partition statistics of `value_column`: `mean`, `std_error`, `n`,
/// optionally `percent_fast` (share at or below the threshold) and block
/// means `block_1..block_k`.
pub fn trial_summary(
    extractor: &CombinationExtractor,
    table: &Table,
    group_columns: &[&str],
    value_column: &str,
    config: &AggregateConfig,
) -> Result<AggregateTable> {
    numeric_column(table, value_column)?;
    let partitions = extractor.partitions(table, group_columns, &Combinations::Distinct)?;

    let index_name = group_columns.join(extractor.separator());
    let mut out = AggregateTable::new(index_name);

    for (label, partition) in &partitions {
        out.ensure_entity(label);
        let values: Vec<f64> = numeric_column(partition, value_column)?
            .into_iter()
            .flatten()
            .filter(|v| !v.is_nan())
            .collect();
        let present: Vec<Option<f64>> = values.iter().copied().map(Some).collect();

        match group_average(&present) {
            Ok(stats) => {
                out.set(label, "mean", Some(stats.mean));
                out.set(
                    label,
                    "std_error",
                    Some(stats.standard_error).filter(|se| !se.is_nan()),
                );
                out.set(label, "n", Some(stats.n as f64));
            }
            Err(AggregateError::EmptyGroup) => {
                warn!("Partition {label} has no values in '{value_column}'");
                out.set(label, "mean", None);
                out.set(label, "std_error", None);
                out.set(label, "n", Some(0.0));
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(threshold) = config.fast_threshold {
            let percent = percent_below_threshold(&values, threshold);
            if percent.is_none() {
                warn!("Partition {label}: no values for percent at or below {threshold}");
            }
            out.set(label, "percent_fast", percent);
        }

        if let Some(k) = config.block_count {
            let blocks = match config.expected_block_len {
                Some(expected) => block_average_checked(&values, k, expected),
                None => block_average(&values, k),
            };
            match blocks {
                Ok(means) => {
                    for (i, mean) in means.into_iter().enumerate() {
                        out.set(label, format!("block_{}", i + 1), Some(mean));
                    }
                }
                Err(AggregateError::EmptyGroup) => {
                    warn!("Partition {label}: {} values cannot fill {k} blocks", values.len());
                    for i in 0..k {
                        out.set(label, format!("block_{}", i + 1), None);
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    info!(
        "Summarised '{value_column}' over {} partitions",
        partitions.len()
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorClass};
    use std::io::Write;
    use tempfile::tempdir;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn rt_table() -> Table {
        Table::from_rows(
            names(&["SUBJECT", "GROUP", "RUN", "Normalized_Log_RT"]),
            vec![
                vec!["S01".into(), "A".into(), 1.into(), 2.0.into()],
                vec!["S01".into(), "A".into(), 1.into(), 4.0.into()],
                vec!["S01".into(), "A".into(), 2.into(), 5.0.into()],
                vec!["S02".into(), "B".into(), 1.into(), 1.0.into()],
                vec!["S03".into(), "A".into(), 2.into(), 7.0.into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_column_falls_back() {
        let table = rt_table();
        let aliases = ["LOG_RT", "Normalized_Log_RT"];
        assert_eq!(resolve_column(&table, &aliases).unwrap(), "Normalized_Log_RT");

        let err = resolve_column(&table, &["LOG_RT", "RT"]).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Configuration);
        assert!(err.to_string().contains("LOG_RT | RT"));
    }

    #[test]
    fn test_partition_means() {
        let means = partition_means(
            &CombinationExtractor::default(),
            &rt_table(),
            "SUBJECT",
            "RUN",
            &["LOG_RT", "Normalized_Log_RT"],
        )
        .unwrap();

        assert_eq!(means.index_name(), "SUBJECT");
        assert_eq!(means.get("S01", "1"), Some(3.0));
        assert_eq!(means.get("S01", "2"), Some(5.0));
        assert_eq!(means.get("S02", "1"), Some(1.0));
        assert!(!means.contains("S02", "2"));
        assert_eq!(means.fields(), vec!["1", "2"]);
    }

    #[test]
    fn test_entity_groups() {
        let groups = entity_groups(&rt_table(), "SUBJECT", "GROUP").unwrap();
        assert_eq!(groups["A"], vec!["S01", "S03"]);
        assert_eq!(groups["B"], vec!["S02"]);
    }

    #[test]
    fn test_group_run_averages() {
        let mut subjects = IndexMap::new();
        subjects.insert("S01".to_string(), vec![Some(1.0), Some(3.0)]);
        subjects.insert("S03".to_string(), vec![Some(3.0), None, Some(6.0)]);

        let table = group_run_averages(&subjects);
        assert_eq!(
            table.column_names().collect::<Vec<_>>(),
            vec!["S01", "S03", GROUP_AVG_COLUMN]
        );
        assert_eq!(
            table.column(GROUP_AVG_COLUMN).unwrap(),
            &[Cell::Float(2.0), Cell::Float(3.0), Cell::Float(6.0)]
        );
        assert_eq!(table.column("S03").unwrap()[1], Cell::Empty);
    }

    #[test]
    fn test_combine_columns() {
        let a = Table::from_rows(names(&["Coherence"]), vec![vec![0.1.into()], vec![0.2.into()]])
            .unwrap();
        let b = Table::from_rows(names(&["Coherence"]), vec![vec![0.3.into()]]).unwrap();

        let combined =
            combine_columns(&[("anode".to_string(), a), ("sham".to_string(), b)], "Coherence")
                .unwrap();
        assert_eq!(combined.column_names().collect::<Vec<_>>(), vec!["anode", "sham"]);
        assert_eq!(combined.max_len(), 2);

        let missing = Table::from_rows(names(&["Power"]), vec![]).unwrap();
        let err = combine_columns(&[("x".to_string(), missing)], "Coherence").unwrap_err();
        assert!(matches!(err, Error::Extract(ExtractError::UnknownColumn(_))));
    }

    #[test]
    fn test_eeg_input_from_path() {
        let conditions = ["Anode", "Cathode", "Sham", "Visual"];
        let input = EegInput::from_path(Path::new("data/P07_cathode_tfc.txt"), &conditions).unwrap();
        assert_eq!(input.entity, "P07");
        assert_eq!(input.condition, "Cathode");

        assert!(EegInput::from_path(Path::new("P07_rest.txt"), &conditions).is_none());
    }

    #[test]
    fn test_eeg_input_all_conditions_in_name() {
        let conditions = ["Anode", "Cathode", "Sham", "Visual"];
        let path = Path::new("P07_sham_visual.txt");

        let all = EegInput::all_from_path(path, &conditions);
        let found: Vec<&str> = all.iter().map(|i| i.condition.as_str()).collect();
        assert_eq!(found, vec!["Sham", "Visual"]);
        assert!(all.iter().all(|i| i.entity == "P07"));

        assert_eq!(EegInput::from_path(path, &conditions).unwrap().condition, "Sham");
        assert!(EegInput::all_from_path(Path::new("P07_rest.txt"), &conditions).is_empty());
    }

    fn write_tfc(path: &Path, sections: &[f64]) {
        write_tfc_rows(path, sections, 24);
    }

    fn write_tfc_rows(path: &Path, sections: &[f64], rows: usize) {
        let mut file = std::fs::File::create(path).unwrap();
        writeln!(file, "header one").unwrap();
        writeln!(file, "header two").unwrap();
        for (i, value) in sections.iter().enumerate() {
            if i > 0 {
                writeln!(file).unwrap();
            }
            for _ in 0..rows {
                let row = vec![value.to_string(); 25].join("\t");
                writeln!(file, "{row}\t").unwrap();
            }
        }
    }

    #[test]
    fn test_eeg_window_averages() {
        let dir = tempdir().unwrap();
        let anode = dir.path().join("P01_Anode.txt");
        let sham = dir.path().join("P01_sham.txt");
        write_tfc(&anode, &[1.0, 2.0, 3.0]);
        write_tfc(&sham, &[4.0, 5.0, 6.0]);

        let config = EegConfig::default();
        let inputs: Vec<EegInput> = [&anode, &sham]
            .iter()
            .filter_map(|p| EegInput::from_path(p, &config.conditions))
            .collect();
        let averages = eeg_window_averages(&inputs, &config, &LogConfig::default()).unwrap();

        assert_eq!(averages.len(), 1);
        assert_eq!(averages.get("P01", "Anode_e0"), Some(1.0));
        assert_eq!(averages.get("P01", "Anode_e2"), Some(3.0));
        assert_eq!(averages.get("P01", "Sham_e1"), Some(5.0));
        assert_eq!(averages.fields().len(), 6);
    }

    #[test]
    fn test_eeg_missing_section_is_absent() {
        let dir = tempdir().unwrap();
        let short = dir.path().join("S01_anode.txt");
        let full = dir.path().join("S02_anode.txt");
        write_tfc(&short, &[1.0, 2.0]);
        write_tfc(&full, &[4.0, 5.0, 6.0]);

        let config = EegConfig::default();
        let inputs: Vec<EegInput> = [&short, &full]
            .iter()
            .filter_map(|p| EegInput::from_path(p, &config.conditions))
            .collect();
        let averages = eeg_window_averages(&inputs, &config, &LogConfig::default()).unwrap();

        assert_eq!(averages.get("S01", "Anode_e0"), Some(1.0));
        assert_eq!(averages.get("S01", "Anode_e1"), Some(2.0));
        assert!(averages.contains("S01", "Anode_e2"));
        assert_eq!(averages.get("S01", "Anode_e2"), None);
        assert_eq!(averages.get("S02", "Anode_e2"), Some(6.0));
    }

    #[test]
    fn test_eeg_undersized_section_still_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("S01_anode.txt");
        write_tfc_rows(&path, &[1.0, 2.0, 3.0], 10);

        let config = EegConfig::default();
        let inputs = EegInput::all_from_path(&path, &config.conditions);
        let err = eeg_window_averages(&inputs, &config, &LogConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Aggregate(AggregateError::WindowOutOfBounds { rows: 10, .. })
        ));
    }

    #[test]
    fn test_trial_summary() {
        let config = AggregateConfig {
            fast_threshold: Some(2.0),
            block_count: Some(2),
            ..AggregateConfig::default()
        };
        let summary = trial_summary(
            &CombinationExtractor::default(),
            &rt_table(),
            &["GROUP"],
            "Normalized_Log_RT",
            &config,
        )
        .unwrap();

        assert_eq!(summary.index_name(), "GROUP");
        // A: 2, 4, 5, 7
        assert_eq!(summary.get("A", "mean"), Some(4.5));
        assert_eq!(summary.get("A", "n"), Some(4.0));
        assert_eq!(summary.get("A", "percent_fast"), Some(25.0));
        assert_eq!(summary.get("A", "block_1"), Some(3.0));
        assert_eq!(summary.get("A", "block_2"), Some(6.0));
        // B has a single value: no standard error, too few for two blocks
        assert_eq!(summary.get("B", "std_error"), None);
        assert_eq!(summary.get("B", "percent_fast"), Some(100.0));
        assert_eq!(summary.get("B", "block_2"), None);
    }

    #[test]
    fn test_trial_summary_block_size_assertion() {
        let config = AggregateConfig {
            block_count: Some(2),
            expected_block_len: Some(3),
            ..AggregateConfig::default()
        };
        let err = trial_summary(
            &CombinationExtractor::default(),
            &rt_table(),
            &["GROUP"],
            "Normalized_Log_RT",
            &config,
        )
        .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Assertion);
    }
}
