use std::fs;
use std::io::Write;

use tempfile::tempdir;
use trial_wrangler::core::loaders::{load_tabular, load_tabular_many};
use trial_wrangler::core::writers::{write_aggregate_csv, write_partitions, write_ragged_csv};
use trial_wrangler::processors::extraction::{CombinationExtractor, Combinations};
use trial_wrangler::processors::summary::{eeg_window_averages, partition_means, EegInput};
use trial_wrangler::{Cell, EegConfig, LogConfig};

const TRIALS: &str = "\
SUBJECT,GROUP,RUN,LOG_RT
S01,A,1,2.5
S01,A,2,2.7
S02,B,1,3.1
S02,B,2,2.9
S03,A,1,2.1
";

#[test]
fn extract_partitions_round_trip_through_csv() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("trials.csv");
    fs::write(&input, TRIALS).unwrap();

    let table = load_tabular(&input).unwrap();
    let parts = CombinationExtractor::default()
        .partitions(&table, &["GROUP", "RUN"], &Combinations::Distinct)
        .unwrap();
    let out = dir.path().join("GROUP_RUN");
    let written = write_partitions(&out, "trials", &parts).unwrap();
    assert_eq!(written.len(), 4);

    let a1 = fs::read_to_string(out.join("trials_A_1.csv")).unwrap();
    let lines: Vec<&str> = a1.lines().collect();
    assert_eq!(
        lines,
        vec![",SUBJECT,GROUP,RUN,LOG_RT", "0,S01,A,1,2.5", "4,S03,A,1,2.1"]
    );

    // partitions read back and concatenated hold every source row once
    let back = load_tabular_many(&written).unwrap();
    assert_eq!(back.num_rows(), table.num_rows());
}

#[test]
fn data_columns_are_padded_on_write() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("trials.tsv");
    fs::write(&input, TRIALS.replace(',', "\t")).unwrap();

    let table = load_tabular(&input).unwrap();
    let columns = CombinationExtractor::default()
        .columns(&table, &["GROUP"], &Combinations::Distinct, &["LOG_RT"])
        .unwrap();
    assert_eq!(columns.column("B_LOG_RT").unwrap().len(), 2);
    assert_eq!(columns.column("A_LOG_RT").unwrap()[2], Cell::Float(2.1));

    let out = dir.path().join("columns.csv");
    write_ragged_csv(&out, &columns).unwrap();
    let content = fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], ",A_LOG_RT,B_LOG_RT");
    assert_eq!(lines[3], "2,2.1,");
}

#[test]
fn run_means_written_per_subject() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("trials.csv");
    fs::write(&input, TRIALS).unwrap();

    let table = load_tabular(&input).unwrap();
    let means = partition_means(
        &CombinationExtractor::default(),
        &table,
        "SUBJECT",
        "RUN",
        &["LOG_RT", "Normalized_Log_RT"],
    )
    .unwrap();

    let out = dir.path().join("means.csv");
    write_aggregate_csv(&out, &means).unwrap();
    let content = fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "SUBJECT,1,2");
    assert_eq!(lines[3], "S03,2.1,");
}

fn write_tfc(path: &std::path::Path, rows: usize, cols: usize, values: &[f64]) {
    let mut file = fs::File::create(path).unwrap();
    writeln!(file, "TFC export").unwrap();
    writeln!(file, "freq\\time").unwrap();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            writeln!(file).unwrap();
        }
        for _ in 0..rows {
            let row = vec![value.to_string(); cols].join("\t");
            writeln!(file, "{row}\t").unwrap();
        }
    }
}

#[test]
fn tfc_window_averages_per_subject_and_condition() {
    let dir = tempdir().unwrap();
    let config = EegConfig::default();
    let paths = [
        dir.path().join("S01_anode.txt"),
        dir.path().join("S01_visual.txt"),
        dir.path().join("S02_ANODE_b.txt"),
    ];
    write_tfc(&paths[0], 24, 25, &[1.0, 2.0, 3.0]);
    write_tfc(&paths[1], 24, 25, &[4.0, 5.0, 6.0]);
    write_tfc(&paths[2], 24, 25, &[7.0, 8.0, 9.0]);

    let inputs: Vec<EegInput> = paths
        .iter()
        .filter_map(|p| EegInput::from_path(p, &config.conditions))
        .collect();
    assert_eq!(inputs.len(), 3);

    let averages = eeg_window_averages(&inputs, &config, &LogConfig::default()).unwrap();
    assert_eq!(averages.entities().collect::<Vec<_>>(), vec!["S01", "S02"]);
    assert_eq!(averages.get("S01", "Visual_e1"), Some(5.0));
    assert_eq!(averages.get("S02", "Anode_e2"), Some(9.0));
    assert_eq!(averages.get("S02", "Visual_e0"), None);

    let out = dir.path().join("window.csv");
    write_aggregate_csv(&out, &averages).unwrap();
    let header = fs::read_to_string(&out).unwrap();
    assert!(header.starts_with("Subject,Anode_e0,Anode_e1,Anode_e2,Visual_e0"));
}
