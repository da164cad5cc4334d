//! Data processing modules.

pub mod aggregation;
pub mod extraction;
pub mod pivot;
pub mod summary;

// Re-export key types for convenience
pub use aggregation::{
    block_average, block_average_checked, group_average, group_averages,
    percent_below_threshold, window_mean, AggregateError, GroupStats,
};
pub use extraction::{
    distinct_values, CombinationExtractor, Combinations, ExtractError, Extraction,
};
pub use pivot::{apply_recodes, recode_first_occurrence, short_fat, PivotError};
pub use summary::{
    combine_columns, eeg_window_averages, group_run_averages, partition_means, resolve_column,
    trial_summary, EegInput,
};
