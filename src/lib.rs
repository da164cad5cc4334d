//! Extraction and aggregation of behavioural and EEG experiment tables.
//!
//! This crate provides tools for:
//! - Loading CSV/TSV tables and sectioned time-frequency (TFC) exports
//! - Splitting tables into partitions by every combination of grouping values
//! - Group means, standard errors, threshold percentages and block averages
//! - Window averages over time-frequency grids
//! - Long-to-short-fat conversion with first-occurrence recoding
//!
//! # Example
//!
//! ```no_run
//! use trial_wrangler::core::loaders::load_tabular;
//! use trial_wrangler::processors::extraction::{CombinationExtractor, Combinations};
//!
//! let table = load_tabular("trials.csv").unwrap();
//! let extractor = CombinationExtractor::default();
//! let parts = extractor
//!     .partitions(&table, &["GROUP", "RUN"], &Combinations::Distinct)
//!     .unwrap();
//! for (label, part) in &parts {
//!     println!("{label}: {} rows", part.num_rows());
//! }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod processors;

pub use config::{AggregateConfig, EegConfig, ExtractConfig, LogConfig, PivotConfig, WranglerConfig};
pub use crate::core::table::{Cell, RaggedTable, Table};
pub use error::{Error, ErrorClass, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
