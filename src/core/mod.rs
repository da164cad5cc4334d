//! Core data types and I/O operations.

pub mod grid;
pub mod loaders;
pub mod record;
pub mod table;
pub mod writers;

pub use grid::{Axis, Grid, GridError, Window};
pub use loaders::{load_delimited, load_tabular, load_tabular_many, LoaderError};
pub use record::AggregateTable;
pub use table::{Cell, RaggedTable, Table, TableError};
pub use writers::{
    write_aggregate_csv, write_keyed_csv, write_partitions, write_ragged_csv, write_table_csv,
    WriteError,
};
