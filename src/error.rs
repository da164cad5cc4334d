//! Crate-wide error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::core::grid::GridError;
use crate::core::loaders::LoaderError;
use crate::core::table::TableError;
use crate::core::writers::WriteError;
use crate::processors::aggregation::AggregateError;
use crate::processors::extraction::ExtractError;
use crate::processors::pivot::PivotError;

/// Broad category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller asked for something that cannot exist: unknown columns or
    /// values, bad axes, too few labels or names.
    Configuration,
    /// The input data is malformed or too sparse for the requested statistic.
    Data,
    /// A sanity check on the data's shape failed.
    Assertion,
    /// Writing results failed.
    Io,
}

/// Any error raised by the library.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoaderError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error(transparent)]
    Pivot(#[from] PivotError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type using the crate error.
pub type Result<T> = std::result::Result<T, Error>;

fn extract_class(_: &ExtractError) -> ErrorClass {
    ErrorClass::Configuration
}

fn aggregate_class(err: &AggregateError) -> ErrorClass {
    match err {
        AggregateError::UnexpectedBlockSize { .. } => ErrorClass::Assertion,
        AggregateError::InvalidBlockCount(_) | AggregateError::Grid(_) => {
            ErrorClass::Configuration
        }
        AggregateError::Extract(e) => extract_class(e),
        AggregateError::CoordinateNotFound { .. }
        | AggregateError::EmptyGroup
        | AggregateError::WindowOutOfBounds { .. }
        | AggregateError::NonNumeric { .. } => ErrorClass::Data,
    }
}

impl Error {
    /// Classify the error as configuration, data, assertion or I/O.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Load(LoaderError::OutOfRangeSection { .. })
            | Error::Load(LoaderError::DuplicateSection(_)) => ErrorClass::Configuration,
            Error::Load(_) | Error::Table(_) => ErrorClass::Data,
            Error::Grid(_) | Error::Config(_) => ErrorClass::Configuration,
            Error::Extract(e) => extract_class(e),
            Error::Aggregate(e) => aggregate_class(e),
            Error::Pivot(PivotError::Extract(e)) => extract_class(e),
            Error::Pivot(PivotError::RecodeMismatch { .. }) => ErrorClass::Configuration,
            Error::Pivot(PivotError::NestOrder { .. }) => ErrorClass::Configuration,
            Error::Pivot(PivotError::Table(_)) => ErrorClass::Data,
            Error::Write(_) => ErrorClass::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let unknown: Error = ExtractError::UnknownColumn("RUN".to_string()).into();
        assert_eq!(unknown.class(), ErrorClass::Configuration);

        let empty: Error = AggregateError::EmptyGroup.into();
        assert_eq!(empty.class(), ErrorClass::Data);

        let block: Error = AggregateError::UnexpectedBlockSize {
            block: 0,
            expected: 40,
            found: 39,
        }
        .into();
        assert_eq!(block.class(), ErrorClass::Assertion);

        let section: Error = LoaderError::OutOfRangeSection {
            line: 9,
            section: 2,
            labels: 2,
        }
        .into();
        assert_eq!(section.class(), ErrorClass::Configuration);

        let nested: Error = AggregateError::Extract(ExtractError::UnknownColumn("x".into())).into();
        assert_eq!(nested.class(), ErrorClass::Configuration);
    }

    #[test]
    fn test_error_message_is_transparent() {
        let err: Error = ExtractError::UnknownColumn("RUN".to_string()).into();
        assert_eq!(err.to_string(), "unknown column: RUN");
    }
}
