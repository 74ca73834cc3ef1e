use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    #[error("no valid input files (.csv, .xls, .xlsx) found in {}", .0.display())]
    NoInputFiles(PathBuf),

    #[error("none of the input files in {} could be read", .0.display())]
    NoReadableFiles(PathBuf),

    #[error("no valid identifier field found in INSALÉS")]
    NoOrderKey,

    #[error("no valid identifier field found in the settlement (LIQUIDACIÓN)")]
    NoSettlementKey,

    #[error("{table}: key column '{column}' is missing")]
    MissingColumn { table: &'static str, column: String },

    #[error("value does not fit in the output sheet at row {row}, column {column}")]
    CellOutOfRange { row: usize, column: usize },
}
