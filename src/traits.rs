use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::{models::Table, writer::OutputFormat};

/// RowWrite trait provides a method to write one table row to an output sink.
pub trait RowWrite {
    /// Writes a row of cells.
    ///
    /// # Arguments
    /// * `row` - The cells to write; `None` is written as an empty cell.
    ///
    /// # Returns
    /// A Result indicating success or failure.
    fn write_row(&mut self, row: &[Option<String>]) -> Result<()>;
}

/// TableLoad trait provides a method to load every input file of a directory as one table.
pub trait TableLoad {
    /// Loads and unions the tabular files found in `dir`.
    ///
    /// # Arguments
    /// * `dir` - The directory to scan.
    ///
    /// # Returns
    /// The unioned table, or an error when no file could be loaded.
    fn load(&self, dir: &Path) -> Result<Table>;
}

/// ReportExport trait provides a method to persist a reconciliation.
pub trait ReportExport {
    /// Exports the reconciled orders and the settlements they were matched against.
    ///
    /// # Arguments
    /// * `result` - The reconciled order table.
    /// * `settlements` - The settlement table.
    ///
    /// # Returns
    /// The path of the written file and the format it was written in.
    fn export(&self, result: &Table, settlements: &Table) -> Result<(PathBuf, OutputFormat)>;
}
