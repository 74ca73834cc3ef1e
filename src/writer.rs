use crate::{
    errors::ReconError,
    models::Table,
    traits::{ReportExport, RowWrite},
};
use anyhow::{Context, Result};
use csv::{Writer, WriterBuilder};
use rust_xlsxwriter::{Workbook, Worksheet};
use serde::Serialize;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{info, warn};

/// Rows addressable in one spreadsheet sheet, header included.
pub const MAX_SPREADSHEET_ROWS: usize = 1_048_576;
const MAX_SPREADSHEET_COLUMNS: usize = 16_384;

const OUTPUT_BASE_NAME: &str = "resultado";
const RESULT_SHEET: &str = "resultado";
const SETTLEMENTS_SHEET: &str = "liquidaciones";
const CSV_DELIMITER: u8 = b';';
const UTF8_BOM: &[u8] = "\u{feff}".as_bytes();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Spreadsheet,
    DelimitedText,
}

impl OutputFormat {
    /// Picks the spreadsheet while the data rows plus the header fit in one sheet.
    pub fn for_row_count(rows: usize) -> Self {
        if rows < MAX_SPREADSHEET_ROWS {
            OutputFormat::Spreadsheet
        } else {
            OutputFormat::DelimitedText
        }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            OutputFormat::Spreadsheet => "xlsx",
            OutputFormat::DelimitedText => "csv",
        }
    }
}

/// Semicolon-separated writer over any byte sink.
pub struct CsvRowWriter<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> CsvRowWriter<W> {
    /// Writes the UTF-8 byte-order mark so spreadsheet tools pick the right encoding.
    pub fn with_bom(mut inner: W) -> Result<Self> {
        inner.write_all(UTF8_BOM)?;
        Ok(CsvRowWriter {
            writer: WriterBuilder::new()
                .delimiter(CSV_DELIMITER)
                .from_writer(inner),
        })
    }

    pub fn flush(&mut self) -> Result<()> {
        Ok(self.writer.flush()?)
    }
}

impl<W: Write> RowWrite for CsvRowWriter<W> {
    fn write_row(&mut self, row: &[Option<String>]) -> Result<()> {
        Ok(self
            .writer
            .write_record(row.iter().map(|cell| cell.as_deref().unwrap_or_default()))?)
    }
}

/// Writes rows top to bottom into one worksheet.
pub struct SheetRowWriter<'a> {
    sheet: &'a mut Worksheet,
    next_row: usize,
}

impl<'a> SheetRowWriter<'a> {
    pub fn new(sheet: &'a mut Worksheet) -> Self {
        SheetRowWriter { sheet, next_row: 0 }
    }
}

impl RowWrite for SheetRowWriter<'_> {
    fn write_row(&mut self, row: &[Option<String>]) -> Result<()> {
        let row_idx = self.next_row;
        if row_idx >= MAX_SPREADSHEET_ROWS {
            return Err(ReconError::CellOutOfRange {
                row: row_idx,
                column: 0,
            })?;
        }
        for (col_idx, cell) in row.iter().enumerate() {
            let Some(value) = cell else { continue };
            if col_idx >= MAX_SPREADSHEET_COLUMNS {
                return Err(ReconError::CellOutOfRange {
                    row: row_idx,
                    column: col_idx,
                })?;
            }
            self.sheet
                .write_string(row_idx as u32, col_idx as u16, value)?;
        }
        self.next_row += 1;
        Ok(())
    }
}

/// Writes the header followed by every row of `table`.
pub fn write_table(table: &Table, writer: &mut impl RowWrite) -> Result<()> {
    let header: Vec<Option<String>> = table.columns().iter().cloned().map(Some).collect();
    writer.write_row(&header)?;
    for row in table.rows() {
        writer.write_row(row)?;
    }
    Ok(())
}

/// First `resultado_<n>` path in `dir` not taken by a previous run in either format.
pub fn next_output_path(dir: &Path, format: OutputFormat) -> PathBuf {
    let mut counter = 1usize;
    loop {
        let stem = format!("{OUTPUT_BASE_NAME}_{counter}");
        let taken = [OutputFormat::Spreadsheet, OutputFormat::DelimitedText]
            .iter()
            .any(|f| dir.join(format!("{stem}.{}", f.extension())).exists());
        if !taken {
            return dir.join(format!("{stem}.{}", format.extension()));
        }
        counter += 1;
    }
}

pub fn write_delimited(path: &Path, table: &Table) -> Result<()> {
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut writer = CsvRowWriter::with_bom(BufWriter::new(file))?;
    write_table(table, &mut writer)?;
    writer.flush()
}

/// Writes the result and settlement sheets; fails before saving when either
/// table does not fit in one sheet.
pub fn write_workbook(path: &Path, result: &Table, settlements: &Table) -> Result<()> {
    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet().set_name(RESULT_SHEET)?;
        write_table(result, &mut SheetRowWriter::new(sheet))?;
    }
    let sheet = workbook.add_worksheet().set_name(SETTLEMENTS_SHEET)?;
    write_table(settlements, &mut SheetRowWriter::new(sheet))?;

    workbook
        .save(path)
        .with_context(|| format!("cannot save {}", path.display()))?;
    Ok(())
}

/// Writes reports into a directory, never overwriting an earlier run.
pub struct FileExporter {
    out_dir: PathBuf,
}

impl FileExporter {
    pub fn new(out_dir: PathBuf) -> Self {
        FileExporter { out_dir }
    }
}

impl ReportExport for FileExporter {
    fn export(&self, result: &Table, settlements: &Table) -> Result<(PathBuf, OutputFormat)> {
        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("cannot create {}", self.out_dir.display()))?;

        let format = OutputFormat::for_row_count(result.len());
        let path = next_output_path(&self.out_dir, format);
        match format {
            OutputFormat::Spreadsheet => write_workbook(&path, result, settlements)?,
            OutputFormat::DelimitedText => {
                warn!(
                    rows = result.len(),
                    "result exceeds the spreadsheet row limit, writing CSV without settlements"
                );
                write_delimited(&path, result)?
            }
        }

        info!(path = %path.display(), ?format, "report written");
        Ok((path, format))
    }
}
