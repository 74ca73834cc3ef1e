use crate::{
    errors::ReconError,
    models::{PROVENANCE_COLUMN, Row, Table},
    traits::TableLoad,
};
use anyhow::{Context, Result, anyhow};
use calamine::{Data, Reader, open_workbook_auto};
use csv::ReaderBuilder;
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

const SUPPORTED_EXTENSIONS: [&str; 3] = ["csv", "xls", "xlsx"];
/// Office lock files left next to an open workbook.
const LOCK_FILE_PREFIX: &str = "~$";
const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];
const SNIFF_LINES: usize = 10;

/// Loads every supported file of a directory and unions them into one table.
///
/// A file that fails to parse is logged and skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryLoader;

impl DirectoryLoader {
    pub fn new() -> Self {
        DirectoryLoader
    }
}

impl TableLoad for DirectoryLoader {
    fn load(&self, dir: &Path) -> Result<Table> {
        let files = list_input_files(dir)?;

        let mut tables = Vec::with_capacity(files.len());
        for path in &files {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match read_table(path) {
                Ok(mut table) => {
                    if table.is_empty() {
                        warn!(file = %name, "file has a header but no rows");
                    }
                    table.fill_column(PROVENANCE_COLUMN, &name);
                    info!(file = %name, rows = table.len(), "file loaded");
                    tables.push(table);
                }
                Err(err) => {
                    let error = format!("{err:#}");
                    warn!(file = %name, %error, "skipping unreadable file");
                }
            }
        }

        if tables.is_empty() {
            return Err(ReconError::NoReadableFiles(dir.to_path_buf()))?;
        }
        info!(dir = %dir.display(), files = tables.len(), "files combined");
        Ok(Table::union(tables))
    }
}

/// Supported files of `dir`, sorted by name.
pub fn list_input_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("cannot read directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && is_supported(&path) {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(ReconError::NoInputFiles(dir.to_path_buf()))?;
    }
    files.sort();
    Ok(files)
}

fn is_supported(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with(LOCK_FILE_PREFIX) {
        return false;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)))
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

pub fn read_table(path: &Path) -> Result<Table> {
    if is_csv(path) {
        let bytes = fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
        let content = String::from_utf8(bytes).context("file is not valid UTF-8")?;
        parse_csv(&content)
    } else {
        read_spreadsheet(path)
    }
}

/// Parses delimited text with a sniffed delimiter, keeping every value as text.
///
/// Rows with more fields than the header are dropped; shorter rows are padded
/// with nulls.
pub fn parse_csv(content: &str) -> Result<Table> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let delimiter = sniff_delimiter(content);

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = unique_headers(reader.headers()?.iter().map(str::to_string).collect());
    let width = headers.len();
    let mut table = Table::new(headers);

    let mut skipped = 0usize;
    for record in reader.records() {
        let record = record?;
        if record.len() > width {
            skipped += 1;
            continue;
        }
        table.push_row(record.iter().map(text_cell).collect());
    }
    if skipped > 0 {
        debug!(skipped, "rows with extra fields skipped");
    }
    Ok(table)
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// The candidate producing the same field count (>1) on the most lines wins,
/// with wider rows breaking ties. Falls back to a comma.
fn sniff_delimiter(content: &str) -> u8 {
    let sample: Vec<&str> = content.lines().take(SNIFF_LINES).collect();

    let mut best = b',';
    let mut best_score = 0usize;
    for &delimiter in &DELIMITER_CANDIDATES {
        let counts: Vec<usize> = sample
            .iter()
            .map(|line| {
                ReaderBuilder::new()
                    .delimiter(delimiter)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map_or(1, |r| r.len())
            })
            .collect();

        let Some(&target) = counts.first() else { continue };
        if target <= 1 {
            continue;
        }
        let score = counts.iter().filter(|&&c| c == target).count() * target;
        if score > best_score {
            best_score = score;
            best = delimiter;
        }
    }
    best
}

fn text_cell(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Names blank headers `Unnamed: <index>` and suffixes repeats with `.1`, `.2`, ...
fn unique_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    raw.into_iter()
        .enumerate()
        .map(|(idx, header)| {
            let header = if header.trim().is_empty() {
                format!("Unnamed: {idx}")
            } else {
                header
            };
            let count = seen.entry(header.clone()).or_insert(0);
            let name = if *count == 0 {
                header
            } else {
                format!("{header}.{count}")
            };
            *count += 1;
            name
        })
        .collect()
}

/// Reads the first worksheet; its first row is the header.
fn read_spreadsheet(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("cannot open workbook {}", path.display()))?;
    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("workbook has no sheets"))?;
    let range = workbook
        .worksheet_range(&first)
        .with_context(|| format!("cannot read sheet '{first}'"))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Table::default());
    };
    let headers = unique_headers(
        header
            .iter()
            .map(|cell| sheet_cell(cell).unwrap_or_default())
            .collect(),
    );

    let mut table = Table::new(headers);
    for row in rows {
        let row: Row = row.iter().map(sheet_cell).collect();
        if row.iter().all(Option::is_none) {
            continue;
        }
        table.push_row(row);
    }
    Ok(table)
}

fn sheet_cell(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => text_cell(s),
        // ids stored as numbers must compare equal to their text form
        Data::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
        Data::Float(n) => Some(n.to_string()),
        Data::Int(n) => Some(n.to_string()),
        Data::Bool(b) => Some(if *b { "True" } else { "False" }.to_string()),
        Data::Error(e) => Some(e.to_string()),
        Data::DateTime(dt) => Some(
            dt.as_datetime()
                .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| dt.as_f64().to_string()),
        ),
        Data::DateTimeIso(s) | Data::DurationIso(s) => text_cell(s),
    }
}
