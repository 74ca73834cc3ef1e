use std::{collections::HashMap, fmt};

use getset::Getters;
use serde::Serialize;

/// Column stamped on every loaded row with the name of the file it came from.
pub const PROVENANCE_COLUMN: &str = "__archivo_origen__";
/// Column carrying the detected INSALÉS schema variant.
pub const VARIANT_COLUMN: &str = "__tipo_insales__";
/// Column carrying the detected settlement processor.
pub const SOURCE_COLUMN: &str = "__fuente__";
/// Final column of the reconciled table.
pub const STATUS_COLUMN: &str = "Conciliacion";

/// Literal values that stand for "no value" once a cell has been stringified.
const NULL_SENTINELS: [&str; 3] = ["", "nan", "None"];

pub type Row = Vec<Option<String>>;

/// An ordered set of named columns and the rows aligned with them.
///
/// Every row always has exactly `columns().len()` cells; a `None` cell is a
/// null value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters)]
pub struct Table {
    #[getset(get = "pub")]
    columns: Vec<String>,
    #[getset(get = "pub")]
    rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn from_rows(columns: Vec<String>, rows: Vec<Row>) -> Self {
        let mut table = Table::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    /// Appends a row, padding it with nulls (or cutting it) to the column count.
    pub fn push_row(&mut self, mut row: Row) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn value(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column)?.as_deref()
    }

    /// Values of the named column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<Option<&str>>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[idx].as_deref()).collect())
    }

    /// Replaces the values of `name`, appending the column if it does not exist.
    pub fn set_column(&mut self, name: &str, values: Vec<Option<String>>) {
        debug_assert_eq!(values.len(), self.rows.len());
        let idx = match self.column_index(name) {
            Some(idx) => idx,
            None => {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    row.push(None);
                }
                self.columns.len() - 1
            }
        };
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[idx] = value;
        }
    }

    /// Sets every row of `name` to the same value.
    pub fn fill_column(&mut self, name: &str, value: &str) {
        let values = vec![Some(value.to_string()); self.rows.len()];
        self.set_column(name, values);
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.column_index(from) {
            Some(idx) => {
                self.columns[idx] = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Rewrites every header through `rename`.
    ///
    /// Headers that end up with the same name are merged into the first of
    /// them; per row the first non-blank value wins.
    pub fn rename_headers(&mut self, rename: impl Fn(&str) -> String) {
        let mut columns: Vec<String> = Vec::with_capacity(self.columns.len());
        let mut targets: Vec<usize> = Vec::with_capacity(self.columns.len());
        let mut seen: HashMap<String, usize> = HashMap::new();

        for column in &self.columns {
            let name = rename(column);
            let target = *seen.entry(name.clone()).or_insert_with(|| {
                columns.push(name);
                columns.len() - 1
            });
            targets.push(target);
        }

        if columns.len() < self.columns.len() {
            for row in &mut self.rows {
                let mut merged: Row = vec![None; columns.len()];
                for (value, &target) in row.drain(..).zip(&targets) {
                    if is_blank(&merged[target]) && !is_blank(&value) {
                        merged[target] = value;
                    }
                }
                *row = merged;
            }
        }
        self.columns = columns;
    }

    /// Stacks tables on top of each other, matching columns by name.
    ///
    /// The result has the union of all columns in first-appearance order;
    /// cells for columns a table does not have are null.
    pub fn union(tables: Vec<Table>) -> Table {
        let mut columns: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for table in &tables {
            for column in &table.columns {
                if !positions.contains_key(column) {
                    positions.insert(column.clone(), columns.len());
                    columns.push(column.clone());
                }
            }
        }

        let width = columns.len();
        let mut union = Table::new(columns);
        for table in tables {
            let targets: Vec<usize> = table.columns.iter().map(|c| positions[c]).collect();
            for row in table.rows {
                let mut aligned: Row = vec![None; width];
                for (value, &target) in row.into_iter().zip(&targets) {
                    aligned[target] = value;
                }
                union.rows.push(aligned);
            }
        }
        union
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Row>) {
        (self.columns, self.rows)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

/// A usable join key: trimmed, non-empty and not a stringified null.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JoinKey(String);

impl JoinKey {
    /// Canonicalizes a raw cell into a key, or `None` when it cannot match anything.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let trimmed = raw?.trim();
        if NULL_SENTINELS.contains(&trimmed) {
            return None;
        }
        Some(JoinKey(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JoinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Column-layout families of INSALÉS order exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrderVariant {
    #[serde(rename = "Version Flex Ventas")]
    VentasFlex,
    #[serde(rename = "Intermedio")]
    Intermedio,
    #[serde(rename = "Version Flex Digital")]
    DigitalFlex,
    #[serde(rename = "Desconocido")]
    Unknown,
}

impl OrderVariant {
    pub const fn label(self) -> &'static str {
        match self {
            Self::VentasFlex => "Version Flex Ventas",
            Self::Intermedio => "Intermedio",
            Self::DigitalFlex => "Version Flex Digital",
            Self::Unknown => "Desconocido",
        }
    }
}

impl fmt::Display for OrderVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Payment processors whose settlement exports are recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SettlementSource {
    #[serde(rename = "YUNO")]
    Yuno,
    #[serde(rename = "NUBCEO")]
    Nubceo,
    #[serde(rename = "Desconocido")]
    Unknown,
}

impl SettlementSource {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Yuno => "YUNO",
            Self::Nubceo => "NUBCEO",
            Self::Unknown => "Desconocido",
        }
    }
}

impl fmt::Display for SettlementSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    #[serde(rename = "OK")]
    Matched,
    #[serde(rename = "No Encontrado")]
    Unmatched,
}

impl Status {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Matched => "OK",
            Self::Unmatched => "No Encontrado",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
