//! In-memory columnar dataset loaded from CSV.
//!
//! Columns are typed once at load time: numeric when every present cell
//! parses as a number, categorical otherwise. Missing cells are `NaN` in
//! numeric columns and `None` in categorical ones.

mod parse;

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub use parse::MISSING_TOKENS;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed CSV in {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("{path} has no header row")]
    EmptyHeader { path: PathBuf },
    #[error("{path} has no data rows")]
    NoRows { path: PathBuf },
    #[error("{path} has duplicate column name {name}")]
    DuplicateColumn { path: PathBuf, name: String },
}

/// Typed column values.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// Real values; missing cells are `NaN`.
    Numeric(Vec<f64>),
    /// Level codes into `levels` (sorted); missing cells are `None`.
    Categorical {
        levels: Vec<String>,
        codes: Vec<Option<u32>>,
    },
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(values) => values.len(),
            ColumnData::Categorical { codes, .. } => codes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value of a row as a real number; categorical rows yield their code.
    pub fn value_f64(&self, row: usize) -> f64 {
        match self {
            ColumnData::Numeric(values) => values[row],
            ColumnData::Categorical { codes, .. } => {
                codes[row].map(|code| code as f64).unwrap_or(f64::NAN)
            }
        }
    }

    /// Whether the row holds a missing cell.
    pub fn is_missing(&self, row: usize) -> bool {
        match self {
            ColumnData::Numeric(values) => values[row].is_nan(),
            ColumnData::Categorical { codes, .. } => codes[row].is_none(),
        }
    }

    /// Levels of a categorical column.
    pub fn levels(&self) -> Option<&[String]> {
        match self {
            ColumnData::Numeric(_) => None,
            ColumnData::Categorical { levels, .. } => Some(levels),
        }
    }
}

/// Named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

/// Columnar dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Frame key, derived from the source file name.
    pub name: String,
    columns: Vec<Column>,
    rows: usize,
}

impl Frame {
    /// Build a frame from already typed columns of equal length.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        let rows = columns.first().map(|col| col.data.len()).unwrap_or(0);
        debug_assert!(columns.iter().all(|col| col.data.len() == rows));
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in file order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|col| col.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|col| col.name == name)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let categorical = self
            .columns
            .iter()
            .filter(|col| matches!(col.data, ColumnData::Categorical { .. }))
            .count();
        write!(
            f,
            "Frame {} ({} rows x {} cols, {} categorical)",
            self.name,
            self.rows,
            self.columns.len(),
            categorical
        )
    }
}
