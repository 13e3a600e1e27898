use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::{Column, ColumnData, Frame, FrameError};

/// Cell contents (after trimming) treated as missing.
pub const MISSING_TOKENS: [&str; 5] = ["", "NA", "N/A", "NaN", "nan"];

impl Frame {
    /// Parse a CSV file with a header row.
    pub fn from_csv_path(path: &Path) -> Result<Frame, FrameError> {
        let file = File::open(path).map_err(|source| FrameError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("frame")
            .to_string();
        Self::from_csv_reader(name, BufReader::new(file), path)
    }

    /// Parse CSV from any reader; `path` is only used in error messages.
    pub fn from_csv_reader<R: Read>(
        name: String,
        reader: R,
        path: &Path,
    ) -> Result<Frame, FrameError> {
        let csv_error = |source| FrameError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers: Vec<String> = rdr
            .headers()
            .map_err(csv_error)?
            .iter()
            .map(|h| h.to_string())
            .collect();
        if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
            return Err(FrameError::EmptyHeader {
                path: path.to_path_buf(),
            });
        }
        let mut seen = HashSet::new();
        for header in &headers {
            if !seen.insert(header.as_str()) {
                return Err(FrameError::DuplicateColumn {
                    path: path.to_path_buf(),
                    name: header.clone(),
                });
            }
        }

        let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
        for record in rdr.records() {
            let record = record.map_err(csv_error)?;
            for (idx, cells) in raw.iter_mut().enumerate() {
                let cell = record.get(idx).unwrap_or("");
                cells.push(if is_missing_token(cell) {
                    None
                } else {
                    Some(cell.to_string())
                });
            }
        }
        if raw.first().is_none_or(|cells| cells.is_empty()) {
            return Err(FrameError::NoRows {
                path: path.to_path_buf(),
            });
        }

        let columns = headers
            .into_iter()
            .zip(raw)
            .map(|(name, cells)| Column {
                name,
                data: infer_column(cells),
            })
            .collect();
        Ok(Frame::new(name, columns))
    }
}

fn is_missing_token(cell: &str) -> bool {
    MISSING_TOKENS.contains(&cell.trim())
}

fn infer_column(cells: Vec<Option<String>>) -> ColumnData {
    let parsed: Option<Vec<f64>> = cells
        .iter()
        .map(|cell| match cell {
            None => Some(f64::NAN),
            Some(text) => text.parse::<f64>().ok().filter(|v| v.is_finite()),
        })
        .collect();
    if let Some(values) = parsed {
        return ColumnData::Numeric(values);
    }

    let mut level_index: BTreeMap<String, u32> = cells
        .iter()
        .flatten()
        .map(|level| (level.clone(), 0))
        .collect();
    for (code, slot) in level_index.values_mut().enumerate() {
        *slot = code as u32;
    }
    let codes = cells
        .iter()
        .map(|cell| cell.as_ref().and_then(|level| level_index.get(level).copied()))
        .collect();
    ColumnData::Categorical {
        levels: level_index.into_keys().collect(),
        codes,
    }
}
