use crate::error::PipelineError;
use crate::types::{FILENAME_COLUMN, MAKE_COLUMN, MODEL_COLUMN, PLATE_COLUMN};
use calamine::{open_workbook, Data, Reader, Xlsx};
use log::{debug, info};
use std::path::Path;

/// One row of a truth or predicted table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlateRow {
    pub filename: String,
    pub plate: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
}

pub type TruthRecord = PlateRow;
pub type PredictedRecord = PlateRow;

/// Truth labels may omit the extension; `12` and `12.jpg` name the same image.
pub fn canonical_filename(raw: &str) -> String {
    let name = raw.trim();
    if name.ends_with(".jpg") {
        name.to_string()
    } else {
        format!("{}.jpg", name)
    }
}

pub fn load_truth(path: &Path, row_limit: usize) -> Result<Vec<TruthRecord>, failure::Error> {
    let mut rows = load_rows(path, row_limit)?;
    for row in &mut rows {
        row.filename = canonical_filename(&row.filename);
    }
    Ok(rows)
}

pub fn load_predicted(
    path: &Path,
    row_limit: usize,
) -> Result<Vec<PredictedRecord>, failure::Error> {
    let mut rows = load_rows(path, row_limit)?;
    for row in &mut rows {
        row.filename = row.filename.trim().to_string();
    }
    Ok(rows)
}

/// Reads the first worksheet of `path`, locating columns by header name.
/// Only the first `row_limit` data rows are returned.
pub fn load_rows(path: &Path, row_limit: usize) -> Result<Vec<PlateRow>, failure::Error> {
    info!("Loading {}", path.display());
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PipelineError::EmptyWorkbook(path.display().to_string()))??;

    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .ok_or_else(|| PipelineError::EmptyWorkbook(path.display().to_string()))?
        .iter()
        .map(|c| cell_text(c).map(|s| s.trim().to_string()).unwrap_or_default())
        .collect();
    let column = |name: &str| {
        header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| PipelineError::MissingColumn {
                column: name.to_string(),
                path: path.display().to_string(),
            })
    };
    let filename_col = column(FILENAME_COLUMN)?;
    let plate_col = column(PLATE_COLUMN)?;
    let make_col = column(MAKE_COLUMN)?;
    let model_col = column(MODEL_COLUMN)?;

    let loaded: Vec<PlateRow> = rows
        .take(row_limit)
        .map(|row| {
            let get = |i: usize| row.get(i).and_then(cell_text);
            PlateRow {
                filename: get(filename_col).unwrap_or_default(),
                plate: get(plate_col),
                make: get(make_col),
                model: get(model_col),
            }
        })
        .collect();
    debug!("Loaded {} rows from {}", loaded.len(), path.display());
    Ok(loaded)
}

/// Cell contents as text. Whole numbers lose their fractional part, so an
/// image number typed as `7` reads back as `"7"` rather than `"7.0"`.
pub fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(format!("{}", *f as i64)),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(true) => Some("True".to_string()),
        Data::Bool(false) => Some("False".to_string()),
        other => Some(other.to_string()),
    }
}
