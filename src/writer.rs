use crate::types::{
    BatchResult, ExtractedRecord, FILENAME_COLUMN, MAKE_COLUMN, MODEL_COLUMN, PLATE_COLUMN,
};
use log::info;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const FULL_RESPONSES_FILE: &str = "full_responses.json";
pub const RECORDS_XLSX_FILE: &str = "recognized_plates.xlsx";
pub const RECORDS_JSON_FILE: &str = "recognized_plates.json";

/// One spreadsheet cell. `Blank` leaves the cell empty.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Bool(bool),
    Blank,
}

impl From<&Option<String>> for Cell {
    fn from(value: &Option<String>) -> Self {
        match value {
            Some(s) => Cell::Text(s.clone()),
            None => Cell::Blank,
        }
    }
}

/// Renders a single-sheet workbook with a bold header row.
pub fn table_bytes(headers: &[&str], rows: &[Vec<Cell>]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    {
        let bold = Format::new().set_bold();
        let sheet = workbook.add_worksheet();
        for (col, header) in headers.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *header, &bold)?;
        }
        for (i, row) in rows.iter().enumerate() {
            let r = (i + 1) as u32;
            for (col, cell) in row.iter().enumerate() {
                match cell {
                    Cell::Text(s) => {
                        sheet.write_string(r, col as u16, s.as_str())?;
                    }
                    Cell::Bool(b) => {
                        sheet.write_boolean(r, col as u16, *b)?;
                    }
                    Cell::Blank => {}
                }
            }
        }
    }
    workbook.save_to_buffer()
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), failure::Error> {
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, value)?;
    out.flush()?;
    Ok(())
}

pub fn record_rows(records: &[ExtractedRecord]) -> Vec<Vec<Cell>> {
    records
        .iter()
        .map(|r| {
            vec![
                Cell::Text(r.filename.clone()),
                Cell::from(&r.plate),
                Cell::from(&r.make),
                Cell::from(&r.model),
            ]
        })
        .collect()
}

pub fn write_records_xlsx(path: &Path, records: &[ExtractedRecord]) -> Result<(), failure::Error> {
    let headers = [FILENAME_COLUMN, PLATE_COLUMN, MAKE_COLUMN, MODEL_COLUMN];
    let bytes = table_bytes(&headers, &record_rows(records))?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Where a batch ended up on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedPaths {
    pub full_responses: PathBuf,
    pub excel: PathBuf,
    pub json: PathBuf,
}

pub struct ResultWriter {
    excel_dir: PathBuf,
    json_dir: PathBuf,
}

impl ResultWriter {
    pub fn new(excel_dir: impl Into<PathBuf>, json_dir: impl Into<PathBuf>) -> Self {
        ResultWriter {
            excel_dir: excel_dir.into(),
            json_dir: json_dir.into(),
        }
    }

    pub fn save(&self, batch: &BatchResult) -> Result<SavedPaths, failure::Error> {
        create_dir(&self.excel_dir)?;
        create_dir(&self.json_dir)?;

        let paths = SavedPaths {
            full_responses: self.json_dir.join(FULL_RESPONSES_FILE),
            excel: self.excel_dir.join(RECORDS_XLSX_FILE),
            json: self.json_dir.join(RECORDS_JSON_FILE),
        };
        write_json(&paths.full_responses, &batch.responses)?;
        write_records_xlsx(&paths.excel, &batch.records)?;
        write_json(&paths.json, &batch.records)?;

        info!("Results saved to {}", paths.excel.display());
        info!("Results saved to {}", paths.json.display());
        info!("Full responses saved to {}", paths.full_responses.display());
        Ok(paths)
    }
}

pub fn create_dir(dir: &Path) -> io::Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir)
}
