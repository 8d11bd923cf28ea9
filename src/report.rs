use crate::config::EvaluationConfig;
use crate::loader::{load_predicted, load_truth};
use crate::matcher::{evaluate, FieldComparison, MatchReport, Tally};
use crate::writer::{self, table_bytes, Cell};
use log::{info, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const REPORT_FILE: &str = "evaluation_results_new.xlsx";
pub const BACKUP_REPORT_FILE: &str = "evaluation_results_backup.xlsx";

/// Column layout of the comparison sheet. The two blank-looking headers are
/// spacer columns between field groups.
pub const REPORT_HEADERS: [&str; 12] = [
    "Image Number (Filename)",
    "License Plate (Truth)",
    "License Plate (Plate Recognizer)",
    "License Plate Match",
    "",
    "Make (Truth)",
    "Make (Plate Recognizer)",
    "Make Match",
    " ",
    "Model (Truth)",
    "Model (Plate Recognizer)",
    "Model Match",
];

fn field_cells(field: &FieldComparison) -> [Cell; 3] {
    let text = |v: &Option<String>| Cell::Text(v.clone().unwrap_or_default());
    [
        text(&field.truth),
        text(&field.predicted),
        Cell::Bool(field.matched),
    ]
}

pub fn report_rows(report: &MatchReport) -> Vec<Vec<Cell>> {
    report
        .rows
        .iter()
        .map(|row| {
            let mut cells = vec![Cell::Text(row.filename.clone())];
            cells.extend(field_cells(&row.plate).iter().cloned());
            cells.push(Cell::Text(String::new()));
            cells.extend(field_cells(&row.make).iter().cloned());
            cells.push(Cell::Text(String::new()));
            cells.extend(field_cells(&row.model).iter().cloned());
            cells
        })
        .collect()
}

pub fn summary_lines(report: &MatchReport) -> Vec<String> {
    let line = |label: &str, tally: Tally| {
        format!("{} Matches: {} out of {}", label, tally.matched, tally.total)
    };
    vec![
        line("License Plate", report.plate),
        line("Make", report.make),
        line("Model", report.model),
    ]
}

/// Writes the comparison sheet to `output_dir`. If the primary file cannot
/// be written because access is denied (typically it is open elsewhere),
/// the backup name is used instead.
pub fn write_report(report: &MatchReport, output_dir: &Path) -> Result<PathBuf, failure::Error> {
    writer::create_dir(output_dir)?;
    let bytes = table_bytes(&REPORT_HEADERS, &report_rows(report))?;
    let primary = output_dir.join(REPORT_FILE);
    match fs::write(&primary, &bytes) {
        Ok(()) => {
            info!("Evaluation saved to {}", primary.display());
            Ok(primary)
        }
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            warn!(
                "Could not save {}: {}; close any open spreadsheet and try again",
                primary.display(),
                e
            );
            let backup = output_dir.join(BACKUP_REPORT_FILE);
            fs::write(&backup, &bytes)?;
            info!("Evaluation saved to {} instead", backup.display());
            Ok(backup)
        }
        Err(e) => Err(e.into()),
    }
}

/// Loads both tables and scores them. Nothing is written.
pub fn score(config: &EvaluationConfig) -> Result<MatchReport, failure::Error> {
    let predicted = load_predicted(&config.predicted, config.row_limit)?;
    let truth = load_truth(&config.truth, config.row_limit)?;
    let report = evaluate(&truth, &predicted);
    info!("Number of rows after merge: {}", report.rows.len());
    Ok(report)
}

pub fn run_evaluation(config: &EvaluationConfig) -> Result<(MatchReport, PathBuf), failure::Error> {
    let report = score(config)?;
    let path = write_report(&report, &config.output_dir)?;
    Ok((report, path))
}
