#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Writing computed scores back into an LMS gradebook export.
//!
//! The roster layout is: header row, muted-flag row, points-possible row,
//! then one row per student.

use std::{collections::HashMap, fs, path::Path};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{info, warn};

use crate::{error::HarnessError, score::SubmissionResult};

/// Value forced into the muted row for the graded assignment.
pub const MUTED_MARKER: &str = "Muted";

/// File name of the copy taken before the roster is overwritten.
pub const BACKUP_FILE_NAME: &str = "grades_backup.csv";

/// Index of the muted-flag row.
const MUTED_ROW: usize = 1;

/// Index of the points-possible row.
const POINTS_ROW: usize = 2;

/// First student row.
const FIRST_STUDENT_ROW: usize = 3;

/// A roster after scores were merged in.
#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    /// Every row, every column, with only the target column changed.
    pub rows:       Vec<Vec<String>>,
    /// Index of the assignment column.
    pub column:     usize,
    /// Points possible for the assignment.
    pub max_points: f64,
    /// Names of students who had no graded submission.
    pub unmatched:  Vec<String>,
}

impl Merged {
    /// Keeps the first `leading` columns plus the assignment column, which is
    /// the shape an LMS import expects.
    pub fn projected(&self, leading: usize) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                let mut out: Vec<String> = row.iter().take(leading).cloned().collect();
                out.push(row.get(self.column).cloned().unwrap_or_default());
                out
            })
            .collect()
    }
}

/// Finds the column whose header is `<assignment> (<digits>)`.
pub fn find_assignment_column(header: &[String], assignment: &str) -> Result<usize, HarnessError> {
    let pattern = Regex::new(&format!(r"^{} \(\d+\)$", regex::escape(assignment)))
        .map_err(|_| HarnessError::AssignmentColumnNotFound(assignment.to_string()))?;
    header
        .iter()
        .position(|cell| pattern.is_match(cell.trim()))
        .ok_or_else(|| HarnessError::AssignmentColumnNotFound(assignment.to_string()))
}

/// Renders a score the way the gradebook expects, always with a decimal
/// point.
pub fn format_score(score: f64) -> String {
    format!("{score:?}")
}

/// Sets `row[column]`, padding short rows with empty cells.
fn set_cell(row: &mut Vec<String>, column: usize, value: String) {
    if row.len() <= column {
        row.resize(column + 1, String::new());
    }
    row[column] = value;
}

/// Writes each matched student's score into the assignment column.
///
/// `student_ids` maps roster ids to submission names, `results` maps
/// submission names to their results, and `id_column` is where the roster
/// keeps the id. Students without a graded submission keep their existing
/// cell and are listed in [`Merged::unmatched`].
pub fn merge(
    rows: &[Vec<String>],
    assignment: &str,
    student_ids: &HashMap<String, String>,
    results: &HashMap<String, SubmissionResult>,
    id_column: usize,
) -> Result<Merged, HarnessError> {
    if rows.len() < FIRST_STUDENT_ROW {
        return Err(HarnessError::RosterTooShort(rows.len()));
    }

    let column = find_assignment_column(&rows[0], assignment)?;
    let mut rows = rows.to_vec();

    set_cell(&mut rows[MUTED_ROW], column, MUTED_MARKER.to_string());

    let points_cell = rows[POINTS_ROW].get(column).cloned().unwrap_or_default();
    let max_points: f64 = points_cell
        .trim()
        .parse()
        .map_err(|_| HarnessError::InvalidMaxPoints(points_cell.clone()))?;

    let mut unmatched = Vec::new();
    for row in rows.iter_mut().skip(FIRST_STUDENT_ROW) {
        let result = row
            .get(id_column)
            .and_then(|id| student_ids.get(id.trim()))
            .and_then(|name| results.get(name));

        match result {
            Some(result) => {
                let score = result.percent * max_points / 100.0;
                set_cell(row, column, format_score(score));
            }
            None => {
                let student = row.first().cloned().unwrap_or_default();
                warn!("{student} had no submission for this assignment.");
                unmatched.push(student);
            }
        }
    }

    Ok(Merged {
        rows,
        column,
        max_points,
        unmatched,
    })
}

/// Reads a roster CSV without interpreting any row as a header.
pub fn read_roster(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Could not open roster {}", path.display()))?;

    reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_owned).collect::<Vec<String>>())
                .with_context(|| format!("Could not parse roster {}", path.display()))
        })
        .collect()
}

/// Writes rows as CSV.
pub fn write_roster(path: &Path, rows: &[Vec<String>]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Could not create {}", path.display()))?;
    for row in rows {
        writer
            .write_record(row)
            .with_context(|| format!("Could not write {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("Could not write {}", path.display()))
}

/// Backs up the roster, merges scores, and overwrites it with the projected
/// table.
pub fn update_gradebook(
    path: &Path,
    assignment: &str,
    student_ids: &HashMap<String, String>,
    results: &HashMap<String, SubmissionResult>,
    id_column: usize,
    leading_columns: usize,
) -> Result<Merged> {
    let backup = path.with_file_name(BACKUP_FILE_NAME);
    fs::copy(path, &backup).with_context(|| {
        format!("Could not back up {} to {}", path.display(), backup.display())
    })?;

    let rows = read_roster(&backup)?;
    let merged = merge(&rows, assignment, student_ids, results, id_column)?;
    write_roster(path, &merged.projected(leading_columns))?;

    info!(
        "Updated {} ({} unmatched student(s), backup at {})",
        path.display(),
        merged.unmatched.len(),
        backup.display()
    );
    Ok(merged)
}
