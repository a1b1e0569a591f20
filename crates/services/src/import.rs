//! Import of index rows from an extracted spreadsheet.
//!
//! Rows come from the Markdown tables produced by [`crate::ingest`]. The
//! expected column order matches the export: index name, result, time, date.

use chrono::{NaiveDate, NaiveTime};
use shared::indices::{CalculationRecord, DATE_FORMAT, TIME_FORMAT};
use shared::AppState;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedRow {
    pub index_name: String,
    pub result_text: String,
    pub time: String,
    pub date: String,
}

impl ImportedRow {
    fn into_record(self) -> CalculationRecord {
        CalculationRecord {
            id: Uuid::new_v4().to_string(),
            result_text: self.result_text,
            date: self.date,
            time: self.time,
            raw_inputs: Vec::new(),
        }
    }
}

fn is_separator(cells: &[&str]) -> bool {
    cells
        .iter()
        .all(|c| !c.is_empty() && c.chars().all(|ch| ch == '-' || ch == ':'))
}

fn parse_row(line: &str) -> Option<ImportedRow> {
    let line = line.trim();
    let inner = line.strip_prefix('|')?.strip_suffix('|')?;
    let cells: Vec<&str> = inner.split('|').map(str::trim).collect();
    if cells.len() < 4 || is_separator(&cells) {
        return None;
    }
    let (name, result, time, date) = (cells[0], cells[1], cells[2], cells[3]);
    if name.is_empty() || result.is_empty() {
        return None;
    }
    // Header rows and free-form tables fail the date check.
    NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?;
    let time = match NaiveTime::parse_from_str(time, TIME_FORMAT) {
        Ok(t) => t.format(TIME_FORMAT).to_string(),
        Err(_) => "00:00".to_string(),
    };
    Some(ImportedRow {
        index_name: name.to_string(),
        result_text: result.to_string(),
        time,
        date: date.to_string(),
    })
}

/// All importable rows across every sheet of the extracted text.
pub fn parse_index_rows(extracted: &str) -> Vec<ImportedRow> {
    extracted.lines().filter_map(parse_row).collect()
}

/// Appends rows as new records, skipping exact duplicates of records already
/// stored. Returns the number of records added.
pub fn import_rows(state: &mut AppState, rows: Vec<ImportedRow>) -> usize {
    let mut added = 0;
    for row in rows {
        let duplicate = state.history(&row.index_name).iter().any(|r| {
            r.result_text == row.result_text && r.date == row.date && r.time == row.time
        });
        if duplicate {
            continue;
        }
        let name = row.index_name.clone();
        state.add_calculation(&name, row.into_record());
        added += 1;
    }
    tracing::info!(added, "imported spreadsheet rows");
    added
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = "## Index Data\n\n\
        | Index Name | Index (Value and Unit) | Time | Date |\n\
        | --- | --- | --- | --- |\n\
        | Birth Rate | 90.00 % | 08:15 | 01/01/2024 |\n\
        | Weaning Rate | 88.00 % |  | 02/02/2024 |\n\
        | Notes | see below | 10:00 | tomorrow |\n";

    #[test]
    fn parses_data_rows_only() {
        let rows = parse_index_rows(SHEET);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].index_name, "Birth Rate");
        assert_eq!(rows[0].time, "08:15");
        assert_eq!(rows[1].time, "00:00");
    }

    #[test]
    fn ignores_prose() {
        assert!(parse_index_rows("Herd report\nno tables here").is_empty());
    }

    #[test]
    fn import_skips_duplicates() {
        let mut state = AppState::default();
        assert_eq!(import_rows(&mut state, parse_index_rows(SHEET)), 2);
        assert_eq!(import_rows(&mut state, parse_index_rows(SHEET)), 0);
        assert_eq!(state.history("Birth Rate").len(), 1);
        assert!(state.history("Birth Rate")[0].raw_inputs.is_empty());
    }

    #[test]
    fn rows_from_a_date_formatted_workbook_import() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("herd.xlsx");
        crate::ingest::tests::write_typed_workbook(&path);

        let rows = parse_index_rows(&crate::ingest::extract_text(&path));
        assert_eq!(
            rows,
            vec![ImportedRow {
                index_name: "Birth Rate".into(),
                result_text: "90.00 %".into(),
                time: "08:15".into(),
                date: "01/01/2024".into(),
            }]
        );

        let mut state = AppState::default();
        assert_eq!(import_rows(&mut state, rows), 1);
        assert_eq!(state.history("Birth Rate")[0].date, "01/01/2024");
    }
}
