//! Workbook ingestion: one uploaded xlsx into a [`Dataset`].
//!
//! The workbook must carry three sheets by exact name: "Program Inventory",
//! "Personnel Costs", and "Non-Personnel Costs". All three parse into a
//! complete [`Dataset`] value before the caller touches any shared state, so
//! a failed upload never leaves a partially replaced dataset behind.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use crate::dataset::{Dataset, LineItem, Position, Program};

pub const PROGRAM_SHEET: &str = "Program Inventory";
pub const PERSONNEL_SHEET: &str = "Personnel Costs";
pub const NON_PERSONNEL_SHEET: &str = "Non-Personnel Costs";

/// Ingestion failures, surfaced verbatim to the uploader.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("could not read workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("required sheet '{0}' not found")]
    MissingSheet(&'static str),

    #[error("sheet '{sheet}' is missing column '{column}'")]
    MissingColumn {
        sheet: &'static str,
        column: &'static str,
    },
}

/// Parse a whole workbook into a [`Dataset`].
///
/// Rows with an empty department or name cell are skipped; cost cells accept
/// numbers or numeric text and fall back to zero otherwise.
pub fn parse_workbook(bytes: &[u8]) -> Result<Dataset, IngestError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

    let programs = read_sheet(&mut workbook, PROGRAM_SHEET)?;
    let personnel = read_sheet(&mut workbook, PERSONNEL_SHEET)?;
    let non_personnel = read_sheet(&mut workbook, NON_PERSONNEL_SHEET)?;

    let dataset = Dataset {
        programs: parse_programs(&programs)?,
        positions: parse_positions(&personnel)?,
        items: parse_line_items(&non_personnel)?,
    };

    debug!(
        programs = dataset.programs.len(),
        positions = dataset.positions.len(),
        items = dataset.items.len(),
        "workbook parsed"
    );
    Ok(dataset)
}

fn read_sheet<RS>(
    workbook: &mut calamine::Sheets<RS>,
    name: &'static str,
) -> Result<Vec<Vec<Data>>, IngestError>
where
    RS: std::io::Read + std::io::Seek,
{
    if !workbook.sheet_names().iter().any(|s| s.as_str() == name) {
        return Err(IngestError::MissingSheet(name));
    }
    let range = workbook
        .worksheet_range(name)
        .map_err(IngestError::Workbook)?;
    Ok(range.rows().map(|row| row.to_vec()).collect())
}

/// Locate the header row and map required column names to indexes.
///
/// Header cells match case-insensitively with surrounding whitespace
/// ignored. The first row containing every required column is the header;
/// data starts on the following row.
fn locate_columns(
    rows: &[Vec<Data>],
    sheet: &'static str,
    columns: &[&'static str],
) -> Result<(usize, Vec<usize>), IngestError> {
    for (row_idx, row) in rows.iter().enumerate() {
        let headers: Vec<String> = row
            .iter()
            .map(|cell| cell_text(cell).trim().to_lowercase())
            .collect();

        let indexes: Vec<Option<usize>> = columns
            .iter()
            .map(|wanted| headers.iter().position(|h| h == &wanted.to_lowercase()))
            .collect();

        if indexes.iter().all(Option::is_some) {
            return Ok((row_idx + 1, indexes.into_iter().flatten().collect()));
        }
    }

    // Report the first column that never matched anywhere.
    Err(IngestError::MissingColumn {
        sheet,
        column: columns[0],
    })
}

fn parse_programs(rows: &[Vec<Data>]) -> Result<Vec<Program>, IngestError> {
    let (start, cols) = locate_columns(rows, PROGRAM_SHEET, &["Department", "Program Name"])?;
    let mut programs = Vec::new();
    for row in &rows[start..] {
        let department = cell_text(row.get(cols[0]).unwrap_or(&Data::Empty));
        let name = cell_text(row.get(cols[1]).unwrap_or(&Data::Empty));
        if department.trim().is_empty() || name.trim().is_empty() {
            continue;
        }
        programs.push(Program {
            department: department.trim().to_string(),
            name: name.trim().to_string(),
        });
    }
    Ok(programs)
}

fn parse_positions(rows: &[Vec<Data>]) -> Result<Vec<Position>, IngestError> {
    let (start, cols) = locate_columns(
        rows,
        PERSONNEL_SHEET,
        &["Department", "Position Name", "Cost"],
    )?;
    let mut positions = Vec::new();
    for row in &rows[start..] {
        let department = cell_text(row.get(cols[0]).unwrap_or(&Data::Empty));
        let position = cell_text(row.get(cols[1]).unwrap_or(&Data::Empty));
        if department.trim().is_empty() || position.trim().is_empty() {
            continue;
        }
        positions.push(Position {
            department: department.trim().to_string(),
            position: position.trim().to_string(),
            cost: cell_decimal(row.get(cols[2]).unwrap_or(&Data::Empty)),
        });
    }
    Ok(positions)
}

fn parse_line_items(rows: &[Vec<Data>]) -> Result<Vec<LineItem>, IngestError> {
    let (start, cols) = locate_columns(
        rows,
        NON_PERSONNEL_SHEET,
        &["Department", "Line Item", "Cost"],
    )?;
    let mut items = Vec::new();
    for row in &rows[start..] {
        let department = cell_text(row.get(cols[0]).unwrap_or(&Data::Empty));
        let line_item = cell_text(row.get(cols[1]).unwrap_or(&Data::Empty));
        if department.trim().is_empty() || line_item.trim().is_empty() {
            continue;
        }
        items.push(LineItem {
            department: department.trim().to_string(),
            line_item: line_item.trim().to_string(),
            cost: cell_decimal(row.get(cols[2]).unwrap_or(&Data::Empty)),
        });
    }
    Ok(items)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                format!("{f:.0}")
            } else {
                format!("{f}")
            }
        }
        Data::Int(i) => format!("{i}"),
        Data::Bool(b) => {
            if *b {
                "TRUE".to_string()
            } else {
                "FALSE".to_string()
            }
        }
        Data::Error(e) => format!("#ERROR: {e:?}"),
        Data::DateTime(dt) => format!("{dt}"),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

/// Read a cost cell. Spreadsheets deliver numbers as floats; exported text
/// columns sometimes carry "68,000"-style strings. Anything else is zero.
fn cell_decimal(cell: &Data) -> Decimal {
    match cell {
        Data::Float(f) => Decimal::from_f64_retain(*f).unwrap_or_default(),
        Data::Int(i) => Decimal::from(*i),
        Data::String(s) => s.trim().replace(',', "").parse().unwrap_or_default(),
        _ => Decimal::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn s(text: &str) -> Data {
        Data::String(text.to_string())
    }

    #[test]
    fn parses_programs_below_the_header() {
        let rows = vec![
            vec![s("Department"), s("Program Name")],
            vec![s("Finance"), s("Budget Analysis")],
            vec![s("Finance"), s("Audit")],
            vec![Data::Empty, Data::Empty],
        ];
        let programs = parse_programs(&rows).unwrap();
        assert_eq!(programs.len(), 2);
        assert_eq!(programs[1].name, "Audit");
    }

    #[test]
    fn header_matching_ignores_case_and_whitespace() {
        let rows = vec![
            vec![s(" department "), s("PROGRAM NAME")],
            vec![s("Parks"), s("Trail Maintenance")],
        ];
        let programs = parse_programs(&rows).unwrap();
        assert_eq!(programs[0].department, "Parks");
    }

    #[test]
    fn missing_column_is_reported_with_the_sheet_name() {
        let rows = vec![
            vec![s("Department"), s("Something Else")],
            vec![s("Parks"), s("Trail Maintenance")],
        ];
        let err = parse_programs(&rows).unwrap_err();
        assert!(err.to_string().contains(PROGRAM_SHEET));
    }

    #[test]
    fn positions_read_numeric_and_text_costs() {
        let rows = vec![
            vec![s("Department"), s("Position Name"), s("Cost")],
            vec![s("Finance"), s("Analyst"), Data::Float(68000.0)],
            vec![s("Finance"), s("Manager"), s("82,500.50")],
            vec![s("Finance"), s("Intern"), Data::Empty],
        ];
        let positions = parse_positions(&rows).unwrap();
        assert_eq!(positions[0].cost, dec!(68000));
        assert_eq!(positions[1].cost, dec!(82500.50));
        assert_eq!(positions[2].cost, Decimal::ZERO);
    }

    #[test]
    fn rows_without_department_or_name_are_skipped() {
        let rows = vec![
            vec![s("Department"), s("Line Item"), s("Cost")],
            vec![s(""), s("Software"), Data::Float(100.0)],
            vec![s("IT"), s(""), Data::Float(100.0)],
            vec![s("IT"), s("Software"), Data::Float(100.0)],
        ];
        let items = parse_line_items(&rows).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].line_item, "Software");
    }

    #[test]
    fn unreadable_bytes_are_a_workbook_error() {
        let err = parse_workbook(b"definitely not a workbook").unwrap_err();
        assert!(matches!(err, IngestError::Workbook(_)));
    }
}
