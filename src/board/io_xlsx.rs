// Reading a leaderboard table uploaded as an Excel workbook.

use std::path::Path;

use calamine::{open_workbook, DataType, Range, Reader, Xlsx};
use log::{debug, info};
use snafu::prelude::*;

use lap_ranking::StoredRow;

use crate::board::io_common::{simplify_file_name, ColumnIndex};
use crate::board::*;

/// Reads the rows of a worksheet laid out like the CSV table: a header row,
/// then one record per row. Uses the first worksheet unless a name is given.
pub fn read_xlsx_lap_table(path: &Path, worksheet: Option<&str>) -> BoardResult<Vec<StoredRow>> {
    let p = path.display().to_string();
    let wrange = get_range(path, worksheet)?;

    let mut iter = wrange.rows();
    let header = iter.next().context(EmptyExcelSnafu { path: p.clone() })?;
    let header_names: Vec<String> = header
        .iter()
        .map(|c| read_cell(c, 1))
        .collect::<BoardResult<Vec<String>>>()?;
    // Trailing empty header cells are formatting leftovers.
    let width = header_names
        .iter()
        .rposition(|h| !h.trim().is_empty())
        .map(|i| i + 1)
        .unwrap_or(0);
    let columns = ColumnIndex::from_headers(&header_names[..width], &p)?;
    debug!("read_xlsx_lap_table: header: {:?}", header_names);

    let mut res: Vec<StoredRow> = Vec::new();
    for (idx, row) in iter.enumerate() {
        let lineno = idx + 2;
        let cells: Vec<String> = row
            .iter()
            .map(|c| read_cell(c, lineno))
            .collect::<BoardResult<Vec<String>>>()?;
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        debug!("read_xlsx_lap_table: line {}: {:?}", lineno, cells);
        res.push(columns.row(&cells));
    }
    info!(
        "Read {} rows from {}",
        res.len(),
        simplify_file_name(path)
    );
    Ok(res)
}

fn get_range(path: &Path, worksheet: Option<&str>) -> BoardResult<Range<DataType>> {
    let p = path.display().to_string();
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path: p.clone() })?;
    let range = match worksheet {
        Some(name) => workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu {
                path: p.clone(),
                name,
            })?
            .context(OpeningExcelSnafu { path: p })?,
        None => workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path: p.clone() })?
            .context(OpeningExcelSnafu { path: p })?,
    };
    Ok(range)
}

// Times are expected as text (`M:SS:mmm`), numbers are written back without
// a useless fractional part.
fn read_cell(cell: &DataType, lineno: usize) -> BoardResult<String> {
    match cell {
        DataType::String(s) => Ok(s.clone()),
        DataType::Int(i) => Ok(i.to_string()),
        DataType::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Ok(format!("{}", *f as i64)),
        DataType::Float(f) => Ok(f.to_string()),
        DataType::Bool(b) => Ok(b.to_string()),
        DataType::Empty => Ok(String::new()),
        _ => Err(BoardError::ExcelWrongCellType {
            lineno,
            content: format!("{:?}", cell),
        }),
    }
}
