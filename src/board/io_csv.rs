// Primitives for reading and writing the CSV tables of a board.

use std::fs;
use std::path::Path;

use csv::StringRecord;
use log::{debug, info};
use snafu::prelude::*;

use lap_ranking::StoredRow;

use crate::board::io_common::{simplify_file_name, stored_row_cells, ColumnIndex, LAP_COLUMNS};
use crate::board::*;

const BONUS_COLUMNS: [&str; 2] = ["name", "bonus_time"];

fn is_missing_or_empty(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true)
}

// Rows with too few or too many cells are read anyway: they fail to decode
// later and are quarantined with the other unreadable rows.
fn open_reader(path: &Path) -> BoardResult<csv::Reader<fs::File>> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(OpeningCsvSnafu {
            path: path.display().to_string(),
        })
}

fn record_cells(record: &StringRecord) -> Vec<String> {
    record.iter().map(|s| s.to_string()).collect()
}

/// Reads a leaderboard table. A missing or empty file is an empty table.
pub fn read_lap_table(path: &Path) -> BoardResult<Vec<StoredRow>> {
    if is_missing_or_empty(path) {
        info!("{} is missing or empty, starting with an empty table", path.display());
        return Ok(Vec::new());
    }
    read_uploaded_csv(path)
}

/// Reads a leaderboard table that must exist.
pub fn read_uploaded_csv(path: &Path) -> BoardResult<Vec<StoredRow>> {
    let p = path.display().to_string();
    let mut rdr = open_reader(path)?;
    let headers = rdr
        .headers()
        .context(CsvLineParseSnafu {
            path: p.clone(),
            lineno: 1usize,
        })?
        .clone();
    let columns = ColumnIndex::from_headers(&record_cells(&headers), &p)?;
    debug!("read_lap_table: {}: columns {:?}", p, columns);

    let mut res: Vec<StoredRow> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        // Line 1 is the header.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu {
            path: p.clone(),
            lineno,
        })?;
        if line.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        res.push(columns.row(&record_cells(&line)));
    }
    info!(
        "Read {} rows from {}",
        res.len(),
        simplify_file_name(path)
    );
    Ok(res)
}

pub fn write_lap_table(path: &Path, rows: &[StoredRow]) -> BoardResult<()> {
    let p = path.display().to_string();
    let mut wtr = csv::Writer::from_path(path).context(WritingCsvSnafu { path: p.clone() })?;
    wtr.write_record(LAP_COLUMNS)
        .context(WritingCsvSnafu { path: p.clone() })?;
    for row in rows {
        wtr.write_record(stored_row_cells(row))
            .context(WritingCsvSnafu { path: p.clone() })?;
    }
    wtr.flush().context(WritingFileSnafu { path: p.clone() })?;
    debug!("write_lap_table: {} rows written to {}", rows.len(), p);
    Ok(())
}

/// Reads the (name, bonus) pairs of the bonus registry. A missing file is an
/// empty registry.
pub fn read_bonus_table(path: &Path) -> BoardResult<Vec<(String, String)>> {
    if is_missing_or_empty(path) {
        debug!("read_bonus_table: no bonus file at {}", path.display());
        return Ok(Vec::new());
    }
    let p = path.display().to_string();
    let mut rdr = open_reader(path)?;
    let headers = record_cells(
        rdr.headers()
            .context(CsvLineParseSnafu {
                path: p.clone(),
                lineno: 1usize,
            })?,
    );
    let find = |names: [&str; 2]| {
        headers
            .iter()
            .position(|h| names.contains(&h.trim_start_matches('\u{feff}').trim()))
    };
    let (name_idx, bonus_idx) = match (find(["name", "이름"]), find(["bonus_time", "가산초"])) {
        (Some(n), Some(b)) => (n, b),
        _ => {
            return Err(BoardError::SchemaMismatch {
                path: p,
                found: headers.clone(),
                expected: BONUS_COLUMNS.iter().map(|c| c.to_string()).collect(),
            })
        }
    };

    let mut res: Vec<(String, String)> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        let line = line_r.context(CsvLineParseSnafu {
            path: p.clone(),
            lineno: idx + 2,
        })?;
        let name = line.get(name_idx).unwrap_or("").to_string();
        let bonus = line.get(bonus_idx).unwrap_or("").to_string();
        res.push((name, bonus));
    }
    Ok(res)
}

#[cfg(test)]
pub fn write_bonus_table(path: &Path, entries: &[(String, String)]) -> BoardResult<()> {
    let p = path.display().to_string();
    let mut wtr = csv::Writer::from_path(path).context(WritingCsvSnafu { path: p.clone() })?;
    wtr.write_record(BONUS_COLUMNS)
        .context(WritingCsvSnafu { path: p.clone() })?;
    for (name, bonus) in entries {
        wtr.write_record([name, bonus])
            .context(WritingCsvSnafu { path: p.clone() })?;
    }
    wtr.flush().context(WritingFileSnafu { path: p })?;
    Ok(())
}

/// The first line of the title file, if there is one.
pub fn read_title(path: &Path) -> BoardResult<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path).context(ReadingFileSnafu {
        path: path.display().to_string(),
    })?;
    Ok(contents
        .lines()
        .next()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty()))
}

pub fn write_title(path: &Path, title: &str) -> BoardResult<()> {
    fs::write(path, format!("{}\n", title)).context(WritingFileSnafu {
        path: path.display().to_string(),
    })
}
