use std::path::{Path, PathBuf};

use lap_ranking::StoredRow;

use crate::board::*;

/// The columns of a leaderboard table, in the order they are written.
pub const LAP_COLUMNS: [&str; 7] = [
    "name",
    "class",
    "lap_number",
    "lap_time",
    "bonus_time",
    "penalty_time",
    "total_time",
];

// Labels used by the first versions of the board.
const LEGACY_LABELS: [(&str, &str); 7] = [
    ("이름", "name"),
    ("클래스", "class"),
    ("주행 차수", "lap_number"),
    ("시간", "lap_time"),
    ("가산초", "bonus_time"),
    ("패널티초", "penalty_time"),
    ("합계 시간", "total_time"),
];

pub fn resolve_path(root: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}

pub fn simplify_file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// A file name derived from the board title.
pub fn export_file_name(title: &str, extension: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();
    let stem = if stem.is_empty() {
        "leaderboard".to_string()
    } else {
        stem
    };
    format!("{}.{}", stem, extension)
}

fn canonical_column(header: &str) -> Option<&'static str> {
    let h = header.trim_start_matches('\u{feff}').trim();
    LAP_COLUMNS
        .iter()
        .find(|c| **c == h)
        .copied()
        .or_else(|| {
            LEGACY_LABELS
                .iter()
                .find(|(label, _)| *label == h)
                .map(|(_, c)| *c)
        })
}

/// Where each column of a leaderboard table is found.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnIndex {
    name: usize,
    class: Option<usize>,
    lap_number: usize,
    lap_time: usize,
    bonus_time: Option<usize>,
    penalty_time: Option<usize>,
    total_time: usize,
}

impl ColumnIndex {
    /// Maps the header of a table. The class, bonus and penalty columns may be
    /// missing (tables of the first versions did not have them). Any unknown
    /// or missing mandatory column is a schema error.
    pub fn from_headers(headers: &[String], path: &str) -> BoardResult<ColumnIndex> {
        let mismatch = || BoardError::SchemaMismatch {
            path: path.to_string(),
            found: headers.to_vec(),
            expected: LAP_COLUMNS.iter().map(|c| c.to_string()).collect(),
        };
        let mut found: Vec<(&'static str, usize)> = Vec::new();
        for (idx, h) in headers.iter().enumerate() {
            match canonical_column(h) {
                Some(c) if !found.iter().any(|(known, _)| *known == c) => found.push((c, idx)),
                _ => return Err(mismatch()),
            }
        }
        let get = |c: &str| found.iter().find(|(k, _)| *k == c).map(|(_, idx)| *idx);
        Ok(ColumnIndex {
            name: get("name").ok_or_else(mismatch)?,
            class: get("class"),
            lap_number: get("lap_number").ok_or_else(mismatch)?,
            lap_time: get("lap_time").ok_or_else(mismatch)?,
            bonus_time: get("bonus_time"),
            penalty_time: get("penalty_time"),
            total_time: get("total_time").ok_or_else(mismatch)?,
        })
    }

    pub fn row(&self, cells: &[String]) -> StoredRow {
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| cells.get(i))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };
        StoredRow {
            name: cell(Some(self.name)),
            class_name: cell(self.class),
            lap_number: cell(Some(self.lap_number)),
            lap_time: cell(Some(self.lap_time)),
            bonus_time: cell(self.bonus_time),
            penalty_time: cell(self.penalty_time),
            total_time: cell(Some(self.total_time)),
        }
    }
}

pub fn stored_row_cells(row: &StoredRow) -> [&str; 7] {
    [
        row.name.as_str(),
        row.class_name.as_str(),
        row.lap_number.as_str(),
        row.lap_time.as_str(),
        row.bonus_time.as_str(),
        row.penalty_time.as_str(),
        row.total_time.as_str(),
    ]
}

/// A fresh directory for the files of one test.
#[cfg(test)]
pub fn test_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir()
        .join("lapboard-tests")
        .join(format!("{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(hs: &[&str]) -> Vec<String> {
        hs.iter().map(|h| h.to_string()).collect()
    }

    #[test]
    fn current_headers_are_mapped() {
        let idx = ColumnIndex::from_headers(&headers(&LAP_COLUMNS), "t.csv").unwrap();
        let row = idx.row(&headers(&["Kim", "A", "1", "1:00:000", "0.5", "0", "1:00:500"]));
        assert_eq!(row.name, "Kim");
        assert_eq!(row.bonus_time, "0.5");
        assert_eq!(row.total_time, "1:00:500");
    }

    #[test]
    fn legacy_headers_are_mapped() {
        let idx = ColumnIndex::from_headers(
            &headers(&["\u{feff}이름", "주행 차수", "시간", "합계 시간"]),
            "t.csv",
        )
        .unwrap();
        let row = idx.row(&headers(&["Kim", "2", "1:00:000", "1:00:000"]));
        assert_eq!(row.lap_number, "2");
        assert_eq!(row.class_name, "");
        assert_eq!(row.penalty_time, "");
    }

    #[test]
    fn wrong_columns_are_a_schema_error() {
        for hs in [
            vec!["name", "lap_number", "lap_time"],
            vec!["name", "lap_number", "lap_time", "total_time", "comment"],
            vec!["name", "name", "lap_number", "lap_time", "total_time"],
        ] {
            assert!(matches!(
                ColumnIndex::from_headers(&headers(&hs), "t.csv"),
                Err(BoardError::SchemaMismatch { .. })
            ));
        }
    }

    #[test]
    fn export_names_are_safe() {
        assert_eq!(export_file_name("Cup 1/2", "csv"), "Cup 1_2.csv");
        assert_eq!(export_file_name("  ", "md"), "leaderboard.md");
    }
}
