use log::{debug, info, warn};

use lap_ranking::builder::RecordBuilder;
use lap_ranking::store::decode_rows;
use lap_ranking::*;
use snafu::{prelude::*, Snafu};

pub mod config_reader;
pub mod export;
pub mod io_common;
pub mod io_csv;
pub mod io_xlsx;
pub mod storage;

use crate::board::storage::BoardStorage;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BoardError {
    #[snafu(display("Error opening file {path}"))]
    OpeningCsv { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingCsv { source: csv::Error, path: String },
    #[snafu(display(
        "The columns of {path} do not match a leaderboard table: found {found:?}, expected {expected:?}"
    ))]
    SchemaMismatch {
        path: String,
        found: Vec<String>,
        expected: Vec<String>,
    },
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The Excel file {path} has no worksheet or no header row"))]
    EmptyExcel { path: String },
    #[snafu(display("The Excel file {path} has no worksheet named {name}"))]
    MissingWorksheet { path: String, name: String },
    #[snafu(display("Could not understand the cell at line {lineno}: {content}"))]
    ExcelWrongCellType { lineno: usize, content: String },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing the JSON configuration"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error reading file {path}"))]
    ReadingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error rendering the leaderboard"))]
    Rendering { source: std::io::Error },
    #[snafu(display("Error rendering the leaderboard as CSV"))]
    RenderingCsv { source: csv::Error },
    #[snafu(display("{source}"))]
    Leaderboard { source: LeaderboardError },
    #[snafu(display("The title cannot be empty"))]
    EmptyTitle {},
    #[snafu(display("This command requires the admin password"))]
    AdminRequired {},
    #[snafu(display("Unknown output format {format:?}: expected text, csv, html, markdown, json or pdf"))]
    UnknownFormat { format: String },
    #[snafu(display("The rendered leaderboard differs from the reference {path}"))]
    ReferenceMismatch { path: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type BoardResult<T> = Result<T, BoardError>;

/// The state of one session on a board: the records, the bonus registry and
/// where they are persisted.
///
/// Every mutation is saved before returning. A mutation is applied to a copy
/// of the board and only kept once the copy is saved.
pub struct Session<S: BoardStorage> {
    storage: S,
    rules: BoardRules,
    registry: BonusRegistry,
    board: Leaderboard,
}

impl<S: BoardStorage> Session<S> {
    pub fn open(storage: S, rules: BoardRules, default_title: &str) -> BoardResult<Session<S>> {
        let registry = load_registry(&storage)?;
        let title = storage.load_title()?;
        let rows = storage.load_rows()?;
        let board = Leaderboard::load(default_title, title, &rows, &registry);
        info!(
            "Session opened: title {:?}, {} records, {} bonus entries",
            board.title(),
            board.len(),
            registry.len()
        );
        Ok(Session {
            storage,
            rules,
            registry,
            board,
        })
    }

    pub fn title(&self) -> &str {
        self.board.title()
    }

    pub fn board(&self) -> &Leaderboard {
        &self.board
    }

    #[cfg(test)]
    pub fn registry(&self) -> &BonusRegistry {
        &self.registry
    }

    #[cfg(test)]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    #[cfg(test)]
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn submit_record(&mut self, raw: &RawLapInput) -> BoardResult<LapRecord> {
        let record = RecordBuilder::new(&self.rules)
            .registry(&self.registry)
            .build(raw)
            .context(LeaderboardSnafu {})?;
        let mut next = self.board.clone();
        next.append(record.clone()).context(LeaderboardSnafu {})?;
        self.commit(next)?;
        info!("submit_record: {:?}", record);
        Ok(record)
    }

    /// Recomputes the full ranking. Excluded rows are logged.
    pub fn ranking(&self) -> RankedBoard {
        let ranking = self.board.rank(&self.registry);
        for e in ranking.excluded.iter() {
            warn!("Excluded from the ranking: {}: {}", e.description, e.error);
        }
        ranking
    }

    pub fn ranked_view(&self, scope: &Scope) -> Vec<RankedEntry> {
        self.ranking().view(scope).to_vec()
    }

    pub fn delete_record(&mut self, position: usize) -> BoardResult<LapRecord> {
        let mut next = self.board.clone();
        let removed = next
            .delete_at(position, &self.registry)
            .context(LeaderboardSnafu {})?;
        self.commit(next)?;
        Ok(removed)
    }

    /// Clears the records, restores the default title and deletes the backup.
    pub fn reset_all(&mut self) -> BoardResult<()> {
        let mut next = self.board.clone();
        next.reset();
        self.commit(next)?;
        self.storage.save_title(self.board.title())?;
        self.storage.delete_backup()?;
        info!("reset_all: board cleared");
        Ok(())
    }

    /// Drops the in-memory state and reads everything again from the storage.
    pub fn reload(&mut self) -> BoardResult<()> {
        self.registry = load_registry(&self.storage)?;
        let title = self.storage.load_title()?;
        let rows = self.storage.load_rows()?;
        self.board = Leaderboard::load(self.board.default_title(), title, &rows, &self.registry);
        info!("reload: {} records", self.board.len());
        Ok(())
    }

    pub fn set_title(&mut self, title: &str) -> BoardResult<()> {
        let title = title.trim();
        ensure!(!title.is_empty(), EmptyTitleSnafu {});
        self.storage.save_title(title)?;
        self.board.set_title(title);
        Ok(())
    }

    /// Saves a copy of the current table. Returns the number of rows saved.
    pub fn backup(&mut self) -> BoardResult<usize> {
        let rows = self.board.stored_rows();
        self.storage.save_backup(&rows)?;
        Ok(rows.len())
    }

    /// Replaces the whole table with uploaded rows.
    ///
    /// The upload is refused if two rows share the same name, class and lap
    /// number. Rows that cannot be read are quarantined like on load.
    pub fn import_rows(&mut self, rows: &[StoredRow]) -> BoardResult<usize> {
        let (records, quarantined) = decode_rows(rows, &self.registry);
        if let Some(dup) = quarantined
            .iter()
            .find(|q| matches!(q.error, LeaderboardError::DuplicateKey { .. }))
        {
            return Err(BoardError::Leaderboard {
                source: dup.error.clone(),
            });
        }
        for r in records.iter() {
            if let Err(e) = validate::check_class(&r.class_name, &self.rules) {
                warn!("import_rows: {:?}: {}", r, e);
            }
        }
        debug!(
            "import_rows: {} records, {} quarantined",
            records.len(),
            quarantined.len()
        );
        let mut next = self.board.clone();
        next.replace_rows(rows, &self.registry);
        self.commit(next)?;
        Ok(records.len())
    }

    // Saves the rows of the new board, then makes it the current one.
    fn commit(&mut self, next: Leaderboard) -> BoardResult<()> {
        self.storage.save_rows(&next.stored_rows())?;
        self.board = next;
        Ok(())
    }
}

fn load_registry<S: BoardStorage>(storage: &S) -> BoardResult<BonusRegistry> {
    let mut registry = BonusRegistry::new();
    for (name, bonus) in storage.load_bonus_rows()? {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        match Adjustment::parse(&bonus) {
            Ok(b) => registry.insert(name, b),
            Err(e) => warn!("Skipping the bonus of {:?}: {}", name, e),
        }
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::storage::MemoryStorage;
    use super::*;

    fn raw(name: &str, class_name: &str, lap: u32, min: u64, sec: u64, ms: u64) -> RawLapInput {
        RawLapInput {
            name: name.to_string(),
            class_name: class_name.to_string(),
            lap_number: lap,
            minutes: min,
            seconds: sec,
            milliseconds: ms,
            ..RawLapInput::default()
        }
    }

    fn stored(name: &str, lap: &str, time: &str) -> StoredRow {
        StoredRow {
            name: name.to_string(),
            class_name: "A".to_string(),
            lap_number: lap.to_string(),
            lap_time: time.to_string(),
            bonus_time: "0.000".to_string(),
            penalty_time: "0.000".to_string(),
            total_time: time.to_string(),
        }
    }

    fn open(storage: MemoryStorage) -> Session<MemoryStorage> {
        Session::open(storage, BoardRules::default(), "Board").unwrap()
    }

    #[test]
    fn submit_persists_and_ranks() {
        let mut session = open(MemoryStorage::default());
        session.submit_record(&raw("A", "B", 1, 1, 30, 500)).unwrap();
        session.submit_record(&raw("B", "B", 1, 1, 29, 0)).unwrap();
        assert_eq!(session.storage().rows.len(), 2);
        assert_eq!(session.storage().rows[0].total_time, "1:30:500");

        let view = session.ranked_view(&Scope::Class("B".to_string()));
        assert_eq!(view[0].record.name, "B");
        assert_eq!(view[1].delta.to_string(), "0:01:500");
        assert_eq!(session.ranked_view(&Scope::All).len(), 2);
    }

    #[test]
    fn duplicate_submission_is_rejected() {
        let mut session = open(MemoryStorage::default());
        session.submit_record(&raw("A", "B", 1, 1, 0, 0)).unwrap();
        let err = session
            .submit_record(&raw("A", "B", 1, 0, 59, 0))
            .unwrap_err();
        assert!(matches!(
            err,
            BoardError::Leaderboard {
                source: LeaderboardError::DuplicateKey { .. }
            }
        ));
        assert_eq!(session.storage().rows.len(), 1);
    }

    #[test]
    fn registry_fills_submission_bonus() {
        let storage = MemoryStorage {
            bonus: vec![
                ("A".to_string(), "2.5".to_string()),
                ("B".to_string(), "not a number".to_string()),
            ],
            ..MemoryStorage::default()
        };
        let mut session = open(storage);
        assert_eq!(session.registry().len(), 1);
        let record = session.submit_record(&raw("A", "B", 1, 1, 0, 0)).unwrap();
        assert_eq!(record.bonus_time, Adjustment(2_500));
        assert_eq!(record.total_time.to_string(), "1:02:500");
    }

    #[test]
    fn delete_out_of_range_leaves_storage() {
        let mut session = open(MemoryStorage::default());
        session.submit_record(&raw("A", "B", 1, 1, 0, 0)).unwrap();
        let err = session.delete_record(2).unwrap_err();
        assert!(matches!(
            err,
            BoardError::Leaderboard {
                source: LeaderboardError::Range {
                    position: 2,
                    size: 1
                }
            }
        ));
        assert_eq!(session.storage().rows.len(), 1);
        let removed = session.delete_record(1).unwrap();
        assert_eq!(removed.name, "A");
        assert!(session.storage().rows.is_empty());
    }

    #[test]
    fn reset_clears_title_and_backup() {
        let mut session = open(MemoryStorage::default());
        session.set_title("Finals").unwrap();
        session.submit_record(&raw("A", "B", 1, 1, 0, 0)).unwrap();
        assert_eq!(session.backup().unwrap(), 1);
        assert!(session.storage().backup.is_some());

        session.reset_all().unwrap();
        assert!(session.board().is_empty());
        assert_eq!(session.title(), "Board");
        assert_eq!(session.storage().title.as_deref(), Some("Board"));
        assert!(session.storage().backup.is_none());

        session.reset_all().unwrap();
        assert!(session.board().is_empty());
        assert_eq!(session.title(), "Board");
    }

    #[test]
    fn empty_title_is_refused() {
        let mut session = open(MemoryStorage::default());
        assert!(matches!(
            session.set_title("   "),
            Err(BoardError::EmptyTitle {})
        ));
        assert_eq!(session.title(), "Board");
    }

    #[test]
    fn reload_picks_up_outside_edits() {
        let mut session = open(MemoryStorage::default());
        session.submit_record(&raw("A", "B", 1, 1, 0, 0)).unwrap();
        session.storage_mut().rows.push(stored("C", "1", "0:50:000"));
        session.storage_mut().title = Some("Edited".to_string());
        session
            .storage_mut()
            .bonus
            .push(("A".to_string(), "1".to_string()));
        session.reload().unwrap();
        assert_eq!(session.title(), "Edited");
        let view = session.ranked_view(&Scope::All);
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].record.name, "C");
        assert_eq!(view[1].record.total_time.to_string(), "1:01:000");
    }

    #[test]
    fn corrupt_rows_are_excluded_not_zeroed() {
        let storage = MemoryStorage {
            rows: vec![stored("A", "1", "1:00:000"), stored("B", "1", "broken")],
            ..MemoryStorage::default()
        };
        let mut session = open(storage);
        let ranking = session.ranking();
        assert_eq!(ranking.overall.len(), 1);
        assert_eq!(ranking.excluded.len(), 1);
        // The broken row survives the next save.
        session.submit_record(&raw("C", "A", 1, 2, 0, 0)).unwrap();
        assert_eq!(session.storage().rows.len(), 3);
        assert!(session
            .storage()
            .rows
            .iter()
            .any(|r| r.total_time == "broken"));
    }

    #[test]
    fn import_replaces_table() {
        let mut session = open(MemoryStorage::default());
        session.submit_record(&raw("A", "B", 1, 1, 0, 0)).unwrap();
        let count = session
            .import_rows(&[stored("X", "1", "1:00:000"), stored("Y", "1", "0:59:000")])
            .unwrap();
        assert_eq!(count, 2);
        let view = session.ranked_view(&Scope::All);
        assert_eq!(view[0].record.name, "Y");
        assert_eq!(session.storage().rows.len(), 2);
    }

    #[test]
    fn import_with_duplicates_is_refused() {
        let mut session = open(MemoryStorage::default());
        session.submit_record(&raw("A", "B", 1, 1, 0, 0)).unwrap();
        let err = session
            .import_rows(&[stored("X", "1", "1:00:000"), stored("X", "1", "0:59:000")])
            .unwrap_err();
        assert!(matches!(
            err,
            BoardError::Leaderboard {
                source: LeaderboardError::DuplicateKey { .. }
            }
        ));
        assert_eq!(session.board().records()[0].name, "A");
    }

    #[test]
    fn failed_write_leaves_board_unchanged() {
        let mut session = open(MemoryStorage::default());
        session.storage_mut().fail_writes = true;
        assert!(session.submit_record(&raw("A", "B", 1, 1, 0, 0)).is_err());
        assert!(session.board().is_empty());

        // Nothing was saved, so the same lap can be submitted again.
        session.storage_mut().fail_writes = false;
        session.submit_record(&raw("A", "B", 1, 1, 0, 0)).unwrap();
        assert_eq!(session.board().len(), 1);
        assert_eq!(session.storage().rows.len(), 1);
    }

    #[test]
    fn failed_write_keeps_admin_changes_out() {
        let mut session = open(MemoryStorage::default());
        session.submit_record(&raw("A", "B", 1, 1, 0, 0)).unwrap();
        session.submit_record(&raw("C", "B", 1, 0, 59, 0)).unwrap();
        let before = session.board().clone();
        session.storage_mut().fail_writes = true;

        assert!(session.delete_record(1).is_err());
        assert!(session.set_title("Finals").is_err());
        assert!(session.reset_all().is_err());
        assert!(session
            .import_rows(&[stored("X", "1", "1:00:000")])
            .is_err());
        assert_eq!(session.board(), &before);
        assert_eq!(session.title(), "Board");

        session.storage_mut().fail_writes = false;
        let removed = session.delete_record(1).unwrap();
        assert_eq!(removed.name, "C");
        assert_eq!(session.storage().rows.len(), 1);
    }
}
