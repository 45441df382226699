// Where a board keeps its table, title, bonus registry and backup.

use std::fs;

use log::{debug, info};
use snafu::prelude::*;

use lap_ranking::StoredRow;

use crate::board::config_reader::BoardPaths;
use crate::board::io_csv::*;
use crate::board::*;

pub trait BoardStorage {
    /// The persisted rows. A missing or empty table has no rows.
    fn load_rows(&self) -> BoardResult<Vec<StoredRow>>;
    fn save_rows(&mut self, rows: &[StoredRow]) -> BoardResult<()>;
    fn load_title(&self) -> BoardResult<Option<String>>;
    fn save_title(&mut self, title: &str) -> BoardResult<()>;
    /// (name, bonus in seconds) pairs, undecoded.
    fn load_bonus_rows(&self) -> BoardResult<Vec<(String, String)>>;
    fn save_backup(&mut self, rows: &[StoredRow]) -> BoardResult<()>;
    fn delete_backup(&mut self) -> BoardResult<()>;
}

/// CSV and text files next to each other.
pub struct FileStorage {
    paths: BoardPaths,
}

impl FileStorage {
    pub fn new(paths: BoardPaths) -> FileStorage {
        debug!("FileStorage: {:?}", paths);
        FileStorage { paths }
    }
}

impl BoardStorage for FileStorage {
    fn load_rows(&self) -> BoardResult<Vec<StoredRow>> {
        read_lap_table(&self.paths.data)
    }

    fn save_rows(&mut self, rows: &[StoredRow]) -> BoardResult<()> {
        write_lap_table(&self.paths.data, rows)
    }

    fn load_title(&self) -> BoardResult<Option<String>> {
        read_title(&self.paths.title)
    }

    fn save_title(&mut self, title: &str) -> BoardResult<()> {
        write_title(&self.paths.title, title)
    }

    fn load_bonus_rows(&self) -> BoardResult<Vec<(String, String)>> {
        read_bonus_table(&self.paths.bonus)
    }

    fn save_backup(&mut self, rows: &[StoredRow]) -> BoardResult<()> {
        write_lap_table(&self.paths.backup, rows)?;
        info!("Backup written to {}", self.paths.backup.display());
        Ok(())
    }

    fn delete_backup(&mut self) -> BoardResult<()> {
        if self.paths.backup.exists() {
            fs::remove_file(&self.paths.backup).context(WritingFileSnafu {
                path: self.paths.backup.display().to_string(),
            })?;
            info!("Backup {} deleted", self.paths.backup.display());
        }
        Ok(())
    }
}

/// Keeps everything in memory. Writes can be made to fail.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    pub rows: Vec<StoredRow>,
    pub title: Option<String>,
    pub bonus: Vec<(String, String)>,
    pub backup: Option<Vec<StoredRow>>,
    pub fail_writes: bool,
}

#[cfg(test)]
impl MemoryStorage {
    fn check_writable(&self) -> BoardResult<()> {
        if self.fail_writes {
            whatever!("memory storage is read-only")
        }
        Ok(())
    }
}

#[cfg(test)]
impl BoardStorage for MemoryStorage {
    fn load_rows(&self) -> BoardResult<Vec<StoredRow>> {
        Ok(self.rows.clone())
    }

    fn save_rows(&mut self, rows: &[StoredRow]) -> BoardResult<()> {
        self.check_writable()?;
        self.rows = rows.to_vec();
        Ok(())
    }

    fn load_title(&self) -> BoardResult<Option<String>> {
        Ok(self.title.clone())
    }

    fn save_title(&mut self, title: &str) -> BoardResult<()> {
        self.check_writable()?;
        self.title = Some(title.to_string());
        Ok(())
    }

    fn load_bonus_rows(&self) -> BoardResult<Vec<(String, String)>> {
        Ok(self.bonus.clone())
    }

    fn save_backup(&mut self, rows: &[StoredRow]) -> BoardResult<()> {
        self.check_writable()?;
        self.backup = Some(rows.to_vec());
        Ok(())
    }

    fn delete_backup(&mut self) -> BoardResult<()> {
        self.check_writable()?;
        self.backup = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::config_reader::BoardConfig;
    use crate::board::io_common::test_dir;
    use lap_ranking::{BoardRules, RawLapInput, Scope};

    #[test]
    fn short_row_is_quarantined_on_open() {
        let dir = test_dir("short_row_is_quarantined_on_open");
        let paths = BoardConfig::default().paths(&dir);
        fs::write(
            &paths.data,
            "name,class,lap_number,lap_time,bonus_time,penalty_time,total_time\n\
             Kim,A,1,1:00:000,0.000,0.000,1:00:000\n\
             Lee,A,1\n",
        )
        .unwrap();
        let mut session =
            Session::open(FileStorage::new(paths.clone()), BoardRules::default(), "Board")
                .unwrap();
        assert_eq!(session.board().len(), 1);
        assert_eq!(session.board().quarantined().len(), 1);
        assert_eq!(session.ranking().excluded.len(), 1);

        // Admin commands still work on such a board.
        session.reset_all().unwrap();
        assert!(session.board().is_empty());
    }

    #[test]
    fn file_session_round_trip() {
        let dir = test_dir("file_session_round_trip");
        let paths = BoardConfig::default().paths(&dir);

        let mut session =
            Session::open(FileStorage::new(paths.clone()), BoardRules::default(), "Board")
                .unwrap();
        assert!(session.board().is_empty());
        session.set_title("Summer cup").unwrap();
        session
            .submit_record(&RawLapInput {
                name: "Kim".to_string(),
                class_name: "ND".to_string(),
                lap_number: 1,
                minutes: 0,
                seconds: 58,
                milliseconds: 120,
                penalty_seconds: 2.0,
                ..RawLapInput::default()
            })
            .unwrap();
        session.backup().unwrap();
        assert!(paths.backup.exists());

        let reopened =
            Session::open(FileStorage::new(paths.clone()), BoardRules::default(), "Board")
                .unwrap();
        assert_eq!(reopened.title(), "Summer cup");
        let view = reopened.ranked_view(&Scope::Class("ND".to_string()));
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].record.total_time.to_string(), "1:00:120");

        let mut reopened = reopened;
        reopened.reset_all().unwrap();
        assert!(!paths.backup.exists());
        let again = Session::open(FileStorage::new(paths), BoardRules::default(), "Board").unwrap();
        assert!(again.board().is_empty());
        assert_eq!(again.title(), "Board");
    }
}
