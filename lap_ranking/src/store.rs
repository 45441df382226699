use log::{debug, info, warn};

use crate::config::*;
use crate::run_ranking;
use crate::validate::check_duplicate;

/// The records of one event, and its title.
///
/// The store never persists anything itself: callers save `stored_rows()`
/// after each mutation.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Leaderboard {
    default_title: String,
    title: String,
    records: Vec<LapRecord>,
    quarantined: Vec<QuarantinedRow>,
}

impl Leaderboard {
    pub fn new(default_title: &str) -> Leaderboard {
        Leaderboard {
            default_title: default_title.to_string(),
            title: default_title.to_string(),
            records: Vec::new(),
            quarantined: Vec::new(),
        }
    }

    /// Builds a store from persisted rows.
    ///
    /// Rows that cannot be decoded, or that repeat the identity of an earlier
    /// row, are quarantined. The registry fills the bonus of the records that
    /// have none.
    pub fn load(
        default_title: &str,
        title: Option<String>,
        rows: &[StoredRow],
        registry: &BonusRegistry,
    ) -> Leaderboard {
        let mut board = Leaderboard::new(default_title);
        if let Some(t) = title {
            board.title = t;
        }
        board.replace_rows(rows, registry);
        board
    }

    /// Discards all the records and decodes the given rows instead.
    pub fn replace_rows(&mut self, rows: &[StoredRow], registry: &BonusRegistry) {
        let (records, quarantined) = decode_rows(rows, registry);
        info!(
            "replace_rows: {} records loaded, {} rows quarantined",
            records.len(),
            quarantined.len()
        );
        self.records = records;
        self.quarantined = quarantined;
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn default_title(&self) -> &str {
        &self.default_title
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    pub fn records(&self) -> &[LapRecord] {
        &self.records
    }

    pub fn quarantined(&self) -> &[QuarantinedRow] {
        &self.quarantined
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn append(&mut self, record: LapRecord) -> Result<(), LeaderboardError> {
        check_duplicate(&record, &self.records)?;
        debug!("append: {:?}", record);
        self.records.push(record);
        Ok(())
    }

    /// Removes the record at a 1-based position of the overall ranking.
    ///
    /// The ranking is recomputed from the full set, so it is the one that was
    /// last displayed as long as nothing changed in between.
    pub fn delete_at(
        &mut self,
        position: usize,
        registry: &BonusRegistry,
    ) -> Result<LapRecord, LeaderboardError> {
        let ranking = run_ranking(&self.records, registry);
        let entry = match position.checked_sub(1).and_then(|i| ranking.overall.get(i)) {
            Some(e) => e,
            None => {
                warn!(
                    "delete_at: position {} out of range (1..={})",
                    position,
                    ranking.overall.len()
                );
                return Err(LeaderboardError::Range {
                    position,
                    size: ranking.overall.len(),
                });
            }
        };
        let removed = self.records.remove(entry.source_index);
        info!("delete_at: removed {:?} at position {}", removed, position);
        Ok(removed)
    }

    /// Clears everything, including the quarantined rows, and restores the default title.
    pub fn reset(&mut self) {
        self.records.clear();
        self.quarantined.clear();
        self.title = self.default_title.clone();
    }

    /// Ranks the records. Quarantined rows are reported as excluded.
    pub fn rank(&self, registry: &BonusRegistry) -> RankedBoard {
        let mut board = run_ranking(&self.records, registry);
        let mut excluded: Vec<ExcludedEntry> = self
            .quarantined
            .iter()
            .map(|q| ExcludedEntry {
                description: describe_row(&q.row),
                error: q.error.clone(),
            })
            .collect();
        excluded.append(&mut board.excluded);
        board.excluded = excluded;
        board
    }

    /// The rows to persist: the records, then the quarantined rows as they were read.
    pub fn stored_rows(&self) -> Vec<StoredRow> {
        self.records
            .iter()
            .map(|r| r.to_stored())
            .chain(self.quarantined.iter().map(|q| q.row.clone()))
            .collect()
    }
}

/// Decodes persisted rows, applying the registry to records without bonus.
pub fn decode_rows(
    rows: &[StoredRow],
    registry: &BonusRegistry,
) -> (Vec<LapRecord>, Vec<QuarantinedRow>) {
    let mut records: Vec<LapRecord> = Vec::new();
    let mut quarantined: Vec<QuarantinedRow> = Vec::new();
    for row in rows.iter() {
        let decoded = LapRecord::from_stored(row).and_then(|r| {
            let bonus = registry.fill(&r.name, r.bonus_time);
            if bonus != r.bonus_time {
                r.with_bonus(bonus)
            } else {
                Ok(r)
            }
        });
        let checked = decoded.and_then(|r| check_duplicate(&r, &records).map(|_| r));
        match checked {
            Ok(r) => records.push(r),
            Err(error) => {
                warn!("decode_rows: row {:?} quarantined: {}", row, error);
                quarantined.push(QuarantinedRow {
                    row: row.clone(),
                    error,
                });
            }
        }
    }
    (records, quarantined)
}

pub fn describe_row(row: &StoredRow) -> String {
    format!(
        "{} / {} / lap {} / {}",
        row.name, row.class_name, row.lap_number, row.total_time
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, class_name: &str, lap: &str, time: &str) -> StoredRow {
        StoredRow {
            name: name.to_string(),
            class_name: class_name.to_string(),
            lap_number: lap.to_string(),
            lap_time: time.to_string(),
            bonus_time: "0.000".to_string(),
            penalty_time: "0.000".to_string(),
            total_time: time.to_string(),
        }
    }

    fn record(name: &str, ms: u64) -> LapRecord {
        LapRecord::new(
            name,
            "A",
            1,
            TimeValue(ms),
            Adjustment::ZERO,
            Adjustment::ZERO,
        )
        .unwrap()
    }

    #[test]
    fn append_rejects_duplicates() {
        let mut board = Leaderboard::new("Board");
        board.append(record("Kim", 60_000)).unwrap();
        let err = board.append(record("Kim", 50_000)).unwrap_err();
        assert!(matches!(err, LeaderboardError::DuplicateKey { .. }));
        assert_eq!(board.len(), 1);
        assert_eq!(board.records()[0].total_time, TimeValue(60_000));
    }

    #[test]
    fn delete_uses_ranked_position() {
        let registry = BonusRegistry::new();
        let mut board = Leaderboard::new("Board");
        board.append(record("Slow", 70_000)).unwrap();
        board.append(record("Fast", 50_000)).unwrap();
        board.append(record("Mid", 60_000)).unwrap();
        // Position 1 is the fastest, whatever the insertion order.
        let removed = board.delete_at(1, &registry).unwrap();
        assert_eq!(removed.name, "Fast");
        let removed = board.delete_at(2, &registry).unwrap();
        assert_eq!(removed.name, "Slow");
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn delete_out_of_range_keeps_store() {
        let registry = BonusRegistry::new();
        let mut board = Leaderboard::new("Board");
        board.append(record("Kim", 60_000)).unwrap();
        let before = board.clone();
        for position in [0, 2, 100] {
            assert_eq!(
                board.delete_at(position, &registry),
                Err(LeaderboardError::Range { position, size: 1 })
            );
        }
        assert_eq!(board, before);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut board = Leaderboard::new("Board");
        board.set_title("Finals");
        board.append(record("Kim", 60_000)).unwrap();
        board.reset();
        assert!(board.is_empty());
        assert_eq!(board.title(), "Board");
        let once = board.clone();
        board.reset();
        assert_eq!(board, once);
    }

    #[test]
    fn load_quarantines_bad_rows() {
        let rows = vec![
            row("Kim", "A", "1", "1:00:000"),
            row("Lee", "A", "1", "1:xx:000"),
            row("Kim", "A", "1", "0:59:000"),
            row("Park", "A", "zero", "1:01:000"),
        ];
        let board = Leaderboard::load("Board", None, &rows, &BonusRegistry::new());
        assert_eq!(board.len(), 1);
        assert_eq!(board.quarantined().len(), 3);
        assert!(matches!(
            board.quarantined()[1].error,
            LeaderboardError::DuplicateKey { .. }
        ));
        // Quarantined rows are written back unchanged.
        assert_eq!(board.stored_rows(), rows);

        let ranked = board.rank(&BonusRegistry::new());
        assert_eq!(ranked.overall.len(), 1);
        assert_eq!(ranked.excluded.len(), 3);
    }

    #[test]
    fn load_applies_registry_to_zero_bonus() {
        let mut registry = BonusRegistry::new();
        registry.insert("Kim", Adjustment(1_500));
        registry.insert("Lee", Adjustment(1_500));
        let mut with_bonus = row("Lee", "A", "1", "1:00:000");
        with_bonus.bonus_time = "2.000".to_string();
        with_bonus.total_time = "1:02:000".to_string();
        let rows = vec![row("Kim", "A", "1", "1:00:000"), with_bonus];
        let board = Leaderboard::load("Board", Some("Race".to_string()), &rows, &registry);
        assert_eq!(board.title(), "Race");
        assert_eq!(board.records()[0].bonus_time, Adjustment(1_500));
        assert_eq!(board.records()[0].total_time, TimeValue(61_500));
        assert_eq!(board.records()[1].bonus_time, Adjustment(2_000));
    }
}
