// ********* Input data structures ***********

use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;

use log::debug;

use crate::timing::{format_millis, parse_time};

/// A non-negative duration, in milliseconds.
///
/// It is displayed as `M:SS:mmm`: the minutes are unbounded, the seconds are
/// padded to 2 digits and the milliseconds to 3 digits.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Default)]
pub struct TimeValue(pub u64);

impl TimeValue {
    pub const ZERO: TimeValue = TimeValue(0);

    pub fn millis(&self) -> u64 {
        self.0
    }

    /// The time elapsed since an earlier value. Never negative.
    pub fn since(&self, earlier: TimeValue) -> TimeValue {
        TimeValue(self.0.saturating_sub(earlier.0))
    }
}

impl Display for TimeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format_millis(self.0))
    }
}

/// A bonus or a penalty: a non-negative number of seconds with 3 decimals.
///
/// Stored as whole milliseconds (`round(seconds * 1000)`) so that all the
/// arithmetic on times stays on integers.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Default)]
pub struct Adjustment(pub u64);

impl Adjustment {
    pub const ZERO: Adjustment = Adjustment(0);

    pub fn from_seconds(seconds: f64) -> Result<Adjustment, LeaderboardError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(LeaderboardError::Validation {
                field: "adjustment",
                reason: format!("expected a non-negative number of seconds, got {}", seconds),
            });
        }
        let ms = (seconds * 1000.0).round();
        if ms > u64::MAX as f64 {
            return Err(LeaderboardError::Validation {
                field: "adjustment",
                reason: format!("{} seconds is too large", seconds),
            });
        }
        Ok(Adjustment(ms as u64))
    }

    /// Reads a persisted decimal number of seconds. An empty cell is no adjustment.
    pub fn parse(s: &str) -> Result<Adjustment, LeaderboardError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Adjustment::ZERO);
        }
        let seconds = trimmed
            .parse::<f64>()
            .map_err(|e| LeaderboardError::Parse {
                input: s.to_string(),
                reason: e.to_string(),
            })?;
        Adjustment::from_seconds(seconds).map_err(|e| LeaderboardError::Parse {
            input: s.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn millis(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Display for Adjustment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:03}", self.0 / 1000, self.0 % 1000)
    }
}

/// The input of a submission form, before any check.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct RawLapInput {
    pub name: String,
    pub class_name: String,
    pub lap_number: u32,
    pub minutes: u64,
    pub seconds: u64,
    pub milliseconds: u64,
    pub bonus_seconds: f64,
    pub penalty_seconds: f64,
}

/// One submission.
///
/// `total_time` is derived from the three other times and is recomputed by
/// every constructor. The triple (name, class, lap number) identifies a record.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct LapRecord {
    pub name: String,
    pub class_name: String,
    pub lap_number: u32,
    pub lap_time: TimeValue,
    pub bonus_time: Adjustment,
    pub penalty_time: Adjustment,
    pub total_time: TimeValue,
}

impl LapRecord {
    pub fn new(
        name: &str,
        class_name: &str,
        lap_number: u32,
        lap_time: TimeValue,
        bonus_time: Adjustment,
        penalty_time: Adjustment,
    ) -> Result<LapRecord, LeaderboardError> {
        Ok(LapRecord {
            name: name.to_string(),
            class_name: class_name.to_string(),
            lap_number,
            lap_time,
            bonus_time,
            penalty_time,
            total_time: compute_total(lap_time, bonus_time, penalty_time)?,
        })
    }

    /// The same record with another bonus, and the total recomputed.
    pub fn with_bonus(&self, bonus_time: Adjustment) -> Result<LapRecord, LeaderboardError> {
        LapRecord::new(
            &self.name,
            &self.class_name,
            self.lap_number,
            self.lap_time,
            bonus_time,
            self.penalty_time,
        )
    }

    pub fn same_identity(&self, other: &LapRecord) -> bool {
        self.name == other.name
            && self.class_name == other.class_name
            && self.lap_number == other.lap_number
    }

    pub fn to_stored(&self) -> StoredRow {
        StoredRow {
            name: self.name.clone(),
            class_name: self.class_name.clone(),
            lap_number: self.lap_number.to_string(),
            lap_time: self.lap_time.to_string(),
            bonus_time: self.bonus_time.to_string(),
            penalty_time: self.penalty_time.to_string(),
            total_time: self.total_time.to_string(),
        }
    }

    /// Decodes a persisted row.
    ///
    /// The persisted total must still be a readable time, but the total of the
    /// returned record is always recomputed from the other columns.
    pub fn from_stored(row: &StoredRow) -> Result<LapRecord, LeaderboardError> {
        let name = row.name.trim();
        if name.is_empty() {
            return Err(LeaderboardError::Validation {
                field: "name",
                reason: "the name is empty".to_string(),
            });
        }
        let lap_number = row
            .lap_number
            .trim()
            .parse::<u32>()
            .map_err(|e| LeaderboardError::Parse {
                input: row.lap_number.clone(),
                reason: e.to_string(),
            })?;
        if lap_number == 0 {
            return Err(LeaderboardError::Validation {
                field: "lap_number",
                reason: "lap numbers start at 1".to_string(),
            });
        }
        let lap_time = parse_time(&row.lap_time)?;
        let bonus_time = Adjustment::parse(&row.bonus_time)?;
        let penalty_time = Adjustment::parse(&row.penalty_time)?;
        let stored_total = parse_time(&row.total_time)?;
        let record = LapRecord::new(
            name,
            row.class_name.trim(),
            lap_number,
            lap_time,
            bonus_time,
            penalty_time,
        )?;
        if record.total_time != stored_total {
            debug!(
                "from_stored: {:?}: persisted total {} replaced by {}",
                row.name,
                stored_total,
                record.total_time
            );
        }
        Ok(record)
    }
}

/// The total of a lap. Fails if the sum cannot be represented.
pub fn compute_total(
    lap_time: TimeValue,
    bonus_time: Adjustment,
    penalty_time: Adjustment,
) -> Result<TimeValue, LeaderboardError> {
    lap_time
        .0
        .checked_add(bonus_time.0)
        .and_then(|t| t.checked_add(penalty_time.0))
        .map(TimeValue)
        .ok_or_else(|| LeaderboardError::Format {
            reason: format!(
                "total of {} + {} + {} overflows",
                lap_time.0, bonus_time.0, penalty_time.0
            ),
        })
}

/// A record as it is persisted: every column is kept as text.
#[derive(Eq, PartialEq, Debug, Clone, Default, Hash)]
pub struct StoredRow {
    pub name: String,
    pub class_name: String,
    pub lap_number: String,
    pub lap_time: String,
    pub bonus_time: String,
    pub penalty_time: String,
    pub total_time: String,
}

/// A persisted row that could not be decoded. It is kept as is and excluded
/// from all rankings.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct QuarantinedRow {
    pub row: StoredRow,
    pub error: LeaderboardError,
}

/// Default bonus per competitor.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct BonusRegistry {
    bonuses: HashMap<String, Adjustment>,
}

impl BonusRegistry {
    pub fn new() -> BonusRegistry {
        BonusRegistry::default()
    }

    /// Registers a bonus. The first entry for a name wins.
    pub fn insert(&mut self, name: &str, bonus: Adjustment) {
        self.bonuses.entry(name.to_string()).or_insert(bonus);
    }

    pub fn get(&self, name: &str) -> Option<Adjustment> {
        self.bonuses.get(name).cloned()
    }

    /// The bonus to apply for this competitor.
    ///
    /// A zero bonus means that no bonus was given: the registry value is used
    /// when there is one.
    pub fn fill(&self, name: &str, bonus: Adjustment) -> Adjustment {
        if bonus.is_zero() {
            self.get(name).unwrap_or(bonus)
        } else {
            bonus
        }
    }

    pub fn len(&self) -> usize {
        self.bonuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bonuses.is_empty()
    }
}

// ******** Output data structures *********

/// Which records a ranked view covers.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum Scope {
    All,
    Class(String),
}

impl Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::All => write!(f, "all"),
            Scope::Class(c) => write!(f, "{}", c),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RankedEntry {
    /// 1-based position in the view.
    pub position: usize,
    pub rank: usize,
    /// The record, with the bonus filled from the registry and the total recomputed.
    pub record: LapRecord,
    /// Difference of total time with the previous entry of the view.
    pub delta: TimeValue,
    /// Index of the record in the store it was ranked from.
    pub source_index: usize,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ExcludedEntry {
    pub description: String,
    pub error: LeaderboardError,
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct RankedBoard {
    pub overall: Vec<RankedEntry>,
    /// One view per class, in the order in which classes first appear in the
    /// overall ranking.
    pub classes: Vec<(String, Vec<RankedEntry>)>,
    pub excluded: Vec<ExcludedEntry>,
}

impl RankedBoard {
    pub fn view(&self, scope: &Scope) -> &[RankedEntry] {
        match scope {
            Scope::All => &self.overall,
            Scope::Class(name) => self
                .classes
                .iter()
                .find(|(c, _)| c == name)
                .map(|(_, entries)| entries.as_slice())
                .unwrap_or(&[]),
        }
    }
}

/// Errors reported by the leaderboard. All of them are recoverable.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum LeaderboardError {
    /// A field of a submission is out of its bounds.
    Validation { field: &'static str, reason: String },
    /// Another record has the same name, class and lap number.
    DuplicateKey {
        name: String,
        class_name: String,
        lap_number: u32,
    },
    /// A position outside of the current ranking.
    Range { position: usize, size: usize },
    /// A time or a number that could not be read.
    Parse { input: String, reason: String },
    /// A time that could not be represented.
    Format { reason: String },
}

impl Error for LeaderboardError {}

impl Display for LeaderboardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeaderboardError::Validation { field, reason } => {
                write!(f, "invalid {}: {}", field, reason)
            }
            LeaderboardError::DuplicateKey {
                name,
                class_name,
                lap_number,
            } => write!(
                f,
                "{} (class {:?}, lap {}) already exists: same name+class+lap number — choose different values",
                name, class_name, lap_number
            ),
            LeaderboardError::Range { position, size } => write!(
                f,
                "position {} is out of range: expected a value between 1 and {}",
                position, size
            ),
            LeaderboardError::Parse { input, reason } => {
                write!(f, "could not read {:?}: {}", input, reason)
            }
            LeaderboardError::Format { reason } => write!(f, "invalid time format: {}", reason),
        }
    }
}

// ********* Configuration **********

pub const DEFAULT_CLASSES: [&str; 6] = ["A", "B", "ND", "86", "M", "N"];

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct BoardRules {
    /// The class labels accepted by the board.
    pub classes: Vec<String>,
    /// If false, a record may be submitted without a class (empty label).
    pub require_class: bool,
}

impl Default for BoardRules {
    fn default() -> Self {
        BoardRules {
            classes: DEFAULT_CLASSES.iter().map(|c| c.to_string()).collect(),
            require_class: true,
        }
    }
}
