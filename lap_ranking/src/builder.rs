pub use crate::config::*;
use crate::timing::to_millis;
use crate::validate::check_fields;

/// A builder turning form input into lap records.
///
/// The bonus registry is borrowed: records only copy the bonus they were
/// filled with.
///
/// ```
/// use lap_ranking::builder::RecordBuilder;
/// use lap_ranking::{BoardRules, BonusRegistry, RawLapInput, Adjustment};
/// # use lap_ranking::LeaderboardError;
///
/// let rules = BoardRules::default();
/// let mut registry = BonusRegistry::new();
/// registry.insert("Anna", Adjustment(2_000));
///
/// let builder = RecordBuilder::new(&rules).registry(&registry);
/// let record = builder.build(&RawLapInput {
///     name: "Anna".to_string(),
///     class_name: "A".to_string(),
///     lap_number: 1,
///     minutes: 1,
///     seconds: 30,
///     milliseconds: 500,
///     ..RawLapInput::default()
/// })?;
/// assert_eq!(record.total_time.to_string(), "1:32:500");
///
/// # Ok::<(), LeaderboardError>(())
/// ```
pub struct RecordBuilder<'a> {
    pub(crate) _rules: &'a BoardRules,
    pub(crate) _registry: Option<&'a BonusRegistry>,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(rules: &'a BoardRules) -> RecordBuilder<'a> {
        RecordBuilder {
            _rules: rules,
            _registry: None,
        }
    }

    pub fn registry(self, registry: &'a BonusRegistry) -> RecordBuilder<'a> {
        RecordBuilder {
            _rules: self._rules,
            _registry: Some(registry),
        }
    }

    /// Checks the input and computes the times of the record.
    ///
    /// It does not look for duplicates: this is the job of the store.
    pub fn build(&self, raw: &RawLapInput) -> Result<LapRecord, LeaderboardError> {
        check_fields(raw, self._rules)?;
        let name = raw.name.trim();
        let lap_time = to_millis(raw.minutes, raw.seconds, raw.milliseconds)?;
        let submitted_bonus = Adjustment::from_seconds(raw.bonus_seconds)?;
        let bonus_time = match self._registry {
            Some(registry) => registry.fill(name, submitted_bonus),
            None => submitted_bonus,
        };
        let penalty_time = Adjustment::from_seconds(raw.penalty_seconds)?;
        LapRecord::new(
            name,
            raw.class_name.trim(),
            raw.lap_number,
            lap_time,
            bonus_time,
            penalty_time,
        )
    }
}
