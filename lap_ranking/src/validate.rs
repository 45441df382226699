use log::debug;

use crate::config::*;

/// Rejects a record whose (name, class, lap number) is already taken.
pub fn check_duplicate(
    candidate: &LapRecord,
    existing: &[LapRecord],
) -> Result<(), LeaderboardError> {
    if existing.iter().any(|r| r.same_identity(candidate)) {
        debug!(
            "check_duplicate: {:?} {:?} {:?} already present",
            candidate.name, candidate.class_name, candidate.lap_number
        );
        return Err(LeaderboardError::DuplicateKey {
            name: candidate.name.clone(),
            class_name: candidate.class_name.clone(),
            lap_number: candidate.lap_number,
        });
    }
    Ok(())
}

/// Field-level checks on a raw submission.
pub fn check_fields(raw: &RawLapInput, rules: &BoardRules) -> Result<(), LeaderboardError> {
    if raw.name.trim().is_empty() {
        return Err(LeaderboardError::Validation {
            field: "name",
            reason: "a name is required".to_string(),
        });
    }
    if raw.lap_number < 1 {
        return Err(LeaderboardError::Validation {
            field: "lap_number",
            reason: "lap numbers start at 1".to_string(),
        });
    }
    check_class(raw.class_name.trim(), rules)?;
    if raw.seconds > 59 {
        return Err(LeaderboardError::Validation {
            field: "seconds",
            reason: format!("expected a value between 0 and 59, got {}", raw.seconds),
        });
    }
    if raw.milliseconds > 999 {
        return Err(LeaderboardError::Validation {
            field: "milliseconds",
            reason: format!(
                "expected a value between 0 and 999, got {}",
                raw.milliseconds
            ),
        });
    }
    for (field, value) in [
        ("bonus_time", raw.bonus_seconds),
        ("penalty_time", raw.penalty_seconds),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(LeaderboardError::Validation {
                field,
                reason: format!("expected a non-negative number of seconds, got {}", value),
            });
        }
    }
    Ok(())
}

pub fn check_class(class_name: &str, rules: &BoardRules) -> Result<(), LeaderboardError> {
    match class_name {
        "" if rules.require_class => Err(LeaderboardError::Validation {
            field: "class",
            reason: format!("a class is required, one of {:?}", rules.classes),
        }),
        "" => Ok(()),
        c if rules.classes.iter().any(|known| known == c) => Ok(()),
        c => Err(LeaderboardError::Validation {
            field: "class",
            reason: format!("unknown class {:?}, expected one of {:?}", c, rules.classes),
        }),
    }
}
