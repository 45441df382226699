mod config;
use log::{debug, info, warn};

pub use crate::config::*;

pub mod builder;
pub mod store;
pub mod timing;
pub mod validate;

pub use crate::store::Leaderboard;

// A record with its effective times, and where it came from.
#[derive(Eq, PartialEq, Debug, Clone)]
struct ScoredRecord {
    source_index: usize,
    record: LapRecord,
}

/// Ranks a set of records.
///
/// Every call recomputes everything from the full set:
/// * the bonus of each record is filled from the registry when it is zero, and the
///   total time is recomputed
/// * records are sorted by total time. The sort is stable: records with the same total
///   keep their relative order
/// * the overall view and every class view get competition ranks (ties share the
///   smallest rank, "1224") and successive deltas. A class view keeps the order of the
///   overall view.
///
/// Records whose total cannot be computed are excluded and reported, the other
/// records are still ranked.
pub fn run_ranking(records: &[LapRecord], registry: &BonusRegistry) -> RankedBoard {
    info!("Ranking {:?} records", records.len());

    let mut scored: Vec<ScoredRecord> = Vec::with_capacity(records.len());
    let mut excluded: Vec<ExcludedEntry> = Vec::new();
    for (source_index, r) in records.iter().enumerate() {
        let bonus = registry.fill(&r.name, r.bonus_time);
        match r.with_bonus(bonus) {
            Ok(record) => scored.push(ScoredRecord {
                source_index,
                record,
            }),
            Err(error) => {
                warn!("run_ranking: excluding {:?}: {}", r, error);
                excluded.push(ExcludedEntry {
                    description: format!("{} / {} / lap {}", r.name, r.class_name, r.lap_number),
                    error,
                });
            }
        }
    }

    scored.sort_by_key(|s| s.record.total_time);

    let mut overall = annotate(&scored);

    let mut class_names: Vec<String> = Vec::new();
    for s in scored.iter() {
        if !class_names.contains(&s.record.class_name) {
            class_names.push(s.record.class_name.clone());
        }
    }
    let classes: Vec<(String, Vec<RankedEntry>)> = class_names
        .into_iter()
        .map(|class_name| {
            let partition: Vec<ScoredRecord> = scored
                .iter()
                .filter(|s| s.record.class_name == class_name)
                .cloned()
                .collect();
            debug!(
                "run_ranking: class {:?}: {} records",
                class_name,
                partition.len()
            );
            (class_name, annotate(&partition))
        })
        .collect();

    // Sorting again by the same key does not change anything (the sort is stable).
    overall.sort_by_key(|e| e.record.total_time);

    RankedBoard {
        overall,
        classes,
        excluded,
    }
}

// Ranks and deltas for records already sorted by total time.
fn annotate(sorted: &[ScoredRecord]) -> Vec<RankedEntry> {
    let mut res: Vec<RankedEntry> = Vec::with_capacity(sorted.len());
    let mut previous: Option<TimeValue> = None;
    let mut rank: usize = 0;
    for (idx, s) in sorted.iter().enumerate() {
        let total = s.record.total_time;
        let delta = match previous {
            None => TimeValue::ZERO,
            Some(p) => total.since(p),
        };
        // Ties keep the rank of the first record with this total.
        if previous != Some(total) {
            rank = idx + 1;
        }
        res.push(RankedEntry {
            position: idx + 1,
            rank,
            record: s.record.clone(),
            delta,
            source_index: s.source_index,
        });
        previous = Some(total);
    }
    res
}
