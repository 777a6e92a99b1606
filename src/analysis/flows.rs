//! Damage flow aggregation per round.
//!
//! Each (source, target, category) key sums its events' raw and mitigated
//! damage. Contributions are sorted before summing so the totals are
//! bit-identical for any ordering of the round's events.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::analysis::model::{DamageCategory, DamageFlow, EntityId, Round};
use crate::parallel::WorkerPool;

type FlowKey = (EntityId, EntityId, DamageCategory);

#[derive(Default)]
struct Contributions {
    raw: Vec<f64>,
    mitigated: Vec<f64>,
    sequences: Vec<u64>,
}

/// Sum in ascending order.
pub fn canonical_sum(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    values.iter().sum()
}

/// Flows of one round, ordered by (source, target, category).
pub fn aggregate(round: &Round<'_>) -> Vec<DamageFlow> {
    let mut keyed: BTreeMap<FlowKey, Contributions> = BTreeMap::new();
    for event in &round.events {
        let entry = keyed
            .entry((event.source, event.target, event.category))
            .or_default();
        entry.raw.push(event.raw_damage);
        entry.mitigated.push(event.mitigated_amount);
        entry.sequences.push(event.sequence);
    }

    keyed
        .into_iter()
        .map(|((source, target, category), mut contributions)| {
            let total_raw = canonical_sum(&mut contributions.raw);
            let total_mitigated = canonical_sum(&mut contributions.mitigated);
            let event_count = contributions.raw.len();
            contributions.sequences.sort_unstable();
            contributions.sequences.dedup();
            DamageFlow {
                round_index: round.index,
                source,
                target,
                category,
                total_raw,
                total_mitigated,
                total_post: total_raw - total_mitigated,
                event_count,
                sequences: contributions.sequences,
            }
        })
        .collect()
}

/// Flows of every round, aggregated in parallel on the global pool, in round order.
pub fn aggregate_rounds(rounds: &[Round<'_>]) -> Vec<DamageFlow> {
    let per_round: Vec<Vec<DamageFlow>> = rounds.par_iter().map(aggregate).collect();
    per_round.into_iter().flatten().collect()
}

pub fn aggregate_rounds_with(pool: &WorkerPool, rounds: &[Round<'_>]) -> Vec<DamageFlow> {
    pool.install(|| aggregate_rounds(rounds))
}
