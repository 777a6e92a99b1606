//! Mitigation decomposition of damage flows.
//!
//! Every flow splits into pre-mitigation (raw), mitigated and post-mitigation
//! damage, plus its share of the raw damage its (round, source, target) pair
//! dealt across all categories. A negative post value means the log reported
//! more mitigation than damage; the row is kept as-is and marked invalid.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::analysis::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::analysis::flows::canonical_sum;
use crate::analysis::model::{DamageCategory, DamageFlow, EntityId, Round, EPSILON};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Validity {
    Valid,
    /// Post-mitigation fell below zero by `deficit`.
    Invalid { deficit: f64 },
}

impl Validity {
    /// Invalid when `post_mitigation` is negative beyond [EPSILON].
    pub fn of_post(post_mitigation: f64) -> Self {
        if post_mitigation < -EPSILON {
            Self::Invalid {
                deficit: -post_mitigation,
            }
        } else {
            Self::Valid
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decomposition<'a> {
    #[serde(flatten)]
    pub flow: &'a DamageFlow,
    pub pre_mitigation: f64,
    pub mitigated: f64,
    pub post_mitigation: f64,
    /// Fraction of the pair's raw damage in this round carried by this category.
    pub share_of_raw: f64,
    pub validity: Validity,
}

impl Decomposition<'_> {
    pub fn is_valid(&self) -> bool {
        self.validity.is_valid()
    }
}

/// Decompose one flow given its pair's raw total.
pub fn decompose_flow(flow: &DamageFlow, pair_raw_total: f64) -> Decomposition<'_> {
    let post_mitigation = flow.total_raw - flow.total_mitigated;
    let share_of_raw = if pair_raw_total.abs() > EPSILON {
        flow.total_raw / pair_raw_total
    } else {
        0.0
    };
    let validity = Validity::of_post(post_mitigation);
    Decomposition {
        flow,
        pre_mitigation: flow.total_raw,
        mitigated: flow.total_mitigated,
        post_mitigation,
        share_of_raw,
        validity,
    }
}

/// Decompose every flow, in input order. Invalid rows are reported, never clamped.
pub fn decompose<'a>(
    flows: &'a [DamageFlow],
    sink: &mut dyn DiagnosticSink,
) -> Vec<Decomposition<'a>> {
    let mut pair_raw: BTreeMap<(u32, EntityId, EntityId), Vec<f64>> = BTreeMap::new();
    for flow in flows {
        pair_raw.entry(flow.pair()).or_default().push(flow.total_raw);
    }
    let pair_raw: BTreeMap<_, f64> = pair_raw
        .into_iter()
        .map(|(pair, mut raws)| (pair, canonical_sum(&mut raws)))
        .collect();

    let decompositions: Vec<Decomposition<'a>> = flows
        .iter()
        .map(|flow| {
            let total = pair_raw.get(&flow.pair()).copied().unwrap_or_default();
            decompose_flow(flow, total)
        })
        .collect();

    for row in &decompositions {
        if let Validity::Invalid { deficit } = row.validity {
            let flow = row.flow;
            let mut diagnostic = Diagnostic::new(
                DiagnosticKind::MitigationInvariantViolation,
                format!(
                    "round {} {} -> {} {}: mitigated {} exceeds raw {} by {deficit}",
                    flow.round_index,
                    flow.source,
                    flow.target,
                    flow.category,
                    flow.total_mitigated,
                    flow.total_raw
                ),
            );
            // Points at the first contributing record; the excerpt lists all of them.
            if let Some(&first) = flow.sequences.first() {
                diagnostic =
                    diagnostic.with_record(first, serde_json::to_string(flow).unwrap_or_default());
            }
            sink.report(diagnostic);
        }
    }
    decompositions
}

/// Category totals for one (round, source, target) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairBreakdown {
    pub round_index: u32,
    pub source: EntityId,
    pub target: EntityId,
    pub total_raw: f64,
    pub total_mitigated: f64,
    pub total_post: f64,
    pub categories: BTreeMap<DamageCategory, f64>,
    pub invalid_categories: usize,
}

/// Fold decompositions into one row per pair, summing post-mitigation across categories.
pub fn pair_breakdowns(rows: &[Decomposition<'_>]) -> Vec<PairBreakdown> {
    let mut pairs: BTreeMap<(u32, EntityId, EntityId), PairBreakdown> = BTreeMap::new();
    for row in rows {
        let flow = row.flow;
        let entry = pairs.entry(flow.pair()).or_insert_with(|| PairBreakdown {
            round_index: flow.round_index,
            source: flow.source,
            target: flow.target,
            total_raw: 0.0,
            total_mitigated: 0.0,
            total_post: 0.0,
            categories: BTreeMap::new(),
            invalid_categories: 0,
        });
        entry.total_raw += row.pre_mitigation;
        entry.total_mitigated += row.mitigated;
        entry.total_post += row.post_mitigation;
        *entry.categories.entry(flow.category).or_default() += row.post_mitigation;
        if !row.is_valid() {
            entry.invalid_categories += 1;
        }
    }
    pairs.into_values().collect()
}

/// Post-mitigation per pair straight from segmented events, bypassing
/// aggregation. Events are keyed by the round they were segmented into.
pub fn direct_post_totals(rounds: &[Round<'_>]) -> BTreeMap<(u32, EntityId, EntityId), f64> {
    let mut totals: BTreeMap<(u32, EntityId, EntityId), f64> = BTreeMap::new();
    for round in rounds {
        for event in &round.events {
            *totals
                .entry((round.index, event.source, event.target))
                .or_default() += event.post_mitigation();
        }
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::flows::aggregate_rounds;
    use crate::analysis::model::CombatEvent;
    use crate::analysis::rounds::segment;

    fn flow(category: DamageCategory, raw: f64, mitigated: f64) -> DamageFlow {
        DamageFlow {
            round_index: 1,
            source: EntityId(0),
            target: EntityId(1),
            category,
            total_raw: raw,
            total_mitigated: mitigated,
            total_post: raw - mitigated,
            event_count: 1,
            sequences: vec![0],
        }
    }

    #[test]
    fn shares_split_pair_raw_total() {
        let flows = vec![
            flow(DamageCategory::Normal, 100.0, 20.0),
            flow(DamageCategory::Isolytic, 50.0, 0.0),
        ];
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let rows = decompose(&flows, &mut diagnostics);
        assert!((rows[0].share_of_raw - 2.0 / 3.0).abs() < EPSILON);
        assert!((rows[1].share_of_raw - 1.0 / 3.0).abs() < EPSILON);
        assert_eq!(rows[0].post_mitigation, 80.0);
        assert!(rows.iter().all(Decomposition::is_valid));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn negative_post_is_flagged_not_clamped() {
        let flows = vec![
            flow(DamageCategory::Normal, 10.0, 0.0),
            DamageFlow {
                sequences: vec![3, 7],
                ..flow(DamageCategory::Apex, 30.0, 45.0)
            },
        ];
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let rows = decompose(&flows, &mut diagnostics);
        assert_eq!(rows[1].post_mitigation, -15.0);
        assert_eq!(rows[1].validity, Validity::Invalid { deficit: 15.0 });
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].kind,
            DiagnosticKind::MitigationInvariantViolation
        );
        let record = diagnostics[0].record.as_ref().expect("offending record");
        assert_eq!(record.ordinal, 3);
        assert!(record.excerpt.contains("\"sequences\":[3,7]"));
    }

    #[test]
    fn regressed_events_conserve_in_their_assigned_round() {
        let event = |round_index: u32, raw: f64, sequence: u64| CombatEvent {
            round_index,
            source: EntityId(0),
            target: EntityId(1),
            category: DamageCategory::Normal,
            raw_damage: raw,
            mitigated_amount: 0.0,
            sequence,
            shot_index: None,
            is_crit: false,
        };
        let events = vec![event(1, 10.0, 0), event(2, 20.0, 1), event(1, 5.0, 2)];
        let rounds = segment(&events, &mut Vec::<Diagnostic>::new());
        let flows = aggregate_rounds(&rounds);
        let pairs = pair_breakdowns(&decompose(&flows, &mut Vec::<Diagnostic>::new()));
        let direct = direct_post_totals(&rounds);

        assert_eq!(pairs.len(), direct.len());
        for pair in &pairs {
            assert_eq!(
                pair.total_post,
                direct[&(pair.round_index, pair.source, pair.target)]
            );
        }
        assert_eq!(direct[&(2, EntityId(0), EntityId(1))], 25.0);
        assert_eq!(direct[&(1, EntityId(0), EntityId(1))], 10.0);
    }

    #[test]
    fn zero_raw_pair_has_zero_share() {
        let flows = vec![flow(DamageCategory::Other, 0.0, 0.0)];
        let rows = decompose(&flows, &mut Vec::<Diagnostic>::new());
        assert_eq!(rows[0].share_of_raw, 0.0);
    }

    #[test]
    fn pair_breakdown_sums_categories() {
        let flows = vec![
            flow(DamageCategory::Normal, 100.0, 20.0),
            flow(DamageCategory::Isolytic, 50.0, 0.0),
        ];
        let rows = decompose(&flows, &mut Vec::<Diagnostic>::new());
        let pairs = pair_breakdowns(&rows);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].total_post, 130.0);
        assert_eq!(pairs[0].categories[&DamageCategory::Isolytic], 50.0);
    }
}
