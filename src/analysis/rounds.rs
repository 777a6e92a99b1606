//! Round segmentation.
//!
//! Events are grouped in log order by their round index. Only rounds that
//! carry events are emitted; skipped indices are reported, not filled. An
//! event whose round is lower than one already opened cannot reopen that
//! round; it is kept in the latest round and reported. A [Round]'s index is
//! authoritative for its events, including regressed ones.

use crate::analysis::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::analysis::model::{CombatEvent, Round};

pub fn segment<'a, I>(events: I, sink: &mut dyn DiagnosticSink) -> Vec<Round<'a>>
where
    I: IntoIterator<Item = &'a CombatEvent>,
{
    let mut rounds: Vec<Round<'a>> = Vec::new();
    let mut regressions = 0usize;
    let mut gaps = 0usize;

    for event in events {
        let Some(last) = rounds.last() else {
            let mut round = Round::new(event.round_index);
            round.events.push(event);
            rounds.push(round);
            continue;
        };
        let current = last.index;

        if event.round_index > current {
            if event.round_index - current > 1 {
                gaps += 1;
                sink.report(
                    Diagnostic::new(
                        DiagnosticKind::RoundGap,
                        format!(
                            "no events for rounds {}..={}; jumped from round {current} to {}",
                            current + 1,
                            event.round_index - 1,
                            event.round_index
                        ),
                    )
                    .with_record(event.sequence, format!("round {}", event.round_index)),
                );
            }
            let mut round = Round::new(event.round_index);
            round.events.push(event);
            rounds.push(round);
            continue;
        }

        if event.round_index < current {
            regressions += 1;
            sink.report(
                Diagnostic::new(
                    DiagnosticKind::RoundRegression,
                    format!(
                        "event in round {} arrived after round {current}; kept in round {current}",
                        event.round_index
                    ),
                )
                .with_record(event.sequence, format!("round {}", event.round_index)),
            );
        }
        if let Some(last) = rounds.last_mut() {
            last.events.push(event);
        }
    }

    tracing::debug!(rounds = rounds.len(), regressions, gaps, "segmented rounds");
    rounds
}

/// Events of all rounds in round order.
pub fn flatten<'a>(rounds: &[Round<'a>]) -> Vec<&'a CombatEvent> {
    rounds
        .iter()
        .flat_map(|round| round.events.iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::model::{DamageCategory, EntityId};

    fn event(round_index: u32, sequence: u64) -> CombatEvent {
        CombatEvent {
            round_index,
            source: EntityId(0),
            target: EntityId(1),
            category: DamageCategory::Normal,
            raw_damage: 1.0,
            mitigated_amount: 0.0,
            sequence,
            shot_index: None,
            is_crit: false,
        }
    }

    fn shape(rounds: &[Round<'_>]) -> Vec<(u32, Vec<u64>)> {
        rounds
            .iter()
            .map(|round| {
                (
                    round.index,
                    round.events.iter().map(|e| e.sequence).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn skipped_rounds_are_reported_not_filled() {
        let events = vec![event(1, 0), event(1, 1), event(3, 2), event(4, 3)];
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let rounds = segment(&events, &mut diagnostics);
        assert_eq!(
            shape(&rounds),
            vec![(1, vec![0, 1]), (3, vec![2]), (4, vec![3])]
        );
        assert!(rounds.iter().all(|round| !round.is_empty()));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::RoundGap);
        assert_eq!(diagnostics[0].record.as_ref().map(|r| r.ordinal), Some(2));
    }

    #[test]
    fn huge_round_jump_stays_two_rounds() {
        let events = vec![event(1, 0), event(20_000_000, 1), event(u32::MAX, 2)];
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let rounds = segment(&events, &mut diagnostics);
        assert_eq!(
            shape(&rounds),
            vec![(1, vec![0]), (20_000_000, vec![1]), (u32::MAX, vec![2])]
        );
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn regressed_event_stays_in_latest_round() {
        let events = vec![event(1, 0), event(2, 1), event(1, 2), event(2, 3)];
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let rounds = segment(&events, &mut diagnostics);
        assert_eq!(shape(&rounds), vec![(1, vec![0]), (2, vec![1, 2, 3])]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::RoundRegression);
        assert_eq!(diagnostics[0].record.as_ref().map(|r| r.ordinal), Some(2));
    }

    #[test]
    fn resegmenting_flattened_rounds_is_stable() {
        let events = vec![event(2, 0), event(4, 1), event(3, 2), event(5, 3)];
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let first = segment(&events, &mut diagnostics);
        let again = segment(flatten(&first), &mut Vec::<Diagnostic>::new());
        assert_eq!(shape(&first), shape(&again));
    }
}
