//! Entity- and direction-scoped projections of damage flows.
//!
//! A view never reshapes the data: rows are the selected flows as-is, and a
//! view dominated by one entity is reported that way.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::analysis::mitigation::Validity;
use crate::analysis::model::{DamageCategory, DamageFlow, EntityId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Flows whose source is selected.
    #[default]
    Outgoing,
    /// Flows whose target is selected.
    Incoming,
    Both,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outgoing => "outgoing",
            Self::Incoming => "incoming",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "outgoing" | "out" => Ok(Self::Outgoing),
            "incoming" | "in" => Ok(Self::Incoming),
            "both" => Ok(Self::Both),
            other => Err(format!(
                "unknown direction '{other}' (expected outgoing, incoming or both)"
            )),
        }
    }
}

/// Which side(s) of a flow matched the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Matched {
    Outgoing,
    Incoming,
    Both,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitySelection {
    /// No filter: every entity is selected.
    #[default]
    All,
    Only(BTreeSet<EntityId>),
}

impl EntitySelection {
    pub fn only(ids: impl IntoIterator<Item = EntityId>) -> Self {
        Self::Only(ids.into_iter().collect())
    }

    pub fn contains(&self, id: EntityId) -> bool {
        match self {
            Self::All => true,
            Self::Only(ids) => ids.contains(&id),
        }
    }
}

/// Which side of a (source, target) pair matches, if any.
pub fn matches(
    selection: &EntitySelection,
    direction: Direction,
    source: EntityId,
    target: EntityId,
) -> Option<Matched> {
    let outgoing = selection.contains(source);
    let incoming = selection.contains(target);
    match direction {
        Direction::Outgoing => outgoing.then_some(Matched::Outgoing),
        Direction::Incoming => incoming.then_some(Matched::Incoming),
        Direction::Both => match (outgoing, incoming) {
            (true, true) => Some(Matched::Both),
            (true, false) => Some(Matched::Outgoing),
            (false, true) => Some(Matched::Incoming),
            (false, false) => None,
        },
    }
}

/// Raw, mitigated and post-mitigation sums.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DamageTotals {
    pub raw: f64,
    pub mitigated: f64,
    pub post: f64,
}

impl DamageTotals {
    pub fn add_flow(&mut self, flow: &DamageFlow) {
        self.raw += flow.total_raw;
        self.mitigated += flow.total_mitigated;
        self.post += flow.total_post;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopedRow<'a> {
    #[serde(flatten)]
    pub flow: &'a DamageFlow,
    pub matched: Matched,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundAggregate {
    pub round_index: u32,
    pub by_category: BTreeMap<DamageCategory, DamageTotals>,
    pub total: DamageTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopedView<'a> {
    pub direction: Direction,
    pub selection: EntitySelection,
    pub rows: Vec<ScopedRow<'a>>,
    pub rounds: Vec<RoundAggregate>,
    pub totals: DamageTotals,
    pub invalid_rows: usize,
}

impl ScopedView<'_> {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub fn build_view<'a>(
    flows: &'a [DamageFlow],
    selection: &EntitySelection,
    direction: Direction,
) -> ScopedView<'a> {
    let mut rows = Vec::new();
    let mut rounds: BTreeMap<u32, RoundAggregate> = BTreeMap::new();
    let mut totals = DamageTotals::default();
    let mut invalid_rows = 0;

    for flow in flows {
        let Some(matched) = matches(selection, direction, flow.source, flow.target) else {
            continue;
        };
        let valid = Validity::of_post(flow.total_post).is_valid();
        if !valid {
            invalid_rows += 1;
        }

        let round = rounds
            .entry(flow.round_index)
            .or_insert_with(|| RoundAggregate {
                round_index: flow.round_index,
                by_category: BTreeMap::new(),
                total: DamageTotals::default(),
            });
        round.by_category.entry(flow.category).or_default().add_flow(flow);
        round.total.add_flow(flow);
        totals.add_flow(flow);

        rows.push(ScopedRow {
            flow,
            matched,
            valid,
        });
    }

    tracing::debug!(
        direction = direction.as_str(),
        rows = rows.len(),
        invalid_rows,
        "built scoped view"
    );
    ScopedView {
        direction,
        selection: selection.clone(),
        rows,
        rounds: rounds.into_values().collect(),
        totals,
        invalid_rows,
    }
}
