//! Per-shot records from battle exports and the damage destination series.
//!
//! A shot is one combat row that deals normal damage (or, lacking a total,
//! lands on shields or hull). Besides the category events it produces, the
//! row says where its damage ended up: absorbed by a mitigation lane, or
//! applied to shields or hull. Series are built per shot or per round over the
//! selected shots.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::analysis::model::EntityId;
use crate::analysis::view::{matches, Direction, EntitySelection};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShotRecord {
    /// Ordinal of the originating record.
    pub sequence: u64,
    pub round_index: u32,
    pub source: EntityId,
    pub target: EntityId,
    /// 1-based count of damaging shots from `source` at `target`.
    pub shot_index: u32,
    pub is_crit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battle_event: Option<String>,
    pub total_normal: f64,
    pub total_iso: f64,
    pub mitigated_normal: f64,
    pub mitigated_iso: f64,
    pub mitigated_apex: f64,
    pub shield_damage: f64,
    pub hull_damage: f64,
    /// Lanes minus destinations; `None` when the row had no shield/hull columns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accounting_delta: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apex_barrier_estimate: Option<f64>,
}

impl ShotRecord {
    pub fn amount(&self, segment: Segment) -> f64 {
        match segment {
            Segment::Hull => self.hull_damage,
            Segment::Shield => self.shield_damage,
            Segment::MitigatedNormal => self.mitigated_normal,
            Segment::MitigatedIsolytic => self.mitigated_iso,
            Segment::MitigatedApex => self.mitigated_apex,
        }
    }
}

/// Where a shot's damage ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Hull,
    Shield,
    MitigatedNormal,
    MitigatedIsolytic,
    MitigatedApex,
}

impl Segment {
    pub const ALL: [Segment; 5] = [
        Segment::Hull,
        Segment::Shield,
        Segment::MitigatedNormal,
        Segment::MitigatedIsolytic,
        Segment::MitigatedApex,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Hull => "Hull",
            Self::Shield => "Shield",
            Self::MitigatedNormal => "Mitigated Normal",
            Self::MitigatedIsolytic => "Mitigated Isolytic",
            Self::MitigatedApex => "Mitigated Apex",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewBy {
    #[default]
    Shot,
    Round,
}

impl fmt::Display for ViewBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shot => f.write_str("shot"),
            Self::Round => f.write_str("round"),
        }
    }
}

impl FromStr for ViewBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shot" | "shots" => Ok(Self::Shot),
            "round" | "rounds" => Ok(Self::Round),
            other => Err(format!("unknown series axis '{other}' (expected shot or round)")),
        }
    }
}

/// Raw lane damage split by whether the shot was a critical hit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CritSplit {
    pub normal_crit: f64,
    pub normal_non_crit: f64,
    pub iso_crit: f64,
    pub iso_non_crit: f64,
}

impl CritSplit {
    fn add_shot(&mut self, shot: &ShotRecord) {
        if shot.is_crit {
            self.normal_crit += shot.total_normal;
            self.iso_crit += shot.total_iso;
        } else {
            self.normal_non_crit += shot.total_normal;
            self.iso_non_crit += shot.total_iso;
        }
    }

    pub fn crit(&self) -> f64 {
        self.normal_crit + self.iso_crit
    }

    pub fn non_crit(&self) -> f64 {
        self.normal_non_crit + self.iso_non_crit
    }
}

/// A point of a per-shot or per-round series.
trait SeriesPoint {
    fn open(position: u32, round_index: u32) -> Self;
    fn add_shot(&mut self, shot: &ShotRecord);
}

/// One x-axis position of the destination series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DestinationPoint {
    /// Shot number within the selection (1-based) or round index.
    pub position: u32,
    pub round_index: u32,
    pub shots: usize,
    pub crits: usize,
    pub segments: BTreeMap<Segment, f64>,
    pub raw: CritSplit,
}

impl SeriesPoint for DestinationPoint {
    fn open(position: u32, round_index: u32) -> Self {
        Self {
            position,
            round_index,
            shots: 0,
            crits: 0,
            segments: Segment::ALL.iter().map(|segment| (*segment, 0.0)).collect(),
            raw: CritSplit::default(),
        }
    }

    fn add_shot(&mut self, shot: &ShotRecord) {
        self.shots += 1;
        if shot.is_crit {
            self.crits += 1;
        }
        for segment in Segment::ALL {
            *self.segments.entry(segment).or_default() += shot.amount(segment);
        }
        self.raw.add_shot(shot);
    }
}

impl DestinationPoint {
    pub fn amount(&self, segment: Segment) -> f64 {
        self.segments.get(&segment).copied().unwrap_or_default()
    }

    pub fn total(&self) -> f64 {
        self.segments.values().sum()
    }
}

/// Critical hit counts at one x-axis position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CritPoint {
    pub position: u32,
    pub round_index: u32,
    pub shots: usize,
    pub crits: usize,
    /// `crits / shots`; 0 when there are no shots.
    pub crit_rate: f64,
}

impl SeriesPoint for CritPoint {
    fn open(position: u32, round_index: u32) -> Self {
        Self {
            position,
            round_index,
            shots: 0,
            crits: 0,
            crit_rate: 0.0,
        }
    }

    fn add_shot(&mut self, shot: &ShotRecord) {
        self.shots += 1;
        if shot.is_crit {
            self.crits += 1;
        }
        self.crit_rate = self.crits as f64 / self.shots as f64;
    }
}

/// Destination amounts for the selected shots, per shot or per round.
pub fn damage_destination(
    shots: &[ShotRecord],
    selection: &EntitySelection,
    direction: Direction,
    view_by: ViewBy,
) -> Vec<DestinationPoint> {
    series(shots, selection, direction, view_by)
}

/// Critical hit rate of the selected shots, per shot or per round.
pub fn crit_hits(
    shots: &[ShotRecord],
    selection: &EntitySelection,
    direction: Direction,
    view_by: ViewBy,
) -> Vec<CritPoint> {
    series(shots, selection, direction, view_by)
}

fn series<P: SeriesPoint>(
    shots: &[ShotRecord],
    selection: &EntitySelection,
    direction: Direction,
    view_by: ViewBy,
) -> Vec<P> {
    let selected = shots
        .iter()
        .filter(|shot| matches(selection, direction, shot.source, shot.target).is_some());

    match view_by {
        ViewBy::Shot => selected
            .enumerate()
            .map(|(i, shot)| {
                let mut point = P::open(i as u32 + 1, shot.round_index);
                point.add_shot(shot);
                point
            })
            .collect(),
        ViewBy::Round => {
            let mut rounds: BTreeMap<u32, P> = BTreeMap::new();
            for shot in selected {
                rounds
                    .entry(shot.round_index)
                    .or_insert_with(|| P::open(shot.round_index, shot.round_index))
                    .add_shot(shot);
            }
            rounds.into_values().collect()
        }
    }
}
