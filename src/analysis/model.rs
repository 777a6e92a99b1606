use std::fmt;

use serde::{Deserialize, Serialize};

/// Tolerance used when comparing summed damage values.
pub const EPSILON: f64 = 1e-9;

/// Stable identifier handed out by the entity registry, in first-seen order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Ship,
    Player,
    Npc,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ship => "ship",
            Self::Player => "player",
            Self::Npc => "npc",
        }
    }
}

/// A combatant seen in the log. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub id: EntityId,
    pub display_name: String,
    pub kind: EntityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alliance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ship: Option<String>,
}

impl Entity {
    /// Full label in the `name [alliance] — ship` form. Never abbreviated.
    pub fn label(&self) -> String {
        let mut label = self.display_name.clone();
        if let Some(alliance) = &self.alliance {
            label.push_str(&format!(" [{alliance}]"));
        }
        if let Some(ship) = &self.ship {
            if ship != &self.display_name {
                label.push_str(&format!(" — {ship}"));
            }
        }
        label
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageCategory {
    Normal,
    Isolytic,
    Apex,
    Other,
}

impl DamageCategory {
    pub const ALL: [DamageCategory; 4] = [
        DamageCategory::Normal,
        DamageCategory::Isolytic,
        DamageCategory::Apex,
        DamageCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Isolytic => "isolytic",
            Self::Apex => "apex",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for DamageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single damage instance normalized from a raw record.
///
/// `round_index` is the round the log reported. Segmentation may place a
/// regressed event in a later round; the [Round] it lands in is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombatEvent {
    pub round_index: u32,
    pub source: EntityId,
    pub target: EntityId,
    pub category: DamageCategory,
    pub raw_damage: f64,
    pub mitigated_amount: f64,
    /// Ordinal of the originating record; events split from one record share it.
    pub sequence: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shot_index: Option<u32>,
    pub is_crit: bool,
}

impl CombatEvent {
    /// May be negative when the record reported more mitigation than raw damage.
    pub fn post_mitigation(&self) -> f64 {
        self.raw_damage - self.mitigated_amount
    }
}

/// Events of one round, borrowed from the parsed log in log order.
#[derive(Debug, Clone, PartialEq)]
pub struct Round<'a> {
    pub index: u32,
    pub events: Vec<&'a CombatEvent>,
}

impl<'a> Round<'a> {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            events: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Aggregate of all events sharing (round, source, target, category).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DamageFlow {
    pub round_index: u32,
    pub source: EntityId,
    pub target: EntityId,
    pub category: DamageCategory,
    pub total_raw: f64,
    pub total_mitigated: f64,
    pub total_post: f64,
    pub event_count: usize,
    /// Ordinals of the contributing records, ascending and deduplicated.
    pub sequences: Vec<u64>,
}

impl DamageFlow {
    pub fn pair(&self) -> (u32, EntityId, EntityId) {
        (self.round_index, self.source, self.target)
    }
}
