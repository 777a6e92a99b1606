//! Tokenized raw records, one variant per known log schema.
//!
//! Values stay close to the source text so the parser can tell a missing cell
//! from a non-numeric one. Schema drift lives here and in the parser only.

use serde::{Deserialize, Serialize};

use crate::analysis::model::EntityKind;

/// Cells that mean "no value" in battle exports.
pub const NA_TOKENS: &[&str] = &["--", "—", "–", ""];

/// A scalar cell: JSON logs carry numbers, text exports carry strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawField {
    Number(f64),
    Text(String),
}

impl RawField {
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Number(_) => false,
            Self::Text(text) => NA_TOKENS.contains(&text.trim()),
        }
    }

    /// Parse as a number, accepting thousands separators. `Ok(None)` for NA cells.
    pub fn to_number(&self) -> Result<Option<f64>, String> {
        match self {
            Self::Number(value) => Ok(Some(*value)),
            Self::Text(_) if self.is_missing() => Ok(None),
            Self::Text(text) => {
                let cleaned = text.trim().replace(',', "");
                cleaned
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| format!("'{}' is not numeric", text.trim()))
            }
        }
    }
}

impl From<f64> for RawField {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for RawField {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "schema", rename_all = "snake_case")]
pub enum RawRecord {
    Flat(FlatRecord),
    Battle(BattleRecord),
    Marker(MarkerRecord),
}

/// One damage instance of one category between two entities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlatRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<RawField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_kind: Option<EntityKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_kind: Option<EntityKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_damage: Option<RawField>,
    #[serde(alias = "mitigated_amount", skip_serializing_if = "Option::is_none")]
    pub mitigated: Option<RawField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shot_index: Option<u32>,
    pub is_crit: bool,
}

/// One row of the combat section of a battle export. Lanes are per shot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<RawField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battle_event: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Overrides `event_type` when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ability_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_crit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attacker_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attacker_alliance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attacker_ship: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attacker_is_armada: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_alliance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_ship: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_is_armada: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_normal: Option<RawField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mitigated_normal: Option<RawField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_iso: Option<RawField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mitigated_iso: Option<RawField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mitigated_apex: Option<RawField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shield_damage: Option<RawField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hull_damage: Option<RawField>,
}

impl BattleRecord {
    pub fn resolved_event_type(&self) -> Option<&str> {
        present(self.ability_type.as_deref()).or_else(|| present(self.event_type.as_deref()))
    }

    pub fn crit(&self) -> bool {
        yes(self.is_crit.as_deref())
    }
}

/// Round boundary marker; only meaningful under marker boundary mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Trimmed text, or `None` for NA tokens.
pub fn present(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|text| !NA_TOKENS.contains(text))
}

pub fn yes(value: Option<&str>) -> bool {
    present(value).is_some_and(|text| text.eq_ignore_ascii_case("YES"))
}
