//! Normalizes raw records into [CombatEvent]s.
//!
//! Each record schema is mapped onto the single event shape here. Bad records
//! are skipped with a diagnostic; only an input that yields no events at all
//! is fatal.
//!
//! Battle rows carry per-shot lanes. Lane mitigation (normal, isolytic) is
//! applied first; the apex barrier then absorbs part of the combined
//! remainder. The absorbed amount is carved out of the lanes' raw damage in
//! proportion to each lane's remainder and emitted as a fully mitigated apex
//! event, so raw, mitigated and post totals all match the row:
//!
//! ```text
//! total_normal + total_iso = mitigated_normal + mitigated_iso + mitigated_apex + applied
//! ```

use std::collections::HashMap;

use serde::Serialize;

use crate::analysis::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::analysis::error::AnalysisError;
use crate::analysis::model::{CombatEvent, DamageCategory, EntityId, EntityKind};
use crate::analysis::record::{present, yes, BattleRecord, FlatRecord, RawField, RawRecord};
use crate::analysis::registry::{EntityRegistry, Sighting};
use crate::analysis::shots::ShotRecord;
use crate::config::{EngineConfig, RoundBoundary};

/// Scale used to express apex mitigation as a barrier value.
pub const APEX_BARRIER_SCALE: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    pub records: usize,
    pub events: usize,
    pub shots: usize,
    pub malformed: usize,
    /// Well-formed records that carry no damage (officer procs, misses, markers in field mode).
    pub ignored: usize,
    pub markers: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedLog {
    pub events: Vec<CombatEvent>,
    pub shots: Vec<ShotRecord>,
    pub stats: ParseStats,
}

/// Parse records in log order, resolving entities through `registry`.
pub fn parse_records(
    records: &[RawRecord],
    config: &EngineConfig,
    registry: &mut EntityRegistry,
    sink: &mut dyn DiagnosticSink,
) -> Result<ParsedLog, AnalysisError> {
    if records.is_empty() {
        return Err(AnalysisError::unreadable("log contains no records"));
    }

    let mut parser = LogParser {
        config,
        registry,
        sink,
        parsed: ParsedLog::default(),
        marker_round: 0,
        shot_counters: HashMap::new(),
    };
    for (ordinal, record) in records.iter().enumerate() {
        parser.parsed.stats.records += 1;
        parser.parse_record(ordinal as u64, record);
    }
    parser.finish()
}

struct LogParser<'a> {
    config: &'a EngineConfig,
    registry: &'a mut EntityRegistry,
    sink: &'a mut dyn DiagnosticSink,
    parsed: ParsedLog,
    marker_round: u32,
    shot_counters: HashMap<(EntityId, EntityId), u32>,
}

/// Lane values of one battle row after numeric coercion; missing cells are 0.
#[derive(Debug, Clone, Copy, Default)]
struct Lanes {
    total_normal: f64,
    mitigated_normal: f64,
    total_iso: f64,
    mitigated_iso: f64,
    mitigated_apex: f64,
    shield: f64,
    hull: f64,
    has_total_normal: bool,
    has_pools: bool,
}

impl Lanes {
    /// A shot deals normal damage, or, when the row has no total, lands on shields or hull.
    fn is_shot(&self) -> bool {
        if self.has_total_normal {
            self.total_normal > 0.0
        } else {
            self.shield > 0.0 || self.hull > 0.0
        }
    }
}

impl<'a> LogParser<'a> {
    fn parse_record(&mut self, ordinal: u64, record: &RawRecord) {
        let outcome = match record {
            RawRecord::Flat(flat) => self.parse_flat(ordinal, flat),
            RawRecord::Battle(row) => self.parse_battle(ordinal, row),
            RawRecord::Marker(_) => {
                self.parsed.stats.markers += 1;
                if self.config.round_boundary == RoundBoundary::Marker {
                    self.marker_round += 1;
                } else {
                    self.parsed.stats.ignored += 1;
                    tracing::debug!(ordinal, "round marker ignored under field boundary mode");
                }
                Ok(())
            }
        };
        if let Err(reason) = outcome {
            self.parsed.stats.malformed += 1;
            self.sink.report(
                Diagnostic::new(DiagnosticKind::MalformedRecord, reason)
                    .with_record(ordinal, excerpt(record)),
            );
        }
    }

    fn parse_flat(&mut self, ordinal: u64, flat: &FlatRecord) -> Result<(), String> {
        let round_index = self.round_index(flat.round.as_ref())?;
        let source = required_text(flat.source.as_deref(), "source")?;
        let target = required_text(flat.target.as_deref(), "target")?;
        let label = required_text(flat.category.as_deref(), "category")?;
        let raw_damage = required_amount(flat.raw_damage.as_ref(), "raw_damage")?;
        let mitigated_amount = optional_amount(flat.mitigated.as_ref(), "mitigated")?;
        let category = self.category(ordinal, label);

        let source_kind = flat.source_kind.unwrap_or_else(|| self.default_kind(source));
        let target_kind = flat.target_kind.unwrap_or_else(|| self.default_kind(target));
        let source = self.registry.resolve(source, source_kind);
        let target = self.registry.resolve(target, target_kind);

        self.push_event(CombatEvent {
            round_index,
            source,
            target,
            category,
            raw_damage,
            mitigated_amount,
            sequence: ordinal,
            shot_index: flat.shot_index,
            is_crit: flat.is_crit,
        });
        Ok(())
    }

    fn parse_battle(&mut self, ordinal: u64, row: &BattleRecord) -> Result<(), String> {
        let Some(event_type) = row.resolved_event_type() else {
            return Err("missing event type".to_string());
        };
        if !self.config.is_damage_event_type(event_type) {
            self.parsed.stats.ignored += 1;
            return Ok(());
        }

        let round_index = self.round_index(row.round.as_ref())?;
        let lanes = Lanes {
            total_normal: optional_amount(row.total_normal.as_ref(), "total damage")?,
            mitigated_normal: optional_amount(row.mitigated_normal.as_ref(), "mitigated damage")?,
            total_iso: optional_amount(row.total_iso.as_ref(), "total isolytic damage")?,
            mitigated_iso: optional_amount(
                row.mitigated_iso.as_ref(),
                "mitigated isolytic damage",
            )?,
            mitigated_apex: optional_amount(
                row.mitigated_apex.as_ref(),
                "mitigated apex barrier",
            )?,
            shield: optional_amount(row.shield_damage.as_ref(), "shield damage")?,
            hull: optional_amount(row.hull_damage.as_ref(), "hull damage")?,
            has_total_normal: is_present(row.total_normal.as_ref()),
            has_pools: is_present(row.shield_damage.as_ref())
                || is_present(row.hull_damage.as_ref()),
        };

        let attacker = self.battle_sighting(
            row.attacker_name.as_deref(),
            row.attacker_alliance.as_deref(),
            row.attacker_ship.as_deref(),
            row.attacker_is_armada.as_deref(),
        );
        let target = self.battle_sighting(
            row.target_name.as_deref(),
            row.target_alliance.as_deref(),
            row.target_ship.as_deref(),
            row.target_is_armada.as_deref(),
        );
        let attacker = attacker.ok_or_else(|| "missing attacker".to_string())?;
        let target = target.ok_or_else(|| "missing target".to_string())?;

        let lane_events = split_lanes(&lanes);
        let is_shot = lanes.is_shot();
        if lane_events.is_empty() && !is_shot {
            // A miss or a zero-damage hit.
            self.parsed.stats.ignored += 1;
            return Ok(());
        }

        let source = self.registry.resolve_sighting(attacker);
        let target = self.registry.resolve_sighting(target);
        // Isolytic-only and mitigation-only rows carry damage but are not shots.
        let shot_index = is_shot.then(|| {
            let counter = self.shot_counters.entry((source, target)).or_insert(0);
            *counter += 1;
            *counter
        });
        let is_crit = row.crit();

        for (category, raw_damage, mitigated_amount) in lane_events {
            self.push_event(CombatEvent {
                round_index,
                source,
                target,
                category,
                raw_damage,
                mitigated_amount,
                sequence: ordinal,
                shot_index,
                is_crit,
            });
        }

        let accounting_delta = lanes.has_pools.then(|| {
            (lanes.total_iso + lanes.total_normal)
                - (lanes.mitigated_iso
                    + lanes.mitigated_normal
                    + lanes.mitigated_apex
                    + lanes.shield
                    + lanes.hull)
        });
        if let Some(delta) = accounting_delta {
            if delta.abs() > self.config.accounting_tolerance {
                self.sink.report(
                    Diagnostic::new(
                        DiagnosticKind::AccountingMismatch,
                        format!(
                            "lanes and pools disagree by {delta:.3} (tolerance {})",
                            self.config.accounting_tolerance
                        ),
                    )
                    .with_record(ordinal, excerpt_battle(row)),
                );
            }
        }

        let Some(shot_index) = shot_index else {
            return Ok(());
        };
        let applied = lanes.shield + lanes.hull;
        let apex_barrier_estimate = (lanes.mitigated_apex > 0.0 && applied > 0.0)
            .then(|| (APEX_BARRIER_SCALE * lanes.mitigated_apex / applied).round());

        self.parsed.shots.push(ShotRecord {
            sequence: ordinal,
            round_index,
            source,
            target,
            shot_index,
            is_crit,
            battle_event: present(row.battle_event.as_deref()).map(str::to_string),
            total_normal: lanes.total_normal,
            total_iso: lanes.total_iso,
            mitigated_normal: lanes.mitigated_normal,
            mitigated_iso: lanes.mitigated_iso,
            mitigated_apex: lanes.mitigated_apex,
            shield_damage: lanes.shield,
            hull_damage: lanes.hull,
            accounting_delta,
            apex_barrier_estimate,
        });
        Ok(())
    }

    fn battle_sighting<'r>(
        &self,
        name: Option<&'r str>,
        alliance: Option<&'r str>,
        ship: Option<&'r str>,
        armada: Option<&'r str>,
    ) -> Option<Sighting<'r>> {
        let name = present(name);
        let ship = present(ship);
        let alliance = present(alliance);
        let identifier = name.or(ship)?;
        let kind = if self.config.is_npc(identifier) {
            EntityKind::Npc
        } else if alliance.is_some() {
            EntityKind::Player
        } else if yes(armada) {
            EntityKind::Npc
        } else if name.is_none() {
            EntityKind::Ship
        } else {
            EntityKind::Player
        };
        Some(Sighting {
            identifier,
            kind,
            alliance,
            ship,
        })
    }

    fn round_index(&self, field: Option<&RawField>) -> Result<u32, String> {
        if self.config.round_boundary == RoundBoundary::Marker {
            return Ok(self.marker_round);
        }
        let value = field
            .map(RawField::to_number)
            .transpose()
            .map_err(|err| format!("round {err}"))?
            .flatten()
            .ok_or_else(|| "missing round".to_string())?;
        if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
            return Err(format!("round {value} is not a non-negative integer"));
        }
        Ok(value as u32)
    }

    fn category(&mut self, ordinal: u64, label: &str) -> DamageCategory {
        match self.config.category_for(label) {
            Some(category) => category,
            None => {
                self.sink.report(
                    Diagnostic::new(
                        DiagnosticKind::UnknownCategory,
                        format!("unknown damage category '{label}' coerced to other"),
                    )
                    .with_record(ordinal, label),
                );
                DamageCategory::Other
            }
        }
    }

    fn default_kind(&self, identifier: &str) -> EntityKind {
        if self.config.is_npc(identifier) {
            EntityKind::Npc
        } else {
            EntityKind::Ship
        }
    }

    fn push_event(&mut self, event: CombatEvent) {
        self.parsed.events.push(event);
    }

    fn finish(self) -> Result<ParsedLog, AnalysisError> {
        let LogParser {
            registry,
            sink,
            mut parsed,
            ..
        } = self;

        for event in &mut parsed.events {
            event.source = registry.canonical(event.source);
            event.target = registry.canonical(event.target);
        }
        for shot in &mut parsed.shots {
            shot.source = registry.canonical(shot.source);
            shot.target = registry.canonical(shot.target);
        }
        for diagnostic in registry.drain_diagnostics() {
            sink.report(diagnostic);
        }

        parsed.stats.events = parsed.events.len();
        parsed.stats.shots = parsed.shots.len();
        tracing::debug!(
            records = parsed.stats.records,
            events = parsed.stats.events,
            malformed = parsed.stats.malformed,
            ignored = parsed.stats.ignored,
            "parsed combat log"
        );

        if parsed.events.is_empty() {
            return Err(AnalysisError::unreadable(format!(
                "no damage events in {} record(s) ({} malformed)",
                parsed.stats.records, parsed.stats.malformed
            )));
        }
        Ok(parsed)
    }
}

/// Up to three (category, raw, mitigated) events for one battle row.
fn split_lanes(lanes: &Lanes) -> Vec<(DamageCategory, f64, f64)> {
    let normal_remain = (lanes.total_normal - lanes.mitigated_normal).max(0.0);
    let iso_remain = (lanes.total_iso - lanes.mitigated_iso).max(0.0);
    let remain = normal_remain + iso_remain;

    let carved = if remain > 0.0 {
        lanes.mitigated_apex.min(remain)
    } else {
        0.0
    };
    let normal_share = if remain > 0.0 {
        carved * normal_remain / remain
    } else {
        0.0
    };
    let iso_share = carved - normal_share;

    let mut events = Vec::with_capacity(3);
    if lanes.total_normal > 0.0 || lanes.mitigated_normal > 0.0 {
        events.push((
            DamageCategory::Normal,
            lanes.total_normal - normal_share,
            lanes.mitigated_normal,
        ));
    }
    if lanes.total_iso > 0.0 || lanes.mitigated_iso > 0.0 {
        events.push((
            DamageCategory::Isolytic,
            lanes.total_iso - iso_share,
            lanes.mitigated_iso,
        ));
    }
    if lanes.mitigated_apex > 0.0 {
        // Excess apex beyond the remainder shows up as a negative post value.
        events.push((DamageCategory::Apex, carved, lanes.mitigated_apex));
    }
    events
}

fn required_text<'r>(value: Option<&'r str>, field: &str) -> Result<&'r str, String> {
    present(value).ok_or_else(|| format!("missing {field}"))
}

fn required_amount(value: Option<&RawField>, field: &str) -> Result<f64, String> {
    let amount = value
        .map(RawField::to_number)
        .transpose()
        .map_err(|err| format!("{field} {err}"))?
        .flatten()
        .ok_or_else(|| format!("missing {field}"))?;
    check_amount(amount, field)
}

fn optional_amount(value: Option<&RawField>, field: &str) -> Result<f64, String> {
    let amount = value
        .map(RawField::to_number)
        .transpose()
        .map_err(|err| format!("{field} {err}"))?
        .flatten()
        .unwrap_or(0.0);
    check_amount(amount, field)
}

fn check_amount(amount: f64, field: &str) -> Result<f64, String> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(format!("{field} must be a non-negative number, got {amount}"));
    }
    Ok(amount)
}

fn is_present(value: Option<&RawField>) -> bool {
    value.is_some_and(|field| !field.is_missing())
}

fn excerpt(record: &RawRecord) -> String {
    serde_json::to_string(record).unwrap_or_default()
}

fn excerpt_battle(row: &BattleRecord) -> String {
    serde_json::to_string(row).unwrap_or_default()
}
