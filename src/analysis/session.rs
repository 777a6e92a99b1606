//! One analysis session: config plus the entity registry, consumed by
//! [AnalysisSession::analyze] to produce an [Analysis].
//!
//! The pipeline is parse -> segment -> aggregate -> decompose. Every stage is
//! also callable on its own; the session only threads the registry and the
//! diagnostics sink through them.

use std::collections::HashMap;

use serde::Serialize;

use crate::analysis::diagnostics::{Diagnostic, DiagnosticSummary, Diagnostics};
use crate::analysis::error::AnalysisError;
use crate::analysis::flows::aggregate_rounds_with;
use crate::analysis::ingest::TokenizedLog;
use crate::analysis::mitigation::{decompose, pair_breakdowns, Decomposition, PairBreakdown};
use crate::analysis::model::{CombatEvent, DamageFlow, Entity, EntityId, Round};
use crate::analysis::parser::{parse_records, ParseStats};
use crate::analysis::record::RawRecord;
use crate::analysis::registry::EntityRegistry;
use crate::analysis::rounds::segment;
use crate::analysis::shots::{
    crit_hits, damage_destination, CritPoint, DestinationPoint, ShotRecord, ViewBy,
};
use crate::analysis::view::{build_view, Direction, EntitySelection, ScopedView};
use crate::config::EngineConfig;
use crate::parallel::WorkerPool;

#[derive(Debug, Clone)]
pub struct AnalysisSession {
    config: EngineConfig,
    registry: EntityRegistry,
}

impl AnalysisSession {
    pub fn new(config: EngineConfig) -> Self {
        let registry = EntityRegistry::with_aliases(
            config
                .entity_aliases
                .iter()
                .map(|(alias, canonical)| (alias.as_str(), canonical.as_str())),
        );
        Self { config, registry }
    }

    pub fn analyze(self, records: &[RawRecord]) -> Result<Analysis, AnalysisError> {
        self.analyze_with(records, Vec::new())
    }

    /// Analyze tokenizer output, keeping the tokenizer's own diagnostics.
    pub fn analyze_log(self, log: TokenizedLog) -> Result<Analysis, AnalysisError> {
        self.analyze_with(&log.records, log.diagnostics)
    }

    fn analyze_with(
        self,
        records: &[RawRecord],
        prior: Vec<Diagnostic>,
    ) -> Result<Analysis, AnalysisError> {
        let AnalysisSession {
            config,
            mut registry,
        } = self;
        let mut diagnostics = Diagnostics::new();
        diagnostics.extend(prior);

        let mut parsed = parse_records(records, &config, &mut registry, &mut diagnostics)?;
        let pool = WorkerPool::with_workers(config.workers);
        let flows = {
            let rounds = segment(&parsed.events, &mut diagnostics);
            settle_shot_rounds(&mut parsed.shots, &rounds);
            aggregate_rounds_with(&pool, &rounds)
        };
        // Reported once here; later decompositions are recomputed silently.
        decompose(&flows, &mut diagnostics);

        tracing::info!(
            entities = registry.canonical_entities().count(),
            events = parsed.stats.events,
            flows = flows.len(),
            diagnostics = diagnostics.entries.len(),
            "analysis complete"
        );

        Ok(Analysis {
            config,
            registry,
            events: parsed.events,
            shots: parsed.shots,
            flows,
            stats: parsed.stats,
            diagnostics,
        })
    }
}

/// Moves shots of regressed records into the round their events were segmented into.
fn settle_shot_rounds(shots: &mut [ShotRecord], rounds: &[Round<'_>]) {
    let moved: HashMap<u64, u32> = rounds
        .iter()
        .flat_map(|round| {
            round
                .events
                .iter()
                .filter(move |event| event.round_index != round.index)
                .map(move |event| (event.sequence, round.index))
        })
        .collect();
    if moved.is_empty() {
        return;
    }
    for shot in shots {
        if let Some(&round_index) = moved.get(&shot.sequence) {
            shot.round_index = round_index;
        }
    }
}

/// Result of one session. Owns the registry that its ids refer to.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub config: EngineConfig,
    pub registry: EntityRegistry,
    pub events: Vec<CombatEvent>,
    pub shots: Vec<ShotRecord>,
    pub flows: Vec<DamageFlow>,
    pub stats: ParseStats,
    pub diagnostics: Diagnostics,
}

impl Analysis {
    pub fn rounds(&self) -> Vec<Round<'_>> {
        segment(&self.events, &mut Vec::<Diagnostic>::new())
    }

    pub fn decompositions(&self) -> Vec<Decomposition<'_>> {
        decompose(&self.flows, &mut Vec::<Diagnostic>::new())
    }

    pub fn pair_breakdowns(&self) -> Vec<PairBreakdown> {
        pair_breakdowns(&self.decompositions())
    }

    pub fn view(&self, selection: &EntitySelection, direction: Direction) -> ScopedView<'_> {
        build_view(&self.flows, selection, direction)
    }

    pub fn destination(
        &self,
        selection: &EntitySelection,
        direction: Direction,
        view_by: ViewBy,
    ) -> Vec<DestinationPoint> {
        damage_destination(&self.shots, selection, direction, view_by)
    }

    pub fn crit_hits(
        &self,
        selection: &EntitySelection,
        direction: Direction,
        view_by: ViewBy,
    ) -> Vec<CritPoint> {
        crit_hits(&self.shots, selection, direction, view_by)
    }

    /// Selection from entity names; no names selects everything.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<EntitySelection, AnalysisError> {
        if names.is_empty() {
            return Ok(EntitySelection::All);
        }
        let ids = names
            .iter()
            .map(|name| {
                self.registry
                    .find(name.as_ref())
                    .ok_or_else(|| AnalysisError::UnknownEntity {
                        identifier: name.as_ref().to_string(),
                    })
            })
            .collect::<Result<Vec<EntityId>, _>>()?;
        Ok(EntitySelection::only(ids))
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.registry.get(id)
    }

    pub fn label(&self, id: EntityId) -> String {
        self.registry
            .get(id)
            .map(Entity::label)
            .unwrap_or_else(|| id.to_string())
    }

    pub fn summary(&self) -> DiagnosticSummary {
        self.diagnostics.summary()
    }

    /// Everything a consumer needs for one selection, ready to serialize.
    pub fn report(&self, selection: &EntitySelection, direction: Direction) -> AnalysisReport<'_> {
        AnalysisReport {
            entities: self
                .registry
                .canonical_entities()
                .map(|entity| EntityDescriptor {
                    entity,
                    label: entity.label(),
                })
                .collect(),
            stats: self.stats,
            view: self.view(selection, direction),
            summary: self.summary(),
            diagnostics: &self.diagnostics.entries,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityDescriptor<'a> {
    #[serde(flatten)]
    pub entity: &'a Entity,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport<'a> {
    pub entities: Vec<EntityDescriptor<'a>>,
    pub stats: ParseStats,
    pub view: ScopedView<'a>,
    pub summary: DiagnosticSummary,
    pub diagnostics: &'a [Diagnostic],
}
