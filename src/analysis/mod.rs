pub mod diagnostics;
pub mod error;
pub mod flows;
pub mod ingest;
pub mod mitigation;
pub mod model;
pub mod parser;
pub mod record;
pub mod registry;
pub mod rounds;
pub mod session;
pub mod shots;
pub mod view;

pub use diagnostics::{
    Diagnostic, DiagnosticKind, DiagnosticSink, DiagnosticSummary, Diagnostics, OffendingRecord,
    Severity,
};
pub use error::AnalysisError;
pub use flows::{aggregate, aggregate_rounds, aggregate_rounds_with, canonical_sum};
pub use ingest::{
    load_log_file, parse_battle_export, parse_records_json, tokenize, TokenizedLog,
    COMBAT_SECTION_HEADER,
};
pub use mitigation::{
    decompose, decompose_flow, direct_post_totals, pair_breakdowns, Decomposition, PairBreakdown,
    Validity,
};
pub use model::{
    CombatEvent, DamageCategory, DamageFlow, Entity, EntityId, EntityKind, Round, EPSILON,
};
pub use parser::{parse_records, ParseStats, ParsedLog, APEX_BARRIER_SCALE};
pub use record::{BattleRecord, FlatRecord, MarkerRecord, RawField, RawRecord, NA_TOKENS};
pub use registry::{normalize_identifier, EntityRegistry, Sighting};
pub use rounds::{flatten, segment};
pub use session::{Analysis, AnalysisReport, AnalysisSession, EntityDescriptor};
pub use shots::{
    crit_hits, damage_destination, CritPoint, CritSplit, DestinationPoint, Segment, ShotRecord,
    ViewBy,
};
pub use view::{
    build_view, matches, DamageTotals, Direction, EntitySelection, Matched, RoundAggregate,
    ScopedRow, ScopedView,
};
