//! Tokenizers that turn log text into [RawRecord]s.
//!
//! Two inputs are understood: a JSON array of tagged records (or
//! `{"records": [...]}`), and the tab-separated battle export whose combat
//! section starts with a `Round\tBattle Event\tType` header. Only the combat
//! section is read; players, rewards and fleet sections are skipped.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::analysis::diagnostics::{Diagnostic, DiagnosticKind};
use crate::analysis::error::AnalysisError;
use crate::analysis::record::{BattleRecord, RawField, RawRecord};

/// Header prefix of the combat section in a battle export.
pub const COMBAT_SECTION_HEADER: &str = "Round\tBattle Event\tType";

/// Records plus any rows the tokenizer itself could not split.
#[derive(Debug, Clone, Default)]
pub struct TokenizedLog {
    pub records: Vec<RawRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonLog {
    Bare(Vec<RawRecord>),
    Wrapped { records: Vec<RawRecord> },
}

/// Parse a JSON record log.
pub fn parse_records_json(input: &str) -> Result<TokenizedLog, AnalysisError> {
    if input.trim().is_empty() {
        return Err(AnalysisError::unreadable("empty input"));
    }
    let log: JsonLog = serde_json::from_str(input)
        .map_err(|err| AnalysisError::unreadable(format!("invalid record json: {err}")))?;
    let records = match log {
        JsonLog::Bare(records) | JsonLog::Wrapped { records } => records,
    };
    Ok(TokenizedLog {
        records,
        diagnostics: Vec::new(),
    })
}

/// Parse the combat section of a tab-separated battle export.
pub fn parse_battle_export(input: &str) -> Result<TokenizedLog, AnalysisError> {
    if input.trim().is_empty() {
        return Err(AnalysisError::unreadable("empty input"));
    }
    let section = combat_section(input)
        .ok_or_else(|| AnalysisError::unreadable("no combat section header found"))?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .quoting(false)
        .has_headers(true)
        .from_reader(section.as_bytes());

    let header: Vec<String> = reader
        .headers()
        .map_err(|err| AnalysisError::unreadable(format!("unreadable combat header: {err}")))?
        .iter()
        .map(|cell| cell.trim().to_string())
        .collect();
    let columns = CombatColumns::from_header(&header);

    let mut tokenized = TokenizedLog::default();
    for (row_index, row) in reader.records().enumerate() {
        match row {
            Ok(row) => {
                let cells: Vec<&str> = row.iter().collect();
                tokenized
                    .records
                    .push(RawRecord::Battle(columns.to_record(&cells)));
            }
            Err(err) => tokenized.diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::MalformedRecord,
                    format!("combat row {} could not be split: {err}", row_index + 1),
                )
                .with_record(row_index as u64, ""),
            ),
        }
    }
    tracing::debug!(rows = tokenized.records.len(), "tokenized combat section");
    Ok(tokenized)
}

/// Choose a tokenizer by content: JSON if it starts like JSON, battle export otherwise.
pub fn tokenize(input: &str) -> Result<TokenizedLog, AnalysisError> {
    let trimmed = input.trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        parse_records_json(input)
    } else {
        parse_battle_export(input)
    }
}

pub fn load_log_file(path: impl AsRef<Path>) -> Result<TokenizedLog, AnalysisError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| AnalysisError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8_lossy(&bytes);
    tokenize(&text)
}

/// Lines from the combat header to the next blank line.
fn combat_section(input: &str) -> Option<String> {
    let mut lines = input
        .lines()
        .skip_while(|line| !line.trim_start().starts_with(COMBAT_SECTION_HEADER));
    let header = lines.next()?;
    let mut section = String::from(header.trim_start());
    for line in lines.take_while(|line| !line.trim().is_empty()) {
        section.push('\n');
        section.push_str(line);
    }
    Some(section)
}

/// Column positions looked up by header name.
#[derive(Debug, Default)]
struct CombatColumns {
    round: Option<usize>,
    battle_event: Option<usize>,
    event_type: Option<usize>,
    ability_type: Option<usize>,
    is_crit: Option<usize>,
    attacker_name: Option<usize>,
    attacker_alliance: Option<usize>,
    attacker_ship: Option<usize>,
    attacker_is_armada: Option<usize>,
    target_name: Option<usize>,
    target_alliance: Option<usize>,
    target_ship: Option<usize>,
    target_is_armada: Option<usize>,
    total_normal: Option<usize>,
    mitigated_normal: Option<usize>,
    total_iso: Option<usize>,
    mitigated_iso: Option<usize>,
    mitigated_apex: Option<usize>,
    shield_damage: Option<usize>,
    hull_damage: Option<usize>,
}

impl CombatColumns {
    fn from_header(header: &[String]) -> Self {
        let find = |names: &[&str]| {
            header
                .iter()
                .position(|h| names.iter().any(|name| h.eq_ignore_ascii_case(name)))
        };
        Self {
            round: find(&["Round"]),
            battle_event: find(&["Battle Event"]),
            event_type: find(&["Type"]),
            ability_type: find(&["Ability Type"]),
            is_crit: find(&["Critical Hit?"]),
            attacker_name: find(&["Attacker Name", "Attacker"]),
            attacker_alliance: find(&["Attacker Alliance"]),
            attacker_ship: find(&["Attacker Ship"]),
            attacker_is_armada: find(&["Attacker - Is Armada?"]),
            target_name: find(&["Target Name", "Target", "Defender Name"]),
            target_alliance: find(&["Target Alliance"]),
            target_ship: find(&["Target Ship"]),
            target_is_armada: find(&["Target - Is Armada?"]),
            total_normal: find(&["Total Damage"]),
            mitigated_normal: find(&["Mitigated Damage"]),
            total_iso: find(&["Total Isolytic Damage"]),
            mitigated_iso: find(&["Mitigated Isolytic Damage"]),
            mitigated_apex: find(&["Mitigated Apex Barrier"]),
            shield_damage: find(&["Shield Damage"]),
            hull_damage: find(&["Hull Damage"]),
        }
    }

    fn to_record(&self, cells: &[&str]) -> BattleRecord {
        let text = |col: Option<usize>| {
            col.and_then(|i| cells.get(i))
                .map(|cell| cell.trim().to_string())
        };
        let field = |col: Option<usize>| text(col).map(RawField::Text);
        BattleRecord {
            round: field(self.round),
            battle_event: text(self.battle_event),
            event_type: text(self.event_type),
            ability_type: text(self.ability_type),
            is_crit: text(self.is_crit),
            attacker_name: text(self.attacker_name),
            attacker_alliance: text(self.attacker_alliance),
            attacker_ship: text(self.attacker_ship),
            attacker_is_armada: text(self.attacker_is_armada),
            target_name: text(self.target_name),
            target_alliance: text(self.target_alliance),
            target_ship: text(self.target_ship),
            target_is_armada: text(self.target_is_armada),
            total_normal: field(self.total_normal),
            mitigated_normal: field(self.mitigated_normal),
            total_iso: field(self.total_iso),
            mitigated_iso: field(self.mitigated_iso),
            mitigated_apex: field(self.mitigated_apex),
            shield_damage: field(self.shield_damage),
            hull_damage: field(self.hull_damage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "Player Name\tPlayer Level\tOutcome\n\
Kirk\t50\tVICTORY\n\
\n\
Round\tBattle Event\tType\tAttacker Name\tTarget Name\tTotal Damage\tHull Damage\n\
1\t1\tAttack\tKirk\tHostile\t1,200\t900\n\
1\t2\tOfficer\tKirk\t--\t--\t--\n\
\n\
Reward Name\tCount\n\
Parts\t3\n";

    #[test]
    fn battle_export_reads_only_combat_section() {
        let log = parse_battle_export(EXPORT).expect("tokenize");
        assert_eq!(log.records.len(), 2);
        let RawRecord::Battle(first) = &log.records[0] else {
            panic!("expected battle record");
        };
        assert_eq!(first.attacker_name.as_deref(), Some("Kirk"));
        assert_eq!(first.total_normal, Some(RawField::Text("1,200".to_string())));
        assert_eq!(first.shield_damage, None, "absent column stays missing");
    }

    #[test]
    fn missing_combat_section_is_unreadable() {
        let err = parse_battle_export("Reward Name\tCount\nParts\t3\n").expect_err("no section");
        assert!(matches!(err, AnalysisError::UnreadableInput { .. }));
    }

    #[test]
    fn json_accepts_wrapped_records() {
        let log = tokenize(r#"{"records": [{"schema": "marker"}]}"#).expect("tokenize");
        assert_eq!(log.records.len(), 1);
    }

    #[test]
    fn empty_input_is_unreadable() {
        assert!(matches!(
            tokenize("   \n"),
            Err(AnalysisError::UnreadableInput { .. })
        ));
    }
}
