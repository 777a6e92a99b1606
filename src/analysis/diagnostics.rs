//! Structured reporting for recoverable anomalies found while analyzing a log.
//!
//! Stages never abort on bad records; they push a [Diagnostic] into a
//! [DiagnosticSink] and keep going. [Diagnostics] is the collecting sink used by
//! a session and mirrors every entry to `tracing`.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    MalformedRecord,
    UnknownCategory,
    RoundRegression,
    MitigationInvariantViolation,
    AccountingMismatch,
    EntityAlias,
    /// Round indices skipped between two observed rounds.
    RoundGap,
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        match self {
            Self::MitigationInvariantViolation => Severity::Error,
            Self::MalformedRecord
            | Self::UnknownCategory
            | Self::RoundRegression
            | Self::AccountingMismatch => Severity::Warning,
            Self::EntityAlias | Self::RoundGap => Severity::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedRecord => "malformed_record",
            Self::UnknownCategory => "unknown_category",
            Self::RoundRegression => "round_regression",
            Self::MitigationInvariantViolation => "mitigation_invariant_violation",
            Self::AccountingMismatch => "accounting_mismatch",
            Self::EntityAlias => "entity_alias",
            Self::RoundGap => "round_gap",
        }
    }
}

/// Pointer back to the input that triggered a diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffendingRecord {
    pub ordinal: u64,
    pub excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<OffendingRecord>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity: kind.severity(),
            kind,
            message: message.into(),
            record: None,
        }
    }

    pub fn with_record(mut self, ordinal: u64, excerpt: impl Into<String>) -> Self {
        self.record = Some(OffendingRecord {
            ordinal,
            excerpt: excerpt.into(),
        });
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.kind.as_str(), self.message)?;
        if let Some(record) = &self.record {
            write!(f, " (record {}: {})", record.ordinal, record.excerpt)?;
        }
        Ok(())
    }
}

pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    pub entries: Vec<Diagnostic>,
}

impl DiagnosticSink for Diagnostics {
    fn report(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => {
                tracing::error!(kind = diagnostic.kind.as_str(), "{}", diagnostic.message)
            }
            Severity::Warning => {
                tracing::warn!(kind = diagnostic.kind.as_str(), "{}", diagnostic.message)
            }
            Severity::Info => {
                tracing::info!(kind = diagnostic.kind.as_str(), "{}", diagnostic.message)
            }
        }
        self.entries.push(diagnostic);
    }
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.report(diagnostic);
        }
    }

    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|diag| diag.severity == Severity::Error)
    }

    pub fn count_of(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|diag| diag.kind == kind).count()
    }

    pub fn summary(&self) -> DiagnosticSummary {
        let mut summary = DiagnosticSummary::default();
        for diag in &self.entries {
            match diag.severity {
                Severity::Error => summary.errors += 1,
                Severity::Warning => summary.warnings += 1,
                Severity::Info => summary.infos += 1,
            }
            if matches!(
                diag.kind,
                DiagnosticKind::MalformedRecord | DiagnosticKind::RoundRegression
            ) {
                summary.incomplete = true;
            }
            if diag.severity != Severity::Info {
                summary.flagged = true;
            }
        }
        summary
    }
}

/// What a consumer needs to decide whether to present data as clean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticSummary {
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    /// Some input was dropped or moved to a different round.
    pub incomplete: bool,
    /// Anything above info severity was reported.
    pub flagged: bool,
}

impl DiagnosticSummary {
    pub fn is_clean(&self) -> bool {
        !self.flagged && !self.incomplete
    }
}
