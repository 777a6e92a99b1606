use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::{
    tokenize, AnalysisError, AnalysisReport, AnalysisSession, CritPoint, DestinationPoint,
    Direction, RawRecord, TokenizedLog, ViewBy,
};
use crate::config::EngineConfig;

pub fn health_payload() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&serde_json::json!({
        "status": "ok",
        "service": "warpflow-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Body of `POST /api/analyze`. Exactly one of `log` or `records` is required.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalyzeRequest {
    /// Log text: a JSON record array or a tab-separated battle export.
    pub log: Option<String>,
    pub records: Option<Vec<RawRecord>>,
    /// Entity names to scope the view to; empty selects everyone.
    pub entities: Vec<String>,
    pub direction: Direction,
    /// When set, the damage destination and crit hit series are included.
    pub view_by: Option<ViewBy>,
    pub config: Option<EngineConfig>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse<'a> {
    #[serde(flatten)]
    pub report: AnalysisReport<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<Vec<DestinationPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crit_hits: Option<Vec<CritPoint>>,
}

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("invalid request body: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("failed to serialize analysis: {0}")]
    Serialize(#[source] serde_json::Error),
}

pub fn analyze_payload(body: &str) -> Result<String, AnalyzeError> {
    let req: AnalyzeRequest = serde_json::from_str(body).map_err(AnalyzeError::Parse)?;

    let log = match (req.log, req.records) {
        (Some(text), None) => tokenize(&text)?,
        (None, Some(records)) => TokenizedLog {
            records,
            diagnostics: Vec::new(),
        },
        (Some(_), Some(_)) => {
            return Err(AnalyzeError::Validation(
                "provide either log or records, not both".to_string(),
            ))
        }
        (None, None) => {
            return Err(AnalyzeError::Validation(
                "log or records is required".to_string(),
            ))
        }
    };

    let session = AnalysisSession::new(req.config.unwrap_or_default());
    let analysis = session.analyze_log(log)?;
    let selection = analysis.select(req.entities.as_slice())?;
    let destination = req
        .view_by
        .map(|view_by| analysis.destination(&selection, req.direction, view_by));
    let crit_hits = req
        .view_by
        .map(|view_by| analysis.crit_hits(&selection, req.direction, view_by));

    let response = AnalyzeResponse {
        report: analysis.report(&selection, req.direction),
        destination,
        crit_hits,
    };
    serde_json::to_string_pretty(&response).map_err(AnalyzeError::Serialize)
}
