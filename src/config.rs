//! Engine configuration: damage category vocabulary, round boundary rule,
//! entity aliases and aggregation workers.
//!
//! Loaded from YAML or JSON by file extension. Every field has a default so an
//! empty file (or no file at all) yields [EngineConfig::default].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::DamageCategory;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid yaml in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// How round membership is decided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundBoundary {
    /// Use the round number carried by each record.
    #[default]
    Field,
    /// Each marker record opens the next round; record round fields are ignored.
    Marker,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Lower-cased category label -> category.
    pub categories: BTreeMap<String, DamageCategory>,
    pub round_boundary: RoundBoundary,
    /// Battle-row types that carry damage.
    pub damage_event_types: Vec<String>,
    pub npc_names: Vec<String>,
    /// Alias identifier -> canonical identifier.
    pub entity_aliases: BTreeMap<String, String>,
    pub accounting_tolerance: f64,
    /// Rayon worker threads for round aggregation; 0 uses the global pool.
    pub workers: usize,
}

pub const DEFAULT_ACCOUNTING_TOLERANCE: f64 = 1.0;

fn default_categories() -> BTreeMap<String, DamageCategory> {
    [
        ("normal", DamageCategory::Normal),
        ("isolytic", DamageCategory::Isolytic),
        ("iso", DamageCategory::Isolytic),
        ("apex", DamageCategory::Apex),
        ("other", DamageCategory::Other),
    ]
    .into_iter()
    .map(|(label, category)| (label.to_string(), category))
    .collect()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            round_boundary: RoundBoundary::Field,
            damage_event_types: vec!["attack".to_string()],
            npc_names: Vec::new(),
            entity_aliases: BTreeMap::new(),
            accounting_tolerance: DEFAULT_ACCOUNTING_TOLERANCE,
            workers: 0,
        }
    }
}

impl EngineConfig {
    /// Load from `.json`, otherwise parse as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })
        } else if raw.trim().is_empty() {
            Ok(Self::default())
        } else {
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Case-insensitive category lookup. `None` means the label is not configured.
    pub fn category_for(&self, label: &str) -> Option<DamageCategory> {
        let key = label.trim().to_lowercase();
        self.categories.get(&key).copied().or_else(|| {
            self.categories
                .iter()
                .find(|(configured, _)| configured.trim().eq_ignore_ascii_case(&key))
                .map(|(_, category)| *category)
        })
    }

    pub fn is_damage_event_type(&self, event_type: &str) -> bool {
        let event_type = event_type.trim();
        self.damage_event_types
            .iter()
            .any(|configured| configured.trim().eq_ignore_ascii_case(event_type))
    }

    pub fn is_npc(&self, name: &str) -> bool {
        let name = name.trim();
        self.npc_names
            .iter()
            .any(|npc| npc.trim().eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_category_lookup_is_case_insensitive() {
        let config = EngineConfig::default();
        assert_eq!(config.category_for(" Isolytic "), Some(DamageCategory::Isolytic));
        assert_eq!(config.category_for("ISO"), Some(DamageCategory::Isolytic));
        assert_eq!(config.category_for("plasma"), None);
    }

    #[test]
    fn yaml_overrides_merge_with_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .expect("temp file");
        writeln!(
            file,
            "round_boundary: marker\nnpc_names: [\"Borg Cube\"]\ncategories:\n  kinetic: normal\n"
        )
        .expect("write config");

        let config = EngineConfig::load(file.path()).expect("load yaml");
        assert_eq!(config.round_boundary, RoundBoundary::Marker);
        assert!(config.is_npc("borg cube"));
        assert_eq!(config.category_for("kinetic"), Some(DamageCategory::Normal));
        assert_eq!(config.category_for("apex"), None);
        assert_eq!(config.damage_event_types, vec!["attack".to_string()]);
    }

    #[test]
    fn json_config_is_detected_by_extension() {
        let mut file = tempfile::Builder::new()
            .suffix(".json")
            .tempfile()
            .expect("temp file");
        write!(file, r#"{{"workers": 2, "accounting_tolerance": 5.0}}"#).expect("write config");

        let config = EngineConfig::load(file.path()).expect("load json");
        assert_eq!(config.workers, 2);
        assert_eq!(config.accounting_tolerance, 5.0);
        assert_eq!(config.category_for("normal"), Some(DamageCategory::Normal));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = EngineConfig::load("does/not/exist.yaml").expect_err("should fail");
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
