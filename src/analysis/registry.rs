//! Entity identity for one analysis session.
//!
//! Raw identifiers are normalized into lookup keys and mapped to stable
//! [EntityId]s in first-seen order. Aliases never mutate entities: they are
//! entries in an explicit index (alias key -> canonical key, merged id ->
//! surviving id), and the entity seen first always keeps its id.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::analysis::diagnostics::{Diagnostic, DiagnosticKind};
use crate::analysis::model::{Entity, EntityId, EntityKind};

/// Lowercase and collapse whitespace/underscores so `USS  Enterprise` and
/// `uss_enterprise` share a key.
pub fn normalize_identifier(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() || c == '_' { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Everything known about an entity at the moment it is referenced.
#[derive(Debug, Clone, Copy)]
pub struct Sighting<'a> {
    pub identifier: &'a str,
    pub kind: EntityKind,
    pub alliance: Option<&'a str>,
    pub ship: Option<&'a str>,
}

impl<'a> Sighting<'a> {
    pub fn new(identifier: &'a str, kind: EntityKind) -> Self {
        Self {
            identifier,
            kind,
            alliance: None,
            ship: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: Vec<Entity>,
    index: HashMap<String, EntityId>,
    /// Key each entity was created under, by id.
    first_keys: Vec<String>,
    alias_groups: HashMap<String, String>,
    redirects: BTreeMap<EntityId, EntityId>,
    reported_aliases: HashSet<String>,
    pending: Vec<Diagnostic>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with aliases declared before any entity is seen.
    pub fn with_aliases<'a, I>(aliases: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut registry = Self::new();
        for (alias, canonical) in aliases {
            registry.declare_alias(alias, canonical);
        }
        registry
    }

    pub fn resolve(&mut self, raw_identifier: &str, kind_hint: EntityKind) -> EntityId {
        self.resolve_sighting(Sighting::new(raw_identifier, kind_hint))
    }

    /// Idempotent: the same identifier (or any alias of it) always yields the
    /// same canonical id. Descriptors are only captured on first sight.
    pub fn resolve_sighting(&mut self, sighting: Sighting<'_>) -> EntityId {
        let key = normalize_identifier(sighting.identifier);
        let group = self.group_of(&key);

        if let Some(&id) = self.index.get(&group).or_else(|| self.index.get(&key)) {
            let id = self.canonical(id);
            self.index.entry(key.clone()).or_insert(id);
            self.note_alias(&key, id, sighting.identifier);
            if let Some(entity) = self.entities.get(id.0 as usize) {
                if entity.kind != sighting.kind {
                    tracing::debug!(
                        entity = %entity.display_name,
                        kept = entity.kind.as_str(),
                        hinted = sighting.kind.as_str(),
                        "ignoring conflicting kind hint"
                    );
                }
            }
            return id;
        }

        let id = EntityId(self.entities.len() as u32);
        self.entities.push(Entity {
            id,
            display_name: sighting.identifier.trim().to_string(),
            kind: sighting.kind,
            alliance: non_empty(sighting.alliance),
            ship: non_empty(sighting.ship),
        });
        self.first_keys.push(key.clone());
        self.index.insert(group.clone(), id);
        self.index.insert(key, id);
        tracing::debug!(
            %id,
            name = sighting.identifier.trim(),
            kind = sighting.kind.as_str(),
            "registered entity"
        );
        id
    }

    /// Declare that `alias` names the same entity as `canonical`. If both are
    /// already registered they are merged under whichever was seen first.
    pub fn declare_alias(&mut self, alias: &str, canonical: &str) {
        let alias_key = normalize_identifier(alias);
        let canonical_key = self.group_of(&normalize_identifier(canonical));
        if alias_key == canonical_key {
            return;
        }
        self.alias_groups.insert(alias_key.clone(), canonical_key.clone());

        match (
            self.index.get(&alias_key).copied(),
            self.index.get(&canonical_key).copied(),
        ) {
            (Some(a), Some(b)) => {
                self.merge(a, b);
            }
            (Some(a), None) => {
                let id = self.canonical(a);
                self.index.insert(canonical_key, id);
            }
            _ => {}
        }
    }

    /// Merge two entities discovered to be the same. The lower (first-seen)
    /// id survives; the other is redirected to it.
    pub fn merge(&mut self, a: EntityId, b: EntityId) -> EntityId {
        let a = self.canonical(a);
        let b = self.canonical(b);
        if a == b {
            return a;
        }
        let (winner, loser) = if a < b { (a, b) } else { (b, a) };
        let winner_name = self.raw_name(winner);
        let loser_name = self.raw_name(loser);
        self.redirects.insert(loser, winner);
        for id in self.index.values_mut() {
            if *id == loser {
                *id = winner;
            }
        }

        self.pending.push(Diagnostic::new(
            DiagnosticKind::EntityAlias,
            format!("merged '{loser_name}' ({loser}) into first-seen '{winner_name}' ({winner})"),
        ));
        winner
    }

    /// Follow merge redirects to the surviving id.
    pub fn canonical(&self, id: EntityId) -> EntityId {
        let mut current = id;
        let mut hops = 0;
        while let Some(&next) = self.redirects.get(&current) {
            current = next;
            hops += 1;
            if hops > self.redirects.len() {
                break;
            }
        }
        current
    }

    /// Look up without registering.
    pub fn find(&self, raw_identifier: &str) -> Option<EntityId> {
        let key = normalize_identifier(raw_identifier);
        let group = self.group_of(&key);
        self.index
            .get(&group)
            .or_else(|| self.index.get(&key))
            .map(|&id| self.canonical(id))
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(self.canonical(id).0 as usize)
    }

    pub fn display_name(&self, id: EntityId) -> Option<&str> {
        self.get(id).map(|entity| entity.display_name.as_str())
    }

    /// Every entity ever registered, including merged-away ones.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Entities that have not been merged into another.
    pub fn canonical_entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities
            .iter()
            .filter(|entity| !self.redirects.contains_key(&entity.id))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn drain_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.pending)
    }

    fn raw_name(&self, id: EntityId) -> String {
        self.entities
            .get(id.0 as usize)
            .map(|entity| entity.display_name.clone())
            .unwrap_or_default()
    }

    fn group_of(&self, key: &str) -> String {
        let mut current = key;
        let mut hops = 0;
        while let Some(next) = self.alias_groups.get(current) {
            current = next;
            hops += 1;
            if hops > self.alias_groups.len() {
                break;
            }
        }
        current.to_string()
    }

    fn note_alias(&mut self, key: &str, id: EntityId, raw: &str) {
        let Some(first_key) = self.first_keys.get(id.0 as usize) else {
            return;
        };
        if first_key == key || !self.reported_aliases.insert(key.to_string()) {
            return;
        }
        let name = self.display_name(id).unwrap_or_default().to_string();
        self.pending.push(Diagnostic::new(
            DiagnosticKind::EntityAlias,
            format!("'{}' resolved as alias of first-seen '{name}' ({id})", raw.trim()),
        ));
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_is_idempotent() {
        let mut registry = EntityRegistry::new();
        let first = registry.resolve("Kirk", EntityKind::Player);
        let second = registry.resolve("Kirk", EntityKind::Player);
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn spelling_variants_join_first_seen_entity() {
        let mut registry = EntityRegistry::new();
        let id = registry.resolve("USS Enterprise", EntityKind::Ship);
        assert_eq!(registry.resolve("uss_enterprise", EntityKind::Ship), id);
        assert_eq!(registry.resolve("  USS   ENTERPRISE ", EntityKind::Ship), id);
        assert_eq!(registry.display_name(id), Some("USS Enterprise"));

        assert!(
            registry.drain_diagnostics().is_empty(),
            "normalization is not aliasing"
        );
    }

    #[test]
    fn alias_join_is_reported_once() {
        let mut registry = EntityRegistry::with_aliases([("Enterprise-D", "USS Enterprise")]);
        let id = registry.resolve("USS Enterprise", EntityKind::Ship);
        assert_eq!(registry.resolve("Enterprise-D", EntityKind::Ship), id);
        assert_eq!(registry.resolve("enterprise-d", EntityKind::Ship), id);

        let diagnostics = registry.drain_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::EntityAlias);
    }

    #[test]
    fn declared_alias_resolves_to_whichever_was_seen_first() {
        let mut registry = EntityRegistry::with_aliases([("Jim", "James T. Kirk")]);
        let jim = registry.resolve("Jim", EntityKind::Player);
        let kirk = registry.resolve("James T. Kirk", EntityKind::Player);
        assert_eq!(jim, kirk);
        assert_eq!(registry.display_name(kirk), Some("Jim"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn late_alias_merges_under_first_seen_id() {
        let mut registry = EntityRegistry::new();
        let spock = registry.resolve("Spock", EntityKind::Player);
        let mister = registry.resolve("Mr. Spock", EntityKind::Player);
        assert_ne!(spock, mister);

        registry.declare_alias("Mr. Spock", "Spock");
        assert_eq!(registry.canonical(mister), spock);
        assert_eq!(registry.resolve("Mr. Spock", EntityKind::Player), spock);
        assert_eq!(registry.canonical_entities().count(), 1);
        assert_eq!(registry.entities().len(), 2, "entities are never deleted");

        let diagnostics = registry.drain_diagnostics();
        assert!(diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::EntityAlias && d.message.contains("merged")));
    }

    #[test]
    fn merge_order_does_not_change_survivor() {
        let mut a = EntityRegistry::new();
        let x = a.resolve("X", EntityKind::Npc);
        let y = a.resolve("Y", EntityKind::Npc);
        assert_eq!(a.merge(y, x), x);

        let mut b = EntityRegistry::new();
        let x = b.resolve("X", EntityKind::Npc);
        let y = b.resolve("Y", EntityKind::Npc);
        assert_eq!(b.merge(x, y), x);
    }

    #[test]
    fn descriptors_are_captured_on_first_sight_only() {
        let mut registry = EntityRegistry::new();
        let id = registry.resolve_sighting(Sighting {
            identifier: "Kirk",
            kind: EntityKind::Player,
            alliance: Some("NCC"),
            ship: Some("Enterprise"),
        });
        registry.resolve_sighting(Sighting {
            identifier: "Kirk",
            kind: EntityKind::Npc,
            alliance: Some("Other"),
            ship: None,
        });
        let entity = registry.get(id).expect("entity");
        assert_eq!(entity.kind, EntityKind::Player);
        assert_eq!(entity.alliance.as_deref(), Some("NCC"));
        assert_eq!(entity.ship.as_deref(), Some("Enterprise"));
    }
}
