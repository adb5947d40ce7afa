//! Point-in-time capture of a realm with BLAKE3 hashing.
//!
//! A [`RealmSnapshot`] is what "clean" means for the realm manager: right
//! after a load or save the snapshot equals the live forest, and any
//! structural or data edit makes [`RealmSnapshot::matches`] return `false`.
//! The snapshot also answers per-entity and per-element "was this modified"
//! questions for UI colouring, and can be restored to roll the realm back.
//!
//! ```
//! use thicket_editor::archetypes::EntityArchetype;
//! use thicket_editor::snapshot::RealmSnapshot;
//!
//! let mut realm = vec![EntityArchetype::new("Sun")];
//! let snapshot = RealmSnapshot::capture(&realm);
//! assert!(snapshot.matches(&realm));
//! assert_eq!(snapshot.hash.len(), 64); // BLAKE3 hex digest
//!
//! realm[0].name = "Moon".to_owned();
//! assert!(!snapshot.matches(&realm));
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use thicket_ecs::guid::SimpleGuid;

use crate::archetypes::{ElementArchetype, EntityArchetype};

// ---------------------------------------------------------------------------
// RealmSnapshot
// ---------------------------------------------------------------------------

/// Immutable copy of every entity archetype at one moment.
#[derive(Debug, Clone)]
pub struct RealmSnapshot {
    entities: Vec<EntityArchetype>,
    entity_index: HashMap<SimpleGuid, usize>,
    /// Element id -> (entity index, element index).
    element_index: HashMap<SimpleGuid, (usize, usize)>,
    source_path: Option<PathBuf>,
    /// BLAKE3 hex digest (64 lowercase hex chars) of the captured content.
    pub hash: String,
}

impl RealmSnapshot {
    /// Copy `realm` as it is now.
    pub fn capture(realm: &[EntityArchetype]) -> Self {
        let entities = realm.to_vec();
        let mut entity_index = HashMap::with_capacity(entities.len());
        let mut element_index = HashMap::new();
        for (i, entity) in entities.iter().enumerate() {
            entity_index.insert(entity.id, i);
            for (j, element) in entity.elements.iter().enumerate() {
                element_index.insert(element.id, (i, j));
            }
        }
        let hash = compute_hash(&entities);
        Self {
            entities,
            entity_index,
            element_index,
            source_path: None,
            hash,
        }
    }

    pub fn empty() -> Self {
        Self::capture(&[])
    }

    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn set_source_path(&mut self, path: impl Into<PathBuf>) {
        self.source_path = Some(path.into());
    }

    /// The captured archetypes in their original realm order.
    pub fn entities(&self) -> &[EntityArchetype] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get_entity_by_id(&self, entity_id: SimpleGuid) -> Option<&EntityArchetype> {
        self.entity_index.get(&entity_id).map(|&i| &self.entities[i])
    }

    pub fn get_element_by_id(&self, element_id: SimpleGuid) -> Option<&ElementArchetype> {
        self.element_index
            .get(&element_id)
            .map(|&(i, j)| &self.entities[i].elements[j])
    }

    /// True if `realm` has the same content as the capture: same set of ids,
    /// and every archetype equal to its captured counterpart. Realm order of
    /// root entities is not compared.
    pub fn matches(&self, realm: &[EntityArchetype]) -> bool {
        realm.len() == self.entities.len()
            && realm
                .iter()
                .all(|e| self.get_entity_by_id(e.id).is_some_and(|s| !s.is_different_from(e)))
    }

    /// True for entities that are new since the capture or differ from it.
    pub fn is_entity_modified(&self, live: &EntityArchetype) -> bool {
        self.get_entity_by_id(live.id)
            .map_or(true, |s| s.is_different_from(live))
    }

    pub fn is_element_modified(&self, live: &ElementArchetype) -> bool {
        self.get_element_by_id(live.id)
            .map_or(true, |s| s.is_different_from(live))
    }

    /// The stored document entry of one property, if the element existed and
    /// carried that key.
    pub fn initial_property_value(&self, element_id: SimpleGuid, property_name: &str) -> Option<&Value> {
        self.get_element_by_id(element_id)?.data.get(property_name)
    }

    pub fn has_element_property_changed(&self, element_id: SimpleGuid, property_name: &str, current: &Value) -> bool {
        self.initial_property_value(element_id, property_name) != Some(current)
    }

    /// Recompute the hash and compare it with the stored one.
    pub fn verify(&self) -> bool {
        compute_hash(&self.entities) == self.hash
    }

    /// A copy of the captured archetypes for restoring a realm.
    pub fn restore(&self) -> Vec<EntityArchetype> {
        self.entities.clone()
    }
}

// ---------------------------------------------------------------------------
// Hashing helpers
// ---------------------------------------------------------------------------

/// BLAKE3 hex digest of the persisted content of `entities`, sorted by id so
/// the digest does not depend on realm order.
fn compute_hash(entities: &[EntityArchetype]) -> String {
    #[derive(Serialize)]
    struct HashableRealm<'a> {
        entities: Vec<&'a EntityArchetype>,
    }

    let mut sorted: Vec<&EntityArchetype> = entities.iter().collect();
    sorted.sort_by_key(|e| e.id);

    let json_bytes = serde_json::to_vec(&HashableRealm { entities: sorted })
        .expect("RealmSnapshot content should always be JSON-serializable");

    blake3::hash(&json_bytes).to_hex().to_string()
}
