//! Plain-data descriptions of entities and their elements.
//!
//! An [`EntityArchetype`] is what the editor stores, saves and duplicates;
//! a live [`Entity`](thicket_ecs::entity::Entity) is only ever built from one
//! by the instantiator. Element property values live in an order-preserving
//! JSON document keyed by property name, so the archetype never hardcodes
//! fields per element kind.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thicket_ecs::guid::SimpleGuid;

// ---------------------------------------------------------------------------
// ArchetypeState
// ---------------------------------------------------------------------------

/// Edit state of an archetype relative to the last snapshot.
///
/// Used for UI colouring only. Excluded from content comparison and from the
/// realm file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ArchetypeState {
    #[default]
    UnModified,
    New,
    Modified,
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// ElementArchetype
// ---------------------------------------------------------------------------

/// One element attached to an entity archetype.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementArchetype {
    /// Reflected type name, e.g. `"Transform"`.
    pub type_name: String,
    /// Display label.
    pub name: String,
    pub id: SimpleGuid,
    #[serde(default = "default_true")]
    pub allows_duplication: bool,
    /// Property values keyed by property name.
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(skip)]
    pub state: ArchetypeState,
}

impl ElementArchetype {
    /// An element of `type_name` with a fresh id and an empty document.
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_owned(),
            name: type_name.to_owned(),
            id: SimpleGuid::generate(),
            allows_duplication: true,
            data: Map::new(),
            state: ArchetypeState::New,
        }
    }

    /// True if any persisted field differs from `other`.
    pub fn is_different_from(&self, other: &ElementArchetype) -> bool {
        self != other
    }
}

impl PartialEq for ElementArchetype {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
            && self.name == other.name
            && self.id == other.id
            && self.allows_duplication == other.allows_duplication
            && self.data == other.data
    }
}

// ---------------------------------------------------------------------------
// EntityArchetype
// ---------------------------------------------------------------------------

/// One entity: identity, hierarchy links and owned elements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityArchetype {
    pub name: String,
    pub id: SimpleGuid,
    /// Parent entity, or [`SimpleGuid::INVALID`] for a root.
    #[serde(default, skip_serializing_if = "SimpleGuid::is_invalid")]
    pub parent_id: SimpleGuid,
    /// Direct children in display order.
    #[serde(default)]
    pub child_ids: Vec<SimpleGuid>,
    #[serde(default)]
    pub elements: Vec<ElementArchetype>,
    #[serde(skip)]
    pub state: ArchetypeState,
}

impl EntityArchetype {
    /// A root entity with a fresh id and no elements.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            id: SimpleGuid::generate(),
            parent_id: SimpleGuid::INVALID,
            child_ids: Vec::new(),
            elements: Vec::new(),
            state: ArchetypeState::New,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_invalid()
    }

    /// True if any persisted field, including element data, differs.
    pub fn is_different_from(&self, other: &EntityArchetype) -> bool {
        self != other
    }

    pub fn get_element_by_id(&self, element_id: SimpleGuid) -> Option<&ElementArchetype> {
        self.elements.iter().find(|e| e.id == element_id)
    }

    pub fn get_element_by_id_mut(&mut self, element_id: SimpleGuid) -> Option<&mut ElementArchetype> {
        self.elements.iter_mut().find(|e| e.id == element_id)
    }

    pub fn get_elements_by_type_name<'a>(
        &'a self,
        type_name: &'a str,
    ) -> impl Iterator<Item = &'a ElementArchetype> + 'a {
        self.elements.iter().filter(move |e| e.type_name == type_name)
    }

    /// The Transform that positions this entity: the first non-duplicable
    /// Transform, else the first Transform.
    pub fn get_primary_transform_id(&self) -> Option<SimpleGuid> {
        self.get_elements_by_type_name("Transform")
            .find(|e| !e.allows_duplication)
            .or_else(|| self.get_elements_by_type_name("Transform").next())
            .map(|e| e.id)
    }
}

impl PartialEq for EntityArchetype {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.id == other.id
            && self.parent_id == other.parent_id
            && self.child_ids == other.child_ids
            && self.elements == other.elements
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
