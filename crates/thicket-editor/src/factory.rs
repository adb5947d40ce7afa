//! Construction and cloning of archetype data.
//!
//! Every function here is pure from the caller's point of view: sources are
//! borrowed immutably and results are returned for the caller to place in a
//! realm. Duplication always hands out fresh ids for every entity and
//! element it produces.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use thicket_ecs::guid::SimpleGuid;
use thicket_reflect::convert::value_to_document;
use thicket_reflect::registry::ByteMirror;

use crate::archetypes::{ArchetypeState, ElementArchetype, EntityArchetype};
use crate::config::EditorConfig;
use crate::RealmError;

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

const COPY_MARKER: &str = " (Copy";

/// `"<base> (Copy)"`, then `"<base> (Copy 2)"`, `"<base> (Copy 3)"` ... until
/// `taken` says no. Any copy suffix already on `source_name` is stripped
/// first.
pub fn unique_copy_name(source_name: &str, taken: impl Fn(&str) -> bool) -> String {
    let base = source_name
        .find(COPY_MARKER)
        .map_or(source_name, |pos| &source_name[..pos]);
    let mut candidate = format!("{base} (Copy)");
    let mut n = 2u32;
    while taken(&candidate) {
        candidate = format!("{base} (Copy {n})");
        n += 1;
    }
    candidate
}

fn entity_name_taken(name: &str, realm: &[EntityArchetype], batch: &[EntityArchetype]) -> bool {
    realm.iter().chain(batch).any(|e| e.name == name)
}

// ---------------------------------------------------------------------------
// ArchetypeFactory
// ---------------------------------------------------------------------------

/// Builds fresh archetypes from reflected defaults and clones existing ones.
#[derive(Debug, Clone)]
pub struct ArchetypeFactory<'m> {
    mirror: &'m ByteMirror,
    default_elements: Vec<String>,
}

impl<'m> ArchetypeFactory<'m> {
    pub fn new(mirror: &'m ByteMirror, config: &EditorConfig) -> Self {
        Self {
            mirror,
            default_elements: config.default_elements.clone(),
        }
    }

    pub fn mirror(&self) -> &'m ByteMirror {
        self.mirror
    }

    /// An element archetype whose document holds every writable property of
    /// `type_name` at the live type's default value.
    ///
    /// # Errors
    ///
    /// [`RealmError::UnknownType`] if `type_name` is not a constructible
    /// element kind.
    pub fn create_element_archetype(&self, type_name: &str) -> Result<ElementArchetype, RealmError> {
        let template = self
            .mirror
            .create_element_by_name(type_name)
            .ok_or_else(|| RealmError::UnknownType {
                name: type_name.to_owned(),
            })?;

        let mut archetype = ElementArchetype::new(type_name);
        for prop in self.mirror.get_all_properties(type_name) {
            if prop.is_read_only() {
                continue;
            }
            let value = prop.get(&*template)?;
            let encoded = value_to_document(self.mirror, prop.property_type(), prop.contained_type(), &value)?;
            archetype.data.insert(prop.name().to_owned(), encoded);
        }
        archetype.data.insert("name".to_owned(), Value::String(type_name.to_owned()));
        Ok(archetype)
    }

    /// A root entity carrying one locked element per configured default
    /// element type.
    pub fn create_entity_archetype(&self, name: &str) -> Result<EntityArchetype, RealmError> {
        let mut entity = EntityArchetype::new(name);
        for type_name in &self.default_elements {
            let mut element = self.create_element_archetype(type_name)?;
            element.allows_duplication = false;
            entity.elements.push(element);
        }
        Ok(entity)
    }

    /// Copy `source` alone: new entity id, new element ids, a unique copy
    /// name, no parent and no children.
    ///
    /// # Errors
    ///
    /// Fails if `source` has an invalid id or repeats an element id.
    pub fn duplicate_entity_archetype(
        &self,
        source: &EntityArchetype,
        all_archetypes: &[EntityArchetype],
    ) -> Result<EntityArchetype, RealmError> {
        check_self_consistent(source)?;
        let mut copy = clone_entity_fresh(source);
        copy.name = unique_copy_name(&source.name, |n| entity_name_taken(n, all_archetypes, &[]));
        Ok(copy)
    }

    /// Deep copy of the subtree rooted at `source`, in pre-order. The copied
    /// root keeps the source's parent; every other link points at copies.
    pub fn duplicate_entity_archetype_and_children(
        &self,
        source: &EntityArchetype,
        all_archetypes: &[EntityArchetype],
    ) -> Result<Vec<EntityArchetype>, RealmError> {
        self.duplicate_family(source, all_archetypes)
    }

    /// Same as [`duplicate_entity_archetype_and_children`](Self::duplicate_entity_archetype_and_children)
    /// with the copied root forced under `source.parent_id`.
    pub fn duplicate_entity_archetype_family_as_sibling(
        &self,
        source: &EntityArchetype,
        all_archetypes: &[EntityArchetype],
    ) -> Result<Vec<EntityArchetype>, RealmError> {
        let mut family = self.duplicate_family(source, all_archetypes)?;
        if let Some(root) = family.first_mut() {
            root.parent_id = source.parent_id;
        }
        Ok(family)
    }

    /// Copy one element for placement next to `siblings`.
    ///
    /// # Errors
    ///
    /// [`RealmError::DuplicationNotAllowed`] for locked elements.
    pub fn duplicate_element_archetype(
        &self,
        source: &ElementArchetype,
        siblings: &[ElementArchetype],
    ) -> Result<ElementArchetype, RealmError> {
        if !source.allows_duplication {
            return Err(RealmError::DuplicationNotAllowed { element_id: source.id });
        }
        let mut copy = clone_element_fresh(source);
        copy.name = unique_copy_name(&source.name, |n| siblings.iter().any(|e| e.name == n));
        copy.data.insert("name".to_owned(), Value::String(copy.name.clone()));
        Ok(copy)
    }

    fn duplicate_family(
        &self,
        source: &EntityArchetype,
        all_archetypes: &[EntityArchetype],
    ) -> Result<Vec<EntityArchetype>, RealmError> {
        let originals = collect_family(source, all_archetypes);
        for original in &originals {
            check_self_consistent(original)?;
        }

        let id_map: HashMap<SimpleGuid, SimpleGuid> =
            originals.iter().map(|o| (o.id, SimpleGuid::generate())).collect();

        let mut family: Vec<EntityArchetype> = Vec::with_capacity(originals.len());
        for original in &originals {
            let mut copy = clone_entity_fresh(original);
            copy.id = id_map[&original.id];
            copy.name = unique_copy_name(&original.name, |n| entity_name_taken(n, all_archetypes, &family));
            copy.parent_id = id_map
                .get(&original.parent_id)
                .copied()
                .unwrap_or(original.parent_id);
            copy.child_ids = original
                .child_ids
                .iter()
                .filter_map(|c| id_map.get(c).copied())
                .collect();
            family.push(copy);
        }

        // The root copy must never point back into its own family.
        if let Some(root) = family.first_mut() {
            if id_map.values().any(|&id| id == root.parent_id) {
                root.parent_id = source.parent_id;
            }
        }

        tracing::debug!(
            source_id = %source.id,
            copies = family.len(),
            "duplicated entity family"
        );
        Ok(family)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn check_self_consistent(source: &EntityArchetype) -> Result<(), RealmError> {
    if source.id.is_invalid() {
        return Err(RealmError::InvalidId);
    }
    let mut seen = HashSet::new();
    for element in &source.elements {
        if element.id.is_invalid() {
            return Err(RealmError::InvalidId);
        }
        if !seen.insert(element.id) {
            return Err(RealmError::DuplicateId { id: element.id });
        }
    }
    Ok(())
}

fn clone_element_fresh(source: &ElementArchetype) -> ElementArchetype {
    ElementArchetype {
        id: SimpleGuid::generate(),
        state: ArchetypeState::New,
        ..source.clone()
    }
}

fn clone_entity_fresh(source: &EntityArchetype) -> EntityArchetype {
    EntityArchetype {
        name: source.name.clone(),
        id: SimpleGuid::generate(),
        parent_id: SimpleGuid::INVALID,
        child_ids: Vec::new(),
        elements: source.elements.iter().map(clone_element_fresh).collect(),
        state: ArchetypeState::New,
    }
}

/// `source` and every descendant reachable through `parent_id` links in
/// `all`, in pre-order. Siblings follow the parent's `child_ids` order, then
/// realm order for any child the list does not mention.
fn collect_family<'a>(source: &'a EntityArchetype, all: &'a [EntityArchetype]) -> Vec<&'a EntityArchetype> {
    let mut children: HashMap<SimpleGuid, Vec<&EntityArchetype>> = HashMap::new();
    for e in all {
        if e.parent_id.is_valid() {
            children.entry(e.parent_id).or_default().push(e);
        }
    }

    let mut out = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![source];
    while let Some(current) = stack.pop() {
        if !visited.insert(current.id) {
            continue;
        }
        out.push(current);
        let mut kids = children.get(&current.id).cloned().unwrap_or_default();
        kids.sort_by_key(|k| {
            current
                .child_ids
                .iter()
                .position(|c| *c == k.id)
                .unwrap_or(usize::MAX)
        });
        stack.extend(kids.into_iter().rev());
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
