//! The authoritative store of the realm being edited.
//!
//! [`EditorRealmManager`] owns the forest of [`EntityArchetype`]s plus an id
//! index, and keeps three things consistent across every public call:
//!
//! - **Links**: an entity's `child_ids` are exactly the entities whose
//!   `parent_id` names it, and parent chains never loop.
//! - **Dirty state**: [`is_dirty`](EditorRealmManager::is_dirty) compares the
//!   forest against the last [`RealmSnapshot`] by content.
//! - **Notifications**: each successful edit records [`RealmEvent`]s in the
//!   journal and calls listeners, after the forest is consistent again.
//!
//! Failing calls return a [`RealmError`] and leave the forest untouched.
//! Callers must re-resolve archetypes by id after any mutating call.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use thicket_ecs::guid::SimpleGuid;
use thicket_reflect::convert::{default_value, document_to_value};
use thicket_reflect::handle::{DocumentPropertyHandle, PropertyHandle};
use thicket_reflect::registry::ByteMirror;
use thicket_reflect::value::PropertyValue;
use thicket_reflect::ReflectError;

use crate::archetypes::{ArchetypeState, ElementArchetype, EntityArchetype};
use crate::config::{EditorConfig, RealmSettings};
use crate::events::{RealmEvent, RealmJournal, RealmListener};
use crate::factory::ArchetypeFactory;
use crate::hierarchy::{find_issues, HierarchyIssue, WorldTreeNode};
use crate::loader::{self, LoadedRealm};
use crate::snapshot::RealmSnapshot;
use crate::RealmError;

/// Coarse lifecycle of the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealmState {
    /// Nothing loaded. Only loading, starting a realm and `add_entity` work.
    Empty,
    Loaded,
}

// ---------------------------------------------------------------------------
// EditorRealmManager
// ---------------------------------------------------------------------------

pub struct EditorRealmManager<'m> {
    mirror: &'m ByteMirror,
    config: EditorConfig,
    factory: ArchetypeFactory<'m>,
    state: RealmState,
    realm: Vec<EntityArchetype>,
    /// Entity id -> position in `realm`.
    index: HashMap<SimpleGuid, usize>,
    /// Element id -> owning entity id.
    element_owners: HashMap<SimpleGuid, SimpleGuid>,
    settings: RealmSettings,
    snapshot: RealmSnapshot,
    journal: RealmJournal,
    listeners: Vec<RealmListener>,
}

impl std::fmt::Debug for EditorRealmManager<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorRealmManager")
            .field("state", &self.state)
            .field("entities", &self.realm.len())
            .field("settings", &self.settings)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl<'m> EditorRealmManager<'m> {
    pub fn new(mirror: &'m ByteMirror, config: EditorConfig) -> Self {
        Self {
            mirror,
            factory: ArchetypeFactory::new(mirror, &config),
            config,
            state: RealmState::Empty,
            realm: Vec::new(),
            index: HashMap::new(),
            element_owners: HashMap::new(),
            settings: RealmSettings::default(),
            snapshot: RealmSnapshot::empty(),
            journal: RealmJournal::new(),
            listeners: Vec::new(),
        }
    }

    // -- lifecycle ----------------------------------------------------------

    pub fn state(&self) -> RealmState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state == RealmState::Loaded
    }

    /// Start an empty, clean realm.
    pub fn new_realm(&mut self) {
        self.replace_realm(Vec::new(), RealmSettings::default());
        self.snapshot = RealmSnapshot::empty();
    }

    /// Replace the forest with a realm file's content and mark it clean.
    /// Returns the loader's repair warnings.
    ///
    /// # Errors
    ///
    /// I/O and parse failures; with `strict_load`, any repair warning. The
    /// current realm is kept on failure.
    pub fn load_realm_from_file(&mut self, path: impl AsRef<Path>) -> Result<Vec<String>, RealmError> {
        let loaded = loader::load_realm_from_file(path)?;
        self.load_realm(loaded)
    }

    /// [`load_realm_from_file`](Self::load_realm_from_file) for text already in memory.
    pub fn load_realm_from_str(&mut self, text: &str) -> Result<Vec<String>, RealmError> {
        let loaded = loader::load_realm_from_str(text)?;
        self.load_realm(loaded)
    }

    fn load_realm(&mut self, loaded: LoadedRealm) -> Result<Vec<String>, RealmError> {
        if self.config.strict_load && !loaded.warnings.is_empty() {
            return Err(RealmError::LoadWarnings {
                warnings: loaded.warnings,
            });
        }
        for warning in &loaded.warnings {
            tracing::warn!(%warning, "realm repaired on load");
        }
        let LoadedRealm {
            entities,
            settings,
            warnings,
            source_path,
        } = loaded;
        self.replace_realm(entities, settings);
        self.snapshot = RealmSnapshot::empty();
        self.take_snapshot();
        if let Some(path) = source_path {
            self.snapshot.set_source_path(path);
        }
        Ok(warnings)
    }

    fn replace_realm(&mut self, entities: Vec<EntityArchetype>, settings: RealmSettings) {
        self.realm = entities;
        self.settings = settings;
        self.state = RealmState::Loaded;
        self.journal.clear();
        self.synchronize();
    }

    /// Normalise every known element's data, write the realm, and make the
    /// written state the clean one.
    pub fn save_realm_to_file(&mut self, path: impl AsRef<Path>) -> Result<(), RealmError> {
        self.require_loaded()?;
        let path = path.as_ref();
        let mut normalized = self.realm.clone();
        for element in normalized.iter_mut().flat_map(|e| e.elements.iter_mut()) {
            loader::normalize_element_data(self.mirror, element)?;
        }
        loader::save_realm_to_file(path, &normalized, &self.settings, self.config.pretty_save)?;
        self.realm = normalized;
        self.take_snapshot();
        self.snapshot.set_source_path(path);
        Ok(())
    }

    /// Drop the forest and return to [`RealmState::Empty`].
    pub fn clear_realm(&mut self) {
        self.realm.clear();
        self.state = RealmState::Empty;
        self.snapshot = RealmSnapshot::empty();
        self.journal.clear();
        self.synchronize();
    }

    // -- snapshots ----------------------------------------------------------

    /// Capture the current forest; it becomes the clean state.
    pub fn take_snapshot(&mut self) {
        for entity in &mut self.realm {
            entity.state = ArchetypeState::UnModified;
            for element in &mut entity.elements {
                element.state = ArchetypeState::UnModified;
            }
        }
        let source = self.snapshot.source_path().map(Path::to_path_buf);
        self.snapshot = RealmSnapshot::capture(&self.realm);
        if let Some(path) = source {
            self.snapshot.set_source_path(path);
        }
    }

    pub fn snapshot(&self) -> &RealmSnapshot {
        &self.snapshot
    }

    /// True if the forest's content differs from the last snapshot.
    pub fn is_dirty(&self) -> bool {
        !self.snapshot.matches(&self.realm)
    }

    /// Roll the forest back to the last snapshot.
    pub fn restore_snapshot(&mut self) -> Result<(), RealmError> {
        self.require_loaded()?;
        self.realm = self.snapshot.restore();
        self.synchronize();
        Ok(())
    }

    /// Recompute every entity's and element's [`ArchetypeState`] against the
    /// last snapshot.
    pub fn refresh_archetype_states(&mut self) {
        for entity in &mut self.realm {
            entity.state = match self.snapshot.get_entity_by_id(entity.id) {
                None => ArchetypeState::New,
                Some(s) if s.is_different_from(entity) => ArchetypeState::Modified,
                Some(_) => ArchetypeState::UnModified,
            };
            for element in &mut entity.elements {
                element.state = match self.snapshot.get_element_by_id(element.id) {
                    None => ArchetypeState::New,
                    Some(s) if s.is_different_from(element) => ArchetypeState::Modified,
                    Some(_) => ArchetypeState::UnModified,
                };
            }
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn mirror(&self) -> &'m ByteMirror {
        self.mirror
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn settings(&self) -> &RealmSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: RealmSettings) {
        self.settings = RealmSettings::new(settings.use_realm_bounds, settings.realm_size);
    }

    /// Every entity archetype, in realm order.
    pub fn get_realm(&self) -> &[EntityArchetype] {
        &self.realm
    }

    pub fn entity_count(&self) -> usize {
        self.realm.len()
    }

    /// The tree view: roots in realm order, children in `child_ids` order.
    pub fn get_hierarchy(&self) -> Vec<WorldTreeNode> {
        WorldTreeNode::build_forest(&self.realm)
    }

    pub fn get_archetype(&self, entity_id: SimpleGuid) -> Option<&EntityArchetype> {
        self.index.get(&entity_id).map(|&i| &self.realm[i])
    }

    /// Mutable access for name, state and element data edits. Ids and
    /// hierarchy links must only change through the manager's operations.
    pub fn get_archetype_mut(&mut self, entity_id: SimpleGuid) -> Option<&mut EntityArchetype> {
        self.index.get(&entity_id).map(|&i| &mut self.realm[i])
    }

    /// The entity that owns `element_id`, if any.
    pub fn get_element_owner(&self, element_id: SimpleGuid) -> Option<SimpleGuid> {
        self.element_owners.get(&element_id).copied()
    }

    /// True if any entity is named `name`.
    pub fn does_entity_name_exist(&self, name: &str) -> bool {
        self.realm.iter().any(|e| e.name == name)
    }

    /// Every strict descendant of `entity_id` in pre-order.
    pub fn get_descendants(&self, entity_id: SimpleGuid) -> Vec<SimpleGuid> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([entity_id]);
        let mut stack: Vec<SimpleGuid> = self
            .get_archetype(entity_id)
            .map(|e| e.child_ids.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            out.push(id);
            if let Some(e) = self.get_archetype(id) {
                stack.extend(e.child_ids.iter().rev().copied());
            }
        }
        out
    }

    /// True if `ancestor` appears on `entity_id`'s parent chain.
    pub fn is_descendant_of(&self, entity_id: SimpleGuid, ancestor: SimpleGuid) -> bool {
        let mut seen = HashSet::new();
        let mut current = self.get_archetype(entity_id).map_or(SimpleGuid::INVALID, |e| e.parent_id);
        while current.is_valid() && seen.insert(current) {
            if current == ancestor {
                return true;
            }
            current = self.get_archetype(current).map_or(SimpleGuid::INVALID, |e| e.parent_id);
        }
        false
    }

    /// Consistency pass over the whole forest.
    pub fn validate(&self) -> Vec<HierarchyIssue> {
        find_issues(&self.realm)
    }

    // -- events -------------------------------------------------------------

    pub fn journal(&self) -> &RealmJournal {
        &self.journal
    }

    /// Take every event recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<RealmEvent> {
        self.journal.drain()
    }

    /// Register a callback that sees every event with the updated forest.
    pub fn add_listener(&mut self, listener: impl FnMut(&RealmEvent, &[EntityArchetype]) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn emit(&mut self, events: Vec<RealmEvent>) {
        for event in events {
            for listener in &mut self.listeners {
                listener(&event, &self.realm);
            }
            self.journal.record(event);
        }
    }

    // -- entity edits -------------------------------------------------------

    /// Build an entity with the configured default elements and add it as a
    /// root.
    pub fn create_entity(&mut self, name: &str) -> Result<SimpleGuid, RealmError> {
        let entity = self.factory.create_entity_archetype(name)?;
        self.add_entity(entity)
    }

    /// Insert a new entity. One with a `parent_id` goes through
    /// [`add_child_entity`](Self::add_child_entity). Works on an empty
    /// manager and moves it to [`RealmState::Loaded`].
    pub fn add_entity(&mut self, archetype: EntityArchetype) -> Result<SimpleGuid, RealmError> {
        if archetype.parent_id.is_valid() {
            return self.add_child_entity(archetype);
        }
        self.check_insertable(&archetype)?;
        let id = archetype.id;
        self.state = RealmState::Loaded;
        self.realm.push(archetype);
        self.synchronize();
        tracing::debug!(entity_id = %id, "entity added");
        self.emit(vec![RealmEvent::EntityAdded { entity_id: id }]);
        Ok(id)
    }

    /// Insert an entity under its `parent_id`, appended to the parent's
    /// children.
    pub fn add_child_entity(&mut self, child: EntityArchetype) -> Result<SimpleGuid, RealmError> {
        self.require_loaded()?;
        self.check_insertable(&child)?;
        let parent_id = child.parent_id;
        let parent_index = self.entity_index(parent_id)?;
        let id = child.id;
        self.realm[parent_index].child_ids.push(id);
        self.realm.push(child);
        self.synchronize();
        tracing::debug!(entity_id = %id, parent_id = %parent_id, "child entity added");
        self.emit(vec![
            RealmEvent::EntityAdded { entity_id: id },
            RealmEvent::HierarchyChanged {
                entity_id: id,
                parent_id,
            },
        ]);
        Ok(id)
    }

    pub fn rename_entity(&mut self, entity_id: SimpleGuid, name: &str) -> Result<(), RealmError> {
        self.require_loaded()?;
        let i = self.entity_index(entity_id)?;
        self.realm[i].name = name.to_owned();
        Ok(())
    }

    /// Remove one entity. Its children become roots.
    pub fn purge_entity(&mut self, entity_id: SimpleGuid) -> Result<EntityArchetype, RealmError> {
        self.require_loaded()?;
        let i = self.entity_index(entity_id)?;
        let orphans = self.realm[i].child_ids.clone();
        let parent_id = self.realm[i].parent_id;

        for child in &orphans {
            if let Some(c) = self.get_archetype_mut(*child) {
                c.parent_id = SimpleGuid::INVALID;
            }
        }
        if let Some(p) = self.get_archetype_mut(parent_id) {
            p.child_ids.retain(|c| *c != entity_id);
        }
        let removed = self.realm.remove(i);
        self.synchronize();

        tracing::debug!(entity_id = %entity_id, orphans = orphans.len(), "entity purged");
        let mut events = vec![RealmEvent::EntityPurged { entity_id }];
        events.extend(orphans.into_iter().map(|c| RealmEvent::HierarchyChanged {
            entity_id: c,
            parent_id: SimpleGuid::INVALID,
        }));
        self.emit(events);
        Ok(removed)
    }

    /// Remove every strict descendant of `parent_id`. Returns the removed ids.
    pub fn purge_entity_descendants(&mut self, parent_id: SimpleGuid) -> Result<Vec<SimpleGuid>, RealmError> {
        self.require_loaded()?;
        let i = self.entity_index(parent_id)?;
        let doomed = self.get_descendants(parent_id);
        self.realm[i].child_ids.clear();
        self.remove_all(&doomed);

        tracing::debug!(entity_id = %parent_id, removed = doomed.len(), "descendants purged");
        if !doomed.is_empty() {
            self.emit(vec![RealmEvent::EntityFamilyPurged {
                root_id: parent_id,
                entity_ids: doomed.clone(),
            }]);
        }
        Ok(doomed)
    }

    /// Remove an entity and its whole subtree. Returns the removed ids, the
    /// entity first.
    pub fn purge_entity_and_family(&mut self, entity_id: SimpleGuid) -> Result<Vec<SimpleGuid>, RealmError> {
        self.require_loaded()?;
        let i = self.entity_index(entity_id)?;
        let parent_id = self.realm[i].parent_id;
        let mut doomed = vec![entity_id];
        doomed.extend(self.get_descendants(entity_id));

        if let Some(p) = self.get_archetype_mut(parent_id) {
            p.child_ids.retain(|c| *c != entity_id);
        }
        self.remove_all(&doomed);

        tracing::debug!(entity_id = %entity_id, removed = doomed.len(), "family purged");
        self.emit(vec![RealmEvent::EntityFamilyPurged {
            root_id: entity_id,
            entity_ids: doomed.clone(),
        }]);
        Ok(doomed)
    }

    /// Move `child_id` under `new_parent_id`, appended to its children, or to
    /// root level when `new_parent_id` is invalid.
    ///
    /// # Errors
    ///
    /// [`RealmError::CycleDetected`] if the new parent is the child itself or
    /// one of its descendants.
    pub fn reparent_entity(&mut self, child_id: SimpleGuid, new_parent_id: SimpleGuid) -> Result<(), RealmError> {
        self.require_loaded()?;
        let child_index = self.entity_index(child_id)?;
        if new_parent_id.is_valid() {
            self.entity_index(new_parent_id)?;
            if new_parent_id == child_id || self.is_descendant_of(new_parent_id, child_id) {
                return Err(RealmError::CycleDetected {
                    child: child_id,
                    parent: new_parent_id,
                });
            }
        }
        let old_parent = self.realm[child_index].parent_id;
        if old_parent == new_parent_id {
            return Ok(());
        }

        if let Some(p) = self.get_archetype_mut(old_parent) {
            p.child_ids.retain(|c| *c != child_id);
        }
        self.realm[child_index].parent_id = new_parent_id;
        if let Some(p) = self.get_archetype_mut(new_parent_id) {
            p.child_ids.push(child_id);
        }

        tracing::debug!(entity_id = %child_id, parent_id = %new_parent_id, "entity reparented");
        self.emit(vec![RealmEvent::HierarchyChanged {
            entity_id: child_id,
            parent_id: new_parent_id,
        }]);
        Ok(())
    }

    /// Move `child_id` to root level.
    pub fn release_from_parent(&mut self, child_id: SimpleGuid) -> Result<(), RealmError> {
        self.reparent_entity(child_id, SimpleGuid::INVALID)
    }

    /// Call `visit` on each ancestor of `start_entity_id`, nearest first,
    /// stopping at a root or at an ancestor already visited. Returns how many
    /// ancestors were visited.
    pub fn update_ancestor_states(
        &mut self,
        start_entity_id: SimpleGuid,
        mut visit: impl FnMut(&mut EntityArchetype),
    ) -> Result<usize, RealmError> {
        let i = self.entity_index(start_entity_id)?;
        let mut seen = HashSet::from([start_entity_id]);
        let mut current = self.realm[i].parent_id;
        let mut visited = 0;
        while current.is_valid() && seen.insert(current) {
            let Some(&index) = self.index.get(&current) else {
                break;
            };
            visit(&mut self.realm[index]);
            visited += 1;
            current = self.realm[index].parent_id;
        }
        Ok(visited)
    }

    // -- duplication --------------------------------------------------------

    /// Copy one entity (not its children) to root level.
    pub fn duplicate_entity(&mut self, entity_id: SimpleGuid) -> Result<SimpleGuid, RealmError> {
        self.require_loaded()?;
        let i = self.entity_index(entity_id)?;
        let copy = self.factory.duplicate_entity_archetype(&self.realm[i], &self.realm)?;
        let id = copy.id;
        self.realm.push(copy);
        self.synchronize();
        tracing::debug!(source_id = %entity_id, entity_id = %id, "entity duplicated");
        self.emit(vec![RealmEvent::EntityAdded { entity_id: id }]);
        Ok(id)
    }

    /// Copy one entity (not its children) next to the source, under the
    /// same parent.
    pub fn duplicate_entity_as_sibling(&mut self, entity_id: SimpleGuid) -> Result<SimpleGuid, RealmError> {
        self.require_loaded()?;
        let i = self.entity_index(entity_id)?;
        let mut copy = self.factory.duplicate_entity_archetype(&self.realm[i], &self.realm)?;
        let parent_id = self.realm[i].parent_id;
        copy.parent_id = parent_id;
        let id = copy.id;

        self.insert_after_sibling(entity_id, parent_id, id);
        self.realm.insert(i + 1, copy);
        self.synchronize();

        let mut events = vec![RealmEvent::EntityAdded { entity_id: id }];
        if parent_id.is_valid() {
            events.push(RealmEvent::HierarchyChanged {
                entity_id: id,
                parent_id,
            });
        }
        self.emit(events);
        Ok(id)
    }

    /// Copy an entity with its whole subtree; the copy becomes a root.
    /// Returns the new ids, root first.
    pub fn duplicate_entity_with_children(&mut self, entity_id: SimpleGuid) -> Result<Vec<SimpleGuid>, RealmError> {
        self.require_loaded()?;
        let i = self.entity_index(entity_id)?;
        let mut family = self
            .factory
            .duplicate_entity_archetype_and_children(&self.realm[i], &self.realm)?;
        if let Some(root) = family.first_mut() {
            root.parent_id = SimpleGuid::INVALID;
        }
        Ok(self.insert_family(entity_id, family))
    }

    /// Copy an entity with its whole subtree next to the source, under the
    /// same parent. Returns the new ids, root first.
    pub fn duplicate_family_as_sibling(&mut self, entity_id: SimpleGuid) -> Result<Vec<SimpleGuid>, RealmError> {
        self.require_loaded()?;
        let i = self.entity_index(entity_id)?;
        let family = self
            .factory
            .duplicate_entity_archetype_family_as_sibling(&self.realm[i], &self.realm)?;
        if let Some(root) = family.first() {
            self.insert_after_sibling(entity_id, root.parent_id, root.id);
        }
        Ok(self.insert_family(entity_id, family))
    }

    fn insert_family(&mut self, source_id: SimpleGuid, family: Vec<EntityArchetype>) -> Vec<SimpleGuid> {
        let ids: Vec<SimpleGuid> = family.iter().map(|e| e.id).collect();
        let Some(&root_id) = ids.first() else {
            return ids;
        };
        let root_parent = family[0].parent_id;
        self.realm.extend(family);
        self.synchronize();

        tracing::debug!(source_id = %source_id, root_id = %root_id, count = ids.len(), "family duplicated");
        let mut events = vec![RealmEvent::EntityFamilyAdded {
            root_id,
            entity_ids: ids.clone(),
        }];
        if root_parent.is_valid() {
            events.push(RealmEvent::HierarchyChanged {
                entity_id: root_id,
                parent_id: root_parent,
            });
        }
        self.emit(events);
        ids
    }

    /// Put `new_id` right after `sibling_id` in `parent_id`'s child list.
    fn insert_after_sibling(&mut self, sibling_id: SimpleGuid, parent_id: SimpleGuid, new_id: SimpleGuid) {
        if let Some(parent) = self.get_archetype_mut(parent_id) {
            let at = parent
                .child_ids
                .iter()
                .position(|c| *c == sibling_id)
                .map_or(parent.child_ids.len(), |p| p + 1);
            parent.child_ids.insert(at, new_id);
        }
    }

    // -- element edits ------------------------------------------------------

    /// Attach a fresh element of `type_name` with reflected defaults.
    pub fn add_element_to_entity(&mut self, entity_id: SimpleGuid, type_name: &str) -> Result<SimpleGuid, RealmError> {
        self.require_loaded()?;
        self.entity_index(entity_id)?;
        let element = self.factory.create_element_archetype(type_name)?;
        self.add_element_archetype(entity_id, element)
    }

    /// Attach a prepared element archetype.
    pub fn add_element_archetype(
        &mut self,
        entity_id: SimpleGuid,
        element: ElementArchetype,
    ) -> Result<SimpleGuid, RealmError> {
        self.require_loaded()?;
        let i = self.entity_index(entity_id)?;
        self.check_free_id(element.id)?;
        let element_id = element.id;
        self.realm[i].elements.push(element);
        self.element_owners.insert(element_id, entity_id);

        tracing::debug!(entity_id = %entity_id, element_id = %element_id, "element added");
        self.emit(vec![RealmEvent::ElementAdded { entity_id, element_id }]);
        Ok(element_id)
    }

    /// Copy an element right after itself on the same entity.
    ///
    /// # Errors
    ///
    /// [`RealmError::DuplicationNotAllowed`] for locked elements.
    pub fn duplicate_element(&mut self, entity_id: SimpleGuid, element_id: SimpleGuid) -> Result<SimpleGuid, RealmError> {
        self.require_loaded()?;
        let i = self.entity_index(entity_id)?;
        let entity = &self.realm[i];
        let pos = element_position(entity, element_id)?;
        let copy = self
            .factory
            .duplicate_element_archetype(&entity.elements[pos], &entity.elements)?;
        let copy_id = copy.id;
        self.realm[i].elements.insert(pos + 1, copy);
        self.element_owners.insert(copy_id, entity_id);

        self.emit(vec![RealmEvent::ElementAdded {
            entity_id,
            element_id: copy_id,
        }]);
        Ok(copy_id)
    }

    /// Remove one element from an entity.
    pub fn purge_element(&mut self, entity_id: SimpleGuid, element_id: SimpleGuid) -> Result<ElementArchetype, RealmError> {
        self.require_loaded()?;
        let i = self.entity_index(entity_id)?;
        let pos = element_position(&self.realm[i], element_id)?;
        let removed = self.realm[i].elements.remove(pos);
        self.element_owners.remove(&element_id);
        tracing::debug!(entity_id = %entity_id, element_id = %element_id, "element purged");
        Ok(removed)
    }

    /// Write one property of one element through its reflected type. The
    /// `name` property also renames the element.
    pub fn set_element_property(
        &mut self,
        entity_id: SimpleGuid,
        element_id: SimpleGuid,
        property_name: &str,
        value: PropertyValue,
    ) -> Result<(), RealmError> {
        self.require_loaded()?;
        let i = self.entity_index(entity_id)?;
        let pos = element_position(&self.realm[i], element_id)?;
        let mirror = self.mirror;
        let element = &mut self.realm[i].elements[pos];
        if mirror.get_type_info_by_name(&element.type_name).is_none() {
            return Err(RealmError::UnknownType {
                name: element.type_name.clone(),
            });
        }
        let prop = mirror
            .find_property(&element.type_name, property_name)
            .ok_or_else(|| ReflectError::UnknownProperty {
                type_name: element.type_name.clone(),
                property: property_name.to_owned(),
            })?;

        DocumentPropertyHandle::new(mirror, prop, &mut element.data).set_value(value.clone())?;
        if property_name == "name" {
            if let PropertyValue::String(name) = &value {
                element.name = name.clone();
            }
        }
        let element_type_name = element.type_name.clone();

        self.emit(vec![RealmEvent::PropertyValueChanged {
            entity_id,
            element_id,
            element_type_name,
            property_name: property_name.to_owned(),
            new_value: value,
        }]);
        Ok(())
    }

    /// Read one property of one element; absent keys read as the default.
    pub fn get_element_property(
        &self,
        entity_id: SimpleGuid,
        element_id: SimpleGuid,
        property_name: &str,
    ) -> Result<PropertyValue, RealmError> {
        let i = self.entity_index(entity_id)?;
        let pos = element_position(&self.realm[i], element_id)?;
        let element = &self.realm[i].elements[pos];
        let prop = self
            .mirror
            .find_property(&element.type_name, property_name)
            .ok_or_else(|| ReflectError::UnknownProperty {
                type_name: element.type_name.clone(),
                property: property_name.to_owned(),
            })?;
        let value = match element.data.get(property_name) {
            Some(node) => document_to_value(self.mirror, prop.property_type(), prop.contained_type(), node)?,
            None => default_value(self.mirror, prop.property_type(), prop.contained_type())?,
        };
        Ok(value)
    }

    // -- internals ----------------------------------------------------------

    fn require_loaded(&self) -> Result<(), RealmError> {
        match self.state {
            RealmState::Loaded => Ok(()),
            RealmState::Empty => Err(RealmError::NotLoaded),
        }
    }

    fn entity_index(&self, entity_id: SimpleGuid) -> Result<usize, RealmError> {
        if entity_id.is_invalid() {
            return Err(RealmError::InvalidId);
        }
        self.index
            .get(&entity_id)
            .copied()
            .ok_or(RealmError::EntityNotFound { id: entity_id })
    }

    fn check_free_id(&self, id: SimpleGuid) -> Result<(), RealmError> {
        if id.is_invalid() {
            return Err(RealmError::InvalidId);
        }
        if self.index.contains_key(&id) || self.element_owners.contains_key(&id) {
            return Err(RealmError::DuplicateId { id });
        }
        Ok(())
    }

    fn check_insertable(&self, archetype: &EntityArchetype) -> Result<(), RealmError> {
        self.check_free_id(archetype.id)?;
        if !archetype.child_ids.is_empty() {
            return Err(RealmError::UnexpectedChildren { id: archetype.id });
        }
        let mut own = HashSet::from([archetype.id]);
        for element in &archetype.elements {
            self.check_free_id(element.id)?;
            if !own.insert(element.id) {
                return Err(RealmError::DuplicateId { id: element.id });
            }
        }
        Ok(())
    }

    fn remove_all(&mut self, ids: &[SimpleGuid]) {
        let doomed: HashSet<SimpleGuid> = ids.iter().copied().collect();
        self.realm.retain(|e| !doomed.contains(&e.id));
        self.synchronize();
    }

    /// Rebuild the id indexes from `realm`.
    fn synchronize(&mut self) {
        self.index.clear();
        self.element_owners.clear();
        for (i, entity) in self.realm.iter().enumerate() {
            self.index.insert(entity.id, i);
            for element in &entity.elements {
                self.element_owners.insert(element.id, entity.id);
            }
        }
    }
}

fn element_position(entity: &EntityArchetype, element_id: SimpleGuid) -> Result<usize, RealmError> {
    entity
        .elements
        .iter()
        .position(|e| e.id == element_id)
        .ok_or(RealmError::ElementNotFound {
            entity_id: entity.id,
            element_id,
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn manager() -> EditorRealmManager<'static> {
        let mut m = EditorRealmManager::new(ByteMirror::global(), EditorConfig::default());
        m.new_realm();
        m
    }

    #[test]
    fn empty_manager_rejects_edits_but_accepts_add() {
        let mut m = EditorRealmManager::new(ByteMirror::global(), EditorConfig::default());
        assert_eq!(m.state(), RealmState::Empty);
        let stray = SimpleGuid::generate();
        assert_eq!(m.purge_entity(stray), Err(RealmError::NotLoaded));
        assert_eq!(m.reparent_entity(stray, SimpleGuid::INVALID), Err(RealmError::NotLoaded));

        m.add_entity(EntityArchetype::new("First")).unwrap();
        assert!(m.is_loaded());
        m.clear_realm();
        assert_eq!(m.state(), RealmState::Empty);
        assert_eq!(m.entity_count(), 0);
    }

    #[test]
    fn add_entity_with_parent_becomes_child() {
        let mut m = manager();
        let parent = m.create_entity("Parent").unwrap();
        let mut child = EntityArchetype::new("Child");
        child.parent_id = parent;
        let child_id = m.add_entity(child).unwrap();
        assert_eq!(m.get_archetype(parent).unwrap().child_ids, [child_id]);

        let mut stray = EntityArchetype::new("Stray");
        stray.parent_id = SimpleGuid::generate();
        assert!(matches!(m.add_entity(stray), Err(RealmError::EntityNotFound { .. })));
        assert_eq!(m.entity_count(), 2);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut m = manager();
        let e = EntityArchetype::new("E");
        m.add_entity(e.clone()).unwrap();
        assert_eq!(m.add_entity(e.clone()), Err(RealmError::DuplicateId { id: e.id }));

        let mut with_children = EntityArchetype::new("Family");
        with_children.child_ids.push(SimpleGuid::generate());
        assert!(matches!(m.add_entity(with_children), Err(RealmError::UnexpectedChildren { .. })));
    }

    #[test]
    fn duplicate_as_sibling_lands_after_source() {
        let mut m = manager();
        let p = m.create_entity("P").unwrap();
        let a = m.create_entity("A").unwrap();
        let b = m.create_entity("B").unwrap();
        m.reparent_entity(a, p).unwrap();
        m.reparent_entity(b, p).unwrap();

        let copy = m.duplicate_entity_as_sibling(a).unwrap();
        assert_eq!(m.get_archetype(p).unwrap().child_ids, [a, copy, b]);
        assert_eq!(m.get_archetype(copy).unwrap().name, "A (Copy)");
        assert!(m.validate().is_empty());
    }

    #[test]
    fn with_children_reroots_and_as_sibling_keeps_parent() {
        let mut m = manager();
        let p = m.create_entity("P").unwrap();
        let a = m.create_entity("A").unwrap();
        let a1 = m.create_entity("A1").unwrap();
        m.reparent_entity(a, p).unwrap();
        m.reparent_entity(a1, a).unwrap();

        let rerooted = m.duplicate_entity_with_children(a).unwrap();
        assert_eq!(rerooted.len(), 2);
        assert!(m.get_archetype(rerooted[0]).unwrap().is_root());
        assert_eq!(m.get_archetype(rerooted[1]).unwrap().parent_id, rerooted[0]);

        let siblings = m.duplicate_family_as_sibling(a).unwrap();
        assert_eq!(m.get_archetype(siblings[0]).unwrap().parent_id, p);
        assert_eq!(m.get_archetype(p).unwrap().child_ids, [a, siblings[0]]);
        assert!(m.validate().is_empty());
        assert_eq!(m.entity_count(), 7);
    }

    #[test]
    fn purge_descendants_keeps_the_parent() {
        let mut m = manager();
        let p = m.create_entity("P").unwrap();
        let a = m.create_entity("A").unwrap();
        let a1 = m.create_entity("A1").unwrap();
        m.reparent_entity(a, p).unwrap();
        m.reparent_entity(a1, a).unwrap();

        let removed = m.purge_entity_descendants(p).unwrap();
        assert_eq!(removed, [a, a1]);
        assert!(m.get_archetype(p).unwrap().child_ids.is_empty());
        assert_eq!(m.entity_count(), 1);
    }

    #[test]
    fn element_edits() {
        let mut m = manager();
        let e = m.create_entity("E").unwrap();
        let transform = m.get_archetype(e).unwrap().elements[0].id;
        assert!(matches!(
            m.duplicate_element(e, transform),
            Err(RealmError::DuplicationNotAllowed { .. })
        ));

        let script = m.add_element_to_entity(e, "CppScript").unwrap();
        let copy = m.duplicate_element(e, script).unwrap();
        let names: Vec<_> = m.get_archetype(e).unwrap().elements.iter().map(|el| el.name.clone()).collect();
        assert_eq!(names, ["Transform", "BoxCollider", "CppScript", "CppScript (Copy)"]);
        assert_eq!(m.get_element_owner(copy), Some(e));

        m.purge_element(e, copy).unwrap();
        assert_eq!(m.get_element_owner(copy), None);
        assert!(matches!(m.purge_element(e, copy), Err(RealmError::ElementNotFound { .. })));
        assert!(matches!(
            m.add_element_to_entity(e, "Teleporter"),
            Err(RealmError::UnknownType { .. })
        ));
    }

    #[test]
    fn property_writes_go_through_reflection() {
        let mut m = manager();
        let e = m.create_entity("E").unwrap();
        let script = m.add_element_to_entity(e, "CppScript").unwrap();
        m.drain_events();

        m.set_element_property(e, script, "Script Name", "Door.cpp".into()).unwrap();
        m.set_element_property(e, script, "name", "Door".into()).unwrap();
        assert_eq!(
            m.get_element_property(e, script, "Script Name").unwrap(),
            PropertyValue::String("Door.cpp".to_owned())
        );
        assert_eq!(m.get_archetype(e).unwrap().get_element_by_id(script).unwrap().name, "Door");

        assert!(matches!(
            m.set_element_property(e, script, "Script Name", PropertyValue::Int(3)),
            Err(RealmError::Reflect(ReflectError::TypeMismatch { .. }))
        ));
        assert!(matches!(
            m.set_element_property(e, script, "Nope", PropertyValue::Int(3)),
            Err(RealmError::Reflect(ReflectError::UnknownProperty { .. }))
        ));

        let events = m.drain_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            RealmEvent::PropertyValueChanged { property_name, element_type_name, .. }
                if property_name == "Script Name" && element_type_name == "CppScript"
        ));
    }

    #[test]
    fn listeners_see_a_consistent_forest() {
        let mut m = manager();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        m.add_listener(move |event, realm| {
            let consistent = find_issues(realm).is_empty();
            sink.lock().unwrap().push((event.clone(), consistent, realm.len()));
        });

        let p = m.create_entity("P").unwrap();
        let c = m.create_entity("C").unwrap();
        m.reparent_entity(c, p).unwrap();
        m.purge_entity(p).unwrap();

        let seen = seen.lock().unwrap();
        assert!(seen.iter().all(|(_, consistent, _)| *consistent));
        let last = seen.last().unwrap();
        assert_eq!(
            last.0,
            RealmEvent::HierarchyChanged {
                entity_id: c,
                parent_id: SimpleGuid::INVALID
            }
        );
        assert_eq!(last.2, 1);
        assert_eq!(m.journal().len(), seen.len());
    }

    #[test]
    fn ancestor_walk_stops_at_root() {
        let mut m = manager();
        let a = m.create_entity("A").unwrap();
        let b = m.create_entity("B").unwrap();
        let c = m.create_entity("C").unwrap();
        m.reparent_entity(b, a).unwrap();
        m.reparent_entity(c, b).unwrap();

        let mut visited = Vec::new();
        let n = m
            .update_ancestor_states(c, |e| {
                visited.push(e.id);
                e.state = ArchetypeState::Modified;
            })
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(visited, [b, a]);
        assert_eq!(m.get_archetype(a).unwrap().state, ArchetypeState::Modified);
    }

    #[test]
    fn states_follow_the_snapshot() {
        let mut m = manager();
        let old = m.create_entity("Old").unwrap();
        m.take_snapshot();
        let new = m.create_entity("New").unwrap();
        m.rename_entity(old, "Older").unwrap();
        m.refresh_archetype_states();
        assert_eq!(m.get_archetype(old).unwrap().state, ArchetypeState::Modified);
        assert_eq!(m.get_archetype(new).unwrap().state, ArchetypeState::New);

        m.restore_snapshot().unwrap();
        assert!(!m.is_dirty());
        assert!(m.get_archetype(new).is_none());
        assert_eq!(m.get_archetype(old).unwrap().name, "Old");
    }

    #[test]
    fn restored_archetypes_come_back_unmodified() {
        let mut m = manager();
        let e = m.create_entity("E").unwrap();
        assert_eq!(m.get_archetype(e).unwrap().state, ArchetypeState::New);
        m.take_snapshot();
        assert!(m.snapshot().entities().iter().all(|s| s.state == ArchetypeState::UnModified));

        m.rename_entity(e, "Renamed").unwrap();
        m.refresh_archetype_states();
        assert_eq!(m.get_archetype(e).unwrap().state, ArchetypeState::Modified);

        m.restore_snapshot().unwrap();
        let restored = m.get_archetype(e).unwrap();
        assert_eq!(restored.state, ArchetypeState::UnModified);
        assert!(restored.elements.iter().all(|el| el.state == ArchetypeState::UnModified));
    }
}
