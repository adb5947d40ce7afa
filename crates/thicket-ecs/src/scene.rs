//! The live scene: the runtime container the editor previews archetypes in.
//!
//! Entities are created with an explicit id so that live objects can be
//! correlated back to the archetype they were projected from.

use std::collections::HashMap;

use crate::entity::Entity;
use crate::guid::SimpleGuid;
use crate::EcsError;

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Scene {
    name: String,
    entities: Vec<Entity>,
    /// id -> index into `entities`. Rebuilt after removals.
    index: HashMap<SimpleGuid, usize>,
}

impl Scene {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            entities: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create a bare entity with the given id and name.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidId`] for the invalid sentinel,
    /// [`EcsError::DuplicateEntity`] if the id is already live in this scene.
    pub fn create_entity(&mut self, id: SimpleGuid, name: &str) -> Result<&mut Entity, EcsError> {
        if id.is_invalid() {
            return Err(EcsError::InvalidId);
        }
        if self.index.contains_key(&id) {
            return Err(EcsError::DuplicateEntity { id });
        }
        self.index.insert(id, self.entities.len());
        self.entities.push(Entity::new(id, name));
        tracing::trace!(scene = %self.name, entity_id = %id, name, "live entity created");
        let last = self.entities.len() - 1;
        Ok(&mut self.entities[last])
    }

    /// Remove an entity. Its children become roots; it is unlinked from its parent.
    pub fn remove_entity(&mut self, id: SimpleGuid) -> Result<Entity, EcsError> {
        let idx = *self.index.get(&id).ok_or(EcsError::EntityNotFound { id })?;
        let parent_id = self.entities[idx].parent_id;
        let child_ids = self.entities[idx].child_ids.clone();

        if let Some(parent) = self.get_entity_by_id_mut(parent_id) {
            parent.child_ids.retain(|c| *c != id);
        }
        for child_id in child_ids {
            if let Some(child) = self.get_entity_by_id_mut(child_id) {
                child.parent_id = SimpleGuid::INVALID;
            }
        }

        let mut removed = self.entities.remove(idx);
        removed.shutdown();
        self.reindex();
        tracing::debug!(scene = %self.name, entity_id = %id, "live entity removed");
        Ok(removed)
    }

    pub fn get_entity_by_id(&self, id: SimpleGuid) -> Option<&Entity> {
        self.index.get(&id).map(|&i| &self.entities[i])
    }

    pub fn get_entity_by_id_mut(&mut self, id: SimpleGuid) -> Option<&mut Entity> {
        match self.index.get(&id) {
            Some(&i) => Some(&mut self.entities[i]),
            None => None,
        }
    }

    /// First entity with a matching name.
    pub fn get_entity_by_name(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name() == name)
    }

    /// Link `child_id` under `parent_id` (or detach with the invalid id).
    ///
    /// # Errors
    ///
    /// Fails if either entity is missing or the link would create a cycle.
    pub fn set_parent(&mut self, child_id: SimpleGuid, parent_id: SimpleGuid) -> Result<(), EcsError> {
        if !self.index.contains_key(&child_id) {
            return Err(EcsError::EntityNotFound { id: child_id });
        }
        if parent_id.is_valid() {
            if !self.index.contains_key(&parent_id) {
                return Err(EcsError::EntityNotFound { id: parent_id });
            }
            if self.is_ancestor_or_self(child_id, parent_id) {
                return Err(EcsError::HierarchyCycle {
                    child: child_id,
                    parent: parent_id,
                });
            }
        }

        let old_parent = self.entities[self.index[&child_id]].parent_id;
        if let Some(old) = self.get_entity_by_id_mut(old_parent) {
            old.child_ids.retain(|c| *c != child_id);
        }
        if let Some(child) = self.get_entity_by_id_mut(child_id) {
            child.parent_id = parent_id;
        }
        if let Some(parent) = self.get_entity_by_id_mut(parent_id) {
            parent.child_ids.push(child_id);
        }
        Ok(())
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Advance every element of every entity.
    pub fn update(&mut self, delta_time: f32) {
        for entity in &mut self.entities {
            entity.update(delta_time);
        }
    }

    /// Shut down and drop every entity.
    pub fn clear(&mut self) {
        tracing::debug!(scene = %self.name, entities = self.entities.len(), "clearing scene");
        for entity in &mut self.entities {
            entity.shutdown();
        }
        self.entities.clear();
        self.index.clear();
    }

    /// True if walking up the parent chain from `start` reaches `target`.
    fn is_ancestor_or_self(&self, target: SimpleGuid, start: SimpleGuid) -> bool {
        let mut current = start;
        let mut steps = 0;
        while current.is_valid() && steps <= self.entities.len() {
            if current == target {
                return true;
            }
            current = match self.get_entity_by_id(current) {
                Some(e) => e.parent_id,
                None => return false,
            };
            steps += 1;
        }
        false
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (i, e) in self.entities.iter().enumerate() {
            self.index.insert(e.id(), i);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
