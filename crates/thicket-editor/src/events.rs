//! Structural-change notifications emitted by the realm manager.
//!
//! Every mutating realm call that succeeds produces one or more
//! [`RealmEvent`]s. They are recorded in the manager's [`RealmJournal`] and
//! handed to registered listeners synchronously, after the forest, its index
//! and the hierarchy view are consistent again.
//!
//! # Example
//!
//! ```
//! use thicket_editor::events::{RealmEvent, RealmJournal};
//! use thicket_ecs::guid::SimpleGuid;
//!
//! let mut journal = RealmJournal::new();
//! let id = SimpleGuid::generate();
//! journal.record(RealmEvent::EntityAdded { entity_id: id });
//! journal.record(RealmEvent::HierarchyChanged { entity_id: id, parent_id: SimpleGuid::INVALID });
//!
//! assert_eq!(journal.events_for_entity(id).count(), 2);
//! assert_eq!(journal.drain().len(), 2);
//! assert!(journal.is_empty());
//! ```

use serde::Serialize;
use thicket_ecs::guid::SimpleGuid;
use thicket_reflect::value::PropertyValue;

use crate::archetypes::EntityArchetype;

// ---------------------------------------------------------------------------
// RealmEvent
// ---------------------------------------------------------------------------

/// One structural or property change in the realm.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RealmEvent {
    EntityAdded {
        entity_id: SimpleGuid,
    },
    /// A duplicated family; `entity_ids` lists the new archetypes root first.
    EntityFamilyAdded {
        root_id: SimpleGuid,
        entity_ids: Vec<SimpleGuid>,
    },
    EntityPurged {
        entity_id: SimpleGuid,
    },
    EntityFamilyPurged {
        root_id: SimpleGuid,
        entity_ids: Vec<SimpleGuid>,
    },
    /// `parent_id` is [`SimpleGuid::INVALID`] when the entity became a root.
    HierarchyChanged {
        entity_id: SimpleGuid,
        parent_id: SimpleGuid,
    },
    ElementAdded {
        entity_id: SimpleGuid,
        element_id: SimpleGuid,
    },
    PropertyValueChanged {
        entity_id: SimpleGuid,
        element_id: SimpleGuid,
        element_type_name: String,
        property_name: String,
        new_value: PropertyValue,
    },
}

impl RealmEvent {
    /// Every entity id this event mentions.
    pub fn entity_ids(&self) -> Vec<SimpleGuid> {
        match self {
            Self::EntityAdded { entity_id }
            | Self::EntityPurged { entity_id }
            | Self::ElementAdded { entity_id, .. }
            | Self::PropertyValueChanged { entity_id, .. } => vec![*entity_id],
            Self::HierarchyChanged { entity_id, parent_id } => {
                if parent_id.is_valid() {
                    vec![*entity_id, *parent_id]
                } else {
                    vec![*entity_id]
                }
            }
            Self::EntityFamilyAdded { entity_ids, .. } | Self::EntityFamilyPurged { entity_ids, .. } => {
                entity_ids.clone()
            }
        }
    }

    pub fn concerns(&self, entity_id: SimpleGuid) -> bool {
        self.entity_ids().contains(&entity_id)
    }
}

/// A listener receives each event with a read-only view of the forest as it
/// stands after the change.
pub type RealmListener = Box<dyn FnMut(&RealmEvent, &[EntityArchetype]) + Send>;

// ---------------------------------------------------------------------------
// RealmJournal
// ---------------------------------------------------------------------------

/// Accumulates [`RealmEvent`]s until a consumer drains them.
#[derive(Debug, Clone, Default)]
pub struct RealmJournal {
    events: Vec<RealmEvent>,
}

impl RealmJournal {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn record(&mut self, event: RealmEvent) {
        self.events.push(event);
    }

    /// Take every recorded event, oldest first.
    pub fn drain(&mut self) -> Vec<RealmEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn all_events(&self) -> &[RealmEvent] {
        &self.events
    }

    pub fn last(&self) -> Option<&RealmEvent> {
        self.events.last()
    }

    /// Events that mention `entity_id` in any role.
    pub fn events_for_entity(&self, entity_id: SimpleGuid) -> impl Iterator<Item = &RealmEvent> {
        self.events.iter().filter(move |e| e.concerns(entity_id))
    }

    /// Serialize the recorded events as a JSON array, e.g. for a debug dump.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.events).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_change_concerns_both_ends() {
        let child = SimpleGuid::generate();
        let parent = SimpleGuid::generate();
        let ev = RealmEvent::HierarchyChanged {
            entity_id: child,
            parent_id: parent,
        };
        assert!(ev.concerns(child));
        assert!(ev.concerns(parent));
        assert!(!ev.concerns(SimpleGuid::INVALID));
    }

    #[test]
    fn json_dump_is_tagged() {
        let mut journal = RealmJournal::new();
        let id = SimpleGuid::from_raw(42);
        journal.record(RealmEvent::EntityPurged { entity_id: id });
        assert_eq!(
            journal.to_json(),
            serde_json::json!([{ "event": "entity_purged", "entity_id": 42 }])
        );
    }

    #[test]
    fn json_dump_carries_new_property_value() {
        let mut journal = RealmJournal::new();
        journal.record(RealmEvent::PropertyValueChanged {
            entity_id: SimpleGuid::from_raw(7),
            element_id: SimpleGuid::from_raw(8),
            element_type_name: "CppScript".to_owned(),
            property_name: "Script Name".to_owned(),
            new_value: PropertyValue::String("Door.cpp".to_owned()),
        });
        assert_eq!(
            journal.to_json(),
            serde_json::json!([{
                "event": "property_value_changed",
                "entity_id": 7,
                "element_id": 8,
                "element_type_name": "CppScript",
                "property_name": "Script Name",
                "new_value": { "String": "Door.cpp" }
            }])
        );
    }
}
