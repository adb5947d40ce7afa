//! Thicket Editor -- archetype realms, duplication, persistence and preview.
//!
//! This crate builds on [`thicket_reflect`] to keep the realm being edited as
//! plain [`EntityArchetype`](archetypes::EntityArchetype) data: the
//! [`EditorRealmManager`](realm::EditorRealmManager) owns the forest and
//! keeps parent/child links, the hierarchy view, dirty tracking and change
//! events consistent; the [`ArchetypeFactory`](factory::ArchetypeFactory)
//! builds and clones archetypes; the
//! [`ArchetypeInstantiator`](instantiator::ArchetypeInstantiator) projects
//! them into a live [`Scene`](thicket_ecs::scene::Scene).
//!
//! # Quick Start
//!
//! ```
//! use thicket_editor::prelude::*;
//!
//! let mirror = ByteMirror::global();
//! let mut realm = EditorRealmManager::new(mirror, EditorConfig::default());
//! realm.new_realm();
//!
//! let world = realm.create_entity("World").unwrap();
//! let lamp = realm.create_entity("Lamp").unwrap();
//! realm.reparent_entity(lamp, world).unwrap();
//! assert_eq!(realm.get_archetype(world).unwrap().child_ids, [lamp]);
//! assert!(realm.is_dirty());
//!
//! let mut scene = Scene::new("preview");
//! let report = ArchetypeInstantiator::new(mirror)
//!     .instantiate_realm(realm.get_realm(), &mut scene);
//! assert_eq!(report.entities_created, 2);
//! assert_eq!(scene.get_entity_by_id(lamp).unwrap().parent_id(), world);
//! ```

#![deny(unsafe_code)]

pub mod archetypes;
pub mod config;
pub mod events;
pub mod factory;
pub mod handle_factory;
pub mod hierarchy;
pub mod instantiator;
pub mod loader;
pub mod realm;
pub mod snapshot;

use thicket_ecs::guid::SimpleGuid;
use thicket_ecs::EcsError;
use thicket_reflect::ReflectError;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the live layer for convenience.
pub use thicket_ecs;

/// Re-export the reflection crate for convenience.
pub use thicket_reflect;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by realm edits, archetype construction and realm files.
///
/// A failing realm call never leaves a partial edit behind.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RealmError {
    /// The manager is empty; load or start a realm first.
    #[error("no realm is loaded")]
    NotLoaded,

    #[error("entity {id} is not in the realm")]
    EntityNotFound { id: SimpleGuid },

    #[error("entity {entity_id} has no element {element_id}")]
    ElementNotFound {
        entity_id: SimpleGuid,
        element_id: SimpleGuid,
    },

    /// The id is already used by an entity or element in the realm.
    #[error("id {id} is already in use")]
    DuplicateId { id: SimpleGuid },

    /// The invalid sentinel was given where a real id is required.
    #[error("the invalid id cannot name an archetype")]
    InvalidId,

    /// Parenting `child` under `parent` would close a loop.
    #[error("parenting {child} under {parent} would create a cycle")]
    CycleDetected { child: SimpleGuid, parent: SimpleGuid },

    #[error("element {element_id} does not allow duplication")]
    DuplicationNotAllowed { element_id: SimpleGuid },

    /// An entity arrived with children of its own; families enter through
    /// duplication or loading.
    #[error("entity {id} already lists children")]
    UnexpectedChildren { id: SimpleGuid },

    #[error("'{name}' is not a registered element type")]
    UnknownType { name: String },

    #[error(transparent)]
    Reflect(#[from] ReflectError),

    #[error(transparent)]
    Scene(#[from] EcsError),

    #[error("{path}: {message}")]
    Io { path: String, message: String },

    #[error("malformed realm data: {message}")]
    Parse { message: String },

    /// Strict loading refused a file that needed repairs.
    #[error("realm needed {} repair(s): {}", warnings.len(), warnings.join("; "))]
    LoadWarnings { warnings: Vec<String> },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common editor usage.
pub mod prelude {
    pub use thicket_ecs::prelude::*;
    pub use thicket_reflect::prelude::*;

    pub use crate::archetypes::{ArchetypeState, ElementArchetype, EntityArchetype};
    pub use crate::config::{EditorConfig, RealmSettings};
    pub use crate::events::{RealmEvent, RealmJournal, RealmListener};
    pub use crate::factory::{unique_copy_name, ArchetypeFactory};
    pub use crate::handle_factory::{ElementPropertyHandle, PropertyHandleFactory};
    pub use crate::hierarchy::{HierarchyIssue, WorldTreeNode};
    pub use crate::instantiator::{ArchetypeInstantiator, InstantiateReport};
    pub use crate::loader::{load_realm_from_file, load_realm_from_str, write_realm, LoadedRealm};
    pub use crate::realm::{EditorRealmManager, RealmState};
    pub use crate::snapshot::RealmSnapshot;
    pub use crate::RealmError;
}
