//! Thicket ECS -- live entities, elements and process-unique identifiers.
//!
//! This crate holds the runtime half of the editor: [`Entity`](entity::Entity)
//! objects that own boxed [`Element`](element::Element) trait objects, the
//! built-in element kinds, and the [`Scene`](scene::Scene) that archetypes are
//! instantiated into. Everything is keyed by [`SimpleGuid`](guid::SimpleGuid).
//!
//! # Quick Start
//!
//! ```
//! use thicket_ecs::prelude::*;
//!
//! let mut scene = Scene::new("preview");
//! let id = SimpleGuid::generate();
//! let entity = scene.create_entity(id, "Player").unwrap();
//! entity.add_element(Box::new(Transform::new()));
//!
//! let player = scene.get_entity_by_id(id).unwrap();
//! assert!(player.get_element::<Transform>().is_some());
//! ```

#![deny(unsafe_code)]

pub mod element;
pub mod elements;
pub mod entity;
pub mod guid;
pub mod math;
pub mod scene;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by live scene operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EcsError {
    /// The invalid sentinel id was used where a real id is required.
    #[error("the invalid id cannot name a live entity")]
    InvalidId,

    /// An entity with this id is already live in the scene.
    #[error("entity {id:?} already exists in the scene")]
    DuplicateEntity { id: guid::SimpleGuid },

    /// No live entity carries this id.
    #[error("entity {id:?} does not exist in the scene")]
    EntityNotFound { id: guid::SimpleGuid },

    /// Parenting `child` under `parent` would close a loop.
    #[error("parenting {child:?} under {parent:?} would create a cycle")]
    HierarchyCycle {
        child: guid::SimpleGuid,
        parent: guid::SimpleGuid,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::element::{Element, ElementBase};
    pub use crate::elements::{BoxCollider, Camera, CppScript, ProjectionMode, Sprite2D, Transform};
    pub use crate::entity::Entity;
    pub use crate::guid::SimpleGuid;
    pub use crate::math::{Color, Mat4, Point, Rect, Vector2, Vector3};
    pub use crate::scene::Scene;
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn scene_update_reaches_every_element() {
        let mut scene = Scene::new("s");
        let id = SimpleGuid::generate();
        {
            let e = scene.create_entity(id, "Cam").unwrap();
            e.add_element(Box::new(Camera::new()));
        }
        scene.update(0.016);
        let cam = scene.get_entity_by_id(id).unwrap().get_element::<Camera>().unwrap();
        assert_eq!(cam.projection_mode(), ProjectionMode::Perspective);
    }

    #[test]
    fn downcast_through_any() {
        let mut e = Entity::new(SimpleGuid::generate(), "E");
        let el = e.add_element(Box::new(BoxCollider::new()));
        el.as_any_mut()
            .downcast_mut::<BoxCollider>()
            .unwrap()
            .set_size(Vector3::new(2.0, 2.0, 2.0));
        let collider = e.get_element::<BoxCollider>().unwrap();
        assert_eq!(collider.size(), Vector3::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn element_names_default_to_class_name() {
        let t = Transform::new();
        assert_eq!(t.name(), "Transform");
        assert!(t.is_visible());
        assert!(t.id().is_valid());
    }
}
