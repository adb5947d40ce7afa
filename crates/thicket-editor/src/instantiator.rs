//! Projection of archetypes into a live scene.
//!
//! Live entities and elements keep their archetype's id, so selection and
//! property edits can be correlated back by id. Unknown element types and
//! unreadable property entries are skipped and counted, never fatal.

use std::ops::AddAssign;

use thicket_ecs::element::Element;
use thicket_ecs::scene::Scene;
use thicket_reflect::convert::document_to_value;
use thicket_reflect::registry::ByteMirror;

use crate::archetypes::{ElementArchetype, EntityArchetype};
use crate::RealmError;

/// Counts from one instantiation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstantiateReport {
    pub entities_created: usize,
    /// Archetypes whose entity could not be created (e.g. id already live).
    pub entities_skipped: usize,
    pub elements_attached: usize,
    /// Elements whose type is not a registered element kind.
    pub elements_skipped: usize,
    pub properties_applied: usize,
    /// Entries that did not parse as their property type, or read-only ones.
    pub properties_skipped: usize,
}

impl AddAssign for InstantiateReport {
    fn add_assign(&mut self, rhs: Self) {
        self.entities_created += rhs.entities_created;
        self.entities_skipped += rhs.entities_skipped;
        self.elements_attached += rhs.elements_attached;
        self.elements_skipped += rhs.elements_skipped;
        self.properties_applied += rhs.properties_applied;
        self.properties_skipped += rhs.properties_skipped;
    }
}

/// Builds live entities from archetypes through the reflection registry.
#[derive(Debug, Clone, Copy)]
pub struct ArchetypeInstantiator<'m> {
    mirror: &'m ByteMirror,
}

impl<'m> ArchetypeInstantiator<'m> {
    pub fn new(mirror: &'m ByteMirror) -> Self {
        Self { mirror }
    }

    /// Create one live entity with the archetype's id and name, and attach
    /// every element whose type is known.
    ///
    /// Parent links are not touched; see [`instantiate_realm`](Self::instantiate_realm).
    ///
    /// # Errors
    ///
    /// [`RealmError::Scene`] if the scene rejects the entity id.
    pub fn instantiate(&self, archetype: &EntityArchetype, scene: &mut Scene) -> Result<InstantiateReport, RealmError> {
        let mut report = InstantiateReport::default();
        let entity = scene.create_entity(archetype.id, &archetype.name)?;
        report.entities_created += 1;

        for element_archetype in &archetype.elements {
            let Some(mut element) = self.mirror.create_element_by_name(&element_archetype.type_name) else {
                tracing::warn!(
                    entity_id = %archetype.id,
                    element_id = %element_archetype.id,
                    type_name = %element_archetype.type_name,
                    "unknown element type, skipping"
                );
                report.elements_skipped += 1;
                continue;
            };
            element.set_id(element_archetype.id);
            self.apply_properties(element_archetype, element.as_mut(), &mut report);
            element.set_name(&element_archetype.name);
            element.initialize();
            entity.add_element(element);
            report.elements_attached += 1;
        }
        Ok(report)
    }

    /// Instantiate every archetype, then link live parents in a second pass
    /// so children may precede their parents in `archetypes`.
    pub fn instantiate_realm(&self, archetypes: &[EntityArchetype], scene: &mut Scene) -> InstantiateReport {
        let mut report = InstantiateReport::default();
        for archetype in archetypes {
            match self.instantiate(archetype, scene) {
                Ok(r) => report += r,
                Err(e) => {
                    tracing::warn!(entity_id = %archetype.id, error = %e, "entity not instantiated");
                    report.entities_skipped += 1;
                }
            }
        }

        // Live children follow `child_ids` order.
        for parent in archetypes {
            for &child_id in &parent.child_ids {
                if let Err(e) = scene.set_parent(child_id, parent.id) {
                    tracing::warn!(
                        entity_id = %child_id,
                        parent_id = %parent.id,
                        error = %e,
                        "live parent link skipped"
                    );
                }
            }
        }

        tracing::debug!(
            entities = report.entities_created,
            elements = report.elements_attached,
            skipped_elements = report.elements_skipped,
            "instantiated realm"
        );
        report
    }

    fn apply_properties(&self, source: &ElementArchetype, element: &mut dyn Element, report: &mut InstantiateReport) {
        for prop in self.mirror.get_all_properties(&source.type_name) {
            let Some(node) = source.data.get(prop.name()) else {
                continue;
            };
            if prop.is_read_only() {
                report.properties_skipped += 1;
                continue;
            }
            let applied = document_to_value(self.mirror, prop.property_type(), prop.contained_type(), node)
                .and_then(|value| prop.set(element, value));
            match applied {
                Ok(()) => report.properties_applied += 1,
                Err(e) => {
                    tracing::warn!(
                        element_id = %source.id,
                        property = prop.name(),
                        error = %e,
                        "stored value not applied"
                    );
                    report.properties_skipped += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use thicket_ecs::elements::{Sprite2D, Transform};
    use thicket_ecs::math::{Color, Vector3};

    #[test]
    fn stored_values_reach_the_live_element() {
        let mirror = ByteMirror::with_builtin_types();
        let mut entity = EntityArchetype::new("Hero");
        let mut t = ElementArchetype::new("Transform");
        t.data.insert("Position".to_owned(), json!({ "x": 1.0, "y": 2.0, "z": 3.0 }));
        let mut s = ElementArchetype::new("Sprite2D");
        s.name = "Body".to_owned();
        s.data.insert("Color".to_owned(), json!({ "r": 0.5, "g": 0.25, "b": 1.0, "a": 1.0 }));
        s.data.insert("Flip V".to_owned(), json!("not a bool"));
        let sprite_id = s.id;
        entity.elements.push(t);
        entity.elements.push(s);

        let mut scene = Scene::new("test");
        let report = ArchetypeInstantiator::new(&mirror).instantiate(&entity, &mut scene).unwrap();
        assert_eq!(report.elements_attached, 2);
        assert_eq!(report.properties_applied, 2);
        assert_eq!(report.properties_skipped, 1);

        let live = scene.get_entity_by_id(entity.id).unwrap();
        assert_eq!(live.name(), "Hero");
        assert_eq!(live.get_element::<Transform>().unwrap().position(), Vector3::new(1.0, 2.0, 3.0));
        let sprite = live.get_element::<Sprite2D>().unwrap();
        assert_eq!(sprite.color(), Color::new(0.5, 0.25, 1.0, 1.0));
        assert!(!sprite.flip_v());
        assert_eq!(sprite.id(), sprite_id);
        assert_eq!(sprite.name(), "Body");
    }

    #[test]
    fn unknown_type_creates_bare_entity() {
        let mirror = ByteMirror::with_builtin_types();
        let mut entity = EntityArchetype::new("Mystery");
        entity.elements.push(ElementArchetype::new("Teleporter"));

        let mut scene = Scene::new("test");
        let report = ArchetypeInstantiator::new(&mirror).instantiate(&entity, &mut scene).unwrap();
        assert_eq!(report.elements_skipped, 1);
        assert_eq!(report.elements_attached, 0);
        let live = scene.get_entity_by_id(entity.id).unwrap();
        assert_eq!(live.name(), "Mystery");
        assert_eq!(live.element_count(), 0);
    }

    #[test]
    fn realm_links_children_listed_before_parents() {
        let mirror = ByteMirror::with_builtin_types();
        let mut parent = EntityArchetype::new("Parent");
        let mut child = EntityArchetype::new("Child");
        child.parent_id = parent.id;
        parent.child_ids.push(child.id);

        let mut scene = Scene::new("test");
        let report = ArchetypeInstantiator::new(&mirror).instantiate_realm(&[child.clone(), parent.clone()], &mut scene);
        assert_eq!(report.entities_created, 2);
        assert_eq!(scene.get_entity_by_id(child.id).unwrap().parent_id(), parent.id);
        assert_eq!(scene.get_entity_by_id(parent.id).unwrap().child_ids(), [child.id]);

        let again = ArchetypeInstantiator::new(&mirror).instantiate_realm(&[parent], &mut scene);
        assert_eq!(again.entities_skipped, 1);
    }
}
