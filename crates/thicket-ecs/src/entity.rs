//! Live entities.
//!
//! An [`Entity`] owns an ordered list of boxed [`Element`]s. Parent/child
//! links are stored as ids; the owning [`Scene`](crate::scene::Scene) keeps
//! them consistent.

use crate::element::Element;
use crate::guid::SimpleGuid;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Entity {
    id: SimpleGuid,
    name: String,
    visible: bool,
    pub(crate) parent_id: SimpleGuid,
    pub(crate) child_ids: Vec<SimpleGuid>,
    elements: Vec<Box<dyn Element>>,
}

impl Entity {
    /// A bare entity with no elements.
    pub fn new(id: SimpleGuid, name: &str) -> Self {
        Self {
            id,
            name: name.to_owned(),
            visible: true,
            parent_id: SimpleGuid::INVALID,
            child_ids: Vec::new(),
            elements: Vec::new(),
        }
    }

    pub fn id(&self) -> SimpleGuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_owned();
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn parent_id(&self) -> SimpleGuid {
        self.parent_id
    }

    pub fn child_ids(&self) -> &[SimpleGuid] {
        &self.child_ids
    }

    /// Attach an element and return a mutable reference to it.
    pub fn add_element(&mut self, element: Box<dyn Element>) -> &mut dyn Element {
        self.elements.push(element);
        let last = self.elements.len() - 1;
        &mut *self.elements[last]
    }

    /// Detach an element by id, running its shutdown hook.
    pub fn remove_element(&mut self, element_id: SimpleGuid) -> Option<Box<dyn Element>> {
        let pos = self.elements.iter().position(|e| e.id() == element_id)?;
        let mut element = self.elements.remove(pos);
        element.shutdown();
        Some(element)
    }

    pub fn elements(&self) -> &[Box<dyn Element>] {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut [Box<dyn Element>] {
        &mut self.elements
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn get_element_by_id(&self, element_id: SimpleGuid) -> Option<&dyn Element> {
        self.elements
            .iter()
            .find(|e| e.id() == element_id)
            .map(|e| &**e)
    }

    pub fn get_element_by_id_mut(&mut self, element_id: SimpleGuid) -> Option<&mut dyn Element> {
        self.elements
            .iter_mut()
            .find(|e| e.id() == element_id)
            .map(|e| &mut **e)
    }

    /// First element whose class name matches.
    pub fn get_element_by_type_name(&self, class_name: &str) -> Option<&dyn Element> {
        self.elements
            .iter()
            .find(|e| e.class_name() == class_name)
            .map(|e| &**e)
    }

    /// First element of concrete type `T`.
    pub fn get_element<T: Element>(&self) -> Option<&T> {
        self.elements.iter().find_map(|e| e.as_any().downcast_ref::<T>())
    }

    pub fn get_element_mut<T: Element>(&mut self) -> Option<&mut T> {
        self.elements
            .iter_mut()
            .find_map(|e| e.as_any_mut().downcast_mut::<T>())
    }

    pub(crate) fn update(&mut self, delta_time: f32) {
        for element in &mut self.elements {
            element.update(delta_time);
        }
    }

    pub(crate) fn shutdown(&mut self) {
        for element in &mut self.elements {
            element.shutdown();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Sprite2D, Transform};

    #[test]
    fn new_entity_is_bare_root() {
        let id = SimpleGuid::generate();
        let e = Entity::new(id, "Player");
        assert_eq!(e.id(), id);
        assert_eq!(e.name(), "Player");
        assert!(e.parent_id().is_invalid());
        assert_eq!(e.element_count(), 0);
    }

    #[test]
    fn element_lookup_by_id_type_and_kind() {
        let mut e = Entity::new(SimpleGuid::generate(), "E");
        let t_id = e.add_element(Box::new(Transform::new())).id();
        e.add_element(Box::new(Sprite2D::new()));

        assert_eq!(e.get_element_by_id(t_id).unwrap().class_name(), "Transform");
        assert!(e.get_element_by_type_name("Sprite2D").is_some());
        assert!(e.get_element_by_type_name("Camera").is_none());
        assert!(e.get_element::<Sprite2D>().is_some());

        e.get_element_mut::<Sprite2D>().unwrap().set_flip_h(true);
        assert!(e.get_element::<Sprite2D>().unwrap().flip_h());
    }

    #[test]
    fn remove_element_by_id() {
        let mut e = Entity::new(SimpleGuid::generate(), "E");
        let id = e.add_element(Box::new(Transform::new())).id();
        assert!(e.remove_element(id).is_some());
        assert!(e.remove_element(id).is_none());
        assert_eq!(e.element_count(), 0);
    }
}
