//! Document-backed property handles for every stored property of an entity.

use thicket_ecs::guid::SimpleGuid;
use thicket_reflect::handle::DocumentPropertyHandle;
use thicket_reflect::registry::ByteMirror;

use crate::archetypes::{ElementArchetype, EntityArchetype};

/// One handle plus the element it addresses.
pub struct ElementPropertyHandle<'a> {
    pub element_id: SimpleGuid,
    pub element_type_name: &'a str,
    pub handle: DocumentPropertyHandle<'a>,
}

/// Produces document handles for the properties an archetype actually stores.
#[derive(Debug, Clone, Copy)]
pub struct PropertyHandleFactory<'m> {
    mirror: &'m ByteMirror,
}

impl<'m> PropertyHandleFactory<'m> {
    pub fn new(mirror: &'m ByteMirror) -> Self {
        Self { mirror }
    }

    /// Handles for one element: one per data key that names a reflected
    /// property of its type, in document order. An unregistered element type
    /// yields nothing.
    pub fn get_property_handles_for_element<'a>(
        &self,
        element: &'a mut ElementArchetype,
    ) -> Vec<DocumentPropertyHandle<'a>>
    where
        'm: 'a,
    {
        let mirror: &'a ByteMirror = self.mirror;
        if mirror.get_type_info_by_name(&element.type_name).is_none() {
            return Vec::new();
        }
        let type_name = element.type_name.as_str();
        element
            .data
            .iter_mut()
            .filter_map(|(key, entry)| {
                let prop = mirror.find_property(type_name, key)?;
                Some(DocumentPropertyHandle::for_entry(mirror, prop, entry))
            })
            .collect()
    }

    /// Handles for every element of `entity`, elements in order.
    pub fn get_property_handles_for_entity<'a>(
        &self,
        entity: &'a mut EntityArchetype,
    ) -> Vec<ElementPropertyHandle<'a>>
    where
        'm: 'a,
    {
        let mut out = Vec::new();
        for element in entity.elements.iter_mut() {
            let element_id = element.id;
            let ElementArchetype { type_name, data, .. } = element;
            let type_name: &'a str = type_name.as_str();
            if self.mirror.get_type_info_by_name(type_name).is_none() {
                tracing::debug!(element_id = %element_id, type_name, "no reflection data, skipping element");
                continue;
            }
            let mirror: &'a ByteMirror = self.mirror;
            for (key, entry) in data.iter_mut() {
                if let Some(prop) = mirror.find_property(type_name, key) {
                    out.push(ElementPropertyHandle {
                        element_id,
                        element_type_name: type_name,
                        handle: DocumentPropertyHandle::for_entry(mirror, prop, entry),
                    });
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use thicket_reflect::handle::PropertyHandle;
    use thicket_reflect::value::PropertyValue;

    #[test]
    fn only_stored_reflected_keys_get_handles() {
        let mirror = ByteMirror::with_builtin_types();
        let mut entity = EntityArchetype::new("Hero");
        let mut sprite = ElementArchetype::new("Sprite2D");
        sprite.data.insert("Flip H".to_owned(), json!(false));
        sprite.data.insert("Not A Property".to_owned(), json!(1));
        sprite.data.insert("Sorting Layer".to_owned(), json!(2));
        let mut ghost = ElementArchetype::new("Ghost");
        ghost.data.insert("Flip H".to_owned(), json!(false));
        entity.elements.push(sprite);
        entity.elements.push(ghost);

        let factory = PropertyHandleFactory::new(&mirror);
        let mut handles = factory.get_property_handles_for_entity(&mut entity);
        let names: Vec<_> = handles.iter().map(|h| h.handle.name().to_owned()).collect();
        assert_eq!(names, ["Flip H", "Sorting Layer"]);
        assert!(handles.iter().all(|h| h.element_type_name == "Sprite2D"));

        handles[1].handle.set_value(PropertyValue::Int(5)).unwrap();
        drop(handles);
        assert_eq!(entity.elements[0].data["Sorting Layer"], json!(5));
    }

    #[test]
    fn element_handles_read_values() {
        let mirror = ByteMirror::with_builtin_types();
        let mut el = ElementArchetype::new("CppScript");
        el.data.insert("Script Name".to_owned(), json!("Player.cpp"));
        let factory = PropertyHandleFactory::new(&mirror);
        let handles = factory.get_property_handles_for_element(&mut el);
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].get_value().unwrap(), PropertyValue::String("Player.cpp".to_owned()));
    }
}
