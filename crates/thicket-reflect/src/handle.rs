//! Uniform read/write access to one property, whatever stores it.
//!
//! [`LivePropertyHandle`] goes through the property's accessor closures
//! against a live element. [`DocumentPropertyHandle`] reads and writes one
//! keyed entry of an element archetype's data document. Both borrow their
//! backing store and are meant to be dropped right after use.

use serde_json::{Map, Value};
use thicket_ecs::element::Element;

use crate::convert::{default_value, document_to_value, value_to_document};
use crate::registry::{ByteMirror, Property};
use crate::value::{PropertyType, PropertyValue};
use crate::ReflectError;

// ---------------------------------------------------------------------------
// PropertyHandle
// ---------------------------------------------------------------------------

/// Read/write contract shared by live and document handles.
pub trait PropertyHandle {
    fn property(&self) -> &Property;

    fn get_value(&self) -> Result<PropertyValue, ReflectError>;

    fn set_value(&mut self, value: PropertyValue) -> Result<(), ReflectError>;

    fn name(&self) -> &str {
        self.property().name()
    }

    fn property_type(&self) -> PropertyType {
        self.property().property_type()
    }

    fn contained_type(&self) -> Option<&str> {
        self.property().contained_type()
    }

    fn is_read_only(&self) -> bool {
        self.property().is_read_only()
    }
}

// ---------------------------------------------------------------------------
// LivePropertyHandle
// ---------------------------------------------------------------------------

/// A property bound to a live element.
pub struct LivePropertyHandle<'a> {
    property: &'a Property,
    element: &'a mut dyn Element,
}

impl<'a> LivePropertyHandle<'a> {
    /// Bind `property` to `element`.
    ///
    /// # Errors
    ///
    /// [`ReflectError::WrongElement`] unless the element's kind is the
    /// property's owner or derives from it.
    pub fn new(
        mirror: &ByteMirror,
        property: &'a Property,
        element: &'a mut dyn Element,
    ) -> Result<Self, ReflectError> {
        if !mirror.is_a(element.class_name(), property.owner()) {
            return Err(ReflectError::WrongElement {
                property: property.name().to_owned(),
                owner: property.owner().to_owned(),
                element_class: element.class_name().to_owned(),
            });
        }
        Ok(Self { property, element })
    }
}

impl PropertyHandle for LivePropertyHandle<'_> {
    fn property(&self) -> &Property {
        self.property
    }

    fn get_value(&self) -> Result<PropertyValue, ReflectError> {
        self.property.get(&*self.element)
    }

    fn set_value(&mut self, value: PropertyValue) -> Result<(), ReflectError> {
        self.property.set(&mut *self.element, value)
    }
}

/// Read every visible property of `element`, in reflection order.
pub fn read_live_values<'a>(
    mirror: &'a ByteMirror,
    element: &'a dyn Element,
) -> Vec<(&'a Property, Result<PropertyValue, ReflectError>)> {
    mirror
        .get_all_properties(element.class_name())
        .into_iter()
        .map(|p| (p, p.get(element)))
        .collect()
}

// ---------------------------------------------------------------------------
// DocumentPropertyHandle
// ---------------------------------------------------------------------------

enum DocumentSlot<'a> {
    /// The whole data document; the entry is looked up (and created) by name.
    Document(&'a mut Map<String, Value>),
    /// One existing entry, borrowed on its own so sibling entries can have
    /// handles at the same time.
    Entry(&'a mut Value),
}

/// A property bound to an element archetype's data document.
pub struct DocumentPropertyHandle<'a> {
    mirror: &'a ByteMirror,
    property: &'a Property,
    slot: DocumentSlot<'a>,
}

impl<'a> DocumentPropertyHandle<'a> {
    /// Address `property.name()` inside `data`. Missing keys read as the
    /// type default and are created on write.
    pub fn new(mirror: &'a ByteMirror, property: &'a Property, data: &'a mut Map<String, Value>) -> Self {
        Self {
            mirror,
            property,
            slot: DocumentSlot::Document(data),
        }
    }

    /// Bind directly to an entry that is already present.
    pub fn for_entry(mirror: &'a ByteMirror, property: &'a Property, entry: &'a mut Value) -> Self {
        Self {
            mirror,
            property,
            slot: DocumentSlot::Entry(entry),
        }
    }

    fn node(&self) -> Option<&Value> {
        match &self.slot {
            DocumentSlot::Document(map) => map.get(self.property.name()),
            DocumentSlot::Entry(v) => Some(&**v),
        }
    }

    /// The raw document node, if present.
    pub fn raw(&self) -> Option<&Value> {
        self.node()
    }
}

impl PropertyHandle for DocumentPropertyHandle<'_> {
    fn property(&self) -> &Property {
        self.property
    }

    fn get_value(&self) -> Result<PropertyValue, ReflectError> {
        let p = self.property;
        match self.node() {
            Some(node) => document_to_value(self.mirror, p.property_type(), p.contained_type(), node),
            None => default_value(self.mirror, p.property_type(), p.contained_type()),
        }
    }

    fn set_value(&mut self, value: PropertyValue) -> Result<(), ReflectError> {
        let p = self.property;
        if p.is_read_only() {
            return Err(ReflectError::ReadOnly {
                property: p.name().to_owned(),
            });
        }
        if !value.matches(p.property_type()) {
            return Err(ReflectError::TypeMismatch {
                property: p.name().to_owned(),
                expected: p.property_type(),
                found: value.kind_name(),
            });
        }
        let encoded = value_to_document(self.mirror, p.property_type(), p.contained_type(), &value)?;
        match &mut self.slot {
            DocumentSlot::Document(map) => {
                map.insert(p.name().to_owned(), encoded);
            }
            DocumentSlot::Entry(v) => **v = encoded,
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use thicket_ecs::prelude::*;

    #[test]
    fn live_handle_round_trips_through_setter() {
        let mirror = ByteMirror::with_builtin_types();
        let prop = mirror.find_property("Sprite2D", "Sorting Layer").unwrap();
        let mut sprite = Sprite2D::new();
        {
            let mut handle = LivePropertyHandle::new(&mirror, prop, &mut sprite).unwrap();
            handle.set_value(PropertyValue::Int(7)).unwrap();
            assert_eq!(handle.get_value().unwrap(), PropertyValue::Int(7));
        }
        assert_eq!(sprite.sorting_layer(), 7);
    }

    #[test]
    fn live_handle_rejects_foreign_element() {
        let mirror = ByteMirror::with_builtin_types();
        let prop = mirror.find_property("Sprite2D", "Flip H").unwrap();
        let mut transform = Transform::new();
        assert!(matches!(
            LivePropertyHandle::new(&mirror, prop, &mut transform),
            Err(ReflectError::WrongElement { .. })
        ));
    }

    #[test]
    fn base_properties_bind_to_any_element() {
        let mirror = ByteMirror::with_builtin_types();
        let prop = mirror.find_property("Camera", "name").unwrap();
        let mut cam = Camera::new();
        let mut handle = LivePropertyHandle::new(&mirror, prop, &mut cam).unwrap();
        handle.set_value("Main Camera".into()).unwrap();
        drop(handle);
        assert_eq!(cam.name(), "Main Camera");
    }

    #[test]
    fn document_handle_missing_key_reads_default_and_creates_on_write() {
        let mirror = ByteMirror::with_builtin_types();
        let prop = mirror.find_property("Transform", "Scale").unwrap();
        let mut data = Map::new();
        let mut handle = DocumentPropertyHandle::new(&mirror, prop, &mut data);
        assert_eq!(handle.get_value().unwrap(), PropertyValue::Vector3(Vector3::ZERO));
        assert!(handle.raw().is_none());

        handle
            .set_value(PropertyValue::Vector3(Vector3::new(2.0, 2.0, 2.0)))
            .unwrap();
        assert_eq!(data["Scale"], json!({ "x": 2.0, "y": 2.0, "z": 2.0 }));
    }

    #[test]
    fn document_handle_rejects_wrong_variant_and_read_only() {
        let mirror = ByteMirror::with_builtin_types();
        let mut data = Map::new();

        let prop = mirror.find_property("Transform", "Position").unwrap();
        let mut handle = DocumentPropertyHandle::new(&mirror, prop, &mut data);
        assert!(matches!(
            handle.set_value(PropertyValue::Bool(true)),
            Err(ReflectError::TypeMismatch { .. })
        ));

        let view = mirror.find_property("Camera", "View Matrix").unwrap();
        let mut handle = DocumentPropertyHandle::new(&mirror, view, &mut data);
        assert!(matches!(
            handle.set_value(PropertyValue::Mat4(Mat4::IDENTITY)),
            Err(ReflectError::ReadOnly { .. })
        ));
        assert!(data.is_empty());
    }

    #[test]
    fn entry_handles_can_coexist() {
        let mirror = ByteMirror::with_builtin_types();
        let mut data = Map::new();
        data.insert("Flip H".to_owned(), json!(false));
        data.insert("Flip V".to_owned(), json!(false));

        let mut handles: Vec<DocumentPropertyHandle<'_>> = data
            .iter_mut()
            .filter_map(|(key, entry)| {
                let prop = mirror.find_property("Sprite2D", key)?;
                Some(DocumentPropertyHandle::for_entry(&mirror, prop, entry))
            })
            .collect();
        for h in &mut handles {
            h.set_value(PropertyValue::Bool(true)).unwrap();
        }
        drop(handles);
        assert_eq!(data["Flip H"], json!(true));
        assert_eq!(data["Flip V"], json!(true));
    }

    #[test]
    fn enum_class_through_document() {
        let mirror = ByteMirror::with_builtin_types();
        let prop = mirror.find_property("Camera", "Projection Mode").unwrap();
        let mut data = Map::new();
        let mut handle = DocumentPropertyHandle::new(&mirror, prop, &mut data);
        handle.set_value(PropertyValue::Enum(1)).unwrap();
        assert_eq!(handle.get_value().unwrap(), PropertyValue::Enum(1));
        drop(handle);
        assert_eq!(data["Projection Mode"], json!("Orthographic"));
    }

    #[test]
    fn infinite_far_clip_reads_back() {
        let mirror = ByteMirror::with_builtin_types();
        let prop = mirror.find_property("Camera", "Far Clip").unwrap();
        let mut data = Map::new();
        let mut handle = DocumentPropertyHandle::new(&mirror, prop, &mut data);
        handle.set_value(PropertyValue::Float(f32::INFINITY)).unwrap();
        assert_eq!(handle.get_value().unwrap(), PropertyValue::Float(f32::INFINITY));
        drop(handle);
        assert_eq!(data["Far Clip"], json!("inf"));
    }

    #[test]
    fn read_live_values_lists_every_property() {
        let mirror = ByteMirror::with_builtin_types();
        let t = Transform::new();
        let names: Vec<_> = read_live_values(&mirror, &t).iter().map(|(p, _)| p.name()).collect();
        assert_eq!(names, ["name", "visible", "Position", "Rotation", "Scale"]);
    }
}
