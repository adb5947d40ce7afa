//! The live component capability set.
//!
//! Every live component ("element") attached to an [`Entity`](crate::entity::Entity)
//! implements [`Element`]. The trait is intentionally small: identity, display
//! name, visibility, lifecycle hooks and `Any` access so the reflection layer
//! can downcast to the concrete type inside its accessor closures.
//!
//! Concrete kinds are constructed by name through the reflection registry's
//! constructor table, never through virtual constructors.

use std::any::Any;
use std::fmt;

use crate::guid::SimpleGuid;

// ---------------------------------------------------------------------------
// ElementBase
// ---------------------------------------------------------------------------

/// Fields every element carries regardless of its kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementBase {
    pub id: SimpleGuid,
    pub name: String,
    pub visible: bool,
}

impl ElementBase {
    /// A fresh base with a generated id, named after the element kind.
    pub fn new(name: &str) -> Self {
        Self {
            id: SimpleGuid::generate(),
            name: name.to_owned(),
            visible: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Element
// ---------------------------------------------------------------------------

/// A live component attached to an entity.
///
/// Implementors only provide [`base`](Element::base), [`base_mut`](Element::base_mut),
/// [`class_name`](Element::class_name) and the two `Any` accessors; everything
/// else has a default.
pub trait Element: Any + Send + Sync + fmt::Debug {
    /// The reflected type name (e.g. `"Transform"`).
    fn class_name(&self) -> &'static str;

    fn base(&self) -> &ElementBase;
    fn base_mut(&mut self) -> &mut ElementBase;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn id(&self) -> SimpleGuid {
        self.base().id
    }

    fn set_id(&mut self, id: SimpleGuid) {
        self.base_mut().id = id;
    }

    fn name(&self) -> &str {
        &self.base().name
    }

    fn set_name(&mut self, name: &str) {
        self.base_mut().name = name.to_owned();
    }

    fn is_visible(&self) -> bool {
        self.base().visible
    }

    fn set_visible(&mut self, visible: bool) {
        self.base_mut().visible = visible;
    }

    /// Called once after the element's properties have been applied.
    fn initialize(&mut self) {}

    /// Per-frame update.
    fn update(&mut self, _delta_time: f32) {}

    /// Called before the element is dropped by its owning entity.
    fn shutdown(&mut self) {}
}

impl dyn Element {
    /// Downcast to a concrete element kind.
    pub fn downcast_ref<T: Element>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutable downcast to a concrete element kind.
    pub fn downcast_mut<T: Element>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Implements the boilerplate half of [`Element`] for a struct with a
/// `base: ElementBase` field.
#[macro_export]
macro_rules! impl_element_boilerplate {
    ($class:literal) => {
        fn class_name(&self) -> &'static str {
            $class
        }

        fn base(&self) -> &$crate::element::ElementBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut $crate::element::ElementBase {
            &mut self.base
        }

        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
            self
        }
    };
}
