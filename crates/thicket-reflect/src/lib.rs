//! Thicket Reflect - property metadata and uniform property access.
//!
//! This crate describes each element kind's editable properties and moves
//! values between live elements and schema-less data documents.
//!
//! # Modules
//!
//! - [`registry`]: the [`ByteMirror`](registry::ByteMirror) registry of
//!   [`TypeInfo`](registry::TypeInfo) records, typed registration helpers,
//!   enum tables and the element constructor table.
//! - [`value`]: the [`PropertyType`](value::PropertyType) tags and the
//!   [`PropertyValue`](value::PropertyValue) tagged union.
//! - [`convert`]: value <-> `serde_json::Value` encoding.
//! - [`handle`]: the [`PropertyHandle`](handle::PropertyHandle) contract with
//!   live and document implementations.
//!
//! # Example
//!
//! ```
//! use serde_json::Map;
//! use thicket_reflect::prelude::*;
//!
//! let mirror = ByteMirror::with_builtin_types();
//! let prop = mirror.find_property("Transform", "Position").unwrap();
//!
//! let mut data = Map::new();
//! let mut handle = DocumentPropertyHandle::new(&mirror, prop, &mut data);
//! handle.set_value(PropertyValue::Vector3(Vector3::new(1.0, 2.0, 3.0))).unwrap();
//! assert_eq!(
//!     handle.get_value().unwrap(),
//!     PropertyValue::Vector3(Vector3::new(1.0, 2.0, 3.0))
//! );
//! ```

#![deny(unsafe_code)]

mod builtin;
pub mod convert;
pub mod handle;
pub mod registry;
pub mod value;

use value::PropertyType;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by reflection lookups, conversions and handles.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReflectError {
    /// No type of this name is registered (or it is the wrong kind).
    #[error("type '{name}' is not registered")]
    UnknownType { name: String },

    /// The type has no visible property of this name.
    #[error("type '{type_name}' has no property '{property}'")]
    UnknownProperty { type_name: String, property: String },

    /// A value's variant is not the storage shape of the property.
    #[error("property '{property}' expects {expected}, got {found}")]
    TypeMismatch {
        property: String,
        expected: PropertyType,
        found: &'static str,
    },

    /// A document node does not have the shape of the declared type.
    #[error("document value does not fit {expected}: found {found}")]
    ShapeMismatch { expected: PropertyType, found: String },

    /// The property has no setter.
    #[error("property '{property}' is read-only")]
    ReadOnly { property: String },

    /// The property is a struct field descriptor without accessors.
    #[error("property '{property}' has no accessors")]
    NotAccessible { property: String },

    /// A property was used on an element that is not its owner kind.
    #[error("property '{property}' of '{owner}' cannot be used on a '{element_class}'")]
    WrongElement {
        property: String,
        owner: String,
        element_class: String,
    },

    /// The enum table has no such value or variant name.
    #[error("'{value}' is not a variant of enum '{enum_type}'")]
    UnknownEnumValue { enum_type: String, value: String },

    /// A compound value was converted without naming its contained type.
    #[error("{property_type} value needs a contained type")]
    MissingContainedType { property_type: PropertyType },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::convert::{default_value, document_to_value, value_to_document};
    pub use crate::handle::{read_live_values, DocumentPropertyHandle, LivePropertyHandle, PropertyHandle};
    pub use crate::registry::{ByteMirror, Getter, Property, Setter, TypeBuilder, TypeInfo, TypeKind, UiHint};
    pub use crate::value::{PropertyType, PropertyValue, ReflectValue};
    pub use crate::ReflectError;
    pub use thicket_ecs::math::{Color, Mat4, Point, Rect, Vector2, Vector3};
}
