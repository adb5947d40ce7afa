//! Semantic property type tags and the tagged value union exchanged between
//! live elements, documents and UI collaborators.

use std::fmt;

use serde::{Deserialize, Serialize};
use thicket_ecs::math::{Color, Mat4, Point, Rect, Vector2, Vector3};

// ---------------------------------------------------------------------------
// PropertyType
// ---------------------------------------------------------------------------

/// The semantic type of a reflected property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    Int,
    UInt64,
    Float,
    Bool,
    String,
    Vector2,
    Vector3,
    Color,
    Point,
    Rect,
    /// Nested object described by a contained struct `TypeInfo`.
    Class,
    /// Same storage as `Class`.
    Struct,
    /// Integer-backed enum, stored in documents as its discriminant.
    Enum,
    /// Scoped enum, stored in documents by variant name.
    EnumClass,
    Mat4,
}

impl PropertyType {
    /// Every tag, in declaration order.
    pub const ALL: [PropertyType; 15] = [
        PropertyType::Int,
        PropertyType::UInt64,
        PropertyType::Float,
        PropertyType::Bool,
        PropertyType::String,
        PropertyType::Vector2,
        PropertyType::Vector3,
        PropertyType::Color,
        PropertyType::Point,
        PropertyType::Rect,
        PropertyType::Class,
        PropertyType::Struct,
        PropertyType::Enum,
        PropertyType::EnumClass,
        PropertyType::Mat4,
    ];

    /// Whether values of this type need a contained `TypeInfo` to interpret.
    pub fn is_compound(self) -> bool {
        matches!(
            self,
            PropertyType::Class | PropertyType::Struct | PropertyType::Enum | PropertyType::EnumClass
        )
    }

    pub fn is_enum(self) -> bool {
        matches!(self, PropertyType::Enum | PropertyType::EnumClass)
    }

    pub fn is_struct(self) -> bool {
        matches!(self, PropertyType::Class | PropertyType::Struct)
    }

    pub fn name(self) -> &'static str {
        match self {
            PropertyType::Int => "Int",
            PropertyType::UInt64 => "UInt64",
            PropertyType::Float => "Float",
            PropertyType::Bool => "Bool",
            PropertyType::String => "String",
            PropertyType::Vector2 => "Vector2",
            PropertyType::Vector3 => "Vector3",
            PropertyType::Color => "Color",
            PropertyType::Point => "Point",
            PropertyType::Rect => "Rect",
            PropertyType::Class => "Class",
            PropertyType::Struct => "Struct",
            PropertyType::Enum => "Enum",
            PropertyType::EnumClass => "EnumClass",
            PropertyType::Mat4 => "Mat4",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// PropertyValue
// ---------------------------------------------------------------------------

/// A property value of any supported shape.
///
/// `Enum` carries the discriminant for both `Enum` and `EnumClass`
/// properties; `Struct` carries ordered named fields for both `Class` and
/// `Struct` properties.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PropertyValue {
    Int(i32),
    UInt64(u64),
    Float(f32),
    Bool(bool),
    String(String),
    Vector2(Vector2),
    Vector3(Vector3),
    Color(Color),
    Point(Point),
    Rect(Rect),
    Mat4(Mat4),
    Enum(i32),
    Struct(Vec<(String, PropertyValue)>),
}

impl PropertyValue {
    /// Short name of the active variant, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            PropertyValue::Int(_) => "Int",
            PropertyValue::UInt64(_) => "UInt64",
            PropertyValue::Float(_) => "Float",
            PropertyValue::Bool(_) => "Bool",
            PropertyValue::String(_) => "String",
            PropertyValue::Vector2(_) => "Vector2",
            PropertyValue::Vector3(_) => "Vector3",
            PropertyValue::Color(_) => "Color",
            PropertyValue::Point(_) => "Point",
            PropertyValue::Rect(_) => "Rect",
            PropertyValue::Mat4(_) => "Mat4",
            PropertyValue::Enum(_) => "Enum",
            PropertyValue::Struct(_) => "Struct",
        }
    }

    /// Whether this value's variant is the storage shape for `ty`.
    pub fn matches(&self, ty: PropertyType) -> bool {
        matches!(
            (self, ty),
            (PropertyValue::Int(_), PropertyType::Int)
                | (PropertyValue::UInt64(_), PropertyType::UInt64)
                | (PropertyValue::Float(_), PropertyType::Float)
                | (PropertyValue::Bool(_), PropertyType::Bool)
                | (PropertyValue::String(_), PropertyType::String)
                | (PropertyValue::Vector2(_), PropertyType::Vector2)
                | (PropertyValue::Vector3(_), PropertyType::Vector3)
                | (PropertyValue::Color(_), PropertyType::Color)
                | (PropertyValue::Point(_), PropertyType::Point)
                | (PropertyValue::Rect(_), PropertyType::Rect)
                | (PropertyValue::Mat4(_), PropertyType::Mat4)
                | (PropertyValue::Enum(_), PropertyType::Enum | PropertyType::EnumClass)
                | (PropertyValue::Struct(_), PropertyType::Struct | PropertyType::Class)
        )
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            PropertyValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Look up a named field of a `Struct` value.
    pub fn field(&self, name: &str) -> Option<&PropertyValue> {
        match self {
            PropertyValue::Struct(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Int(v) => write!(f, "{v}"),
            PropertyValue::UInt64(v) => write!(f, "{v}"),
            PropertyValue::Float(v) => write!(f, "{v}"),
            PropertyValue::Bool(v) => write!(f, "{v}"),
            PropertyValue::String(v) => write!(f, "{v:?}"),
            PropertyValue::Vector2(v) => write!(f, "({}, {})", v.x, v.y),
            PropertyValue::Vector3(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            PropertyValue::Color(c) => write!(f, "rgba({}, {}, {}, {})", c.r, c.g, c.b, c.a),
            PropertyValue::Point(p) => write!(f, "({}, {})", p.x, p.y),
            PropertyValue::Rect(r) => write!(f, "[{}, {}, {}x{}]", r.x, r.y, r.w, r.h),
            PropertyValue::Mat4(m) => write!(f, "{:?}", m.to_cols_array_2d()),
            PropertyValue::Enum(v) => write!(f, "#{v}"),
            PropertyValue::Struct(fields) => {
                f.write_str("{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ReflectValue
// ---------------------------------------------------------------------------

/// Native Rust types that map one-to-one onto a simple [`PropertyType`].
///
/// Used by the typed registration helpers so accessor closures can be
/// written against concrete getter/setter signatures.
pub trait ReflectValue: Sized {
    const PROPERTY_TYPE: PropertyType;

    fn into_value(self) -> PropertyValue;

    fn from_value(value: PropertyValue) -> Option<Self>;
}

macro_rules! reflect_value {
    ($ty:ty, $variant:ident) => {
        impl ReflectValue for $ty {
            const PROPERTY_TYPE: PropertyType = PropertyType::$variant;

            fn into_value(self) -> PropertyValue {
                PropertyValue::$variant(self)
            }

            fn from_value(value: PropertyValue) -> Option<Self> {
                match value {
                    PropertyValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }

        impl From<$ty> for PropertyValue {
            fn from(v: $ty) -> Self {
                PropertyValue::$variant(v)
            }
        }
    };
}

reflect_value!(i32, Int);
reflect_value!(u64, UInt64);
reflect_value!(f32, Float);
reflect_value!(bool, Bool);
reflect_value!(String, String);
reflect_value!(Vector2, Vector2);
reflect_value!(Vector3, Vector3);
reflect_value!(Color, Color);
reflect_value!(Point, Point);
reflect_value!(Rect, Rect);
reflect_value!(Mat4, Mat4);

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
