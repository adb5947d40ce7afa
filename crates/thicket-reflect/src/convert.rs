//! Conversion between [`PropertyValue`] and `serde_json::Value` documents.
//!
//! Shapes:
//!
//! | type                     | document                                 |
//! |--------------------------|------------------------------------------|
//! | Int / UInt64 / Float     | number                                   |
//! | Bool / String            | bool / string                            |
//! | Vector2 / Vector3        | `{"x", "y"[, "z"]}`                      |
//! | Color                    | `{"r", "g", "b", "a"}`                   |
//! | Point / Rect             | `{"x", "y"}` / `{"x", "y", "w", "h"}`    |
//! | Mat4                     | four column arrays of four numbers       |
//! | Enum                     | integer discriminant                     |
//! | EnumClass                | variant name                             |
//! | Class / Struct           | nested object keyed by field name        |
//!
//! Floats are written as the exact `f64` widening of the `f32`, so a value
//! read back narrows to the identical bits. Infinities and NaN are written as
//! the strings `"inf"`, `"-inf"` and `"nan"`.

use serde_json::{Map, Value};
use thicket_ecs::math::{Color, Mat4, Point, Rect, Vector2, Vector3};

use crate::registry::{ByteMirror, TypeInfo, TypeKind};
use crate::value::{PropertyType, PropertyValue};
use crate::ReflectError;

fn describe(doc: &Value) -> String {
    match doc {
        Value::Null => "null".to_owned(),
        Value::Bool(_) => "bool".to_owned(),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string {s:?}"),
        Value::Array(a) => format!("array of {}", a.len()),
        Value::Object(o) => format!("object with {} keys", o.len()),
    }
}

fn mismatch(expected: PropertyType, doc: &Value) -> ReflectError {
    ReflectError::ShapeMismatch {
        expected,
        found: describe(doc),
    }
}

const POS_INF: &str = "inf";
const NEG_INF: &str = "-inf";
const NAN: &str = "nan";

/// JSON numbers cannot hold non-finite values, so those are spelled out.
fn float(f: f32) -> Value {
    if f.is_finite() {
        Value::from(f64::from(f))
    } else if f.is_nan() {
        Value::String(NAN.to_owned())
    } else if f > 0.0 {
        Value::String(POS_INF.to_owned())
    } else {
        Value::String(NEG_INF.to_owned())
    }
}

fn read_f32(expected: PropertyType, doc: &Value) -> Result<f32, ReflectError> {
    match doc {
        Value::String(s) => match s.as_str() {
            POS_INF => Ok(f32::INFINITY),
            NEG_INF => Ok(f32::NEG_INFINITY),
            NAN => Ok(f32::NAN),
            _ => Err(mismatch(expected, doc)),
        },
        _ => doc.as_f64().map(|v| v as f32).ok_or_else(|| mismatch(expected, doc)),
    }
}

fn read_i32(expected: PropertyType, doc: &Value) -> Result<i32, ReflectError> {
    doc.as_i64()
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| mismatch(expected, doc))
}

/// Fetch `keys` from an object that has exactly those keys.
fn fields<'d>(expected: PropertyType, doc: &'d Value, keys: &[&str]) -> Result<Vec<&'d Value>, ReflectError> {
    let obj = doc.as_object().ok_or_else(|| mismatch(expected, doc))?;
    if obj.len() != keys.len() {
        return Err(mismatch(expected, doc));
    }
    keys.iter()
        .map(|k| obj.get(*k).ok_or_else(|| mismatch(expected, doc)))
        .collect()
}

fn floats<const N: usize>(expected: PropertyType, doc: &Value, keys: [&str; N]) -> Result<[f32; N], ReflectError> {
    let vals = fields(expected, doc, &keys)?;
    let mut out = [0.0; N];
    for (slot, v) in out.iter_mut().zip(vals) {
        *slot = read_f32(expected, v)?;
    }
    Ok(out)
}

fn ints<const N: usize>(expected: PropertyType, doc: &Value, keys: [&str; N]) -> Result<[i32; N], ReflectError> {
    let vals = fields(expected, doc, &keys)?;
    let mut out = [0; N];
    for (slot, v) in out.iter_mut().zip(vals) {
        *slot = read_i32(expected, v)?;
    }
    Ok(out)
}

fn contained<'m>(
    mirror: &'m ByteMirror,
    ty: PropertyType,
    contained: Option<&str>,
) -> Result<&'m TypeInfo, ReflectError> {
    let name = contained.ok_or(ReflectError::MissingContainedType { property_type: ty })?;
    let info = mirror
        .get_type_info_by_name(name)
        .ok_or_else(|| ReflectError::UnknownType { name: name.to_owned() })?;
    let expected = if ty.is_enum() { TypeKind::Enum } else { TypeKind::Struct };
    if info.kind() != expected {
        return Err(ReflectError::UnknownType { name: name.to_owned() });
    }
    Ok(info)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Encode a value as a document node.
///
/// # Errors
///
/// [`ReflectError::TypeMismatch`] if `value` is not the storage shape of
/// `ty`; [`ReflectError::UnknownEnumValue`] for a discriminant missing from
/// the enum table; struct errors from the contained type.
pub fn value_to_document(
    mirror: &ByteMirror,
    ty: PropertyType,
    contained_type: Option<&str>,
    value: &PropertyValue,
) -> Result<Value, ReflectError> {
    if !value.matches(ty) {
        return Err(ReflectError::TypeMismatch {
            property: ty.name().to_owned(),
            expected: ty,
            found: value.kind_name(),
        });
    }
    let doc = match value {
        PropertyValue::Int(v) => Value::from(*v),
        PropertyValue::UInt64(v) => Value::from(*v),
        PropertyValue::Float(v) => float(*v),
        PropertyValue::Bool(v) => Value::Bool(*v),
        PropertyValue::String(v) => Value::String(v.clone()),
        PropertyValue::Vector2(v) => serde_json::json!({ "x": float(v.x), "y": float(v.y) }),
        PropertyValue::Vector3(v) => {
            serde_json::json!({ "x": float(v.x), "y": float(v.y), "z": float(v.z) })
        }
        PropertyValue::Color(c) => serde_json::json!({
            "r": float(c.r), "g": float(c.g), "b": float(c.b), "a": float(c.a)
        }),
        PropertyValue::Point(p) => serde_json::json!({ "x": p.x, "y": p.y }),
        PropertyValue::Rect(r) => serde_json::json!({ "x": r.x, "y": r.y, "w": r.w, "h": r.h }),
        PropertyValue::Mat4(m) => Value::Array(
            m.to_cols_array_2d()
                .iter()
                .map(|col| Value::Array(col.iter().map(|f| float(*f)).collect()))
                .collect(),
        ),
        PropertyValue::Enum(v) => {
            let info = contained(mirror, ty, contained_type)?;
            let name = mirror
                .enum_name_of(info.name(), *v)
                .ok_or_else(|| ReflectError::UnknownEnumValue {
                    enum_type: info.name().to_owned(),
                    value: v.to_string(),
                })?;
            if ty == PropertyType::EnumClass {
                Value::String(name.to_owned())
            } else {
                Value::from(*v)
            }
        }
        PropertyValue::Struct(values) => {
            let info = contained(mirror, ty, contained_type)?;
            let layout = mirror.get_all_properties_for_type(info);
            let mut obj = Map::new();
            for (name, field_value) in values {
                let field = layout.iter().find(|p| p.name() == name).ok_or_else(|| {
                    ReflectError::UnknownProperty {
                        type_name: info.name().to_owned(),
                        property: name.clone(),
                    }
                })?;
                let encoded =
                    value_to_document(mirror, field.property_type(), field.contained_type(), field_value)?;
                obj.insert(name.clone(), encoded);
            }
            Value::Object(obj)
        }
    };
    Ok(doc)
}

/// Decode a document node as a value of type `ty`.
///
/// # Errors
///
/// [`ReflectError::ShapeMismatch`] if the node does not have the shape of
/// `ty`.
pub fn document_to_value(
    mirror: &ByteMirror,
    ty: PropertyType,
    contained_type: Option<&str>,
    doc: &Value,
) -> Result<PropertyValue, ReflectError> {
    let value = match ty {
        PropertyType::Int => PropertyValue::Int(read_i32(ty, doc)?),
        PropertyType::UInt64 => PropertyValue::UInt64(doc.as_u64().ok_or_else(|| mismatch(ty, doc))?),
        PropertyType::Float => PropertyValue::Float(read_f32(ty, doc)?),
        PropertyType::Bool => PropertyValue::Bool(doc.as_bool().ok_or_else(|| mismatch(ty, doc))?),
        PropertyType::String => {
            PropertyValue::String(doc.as_str().ok_or_else(|| mismatch(ty, doc))?.to_owned())
        }
        PropertyType::Vector2 => {
            let [x, y] = floats(ty, doc, ["x", "y"])?;
            PropertyValue::Vector2(Vector2::new(x, y))
        }
        PropertyType::Vector3 => {
            let [x, y, z] = floats(ty, doc, ["x", "y", "z"])?;
            PropertyValue::Vector3(Vector3::new(x, y, z))
        }
        PropertyType::Color => {
            let [r, g, b, a] = floats(ty, doc, ["r", "g", "b", "a"])?;
            PropertyValue::Color(Color::new(r, g, b, a))
        }
        PropertyType::Point => {
            let [x, y] = ints(ty, doc, ["x", "y"])?;
            PropertyValue::Point(Point::new(x, y))
        }
        PropertyType::Rect => {
            let [x, y, w, h] = ints(ty, doc, ["x", "y", "w", "h"])?;
            PropertyValue::Rect(Rect::new(x, y, w, h))
        }
        PropertyType::Mat4 => {
            let cols = doc.as_array().filter(|c| c.len() == 4).ok_or_else(|| mismatch(ty, doc))?;
            let mut out = [[0.0f32; 4]; 4];
            for (col_out, col) in out.iter_mut().zip(cols) {
                let col = col.as_array().filter(|c| c.len() == 4).ok_or_else(|| mismatch(ty, doc))?;
                for (slot, v) in col_out.iter_mut().zip(col) {
                    *slot = read_f32(ty, v)?;
                }
            }
            PropertyValue::Mat4(Mat4::from_cols_array_2d(&out))
        }
        PropertyType::Enum => {
            let info = contained(mirror, ty, contained_type)?;
            let v = read_i32(ty, doc)?;
            if mirror.enum_name_of(info.name(), v).is_none() {
                return Err(ReflectError::UnknownEnumValue {
                    enum_type: info.name().to_owned(),
                    value: v.to_string(),
                });
            }
            PropertyValue::Enum(v)
        }
        PropertyType::EnumClass => {
            let info = contained(mirror, ty, contained_type)?;
            let name = doc.as_str().ok_or_else(|| mismatch(ty, doc))?;
            let v = mirror
                .enum_value_of(info.name(), name)
                .ok_or_else(|| ReflectError::UnknownEnumValue {
                    enum_type: info.name().to_owned(),
                    value: name.to_owned(),
                })?;
            PropertyValue::Enum(v)
        }
        PropertyType::Class | PropertyType::Struct => {
            let info = contained(mirror, ty, contained_type)?;
            let obj = doc.as_object().ok_or_else(|| mismatch(ty, doc))?;
            let mut values = Vec::new();
            for field in mirror.get_all_properties_for_type(info) {
                let v = match obj.get(field.name()) {
                    Some(node) => document_to_value(mirror, field.property_type(), field.contained_type(), node)?,
                    None => default_value(mirror, field.property_type(), field.contained_type())?,
                };
                values.push((field.name().to_owned(), v));
            }
            PropertyValue::Struct(values)
        }
    };
    Ok(value)
}

/// The value a missing document key stands for.
///
/// Enums default to their first declared variant; structs to a struct of
/// defaulted fields.
pub fn default_value(
    mirror: &ByteMirror,
    ty: PropertyType,
    contained_type: Option<&str>,
) -> Result<PropertyValue, ReflectError> {
    let value = match ty {
        PropertyType::Int => PropertyValue::Int(0),
        PropertyType::UInt64 => PropertyValue::UInt64(0),
        PropertyType::Float => PropertyValue::Float(0.0),
        PropertyType::Bool => PropertyValue::Bool(false),
        PropertyType::String => PropertyValue::String(String::new()),
        PropertyType::Vector2 => PropertyValue::Vector2(Vector2::default()),
        PropertyType::Vector3 => PropertyValue::Vector3(Vector3::default()),
        PropertyType::Color => PropertyValue::Color(Color::default()),
        PropertyType::Point => PropertyValue::Point(Point::default()),
        PropertyType::Rect => PropertyValue::Rect(Rect::default()),
        PropertyType::Mat4 => PropertyValue::Mat4(Mat4::IDENTITY),
        PropertyType::Enum | PropertyType::EnumClass => {
            let info = contained(mirror, ty, contained_type)?;
            let first = info.variants().first().map(|(v, _)| *v).unwrap_or(0);
            PropertyValue::Enum(first)
        }
        PropertyType::Class | PropertyType::Struct => {
            let info = contained(mirror, ty, contained_type)?;
            let mut values = Vec::new();
            for field in mirror.get_all_properties_for_type(info) {
                values.push((
                    field.name().to_owned(),
                    default_value(mirror, field.property_type(), field.contained_type())?,
                ));
            }
            PropertyValue::Struct(values)
        }
    };
    Ok(value)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mirror() -> ByteMirror {
        let mut mirror = ByteMirror::new();
        mirror.register_enum("Mode", &[(0, "Off"), (4, "On")]);
        mirror.register_struct("Range", |s| {
            s.field("min", PropertyType::Float).field("max", PropertyType::Float);
        });
        mirror
    }

    #[test]
    fn vector3_document_shape() {
        let m = mirror();
        let doc = value_to_document(
            &m,
            PropertyType::Vector3,
            None,
            &PropertyValue::Vector3(Vector3::new(1.0, 2.5, -3.0)),
        )
        .unwrap();
        assert_eq!(doc, json!({ "x": 1.0, "y": 2.5, "z": -3.0 }));
    }

    #[test]
    fn floats_survive_bit_exact() {
        let m = mirror();
        let f = 0.1f32;
        let doc = value_to_document(&m, PropertyType::Float, None, &PropertyValue::Float(f)).unwrap();
        let text = serde_json::to_string(&doc).unwrap();
        let reparsed: Value = serde_json::from_str(&text).unwrap();
        let back = document_to_value(&m, PropertyType::Float, None, &reparsed).unwrap();
        assert_eq!(back.as_float().unwrap().to_bits(), f.to_bits());
    }

    #[test]
    fn enum_class_stored_by_name_enum_by_value() {
        let m = mirror();
        let named = value_to_document(&m, PropertyType::EnumClass, Some("Mode"), &PropertyValue::Enum(4)).unwrap();
        assert_eq!(named, json!("On"));
        let plain = value_to_document(&m, PropertyType::Enum, Some("Mode"), &PropertyValue::Enum(4)).unwrap();
        assert_eq!(plain, json!(4));
        assert_eq!(
            document_to_value(&m, PropertyType::EnumClass, Some("Mode"), &json!("Off")).unwrap(),
            PropertyValue::Enum(0)
        );
        assert!(matches!(
            document_to_value(&m, PropertyType::Enum, Some("Mode"), &json!(3)),
            Err(ReflectError::UnknownEnumValue { .. })
        ));
    }

    #[test]
    fn enum_writes_outside_the_table_are_refused() {
        let m = mirror();
        for ty in [PropertyType::Enum, PropertyType::EnumClass] {
            assert!(matches!(
                value_to_document(&m, ty, Some("Mode"), &PropertyValue::Enum(3)),
                Err(ReflectError::UnknownEnumValue { .. })
            ));
        }
    }

    #[test]
    fn non_finite_floats_survive_json_text() {
        let m = mirror();
        for f in [f32::INFINITY, f32::NEG_INFINITY] {
            let doc = value_to_document(&m, PropertyType::Float, None, &PropertyValue::Float(f)).unwrap();
            let reparsed: Value = serde_json::from_str(&serde_json::to_string(&doc).unwrap()).unwrap();
            assert_eq!(
                document_to_value(&m, PropertyType::Float, None, &reparsed).unwrap(),
                PropertyValue::Float(f)
            );
        }

        let v = PropertyValue::Vector3(Vector3::new(f32::NAN, f32::INFINITY, 1.5));
        let doc = value_to_document(&m, PropertyType::Vector3, None, &v).unwrap();
        assert_eq!(doc, json!({ "x": "nan", "y": "inf", "z": 1.5 }));
        let PropertyValue::Vector3(back) = document_to_value(&m, PropertyType::Vector3, None, &doc).unwrap() else {
            panic!("expected a Vector3");
        };
        assert!(back.x.is_nan());
        assert_eq!((back.y, back.z), (f32::INFINITY, 1.5));

        assert!(matches!(
            document_to_value(&m, PropertyType::Float, None, &json!("infinity")),
            Err(ReflectError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn struct_missing_fields_default() {
        let m = mirror();
        let v = document_to_value(&m, PropertyType::Struct, Some("Range"), &json!({ "max": 2.0 })).unwrap();
        assert_eq!(
            v,
            PropertyValue::Struct(vec![
                ("min".to_owned(), PropertyValue::Float(0.0)),
                ("max".to_owned(), PropertyValue::Float(2.0)),
            ])
        );
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let m = mirror();
        assert!(matches!(
            document_to_value(&m, PropertyType::Vector2, None, &json!({ "x": 1.0 })),
            Err(ReflectError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            document_to_value(&m, PropertyType::Int, None, &json!("seven")),
            Err(ReflectError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            document_to_value(&m, PropertyType::Int, None, &json!(1u64 << 40)),
            Err(ReflectError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn mat4_is_column_major() {
        let m = mirror();
        let mat = Mat4::from_translation(glam::Vec3::new(1.0, 2.0, 3.0));
        let doc = value_to_document(&m, PropertyType::Mat4, None, &PropertyValue::Mat4(mat)).unwrap();
        assert_eq!(doc[3], json!([1.0, 2.0, 3.0, 1.0]));
        assert_eq!(
            document_to_value(&m, PropertyType::Mat4, None, &doc).unwrap(),
            PropertyValue::Mat4(mat)
        );
    }
}
