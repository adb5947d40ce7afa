//! Registration of the built-in element kinds.
//!
//! Ancestors come first so every element can name its base. Property names
//! are the display names editors and realm files use.

use std::sync::Arc;

use thicket_ecs::element::Element;
use thicket_ecs::elements::{BoxCollider, Camera, CppScript, ProjectionMode, Sprite2D, Transform};

use crate::registry::{ByteMirror, UiHint};
use crate::value::{PropertyType, PropertyValue};
use crate::ReflectError;

pub(crate) fn register_builtin_types(mirror: &mut ByteMirror) {
    mirror.register_abstract("Element", None, |t| {
        t.raw_property(
            "name",
            PropertyType::String,
            None,
            Arc::new(|e: &dyn Element| Ok(PropertyValue::String(e.name().to_owned()))),
            Some(Arc::new(|e: &mut dyn Element, v: PropertyValue| match v {
                PropertyValue::String(s) => {
                    e.set_name(&s);
                    Ok(())
                }
                other => Err(ReflectError::TypeMismatch {
                    property: "name".to_owned(),
                    expected: PropertyType::String,
                    found: other.kind_name(),
                }),
            })),
        );
        t.raw_property(
            "visible",
            PropertyType::Bool,
            None,
            Arc::new(|e: &dyn Element| Ok(PropertyValue::Bool(e.is_visible()))),
            Some(Arc::new(|e: &mut dyn Element, v: PropertyValue| match v {
                PropertyValue::Bool(b) => {
                    e.set_visible(b);
                    Ok(())
                }
                other => Err(ReflectError::TypeMismatch {
                    property: "visible".to_owned(),
                    expected: PropertyType::Bool,
                    found: other.kind_name(),
                }),
            })),
        );
    });
    mirror.register_abstract("RenderableElement", Some("Element"), |_| {});
    mirror.register_abstract("ScriptElement", Some("Element"), |_| {});

    let variants: Vec<(i32, &str)> = ProjectionMode::VARIANTS.to_vec();
    mirror.register_enum("ProjectionMode", &variants);

    mirror.register_element::<Transform>("Transform", Some("Element"), |t| {
        t.property("Position", Transform::position, Transform::set_position);
        t.property("Rotation", Transform::rotation, Transform::set_rotation);
        t.property("Scale", Transform::scale, Transform::set_scale);
    });

    mirror.register_element::<Sprite2D>("Sprite2D", Some("RenderableElement"), |t| {
        t.property("Color", Sprite2D::color, Sprite2D::set_color)
            .hint(UiHint::ColorEdit);
        t.property("Offset", Sprite2D::offset, Sprite2D::set_offset);
        t.property("Pivot", Sprite2D::pivot, Sprite2D::set_pivot);
        t.property("Flip H", Sprite2D::flip_h, Sprite2D::set_flip_h);
        t.property("Flip V", Sprite2D::flip_v, Sprite2D::set_flip_v);
        t.property("Sorting Layer", Sprite2D::sorting_layer, Sprite2D::set_sorting_layer);
        t.property(
            "Texture Path",
            |s: &Sprite2D| s.texture_path().to_owned(),
            |s: &mut Sprite2D, v: String| s.set_texture_path(&v),
        )
        .hint(UiHint::ImageFile);
        t.property("Source Rect", Sprite2D::source_rect, Sprite2D::set_source_rect);
    });

    mirror.register_element::<Camera>("Camera", Some("Element"), |t| {
        t.enum_class_property(
            "Projection Mode",
            "ProjectionMode",
            |c: &Camera| c.projection_mode() as i32,
            |c: &mut Camera, v: i32| {
                if let Some(mode) = ProjectionMode::from_i32(v) {
                    c.set_projection_mode(mode);
                }
            },
        );
        t.property("Field of View", Camera::field_of_view, Camera::set_field_of_view);
        t.property("Orthographic Size", Camera::orthographic_size, Camera::set_orthographic_size);
        t.property("Near Clip", Camera::near_clip, Camera::set_near_clip);
        t.property("Far Clip", Camera::far_clip, Camera::set_far_clip);
        t.read_only("View Matrix", Camera::view_matrix);
        t.read_only("Projection Matrix", Camera::projection_matrix);
    });

    mirror.register_element::<BoxCollider>("BoxCollider", Some("Element"), |t| {
        t.property("Size", BoxCollider::size, BoxCollider::set_size);
        t.property("Anchor", BoxCollider::anchor, BoxCollider::set_anchor);
    });

    mirror.register_element::<CppScript>("CppScript", Some("ScriptElement"), |t| {
        t.property(
            "Script Name",
            |s: &CppScript| s.script_name().to_owned(),
            |s: &mut CppScript, v: String| s.set_script_name(&v),
        )
        .hint(UiHint::SourceFile);
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_element_kind_is_constructible() {
        let mirror = ByteMirror::with_builtin_types();
        assert_eq!(
            mirror.element_type_names(),
            ["BoxCollider", "Camera", "CppScript", "Sprite2D", "Transform"]
        );
        for name in mirror.element_type_names() {
            let element = mirror.create_element_by_name(name).unwrap();
            assert_eq!(element.class_name(), name);
        }
        assert!(mirror.create_element_by_name("RenderableElement").is_none());
    }

    #[test]
    fn sprite_inherits_through_renderable() {
        let mirror = ByteMirror::with_builtin_types();
        let names: Vec<_> = mirror
            .get_all_properties("Sprite2D")
            .iter()
            .map(|p| p.name().to_owned())
            .collect();
        assert_eq!(names.len(), 10);
        assert_eq!(&names[..2], ["name", "visible"]);
        assert!(mirror.is_a("Sprite2D", "RenderableElement"));
    }

    #[test]
    fn camera_matrices_are_read_only() {
        let mirror = ByteMirror::with_builtin_types();
        assert!(mirror.find_property("Camera", "View Matrix").unwrap().is_read_only());
        assert!(!mirror.find_property("Camera", "Far Clip").unwrap().is_read_only());
        let mode = mirror.find_property("Camera", "Projection Mode").unwrap();
        assert_eq!(mode.property_type(), PropertyType::EnumClass);
        assert_eq!(mode.contained_type(), Some("ProjectionMode"));
    }

    #[test]
    fn hints_are_attached() {
        let mirror = ByteMirror::with_builtin_types();
        assert_eq!(
            mirror.find_property("Sprite2D", "Texture Path").unwrap().hint(),
            UiHint::ImageFile
        );
    }

    #[test]
    fn global_is_shared() {
        let a = ByteMirror::global() as *const ByteMirror;
        let b = ByteMirror::global() as *const ByteMirror;
        assert_eq!(a, b);
        assert!(ByteMirror::global().get_type_info_by_name("Camera").is_some());
    }
}
