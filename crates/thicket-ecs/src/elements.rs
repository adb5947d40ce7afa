//! Built-in element kinds.
//!
//! The set is closed: the reflection registry knows how to construct and
//! describe each of these by name. Fields are private behind getter/setter
//! pairs so that derived state (e.g. the camera projection matrix) stays in
//! sync with the values the editor writes.

use crate::element::{Element, ElementBase};
use crate::impl_element_boilerplate;
use crate::math::{Color, Mat4, Point, Rect, Vector2, Vector3};

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// Local position, rotation (euler degrees) and scale.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    base: ElementBase,
    position: Vector3,
    rotation: Vector3,
    scale: Vector3,
}

impl Transform {
    pub fn new() -> Self {
        Self {
            base: ElementBase::new("Transform"),
            position: Vector3::ZERO,
            rotation: Vector3::ZERO,
            scale: Vector3::ONE,
        }
    }

    pub fn position(&self) -> Vector3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vector3) {
        self.position = position;
    }

    pub fn rotation(&self) -> Vector3 {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Vector3) {
        self.rotation = rotation;
    }

    pub fn scale(&self) -> Vector3 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: Vector3) {
        self.scale = scale;
    }

    /// Local model matrix (scale, then XYZ euler rotation, then translation).
    pub fn local_matrix(&self) -> Mat4 {
        let rotation = glam::Quat::from_euler(
            glam::EulerRot::XYZ,
            self.rotation.x.to_radians(),
            self.rotation.y.to_radians(),
            self.rotation.z.to_radians(),
        );
        Mat4::from_scale_rotation_translation(self.scale.into(), rotation, self.position.into())
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl Element for Transform {
    impl_element_boilerplate!("Transform");
}

// ---------------------------------------------------------------------------
// Sprite2D
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Sprite2D {
    base: ElementBase,
    color: Color,
    offset: Vector2,
    pivot: Vector2,
    flip_h: bool,
    flip_v: bool,
    sorting_layer: i32,
    texture_path: String,
    source_rect: Rect,
}

impl Sprite2D {
    pub fn new() -> Self {
        Self {
            base: ElementBase::new("Sprite2D"),
            color: Color::WHITE,
            offset: Vector2::ZERO,
            pivot: Vector2::new(0.5, 0.5),
            flip_h: false,
            flip_v: false,
            sorting_layer: 0,
            texture_path: String::new(),
            source_rect: Rect::default(),
        }
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn offset(&self) -> Vector2 {
        self.offset
    }

    pub fn set_offset(&mut self, offset: Vector2) {
        self.offset = offset;
    }

    pub fn pivot(&self) -> Vector2 {
        self.pivot
    }

    pub fn set_pivot(&mut self, pivot: Vector2) {
        self.pivot = pivot;
    }

    pub fn flip_h(&self) -> bool {
        self.flip_h
    }

    pub fn set_flip_h(&mut self, flip: bool) {
        self.flip_h = flip;
    }

    pub fn flip_v(&self) -> bool {
        self.flip_v
    }

    pub fn set_flip_v(&mut self, flip: bool) {
        self.flip_v = flip;
    }

    pub fn sorting_layer(&self) -> i32 {
        self.sorting_layer
    }

    pub fn set_sorting_layer(&mut self, layer: i32) {
        self.sorting_layer = layer;
    }

    pub fn texture_path(&self) -> &str {
        &self.texture_path
    }

    pub fn set_texture_path(&mut self, path: &str) {
        self.texture_path = path.to_owned();
    }

    /// Sub-region of the texture to draw. A zero-sized rect means "whole texture".
    pub fn source_rect(&self) -> Rect {
        self.source_rect
    }

    pub fn set_source_rect(&mut self, rect: Rect) {
        self.source_rect = rect;
    }
}

impl Default for Sprite2D {
    fn default() -> Self {
        Self::new()
    }
}

impl Element for Sprite2D {
    impl_element_boilerplate!("Sprite2D");
}

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum ProjectionMode {
    #[default]
    Perspective = 0,
    Orthographic = 1,
}

impl ProjectionMode {
    /// All variants with their stable names, in declaration order.
    pub const VARIANTS: [(i32, &'static str); 2] = [(0, "Perspective"), (1, "Orthographic")];

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(ProjectionMode::Perspective),
            1 => Some(ProjectionMode::Orthographic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    base: ElementBase,
    projection_mode: ProjectionMode,
    field_of_view: f32,
    orthographic_size: f32,
    near_clip: f32,
    far_clip: f32,
    aspect_ratio: f32,
    view_matrix: Mat4,
    projection_matrix: Mat4,
}

impl Camera {
    pub fn new() -> Self {
        let mut camera = Self {
            base: ElementBase::new("Camera"),
            projection_mode: ProjectionMode::Perspective,
            field_of_view: 60.0,
            orthographic_size: 5.0,
            near_clip: 0.1,
            far_clip: 1000.0,
            aspect_ratio: 16.0 / 9.0,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
        };
        camera.recalculate_projection();
        camera
    }

    pub fn projection_mode(&self) -> ProjectionMode {
        self.projection_mode
    }

    pub fn set_projection_mode(&mut self, mode: ProjectionMode) {
        self.projection_mode = mode;
        self.recalculate_projection();
    }

    pub fn field_of_view(&self) -> f32 {
        self.field_of_view
    }

    pub fn set_field_of_view(&mut self, degrees: f32) {
        self.field_of_view = degrees;
        self.recalculate_projection();
    }

    pub fn orthographic_size(&self) -> f32 {
        self.orthographic_size
    }

    pub fn set_orthographic_size(&mut self, size: f32) {
        self.orthographic_size = size;
        self.recalculate_projection();
    }

    pub fn near_clip(&self) -> f32 {
        self.near_clip
    }

    pub fn set_near_clip(&mut self, near: f32) {
        self.near_clip = near;
        self.recalculate_projection();
    }

    pub fn far_clip(&self) -> f32 {
        self.far_clip
    }

    pub fn set_far_clip(&mut self, far: f32) {
        self.far_clip = far;
        self.recalculate_projection();
    }

    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        if aspect > 0.0 {
            self.aspect_ratio = aspect;
            self.recalculate_projection();
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    /// Point the camera from `eye` towards `target` (+Y up).
    pub fn look_at(&mut self, eye: Vector3, target: Vector3) {
        self.view_matrix = Mat4::look_at_rh(eye.into(), target.into(), glam::Vec3::Y);
    }

    fn recalculate_projection(&mut self) {
        // Degenerate clip ranges would produce NaNs; keep the last good matrix.
        if self.far_clip <= self.near_clip || self.near_clip <= 0.0 {
            return;
        }
        self.projection_matrix = match self.projection_mode {
            ProjectionMode::Perspective => Mat4::perspective_rh(
                self.field_of_view.to_radians(),
                self.aspect_ratio,
                self.near_clip,
                self.far_clip,
            ),
            ProjectionMode::Orthographic => {
                let half_h = self.orthographic_size;
                let half_w = half_h * self.aspect_ratio;
                Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, self.near_clip, self.far_clip)
            }
        };
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

impl Element for Camera {
    impl_element_boilerplate!("Camera");

    fn initialize(&mut self) {
        self.recalculate_projection();
    }
}

// ---------------------------------------------------------------------------
// BoxCollider
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct BoxCollider {
    base: ElementBase,
    size: Vector3,
    anchor: Point,
}

impl BoxCollider {
    pub fn new() -> Self {
        Self {
            base: ElementBase::new("BoxCollider"),
            size: Vector3::ONE,
            anchor: Point::default(),
        }
    }

    pub fn size(&self) -> Vector3 {
        self.size
    }

    pub fn set_size(&mut self, size: Vector3) {
        self.size = size;
    }

    /// Pixel offset of the collider's origin relative to its owner.
    pub fn anchor(&self) -> Point {
        self.anchor
    }

    pub fn set_anchor(&mut self, anchor: Point) {
        self.anchor = anchor;
    }
}

impl Default for BoxCollider {
    fn default() -> Self {
        Self::new()
    }
}

impl Element for BoxCollider {
    impl_element_boilerplate!("BoxCollider");
}

// ---------------------------------------------------------------------------
// CppScript
// ---------------------------------------------------------------------------

/// Placeholder for a natively compiled gameplay script, identified by name.
#[derive(Debug, Clone, PartialEq)]
pub struct CppScript {
    base: ElementBase,
    script_name: String,
}

impl CppScript {
    pub fn new() -> Self {
        Self {
            base: ElementBase::new("CppScript"),
            script_name: String::new(),
        }
    }

    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    pub fn set_script_name(&mut self, name: &str) {
        self.script_name = name.to_owned();
    }
}

impl Default for CppScript {
    fn default() -> Self {
        Self::new()
    }
}

impl Element for CppScript {
    impl_element_boilerplate!("CppScript");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
