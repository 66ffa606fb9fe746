use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Linear RGBA color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    #[serde(default = "opaque")]
    pub a: f32,
}

fn opaque() -> f32 {
    1.0
}

impl Color {
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn from_array(c: [f32; 4]) -> Self {
        Self::new(c[0], c[1], c[2], c[3])
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Same color with a different alpha.
    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Application-supplied marker identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerId(pub u64);

/// Position and orientation of a marker in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    #[serde(default)]
    pub position: Vec3,
    #[serde(default = "identity")]
    pub orientation: Quat,
}

fn identity() -> Quat {
    Quat::IDENTITY
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
        }
    }
}

impl Pose {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

/// How a line marker's `points` are connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinePrimitive {
    /// Every pair of points is an independent segment.
    #[default]
    Lines,
    /// Consecutive points are joined.
    LineStrip,
}

/// Shared handle to a marker. Two handles name the same object iff `Arc::ptr_eq`.
pub type MarkerRef = Arc<Marker>;

/// A declarative drawable: pose, scale, color and optional per-point data.
///
/// The same shape serves every command type; commands read the fields they
/// understand and ignore the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    #[serde(default)]
    pub id: Option<MarkerId>,
    #[serde(default)]
    pub pose: Pose,
    #[serde(default = "unit_scale")]
    pub scale: Vec3,
    #[serde(default)]
    pub color: Option<Color>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub colors: Vec<Color>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub primitive: LinePrimitive,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub only_render_in_hitmap: bool,
    /// For markers produced by decomposing a composite: the marker the
    /// application actually declared.
    #[serde(skip)]
    pub original_marker: Option<MarkerRef>,
}

fn unit_scale() -> Vec3 {
    Vec3::ONE
}

impl Default for Marker {
    fn default() -> Self {
        Self {
            id: None,
            pose: Pose::default(),
            scale: Vec3::ONE,
            color: None,
            colors: Vec::new(),
            points: Vec::new(),
            text: None,
            primitive: LinePrimitive::default(),
            closed: false,
            only_render_in_hitmap: false,
            original_marker: None,
        }
    }
}

impl Marker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(position: Vec3) -> Self {
        Self {
            pose: Pose::at(position),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(MarkerId(id));
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.pose.orientation = orientation;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_points(mut self, points: Vec<Vec3>) -> Self {
        self.points = points;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn shared(self) -> MarkerRef {
        Arc::new(self)
    }

    /// Model matrix from pose and scale.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.pose.orientation, self.pose.position)
    }

    /// Color of the `index`-th point: per-point color, then marker color, then white.
    pub fn color_at(&self, index: usize) -> Color {
        self.colors
            .get(index)
            .copied()
            .or(self.color)
            .unwrap_or_default()
    }
}

/// Size and page offset of the drawing surface, in CSS-like logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub left: f32,
    #[serde(default)]
    pub top: f32,
}

impl Dimensions {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            left: 0.0,
            top: 0.0,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width / self.height.max(f32::EPSILON)
    }
}
