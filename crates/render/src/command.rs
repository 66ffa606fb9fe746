use crate::hitmap::MouseEventObject;
use crate::hitmap_props::AssignNextColors;
use glam::{Mat4, Vec3};
use worldview_camera::CameraInfo;
use worldview_common::{Color, MarkerRef};

/// Identifies one mounted draw call (one command element in the scene).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u64);

/// Static description of a GPU program. Backends compile each label once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandDefinition {
    pub label: &'static str,
}

impl CommandDefinition {
    pub const fn new(label: &'static str) -> Self {
        Self { label }
    }
}

/// Unit meshes backends know how to instance. All fit in `[-0.5, 0.5]^3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Cube,
    Sphere,
    /// Axis along +Z.
    Cylinder,
    /// Apex at +Z.
    Cone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Triangles,
    Lines,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instance {
    pub model: Mat4,
    pub color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColoredVertex {
    pub position: Vec3,
    pub color: Color,
}

impl ColoredVertex {
    pub fn new(position: Vec3, color: Color) -> Self {
        Self { position, color }
    }
}

/// Geometry a command hands to the backend for one draw.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawBatch {
    Instances {
        shape: Shape,
        instances: Vec<Instance>,
    },
    Vertices {
        primitive: Primitive,
        vertices: Vec<ColoredVertex>,
    },
}

impl DrawBatch {
    pub fn is_empty(&self) -> bool {
        match self {
            DrawBatch::Instances { instances, .. } => instances.is_empty(),
            DrawBatch::Vertices { vertices, .. } => vertices.is_empty(),
        }
    }
}

/// Collects batches while a command draws under the current camera.
#[derive(Debug)]
pub struct DrawContext<'a> {
    pub camera: &'a CameraInfo,
    pub is_hitmap: bool,
    batches: Vec<DrawBatch>,
}

impl<'a> DrawContext<'a> {
    pub fn new(camera: &'a CameraInfo, is_hitmap: bool) -> Self {
        Self {
            camera,
            is_hitmap,
            batches: Vec::new(),
        }
    }

    pub fn push(&mut self, batch: DrawBatch) {
        if !batch.is_empty() {
            self.batches.push(batch);
        }
    }

    pub fn batches(&self) -> &[DrawBatch] {
        &self.batches
    }

    pub fn into_batches(self) -> Vec<DrawBatch> {
        self.batches
    }
}

/// A kind of drawable: turns markers into batches and knows how to prepare
/// them for the hitmap.
pub trait DrawableCommand {
    fn definition(&self) -> CommandDefinition;

    /// Emit batches for `markers`. In hitmap mode the markers are the ones
    /// returned by [`hitmap_markers`](Self::hitmap_markers).
    fn draw(&self, markers: &[MarkerRef], ctx: &mut DrawContext<'_>);

    /// Copies of `markers` recolored with object IDs, leaving out the
    /// `excluded` objects. `None` keeps this command out of the hitmap.
    fn hitmap_markers(
        &self,
        markers: &[MarkerRef],
        assign: &mut AssignNextColors<'_>,
        excluded: &[MouseEventObject],
    ) -> Option<Vec<MarkerRef>> {
        let _ = (markers, assign, excluded);
        None
    }
}
