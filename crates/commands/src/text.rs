use glam::Vec3;
use std::cell::RefCell;
use std::rc::Rc;
use worldview_assets::GlyphAtlasCache;
use worldview_camera::{CameraCommand, CameraInfo};
use worldview_common::{Color, Dimensions, MarkerRef};
use worldview_render::hitmap_props::{self, AssignNextColors};
use worldview_render::{
    ColoredVertex, CommandDefinition, DrawBatch, DrawContext, DrawableCommand, Gpu,
    MouseEventObject, PaintCallbackId, Primitive, WorldviewContext,
};

use crate::shapes::base_color;

/// Label height in pixels at `scale.x == 1`.
pub const DEFAULT_FONT_SIZE: f32 = 14.0;

/// A text marker laid out in screen space, ready for an overlay to paint.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLabel {
    pub text: String,
    /// Label center, pixels from the top-left of the canvas.
    pub x: f32,
    pub y: f32,
    /// Window depth in `0..=1`.
    pub depth: f32,
    pub font_size: f32,
    pub width: f32,
    pub height: f32,
    pub color: Color,
}

/// Screen-space labels anchored at each marker's position.
///
/// Labels keep a constant pixel size. The canvas pass only records the
/// markers; a paint callback registered with [`Text::attach`] projects them
/// into [`TextLabel`]s after every paint. Hitmap passes draw camera-facing
/// quads covering each label so text can be picked.
#[derive(Debug, Default)]
pub struct Text {
    atlas: RefCell<GlyphAtlasCache>,
    markers: RefCell<Vec<MarkerRef>>,
    labels: RefCell<Vec<TextLabel>>,
}

/// World units covered by one pixel at `point`.
fn world_per_pixel(camera: &CameraInfo, point: Vec3) -> Option<f32> {
    let height = camera.viewport.height.max(1.0);
    let focal = camera.projection.y_axis.y;
    if !camera.is_perspective {
        return Some(2.0 / (focal * height));
    }
    let depth = -camera.view.transform_point3(point).z;
    (depth > 0.0).then(|| 2.0 * depth / (focal * height))
}

impl Text {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the layout pass with `ctx`. Unregister the returned id when
    /// the text element unmounts.
    pub fn attach<G: Gpu>(self: &Rc<Self>, ctx: &mut WorldviewContext<G>) -> PaintCallbackId {
        let text = Rc::clone(self);
        ctx.register_paint_callback(move |paint| text.layout(paint.camera, paint.dimension))
    }

    /// Labels from the latest paint, far to near.
    pub fn labels(&self) -> Vec<TextLabel> {
        self.labels.borrow().clone()
    }

    /// Number of glyph atlases built so far.
    pub fn atlas_builds(&self) -> u64 {
        self.atlas.borrow().builds()
    }

    pub fn layout(&self, camera: &CameraCommand, dimension: Dimensions) {
        let markers = self.markers.borrow();
        let atlas = self
            .atlas
            .borrow_mut()
            .atlas_for(markers.iter().filter_map(|m| m.text.as_deref()));
        let mut labels: Vec<TextLabel> = markers
            .iter()
            .filter_map(|m| {
                let text = m.text.as_deref()?;
                let screen = camera.to_screen_coord(&dimension, m.pose.position)?;
                let font_size = DEFAULT_FONT_SIZE * m.scale.x;
                let (w, h) = atlas.measure(text);
                Some(TextLabel {
                    text: text.to_owned(),
                    x: screen.x,
                    y: screen.y,
                    depth: screen.z,
                    font_size,
                    width: w * font_size,
                    height: h * font_size,
                    color: base_color(m),
                })
            })
            .collect();
        labels.sort_by(|a, b| b.depth.total_cmp(&a.depth));
        *self.labels.borrow_mut() = labels;
    }

    fn hit_quads(&self, markers: &[MarkerRef], camera: &CameraInfo) -> Vec<ColoredVertex> {
        let atlas = self
            .atlas
            .borrow_mut()
            .atlas_for(markers.iter().filter_map(|m| m.text.as_deref()));
        let rotation = camera.billboard_rotation;
        let mut vertices = Vec::new();
        for marker in markers {
            let Some(text) = marker.text.as_deref() else {
                continue;
            };
            let center = marker.pose.position;
            let Some(per_pixel) = world_per_pixel(camera, center) else {
                continue;
            };
            let (w, h) = atlas.measure(text);
            let font = DEFAULT_FONT_SIZE * marker.scale.x * per_pixel;
            let (hx, hy) = (w * font / 2.0, h * font / 2.0);
            let color = base_color(marker);
            let corner =
                |x: f32, y: f32| ColoredVertex::new(center + rotation.transform_vector3(Vec3::new(x, y, 0.0)), color);
            let [a, b, c, d] = [corner(-hx, -hy), corner(hx, -hy), corner(hx, hy), corner(-hx, hy)];
            vertices.extend([a, b, c, a, c, d]);
        }
        vertices
    }
}

impl DrawableCommand for Text {
    fn definition(&self) -> CommandDefinition {
        CommandDefinition::new("text")
    }

    fn draw(&self, markers: &[MarkerRef], ctx: &mut DrawContext<'_>) {
        if !ctx.is_hitmap {
            *self.markers.borrow_mut() = markers.to_vec();
            return;
        }
        let vertices = self.hit_quads(markers, ctx.camera);
        ctx.push(DrawBatch::Vertices {
            primitive: Primitive::Triangles,
            vertices,
        });
    }

    fn hitmap_markers(
        &self,
        markers: &[MarkerRef],
        assign: &mut AssignNextColors<'_>,
        excluded: &[MouseEventObject],
    ) -> Option<Vec<MarkerRef>> {
        Some(hitmap_props::non_instanced(markers, assign, excluded))
    }
}
