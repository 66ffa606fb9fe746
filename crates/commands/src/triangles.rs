use worldview_common::MarkerRef;
use worldview_render::hitmap_props::{self, AssignNextColors};
use worldview_render::{
    ColoredVertex, CommandDefinition, DrawBatch, DrawContext, DrawableCommand, MouseEventObject,
    Primitive,
};

/// Triangle lists: every three `points` form one triangle in the marker's
/// frame. Markers with `only_render_in_hitmap` are invisible but pickable.
#[derive(Debug, Default, Clone, Copy)]
pub struct Triangles;

impl DrawableCommand for Triangles {
    fn definition(&self) -> CommandDefinition {
        CommandDefinition::new("triangles")
    }

    fn draw(&self, markers: &[MarkerRef], ctx: &mut DrawContext<'_>) {
        let mut vertices = Vec::new();
        for marker in markers {
            if marker.only_render_in_hitmap && !ctx.is_hitmap {
                continue;
            }
            let model = marker.model_matrix();
            let whole = marker.points.len() / 3 * 3;
            vertices.extend(
                marker.points[..whole]
                    .iter()
                    .enumerate()
                    .map(|(i, p)| ColoredVertex::new(model.transform_point3(*p), marker.color_at(i))),
            );
        }
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
        Some(hitmap_props::instanced(markers, assign, excluded, 3))
    }
}
