use glam::{Mat4, Vec3};
use worldview_common::MarkerRef;
use worldview_render::hitmap_props::{self, AssignNextColors};
use worldview_render::{
    CommandDefinition, DrawBatch, DrawContext, DrawableCommand, Instance, MouseEventObject, Shape,
};

/// Point clouds. Each point is a cube of edge `scale.x`, placed in the
/// marker's frame and colored by `colors[i]` or the marker color.
#[derive(Debug, Default, Clone, Copy)]
pub struct Points;

impl DrawableCommand for Points {
    fn definition(&self) -> CommandDefinition {
        CommandDefinition::new("points")
    }

    fn draw(&self, markers: &[MarkerRef], ctx: &mut DrawContext<'_>) {
        let mut instances = Vec::new();
        for marker in markers {
            let frame = Mat4::from_rotation_translation(marker.pose.orientation, marker.pose.position);
            let size = Mat4::from_scale(Vec3::splat(marker.scale.x));
            instances.extend(marker.points.iter().enumerate().map(|(i, p)| Instance {
                model: frame * Mat4::from_translation(*p) * size,
                color: marker.color_at(i),
            }));
        }
        ctx.push(DrawBatch::Instances {
            shape: Shape::Cube,
            instances,
        });
    }

    fn hitmap_markers(
        &self,
        markers: &[MarkerRef],
        assign: &mut AssignNextColors<'_>,
        excluded: &[MouseEventObject],
    ) -> Option<Vec<MarkerRef>> {
        Some(hitmap_props::instanced(markers, assign, excluded, 1))
    }
}
