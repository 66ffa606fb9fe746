use glam::{Quat, Vec3};
use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;
use worldview_common::{Marker, MarkerRef, Pose};
use worldview_render::hitmap_props::{self, AssignNextColors};
use worldview_render::{
    CommandDefinition, DrawBatch, DrawContext, DrawableCommand, Instance, MouseEventObject, Shape,
};

use crate::shapes::base_color;

/// Head diameter relative to the shaft diameter.
const HEAD_WIDTH_RATIO: f32 = 2.0;

/// Arrows built from a cylinder shaft and a cone head.
///
/// An arrow points along its pose's +X axis with `scale.x` total length,
/// `scale.y` shaft diameter and `scale.z` head length. Two `points` override
/// the pose: the arrow then runs from the first point to the second.
///
/// Picking reports the declared arrow marker, not its parts.
#[derive(Debug, Default, Clone, Copy)]
pub struct Arrows;

/// Shaft and head markers of `arrow`, carrying it as `original_marker`.
pub fn decompose(arrow: &MarkerRef) -> [MarkerRef; 2] {
    let (origin, rotation, length) = match arrow.points.as_slice() {
        [start, end] => {
            let dir = *end - *start;
            let rotation = Quat::from_rotation_arc(Vec3::X, dir.normalize_or(Vec3::X));
            (*start, rotation, dir.length())
        }
        _ => (arrow.pose.position, arrow.pose.orientation, arrow.scale.x),
    };
    let shaft_width = arrow.scale.y;
    let head_length = arrow.scale.z.min(length);
    let shaft_length = length - head_length;
    // unit shapes run along +Z; turn them onto +X
    let along_x = rotation * Quat::from_rotation_y(FRAC_PI_2);

    let part = |center: f32, width: f32, len: f32| {
        Arc::new(Marker {
            pose: Pose {
                position: origin + rotation * Vec3::new(center, 0.0, 0.0),
                orientation: along_x,
            },
            scale: Vec3::new(width, width, len),
            color: Some(base_color(arrow)),
            colors: Vec::new(),
            points: Vec::new(),
            original_marker: Some(arrow.clone()),
            ..Marker::clone(arrow)
        })
    };
    [
        part(shaft_length / 2.0, shaft_width, shaft_length),
        part(
            shaft_length + head_length / 2.0,
            shaft_width * HEAD_WIDTH_RATIO,
            head_length,
        ),
    ]
}

fn decompose_all(markers: &[MarkerRef]) -> Vec<MarkerRef> {
    markers.iter().flat_map(decompose).collect()
}

impl DrawableCommand for Arrows {
    fn definition(&self) -> CommandDefinition {
        CommandDefinition::new("arrows")
    }

    fn draw(&self, markers: &[MarkerRef], ctx: &mut DrawContext<'_>) {
        // hitmap passes receive parts that are already decomposed
        let decomposed;
        let parts = if ctx.is_hitmap {
            markers
        } else {
            decomposed = decompose_all(markers);
            &decomposed
        };
        let instance = |m: &MarkerRef| Instance {
            model: m.model_matrix(),
            color: base_color(m),
        };
        let (mut shafts, mut heads) = (Vec::new(), Vec::new());
        for pair in parts.chunks_exact(2) {
            shafts.push(instance(&pair[0]));
            heads.push(instance(&pair[1]));
        }
        ctx.push(DrawBatch::Instances {
            shape: Shape::Cylinder,
            instances: shafts,
        });
        ctx.push(DrawBatch::Instances {
            shape: Shape::Cone,
            instances: heads,
        });
    }

    fn hitmap_markers(
        &self,
        markers: &[MarkerRef],
        assign: &mut AssignNextColors<'_>,
        excluded: &[MouseEventObject],
    ) -> Option<Vec<MarkerRef>> {
        // both parts of an excluded arrow drop together, so pairs survive
        Some(hitmap_props::with_original_marker(
            &decompose_all(markers),
            assign,
            excluded,
        ))
    }
}
