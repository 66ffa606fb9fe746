use glam::Mat4;
use worldview_common::{Color, Marker, MarkerRef};
use worldview_render::hitmap_props::{self, AssignNextColors};
use worldview_render::{
    CommandDefinition, DrawBatch, DrawContext, DrawableCommand, Instance, MouseEventObject, Shape,
};

/// Marker color for whole-marker draws. In hitmap passes this is the ID color.
pub(crate) fn base_color(marker: &Marker) -> Color {
    marker
        .color
        .or_else(|| marker.colors.first().copied())
        .unwrap_or_default()
}

/// Instances for `markers`: one per marker, or one per point when the marker
/// has points. Points are offsets in the marker's rotated frame.
pub(crate) fn shape_instances(markers: &[MarkerRef]) -> Vec<Instance> {
    let mut instances = Vec::new();
    for marker in markers {
        if marker.points.is_empty() {
            instances.push(Instance {
                model: marker.model_matrix(),
                color: base_color(marker),
            });
            continue;
        }
        let frame = Mat4::from_rotation_translation(marker.pose.orientation, marker.pose.position);
        let scale = Mat4::from_scale(marker.scale);
        instances.extend(marker.points.iter().enumerate().map(|(i, point)| Instance {
            model: frame * Mat4::from_translation(*point) * scale,
            color: marker.color_at(i),
        }));
    }
    instances
}

macro_rules! shape_command {
    ($(#[$doc:meta])* $name:ident, $shape:expr, $label:literal) => {
        $(#[$doc])*
        #[derive(Debug, Default, Clone, Copy)]
        pub struct $name;

        impl DrawableCommand for $name {
            fn definition(&self) -> CommandDefinition {
                CommandDefinition::new($label)
            }

            fn draw(&self, markers: &[MarkerRef], ctx: &mut DrawContext<'_>) {
                ctx.push(DrawBatch::Instances {
                    shape: $shape,
                    instances: shape_instances(markers),
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
    };
}

shape_command!(
    /// Unit cubes scaled by each marker. With `points`, one cube per point.
    Cubes,
    Shape::Cube,
    "cubes"
);
shape_command!(
    /// Spheres of diameter `scale`.
    Spheres,
    Shape::Sphere,
    "spheres"
);
shape_command!(
    /// Cylinders along the marker's local Z axis.
    Cylinders,
    Shape::Cylinder,
    "cylinders"
);
shape_command!(
    /// Cones with the apex at the marker's local +Z.
    Cones,
    Shape::Cone,
    "cones"
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{pick_center, scene};
    use glam::Vec3;
    use std::rc::Rc;
    use worldview_render::RenderTarget;

    #[test]
    fn one_instance_per_point() {
        let marker = Marker::at(Vec3::new(1.0, 0.0, 0.0))
            .with_points(vec![Vec3::ZERO, Vec3::Z])
            .shared();
        let instances = shape_instances(&[marker]);
        assert_eq!(instances.len(), 2);
        assert_eq!(
            instances[1].model.transform_point3(Vec3::ZERO),
            Vec3::new(1.0, 0.0, 1.0)
        );
    }

    #[test]
    fn colors_fall_back_to_marker_color() {
        let red = Color::new(1.0, 0.0, 0.0, 1.0);
        let marker = Marker::new().with_color(red).shared();
        assert_eq!(shape_instances(&[marker])[0].color, red);
    }

    #[test]
    fn picks_sphere() {
        let sphere = Marker::new().with_scale(Vec3::splat(4.0)).shared();
        let mut s = scene();
        s.mount(Rc::new(Spheres), vec![sphere.clone()]);
        let hits = pick_center(&mut s, false);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].0.is(&sphere));
        assert_eq!(hits[0].0.instance_index, Some(0));
    }

    #[test]
    fn point_instances_resolve_to_their_index() {
        // the camera looks down -Y through the origin; only point 1 sits there
        let marker = Marker::new()
            .with_points(vec![Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO, Vec3::new(-10.0, 0.0, 0.0)])
            .shared();
        let mut s = scene();
        s.mount(Rc::new(Cubes), vec![marker.clone()]);
        let hits = pick_center(&mut s, false);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.instance_index, Some(1));
    }

    #[test]
    fn cylinders_and_cones_draw_their_shape() {
        let mut s = scene();
        s.mount(Rc::new(Cylinders), vec![Marker::new().shared()]);
        s.mount(Rc::new(Cones), vec![Marker::at(Vec3::X * 3.0).shared()]);
        s.ctx.paint();
        let shapes: Vec<Shape> = s
            .gpu()
            .batches(RenderTarget::Canvas)
            .into_iter()
            .filter_map(|b| match b {
                DrawBatch::Instances { shape, .. } => Some(*shape),
                _ => None,
            })
            .collect();
        assert_eq!(shapes, vec![Shape::Cylinder, Shape::Cone]);
    }
}
