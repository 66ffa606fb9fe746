use glam::{Mat4, Vec3};
use worldview_camera::CameraInfo;
use worldview_common::{Color, LinePrimitive, Marker, MarkerRef};
use worldview_render::hitmap_props::{self, AssignNextColors};
use worldview_render::{
    ColoredVertex, CommandDefinition, DrawBatch, DrawContext, DrawableCommand, MouseEventObject,
    Primitive,
};

/// Polylines. `primitive` picks independent segments or a strip, `closed`
/// joins the last point back to the first, and `scale.x` is the thickness in
/// world units. A thickness of zero or less draws hairlines.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lines;

type Segment = ((Vec3, Color), (Vec3, Color));

/// World-space segments of one line marker.
fn segments(marker: &Marker) -> Vec<Segment> {
    let n = marker.points.len();
    if n < 2 {
        return Vec::new();
    }
    let pose = Mat4::from_rotation_translation(marker.pose.orientation, marker.pose.position);
    let already_closed = n > 2 && marker.points[0] == marker.points[n - 1];
    let close = marker.closed && !already_closed;

    let mut points: Vec<(Vec3, Color)> = marker
        .points
        .iter()
        .enumerate()
        .map(|(i, p)| (pose.transform_point3(*p), marker.color_at(i)))
        .collect();
    if close {
        points.push(points[0]);
    }
    match marker.primitive {
        LinePrimitive::LineStrip => points.windows(2).map(|w| (w[0], w[1])).collect(),
        LinePrimitive::Lines => points.chunks_exact(2).map(|c| (c[0], c[1])).collect(),
    }
}

/// Unit vector pointing from the scene toward the camera.
fn toward_camera(camera: &CameraInfo) -> Vec3 {
    camera.view.inverse().transform_vector3(Vec3::Z).normalize_or_zero()
}

/// Two triangles covering the segment, facing the camera.
fn ribbon(((a, ca), (b, cb)): Segment, thickness: f32, eye: Vec3, out: &mut Vec<ColoredVertex>) {
    let dir = b - a;
    let mut side = dir.cross(eye);
    if side.length_squared() < 1e-12 {
        side = dir.any_orthogonal_vector();
    }
    let half = side.normalize_or_zero() * (thickness / 2.0);
    let corners = [
        ColoredVertex::new(a - half, ca),
        ColoredVertex::new(a + half, ca),
        ColoredVertex::new(b + half, cb),
        ColoredVertex::new(b - half, cb),
    ];
    out.extend([corners[0], corners[1], corners[2], corners[0], corners[2], corners[3]]);
}

impl DrawableCommand for Lines {
    fn definition(&self) -> CommandDefinition {
        CommandDefinition::new("lines")
    }

    fn draw(&self, markers: &[MarkerRef], ctx: &mut DrawContext<'_>) {
        let eye = toward_camera(ctx.camera);
        let mut ribbons = Vec::new();
        let mut hairlines = Vec::new();
        for marker in markers {
            let thickness = marker.scale.x;
            for segment in segments(marker) {
                if thickness > 0.0 {
                    ribbon(segment, thickness, eye, &mut ribbons);
                } else {
                    let ((a, ca), (b, cb)) = segment;
                    hairlines.push(ColoredVertex::new(a, ca));
                    hairlines.push(ColoredVertex::new(b, cb));
                }
            }
        }
        ctx.push(DrawBatch::Vertices {
            primitive: Primitive::Triangles,
            vertices: ribbons,
        });
        ctx.push(DrawBatch::Vertices {
            primitive: Primitive::Lines,
            vertices: hairlines,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{pick_center, scene};
    use std::rc::Rc;
    use worldview_render::RenderTarget;

    fn line(points: Vec<Vec3>, primitive: LinePrimitive, closed: bool) -> Marker {
        Marker {
            primitive,
            closed,
            ..Marker::new().with_points(points)
        }
    }

    fn square() -> Vec<Vec3> {
        vec![Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y]
    }

    #[test]
    fn segment_counts() {
        assert_eq!(segments(&line(square(), LinePrimitive::Lines, false)).len(), 2);
        assert_eq!(segments(&line(square(), LinePrimitive::LineStrip, false)).len(), 3);
        assert_eq!(segments(&line(square(), LinePrimitive::LineStrip, true)).len(), 4);
        assert!(segments(&line(vec![Vec3::ZERO], LinePrimitive::LineStrip, true)).is_empty());
    }

    #[test]
    fn closed_strip_is_not_closed_twice() {
        let mut points = square();
        points.push(Vec3::ZERO);
        assert_eq!(segments(&line(points, LinePrimitive::LineStrip, true)).len(), 4);
    }

    #[test]
    fn segments_follow_pose() {
        let marker = Marker {
            pose: worldview_common::Pose::at(Vec3::new(0.0, 0.0, 5.0)),
            ..line(vec![Vec3::ZERO, Vec3::X], LinePrimitive::Lines, false)
        };
        let ((a, _), (b, _)) = segments(&marker)[0];
        assert_eq!(a, Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(b, Vec3::new(1.0, 0.0, 5.0));
    }

    #[test]
    fn thick_lines_are_pickable() {
        let marker = line(
            vec![Vec3::new(-5.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0)],
            LinePrimitive::Lines,
            false,
        )
        .shared();
        let mut s = scene();
        s.mount(Rc::new(Lines), vec![marker.clone()]);
        let hits = pick_center(&mut s, false);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].0.is(&marker));
        assert_eq!(hits[0].0.instance_index, None);
    }

    #[test]
    fn zero_thickness_draws_hairlines() {
        let marker = Marker {
            scale: Vec3::ZERO,
            ..line(square(), LinePrimitive::LineStrip, false)
        }
        .shared();
        let mut s = scene();
        s.mount(Rc::new(Lines), vec![marker]);
        s.ctx.paint();
        let batches = s.gpu().batches(RenderTarget::Canvas);
        assert_eq!(batches.len(), 1);
        assert!(matches!(
            batches[0],
            DrawBatch::Vertices { primitive: Primitive::Lines, vertices } if vertices.len() == 6
        ));
    }
}
