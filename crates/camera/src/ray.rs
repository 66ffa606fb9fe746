use crate::projection::CameraCommand;
use glam::{DVec3, Vec3};

/// World-space ray through a clicked pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Camera position.
    pub origin: Vec3,
    /// Unit direction away from the camera.
    pub dir: Vec3,
    /// Point on the ray at the near-middle depth of the clicked pixel.
    pub point: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3, point: Vec3) -> Self {
        Self { origin, dir, point }
    }

    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.origin.distance(point)
    }

    /// Intersection with the plane through `plane_coord` with normal
    /// `plane_normal`. `None` when the ray runs parallel to the plane.
    pub fn plane_intersection(&self, plane_coord: Vec3, plane_normal: Vec3) -> Option<Vec3> {
        let d = plane_normal.dot(plane_coord);
        let cosine = plane_normal.dot(self.dir);
        if cosine == 0.0 {
            return None;
        }
        let t = (d - plane_normal.dot(self.origin)) / cosine;
        Some(self.origin + self.dir * t)
    }
}

/// Ray under the canvas pixel `(x, y)` of a `width` x `height` canvas.
///
/// The unprojected point sits very close to the camera, so the inversion runs
/// in double precision.
pub fn ray_from_click(camera: &CameraCommand, x: f32, y: f32, width: f32, height: f32) -> Ray {
    let view = camera.view().as_dmat4();
    let inverse_proj_view = (camera.projection().as_dmat4() * view).inverse();
    let mouse_x = (2.0 * x as f64) / width as f64 - 1.0;
    let mouse_y = (-2.0 * y as f64) / height as f64 + 1.0;
    let point = inverse_proj_view.project_point3(DVec3::new(mouse_x, mouse_y, 0.0));
    let origin = view.inverse().transform_point3(DVec3::ZERO);
    let dir = (point - origin).normalize();
    Ray {
        origin: origin.as_vec3(),
        dir: dir.as_vec3(),
        point: point.as_vec3(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CameraState, DEFAULT_CAMERA_STATE};
    use std::f32::consts::{FRAC_PI_2, PI};
    use worldview_common::Dimensions;

    fn camera(state: CameraState) -> CameraCommand {
        let mut camera = CameraCommand::new();
        camera.update(&state);
        camera.set_viewport(Dimensions::new(300.0, 300.0));
        camera
    }

    #[test]
    fn center_click_looks_down_y() {
        let camera = camera(CameraState {
            phi: FRAC_PI_2,
            theta_offset: PI,
            ..DEFAULT_CAMERA_STATE
        });
        let ray = ray_from_click(&camera, 150.0, 150.0, 300.0, 300.0);
        assert!((ray.origin - Vec3::new(0.0, 75.0, 0.0)).length() < 1e-2);
        assert!((ray.dir - Vec3::new(0.0, -1.0, 0.0)).length() < 1e-3);
    }

    #[test]
    fn default_camera_center_hits_target() {
        let camera = camera(DEFAULT_CAMERA_STATE);
        let ray = ray_from_click(&camera, 150.0, 150.0, 300.0, 300.0);
        let hit = ray.plane_intersection(Vec3::ZERO, Vec3::Z).unwrap();
        assert!(hit.length() < 5e-2);
        assert!((ray.distance_to_point(hit) - 75.0).abs() < 5e-2);
    }

    #[test]
    fn off_center_click_moves_hit() {
        let camera = camera(DEFAULT_CAMERA_STATE);
        let ray = ray_from_click(&camera, 250.0, 150.0, 300.0, 300.0);
        let hit = ray.plane_intersection(Vec3::ZERO, Vec3::Z).unwrap();
        assert!(hit.x > 1.0);
    }

    #[test]
    fn parallel_plane_has_no_intersection() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X, Vec3::X);
        assert!(ray.plane_intersection(Vec3::new(0.0, 0.0, 5.0), Vec3::Z).is_none());
    }

    #[test]
    fn plane_behind_is_still_reported() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 10.0), Vec3::Z, Vec3::ZERO);
        let hit = ray.plane_intersection(Vec3::ZERO, Vec3::Z).unwrap();
        assert!(hit.length() < 1e-6);
    }
}
