use crate::selectors::MemoizedSelectors;
use crate::state::CameraState;
use glam::{Mat4, Vec3, Vec4, Vec4Swizzles};
use worldview_common::Dimensions;

/// Visible rectangle of an orthographic camera, centered on the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthographicBounds {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub width: f32,
    pub height: f32,
}

/// Orthographic bounds for a camera at `distance` over a `width` x `height` viewport.
/// The visible height equals the distance (at least 1).
pub fn orthographic_bounds(distance: f32, width: f32, height: f32) -> OrthographicBounds {
    let aspect = width / height.max(f32::EPSILON);
    let zoom = distance.max(1.0);
    let left = -zoom / 2.0 * aspect;
    let right = zoom / 2.0 * aspect;
    let top = zoom / 2.0;
    let bottom = -zoom / 2.0;
    OrthographicBounds {
        left,
        right,
        top,
        bottom,
        width: left.abs() + right.abs(),
        height: top.abs() + bottom.abs(),
    }
}

/// Clip to window coordinates: `[x, y, depth, 1/w]` with depth in `0..=1`
/// and y measured from the bottom of the viewport.
pub fn project(point: Vec3, viewport: &Dimensions, proj_view: Mat4) -> Vec4 {
    let clip = proj_view * point.extend(1.0);
    let inv_w = if clip.w == 0.0 { 0.0 } else { 1.0 / clip.w };
    let ndc = clip.xyz() * inv_w;
    let half_w = viewport.width / 2.0;
    let half_h = viewport.height / 2.0;
    Vec4::new(
        viewport.left + half_w * ndc.x + half_w,
        viewport.top + half_h * ndc.y + half_h,
        0.5 * ndc.z + 0.5,
        inv_w,
    )
}

/// Matrices published to every draw call issued inside [`CameraCommand::draw`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraInfo {
    pub projection: Mat4,
    pub view: Mat4,
    pub billboard_rotation: Mat4,
    pub viewport: Dimensions,
    pub is_perspective: bool,
}

impl CameraInfo {
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Turns a [`CameraState`] and viewport into projection and view matrices.
#[derive(Debug, Default)]
pub struct CameraCommand {
    state: CameraState,
    viewport: Dimensions,
    selectors: MemoizedSelectors,
}

impl CameraCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    pub fn viewport(&self) -> Dimensions {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Dimensions) {
        self.viewport = viewport;
    }

    pub fn update(&mut self, state: &CameraState) {
        self.state = *state;
    }

    pub fn projection(&self) -> Mat4 {
        let s = &self.state;
        let Dimensions { width, height, .. } = self.viewport;
        if s.perspective {
            Mat4::perspective_rh_gl(s.fovy, width / height.max(f32::EPSILON), s.near, s.far)
        } else {
            let b = orthographic_bounds(s.distance, width, height);
            Mat4::orthographic_rh_gl(b.left, b.right, b.bottom, b.top, s.near, s.far)
        }
    }

    pub fn view(&self) -> Mat4 {
        self.selectors.view(&self.state)
    }

    pub fn info(&self) -> CameraInfo {
        CameraInfo {
            projection: self.projection(),
            view: self.view(),
            billboard_rotation: self.selectors.billboard_rotation(&self.state),
            viewport: self.viewport,
            is_perspective: self.state.perspective,
        }
    }

    /// Publish matrices for `state` to everything drawn inside `body`.
    pub fn draw<R>(
        &mut self,
        state: &CameraState,
        viewport: Dimensions,
        body: impl FnOnce(&CameraInfo) -> R,
    ) -> R {
        self.update(state);
        self.set_viewport(viewport);
        let info = self.info();
        body(&info)
    }

    /// Screen position `[x, y, depth]` of a world point, y measured from the top.
    /// `None` when the point is behind the camera or outside the depth range.
    pub fn to_screen_coord(&self, viewport: &Dimensions, point: Vec3) -> Option<Vec3> {
        let proj_view = self.projection() * self.view();
        let [x, y, z, inv_w] = project(point, viewport, proj_view).to_array();
        if !(0.0..=1.0).contains(&z) || inv_w < 0.0 {
            return None;
        }
        Some(Vec3::new(x, viewport.height - y, z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DEFAULT_CAMERA_STATE;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn looking_down_y() -> CameraCommand {
        let mut camera = CameraCommand::new();
        camera.update(&CameraState {
            phi: FRAC_PI_2,
            theta_offset: PI,
            ..DEFAULT_CAMERA_STATE
        });
        camera.set_viewport(Dimensions::new(300.0, 300.0));
        camera
    }

    #[test]
    fn bounds_follow_aspect() {
        let b = orthographic_bounds(10.0, 200.0, 100.0);
        assert_eq!(b.top, 5.0);
        assert_eq!(b.bottom, -5.0);
        assert_eq!(b.left, -10.0);
        assert_eq!(b.right, 10.0);
        assert_eq!(b.width, 20.0);
        assert_eq!(b.height, 10.0);
    }

    #[test]
    fn bounds_zoom_floor() {
        let b = orthographic_bounds(0.2, 100.0, 100.0);
        assert_eq!(b.height, 1.0);
    }

    #[test]
    fn target_projects_to_center() {
        let camera = looking_down_y();
        let vp = camera.viewport();
        let p = camera.to_screen_coord(&vp, Vec3::ZERO).unwrap();
        assert!((p.x - 150.0).abs() < 1e-2);
        assert!((p.y - 150.0).abs() < 1e-2);
        assert!(p.z > 0.0 && p.z < 1.0);
    }

    #[test]
    fn screen_y_grows_downward() {
        let camera = looking_down_y();
        let vp = camera.viewport();
        // camera up is +Z
        let above = camera.to_screen_coord(&vp, Vec3::new(0.0, 0.0, 5.0)).unwrap();
        assert!(above.y < 150.0);
    }

    #[test]
    fn behind_camera_is_hidden() {
        let camera = looking_down_y();
        let vp = camera.viewport();
        assert!(camera.to_screen_coord(&vp, Vec3::new(0.0, 200.0, 0.0)).is_none());
    }

    #[test]
    fn draw_publishes_matrices() {
        let mut camera = CameraCommand::new();
        let state = DEFAULT_CAMERA_STATE;
        let info = camera.draw(&state, Dimensions::new(640.0, 480.0), |info| *info);
        assert!(info.is_perspective);
        assert_eq!(info.view, crate::selectors::view(&state));
        assert_eq!(info.viewport.width, 640.0);
    }

    #[test]
    fn orthographic_projection_is_affine() {
        let mut camera = CameraCommand::new();
        camera.update(&CameraState {
            perspective: false,
            ..DEFAULT_CAMERA_STATE
        });
        camera.set_viewport(Dimensions::new(100.0, 100.0));
        let p = camera.projection();
        assert_eq!(p.w_axis.w, 1.0);
    }
}
