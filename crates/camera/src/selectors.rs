//! Pure derivations from a [`CameraState`].
//!
//! Coordinates are Z-up. The spherical parameterization has its poles on Y, so
//! [`position`] remaps `(x, y, z)` to `(-x, -z, y)`.

use crate::state::CameraState;
use glam::{Mat4, Quat, Vec3};
use std::cell::Cell;

/// Spherical to Cartesian with poles on the Y axis.
pub fn from_spherical(radius: f32, theta: f32, phi: f32) -> Vec3 {
    let sin_phi_radius = phi.sin() * radius;
    Vec3::new(
        sin_phi_radius * theta.sin(),
        phi.cos() * radius,
        sin_phi_radius * theta.cos(),
    )
}

/// Camera position relative to the offset target.
pub fn position(state: &CameraState) -> Vec3 {
    let p = from_spherical(state.distance, state.theta_offset, state.phi);
    Vec3::new(-p.x, -p.z, p.y)
}

/// Camera orientation. `phi` only tilts the camera in perspective mode.
pub fn orientation(state: &CameraState) -> Quat {
    let yaw = Quat::from_rotation_z(-state.theta_offset);
    if state.perspective {
        yaw * Quat::from_rotation_x(state.phi)
    } else {
        yaw
    }
}

/// Yaw of the target frame, ignoring pitch and roll.
pub fn target_heading(state: &CameraState) -> f32 {
    let forward = state.target_orientation * Vec3::X;
    -forward.y.atan2(forward.x)
}

/// World to camera transform.
///
/// Built by right-multiplication, so the steps apply to a point in reverse:
/// move the target to the origin, rotate it to face forward, remove the pan
/// offset, move the camera to the origin (perspective only), then undo the
/// camera orientation. Orthographic cameras pin Z at -2500 instead of using the
/// target height.
pub fn view(state: &CameraState) -> Mat4 {
    view_from_parts(
        state,
        orientation(state),
        position(state),
        target_heading(state),
    )
}

fn view_from_parts(state: &CameraState, orientation: Quat, position: Vec3, heading: f32) -> Mat4 {
    let mut m = Mat4::from_quat(orientation.inverse());
    if state.perspective {
        m *= Mat4::from_translation(-position);
    }
    m *= Mat4::from_translation(-state.target_offset);
    m *= Mat4::from_rotation_z(heading);
    let mut target = -state.target;
    if !state.perspective {
        target.z = -2500.0;
    }
    m * Mat4::from_translation(target)
}

/// Rotation that turns a quad to face the camera.
pub fn billboard_rotation(state: &CameraState) -> Mat4 {
    billboard_from_parts(orientation(state), target_heading(state))
}

fn billboard_from_parts(orientation: Quat, heading: f32) -> Mat4 {
    Mat4::from_rotation_z(-heading) * Mat4::from_quat(orientation)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PositionKey {
    distance: f32,
    theta_offset: f32,
    phi: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct OrientationKey {
    perspective: bool,
    theta_offset: f32,
    phi: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ViewKey {
    position: PositionKey,
    orientation: OrientationKey,
    heading: Quat,
    target: Vec3,
    target_offset: Vec3,
}

/// One-entry caches for each selector, keyed on exactly the fields it reads.
///
/// View matrices are requested once per draw call, so the cache turns those
/// lookups into comparisons while the camera is still.
#[derive(Debug, Default)]
pub struct MemoizedSelectors {
    position: Cell<Option<(PositionKey, Vec3)>>,
    orientation: Cell<Option<(OrientationKey, Quat)>>,
    heading: Cell<Option<(Quat, f32)>>,
    view: Cell<Option<(ViewKey, Mat4)>>,
    billboard: Cell<Option<((OrientationKey, Quat), Mat4)>>,
    recomputes: Cell<u64>,
}

fn memo<K: Copy + PartialEq, V: Copy>(
    cell: &Cell<Option<(K, V)>>,
    counter: &Cell<u64>,
    key: K,
    compute: impl FnOnce() -> V,
) -> V {
    if let Some((cached, value)) = cell.get() {
        if cached == key {
            return value;
        }
    }
    let value = compute();
    cell.set(Some((key, value)));
    counter.set(counter.get() + 1);
    value
}

impl MemoizedSelectors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self, state: &CameraState) -> Vec3 {
        let key = PositionKey {
            distance: state.distance,
            theta_offset: state.theta_offset,
            phi: state.phi,
        };
        memo(&self.position, &self.recomputes, key, || position(state))
    }

    pub fn orientation(&self, state: &CameraState) -> Quat {
        memo(
            &self.orientation,
            &self.recomputes,
            orientation_key(state),
            || orientation(state),
        )
    }

    pub fn target_heading(&self, state: &CameraState) -> f32 {
        memo(
            &self.heading,
            &self.recomputes,
            state.target_orientation,
            || target_heading(state),
        )
    }

    pub fn view(&self, state: &CameraState) -> Mat4 {
        let key = ViewKey {
            position: PositionKey {
                distance: state.distance,
                theta_offset: state.theta_offset,
                phi: state.phi,
            },
            orientation: orientation_key(state),
            heading: state.target_orientation,
            target: state.target,
            target_offset: state.target_offset,
        };
        memo(&self.view, &self.recomputes, key, || {
            view_from_parts(
                state,
                self.orientation(state),
                self.position(state),
                self.target_heading(state),
            )
        })
    }

    pub fn billboard_rotation(&self, state: &CameraState) -> Mat4 {
        let key = (orientation_key(state), state.target_orientation);
        memo(&self.billboard, &self.recomputes, key, || {
            billboard_from_parts(self.orientation(state), self.target_heading(state))
        })
    }

    /// Number of cache misses so far, across all selectors.
    pub fn recompute_count(&self) -> u64 {
        self.recomputes.get()
    }
}

fn orientation_key(state: &CameraState) -> OrientationKey {
    OrientationKey {
        perspective: state.perspective,
        theta_offset: state.theta_offset,
        phi: state.phi,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DEFAULT_CAMERA_STATE;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-3
    }

    #[test]
    fn position_looking_down_y() {
        let state = CameraState {
            phi: FRAC_PI_2,
            theta_offset: PI,
            ..DEFAULT_CAMERA_STATE
        };
        assert!(approx(position(&state), Vec3::new(0.0, 75.0, 0.0)));
    }

    #[test]
    fn default_position_is_above_and_behind() {
        let p = position(&DEFAULT_CAMERA_STATE);
        let d = 75.0 * std::f32::consts::FRAC_1_SQRT_2;
        assert!(approx(p, Vec3::new(0.0, -d, d)));
    }

    #[test]
    fn orthographic_orientation_ignores_phi() {
        let a = CameraState {
            perspective: false,
            phi: 0.3,
            ..DEFAULT_CAMERA_STATE
        };
        let b = CameraState { phi: 1.2, ..a };
        assert_eq!(orientation(&a), orientation(&b));
    }

    #[test]
    fn heading_from_target_yaw() {
        let state = CameraState {
            target_orientation: Quat::from_rotation_z(0.5),
            ..DEFAULT_CAMERA_STATE
        };
        assert!((target_heading(&state) + 0.5).abs() < 1e-5);
        assert_eq!(target_heading(&DEFAULT_CAMERA_STATE), 0.0);
    }

    #[test]
    fn view_maps_target_in_front_of_camera() {
        let state = CameraState {
            target: Vec3::new(10.0, -4.0, 2.0),
            ..DEFAULT_CAMERA_STATE
        };
        let p = view(&state).transform_point3(state.target);
        assert!(approx(p, Vec3::new(0.0, 0.0, -75.0)));
    }

    #[test]
    fn orthographic_view_pins_depth() {
        let state = CameraState {
            perspective: false,
            target: Vec3::new(1.0, 2.0, 30.0),
            ..DEFAULT_CAMERA_STATE
        };
        let p = view(&state).transform_point3(Vec3::new(1.0, 2.0, 0.0));
        assert!(approx(p, Vec3::new(0.0, 0.0, -2500.0)));
    }

    #[test]
    fn orthographic_view_matrix() {
        let state = CameraState {
            theta_offset: FRAC_PI_2,
            phi: 0.0,
            distance: 56.0,
            perspective: false,
            ..DEFAULT_CAMERA_STATE
        };
        let expected = Mat4::from_cols_array(&[
            0.0, 1.0, 0.0, 0.0, //
            -1.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, -2500.0, 1.0,
        ]);
        assert!(view(&state).abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn target_offset_follows_target_yaw() {
        let base = CameraState {
            theta_offset: 0.0,
            phi: 0.0,
            distance: 3.0,
            target: Vec3::new(2.0, 0.0, 0.0),
            target_offset: Vec3::new(25.0, 0.0, 0.0),
            ..DEFAULT_CAMERA_STATE
        };
        let v = view(&base);
        assert!(approx(v.transform_point3(Vec3::new(2.0, 0.0, 0.0)), Vec3::new(-25.0, 0.0, -3.0)));
        assert!(approx(v.transform_point3(Vec3::new(27.0, 0.0, 0.0)), Vec3::new(0.0, 0.0, -3.0)));

        let turned = CameraState {
            target_orientation: Quat::from_rotation_z(FRAC_PI_2),
            ..base
        };
        let v = view(&turned);
        assert!(approx(v.transform_point3(Vec3::new(2.0, 0.0, 0.0)), Vec3::new(-25.0, 0.0, -3.0)));
        assert!(approx(v.transform_point3(Vec3::new(2.0, 25.0, 0.0)), Vec3::new(0.0, 0.0, -3.0)));
    }

    #[test]
    fn billboard_faces_camera() {
        let state = CameraState {
            phi: FRAC_PI_2,
            theta_offset: PI,
            ..DEFAULT_CAMERA_STATE
        };
        // a billboard's +Z normal points back at the camera
        let normal = billboard_rotation(&state).transform_vector3(Vec3::Z);
        assert!(approx(normal, Vec3::new(0.0, 1.0, 0.0)));
    }

    #[test]
    fn memoized_matches_pure() {
        let memo = MemoizedSelectors::new();
        let state = CameraState {
            theta_offset: 0.7,
            target_offset: Vec3::new(3.0, 1.0, 0.0),
            ..DEFAULT_CAMERA_STATE
        };
        assert_eq!(memo.view(&state), view(&state));
        assert_eq!(memo.position(&state), position(&state));
        assert_eq!(memo.billboard_rotation(&state), billboard_rotation(&state));
    }

    #[test]
    fn memoized_recomputes_only_on_relevant_change() {
        let memo = MemoizedSelectors::new();
        let state = DEFAULT_CAMERA_STATE;
        memo.view(&state);
        let after_first = memo.recompute_count();
        memo.view(&state);
        assert_eq!(memo.recompute_count(), after_first);

        // projection parameters are not read by the view
        let zoomed_lens = CameraState {
            fovy: 1.0,
            near: 1.0,
            ..state
        };
        memo.view(&zoomed_lens);
        assert_eq!(memo.recompute_count(), after_first);

        let moved = CameraState {
            target: Vec3::X,
            ..state
        };
        memo.view(&moved);
        assert!(memo.recompute_count() > after_first);
    }
}
