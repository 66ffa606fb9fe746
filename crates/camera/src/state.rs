use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_4;

/// Smallest distance zooming can reach.
pub const MIN_DISTANCE: f32 = 0.001;

/// Complete camera record. Replaced wholesale on every update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    /// Distance from the camera to `target + target_offset`.
    pub distance: f32,
    /// Perspective when true, top-down orthographic otherwise.
    pub perspective: bool,
    /// Polar angle in radians. Ignored in orthographic mode.
    pub phi: f32,
    /// Azimuthal angle in radians.
    pub theta_offset: f32,
    /// World-space focus point.
    pub target: Vec3,
    /// Pan offset in the target's yaw-rotated frame.
    pub target_offset: Vec3,
    /// Orientation of the target frame; only its yaw is used.
    pub target_orientation: Quat,
    pub fovy: f32,
    pub near: f32,
    pub far: f32,
}

pub const DEFAULT_CAMERA_STATE: CameraState = CameraState {
    distance: 75.0,
    perspective: true,
    phi: FRAC_PI_4,
    theta_offset: 0.0,
    target: Vec3::ZERO,
    target_offset: Vec3::ZERO,
    target_orientation: Quat::IDENTITY,
    fovy: FRAC_PI_4,
    near: 0.01,
    far: 5000.0,
};

impl Default for CameraState {
    fn default() -> Self {
        DEFAULT_CAMERA_STATE
    }
}

/// Camera record where any field may be omitted.
///
/// This is the shape applications supply as `camera_state` or
/// `default_camera_state`; omitted fields come from `DEFAULT_CAMERA_STATE`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialCameraState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perspective: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phi: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theta_offset: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_offset: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_orientation: Option<Quat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fovy: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub near: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub far: Option<f32>,
}

impl CameraState {
    /// Fill every omitted field of `partial` from the defaults.
    pub fn from_partial(partial: &PartialCameraState) -> Self {
        let d = DEFAULT_CAMERA_STATE;
        Self {
            distance: partial.distance.unwrap_or(d.distance),
            perspective: partial.perspective.unwrap_or(d.perspective),
            phi: partial.phi.unwrap_or(d.phi),
            theta_offset: partial.theta_offset.unwrap_or(d.theta_offset),
            target: partial.target.unwrap_or(d.target),
            target_offset: partial.target_offset.unwrap_or(d.target_offset),
            target_orientation: partial.target_orientation.unwrap_or(d.target_orientation),
            fovy: partial.fovy.unwrap_or(d.fovy),
            near: partial.near.unwrap_or(d.near),
            far: partial.far.unwrap_or(d.far),
        }
    }
}

impl From<PartialCameraState> for CameraState {
    fn from(partial: PartialCameraState) -> Self {
        Self::from_partial(&partial)
    }
}

impl From<CameraState> for PartialCameraState {
    fn from(s: CameraState) -> Self {
        Self {
            distance: Some(s.distance),
            perspective: Some(s.perspective),
            phi: Some(s.phi),
            theta_offset: Some(s.theta_offset),
            target: Some(s.target),
            target_offset: Some(s.target_offset),
            target_orientation: Some(s.target_orientation),
            fovy: Some(s.fovy),
            near: Some(s.near),
            far: Some(s.far),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backfills_from_defaults() {
        let partial = PartialCameraState {
            near: Some(10.0),
            ..Default::default()
        };
        let state = CameraState::from_partial(&partial);
        assert_eq!(
            state,
            CameraState {
                near: 10.0,
                ..DEFAULT_CAMERA_STATE
            }
        );
    }

    #[test]
    fn explicit_nulls_are_backfilled() {
        let partial: PartialCameraState =
            serde_json::from_str(r#"{ "near": 10.0, "distance": null, "target": null }"#).unwrap();
        let state = CameraState::from(partial);
        assert_eq!(state.distance, 75.0);
        assert_eq!(state.target, Vec3::ZERO);
        assert_eq!(state.near, 10.0);
    }

    #[test]
    fn explicit_zero_is_kept() {
        let partial = PartialCameraState {
            phi: Some(0.0),
            ..Default::default()
        };
        assert_eq!(CameraState::from_partial(&partial).phi, 0.0);
    }

    #[test]
    fn backfill_is_idempotent() {
        let once = CameraState::from_partial(&PartialCameraState {
            distance: Some(12.0),
            ..Default::default()
        });
        let twice = CameraState::from_partial(&PartialCameraState::from(once));
        assert_eq!(once, twice);
    }
}
