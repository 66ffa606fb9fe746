//! Camera model for the worldview engine.
//!
//! The camera orbits a target: `distance`, `theta_offset` and `phi` place it on a
//! sphere around `target + target_offset`, and the target's yaw is tracked so the
//! camera follows a moving vehicle frame.
//!
//! # Invariants
//! - A `CameraState` is always fully defined; partial input is backfilled from
//!   `DEFAULT_CAMERA_STATE`.
//! - `distance` never drops below `MIN_DISTANCE`.
//! - Selectors are pure; the memoized variants only recompute when the fields
//!   they read change.

mod projection;
mod ray;
pub mod selectors;
mod state;
mod store;

pub use projection::{CameraCommand, CameraInfo, OrthographicBounds, orthographic_bounds, project};
pub use ray::{Ray, ray_from_click};
pub use selectors::MemoizedSelectors;
pub use state::{CameraState, DEFAULT_CAMERA_STATE, MIN_DISTANCE, PartialCameraState};
pub use store::{CameraChangeHandler, CameraStore};

pub fn crate_info() -> &'static str {
    "worldview-camera v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("camera"));
    }
}
