use crate::state::{CameraState, MIN_DISTANCE, PartialCameraState};
use glam::{Quat, Vec3};
use std::f32::consts::PI;
use tracing::debug;

const PHI_MIN: f32 = 0.01;
const PHI_MAX: f32 = PI - 0.01;

/// Called with the new state after every camera mutation.
pub type CameraChangeHandler = Box<dyn FnMut(&CameraState)>;

/// Owns the current camera state and applies rotate/move/zoom mutations.
///
/// Every mutation that changes the state notifies the change handler. Mirroring
/// an externally controlled state with [`CameraStore::set_camera_state`] does not.
pub struct CameraStore {
    state: CameraState,
    on_change: Option<CameraChangeHandler>,
}

impl CameraStore {
    pub fn new(initial: CameraState) -> Self {
        Self {
            state: initial,
            on_change: None,
        }
    }

    pub fn from_partial(initial: &PartialCameraState) -> Self {
        Self::new(CameraState::from_partial(initial))
    }

    pub fn with_handler(initial: CameraState, handler: impl FnMut(&CameraState) + 'static) -> Self {
        Self {
            state: initial,
            on_change: Some(Box::new(handler)),
        }
    }

    pub fn set_handler(&mut self, handler: impl FnMut(&CameraState) + 'static) {
        self.on_change = Some(Box::new(handler));
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    /// Replace the whole state, backfilling omitted fields from the defaults.
    pub fn set_camera_state(&mut self, state: &PartialCameraState) {
        self.state = CameraState::from_partial(state);
    }

    /// Orbit: `x` turns around the target, `y` tilts. Tilt is clamped just short
    /// of the poles.
    pub fn camera_rotate(&mut self, [x, y]: [f32; 2]) {
        if x == 0.0 && y == 0.0 {
            return;
        }
        let s = self.state;
        let wanted = s.phi - y;
        let phi = wanted.clamp(PHI_MIN, PHI_MAX);
        if phi != wanted {
            debug!(wanted, phi, "camera tilt clamped");
        }
        self.commit(CameraState {
            theta_offset: s.theta_offset - x,
            phi,
            ..s
        });
    }

    /// Pan in the camera's yaw-rotated ground plane.
    pub fn camera_move(&mut self, [x, y]: [f32; 2]) {
        if x == 0.0 && y == 0.0 {
            return;
        }
        let s = self.state;
        let rotation = Quat::from_axis_angle(Vec3::NEG_Z, s.theta_offset);
        let delta = rotation * Vec3::new(x, y, 0.0);
        self.commit(CameraState {
            target_offset: s.target_offset + delta,
            ..s
        });
    }

    /// Move toward the target by `percentage` of the current distance.
    /// Negative values zoom out.
    pub fn camera_zoom(&mut self, percentage: f32) {
        let distance = self.state.distance;
        let wanted = distance * (1.0 - percentage / 100.0);
        let next = wanted.max(MIN_DISTANCE);
        if next != wanted {
            debug!(wanted, distance = next, "camera zoom clamped at minimum distance");
        }
        if next == distance {
            return;
        }
        let s = self.state;
        self.commit(CameraState {
            distance: next,
            ..s
        });
    }

    fn commit(&mut self, next: CameraState) {
        self.state = next;
        if let Some(handler) = self.on_change.as_mut() {
            handler(&self.state);
        }
    }
}

impl Default for CameraStore {
    fn default() -> Self {
        Self::new(CameraState::default())
    }
}

impl std::fmt::Debug for CameraStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraStore")
            .field("state", &self.state)
            .field("has_handler", &self.on_change.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selectors;
    use crate::state::DEFAULT_CAMERA_STATE;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn distance_to_target(store: &CameraStore) -> f32 {
        selectors::position(store.state()).distance(store.state().target)
    }

    #[test]
    fn zoom_in_by_percentage() {
        let mut store = CameraStore::default();
        store.camera_zoom(10.0);
        assert!((store.state().distance - 67.5).abs() < 1e-4);
        assert!((distance_to_target(&store) - 67.5).abs() < 1e-3);
    }

    #[test]
    fn zoom_out_by_percentage() {
        let mut store = CameraStore::default();
        store.camera_zoom(-30.0);
        assert!((store.state().distance - 97.5).abs() < 1e-4);
    }

    #[test]
    fn zoom_never_reaches_zero() {
        let mut store = CameraStore::default();
        for _ in 0..1000 {
            store.camera_zoom(100.0);
        }
        let d = store.state().distance;
        assert!(d > 0.0 && d <= MIN_DISTANCE);

        store.camera_zoom(-10.0);
        assert!(store.state().distance > d);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn captured_logs(f: impl FnOnce()) -> String {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn clamping_is_logged() {
        let logs = captured_logs(|| {
            let mut store = CameraStore::default();
            store.camera_zoom(100.0);
            assert_eq!(store.state().distance, MIN_DISTANCE);
            store.camera_rotate([0.0, 10.0]);
            assert_eq!(store.state().phi, PHI_MIN);
        });
        assert!(logs.contains("camera zoom clamped"), "{logs}");
        assert!(logs.contains("camera tilt clamped"), "{logs}");

        let quiet = captured_logs(|| CameraStore::default().camera_zoom(10.0));
        assert!(!quiet.contains("clamped"), "{quiet}");
    }

    #[test]
    fn zoom_is_monotonic() {
        let mut store = CameraStore::default();
        let mut last = store.state().distance;
        for _ in 0..50 {
            store.camera_zoom(20.0);
            let d = store.state().distance;
            assert!(d < last || d == MIN_DISTANCE);
            assert!(d > 0.0);
            last = d;
        }
    }

    #[test]
    fn move_accumulates_target_offset() {
        let mut store = CameraStore::default();
        store.camera_move([2.0, 1.0]);
        assert_eq!(store.state().target, Vec3::ZERO);
        assert!((store.state().target_offset - Vec3::new(2.0, 1.0, 0.0)).length() < 1e-5);
        store.camera_move([1.0, 1.0]);
        assert!((store.state().target_offset - Vec3::new(3.0, 2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn move_follows_camera_yaw() {
        let mut store = CameraStore::new(CameraState {
            theta_offset: std::f32::consts::FRAC_PI_2,
            ..DEFAULT_CAMERA_STATE
        });
        store.camera_move([1.0, 0.0]);
        assert!((store.state().target_offset - Vec3::new(0.0, -1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn rotate_clamps_phi() {
        let mut store = CameraStore::default();
        store.camera_rotate([0.5, 10.0]);
        assert_eq!(store.state().phi, PHI_MIN);
        assert!((store.state().theta_offset + 0.5).abs() < 1e-6);
        store.camera_rotate([0.0, -10.0]);
        assert_eq!(store.state().phi, PHI_MAX);
    }

    #[test]
    fn set_camera_state_backfills_and_keeps_zero() {
        let mut store = CameraStore::default();
        store.camera_move([2.0, 1.0]);
        store.set_camera_state(&PartialCameraState {
            near: Some(0.0),
            ..Default::default()
        });
        assert_eq!(
            *store.state(),
            CameraState {
                near: 0.0,
                ..DEFAULT_CAMERA_STATE
            }
        );
    }

    #[test]
    fn handler_sees_changes_but_not_noops() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut store = CameraStore::with_handler(CameraState::default(), move |s| {
            sink.borrow_mut().push(s.distance);
        });
        store.camera_rotate([0.0, 0.0]);
        store.camera_move([0.0, 0.0]);
        store.camera_zoom(0.0);
        assert!(seen.borrow().is_empty());

        store.camera_zoom(10.0);
        store.set_camera_state(&PartialCameraState::default());
        assert_eq!(seen.borrow().len(), 1);
    }
}
