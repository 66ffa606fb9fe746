use crate::action::{CameraAction, KeyMap};
use crate::event::{KeyEvent, MouseButton, MouseEvent, WheelEvent, normalize_wheel};
use glam::Vec2;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;
use worldview_camera::{CameraStore, orthographic_bounds};
use worldview_common::Dimensions;

pub const PAN_SPEED: f32 = 4.0;
pub const MOUSE_ZOOM_SPEED: f32 = 0.3;
pub const KEYBOARD_MOVE_SPEED: f32 = 0.3;
pub const KEYBOARD_ZOOM_SPEED: f32 = 150.0;
pub const KEYBOARD_SPIN_SPEED: f32 = 1.5;
/// Multiplier applied to every magnitude while shift is held.
pub const FINE_FACTOR: f32 = 0.5;

/// What the listener did with a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// The camera handles this key; hosts should not act on it again.
    Consumed,
    /// Not a camera key, or a modifier chord the camera leaves alone.
    Ignored,
    /// Bound to nothing by an explicit override.
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct KeyMotion {
    x: f32,
    y: f32,
    zoom: f32,
    yaw: f32,
    tilt: f32,
}

/// Translates raw pointer, keyboard and wheel input into [`CameraStore`]
/// mutations.
///
/// Held keys move the camera continuously: the host calls
/// [`CameraListener::on_frame`] once per animation frame while
/// [`CameraListener::is_animating`] is true, and motion is scaled by the time
/// elapsed since the previous frame.
#[derive(Debug)]
pub struct CameraListener {
    key_map: KeyMap,
    shift_keys: bool,
    rect: Dimensions,
    buttons: HashSet<MouseButton>,
    initial_mouse: Vec2,
    keys: BTreeSet<String>,
    shift: bool,
    ctrl: bool,
    last_frame_ms: Option<f64>,
    animating: bool,
}

impl Default for CameraListener {
    fn default() -> Self {
        Self::new(KeyMap::default(), true)
    }
}

impl CameraListener {
    /// `shift_keys = false` makes the camera ignore keys pressed with shift.
    pub fn new(key_map: KeyMap, shift_keys: bool) -> Self {
        Self {
            key_map,
            shift_keys,
            rect: Dimensions::new(1.0, 1.0),
            buttons: HashSet::new(),
            initial_mouse: Vec2::ZERO,
            keys: BTreeSet::new(),
            shift: false,
            ctrl: false,
            last_frame_ms: None,
            animating: false,
        }
    }

    pub fn key_map(&self) -> &KeyMap {
        &self.key_map
    }

    pub fn set_key_map(&mut self, key_map: KeyMap) {
        self.key_map = key_map;
    }

    pub fn set_shift_keys(&mut self, shift_keys: bool) {
        self.shift_keys = shift_keys;
    }

    /// Client-space rectangle of the element receiving events.
    pub fn set_rect(&mut self, rect: Dimensions) {
        self.rect = rect;
    }

    pub fn is_dragging(&self) -> bool {
        !self.buttons.is_empty()
    }

    pub fn is_animating(&self) -> bool {
        self.animating
    }

    fn magnitude(&self, base: f32) -> f32 {
        if self.shift { base * FINE_FACTOR } else { base }
    }

    fn mouse_on_screen(&self, event: &MouseEvent) -> Vec2 {
        Vec2::new(
            (event.client_x - self.rect.left) / self.rect.width.max(f32::EPSILON),
            (event.client_y - self.rect.top) / self.rect.height.max(f32::EPSILON),
        )
    }

    /// World-units per unit of normalized screen motion.
    fn move_magnitude(&self, store: &CameraStore) -> Vec2 {
        if self.ctrl {
            return Vec2::ZERO;
        }
        let state = store.state();
        if state.perspective {
            return Vec2::splat(state.distance);
        }
        let bounds = orthographic_bounds(state.distance, self.rect.width, self.rect.height);
        Vec2::new(bounds.width, bounds.height)
    }

    pub fn on_mouse_down(&mut self, event: &MouseEvent) {
        self.initial_mouse = self.mouse_on_screen(event);
        self.buttons.insert(event.button);
        self.shift = event.modifiers.shift;
    }

    /// Drags the camera while any button is held. Returns whether the event
    /// was used.
    pub fn on_mouse_move(&mut self, event: &MouseEvent, store: &mut CameraStore) -> bool {
        if self.buttons.is_empty() {
            return false;
        }
        self.shift = event.modifiers.shift;
        let mouse = self.mouse_on_screen(event);
        let delta = self.initial_mouse - mouse;
        self.initial_mouse = mouse;

        let perspective = store.state().perspective;
        if self.buttons.contains(&MouseButton::Right) {
            let speed = self.magnitude(PAN_SPEED);
            let x = if perspective { delta.x } else { -delta.x };
            let y = if perspective { delta.y * speed } else { 0.0 };
            store.camera_rotate([x * speed, y]);
        }
        if self.buttons.contains(&MouseButton::Left) {
            let magnitude = self.move_magnitude(store);
            store.camera_move([
                self.magnitude(delta.x * magnitude.x),
                self.magnitude(-delta.y * magnitude.y),
            ]);
        }
        true
    }

    pub fn on_mouse_up(&mut self, event: &MouseEvent) {
        self.buttons.remove(&event.button);
    }

    /// A mouseup seen at window level. Releases outside the element would
    /// otherwise leave the drag stuck.
    pub fn on_window_mouse_up(&mut self, inside_element: bool) {
        if !inside_element {
            self.buttons.clear();
        }
    }

    fn key_motion(&self, code: &str) -> Option<KeyMotion> {
        let action = self.key_map.action(code)?;
        if self.shift && !self.shift_keys {
            return None;
        }
        let movement = self.magnitude(KEYBOARD_MOVE_SPEED);
        let zoom = self.magnitude(KEYBOARD_ZOOM_SPEED);
        let spin = self.magnitude(KEYBOARD_SPIN_SPEED);
        let none = KeyMotion::default();
        Some(match action {
            CameraAction::MoveRight => KeyMotion { x: movement, ..none },
            CameraAction::MoveLeft => KeyMotion { x: -movement, ..none },
            CameraAction::MoveUp => KeyMotion { y: movement, ..none },
            CameraAction::MoveDown => KeyMotion { y: -movement, ..none },
            CameraAction::ZoomIn => KeyMotion { zoom, ..none },
            CameraAction::ZoomOut => KeyMotion { zoom: -zoom, ..none },
            CameraAction::RotateLeft => KeyMotion { yaw: -spin, ..none },
            CameraAction::RotateRight => KeyMotion { yaw: spin, ..none },
            CameraAction::TiltUp => KeyMotion { tilt: -spin, ..none },
            CameraAction::TiltDown => KeyMotion { tilt: spin, ..none },
        })
    }

    pub fn on_key_down(&mut self, event: &KeyEvent) -> KeyOutcome {
        self.shift = event.modifiers.shift;
        self.ctrl = event.modifiers.ctrl;

        if event.repeat || self.keys.contains(&event.code) {
            return KeyOutcome::Consumed;
        }
        if event.modifiers.alt || event.modifiers.ctrl || event.modifiers.meta {
            return KeyOutcome::Ignored;
        }
        if self.key_map.is_cancelled(&event.code) {
            return KeyOutcome::Cancelled;
        }
        if self.key_motion(&event.code).is_none() {
            return KeyOutcome::Ignored;
        }
        debug!(code = %event.code, "camera key held");
        self.keys.insert(event.code.clone());
        self.animating = true;
        KeyOutcome::Consumed
    }

    pub fn on_key_up(&mut self, event: &KeyEvent) {
        self.shift = event.modifiers.shift;
        self.ctrl = event.modifiers.ctrl;
        self.keys.remove(&event.code);
    }

    /// Advance held-key motion to `timestamp_ms`. The first frame after a
    /// key goes down has zero elapsed time. Returns whether another frame
    /// is wanted.
    pub fn on_frame(&mut self, timestamp_ms: f64, store: &mut CameraStore) -> bool {
        if !self.animating {
            return false;
        }
        let dt = match self.last_frame_ms {
            Some(last) => ((timestamp_ms - last) / 1000.0) as f32,
            None => 0.0,
        };
        self.move_keyboard(dt, store);
        if self.keys.is_empty() {
            self.stop_animation();
            return false;
        }
        self.last_frame_ms = Some(timestamp_ms);
        true
    }

    fn move_keyboard(&self, dt: f32, store: &mut CameraStore) {
        let motion = self
            .keys
            .iter()
            .filter_map(|code| self.key_motion(code))
            .fold(KeyMotion::default(), |acc, m| KeyMotion {
                x: acc.x + m.x,
                y: acc.y + m.y,
                zoom: acc.zoom + m.zoom,
                yaw: acc.yaw + m.yaw,
                tilt: acc.tilt + m.tilt,
            });
        let perspective = store.state().perspective;
        if motion.x != 0.0 || motion.y != 0.0 {
            let magnitude = self.move_magnitude(store);
            store.camera_move([
                motion.x * magnitude.x * dt,
                motion.y * magnitude.y * dt,
            ]);
        }
        if motion.yaw != 0.0 || (perspective && motion.tilt != 0.0) {
            let tilt = if perspective { motion.tilt * dt } else { 0.0 };
            store.camera_rotate([motion.yaw * dt, tilt]);
        }
        if motion.zoom != 0.0 {
            store.camera_zoom(motion.zoom * dt);
        }
    }

    fn stop_animation(&mut self) {
        self.animating = false;
        self.last_frame_ms = None;
    }

    /// Zooms by the wheel delta. Returns whether the camera changed.
    pub fn on_wheel(&mut self, event: &WheelEvent, store: &mut CameraStore) -> bool {
        self.shift = event.modifiers.shift;
        let (pixel_x, pixel_y) = normalize_wheel(event);
        let amount = if pixel_y != 0.0 { pixel_y } else { pixel_x };
        if amount == 0.0 {
            return false;
        }
        let direction = -amount.signum();
        let percent = amount.abs().clamp(1.0, 50.0);
        let before = store.state().distance;
        store.camera_zoom(self.magnitude(percent * direction * MOUSE_ZOOM_SPEED));
        store.state().distance != before
    }

    /// Focus loss: forget held keys and modifiers so nothing stays stuck.
    pub fn on_blur(&mut self) {
        self.keys.clear();
        self.ctrl = false;
        self.shift = false;
        self.stop_animation();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DeltaMode, Modifiers, MouseEventKind};
    use glam::Vec3;
    use worldview_camera::{CameraState, DEFAULT_CAMERA_STATE};

    fn listener() -> CameraListener {
        let mut l = CameraListener::default();
        l.set_rect(Dimensions::new(100.0, 100.0));
        l
    }

    fn mouse(kind: MouseEventKind, button: MouseButton, x: f32, y: f32) -> MouseEvent {
        MouseEvent::new(kind, button, x, y)
    }

    fn wheel(delta_y: f32, modifiers: Modifiers) -> WheelEvent {
        WheelEvent {
            delta_x: 0.0,
            delta_y,
            delta_mode: DeltaMode::Pixel,
            modifiers,
        }
    }

    #[test]
    fn left_drag_pans_by_distance() {
        let mut l = listener();
        let mut store = CameraStore::default();
        l.on_mouse_down(&mouse(MouseEventKind::MouseDown, MouseButton::Left, 50.0, 50.0));
        assert!(l.on_mouse_move(
            &mouse(MouseEventKind::MouseMove, MouseButton::Left, 40.0, 50.0),
            &mut store
        ));
        // dragging right-to-left by 10% of the width pans +X by 10% of 75
        let offset = store.state().target_offset;
        assert!((offset - Vec3::new(7.5, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn move_without_button_is_ignored() {
        let mut l = listener();
        let mut store = CameraStore::default();
        assert!(!l.on_mouse_move(
            &mouse(MouseEventKind::MouseMove, MouseButton::Left, 10.0, 10.0),
            &mut store
        ));
        assert_eq!(*store.state(), DEFAULT_CAMERA_STATE);
    }

    #[test]
    fn shift_drag_is_fine() {
        let mut l = listener();
        let mut store = CameraStore::default();
        let down = mouse(MouseEventKind::MouseDown, MouseButton::Left, 50.0, 50.0)
            .with_modifiers(Modifiers::shift());
        l.on_mouse_down(&down);
        let moved = mouse(MouseEventKind::MouseMove, MouseButton::Left, 50.0, 40.0)
            .with_modifiers(Modifiers::shift());
        l.on_mouse_move(&moved, &mut store);
        let offset = store.state().target_offset;
        assert!((offset - Vec3::new(0.0, -3.75, 0.0)).length() < 1e-4);
    }

    #[test]
    fn orthographic_pan_uses_visible_area() {
        let mut l = CameraListener::default();
        l.set_rect(Dimensions::new(200.0, 100.0));
        let mut store = CameraStore::new(CameraState {
            perspective: false,
            distance: 10.0,
            ..DEFAULT_CAMERA_STATE
        });
        l.on_mouse_down(&mouse(MouseEventKind::MouseDown, MouseButton::Left, 100.0, 50.0));
        l.on_mouse_move(
            &mouse(MouseEventKind::MouseMove, MouseButton::Left, 80.0, 50.0),
            &mut store,
        );
        // 10% of a 20-unit-wide view
        assert!((store.state().target_offset.x - 2.0).abs() < 1e-4);
    }

    #[test]
    fn right_drag_rotates() {
        let mut l = listener();
        let mut store = CameraStore::default();
        l.on_mouse_down(&mouse(MouseEventKind::MouseDown, MouseButton::Right, 50.0, 50.0));
        l.on_mouse_move(
            &mouse(MouseEventKind::MouseMove, MouseButton::Right, 40.0, 45.0),
            &mut store,
        );
        let s = store.state();
        assert!((s.theta_offset + 0.4).abs() < 1e-5);
        assert!((s.phi - (DEFAULT_CAMERA_STATE.phi - 0.2)).abs() < 1e-5);
        assert_eq!(s.target_offset, Vec3::ZERO);
    }

    #[test]
    fn left_and_right_drag_rotates_and_pans() {
        let mut l = listener();
        let mut store = CameraStore::default();
        l.on_mouse_down(&mouse(MouseEventKind::MouseDown, MouseButton::Left, 50.0, 50.0));
        l.on_mouse_down(&mouse(MouseEventKind::MouseDown, MouseButton::Right, 50.0, 50.0));
        assert!(l.on_mouse_move(
            &mouse(MouseEventKind::MouseMove, MouseButton::Left, 40.0, 50.0),
            &mut store
        ));
        let s = store.state();
        assert!((s.theta_offset + 0.4).abs() < 1e-5);
        assert_ne!(s.target_offset, Vec3::ZERO);
        assert!((s.target_offset.length() - 7.5).abs() < 1e-4);
    }

    #[test]
    fn orthographic_rotation_has_no_tilt() {
        let mut l = listener();
        let mut store = CameraStore::new(CameraState {
            perspective: false,
            ..DEFAULT_CAMERA_STATE
        });
        l.on_mouse_down(&mouse(MouseEventKind::MouseDown, MouseButton::Right, 50.0, 50.0));
        l.on_mouse_move(
            &mouse(MouseEventKind::MouseMove, MouseButton::Right, 40.0, 30.0),
            &mut store,
        );
        assert!((store.state().theta_offset - 0.4).abs() < 1e-5);
        assert_eq!(store.state().phi, DEFAULT_CAMERA_STATE.phi);
    }

    #[test]
    fn ctrl_disables_panning() {
        let mut l = listener();
        let mut store = CameraStore::default();
        let ctrl = KeyEvent::new("ControlLeft").with_modifiers(Modifiers::ctrl());
        assert_eq!(l.on_key_down(&ctrl), KeyOutcome::Ignored);
        l.on_mouse_down(&mouse(MouseEventKind::MouseDown, MouseButton::Left, 50.0, 50.0));
        l.on_mouse_move(
            &mouse(MouseEventKind::MouseMove, MouseButton::Left, 10.0, 10.0),
            &mut store,
        );
        assert_eq!(store.state().target_offset, Vec3::ZERO);
    }

    #[test]
    fn window_mouse_up_outside_ends_drag() {
        let mut l = listener();
        l.on_mouse_down(&mouse(MouseEventKind::MouseDown, MouseButton::Left, 50.0, 50.0));
        l.on_mouse_down(&mouse(MouseEventKind::MouseDown, MouseButton::Right, 50.0, 50.0));
        l.on_window_mouse_up(true);
        assert!(l.is_dragging());
        l.on_window_mouse_up(false);
        assert!(!l.is_dragging());
    }

    #[test]
    fn held_key_moves_with_elapsed_time() {
        let mut l = listener();
        let mut store = CameraStore::default();
        assert_eq!(l.on_key_down(&KeyEvent::new("KeyW")), KeyOutcome::Consumed);
        assert!(l.is_animating());

        assert!(l.on_frame(1000.0, &mut store));
        assert_eq!(store.state().target_offset, Vec3::ZERO);

        assert!(l.on_frame(1500.0, &mut store));
        // 0.3 * 75 units per second for half a second
        assert!((store.state().target_offset.y - 11.25).abs() < 1e-3);

        l.on_key_up(&KeyEvent::new("KeyW"));
        assert!(!l.on_frame(1600.0, &mut store));
        assert!(!l.is_animating());
    }

    #[test]
    fn zoom_keys_scale_distance() {
        let mut l = listener();
        let mut store = CameraStore::default();
        l.on_key_down(&KeyEvent::new("KeyZ"));
        l.on_frame(0.0, &mut store);
        l.on_frame(100.0, &mut store);
        // 150% per second for 0.1 s
        assert!((store.state().distance - 75.0 * (1.0 - 0.15)).abs() < 1e-3);
    }

    #[test]
    fn repeats_and_chords_are_not_new_motion() {
        let mut l = listener();
        assert_eq!(l.on_key_down(&KeyEvent::new("KeyA")), KeyOutcome::Consumed);
        assert_eq!(l.on_key_down(&KeyEvent::new("KeyA").repeated()), KeyOutcome::Consumed);
        let chord = KeyEvent::new("KeyD").with_modifiers(Modifiers {
            alt: true,
            ..Modifiers::NONE
        });
        assert_eq!(l.on_key_down(&chord), KeyOutcome::Ignored);
        assert_eq!(l.on_key_down(&KeyEvent::new("Space")), KeyOutcome::Ignored);
    }

    #[test]
    fn cancelled_key_is_left_to_the_app() {
        let mut map = KeyMap::new();
        map.cancel("KeyW");
        let mut l = CameraListener::new(map, true);
        assert_eq!(l.on_key_down(&KeyEvent::new("KeyW")), KeyOutcome::Cancelled);
        assert!(!l.is_animating());
    }

    #[test]
    fn shift_keys_can_be_disabled() {
        let mut l = CameraListener::new(KeyMap::new(), false);
        let shifted = KeyEvent::new("KeyW").with_modifiers(Modifiers::shift());
        assert_eq!(l.on_key_down(&shifted), KeyOutcome::Ignored);
    }

    #[test]
    fn blur_stops_everything() {
        let mut l = listener();
        let mut store = CameraStore::default();
        l.on_key_down(&KeyEvent::new("KeyW").with_modifiers(Modifiers::shift()));
        l.on_blur();
        assert!(!l.is_animating());
        assert!(!l.on_frame(100.0, &mut store));
        assert_eq!(*store.state(), DEFAULT_CAMERA_STATE);
        assert_eq!(l.on_key_down(&KeyEvent::new("KeyW")), KeyOutcome::Consumed);
    }

    #[test]
    fn wheel_zooms_with_clamped_percentage() {
        let mut l = listener();
        let mut store = CameraStore::default();
        assert!(l.on_wheel(&wheel(-500.0, Modifiers::NONE), &mut store));
        // clamped to 50, scaled by 0.3 -> 15% closer
        assert!((store.state().distance - 63.75).abs() < 1e-3);

        let mut store = CameraStore::default();
        l.on_wheel(&wheel(0.5, Modifiers::NONE), &mut store);
        assert!((store.state().distance - 75.0 * 1.003).abs() < 1e-3);
    }

    #[test]
    fn shift_wheel_is_fine() {
        let mut l = listener();
        let mut store = CameraStore::default();
        l.on_wheel(&wheel(-10.0, Modifiers::shift()), &mut store);
        assert!((store.state().distance - 75.0 * (1.0 - 0.015)).abs() < 1e-3);
    }

    #[test]
    fn zero_wheel_does_nothing() {
        let mut l = listener();
        let mut store = CameraStore::default();
        assert!(!l.on_wheel(&wheel(0.0, Modifiers::NONE), &mut store));
    }
}
