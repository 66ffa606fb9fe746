//! Interaction controller: turns pointer, keyboard and wheel input into camera
//! mutations, and tells clicks from drags.
//!
//! # Invariants
//! - The listener only mutates the camera through `CameraStore`.
//! - Held keys move the camera in proportion to elapsed frame time, never per
//!   key event.
//! - Focus loss clears every held key and modifier.

mod action;
mod click;
mod event;
mod listener;

pub use action::{CameraAction, DEFAULT_BINDINGS, KeyMap};
pub use click::{CLICK_DISTANCE, ClickTracker};
pub use event::{
    DeltaMode, KeyEvent, Modifiers, MouseButton, MouseEvent, MouseEventKind, WheelEvent,
    normalize_wheel,
};
pub use listener::{
    CameraListener, FINE_FACTOR, KEYBOARD_MOVE_SPEED, KEYBOARD_SPIN_SPEED, KEYBOARD_ZOOM_SPEED,
    KeyOutcome, MOUSE_ZOOM_SPEED, PAN_SPEED,
};

pub fn crate_info() -> &'static str {
    "worldview-input v0.1.0"
}
