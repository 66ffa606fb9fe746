use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::NONE
        }
    }

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::NONE
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    Other(u16),
}

/// What happened to the pointer. Names match the handler a worldview host
/// dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MouseEventKind {
    #[serde(rename = "onClick")]
    Click,
    #[serde(rename = "onDoubleClick")]
    DoubleClick,
    #[serde(rename = "onMouseDown")]
    MouseDown,
    #[serde(rename = "onMouseMove")]
    MouseMove,
    #[serde(rename = "onMouseUp")]
    MouseUp,
}

/// Pointer event in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseEvent {
    pub kind: MouseEventKind,
    pub button: MouseButton,
    pub client_x: f32,
    pub client_y: f32,
    pub modifiers: Modifiers,
}

impl MouseEvent {
    pub fn new(kind: MouseEventKind, button: MouseButton, client_x: f32, client_y: f32) -> Self {
        Self {
            kind,
            button,
            client_x,
            client_y,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Key event; `code` names the physical key (`"KeyW"`, `"ShiftLeft"`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEvent {
    pub code: String,
    pub repeat: bool,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            repeat: false,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn repeated(mut self) -> Self {
        self.repeat = true;
        self
    }
}

/// Unit of a wheel delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeltaMode {
    #[default]
    Pixel,
    Line,
    Page,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelEvent {
    pub delta_x: f32,
    pub delta_y: f32,
    pub delta_mode: DeltaMode,
    pub modifiers: Modifiers,
}

impl WheelEvent {
    /// A wheel event measured in pixels.
    pub fn new(delta_x: f32, delta_y: f32) -> Self {
        Self {
            delta_x,
            delta_y,
            delta_mode: DeltaMode::Pixel,
            modifiers: Modifiers::NONE,
        }
    }
}

const LINE_HEIGHT: f32 = 40.0;
const PAGE_HEIGHT: f32 = 800.0;

/// Wheel delta in pixels, whatever unit the device reported.
pub fn normalize_wheel(event: &WheelEvent) -> (f32, f32) {
    let scale = match event.delta_mode {
        DeltaMode::Pixel => 1.0,
        DeltaMode::Line => LINE_HEIGHT,
        DeltaMode::Page => PAGE_HEIGHT,
    };
    (event.delta_x * scale, event.delta_y * scale)
}
