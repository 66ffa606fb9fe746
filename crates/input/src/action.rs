use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A camera motion a key can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CameraAction {
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    ZoomIn,
    ZoomOut,
    RotateLeft,
    RotateRight,
    TiltUp,
    TiltDown,
}

/// Built-in bindings, by physical key code.
pub const DEFAULT_BINDINGS: [(&str, CameraAction); 10] = [
    ("KeyA", CameraAction::MoveLeft),
    ("KeyD", CameraAction::MoveRight),
    ("KeyE", CameraAction::RotateRight),
    ("KeyF", CameraAction::TiltUp),
    ("KeyQ", CameraAction::RotateLeft),
    ("KeyR", CameraAction::TiltDown),
    ("KeyS", CameraAction::MoveDown),
    ("KeyW", CameraAction::MoveUp),
    ("KeyX", CameraAction::ZoomOut),
    ("KeyZ", CameraAction::ZoomIn),
];

/// Per-key overrides on top of [`DEFAULT_BINDINGS`].
///
/// An override of `None` cancels the key: the camera ignores it and leaves
/// it to the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyMap {
    overrides: HashMap<String, Option<CameraAction>>,
}

impl KeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, code: impl Into<String>, action: CameraAction) -> &mut Self {
        self.overrides.insert(code.into(), Some(action));
        self
    }

    pub fn cancel(&mut self, code: impl Into<String>) -> &mut Self {
        self.overrides.insert(code.into(), None);
        self
    }

    pub fn is_cancelled(&self, code: &str) -> bool {
        matches!(self.overrides.get(code), Some(None))
    }

    /// Action for `code`: the override if there is one, else the default.
    pub fn action(&self, code: &str) -> Option<CameraAction> {
        if let Some(Some(action)) = self.overrides.get(code) {
            return Some(*action);
        }
        DEFAULT_BINDINGS
            .iter()
            .find(|(key, _)| *key == code)
            .map(|(_, action)| *action)
    }
}
