use serde::{Deserialize, Serialize};
use tracing::warn;
use worldview_camera::PartialCameraState;
use worldview_common::Color;
use worldview_input::{KeyMap, MouseEventKind};
use worldview_render::DEFAULT_MAX_STACKED_OBJECTS;

fn default_background() -> Color {
    Color::BLACK
}

fn default_max_stacked() -> usize {
    DEFAULT_MAX_STACKED_OBJECTS
}

fn default_disabled_events() -> Vec<MouseEventKind> {
    vec![MouseEventKind::MouseMove]
}

fn default_true() -> bool {
    true
}

fn default_resolution_scale() -> f32 {
    1.0
}

/// Host settings. Every field has a default, so an empty document is a
/// valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldviewConfig {
    #[serde(default = "default_background")]
    pub background: Color,
    /// Controlled camera: the application owns the state and feeds every
    /// change back through `Worldview::set_camera_state`.
    pub camera_state: Option<PartialCameraState>,
    /// Initial state of an uncontrolled camera.
    pub default_camera_state: Option<PartialCameraState>,
    /// Report every object under the pointer, front to back, instead of only
    /// the nearest.
    pub enable_stacked_object_events: bool,
    #[serde(default = "default_max_stacked")]
    pub max_stacked_object_count: usize,
    /// Events dispatched without reading the hitmap; their handlers get a
    /// ray but no objects.
    #[serde(default = "default_disabled_events")]
    pub disable_hitmap_for_events: Vec<MouseEventKind>,
    /// When false, keys pressed with shift do not move the camera.
    #[serde(default = "default_true")]
    pub shift_keys: bool,
    pub key_map: KeyMap,
    pub show_debug: bool,
    /// Canvas pixels per layout pixel.
    #[serde(default = "default_resolution_scale")]
    pub resolution_scale: f32,
}

impl Default for WorldviewConfig {
    fn default() -> Self {
        Self {
            background: default_background(),
            camera_state: None,
            default_camera_state: None,
            enable_stacked_object_events: false,
            max_stacked_object_count: default_max_stacked(),
            disable_hitmap_for_events: default_disabled_events(),
            shift_keys: true,
            key_map: KeyMap::default(),
            show_debug: false,
            resolution_scale: default_resolution_scale(),
        }
    }
}

/// Configuration mistakes worth a warning. None of them stop the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigWarning {
    /// Both `camera_state` and `default_camera_state` were given; the
    /// controlled state wins.
    MixedCameraProps,
    /// A controlled camera without a change handler never moves.
    FixedCamera,
    ZeroStackedCount,
    NonPositiveResolutionScale,
}

impl WorldviewConfig {
    /// Check for misuse, logging each finding.
    pub fn validate(&self, has_camera_handler: bool) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        if self.camera_state.is_some() && self.default_camera_state.is_some() {
            warn!("both camera_state and default_camera_state set; default_camera_state is ignored");
            warnings.push(ConfigWarning::MixedCameraProps);
        }
        if self.camera_state.is_some() && !has_camera_handler {
            warn!("camera_state set without a change handler; camera input is disabled");
            warnings.push(ConfigWarning::FixedCamera);
        }
        if self.enable_stacked_object_events && self.max_stacked_object_count == 0 {
            warn!("stacked object events enabled with max_stacked_object_count 0; nothing will be picked");
            warnings.push(ConfigWarning::ZeroStackedCount);
        }
        if self.resolution_scale <= 0.0 {
            warn!(scale = self.resolution_scale, "resolution_scale must be positive; using 1");
            warnings.push(ConfigWarning::NonPositiveResolutionScale);
        }
        warnings
    }

    /// Camera the host starts with: the controlled state, else the default
    /// state, else the built-in default.
    pub fn initial_camera_state(&self) -> PartialCameraState {
        self.camera_state
            .or(self.default_camera_state)
            .unwrap_or_default()
    }

    pub fn effective_resolution_scale(&self) -> f32 {
        if self.resolution_scale > 0.0 {
            self.resolution_scale
        } else {
            1.0
        }
    }

    pub fn hitmap_disabled_for(&self, kind: MouseEventKind) -> bool {
        self.disable_hitmap_for_events.contains(&kind)
    }
}
