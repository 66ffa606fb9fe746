//! Declarative scene host.
//!
//! Applications declare keyed [`Element`]s, each a drawable command with
//! its markers and mouse handlers, and forward window input. [`Worldview`]
//! reconciles the elements into draw and hitmap calls on a
//! [`WorldviewContext`](worldview_render::WorldviewContext), drives the
//! camera from input and dispatches picked objects to handlers.
//!
//! # Invariants
//! - Handlers see objects front to back; the global handler runs first.
//! - A panicking handler is logged and never stops the others.
//! - An element keeps its draw order for as long as its key is declared.

mod config;
mod element;
mod host;
mod scene;

pub use config::{ConfigWarning, WorldviewConfig};
pub use element::{ClickInfo, Element, MouseHandler, MouseHandlers, Propagation};
pub use host::{Dispatched, Worldview};
pub use scene::{CommandKind, ElementSpec, LoadedScene, SceneError, SceneFile};

pub fn crate_info() -> &'static str {
    "worldview v0.1.0"
}
