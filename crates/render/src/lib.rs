//! Renderer-agnostic engine: draw and hitmap dispatch, object picking and
//! paint scheduling over the [`Gpu`] backend trait.
//!
//! # Invariants
//! - Markers are never mutated; hitmap passes draw recolored copies.
//! - Hitmap ID 0 is the background and never names an object.
//! - At most one paint is pending at any time.
//!
//! [`HeadlessGpu`] answers pixel reads by ray casting against the recorded
//! draws, so picking works without a GPU.

mod command;
mod context;
mod error;
mod gpu;
mod headless;
mod hitmap;
pub mod hitmap_props;
mod scheduler;

pub use command::{
    ColoredVertex, CommandDefinition, DrawBatch, DrawContext, DrawableCommand, Instance,
    InstanceId, Primitive, Shape,
};
pub use context::{
    Counters, DEFAULT_MAX_STACKED_OBJECTS, DebugStats, DrawInput, HitmapHit, MAX_BUFFER_COUNT,
    PaintCallback, PaintCallbackId, PaintContext, WorldviewContext,
};
pub use error::{GpuError, WorldviewError};
pub use gpu::{Gpu, GpuStats, RenderTarget};
pub use headless::{HeadlessCommand, HeadlessGpu};
pub use hitmap::{
    HitmapCallback, HitmapObjectIdManager, MAX_OBJECT_ID, MouseEventObject, ObjectHitmapId,
    get_id_from_color, get_id_from_pixel, int_to_rgb,
};
pub use hitmap_props::AssignNextColors;
pub use scheduler::{DirtyFlag, PAINT_DEBOUNCE, PaintScheduler};

pub fn crate_info() -> &'static str {
    "worldview-render v0.1.0"
}
