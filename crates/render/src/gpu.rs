use crate::command::{CommandDefinition, DrawBatch};
use crate::error::GpuError;
use std::future::Future;
use worldview_camera::CameraInfo;
use worldview_common::Color;

/// Where a frame is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    /// The visible surface.
    Canvas,
    /// The offscreen ID buffer used for picking.
    Hitmap,
}

/// Resource counters a backend reports for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GpuStats {
    pub buffer_count: usize,
    pub texture_count: usize,
    pub compiled_commands: usize,
    /// Draw calls issued since the backend was created.
    pub draw_calls: u64,
}

/// A rendering backend.
///
/// Frames are bracketed by [`begin_frame`](Gpu::begin_frame) and
/// [`end_frame`](Gpu::end_frame); draws outside a frame fail with
/// [`GpuError::NoFrame`]. Hitmap frames must not blend or antialias, so every
/// pixel holds exactly one object ID.
pub trait Gpu {
    /// A compiled program.
    type Command;

    fn compile(&mut self, definition: &CommandDefinition) -> Result<Self::Command, GpuError>;

    /// Size of the hitmap framebuffer. No-op when unchanged.
    fn resize_hitmap(&mut self, width: u32, height: u32) -> Result<(), GpuError>;

    fn begin_frame(&mut self, target: RenderTarget, clear: Color) -> Result<(), GpuError>;

    fn draw(
        &mut self,
        command: &Self::Command,
        camera: &CameraInfo,
        batches: &[DrawBatch],
    ) -> Result<(), GpuError>;

    fn end_frame(&mut self) -> Result<(), GpuError>;

    /// RGBA8 pixels of the last hitmap frame, rows bottom-up with `(0, 0)` at
    /// the bottom-left corner.
    fn read_pixels(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> impl Future<Output = Result<Vec<u8>, GpuError>>;

    /// Process completed GPU work before a new frame.
    fn poll(&mut self) {}

    fn stats(&self) -> GpuStats;

    /// Release every resource. Further calls may fail.
    fn destroy(&mut self);
}
