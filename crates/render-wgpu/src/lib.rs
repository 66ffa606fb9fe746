//! wgpu backend for the worldview engine.
//!
//! Implements [`worldview_render::Gpu`] with instanced unit meshes for the
//! shape commands and plain colored vertex lists for lines and triangles.
//! Hitmap frames render unlit into an RGBA8 target so every pixel carries an
//! exact object ID.
//!
//! # Invariants
//! - Hitmap pipelines never blend or shade.
//! - Pixel reads are addressed from the bottom-left corner.

mod gpu;
mod mesh;
mod shaders;

pub use gpu::{WgpuCommand, WgpuGpu};

pub fn crate_info() -> &'static str {
    "worldview-render-wgpu v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("wgpu"));
    }
}
