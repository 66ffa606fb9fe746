//! Asset loaders: glTF models decoded on background threads, and the glyph
//! atlas cache used to measure text.
//!
//! # Invariants
//! - A failed load is reported as a state, never as a panic on the render
//!   thread.
//! - A glyph atlas is rebuilt only when its charset changes.

mod error;
mod glyph;
mod loader;
mod model;

pub use error::AssetError;
pub use glyph::{GLYPH_SIZE, GlyphAtlas, GlyphAtlasCache, GlyphRect};
pub use loader::{GltfLoader, LoadState};
pub use model::{MeshPrimitive, ModelData, TextureData};

pub fn crate_info() -> &'static str {
    "worldview-assets v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("assets"));
    }
}
