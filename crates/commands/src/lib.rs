//! Stock drawable commands.
//!
//! Each command turns the markers of one element into draw batches and
//! prepares ID-colored copies for the hitmap. Shapes, points and triangles
//! give every instance its own ID; lines, text and models give one ID per
//! marker; arrows report the arrow the application declared.
//!
//! # Invariants
//! - Commands never mutate the markers they are given.
//! - A command draws the same geometry in canvas and hitmap passes, except
//!   for markers flagged `only_render_in_hitmap` and for text, whose canvas
//!   output is a screen-space overlay.

mod arrows;
mod gltf_scene;
mod lines;
mod points;
mod shapes;
mod text;
mod triangles;

pub use arrows::{Arrows, decompose as decompose_arrow};
pub use gltf_scene::GltfScene;
pub use lines::Lines;
pub use points::Points;
pub use shapes::{Cones, Cubes, Cylinders, Spheres};
pub use text::{DEFAULT_FONT_SIZE, Text, TextLabel};
pub use triangles::Triangles;

pub fn crate_info() -> &'static str {
    "worldview-commands v0.1.0"
}
