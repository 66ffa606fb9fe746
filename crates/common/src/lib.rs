//! Shared data model: declarative markers, colors, poses and viewport dimensions.
//!
//! # Invariants
//! - Markers are plain values supplied fresh every frame; identity is `Arc` pointer
//!   equality plus the optional `id`.
//! - Nothing in this crate touches the GPU.

mod types;

pub use types::{Color, Dimensions, LinePrimitive, Marker, MarkerId, MarkerRef, Pose};

pub fn crate_info() -> &'static str {
    "worldview-common v0.1.0"
}
