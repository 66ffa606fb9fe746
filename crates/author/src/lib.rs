//! Interactive authoring tools built on picked mouse events.
//!
//! # Invariants
//! - Builder objects are addressed by id; drawn markers carry those ids so a
//!   pick resolves back to the object it shows.
//! - A closed polygon repeats its first point, sharing its id.

mod polygon;

pub use polygon::{ObjectId, Polygon, PolygonBuilder, PolygonMarkers, PolygonPoint};

pub fn crate_info() -> &'static str {
    "worldview-author v0.1.0"
}
