//! Developer tooling: draw profiling over any backend and text reports of
//! the engine's debug counters.
//!
//! # Invariants
//! - Instrumentation never changes what the wrapped backend draws.

mod profiler;
mod report;

pub use profiler::{DrawProfile, InstrumentedGpu, LabelStats, LabeledCommand};
pub use report::StatsReport;

pub fn crate_info() -> &'static str {
    "worldview-tools v0.1.0"
}
