use crate::profiler::DrawProfile;
use std::fmt;
use worldview_render::{DebugStats, RenderTarget};

/// Plain-text rendering of the engine's debug counters, optionally with a
/// per-label draw profile.
#[derive(Debug, Clone, Copy)]
pub struct StatsReport<'a> {
    pub stats: &'a DebugStats,
    pub profile: Option<&'a DrawProfile>,
}

impl<'a> StatsReport<'a> {
    pub fn new(stats: &'a DebugStats) -> Self {
        Self {
            stats,
            profile: None,
        }
    }

    pub fn with_profile(mut self, profile: &'a DrawProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Name/value rows, as shown in the desktop debug overlay.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let s = self.stats;
        vec![
            ("paints", s.counters.paints.to_string()),
            ("paint ms", format!("{:.2}", s.counters.paint_ms)),
            ("render ms", format!("{:.2}", s.counters.render_ms)),
            ("draws", s.counters.draws.to_string()),
            ("draw calls", s.draw_calls.to_string()),
            ("hitmap calls", s.hitmap_calls.to_string()),
            ("buffers", s.gpu.buffer_count.to_string()),
            ("textures", s.gpu.texture_count.to_string()),
            ("compiled", s.gpu.compiled_commands.to_string()),
            ("backend draws", s.gpu.draw_calls.to_string()),
        ]
    }
}

impl fmt::Display for StatsReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.rows() {
            writeln!(f, "{name:<14}{value:>10}")?;
        }
        let Some(profile) = self.profile else {
            return Ok(());
        };
        writeln!(
            f,
            "frames: canvas={} hitmap={} reads={}",
            profile.canvas_frames, profile.hitmap_frames, profile.pixel_reads
        )?;
        for (target, name) in [(RenderTarget::Canvas, "canvas"), (RenderTarget::Hitmap, "hitmap")] {
            for (label, s) in profile.labels(target) {
                writeln!(
                    f,
                    "  {name:<7}{label:<12} draws={} instances={} vertices={}",
                    s.draws, s.instances, s.vertices
                )?;
            }
        }
        Ok(())
    }
}
