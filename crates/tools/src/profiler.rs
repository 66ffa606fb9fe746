use std::collections::BTreeMap;
use std::future::Future;
use tracing::trace;
use worldview_camera::CameraInfo;
use worldview_common::Color;
use worldview_render::{
    CommandDefinition, DrawBatch, Gpu, GpuError, GpuStats, RenderTarget,
};

/// Draw counts for one command label on one render target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelStats {
    pub draws: u64,
    pub batches: u64,
    pub instances: u64,
    pub vertices: u64,
}

/// Everything an [`InstrumentedGpu`] has seen since the last reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawProfile {
    pub canvas_frames: u64,
    pub hitmap_frames: u64,
    pub pixel_reads: u64,
    canvas: BTreeMap<&'static str, LabelStats>,
    hitmap: BTreeMap<&'static str, LabelStats>,
}

impl DrawProfile {
    pub fn labels(&self, target: RenderTarget) -> &BTreeMap<&'static str, LabelStats> {
        match target {
            RenderTarget::Canvas => &self.canvas,
            RenderTarget::Hitmap => &self.hitmap,
        }
    }

    pub fn label(&self, target: RenderTarget, label: &str) -> LabelStats {
        self.labels(target).get(label).copied().unwrap_or_default()
    }

    pub fn total_draws(&self) -> u64 {
        self.canvas.values().chain(self.hitmap.values()).map(|s| s.draws).sum()
    }

    fn record(&mut self, target: RenderTarget, label: &'static str, batches: &[DrawBatch]) {
        let map = match target {
            RenderTarget::Canvas => &mut self.canvas,
            RenderTarget::Hitmap => &mut self.hitmap,
        };
        let entry = map.entry(label).or_default();
        entry.draws += 1;
        entry.batches += batches.len() as u64;
        for batch in batches {
            match batch {
                DrawBatch::Instances { instances, .. } => entry.instances += instances.len() as u64,
                DrawBatch::Vertices { vertices, .. } => entry.vertices += vertices.len() as u64,
            }
        }
    }
}

/// A compiled command remembered together with its label.
#[derive(Debug)]
pub struct LabeledCommand<C> {
    pub label: &'static str,
    pub inner: C,
}

/// Wraps any backend and counts what is drawn through it, per command label
/// and render target.
#[derive(Debug, Default)]
pub struct InstrumentedGpu<G> {
    inner: G,
    target: Option<RenderTarget>,
    profile: DrawProfile,
}

impl<G: Gpu> InstrumentedGpu<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            target: None,
            profile: DrawProfile::default(),
        }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    pub fn profile(&self) -> &DrawProfile {
        &self.profile
    }

    /// Returns the profile so far and starts a new one.
    pub fn take_profile(&mut self) -> DrawProfile {
        std::mem::take(&mut self.profile)
    }
}

impl<G: Gpu> Gpu for InstrumentedGpu<G> {
    type Command = LabeledCommand<G::Command>;

    fn compile(&mut self, definition: &CommandDefinition) -> Result<Self::Command, GpuError> {
        let inner = self.inner.compile(definition)?;
        Ok(LabeledCommand {
            label: definition.label,
            inner,
        })
    }

    fn resize_hitmap(&mut self, width: u32, height: u32) -> Result<(), GpuError> {
        self.inner.resize_hitmap(width, height)
    }

    fn begin_frame(&mut self, target: RenderTarget, clear: Color) -> Result<(), GpuError> {
        self.inner.begin_frame(target, clear)?;
        self.target = Some(target);
        match target {
            RenderTarget::Canvas => self.profile.canvas_frames += 1,
            RenderTarget::Hitmap => self.profile.hitmap_frames += 1,
        }
        Ok(())
    }

    fn draw(
        &mut self,
        command: &Self::Command,
        camera: &CameraInfo,
        batches: &[DrawBatch],
    ) -> Result<(), GpuError> {
        self.inner.draw(&command.inner, camera, batches)?;
        if let Some(target) = self.target {
            trace!(label = command.label, ?target, batches = batches.len(), "draw");
            self.profile.record(target, command.label, batches);
        }
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), GpuError> {
        self.target = None;
        self.inner.end_frame()
    }

    fn read_pixels(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> impl Future<Output = Result<Vec<u8>, GpuError>> {
        self.profile.pixel_reads += 1;
        self.inner.read_pixels(x, y, width, height)
    }

    fn poll(&mut self) {
        self.inner.poll();
    }

    fn stats(&self) -> GpuStats {
        self.inner.stats()
    }

    fn destroy(&mut self) {
        self.target = None;
        self.inner.destroy();
    }
}
