//! CPU reference backend.
//!
//! Nothing is rasterized up front. Each frame records its draws, and a pixel
//! read casts a ray through the pixel center and intersects the recorded
//! triangles and instanced shapes, keeping the nearest hit. Lines are not
//! hit-tested.

use crate::command::{CommandDefinition, DrawBatch, Instance, Primitive, Shape};
use crate::error::GpuError;
use crate::gpu::{Gpu, GpuStats, RenderTarget};
use glam::{DMat4, DVec3};
use std::future::Future;
use worldview_camera::CameraInfo;
use worldview_common::Color;

/// Program handle of the headless backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessCommand {
    pub label: &'static str,
}

#[derive(Debug, Clone)]
struct RecordedDraw {
    label: &'static str,
    inverse_proj_view: DMat4,
    batches: Vec<DrawBatch>,
}

#[derive(Debug, Clone)]
struct Frame {
    target: RenderTarget,
    clear: Color,
    draws: Vec<RecordedDraw>,
}

#[derive(Debug, Default)]
pub struct HeadlessGpu {
    hitmap_size: (u32, u32),
    frame: Option<Frame>,
    last_hitmap: Option<Frame>,
    last_canvas: Option<Frame>,
    compiled: Vec<&'static str>,
    stats: GpuStats,
    destroyed: bool,
}

impl HeadlessGpu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hitmap_size(&self) -> (u32, u32) {
        self.hitmap_size
    }

    /// Labels of the programs compiled so far, in compile order.
    pub fn compiled(&self) -> &[&'static str] {
        &self.compiled
    }

    /// Program labels of the last completed frame on `target`, in draw order.
    pub fn draw_order(&self, target: RenderTarget) -> Vec<&'static str> {
        self.last_frame(target)
            .map(|f| f.draws.iter().map(|d| d.label).collect())
            .unwrap_or_default()
    }

    /// Batches drawn by the last completed frame on `target`.
    pub fn batches(&self, target: RenderTarget) -> Vec<&DrawBatch> {
        self.last_frame(target)
            .map(|f| f.draws.iter().flat_map(|d| d.batches.iter()).collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn set_buffer_count(&mut self, count: usize) {
        self.stats.buffer_count = count;
    }

    fn last_frame(&self, target: RenderTarget) -> Option<&Frame> {
        match target {
            RenderTarget::Canvas => self.last_canvas.as_ref(),
            RenderTarget::Hitmap => self.last_hitmap.as_ref(),
        }
    }

    fn alive(&self) -> Result<(), GpuError> {
        if self.destroyed {
            Err(GpuError::ContextLost)
        } else {
            Ok(())
        }
    }

    /// RGBA of the hitmap pixel at `(x, y)`, bottom-left origin.
    fn sample(&self, frame: &Frame, x: u32, y: u32) -> [u8; 4] {
        let (width, height) = self.hitmap_size;
        let ndc_x = 2.0 * (x as f64 + 0.5) / width as f64 - 1.0;
        let ndc_y = 2.0 * (y as f64 + 0.5) / height as f64 - 1.0;

        let mut nearest: Option<(f64, Color)> = None;
        for draw in &frame.draws {
            let near = draw.inverse_proj_view.project_point3(DVec3::new(ndc_x, ndc_y, -1.0));
            let far = draw.inverse_proj_view.project_point3(DVec3::new(ndc_x, ndc_y, 1.0));
            let dir = far - near;
            for batch in &draw.batches {
                if let Some((t, color)) = intersect_batch(batch, near, dir) {
                    // strict depth test: earlier draws win ties
                    if nearest.is_none_or(|(best, _)| t < best) {
                        nearest = Some((t, color));
                    }
                }
            }
        }
        let color = nearest.map(|(_, c)| c).unwrap_or(frame.clear);
        color.to_array().map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
    }
}

impl Gpu for HeadlessGpu {
    type Command = HeadlessCommand;

    fn compile(&mut self, definition: &CommandDefinition) -> Result<HeadlessCommand, GpuError> {
        self.alive()?;
        self.compiled.push(definition.label);
        self.stats.compiled_commands = self.compiled.len();
        Ok(HeadlessCommand {
            label: definition.label,
        })
    }

    fn resize_hitmap(&mut self, width: u32, height: u32) -> Result<(), GpuError> {
        self.alive()?;
        if self.hitmap_size != (width, height) {
            self.hitmap_size = (width, height);
            self.last_hitmap = None;
        }
        // color and depth
        self.stats.texture_count = 2;
        Ok(())
    }

    fn begin_frame(&mut self, target: RenderTarget, clear: Color) -> Result<(), GpuError> {
        self.alive()?;
        if self.frame.is_some() {
            tracing::warn!(?target, "frame begun while another was open; discarding it");
        }
        self.frame = Some(Frame {
            target,
            clear,
            draws: Vec::new(),
        });
        Ok(())
    }

    fn draw(
        &mut self,
        command: &HeadlessCommand,
        camera: &CameraInfo,
        batches: &[DrawBatch],
    ) -> Result<(), GpuError> {
        self.alive()?;
        let frame = self.frame.as_mut().ok_or(GpuError::NoFrame)?;
        let proj_view = camera.projection.as_dmat4() * camera.view.as_dmat4();
        frame.draws.push(RecordedDraw {
            label: command.label,
            inverse_proj_view: proj_view.inverse(),
            batches: batches.to_vec(),
        });
        self.stats.draw_calls += 1;
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), GpuError> {
        self.alive()?;
        let frame = self.frame.take().ok_or(GpuError::NoFrame)?;
        match frame.target {
            RenderTarget::Canvas => self.last_canvas = Some(frame),
            RenderTarget::Hitmap => self.last_hitmap = Some(frame),
        }
        Ok(())
    }

    fn read_pixels(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> impl Future<Output = Result<Vec<u8>, GpuError>> {
        let result = self.alive().and_then(|()| {
            let (w, h) = self.hitmap_size;
            if x + width > w || y + height > h {
                return Err(GpuError::Readback(format!(
                    "region {x},{y} {width}x{height} outside {w}x{h} framebuffer"
                )));
            }
            let frame = self
                .last_hitmap
                .as_ref()
                .ok_or_else(|| GpuError::Readback("no hitmap frame rendered".into()))?;
            let mut pixels = Vec::with_capacity((width * height * 4) as usize);
            for py in y..y + height {
                for px in x..x + width {
                    pixels.extend_from_slice(&self.sample(frame, px, py));
                }
            }
            Ok(pixels)
        });
        std::future::ready(result)
    }

    fn stats(&self) -> GpuStats {
        self.stats
    }

    fn destroy(&mut self) {
        self.destroyed = true;
        self.frame = None;
        self.last_canvas = None;
        self.last_hitmap = None;
        self.compiled.clear();
        self.stats = GpuStats::default();
    }
}

fn intersect_batch(batch: &DrawBatch, origin: DVec3, dir: DVec3) -> Option<(f64, Color)> {
    let mut nearest: Option<(f64, Color)> = None;
    let mut consider = |t: f64, color: Color| {
        if (0.0..=1.0).contains(&t) && nearest.is_none_or(|(best, _)| t < best) {
            nearest = Some((t, color));
        }
    };
    match batch {
        DrawBatch::Instances { shape, instances } => {
            for instance in instances {
                if let Some(t) = intersect_instance(*shape, instance, origin, dir) {
                    consider(t, instance.color);
                }
            }
        }
        DrawBatch::Vertices {
            primitive: Primitive::Triangles,
            vertices,
        } => {
            for tri in vertices.chunks_exact(3) {
                let [a, b, c] = [tri[0], tri[1], tri[2]].map(|v| v.position.as_dvec3());
                if let Some(t) = intersect_triangle(origin, dir, a, b, c) {
                    consider(t, tri[0].color);
                }
            }
        }
        DrawBatch::Vertices {
            primitive: Primitive::Lines,
            ..
        } => {}
    }
    nearest
}

fn intersect_instance(shape: Shape, instance: &Instance, origin: DVec3, dir: DVec3) -> Option<f64> {
    let model = instance.model.as_dmat4();
    if model.determinant().abs() < 1e-12 {
        return None;
    }
    let inverse = model.inverse();
    let o = inverse.transform_point3(origin);
    let d = inverse.transform_vector3(dir);
    match shape {
        Shape::Cube => intersect_unit_box(o, d),
        Shape::Sphere => {
            let a = d.dot(d);
            let b = 2.0 * o.dot(d);
            let c = o.dot(o) - 0.25;
            smallest_root(a, b, c, |_| true)
        }
        Shape::Cylinder => {
            let inside = |t: f64| (o.z + t * d.z).abs() <= 0.5;
            let a = d.x * d.x + d.y * d.y;
            let b = 2.0 * (o.x * d.x + o.y * d.y);
            let c = o.x * o.x + o.y * o.y - 0.25;
            let side = smallest_root(a, b, c, inside);
            let caps = [-0.5, 0.5]
                .into_iter()
                .filter_map(|z| intersect_disc(o, d, z, 0.5));
            min_t(side.into_iter().chain(caps))
        }
        Shape::Cone => {
            // radius shrinks linearly from 0.5 at z = -0.5 to 0 at z = 0.5
            let k = 0.5;
            let inside = |t: f64| (o.z + t * d.z).abs() <= 0.5;
            let rz = 0.25 - k * o.z;
            let a = d.x * d.x + d.y * d.y - k * k * d.z * d.z;
            let b = 2.0 * (o.x * d.x + o.y * d.y + k * d.z * rz);
            let c = o.x * o.x + o.y * o.y - rz * rz;
            let side = smallest_root(a, b, c, inside);
            let base = intersect_disc(o, d, -0.5, 0.5);
            min_t(side.into_iter().chain(base))
        }
    }
}

fn min_t(ts: impl Iterator<Item = f64>) -> Option<f64> {
    ts.filter(|t| *t >= 0.0).min_by(f64::total_cmp)
}

/// Smallest non-negative root of `a t^2 + b t + c` accepted by `keep`.
fn smallest_root(a: f64, b: f64, c: f64, keep: impl Fn(f64) -> bool) -> Option<f64> {
    if a.abs() < 1e-15 {
        if b.abs() < 1e-15 {
            return None;
        }
        let t = -c / b;
        return (t >= 0.0 && keep(t)).then_some(t);
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let sq = disc.sqrt();
    let (t0, t1) = ((-b - sq) / (2.0 * a), (-b + sq) / (2.0 * a));
    min_t([t0, t1].into_iter().filter(|t| keep(*t)))
}

fn intersect_disc(o: DVec3, d: DVec3, z: f64, radius: f64) -> Option<f64> {
    if d.z.abs() < 1e-15 {
        return None;
    }
    let t = (z - o.z) / d.z;
    let p = o + d * t;
    (t >= 0.0 && p.x * p.x + p.y * p.y <= radius * radius).then_some(t)
}

fn intersect_unit_box(o: DVec3, d: DVec3) -> Option<f64> {
    let mut t_min = f64::NEG_INFINITY;
    let mut t_max = f64::INFINITY;
    for axis in 0..3 {
        let (oa, da) = (o[axis], d[axis]);
        if da.abs() < 1e-15 {
            if oa.abs() > 0.5 {
                return None;
            }
            continue;
        }
        let t1 = (-0.5 - oa) / da;
        let t2 = (0.5 - oa) / da;
        t_min = t_min.max(t1.min(t2));
        t_max = t_max.min(t1.max(t2));
    }
    if t_max < t_min || t_max < 0.0 {
        return None;
    }
    Some(if t_min >= 0.0 { t_min } else { t_max })
}

fn intersect_triangle(o: DVec3, d: DVec3, a: DVec3, b: DVec3, c: DVec3) -> Option<f64> {
    let e1 = b - a;
    let e2 = c - a;
    let p = d.cross(e2);
    let det = e1.dot(p);
    if det.abs() < 1e-15 {
        return None;
    }
    let inv = 1.0 / det;
    let s = o - a;
    let u = s.dot(p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = d.dot(q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(q) * inv;
    (t >= 0.0).then_some(t)
}
