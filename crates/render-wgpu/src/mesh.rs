//! Unit meshes matching the shapes the headless backend hit-tests: every
//! mesh fits in `[-0.5, 0.5]^3`, cylinders and cones run along +Z.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use std::f32::consts::TAU;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl MeshVertex {
    fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
        }
    }
}

#[derive(Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u16>,
}

impl MeshData {
    fn push(&mut self, position: Vec3, normal: Vec3) -> u16 {
        self.vertices.push(MeshVertex::new(position, normal));
        (self.vertices.len() - 1) as u16
    }

    fn quad(&mut self, a: u16, b: u16, c: u16, d: u16) {
        self.indices.extend_from_slice(&[a, b, c, c, d, a]);
    }
}

pub fn cube() -> MeshData {
    let mut mesh = MeshData::default();
    for normal in [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z] {
        // two axes spanning the face, ordered so the face winds counter-clockwise
        let u = normal.any_orthonormal_vector();
        let v = normal.cross(u);
        let center = normal * 0.5;
        let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
            .map(|(a, b)| mesh.push(center + (u * a + v * b) * 0.5, normal));
        mesh.quad(corners[0], corners[1], corners[2], corners[3]);
    }
    mesh
}

pub fn sphere(segments: u16, rings: u16) -> MeshData {
    let mut mesh = MeshData::default();
    for ring in 0..=rings {
        let phi = std::f32::consts::PI * ring as f32 / rings as f32;
        for segment in 0..=segments {
            let theta = TAU * segment as f32 / segments as f32;
            let normal = Vec3::new(phi.sin() * theta.cos(), phi.sin() * theta.sin(), phi.cos());
            mesh.push(normal * 0.5, normal);
        }
    }
    let stride = segments + 1;
    for ring in 0..rings {
        for segment in 0..segments {
            let a = ring * stride + segment;
            let b = a + stride;
            mesh.quad(a, b, b + 1, a + 1);
        }
    }
    mesh
}

/// Disc at height `z` facing `normal`.
fn cap(mesh: &mut MeshData, segments: u16, z: f32, normal: Vec3) {
    let center = mesh.push(Vec3::new(0.0, 0.0, z), normal);
    let first = center + 1;
    for segment in 0..=segments {
        let theta = TAU * segment as f32 / segments as f32;
        mesh.push(Vec3::new(0.5 * theta.cos(), 0.5 * theta.sin(), z), normal);
    }
    for segment in 0..segments {
        let (a, b) = (first + segment, first + segment + 1);
        if normal.z > 0.0 {
            mesh.indices.extend_from_slice(&[center, a, b]);
        } else {
            mesh.indices.extend_from_slice(&[center, b, a]);
        }
    }
}

pub fn cylinder(segments: u16) -> MeshData {
    let mut mesh = MeshData::default();
    let first = mesh.vertices.len() as u16;
    for segment in 0..=segments {
        let theta = TAU * segment as f32 / segments as f32;
        let normal = Vec3::new(theta.cos(), theta.sin(), 0.0);
        mesh.push(normal * 0.5 - Vec3::Z * 0.5, normal);
        mesh.push(normal * 0.5 + Vec3::Z * 0.5, normal);
    }
    for segment in 0..segments {
        let bottom = first + segment * 2;
        mesh.quad(bottom, bottom + 2, bottom + 3, bottom + 1);
    }
    cap(&mut mesh, segments, -0.5, Vec3::NEG_Z);
    cap(&mut mesh, segments, 0.5, Vec3::Z);
    mesh
}

pub fn cone(segments: u16) -> MeshData {
    let mut mesh = MeshData::default();
    // side normals lean up by the slope of a cone with radius 0.5 and height 1
    let slope = 0.5_f32;
    for segment in 0..=segments {
        let theta = TAU * segment as f32 / segments as f32;
        let radial = Vec3::new(theta.cos(), theta.sin(), 0.0);
        let normal = (radial + Vec3::Z * slope).normalize();
        mesh.push(radial * 0.5 - Vec3::Z * 0.5, normal);
        mesh.push(Vec3::Z * 0.5, normal);
    }
    for segment in 0..segments {
        let base = segment * 2;
        mesh.indices.extend_from_slice(&[base, base + 2, base + 1]);
    }
    cap(&mut mesh, segments, -0.5, Vec3::NEG_Z);
    mesh
}
