use crate::error::AssetError;
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};
use worldview_common::Color;

/// One triangle-list primitive, flattened into model space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshPrimitive {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub base_color: Color,
    /// Index into [`ModelData::textures`].
    pub texture: Option<usize>,
}

impl MeshPrimitive {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Corner positions of every triangle, in index order.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(|tri| {
            Some([
                *self.positions.get(tri[0] as usize)?,
                *self.positions.get(tri[1] as usize)?,
                *self.positions.get(tri[2] as usize)?,
            ])
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub format: String,
    #[serde(skip)]
    pub pixels: Vec<u8>,
}

/// Decoded model: meshes in the scene's model space and their textures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelData {
    pub meshes: Vec<MeshPrimitive>,
    pub textures: Vec<TextureData>,
}

impl ModelData {
    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(MeshPrimitive::triangle_count).sum()
    }

    /// Axis-aligned bounds over every vertex. `None` for an empty model.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut points = self.meshes.iter().flat_map(|m| m.positions.iter().copied());
        let first = points.next()?;
        Some(points.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p))))
    }

    /// Read a `.gltf` or `.glb` file, resolving external and embedded buffers.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let (document, buffers, images) = gltf::import(path.as_ref())?;
        Self::from_parts(&document, &buffers, images)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, AssetError> {
        let (document, buffers, images) = gltf::import_slice(bytes)?;
        Self::from_parts(&document, &buffers, images)
    }

    fn from_parts(
        document: &gltf::Document,
        buffers: &[gltf::buffer::Data],
        images: Vec<gltf::image::Data>,
    ) -> Result<Self, AssetError> {
        let mut meshes = Vec::new();
        let scene = document.default_scene().or_else(|| document.scenes().next());
        match scene {
            Some(scene) => {
                for node in scene.nodes() {
                    visit_node(&node, Mat4::IDENTITY, buffers, &mut meshes)?;
                }
            }
            None => {
                for mesh in document.meshes() {
                    read_mesh(&mesh, Mat4::IDENTITY, buffers, &mut meshes)?;
                }
            }
        }
        let textures = images
            .into_iter()
            .map(|image| TextureData {
                width: image.width,
                height: image.height,
                format: format!("{:?}", image.format),
                pixels: image.pixels,
            })
            .collect();
        debug!(meshes = meshes.len(), "glTF model decoded");
        Ok(Self { meshes, textures })
    }
}

fn visit_node(
    node: &gltf::Node<'_>,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    out: &mut Vec<MeshPrimitive>,
) -> Result<(), AssetError> {
    let transform = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
    if let Some(mesh) = node.mesh() {
        read_mesh(&mesh, transform, buffers, out)?;
    }
    for child in node.children() {
        visit_node(&child, transform, buffers, out)?;
    }
    Ok(())
}

fn read_mesh(
    mesh: &gltf::Mesh<'_>,
    transform: Mat4,
    buffers: &[gltf::buffer::Data],
    out: &mut Vec<MeshPrimitive>,
) -> Result<(), AssetError> {
    let name = mesh
        .name()
        .map(str::to_owned)
        .unwrap_or_else(|| format!("mesh_{}", mesh.index()));
    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            warn!(mesh = %name, mode = ?primitive.mode(), "skipping non-triangle primitive");
            continue;
        }
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| d.0.as_slice()));
        let positions: Vec<Vec3> = reader
            .read_positions()
            .ok_or_else(|| AssetError::MissingAttribute {
                mesh: name.clone(),
                attribute: "POSITION",
            })?
            .map(|p| transform.transform_point3(Vec3::from(p)))
            .collect();
        let normals = reader
            .read_normals()
            .map(|ns| {
                ns.map(|n| transform.transform_vector3(Vec3::from(n)).normalize_or_zero())
                    .collect()
            })
            .unwrap_or_default();
        let indices = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };
        let pbr = primitive.material().pbr_metallic_roughness();
        out.push(MeshPrimitive {
            name: name.clone(),
            positions,
            normals,
            indices,
            base_color: Color::from_array(pbr.base_color_factor()),
            texture: pbr
                .base_color_texture()
                .map(|info| info.texture().source().index()),
        });
    }
    Ok(())
}
