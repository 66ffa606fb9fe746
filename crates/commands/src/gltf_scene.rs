use std::cell::RefCell;
use std::path::PathBuf;
use tracing::debug;
use worldview_assets::{AssetError, GltfLoader, LoadState, ModelData};
use worldview_common::MarkerRef;
use worldview_render::hitmap_props::{self, AssignNextColors};
use worldview_render::{
    ColoredVertex, CommandDefinition, DirtyFlag, DrawBatch, DrawContext, DrawableCommand,
    MouseEventObject, Primitive,
};

/// A glTF model drawn once per marker, posed and scaled by the marker.
///
/// The model loads on a background thread and nothing is drawn until it
/// arrives. The loader marks the context's dirty flag when it finishes so
/// the next tick repaints. Meshes use their material color unless the
/// marker sets one.
#[derive(Debug)]
pub struct GltfScene {
    loader: RefCell<GltfLoader>,
}

impl GltfScene {
    pub fn load(path: impl Into<PathBuf>, dirty: DirtyFlag) -> Result<Self, AssetError> {
        let loader = GltfLoader::spawn(path, move || dirty.mark())?;
        Ok(Self {
            loader: RefCell::new(loader),
        })
    }

    pub fn from_model(model: ModelData) -> Self {
        Self {
            loader: RefCell::new(GltfLoader::ready("inline", model)),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loader.borrow_mut().model().is_some()
    }

    /// Block until the model has loaded or failed. Returns whether it loaded.
    pub fn wait(&self) -> bool {
        matches!(self.loader.borrow_mut().wait(), LoadState::Loaded(_))
    }
}

impl DrawableCommand for GltfScene {
    fn definition(&self) -> CommandDefinition {
        CommandDefinition::new("gltf-scene")
    }

    fn draw(&self, markers: &[MarkerRef], ctx: &mut DrawContext<'_>) {
        let Some(model) = self.loader.borrow_mut().model() else {
            debug!("glTF scene not loaded yet; nothing to draw");
            return;
        };
        let mut vertices = Vec::new();
        for marker in markers {
            let transform = marker.model_matrix();
            for mesh in &model.meshes {
                let color = marker.color.unwrap_or(mesh.base_color);
                vertices.extend(
                    mesh.triangles()
                        .flatten()
                        .map(|p| ColoredVertex::new(transform.transform_point3(p), color)),
                );
            }
        }
        ctx.push(DrawBatch::Vertices {
            primitive: Primitive::Triangles,
            vertices,
        });
    }

    fn hitmap_markers(
        &self,
        markers: &[MarkerRef],
        assign: &mut AssignNextColors<'_>,
        excluded: &[MouseEventObject],
    ) -> Option<Vec<MarkerRef>> {
        Some(hitmap_props::non_instanced(markers, assign, excluded))
    }
}
