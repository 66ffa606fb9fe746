use crate::config::WorldviewConfig;
use crate::element::Element;
use crate::host::Worldview;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::info;
use worldview_assets::AssetError;
use worldview_commands::{
    Arrows, Cones, Cubes, Cylinders, GltfScene, Lines, Points, Spheres, Text, Triangles,
};
use worldview_common::Marker;
use worldview_render::{DrawableCommand, Gpu, WorldviewError};

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("failed to read scene {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid scene document: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("element {key}: gltf elements need a path")]
    MissingModelPath { key: String },
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Worldview(#[from] WorldviewError),
}

/// The stock command an element draws with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Cubes,
    Spheres,
    Cylinders,
    Cones,
    Arrows,
    Lines,
    Points,
    Triangles,
    Text,
    Gltf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSpec {
    pub key: String,
    pub command: CommandKind,
    /// Model file for `gltf` elements, relative to the scene file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub markers: Vec<Marker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_index: Option<i32>,
}

/// A scene document: host configuration plus declared elements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneFile {
    pub config: WorldviewConfig,
    pub elements: Vec<ElementSpec>,
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl SceneFile {
    pub fn from_yaml(text: &str) -> Result<Self, SceneError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn read(path: &Path) -> Result<Self, SceneError> {
        let text = std::fs::read_to_string(path).map_err(|source| SceneError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut scene = Self::from_yaml(&text)?;
        scene.base_dir = path.parent().map(Path::to_path_buf);
        Ok(scene)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// What a loaded scene mounted. Callers re-render `elements` alongside
/// their own, read labels from `texts` and wait on `models`.
#[derive(Debug, Default)]
pub struct LoadedScene {
    pub elements: Vec<Element>,
    pub texts: Vec<(String, Rc<Text>)>,
    pub models: Vec<(String, Rc<GltfScene>)>,
}

impl LoadedScene {
    /// Block until every model has loaded or failed. Returns whether all loaded.
    pub fn wait_for_models(&self) -> bool {
        self.models.iter().fold(true, |all, (_, model)| model.wait() && all)
    }
}

impl<G: Gpu> Worldview<G> {
    /// Replace the mounted elements with the scene's. Text labels from a
    /// previously loaded scene stop updating.
    pub fn load_scene(&mut self, scene: &SceneFile) -> Result<LoadedScene, SceneError> {
        self.detach_all_text();
        let mut loaded = LoadedScene::default();
        for spec in &scene.elements {
            let command: Rc<dyn DrawableCommand> = match spec.command {
                CommandKind::Cubes => Rc::new(Cubes),
                CommandKind::Spheres => Rc::new(Spheres),
                CommandKind::Cylinders => Rc::new(Cylinders),
                CommandKind::Cones => Rc::new(Cones),
                CommandKind::Arrows => Rc::new(Arrows),
                CommandKind::Lines => Rc::new(Lines),
                CommandKind::Points => Rc::new(Points),
                CommandKind::Triangles => Rc::new(Triangles),
                CommandKind::Text => {
                    let text = Rc::new(Text::new());
                    self.attach_text(&text);
                    loaded.texts.push((spec.key.clone(), text.clone()));
                    text
                }
                CommandKind::Gltf => {
                    let path = spec.path.as_deref().ok_or_else(|| SceneError::MissingModelPath {
                        key: spec.key.clone(),
                    })?;
                    let dirty = self.context().dirty_flag();
                    let model = Rc::new(GltfScene::load(scene.resolve(path), dirty)?);
                    loaded.models.push((spec.key.clone(), model.clone()));
                    model
                }
            };
            let mut element = Element::new(spec.key.clone(), command)
                .with_markers(spec.markers.iter().cloned().map(Marker::shared).collect());
            element.layer_index = spec.layer_index;
            loaded.elements.push(element);
        }
        info!(elements = loaded.elements.len(), "scene loaded");
        self.render(loaded.elements.clone())?;
        Ok(loaded)
    }
}
