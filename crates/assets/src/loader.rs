use crate::error::AssetError;
use crate::model::ModelData;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use tracing::{error, info};

/// Progress of a background model load.
#[derive(Debug, Clone)]
pub enum LoadState {
    Pending,
    Loaded(Arc<ModelData>),
    Failed(String),
}

/// Loads a glTF model on its own thread.
///
/// `notify` runs on the loader thread once the result is ready, successful
/// or not; hosts use it to schedule a repaint.
#[derive(Debug)]
pub struct GltfLoader {
    path: PathBuf,
    receiver: Option<Receiver<Result<ModelData, AssetError>>>,
    state: LoadState,
}

impl GltfLoader {
    pub fn spawn(
        path: impl Into<PathBuf>,
        notify: impl FnOnce() + Send + 'static,
    ) -> Result<Self, AssetError> {
        let path = path.into();
        let (sender, receiver) = mpsc::channel();
        let thread_path = path.clone();
        thread::Builder::new()
            .name("gltf-loader".into())
            .spawn(move || {
                let result = ModelData::load(&thread_path);
                // the loader may have been dropped; nothing to deliver then
                let _ = sender.send(result);
                notify();
            })?;
        Ok(Self {
            path,
            receiver: Some(receiver),
            state: LoadState::Pending,
        })
    }

    /// A loader that already holds `model`.
    pub fn ready(path: impl Into<PathBuf>, model: ModelData) -> Self {
        Self {
            path: path.into(),
            receiver: None,
            state: LoadState::Loaded(Arc::new(model)),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Collect the result if the thread has finished.
    pub fn poll(&mut self) -> &LoadState {
        let Some(receiver) = &self.receiver else {
            return &self.state;
        };
        match receiver.try_recv() {
            Ok(Ok(model)) => {
                info!(path = %self.path.display(), triangles = model.triangle_count(), "model loaded");
                self.state = LoadState::Loaded(Arc::new(model));
                self.receiver = None;
            }
            Ok(Err(err)) => {
                error!(path = %self.path.display(), %err, "model failed to load");
                self.state = LoadState::Failed(err.to_string());
                self.receiver = None;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                let err = AssetError::LoaderGone;
                error!(path = %self.path.display(), %err, "model failed to load");
                self.state = LoadState::Failed(err.to_string());
                self.receiver = None;
            }
        }
        &self.state
    }

    pub fn model(&mut self) -> Option<Arc<ModelData>> {
        match self.poll() {
            LoadState::Loaded(model) => Some(model.clone()),
            _ => None,
        }
    }

    /// Block until the load finishes.
    pub fn wait(&mut self) -> &LoadState {
        if let Some(receiver) = self.receiver.take() {
            let result = receiver.recv().map_err(|_| AssetError::LoaderGone).and_then(|r| r);
            self.state = match result {
                Ok(model) => LoadState::Loaded(Arc::new(model)),
                Err(err) => {
                    error!(path = %self.path.display(), %err, "model failed to load");
                    LoadState::Failed(err.to_string())
                }
            };
        }
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::TRIANGLE_GLTF;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn loads_in_background_and_notifies() {
        let mut file = tempfile::Builder::new().suffix(".gltf").tempfile().unwrap();
        file.write_all(TRIANGLE_GLTF.as_bytes()).unwrap();
        let notified = Arc::new(AtomicBool::new(false));
        let flag = notified.clone();

        let mut loader =
            GltfLoader::spawn(file.path(), move || flag.store(true, Ordering::SeqCst)).unwrap();
        assert!(matches!(loader.wait(), LoadState::Loaded(_)));
        assert!(loader.model().is_some());
        // notify runs after the send; give the thread a moment to finish
        for _ in 0..100 {
            if notified.load(Ordering::SeqCst) {
                break;
            }
            thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(notified.load(Ordering::SeqCst));
    }

    #[test]
    fn failure_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = GltfLoader::spawn(dir.path().join("missing.gltf"), || {}).unwrap();
        assert!(matches!(loader.wait(), LoadState::Failed(_)));
        assert!(loader.model().is_none());
    }

    #[test]
    fn ready_loader_never_pends() {
        let mut loader = GltfLoader::ready("inline", ModelData::default());
        assert!(matches!(loader.poll(), LoadState::Loaded(_)));
    }
}
