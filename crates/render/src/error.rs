/// Failures reported by a [`Gpu`](crate::Gpu) backend.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("failed to compile command {label}: {reason}")]
    Compile { label: &'static str, reason: String },
    #[error("pixel readback failed: {0}")]
    Readback(String),
    #[error("rendering context lost")]
    ContextLost,
    #[error("surface error: {0}")]
    Surface(String),
    #[error("draw issued outside of a frame")]
    NoFrame,
}

/// Errors from engine operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldviewError {
    #[error("can not initialize the rendering context twice")]
    AlreadyInitialized,
    #[error("rendering context not initialized yet")]
    NotInitialized,
    #[error("rendering context was destroyed")]
    Destroyed,
    #[error("memory leak: buffer count {buffers} > {limit}")]
    ResourceLeak { buffers: usize, limit: usize },
    #[error(transparent)]
    Gpu(#[from] GpuError),
}
