use thiserror::Error;

/// Everything that can go wrong in the viewer, grouped by how it is recovered.
///
/// Setup errors (`SurfaceMissing`, `EngineCreation`, `Host`) stop the viewer
/// from mounting. `AssetLoad` and `XrNegotiation` are logged and the viewer
/// keeps running without the model or the AR session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ViewerError {
    #[error("render surface `{0}` not found")]
    SurfaceMissing(String),
    #[error("failed to create the rendering engine: {0}")]
    EngineCreation(String),
    #[error("document operation failed: {0}")]
    Host(String),
    #[error("failed to load model: {0}")]
    AssetLoad(String),
    #[error("failed to create WebXR experience: {0}")]
    XrNegotiation(String),
}

impl ViewerError {
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::SurfaceMissing(_) | Self::EngineCreation(_) | Self::Host(_)
        )
    }
}

/// Flattens an `anyhow` chain into a single line so it can travel inside a [`ViewerError`].
pub(crate) fn describe(err: &anyhow::Error) -> String {
    format!("{:#}", err)
}
