//! The rendering seam.
//!
//! The viewer only needs four things from a renderer: create one bound to a
//! surface, re-fit after a resize, draw a [`Scene`] and release everything.
//! [`crate::context::WgpuEngine`] is the real implementation; tests plug in a
//! recording one.

use futures::future::LocalBoxFuture;

use crate::{
    error::{ViewerError, describe},
    scene::Scene,
};

pub trait Engine {
    /// Re-reads the surface's current size and reconfigures for it.
    fn fit_to_surface(&mut self);

    /// Draws one frame.
    fn render(&mut self, scene: &Scene) -> anyhow::Result<()>;

    /// Releases GPU resources. Rendering after this is an error; disposing twice is a no-op.
    fn dispose(&mut self);

    fn is_disposed(&self) -> bool;
}

pub trait RenderingProvider {
    type Surface;
    type Engine: Engine;

    fn create_engine(&self, surface: Self::Surface)
    -> LocalBoxFuture<'static, anyhow::Result<Self::Engine>>;
}

/// Creates the engine for `surface`.
///
/// A missing surface is reported (and logged) without ever touching the provider.
pub async fn bootstrap<P: RenderingProvider>(
    provider: &P,
    surface: Option<P::Surface>,
    surface_id: &str,
) -> Result<P::Engine, ViewerError> {
    let Some(surface) = surface else {
        let err = ViewerError::SurfaceMissing(surface_id.to_string());
        log::error!("{}", err);
        return Err(err);
    };
    match provider.create_engine(surface).await {
        Ok(engine) => Ok(engine),
        Err(e) => {
            let err = ViewerError::EngineCreation(describe(&e));
            log::error!("{}", err);
            Err(err)
        }
    }
}
