//! Fire-and-forget model import.
//!
//! The import runs as an abortable task and reports back through the
//! [`Dispatcher`]. Placement happens later, on the event loop, in [`place`].

use futures::future::AbortHandle;

use crate::{
    config::ModelPlacement,
    error::{ViewerError, describe},
    events::{Dispatcher, Spawner, ViewerEvent, spawn_abortable},
    resources::AssetImporter,
    scene::{ImportedAsset, MeshId, Scene},
};

/// A running import. Cancelling it guarantees no result is ever dispatched.
#[derive(Debug)]
pub struct LoadTask {
    handle: AbortHandle,
}

impl LoadTask {
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_aborted()
    }
}

pub fn start(
    importer: &dyn AssetImporter,
    location: &str,
    spawner: &dyn Spawner,
    dispatch: Dispatcher,
) -> LoadTask {
    log::info!("Loading model from {}", location);
    let import = importer.import(location);
    let handle = spawn_abortable(spawner, async move {
        let event = match import.await {
            Ok(asset) => ViewerEvent::ModelLoaded(asset),
            Err(err) => ViewerEvent::ModelFailed(ViewerError::AssetLoad(describe(&err))),
        };
        dispatch.dispatch(event);
    });
    LoadTask { handle }
}

/// Applies the placement to the first mesh and moves the asset into the scene.
pub fn place(scene: &mut Scene, mut asset: ImportedAsset, placement: &ModelPlacement) -> Option<MeshId> {
    let Some(root) = asset.root_mut() else {
        log::warn!("Model loaded but contains no meshes");
        return None;
    };
    root.transform.position.y = placement.baseline_y;
    root.transform.scale_in_place(placement.scale);
    let id = scene.add_asset(asset);
    log::info!("Model loaded");
    id
}
