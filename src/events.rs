//! Viewer events and the plumbing that moves them back onto the event loop.
//!
//! Everything that happens outside the frame callback (a click on the AR
//! trigger, a resize, a finished model import, an XR state change) is turned
//! into a [`ViewerEvent`] and handed to a [`Dispatcher`]. The platform shell
//! forwards dispatched events to [`crate::lifecycle::Viewer::handle`], so the
//! scene is only ever mutated from the event loop.

use std::{fmt::Debug, future::Future, rc::Rc};

use futures::{
    FutureExt,
    future::{AbortHandle, LocalBoxFuture, abortable},
};

use crate::{error::ViewerError, scene::ImportedAsset, xr::XrEvent};

pub enum ViewerEvent {
    /// The AR trigger was activated.
    EnterAr,
    /// The surface changed size; the engine should re-fit.
    Resize,
    /// Wheel input over the surface, in the browser's `deltaY` convention (positive = towards the user).
    Wheel { delta_y: f32 },
    ModelLoaded(ImportedAsset),
    ModelFailed(ViewerError),
    Xr(XrEvent),
}

impl Debug for ViewerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EnterAr => f.write_str("EnterAr"),
            Self::Resize => f.write_str("Resize"),
            Self::Wheel { delta_y } => f.debug_struct("Wheel").field("delta_y", delta_y).finish(),
            Self::ModelLoaded(asset) => f
                .debug_struct("ModelLoaded")
                .field("meshes", &asset.meshes.len())
                .finish(),
            Self::ModelFailed(err) => f.debug_tuple("ModelFailed").field(err).finish(),
            Self::Xr(event) => f.debug_tuple("Xr").field(event).finish(),
        }
    }
}

/// Cloneable handle that delivers [`ViewerEvent`]s to whoever owns the viewer.
#[derive(Clone)]
pub struct Dispatcher(Rc<dyn Fn(ViewerEvent)>);

impl Dispatcher {
    pub fn new(deliver: impl Fn(ViewerEvent) + 'static) -> Self {
        Self(Rc::new(deliver))
    }

    pub fn dispatch(&self, event: ViewerEvent) {
        (self.0)(event)
    }
}

impl Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Dispatcher(|ViewerEvent| -> {...})")
    }
}

/// Runs futures on the event-loop thread.
pub trait Spawner {
    fn spawn_task(&self, task: LocalBoxFuture<'static, ()>);
}

impl Spawner for futures::executor::LocalSpawner {
    fn spawn_task(&self, task: LocalBoxFuture<'static, ()>) {
        use futures::task::LocalSpawnExt;

        if let Err(e) = self.spawn_local(task) {
            log::error!("Could not spawn task, the executor is shut down: {}", e);
        }
    }
}

/// Hands tasks to the browser's microtask queue.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default, Clone, Copy)]
pub struct WasmSpawner;

#[cfg(target_arch = "wasm32")]
impl Spawner for WasmSpawner {
    fn spawn_task(&self, task: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }
}

/// Spawns `task` so it can be cancelled later. Once the returned handle is
/// aborted the task is dropped at its next poll and never resumes.
pub fn spawn_abortable<F>(spawner: &dyn Spawner, task: F) -> AbortHandle
where
    F: Future<Output = ()> + 'static,
{
    let (task, handle) = abortable(task);
    spawner.spawn_task(task.map(|_| ()).boxed_local());
    handle
}
