//! Mounting and unmounting the viewer.
//!
//! [`Viewer::mount`] wires an engine, a scene, the model import, the AR
//! trigger and the surface listeners together. Everything registered there is
//! released again when the viewer is unmounted or dropped, including when
//! mounting fails half-way.
//!
//! The document side (buttons, listeners) is abstracted by [`Host`]. The web
//! build talks to the DOM, the native build emulates the same surface on top
//! of winit window events.

use std::{rc::Rc, time::Duration};

use winit::{event::WindowEvent, keyboard::KeyCode};

use crate::{
    config::ViewerConfig,
    engine::Engine,
    error::{ViewerError, describe},
    events::{Dispatcher, Spawner, ViewerEvent},
    loader::{self, LoadTask},
    resources::AssetImporter,
    scene::Scene,
    xr::{ArSessionController, SessionPhase, XrProvider},
};

/// Label and screen position of the AR trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSpec {
    pub label: String,
    pub bottom_px: u32,
    pub left_px: u32,
    /// Key that activates the trigger where there is no document to put a button in.
    pub shortcut: KeyCode,
}

impl Default for TriggerSpec {
    fn default() -> Self {
        Self {
            label: "Enter AR".to_string(),
            bottom_px: 10,
            left_px: 10,
            shortcut: KeyCode::Enter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    /// Window resize; dispatches [`ViewerEvent::Resize`].
    Resize,
    /// Wheel over the render surface; dispatches [`ViewerEvent::Wheel`] and suppresses page scrolling.
    Wheel,
}

/// The document the viewer lives in.
pub trait Host {
    /// Adds a trigger that dispatches [`ViewerEvent::EnterAr`] when activated.
    fn create_trigger(&mut self, spec: &TriggerSpec, dispatch: Dispatcher) -> anyhow::Result<TriggerHandle>;

    fn remove_trigger(&mut self, handle: TriggerHandle);

    fn add_listener(&mut self, kind: ListenerKind, dispatch: Dispatcher) -> anyhow::Result<ListenerHandle>;

    fn remove_listener(&mut self, handle: ListenerHandle);

    /// Window events from the event loop, for hosts that emulate the document on top of them.
    fn window_event(&mut self, _event: &WindowEvent) {}
}

/// The capability providers a viewer talks to besides its engine and host.
#[derive(Clone)]
pub struct Services {
    pub importer: Rc<dyn AssetImporter>,
    pub xr: Rc<dyn XrProvider>,
    pub spawner: Rc<dyn Spawner>,
    pub dispatch: Dispatcher,
}

pub struct Viewer<E: Engine, H: Host> {
    config: ViewerConfig,
    engine: E,
    host: H,
    services: Services,
    scene: Scene,
    ar: ArSessionController,
    load: Option<LoadTask>,
    trigger: Option<TriggerHandle>,
    listeners: Vec<ListenerHandle>,
    rendering: bool,
    torn_down: bool,
}

impl<E: Engine, H: Host> Viewer<E, H> {
    /// Sets up the scene, starts the model import, registers the trigger and
    /// listeners and starts rendering. On error everything registered so far
    /// is released before returning.
    pub fn mount(engine: E, host: H, services: Services, config: ViewerConfig) -> Result<Self, ViewerError> {
        let scene = Scene::setup(&config);
        let ar = ArSessionController::new(config.xr.clone());
        let mut viewer = Self {
            config,
            engine,
            host,
            services,
            scene,
            ar,
            load: None,
            trigger: None,
            listeners: Vec::new(),
            rendering: false,
            torn_down: false,
        };

        viewer.listen(ListenerKind::Wheel)?;
        viewer.load = Some(loader::start(
            viewer.services.importer.as_ref(),
            &viewer.config.model_url,
            viewer.services.spawner.as_ref(),
            viewer.services.dispatch.clone(),
        ));
        let trigger = viewer
            .host
            .create_trigger(&viewer.config.trigger, viewer.services.dispatch.clone())
            .map_err(|e| ViewerError::Host(describe(&e)))?;
        viewer.trigger = Some(trigger);
        viewer.listen(ListenerKind::Resize)?;
        viewer.engine.fit_to_surface();
        viewer.rendering = true;

        log::info!("Viewer mounted");
        Ok(viewer)
    }

    fn listen(&mut self, kind: ListenerKind) -> Result<(), ViewerError> {
        let handle = self
            .host
            .add_listener(kind, self.services.dispatch.clone())
            .map_err(|e| ViewerError::Host(describe(&e)))?;
        self.listeners.push(handle);
        Ok(())
    }

    pub fn handle(&mut self, event: ViewerEvent) {
        if self.torn_down {
            log::debug!("Discarding {:?} after unmount", event);
            return;
        }
        match event {
            ViewerEvent::EnterAr => {
                self.ar.enter(
                    self.services.xr.as_ref(),
                    self.services.spawner.as_ref(),
                    &self.services.dispatch,
                );
            }
            ViewerEvent::Resize => self.engine.fit_to_surface(),
            ViewerEvent::Wheel { delta_y } => self.scene.zoom(delta_y),
            ViewerEvent::ModelLoaded(asset) => {
                self.load = None;
                loader::place(&mut self.scene, asset, &self.config.model);
            }
            ViewerEvent::ModelFailed(err) => {
                self.load = None;
                log::error!("Error loading model: {}", err);
            }
            ViewerEvent::Xr(event) => self.ar.on_event(event),
        }
    }

    /// One iteration of the render loop.
    pub fn frame(&mut self, dt: Duration) {
        if !self.rendering {
            return;
        }
        self.scene.update(dt);
        if let Err(e) = self.engine.render(&self.scene) {
            log::error!("Unable to render {:#}", e);
        }
    }

    pub fn window_event(&mut self, event: &WindowEvent) {
        if self.torn_down {
            return;
        }
        self.host.window_event(event);
        self.scene.controller.handle_window_event(event);
    }

    pub fn is_rendering(&self) -> bool {
        self.rendering
    }

    pub fn is_loading(&self) -> bool {
        self.load.is_some()
    }

    pub fn ar_phase(&self) -> SessionPhase {
        self.ar.phase()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn unmount(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if let Some(load) = self.load.take() {
            load.cancel();
        }
        self.ar.shutdown();
        self.rendering = false;
        self.engine.dispose();
        if let Some(trigger) = self.trigger.take() {
            self.host.remove_trigger(trigger);
        }
        for listener in self.listeners.drain(..) {
            self.host.remove_listener(listener);
        }
        log::info!("Viewer unmounted");
    }
}

impl<E: Engine, H: Host> Drop for Viewer<E, H> {
    fn drop(&mut self) {
        self.teardown();
    }
}
