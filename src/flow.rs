//! Application event loop.
//!
//! [`run`] opens the surface, creates the engine and mounts a
//! [`Viewer`] on it. From then on the loop does three things:
//! 1. Forward window events to the viewer (camera input, emulated listeners)
//! 2. Deliver [`ViewerEvent`]s dispatched by listeners and async tasks
//! 3. Drive one viewer frame per redraw
//!
//! Async work (model import, XR negotiation) runs on the event-loop thread.
//! Natively a `LocalPool` is polled between events inside a tokio runtime
//! context; in the browser tasks go straight to `spawn_local`.

use std::{fmt::Debug, rc::Rc, sync::Arc};

use instant::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};

use crate::{
    config::ViewerConfig,
    context::{WgpuEngine, WgpuProvider},
    engine::bootstrap,
    error::ViewerError,
    events::{Dispatcher, ViewerEvent},
    host::PlatformHost,
    lifecycle::{Services, Viewer},
    resources::GltfImporter,
    xr,
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub(crate) enum FlowEvent {
    /// Engine creation finished asynchronously (web only).
    #[allow(dead_code)]
    Initialized { engine: WgpuEngine },
    #[allow(dead_code)]
    SetupFailed(ViewerError),
    Viewer(ViewerEvent),
}

impl Debug for FlowEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized { .. } => f.write_str("Initialized"),
            Self::SetupFailed(e) => f.debug_tuple("SetupFailed").field(e).finish(),
            Self::Viewer(e) => f.debug_tuple("Viewer").field(e).finish(),
        }
    }
}

pub(crate) struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    #[cfg(not(target_arch = "wasm32"))]
    pool: futures::executor::LocalPool,
    proxy: EventLoopProxy<FlowEvent>,
    config: ViewerConfig,
    window: Option<Arc<Window>>,
    #[cfg(target_arch = "wasm32")]
    canvas: Option<web_sys::HtmlCanvasElement>,
    viewer: Option<Viewer<WgpuEngine, PlatformHost>>,
    last_time: Instant,
}

impl App {
    fn new(event_loop: &EventLoop<FlowEvent>, config: ViewerConfig) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            #[cfg(not(target_arch = "wasm32"))]
            pool: futures::executor::LocalPool::new(),
            proxy,
            config,
            window: None,
            #[cfg(target_arch = "wasm32")]
            canvas: None,
            viewer: None,
            last_time: Instant::now(),
        })
    }

    fn services(&self) -> Services {
        let proxy = self.proxy.clone();
        Services {
            importer: Rc::new(GltfImporter),
            xr: xr::default_provider(),
            #[cfg(not(target_arch = "wasm32"))]
            spawner: Rc::new(self.pool.spawner()),
            #[cfg(target_arch = "wasm32")]
            spawner: Rc::new(crate::events::WasmSpawner),
            dispatch: Dispatcher::new(move |event| {
                if proxy.send_event(FlowEvent::Viewer(event)).is_err() {
                    log::warn!("Event loop is closed, dropping viewer event");
                }
            }),
        }
    }

    /// Opens the window the engine draws into. On the web the window wraps
    /// the canvas named by `surface_id`; `None` if there is no such canvas.
    fn open_surface(&mut self, event_loop: &ActiveEventLoop) -> Option<Arc<Window>> {
        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("flow-ar");

        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::WindowAttributesExtWebSys;

            let canvas = web_sys::window()
                .and_then(|w| w.document())
                .and_then(|d| d.get_element_by_id(&self.config.surface_id))
                .and_then(|e| e.dyn_into::<web_sys::HtmlCanvasElement>().ok())?;
            self.canvas = Some(canvas.clone());
            window_attributes = window_attributes.with_canvas(Some(canvas));
        }

        match event_loop.create_window(window_attributes) {
            Ok(window) => Some(Arc::new(window)),
            Err(e) => {
                log::error!("Could not create a window: {}", e);
                None
            }
        }
    }

    fn host(&self) -> anyhow::Result<PlatformHost> {
        #[cfg(not(target_arch = "wasm32"))]
        {
            Ok(PlatformHost::new())
        }
        #[cfg(target_arch = "wasm32")]
        {
            use anyhow::Context;

            let canvas = self.canvas.clone().context("no canvas to attach to")?;
            PlatformHost::new(canvas)
        }
    }

    fn mount(&mut self, engine: WgpuEngine) {
        let host = match self.host() {
            Ok(host) => host,
            Err(e) => {
                log::error!("{}", ViewerError::Host(format!("{:#}", e)));
                return;
            }
        };
        match Viewer::mount(engine, host, self.services(), self.config.clone()) {
            Ok(viewer) => {
                self.viewer = Some(viewer);
                self.last_time = Instant::now();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            Err(e) => log::error!("Viewer setup failed: {}", e),
        }
        self.run_tasks();
    }

    /// Polls spawned tasks until none can make progress.
    fn run_tasks(&mut self) {
        #[cfg(not(target_arch = "wasm32"))]
        {
            // reqwest needs the tokio reactor
            let _guard = self.async_runtime.enter();
            self.pool.run_until_stalled();
        }
    }

    fn unmount(&mut self) {
        if let Some(viewer) = self.viewer.take() {
            viewer.unmount();
        }
    }
}

impl ApplicationHandler<FlowEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.viewer.is_some() {
            return;
        }
        let surface = self.open_surface(event_loop);
        self.window = surface.clone();

        let provider = WgpuProvider {
            clear_colour: self.config.clear_colour,
        };
        let surface_id = self.config.surface_id.clone();
        let init_future = async move { bootstrap(&provider, surface, &surface_id).await };

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.async_runtime.block_on(init_future) {
                Ok(engine) => self.mount(engine),
                // already logged by bootstrap
                Err(_) => event_loop.exit(),
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let event = match init_future.await {
                    Ok(engine) => FlowEvent::Initialized { engine },
                    Err(e) => FlowEvent::SetupFailed(e),
                };
                if proxy.send_event(event).is_err() {
                    log::error!("Event loop closed before the engine was ready");
                }
            });
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: FlowEvent) {
        match event {
            FlowEvent::Initialized { engine } => self.mount(engine),
            FlowEvent::SetupFailed(e) => log::debug!("Viewer not started: {}", e),
            FlowEvent::Viewer(event) => {
                if let Some(viewer) = &mut self.viewer {
                    viewer.handle(event);
                }
                self.run_tasks();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(viewer) = &mut self.viewer else {
            return;
        };
        viewer.window_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                self.unmount();
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();
                viewer.frame(dt);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        self.run_tasks();
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.unmount();
    }
}

/// Runs the viewer until its window is closed.
pub fn run(config: ViewerConfig) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::warn_1(&format!("Could not initialize logger: {}", e).into());
        }
    }

    let event_loop: EventLoop<FlowEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, config)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}

/// Browser entry point: mounts the default viewer on `#renderCanvas`.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn run_web() -> Result<(), JsValue> {
    run(ViewerConfig::default()).map_err(|e| JsValue::from_str(&format!("{:#}", e)))
}
