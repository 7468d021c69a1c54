//! flow-ar
//!
//! A minimal model viewer built on wgpu and winit that runs natively and in
//! the browser. It loads a single glTF model into a lit scene with a free
//! camera and offers a trigger that toggles an immersive AR session where the
//! platform supports one.
//!
//! High-level modules
//! - `camera`: camera types, controller and uniforms for view/projection
//! - `config`: everything a viewer is configured with, with stock defaults
//! - `context`: the wgpu engine that owns surface, device and GPU buffers
//! - `data_structures`: transforms, vertices, mesh data and depth textures
//! - `engine`: the rendering seam and engine bootstrap
//! - `error`: the viewer's error taxonomy
//! - `events`: viewer events, dispatch and task spawning
//! - `flow`: the winit event loop and entry points
//! - `host`: document/window adapters for the AR trigger and listeners
//! - `lifecycle`: mounting and unmounting a [`lifecycle::Viewer`]
//! - `loader`: model import tasks and placement
//! - `pipelines`: render pipelines and the light uniform
//! - `resources`: locating, fetching and decoding glTF assets
//! - `scene`: scene graph, light and imported assets
//! - `xr`: immersive session providers and the AR session state machine
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod engine;
pub mod error;
pub mod events;
pub mod flow;
pub mod host;
pub mod lifecycle;
pub mod loader;
pub mod pipelines;
pub mod resources;
pub mod scene;
pub mod xr;

// Re-exports commonly used types for convenience in downstream code.
pub use config::ViewerConfig;
pub use error::ViewerError;
pub use flow::run;
pub use lifecycle::{Host, Services, Viewer};
pub use winit::event::WindowEvent;
