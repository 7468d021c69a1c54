//! Viewer configuration.
//!
//! Everything the viewer needs to know up front lives in [`ViewerConfig`]. The
//! defaults reproduce the stock ring viewer; embedders override single fields
//! with the `with_*` builders before handing the config to [`crate::flow::run`].

use winit::keyboard::KeyCode;

use crate::{lifecycle::TriggerSpec, xr::XrOptions};

pub const DEFAULT_SURFACE_ID: &str = "renderCanvas";
pub const DEFAULT_MODEL_URL: &str =
    "https://camweara-customers.s3.ap-south-1.amazonaws.com/Assignment/ring_assessment.glb";

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Element id of the canvas the engine binds to on the web.
    pub surface_id: String,
    /// Remote URL or local path of the model to import.
    pub model_url: String,
    pub model: ModelPlacement,
    pub camera: CameraSettings,
    pub light: LightSettings,
    pub trigger: TriggerSpec,
    pub xr: XrOptions,
    pub clear_colour: wgpu::Color,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            surface_id: DEFAULT_SURFACE_ID.to_string(),
            model_url: DEFAULT_MODEL_URL.to_string(),
            model: ModelPlacement::default(),
            camera: CameraSettings::default(),
            light: LightSettings::default(),
            trigger: TriggerSpec::default(),
            xr: XrOptions::default(),
            // dark slate
            clear_colour: wgpu::Color {
                r: 0.2,
                g: 0.2,
                b: 0.3,
                a: 1.0,
            },
        }
    }
}

impl ViewerConfig {
    pub fn with_surface_id(mut self, surface_id: impl Into<String>) -> Self {
        self.surface_id = surface_id.into();
        self
    }

    pub fn with_model_url(mut self, model_url: impl Into<String>) -> Self {
        self.model_url = model_url.into();
        self
    }

    pub fn with_model_placement(mut self, model: ModelPlacement) -> Self {
        self.model = model;
        self
    }

    pub fn with_camera(mut self, camera: CameraSettings) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_light(mut self, light: LightSettings) -> Self {
        self.light = light;
        self
    }

    pub fn with_trigger(mut self, trigger: TriggerSpec) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_xr(mut self, xr: XrOptions) -> Self {
        self.xr = xr;
        self
    }

    pub fn with_clear_colour(mut self, clear_colour: wgpu::Color) -> Self {
        self.clear_colour = clear_colour;
        self
    }
}

/// Transform applied to the root of an imported model once it arrives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPlacement {
    pub baseline_y: f32,
    /// Uniform factor multiplied into the root's existing scale.
    pub scale: f32,
}

impl Default for ModelPlacement {
    fn default() -> Self {
        Self {
            baseline_y: 0.0,
            scale: 0.02,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSettings {
    pub position: [f32; 3],
    /// World units travelled per 60 Hz frame while a movement key is held.
    pub speed: f32,
    /// Radians of rotation per pixel of pointer drag.
    pub look_sensitivity: f32,
    pub bindings: KeyBindings,
    pub zoom: ZoomSettings,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: [0.0, 2.0, -20.0],
            speed: 0.5,
            look_sensitivity: 0.002,
            bindings: KeyBindings::default(),
            zoom: ZoomSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBindings {
    pub up: KeyCode,
    pub down: KeyCode,
    pub left: KeyCode,
    pub right: KeyCode,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            up: KeyCode::KeyW,
            down: KeyCode::KeyS,
            left: KeyCode::KeyA,
            right: KeyCode::KeyD,
        }
    }
}

/// Wheel zoom: the camera moves `delta_y * scale * sensitivity` along its forward axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomSettings {
    pub scale: f32,
    pub sensitivity: f32,
}

impl Default for ZoomSettings {
    fn default() -> Self {
        Self {
            scale: 0.01,
            sensitivity: 2.0,
        }
    }
}

impl ZoomSettings {
    pub fn offset(&self, delta_y: f32) -> f32 {
        delta_y * self.scale * self.sensitivity
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSettings {
    pub direction: [f32; 3],
    pub intensity: f32,
    pub sky_colour: [f32; 3],
    pub ground_colour: [f32; 3],
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            direction: [0.0, 1.0, 0.0],
            intensity: 1.0,
            sky_colour: [1.0, 1.0, 1.0],
            ground_colour: [0.0, 0.0, 0.0],
        }
    }
}
