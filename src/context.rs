//! The wgpu engine.
//!
//! Owns the surface, device and every GPU buffer derived from the scene. Mesh
//! geometry is uploaded lazily the first time a node is drawn; world matrices
//! are re-uploaded every frame.

use std::{collections::HashMap, sync::Arc};

use anyhow::{Context as _, anyhow};
use futures::{FutureExt, future::LocalBoxFuture};
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    camera::{CameraUniform, Projection},
    data_structures::{instance::InstanceRaw, model::Primitive, texture},
    engine::{Engine, RenderingProvider},
    pipelines::{basic, light::LightResources},
    scene::{HemisphericLight, MeshId, Scene},
};

struct GpuPrimitive {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    instance: wgpu::Buffer,
    num_indices: u32,
}

impl GpuPrimitive {
    fn new(device: &wgpu::Device, primitive: &Primitive, instance: InstanceRaw) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Vertex Buffer"),
            contents: bytemuck::cast_slice(&primitive.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Index Buffer"),
            contents: bytemuck::cast_slice(&primitive.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let instance = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Instance Buffer"),
            contents: bytemuck::cast_slice(&[instance]),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        Self {
            vertex,
            index,
            instance,
            num_indices: primitive.indices.len() as u32,
        }
    }
}

struct CameraResources {
    uniform: CameraUniform,
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct Gpu {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    is_surface_configured: bool,
    depth_texture: texture::DepthTexture,
    projection: Projection,
    camera: CameraResources,
    light: LightResources,
    pipeline: wgpu::RenderPipeline,
    primitives: HashMap<(MeshId, usize), GpuPrimitive>,
}

pub struct WgpuEngine {
    window: Arc<Window>,
    clear_colour: wgpu::Color,
    gpu: Option<Gpu>,
}

impl WgpuEngine {
    pub async fn new(window: Arc<Window>, clear_colour: wgpu::Color) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::debug!("WGPU setup");
        let instance = wgpu::Instance::default();

        let surface = instance
            .create_surface(window.clone())
            .context("could not create a surface for the window")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable graphics adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                ..Default::default()
            })
            .await
            .context("could not open the graphics device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The shader assumes an Srgb surface texture
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow!("the surface is not supported by the adapter"))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let projection = Projection::new(config.width, config.height, cgmath::Deg(45.0), 0.1, 500.0);

        let camera_uniform = CameraUniform::new();
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("camera_bind_group_layout"),
        });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        // Replaced by the scene's light on the first frame
        let light = LightResources::new(
            &device,
            &HemisphericLight::from(&crate::config::LightSettings::default()),
        );

        let pipeline =
            basic::mk_basic_pipeline(&device, &config, &camera_bind_group_layout, &light.bind_group_layout);

        let depth_texture = texture::DepthTexture::new(&device, config.width, config.height);

        log::info!("Engine created for a {}x{} surface", config.width, config.height);

        Ok(Self {
            window,
            clear_colour,
            gpu: Some(Gpu {
                surface,
                device,
                queue,
                config,
                is_surface_configured: false,
                depth_texture,
                projection,
                camera: CameraResources {
                    uniform: camera_uniform,
                    buffer: camera_buffer,
                    bind_group: camera_bind_group,
                },
                light,
                pipeline,
                primitives: HashMap::new(),
            }),
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }
}

impl Gpu {
    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.is_surface_configured = true;
            self.projection.resize(width, height);
            self.surface.configure(&self.device, &self.config);
            self.depth_texture = texture::DepthTexture::new(&self.device, width, height);
        }
    }

    fn upload(&mut self, scene: &Scene) {
        self.camera.uniform.update_view_proj(&scene.camera, &self.projection);
        self.queue
            .write_buffer(&self.camera.buffer, 0, bytemuck::cast_slice(&[self.camera.uniform]));
        self.light.update(&self.queue, &scene.light);

        let worlds = scene.world_matrices();
        for (node, world) in scene.meshes().iter().zip(worlds) {
            let Some(geometry) = &node.geometry else {
                continue;
            };
            for (i, primitive) in geometry.primitives.iter().enumerate() {
                let instance = InstanceRaw::new(world, primitive.base_colour);
                match self.primitives.get(&(node.id, i)) {
                    Some(gpu) => {
                        self.queue
                            .write_buffer(&gpu.instance, 0, bytemuck::cast_slice(&[instance]));
                    }
                    None => {
                        let gpu = GpuPrimitive::new(&self.device, primitive, instance);
                        self.primitives.insert((node.id, i), gpu);
                    }
                }
            }
        }
    }

    fn draw(&mut self, clear_colour: wgpu::Color) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &self.camera.bind_group, &[]);
            render_pass.set_bind_group(1, &self.light.bind_group, &[]);
            for primitive in self.primitives.values() {
                if primitive.num_indices == 0 {
                    continue;
                }
                render_pass.set_vertex_buffer(0, primitive.vertex.slice(..));
                render_pass.set_vertex_buffer(1, primitive.instance.slice(..));
                render_pass.set_index_buffer(primitive.index.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..primitive.num_indices, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

impl Engine for WgpuEngine {
    fn fit_to_surface(&mut self) {
        let size = self.window.inner_size();
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.resize(size.width, size.height);
        }
    }

    fn render(&mut self, scene: &Scene) -> anyhow::Result<()> {
        let gpu = self.gpu.as_mut().ok_or_else(|| anyhow!("engine has been disposed"))?;
        // invoke main render loop
        self.window.request_redraw();

        // Rendering requires the surface to be configured
        if !gpu.is_surface_configured {
            return Ok(());
        }

        gpu.upload(scene);
        match gpu.draw(self.clear_colour) {
            Ok(()) => Ok(()),
            // Reconfigure the surface if it's lost or outdated
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = self.window.inner_size();
                gpu.resize(size.width, size.height);
                Ok(())
            }
            Err(e) => Err(anyhow!("surface error: {e}")),
        }
    }

    fn dispose(&mut self) {
        if self.gpu.take().is_some() {
            log::debug!("Engine disposed");
        }
    }

    fn is_disposed(&self) -> bool {
        self.gpu.is_none()
    }
}

/// Creates [`WgpuEngine`]s bound to a winit window.
#[derive(Debug, Clone, Copy)]
pub struct WgpuProvider {
    pub clear_colour: wgpu::Color,
}

impl RenderingProvider for WgpuProvider {
    type Surface = Arc<Window>;
    type Engine = WgpuEngine;

    fn create_engine(&self, surface: Arc<Window>) -> LocalBoxFuture<'static, anyhow::Result<WgpuEngine>> {
        WgpuEngine::new(surface, self.clear_colour).boxed_local()
    }
}
