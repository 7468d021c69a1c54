//! The scene the viewer renders: one camera, one hemispheric light and the
//! nodes of every model imported so far.
//!
//! Nodes live in a flat list. Each node may name a parent by index and a parent
//! always comes before its children, so world matrices can be composed in a
//! single forward pass.

use std::sync::Arc;
use std::time::Duration;

use cgmath::{InnerSpace, Matrix4, Rad, SquareMatrix, Vector3};

use crate::{
    camera::{Camera, CameraController},
    config::{LightSettings, ViewerConfig, ZoomSettings},
    data_structures::{instance::Transform, model::MeshData},
};

pub type MeshId = u64;

/// Name of the synthetic node that parents everything imported from one file.
pub const ROOT_NODE_NAME: &str = "__root__";

#[derive(Clone, Debug)]
pub struct MeshNode {
    /// Assigned when the node is added to a [`Scene`]; zero before that.
    pub id: MeshId,
    pub name: String,
    pub transform: Transform,
    /// Index of the parent within the same list.
    pub parent: Option<usize>,
    pub geometry: Option<Arc<MeshData>>,
}

impl MeshNode {
    pub fn new(name: impl Into<String>, transform: Transform, parent: Option<usize>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            transform,
            parent,
            geometry: None,
        }
    }

    pub fn root() -> Self {
        Self::new(ROOT_NODE_NAME, Transform::new(), None)
    }

    pub fn with_geometry(mut self, geometry: MeshData) -> Self {
        self.geometry = Some(Arc::new(geometry));
        self
    }
}

/// Result of a model import. `meshes[0]` is always the root node.
#[derive(Clone, Debug, Default)]
pub struct ImportedAsset {
    pub meshes: Vec<MeshNode>,
}

impl ImportedAsset {
    pub fn root_mut(&mut self) -> Option<&mut MeshNode> {
        self.meshes.first_mut()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HemisphericLight {
    pub direction: Vector3<f32>,
    pub intensity: f32,
    pub sky_colour: [f32; 3],
    pub ground_colour: [f32; 3],
}

impl From<&LightSettings> for HemisphericLight {
    fn from(settings: &LightSettings) -> Self {
        Self {
            direction: Vector3::from(settings.direction).normalize(),
            intensity: settings.intensity,
            sky_colour: settings.sky_colour,
            ground_colour: settings.ground_colour,
        }
    }
}

#[derive(Debug)]
pub struct Scene {
    pub camera: Camera,
    pub controller: CameraController,
    pub zoom: ZoomSettings,
    pub light: HemisphericLight,
    meshes: Vec<MeshNode>,
    next_id: MeshId,
}

impl Scene {
    /// Camera, controls and light as configured; no meshes yet.
    pub fn setup(config: &ViewerConfig) -> Self {
        let settings = &config.camera;
        Self {
            camera: Camera::new(settings.position, Rad(0.0), Rad(0.0)),
            controller: CameraController::new(settings),
            zoom: settings.zoom,
            light: HemisphericLight::from(&config.light),
            meshes: Vec::new(),
            next_id: 1,
        }
    }

    pub fn meshes(&self) -> &[MeshNode] {
        &self.meshes
    }

    pub fn mesh(&self, id: MeshId) -> Option<&MeshNode> {
        self.meshes.iter().find(|mesh| mesh.id == id)
    }

    /// Moves every node of `asset` into the scene and returns the id given to its root.
    pub fn add_asset(&mut self, asset: ImportedAsset) -> Option<MeshId> {
        let offset = self.meshes.len();
        let mut root = None;
        for mut node in asset.meshes {
            node.id = self.next_id;
            self.next_id += 1;
            node.parent = node.parent.map(|parent| parent + offset);
            root.get_or_insert(node.id);
            self.meshes.push(node);
        }
        root
    }

    pub fn zoom(&mut self, delta_y: f32) {
        self.camera.zoom(delta_y, &self.zoom);
    }

    pub fn update(&mut self, dt: Duration) {
        self.controller.update(&mut self.camera, dt);
    }

    /// World matrix of every node, in the same order as [`Scene::meshes`].
    pub fn world_matrices(&self) -> Vec<Matrix4<f32>> {
        let mut worlds: Vec<Matrix4<f32>> = Vec::with_capacity(self.meshes.len());
        for node in &self.meshes {
            let local = node.transform.to_matrix();
            let parent = node
                .parent
                .and_then(|index| worlds.get(index).copied())
                .unwrap_or_else(Matrix4::identity);
            worlds.push(parent * local);
        }
        worlds
    }
}
