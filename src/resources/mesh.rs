//! Conversion of a glTF node tree into the flat node list the scene stores.

use anyhow::anyhow;

use crate::{
    data_structures::{
        instance::Transform,
        model::{MeshData, ModelVertex, Primitive},
    },
    scene::{ImportedAsset, MeshNode},
};

/// Flattens the default scene (or the first one) under a synthetic root node.
///
/// Nodes are emitted in depth-first pre-order so every parent precedes its children.
pub fn import_scene(document: &gltf::Document, buffers: &[Vec<u8>]) -> anyhow::Result<ImportedAsset> {
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| anyhow!("model contains no scene"))?;

    let mut meshes = vec![MeshNode::root()];
    for node in scene.nodes() {
        push_node(node, 0, buffers, &mut meshes);
    }
    Ok(ImportedAsset { meshes })
}

fn push_node(node: gltf::Node<'_>, parent: usize, buffers: &[Vec<u8>], out: &mut Vec<MeshNode>) {
    let (translation, rotation, scale) = node.transform().decomposed();
    let transform = Transform {
        position: translation.into(),
        // glTF stores quaternions as [x, y, z, w]
        rotation: cgmath::Quaternion::new(rotation[3], rotation[0], rotation[1], rotation[2]),
        scale: scale.into(),
    };
    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node_{}", node.index()));
    let mut mesh_node = MeshNode::new(name, transform, Some(parent));
    if let Some(mesh) = node.mesh() {
        let data = read_mesh(&mesh, buffers);
        if !data.primitives.is_empty() {
            mesh_node = mesh_node.with_geometry(data);
        }
    }

    let index = out.len();
    out.push(mesh_node);
    for child in node.children() {
        push_node(child, index, buffers, out);
    }
}

fn read_mesh(mesh: &gltf::Mesh<'_>, buffers: &[Vec<u8>]) -> MeshData {
    let mut primitives = Vec::new();
    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            log::warn!(
                "Skipping primitive {} of mesh {:?}: {:?} is not supported",
                primitive.index(),
                mesh.name(),
                primitive.mode()
            );
            continue;
        }
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.as_slice()));

        let mut vertices: Vec<ModelVertex> = match reader.read_positions() {
            Some(positions) => positions
                .map(|position| ModelVertex {
                    position,
                    normal: [0.0, 1.0, 0.0],
                })
                .collect(),
            None => {
                log::warn!(
                    "Skipping primitive {} of mesh {:?}: no positions",
                    primitive.index(),
                    mesh.name()
                );
                continue;
            }
        };
        if let Some(normals) = reader.read_normals() {
            for (vertex, normal) in vertices.iter_mut().zip(normals) {
                vertex.normal = normal;
            }
        }
        let indices = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..vertices.len() as u32).collect(),
        };
        let base_colour = primitive
            .material()
            .pbr_metallic_roughness()
            .base_color_factor();

        primitives.push(Primitive {
            vertices,
            indices,
            base_colour,
        });
    }
    MeshData { primitives }
}
