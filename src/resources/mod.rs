use futures::{FutureExt, future::LocalBoxFuture};

use crate::scene::ImportedAsset;

/**
 * This module contains all logic for loading models from remote or local files.
 */
pub mod mesh;

/// Capability to turn a model location into scene nodes.
pub trait AssetImporter {
    fn import(&self, location: &str) -> LocalBoxFuture<'static, anyhow::Result<ImportedAsset>>;
}

/// Imports `.glb` / `.gltf` files.
#[derive(Debug, Default, Clone, Copy)]
pub struct GltfImporter;

impl AssetImporter for GltfImporter {
    fn import(&self, location: &str) -> LocalBoxFuture<'static, anyhow::Result<ImportedAsset>> {
        let location = location.to_string();
        async move { load_model_gltf(&location).await }.boxed_local()
    }
}

/// Where a model (or one of its buffers) comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Remote(reqwest::Url),
    #[cfg(not(target_arch = "wasm32"))]
    Local(std::path::PathBuf),
}

impl Location {
    /// Anything that parses as a URL is fetched. Natively, `file:` URLs and
    /// drive-letter paths such as `C:\models\ring.glb` are read from disk
    /// like any other path.
    pub fn parse(location: &str) -> anyhow::Result<Self> {
        match reqwest::Url::parse(location) {
            #[cfg(not(target_arch = "wasm32"))]
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(Self::Local)
                .map_err(|_| anyhow::anyhow!("{} is not a usable file path", location)),
            #[cfg(not(target_arch = "wasm32"))]
            Ok(url) if url.scheme().len() == 1 => Ok(Self::Local(std::path::PathBuf::from(location))),
            Ok(url) => Ok(Self::Remote(url)),
            #[cfg(not(target_arch = "wasm32"))]
            Err(_) => Ok(Self::Local(std::path::PathBuf::from(location))),
            #[cfg(target_arch = "wasm32")]
            Err(_) => Ok(Self::Remote(format_url(location)?)),
        }
    }

    /// Resolves a URI found inside a glTF file relative to the file itself.
    pub fn join(&self, uri: &str) -> anyhow::Result<Self> {
        if uri.starts_with("data:") {
            anyhow::bail!("embedded data URIs are not supported");
        }
        match self {
            Self::Remote(url) => Ok(Self::Remote(url.join(uri)?)),
            #[cfg(not(target_arch = "wasm32"))]
            Self::Local(path) => {
                let dir = path.parent().unwrap_or_else(|| std::path::Path::new(""));
                Ok(Self::Local(dir.join(uri)))
            }
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote(url) => write!(f, "{}", url),
            #[cfg(not(target_arch = "wasm32"))]
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().ok_or_else(|| anyhow::anyhow!("no global window"))?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| anyhow::anyhow!("page origin unavailable"))?;
    let base = reqwest::Url::parse(&format!("{}/", origin))?;
    Ok(base.join(file_name)?)
}

pub async fn load_binary(location: &Location) -> anyhow::Result<Vec<u8>> {
    use anyhow::Context;

    let data = match location {
        Location::Remote(url) => reqwest::get(url.clone())
            .await?
            .error_for_status()?
            .bytes()
            .await?
            .to_vec(),
        #[cfg(not(target_arch = "wasm32"))]
        Location::Local(path) => std::fs::read(path)
            .with_context(|| format!("cannot read {}", path.display()))?,
    };

    Ok(data)
}

pub async fn load_model_gltf(location: &str) -> anyhow::Result<ImportedAsset> {
    let location = Location::parse(location)?;
    let bytes = load_binary(&location).await?;
    let gltf = gltf::Gltf::from_slice(&bytes)?;

    // Load buffers
    let mut buffer_data = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => match gltf.blob.as_deref() {
                Some(blob) => buffer_data.push(blob.to_vec()),
                None => anyhow::bail!("{} references a binary chunk it does not contain", location),
            },
            gltf::buffer::Source::Uri(uri) => {
                let bin = load_binary(&location.join(uri)?).await?;
                buffer_data.push(bin);
            }
        }
    }

    let asset = mesh::import_scene(&gltf.document, &buffer_data)?;
    log::debug!("Imported {} nodes from {}", asset.meshes.len(), location);
    Ok(asset)
}
