//! Engine data structures: meshes, transforms and the depth buffer.
//!
//! - `model` contains CPU-side mesh data and the vertex layout
//! - `instance` holds node transforms and the per-draw GPU data
//! - `texture` holds the depth attachment

pub mod instance;
pub mod model;
pub mod texture;
