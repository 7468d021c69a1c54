//! Render pipelines used by the wgpu engine.
//!
//! - `basic` draws opaque meshes with per-instance world matrices
//! - `light` holds the hemispheric light uniform and its bind group

pub mod basic;
pub mod light;
