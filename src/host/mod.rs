//! Platform implementations of [`crate::lifecycle::Host`].

#[cfg(not(target_arch = "wasm32"))]
mod native;
#[cfg(target_arch = "wasm32")]
mod web;

#[cfg(not(target_arch = "wasm32"))]
pub use native::WindowHost;
#[cfg(target_arch = "wasm32")]
pub use web::DomHost;

#[cfg(not(target_arch = "wasm32"))]
pub type PlatformHost = WindowHost;
#[cfg(target_arch = "wasm32")]
pub type PlatformHost = DomHost;
