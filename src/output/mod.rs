//! Output serialization.
//!
//! Two independent binary forms are derived from a finalized scene, both
//! deterministically (same scene, same bytes):
//!
//! - `native` is the compact count-prefixed dump downstream runtimes load
//! - `gltf` is the GLB interchange container generic viewers open

pub mod gltf;
pub mod native;
