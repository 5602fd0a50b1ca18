//! zonelift
//!
//! A batch converter that lifts a legacy game client's proprietary zone
//! archives into modern, loadable scene data. One run extracts a
//! compressed container archive, decodes its fragment-based scene files,
//! resolves the positional cross-references into a scene graph of
//! materials, meshes, placements and lights, and re-serializes the result
//! as a compact native binary plus a GLB with embedded geometry and
//! textures.
//!
//! High-level modules
//! - `archive`: chunked container reader (decompression, filename index)
//! - `cursor`: little-endian byte cursor/writer under every codec
//! - `fragment`: ordered fragment table parsing and typed record decoding
//! - `scene`: the converted data model and the reference resolver
//! - `textures`: legacy bitmap/compressed-surface to PNG conversion
//! - `output`: native form and GLB serializers
//! - `pipeline`: whole-zone orchestration, settings and the run summary
//!

pub mod archive;
pub mod cursor;
pub mod error;
pub mod fragment;
pub mod output;
pub mod pipeline;
pub mod scene;
pub mod textures;

// Re-exports commonly used types for convenience in downstream code.
pub use error::{Error, Result};
pub use pipeline::{ConversionSummary, Settings, ZoneOutput, convert_zone, write_outputs};
pub use scene::Scene;
