//! Scene data model.
//!
//! These are the entities the resolver produces from the fragment table:
//!
//! - `Material` binds texture filenames and render-mode flags
//! - `Mesh` is a vertex/index buffer bound to one material
//! - `SceneObject` groups meshes into a logical unit (a building, a
//!   terrain tile)
//! - `Placeable` instances an object at a transform
//! - `Light` is a positioned point light
//! - `Scene` is the root aggregate, immutable once serialization begins

pub mod resolve;

use bytemuck::{Pod, Zeroable};
use cgmath::Vector3;

/// Material flag: alpha-tested cutout (a key color becomes transparent).
pub const MATERIAL_MASKED: u32 = 0x2;
/// Material flag: alpha-blended.
pub const MATERIAL_TRANSLUCENT: u32 = 0x4;
/// Material flag: unlit, drawn at full brightness.
pub const MATERIAL_EMISSIVE: u32 = 0x8;
/// Material flag: cycles through texture frames; `param` carries the frame
/// delay in milliseconds.
pub const MATERIAL_ANIMATED: u32 = 0x10;

/// A render material: flag bits plus the textures it samples. Opaque is
/// implied by the absence of the masked/translucent bits.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub flags: u32,
    pub param: u32,
    pub filenames: Vec<String>,
}

impl Material {
    /// The fallback bound to meshes whose material reference cannot be
    /// resolved: opaque, untextured.
    pub fn fallback() -> Self {
        Self {
            flags: 0,
            param: 0,
            filenames: Vec::new(),
        }
    }

    pub fn is_masked(&self) -> bool {
        self.flags & MATERIAL_MASKED != 0
    }

    pub fn is_translucent(&self) -> bool {
        self.flags & MATERIAL_TRANSLUCENT != 0
    }
}

/// One vertex: 9 floats. The bone index is only meaningful for skinned
/// meshes and rides along as a float so the whole vertex stays a flat,
/// castable record.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coord: [f32; 2],
    pub bone: f32,
}

/// A drawable unit: one material, one vertex buffer, one u32 index buffer.
/// Indices are u32 because real zone meshes exceed 16-bit index space once
/// accumulated.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub material_id: u32,
    pub collidable: bool,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// An ordered group of meshes forming one logical object.
#[derive(Debug, Clone, Default)]
pub struct SceneObject {
    pub name: Option<String>,
    pub meshes: Vec<Mesh>,
}

/// An instance of a [`SceneObject`] at a transform. Rotation is stored in
/// degrees around each source axis; conversion to quaternions happens only
/// at interchange export.
#[derive(Debug, Clone)]
pub struct Placeable {
    pub object_id: u32,
    pub position: Vector3<f32>,
    pub rotation: Vector3<f32>,
    pub scale: Vector3<f32>,
}

/// A positioned point light.
#[derive(Debug, Clone)]
pub struct Light {
    pub position: Vector3<f32>,
    pub color: Vector3<f32>,
    pub radius: f32,
    pub attenuation: f32,
    pub flags: u32,
}

/// The root aggregate produced by one conversion run.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub materials: Vec<Material>,
    pub objects: Vec<SceneObject>,
    pub placeables: Vec<Placeable>,
    pub lights: Vec<Light>,
}

impl Scene {
    /// Total vertex count over every mesh of every object.
    pub fn total_vertices(&self) -> usize {
        self.objects
            .iter()
            .flat_map(|o| &o.meshes)
            .map(|m| m.vertices.len())
            .sum()
    }

    /// Total triangle count over every mesh of every object.
    pub fn total_triangles(&self) -> usize {
        self.objects
            .iter()
            .flat_map(|o| &o.meshes)
            .map(Mesh::triangle_count)
            .sum()
    }

    /// Merge meshes that share a material and collidability within each
    /// object. Splitting during resolution follows the source polygon
    /// runs, so one object frequently carries many small meshes with the
    /// same binding; draw-friendly output wants them joined.
    pub fn coalesce_object_meshes(&mut self) {
        for object in &mut self.objects {
            let meshes = std::mem::take(&mut object.meshes);
            let mut merged: Vec<Mesh> = Vec::new();
            for mesh in meshes {
                if let Some(target) = merged
                    .iter_mut()
                    .find(|m| m.material_id == mesh.material_id && m.collidable == mesh.collidable)
                {
                    let base = target.vertices.len() as u32;
                    target.vertices.extend_from_slice(&mesh.vertices);
                    target.indices.extend(mesh.indices.iter().map(|i| i + base));
                } else {
                    merged.push(mesh);
                }
            }
            object.meshes = merged;
        }
    }
}
