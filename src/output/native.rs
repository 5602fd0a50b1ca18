//! The compact native scene form.
//!
//! A straight little-endian dump of the scene: count-prefixed arrays of
//! materials, objects (with nested meshes), placeables and lights. No
//! compression, no padding; IEEE-754 floats, fixed-width integers, and
//! 7-bit varint lengths for filename strings. Writing the same scene twice
//! yields identical bytes, which the reproducibility tests rely on.
//!
//! Layout:
//!
//! ```text
//! magic  b"OEZ1"
//! u32    version (currently 1)
//! u32    material count
//!        per material: flags:u32, param:u32, n:u32, n x (varint len + utf8)
//! u32    object count
//!        per object: mesh count:u32
//!            per mesh: material_id:u32, collidable:u32,
//!                      vertex count:u32, triangle count:u32,
//!                      vertices (9 x f32 each), indices (u32 x 3 x triangles)
//! u32    placeable count
//!        per placeable: object_id:u32, position, rotation, scale (3 x f32 each)
//! u32    light count
//!        per light: position, color (3 x f32 each), radius:f32,
//!                   attenuation:f32, flags:u32
//! ```

use cgmath::Vector3;

use crate::cursor::{Cursor, Writer};
use crate::error::{Error, Result};
use crate::scene::{Light, Material, Mesh, Placeable, Scene, SceneObject, Vertex};

pub const NATIVE_MAGIC: [u8; 4] = *b"OEZ1";
pub const NATIVE_VERSION: u32 = 1;

/// Serialize a finalized scene to the native form.
pub fn write_scene(scene: &Scene) -> Vec<u8> {
    let mut w = Writer::with_capacity(1024);
    w.write_magic(&NATIVE_MAGIC);
    w.write_u32(NATIVE_VERSION);

    w.write_u32(scene.materials.len() as u32);
    for material in &scene.materials {
        w.write_u32(material.flags);
        w.write_u32(material.param);
        w.write_u32(material.filenames.len() as u32);
        for name in &material.filenames {
            w.write_varint(name.len() as u32);
            w.write_bytes(name.as_bytes());
        }
    }

    w.write_u32(scene.objects.len() as u32);
    for object in &scene.objects {
        w.write_u32(object.meshes.len() as u32);
        for mesh in &object.meshes {
            w.write_u32(mesh.material_id);
            w.write_u32(mesh.collidable as u32);
            w.write_u32(mesh.vertices.len() as u32);
            w.write_u32(mesh.triangle_count() as u32);
            w.write_bytes(bytemuck::cast_slice(&mesh.vertices));
            w.write_bytes(bytemuck::cast_slice(&mesh.indices[..mesh.triangle_count() * 3]));
        }
    }

    w.write_u32(scene.placeables.len() as u32);
    for placeable in &scene.placeables {
        w.write_u32(placeable.object_id);
        w.write_vec3(placeable.position.into());
        w.write_vec3(placeable.rotation.into());
        w.write_vec3(placeable.scale.into());
    }

    w.write_u32(scene.lights.len() as u32);
    for light in &scene.lights {
        w.write_vec3(light.position.into());
        w.write_vec3(light.color.into());
        w.write_f32(light.radius);
        w.write_f32(light.attenuation);
        w.write_u32(light.flags);
    }

    w.into_bytes()
}

/// Read a native-form scene back. The round-trip property rests on this:
/// a written scene reads back with identical counts and content.
pub fn read_scene(data: &[u8]) -> Result<Scene> {
    let mut c = Cursor::new(data);
    let magic = c.read_magic()?;
    if magic != NATIVE_MAGIC {
        return Err(Error::BadMagic {
            expected: NATIVE_MAGIC,
            found: magic,
        });
    }
    let version = c.read_u32()?;
    if version != NATIVE_VERSION {
        return Err(Error::MalformedScene(format!(
            "unsupported native version {version}"
        )));
    }

    let material_count = c.read_u32()? as usize;
    let mut materials = Vec::with_capacity(material_count);
    for _ in 0..material_count {
        let flags = c.read_u32()?;
        let param = c.read_u32()?;
        let name_count = c.read_u32()? as usize;
        let mut filenames = Vec::with_capacity(name_count);
        for _ in 0..name_count {
            let len = c.read_varint()? as usize;
            let offset = c.position();
            let bytes = c.read_bytes(len)?;
            filenames.push(
                String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidString { offset })?,
            );
        }
        materials.push(Material {
            flags,
            param,
            filenames,
        });
    }

    let object_count = c.read_u32()? as usize;
    let mut objects = Vec::with_capacity(object_count);
    for _ in 0..object_count {
        let mesh_count = c.read_u32()? as usize;
        let mut meshes = Vec::with_capacity(mesh_count);
        for _ in 0..mesh_count {
            let material_id = c.read_u32()?;
            let collidable = c.read_u32()? != 0;
            let vertex_count = c.read_u32()? as usize;
            let triangle_count = c.read_u32()? as usize;
            if material_id as usize >= materials.len() && material_id != 0 {
                return Err(Error::MalformedScene(format!(
                    "mesh references material {material_id} of {}",
                    materials.len()
                )));
            }
            let vertex_bytes = c.read_bytes(vertex_count * std::mem::size_of::<Vertex>())?;
            // The byte slice is not necessarily aligned for f32, so copy
            // rather than cast in place.
            let vertices: Vec<Vertex> = bytemuck::pod_collect_to_vec(vertex_bytes);
            let mut indices = Vec::with_capacity(triangle_count * 3);
            for _ in 0..triangle_count * 3 {
                indices.push(c.read_u32()?);
            }
            meshes.push(Mesh {
                material_id,
                collidable,
                vertices,
                indices,
            });
        }
        objects.push(SceneObject {
            name: None,
            meshes,
        });
    }

    let placeable_count = c.read_u32()? as usize;
    let mut placeables = Vec::with_capacity(placeable_count);
    for _ in 0..placeable_count {
        placeables.push(Placeable {
            object_id: c.read_u32()?,
            position: Vector3::from(c.read_vec3()?),
            rotation: Vector3::from(c.read_vec3()?),
            scale: Vector3::from(c.read_vec3()?),
        });
    }

    let light_count = c.read_u32()? as usize;
    let mut lights = Vec::with_capacity(light_count);
    for _ in 0..light_count {
        lights.push(Light {
            position: Vector3::from(c.read_vec3()?),
            color: Vector3::from(c.read_vec3()?),
            radius: c.read_f32()?,
            attenuation: c.read_f32()?,
            flags: c.read_u32()?,
        });
    }

    Ok(Scene {
        materials,
        objects,
        placeables,
        lights,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MATERIAL_MASKED;

    fn sample_scene() -> Scene {
        let vertices = vec![
            Vertex {
                position: [0.0, 0.0, 0.0],
                normal: [0.0, 0.0, 1.0],
                tex_coord: [0.0, 0.0],
                bone: 0.0,
            },
            Vertex {
                position: [1.0, 0.0, 0.0],
                normal: [0.0, 0.0, 1.0],
                tex_coord: [1.0, 0.0],
                bone: 0.0,
            },
            Vertex {
                position: [1.0, 1.0, 0.0],
                normal: [0.0, 0.0, 1.0],
                tex_coord: [1.0, 1.0],
                bone: 2.0,
            },
        ];
        Scene {
            materials: vec![
                Material {
                    flags: MATERIAL_MASKED,
                    param: 0,
                    filenames: vec!["grate.bmp".into()],
                },
                Material::fallback(),
            ],
            objects: vec![SceneObject {
                name: Some("TREE1_ACTORDEF".into()),
                meshes: vec![Mesh {
                    material_id: 0,
                    collidable: true,
                    vertices,
                    indices: vec![0, 1, 2],
                }],
            }],
            placeables: vec![Placeable {
                object_id: 0,
                position: Vector3::new(1.0, 2.0, 3.0),
                rotation: Vector3::new(0.0, 0.0, 90.0),
                scale: Vector3::new(1.0, 1.0, 1.0),
            }],
            lights: vec![Light {
                position: Vector3::new(5.0, 6.0, 7.0),
                color: Vector3::new(1.0, 0.9, 0.8),
                radius: 40.0,
                attenuation: 200.0,
                flags: 0,
            }],
        }
    }

    #[test]
    fn should_round_trip_all_counts_and_content() {
        let scene = sample_scene();
        let bytes = write_scene(&scene);
        let read = read_scene(&bytes).unwrap();

        assert_eq!(read.materials.len(), scene.materials.len());
        assert_eq!(read.materials, scene.materials);
        assert_eq!(read.objects.len(), scene.objects.len());
        assert_eq!(read.objects[0].meshes.len(), 1);
        assert_eq!(read.objects[0].meshes[0].vertices, scene.objects[0].meshes[0].vertices);
        assert_eq!(read.objects[0].meshes[0].indices, scene.objects[0].meshes[0].indices);
        assert_eq!(read.placeables.len(), 1);
        assert_eq!(read.placeables[0].rotation, Vector3::new(0.0, 0.0, 90.0));
        assert_eq!(read.lights.len(), 1);
        assert_eq!(read.lights[0].attenuation, 200.0);
        assert_eq!(read.total_vertices(), scene.total_vertices());
        assert_eq!(read.total_triangles(), scene.total_triangles());
    }

    #[test]
    fn should_write_deterministic_bytes() {
        let scene = sample_scene();
        assert_eq!(write_scene(&scene), write_scene(&scene));
    }

    #[test]
    fn should_reject_foreign_magic() {
        assert!(matches!(
            read_scene(b"WGSC\x01\x00\x00\x00"),
            Err(Error::BadMagic { .. })
        ));
    }
}
