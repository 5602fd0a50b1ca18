//! Tag-dispatched decoding of fragment payloads.
//!
//! Each recognized type tag has a fixed payload layout, decoded here into a
//! plain struct. Tags outside the recognized set stay opaque so that
//! positional references to them still resolve structurally. All decoding
//! is local to one payload; no cross-fragment state is touched.

use crate::cursor::Cursor;
use crate::error::Result;

use super::{decrypt_strings, Version};

pub const TAG_TEXTURE_SOURCE: u32 = 0x03;
pub const TAG_TEXTURE_LIST: u32 = 0x04;
pub const TAG_TEXTURE_LIST_REF: u32 = 0x05;
pub const TAG_ACTOR_DEF: u32 = 0x14;
pub const TAG_OBJECT_INSTANCE: u32 = 0x15;
pub const TAG_LIGHT_DEF: u32 = 0x1B;
pub const TAG_LIGHT_REF: u32 = 0x1C;
pub const TAG_LIGHT_PLACEMENT: u32 = 0x28;
pub const TAG_MESH_REF: u32 = 0x2D;
pub const TAG_MATERIAL_DEF: u32 = 0x30;
pub const TAG_MATERIAL_LIST: u32 = 0x31;
pub const TAG_MESH_GEOMETRY: u32 = 0x36;

/// Polygon flag bit marking geometry the player can pass through.
pub const POLYGON_PASSABLE: u16 = 0x10;

/// Texture-list flag bit marking a frame-animated texture.
const TEXTURE_LIST_ANIMATED: u32 = 0x08;

/// Texture filenames, stored obfuscated like the string hash.
#[derive(Debug, Clone)]
pub struct TextureSource {
    pub filenames: Vec<String>,
}

/// A texture list. On disk the record looks like a counted array, but the
/// count is always zero and exactly one reference follows; it is decoded
/// as a fixed single-reference record. `declared_count` preserves whatever
/// the file said so callers can flag the unexpected case.
#[derive(Debug, Clone)]
pub struct TextureList {
    pub flags: u32,
    pub declared_count: u32,
    pub delay_ms: u32,
    pub source_ref: i32,
}

impl TextureList {
    pub fn animated(&self) -> bool {
        self.flags & TEXTURE_LIST_ANIMATED != 0
    }
}

#[derive(Debug, Clone)]
pub struct TextureListRef {
    pub list_ref: i32,
    pub flags: u32,
}

#[derive(Debug, Clone)]
pub struct MaterialDef {
    pub flags: u32,
    pub param: u32,
    pub texture_ref: i32,
    pub brightness: f32,
    pub scaled_ambient: f32,
}

#[derive(Debug, Clone)]
pub struct MaterialList {
    pub flags: u32,
    pub material_refs: Vec<i32>,
}

#[derive(Debug, Clone)]
pub struct ActorDef {
    pub flags: u32,
    pub callback_ref: i32,
    pub mesh_refs: Vec<i32>,
}

/// An instancing record: place a previously defined actor somewhere.
/// `actor_ref` is positional when positive and a name reference when
/// negative (instances may live in a different file than the definition
/// they place).
#[derive(Debug, Clone)]
pub struct ObjectInstance {
    pub actor_ref: i32,
    pub flags: u32,
    pub position: [f32; 3],
    /// Raw rotation in 512ths of a full circle, as stored.
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
}

#[derive(Debug, Clone)]
pub struct LightDef {
    pub flags: u32,
    pub attenuation: f32,
    pub color: [f32; 3],
}

#[derive(Debug, Clone)]
pub struct LightRef {
    pub def_ref: i32,
    pub flags: u32,
}

#[derive(Debug, Clone)]
pub struct LightPlacement {
    pub light_ref: i32,
    pub flags: u32,
    pub position: [f32; 3],
    pub radius: f32,
}

#[derive(Debug, Clone)]
pub struct MeshRef {
    pub mesh_ref: i32,
    pub flags: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct Polygon {
    pub flags: u16,
    pub indices: [u16; 3],
}

/// A run-length pair: `count` consecutive entries share `value`.
#[derive(Debug, Clone, Copy)]
pub struct Run {
    pub count: u16,
    pub value: u16,
}

/// Decoded mesh geometry. Positions are unpacked to world-unit floats
/// here (the record stores them as scaled i16 around a center point);
/// splitting into per-material meshes happens in the resolver.
#[derive(Debug, Clone)]
pub struct MeshGeometry {
    pub flags: u32,
    pub material_list_ref: i32,
    pub anim_ref: i32,
    pub center: [f32; 3],
    pub max_dist: f32,
    pub min: [f32; 3],
    pub max: [f32; 3],
    pub positions: Vec<[f32; 3]>,
    pub tex_coords: Vec<[f32; 2]>,
    pub normals: Vec<[f32; 3]>,
    pub colors: Vec<u32>,
    pub polygons: Vec<Polygon>,
    /// Bone assignment runs over the vertex array, in order.
    pub bone_runs: Vec<Run>,
    /// Material-slot runs over the polygon array, in order.
    pub material_runs: Vec<Run>,
}

/// Every fragment kind this crate understands, plus an explicit opaque
/// variant for everything else.
#[derive(Debug)]
pub enum FragmentKind {
    TextureSource(TextureSource),
    TextureList(TextureList),
    TextureListRef(TextureListRef),
    MaterialDef(MaterialDef),
    MaterialList(MaterialList),
    ActorDef(ActorDef),
    ObjectInstance(ObjectInstance),
    LightDef(LightDef),
    LightRef(LightRef),
    LightPlacement(LightPlacement),
    MeshRef(MeshRef),
    MeshGeometry(MeshGeometry),
    /// Unrecognized or malformed record, payload retained verbatim.
    Opaque(Vec<u8>),
}

/// Decode one payload. `Ok(None)` means the tag is not recognized; an
/// `Err` means the payload was shorter than its layout requires.
pub(crate) fn decode(tag: u32, payload: &[u8], version: Version) -> Result<Option<FragmentKind>> {
    let mut c = Cursor::new(payload);
    let kind = match tag {
        TAG_TEXTURE_SOURCE => FragmentKind::TextureSource(decode_texture_source(&mut c)?),
        TAG_TEXTURE_LIST => FragmentKind::TextureList(decode_texture_list(&mut c)?),
        TAG_TEXTURE_LIST_REF => FragmentKind::TextureListRef(TextureListRef {
            list_ref: c.read_i32()?,
            flags: c.read_u32()?,
        }),
        TAG_MATERIAL_DEF => FragmentKind::MaterialDef(MaterialDef {
            flags: c.read_u32()?,
            param: c.read_u32()?,
            texture_ref: c.read_i32()?,
            brightness: c.read_f32()?,
            scaled_ambient: c.read_f32()?,
        }),
        TAG_MATERIAL_LIST => {
            let flags = c.read_u32()?;
            let count = c.read_u32()? as usize;
            let mut material_refs = Vec::with_capacity(count);
            for _ in 0..count {
                material_refs.push(c.read_i32()?);
            }
            FragmentKind::MaterialList(MaterialList {
                flags,
                material_refs,
            })
        }
        TAG_ACTOR_DEF => {
            let flags = c.read_u32()?;
            let callback_ref = c.read_i32()?;
            let count = c.read_u32()? as usize;
            let mut mesh_refs = Vec::with_capacity(count);
            for _ in 0..count {
                mesh_refs.push(c.read_i32()?);
            }
            FragmentKind::ActorDef(ActorDef {
                flags,
                callback_ref,
                mesh_refs,
            })
        }
        TAG_OBJECT_INSTANCE => FragmentKind::ObjectInstance(ObjectInstance {
            actor_ref: c.read_i32()?,
            flags: c.read_u32()?,
            position: c.read_vec3()?,
            rotation: c.read_vec3()?,
            scale: c.read_vec3()?,
        }),
        TAG_LIGHT_DEF => FragmentKind::LightDef(LightDef {
            flags: c.read_u32()?,
            attenuation: c.read_f32()?,
            color: c.read_vec3()?,
        }),
        TAG_LIGHT_REF => FragmentKind::LightRef(LightRef {
            def_ref: c.read_i32()?,
            flags: c.read_u32()?,
        }),
        TAG_LIGHT_PLACEMENT => FragmentKind::LightPlacement(LightPlacement {
            light_ref: c.read_i32()?,
            flags: c.read_u32()?,
            position: c.read_vec3()?,
            radius: c.read_f32()?,
        }),
        TAG_MESH_REF => FragmentKind::MeshRef(MeshRef {
            mesh_ref: c.read_i32()?,
            flags: c.read_u32()?,
        }),
        TAG_MESH_GEOMETRY => FragmentKind::MeshGeometry(decode_mesh(&mut c, version)?),
        _ => return Ok(None),
    };
    Ok(Some(kind))
}

fn decode_texture_source(c: &mut Cursor) -> Result<TextureSource> {
    let count = c.read_u32()? as usize;
    let mut filenames = Vec::with_capacity(count);
    for _ in 0..count {
        let len = c.read_u16()? as usize;
        let decoded = decrypt_strings(c.read_bytes(len)?);
        let end = decoded.iter().position(|&b| b == 0).unwrap_or(decoded.len());
        filenames.push(String::from_utf8_lossy(&decoded[..end]).into_owned());
    }
    Ok(TextureSource { filenames })
}

fn decode_texture_list(c: &mut Cursor) -> Result<TextureList> {
    let flags = c.read_u32()?;
    let declared_count = c.read_u32()?;
    let delay_ms = if flags & TEXTURE_LIST_ANIMATED != 0 {
        c.read_u32()?
    } else {
        0
    };
    // The count field lies (see the type doc): exactly one reference
    // follows regardless of its value.
    let source_ref = c.read_i32()?;
    Ok(TextureList {
        flags,
        declared_count,
        delay_ms,
        source_ref,
    })
}

fn decode_mesh(c: &mut Cursor, version: Version) -> Result<MeshGeometry> {
    let flags = c.read_u32()?;
    let material_list_ref = c.read_i32()?;
    let anim_ref = c.read_i32()?;
    c.skip(8)?; // two reference fields with no bearing on geometry
    let center = c.read_vec3()?;
    c.skip(12)?; // three display-list parameters
    let max_dist = c.read_f32()?;
    let min = c.read_vec3()?;
    let max = c.read_vec3()?;

    let vertex_count = c.read_u16()? as usize;
    let uv_count = c.read_u16()? as usize;
    let normal_count = c.read_u16()? as usize;
    let color_count = c.read_u16()? as usize;
    let polygon_count = c.read_u16()? as usize;
    let bone_run_count = c.read_u16()? as usize;
    let material_run_count = c.read_u16()? as usize;
    let vertex_run_count = c.read_u16()? as usize;
    let pad_count = c.read_u16()? as usize;
    let scale = 1.0 / f32::from(1u16 << c.read_u16()?.min(15));

    let mut positions = Vec::with_capacity(vertex_count);
    for _ in 0..vertex_count {
        let x = f32::from(c.read_i16()?) * scale + center[0];
        let y = f32::from(c.read_i16()?) * scale + center[1];
        let z = f32::from(c.read_i16()?) * scale + center[2];
        positions.push([x, y, z]);
    }

    let mut tex_coords = Vec::with_capacity(uv_count);
    for _ in 0..uv_count {
        let uv = match version {
            Version::Old => [
                f32::from(c.read_i16()?) / 256.0,
                f32::from(c.read_i16()?) / 256.0,
            ],
            Version::New => [c.read_f32()?, c.read_f32()?],
        };
        tex_coords.push(uv);
    }

    let mut normals = Vec::with_capacity(normal_count);
    for _ in 0..normal_count {
        normals.push([
            f32::from(c.read_i8()?) / 127.0,
            f32::from(c.read_i8()?) / 127.0,
            f32::from(c.read_i8()?) / 127.0,
        ]);
    }

    let mut colors = Vec::with_capacity(color_count);
    for _ in 0..color_count {
        colors.push(c.read_u32()?);
    }

    let mut polygons = Vec::with_capacity(polygon_count);
    for _ in 0..polygon_count {
        polygons.push(Polygon {
            flags: c.read_u16()?,
            indices: [c.read_u16()?, c.read_u16()?, c.read_u16()?],
        });
    }

    let mut bone_runs = Vec::with_capacity(bone_run_count);
    for _ in 0..bone_run_count {
        bone_runs.push(Run {
            count: c.read_u16()?,
            value: c.read_u16()?,
        });
    }

    let mut material_runs = Vec::with_capacity(material_run_count);
    for _ in 0..material_run_count {
        material_runs.push(Run {
            count: c.read_u16()?,
            value: c.read_u16()?,
        });
    }

    // Per-vertex material runs and trailing display data are not used by
    // the conversion; consume them so the record is fully accounted for.
    c.skip(vertex_run_count * 4)?;
    c.skip(pad_count * 12)?;

    Ok(MeshGeometry {
        flags,
        material_list_ref,
        anim_ref,
        center,
        max_dist,
        min,
        max,
        positions,
        tex_coords,
        normals,
        colors,
        polygons,
        bone_runs,
        material_runs,
    })
}
