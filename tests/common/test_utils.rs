// Each integration test binary compiles its own copy of this module and
// uses a different subset of the builders.
#![allow(dead_code)]

use std::io::Write as _;

use flate2::Compression;
use flate2::write::ZlibEncoder;

use zonelift::archive::{ARCHIVE_MAGIC, BLOCK_SIZE, DIRECTORY_CHECKSUM};
use zonelift::cursor::Writer;
use zonelift::fragment::{SCENE_MAGIC, decrypt_strings};

/// Builds a scene file fragment by fragment.
pub struct WldBuilder {
    hash: Vec<u8>,
    fragments: Vec<(u32, i32, Vec<u8>)>,
}

impl WldBuilder {
    pub fn new() -> Self {
        Self {
            hash: Vec::new(),
            fragments: Vec::new(),
        }
    }

    /// Install a string hash holding `names`; returns the name_ref value
    /// for each.
    pub fn with_names(names: &[&str]) -> (Self, Vec<i32>) {
        let mut plain = vec![0u8];
        let mut refs = Vec::new();
        for name in names {
            refs.push(-(plain.len() as i32));
            plain.extend_from_slice(name.as_bytes());
            plain.push(0);
        }
        let mut builder = Self::new();
        builder.hash = decrypt_strings(&plain);
        (builder, refs)
    }

    /// Append a fragment; returns its 1-based table position.
    pub fn fragment(&mut self, tag: u32, name_ref: i32, payload: Vec<u8>) -> i32 {
        self.fragments.push((tag, name_ref, payload));
        self.fragments.len() as i32
    }

    pub fn build(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_u32(SCENE_MAGIC);
        w.write_u32(0x0001_5500);
        w.write_u32(self.fragments.len() as u32);
        w.write_u32(0);
        w.write_u32(0);
        w.write_u32(self.hash.len() as u32);
        w.write_u32(0);
        w.write_bytes(&self.hash);
        for (tag, name_ref, payload) in &self.fragments {
            w.write_u32(payload.len() as u32 + 4);
            w.write_u32(*tag);
            w.write_i32(*name_ref);
            w.write_bytes(payload);
        }
        w.into_bytes()
    }
}

impl Default for WldBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn texture_source_payload(filenames: &[&str]) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_u32(filenames.len() as u32);
    for name in filenames {
        let mut plain = name.as_bytes().to_vec();
        plain.push(0);
        let encoded = decrypt_strings(&plain);
        w.write_u16(encoded.len() as u16);
        w.write_bytes(&encoded);
    }
    w.into_bytes()
}

pub fn texture_list_payload(count: u32, source_ref: i32) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_u32(0); // flags: not animated
    w.write_u32(count);
    w.write_i32(source_ref);
    w.into_bytes()
}

pub fn texture_list_ref_payload(list_ref: i32) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_i32(list_ref);
    w.write_u32(0);
    w.into_bytes()
}

pub fn material_payload(flags: u32, param: u32, texture_ref: i32) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_u32(flags);
    w.write_u32(param);
    w.write_i32(texture_ref);
    w.write_f32(1.0); // brightness
    w.write_f32(1.0); // scaled ambient
    w.into_bytes()
}

pub fn material_list_payload(refs: &[i32]) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_u32(0);
    w.write_u32(refs.len() as u32);
    for r in refs {
        w.write_i32(*r);
    }
    w.into_bytes()
}

/// A mesh geometry payload with scale shift 0 and center at the origin,
/// so positions are plain i16 world units.
pub fn mesh_payload(
    positions: &[[i16; 3]],
    polygons: &[(u16, [u16; 3])],
    material_runs: &[(u16, u16)],
    material_list_ref: i32,
) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_u32(0); // flags
    w.write_i32(material_list_ref);
    w.write_i32(0); // anim ref
    w.write_u32(0);
    w.write_u32(0);
    w.write_vec3([0.0; 3]); // center
    w.write_u32(0);
    w.write_u32(0);
    w.write_u32(0);
    w.write_f32(0.0); // max dist
    w.write_vec3([0.0; 3]);
    w.write_vec3([0.0; 3]);
    w.write_u16(positions.len() as u16);
    w.write_u16(positions.len() as u16); // one uv per vertex
    w.write_u16(positions.len() as u16); // one normal per vertex
    w.write_u16(0); // colors
    w.write_u16(polygons.len() as u16);
    w.write_u16(0); // bone runs
    w.write_u16(material_runs.len() as u16);
    w.write_u16(0); // vertex material runs
    w.write_u16(0); // trailing display data
    w.write_u16(0); // scale shift: values are whole units
    for p in positions {
        w.write_i16(p[0]);
        w.write_i16(p[1]);
        w.write_i16(p[2]);
    }
    for i in 0..positions.len() {
        w.write_i16(((i % 2) as i16) * 256); // uv in 1/256ths
        w.write_i16(((i / 2 % 2) as i16) * 256);
    }
    for _ in positions {
        w.write_u8(0);
        w.write_u8(0);
        w.write_u8(127); // +z normal
    }
    for (flags, indices) in polygons {
        w.write_u16(*flags);
        w.write_u16(indices[0]);
        w.write_u16(indices[1]);
        w.write_u16(indices[2]);
    }
    for (count, slot) in material_runs {
        w.write_u16(*count);
        w.write_u16(*slot);
    }
    w.into_bytes()
}

pub fn actor_payload(mesh_refs: &[i32]) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_u32(0); // flags
    w.write_i32(0); // callback
    w.write_u32(mesh_refs.len() as u32);
    for r in mesh_refs {
        w.write_i32(*r);
    }
    w.into_bytes()
}

pub fn instance_payload(
    actor_ref: i32,
    position: [f32; 3],
    rotation_512: [f32; 3],
    scale: [f32; 3],
) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_i32(actor_ref);
    w.write_u32(0);
    w.write_vec3(position);
    w.write_vec3(rotation_512);
    w.write_vec3(scale);
    w.into_bytes()
}

fn deflate_blocks(payload: &[u8]) -> Vec<u8> {
    let mut out = Writer::new();
    for block in payload.chunks(BLOCK_SIZE) {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(block).unwrap();
        let deflated = encoder.finish().unwrap();
        out.write_u32(deflated.len() as u32);
        out.write_u32(block.len() as u32);
        out.write_bytes(&deflated);
    }
    out.into_bytes()
}

/// Assemble a whole archive: one chunk per asset plus the filename
/// directory chunk keyed by its well-known checksum.
pub fn build_archive(assets: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut body = Writer::new();
    body.write_u32(0); // directory offset, patched below
    body.write_magic(&ARCHIVE_MAGIC);

    let mut entries = Vec::new();
    for (index, (_, payload)) in assets.iter().enumerate() {
        let offset = body.position() as u32;
        body.write_bytes(&deflate_blocks(payload));
        entries.push((0x1000_0000 + index as u32, offset, payload.len() as u32));
    }

    let mut dir = Writer::new();
    dir.write_u32(assets.len() as u32);
    for (name, _) in assets {
        dir.write_u32(name.len() as u32 + 1);
        dir.write_bytes(name.as_bytes());
        dir.write_u8(0);
    }
    let dir_bytes = dir.into_bytes();
    let dir_offset = body.position() as u32;
    body.write_bytes(&deflate_blocks(&dir_bytes));
    entries.push((DIRECTORY_CHECKSUM, dir_offset, dir_bytes.len() as u32));

    let directory_offset = body.position() as u32;
    body.write_u32(entries.len() as u32);
    for (checksum, offset, size) in entries {
        body.write_u32(checksum);
        body.write_u32(offset);
        body.write_u32(size);
    }
    body.patch_u32(0, directory_offset);
    body.into_bytes()
}

/// A tiny valid 2x2 truecolor bitmap for texture chunks.
pub fn small_bmp() -> Vec<u8> {
    let mut bmp = Vec::new();
    bmp.extend_from_slice(b"BM");
    let pixel_offset: u32 = 14 + 40;
    let row = 8u32; // 2 pixels x 3 bytes, padded to 4
    let file_size = pixel_offset + row * 2;
    bmp.extend_from_slice(&file_size.to_le_bytes());
    bmp.extend_from_slice(&0u32.to_le_bytes());
    bmp.extend_from_slice(&pixel_offset.to_le_bytes());
    bmp.extend_from_slice(&40u32.to_le_bytes());
    bmp.extend_from_slice(&2i32.to_le_bytes());
    bmp.extend_from_slice(&2i32.to_le_bytes());
    bmp.extend_from_slice(&1u16.to_le_bytes());
    bmp.extend_from_slice(&24u16.to_le_bytes());
    bmp.extend_from_slice(&0u32.to_le_bytes());
    bmp.extend_from_slice(&(row * 2).to_le_bytes());
    bmp.extend_from_slice(&0i32.to_le_bytes());
    bmp.extend_from_slice(&0i32.to_le_bytes());
    bmp.extend_from_slice(&0u32.to_le_bytes());
    bmp.extend_from_slice(&0u32.to_le_bytes());
    bmp.extend_from_slice(&[0, 0, 255, 255, 0, 0, 0, 0]); // red, blue (BGR)
    bmp.extend_from_slice(&[0, 255, 0, 255, 255, 255, 0, 0]); // green, white
    bmp
}

/// A single-quad zone: one textured material, one actor claiming the
/// quad, one placement of that actor at the origin.
pub fn single_quad_zone() -> Vec<u8> {
    let (mut wld, names) = WldBuilder::with_names(&["BOX_ACTORDEF"]);
    let source = wld.fragment(0x03, 0, texture_source_payload(&["STONE.BMP"]));
    let list = wld.fragment(0x04, 0, texture_list_payload(0, source));
    let list_ref = wld.fragment(0x05, 0, texture_list_ref_payload(list));
    let material = wld.fragment(0x30, 0, material_payload(0, 0, list_ref));
    let slots = wld.fragment(0x31, 0, material_list_payload(&[material]));
    let mesh = wld.fragment(
        0x36,
        0,
        mesh_payload(
            &[[0, 0, 0], [1, 0, 0], [1, 1, 0], [0, 1, 0]],
            &[(0, [0, 1, 2]), (0, [0, 2, 3])],
            &[(2, 0)],
            slots,
        ),
    );
    let actor = wld.fragment(0x14, names[0], actor_payload(&[mesh]));
    wld.fragment(
        0x15,
        0,
        instance_payload(actor, [0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [1.0, 1.0, 1.0]),
    );
    wld.build()
}
