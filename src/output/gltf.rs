//! GLB (binary glTF 2.0) export.
//!
//! The interchange form packs all vertex/index data and converted PNG
//! textures into the single GLB binary chunk, with one glTF mesh per
//! scene object (one primitive per scene mesh) and one node per placeable.
//! Objects nothing places (the zone geometry) get a static node at the
//! identity transform.
//!
//! Coordinate convention: the source scene is Z-up, glTF is Y-up. The
//! single uniform transform `(x, y, z) -> (x, z, -y)` is applied to every
//! vertex position and normal and to every node translation and rotation
//! (the quaternion's vector part transforms like a vector under the axis
//! change, its scalar part is untouched). Triangle winding is reversed so
//! faces stay front-facing under the flipped axis.

use std::borrow::Cow;
use std::collections::BTreeMap;

use cgmath::{Deg, Euler, Quaternion};
use gltf::json;
use json::validation::Checked::Valid;
use json::validation::USize64;

use crate::error::{Error, Result};
use crate::scene::{Mesh, Scene};
use crate::textures::png_name;

/// Apply the Z-up to Y-up axis change to a vector.
fn to_y_up(v: [f32; 3]) -> [f32; 3] {
    [v[0], v[2], -v[1]]
}

/// Serialize a finalized scene and its converted textures to a GLB byte
/// buffer. `textures` maps converted PNG names to PNG bytes; the ordered
/// map keeps the output byte-identical across runs.
pub fn write_glb(scene: &Scene, textures: &BTreeMap<String, Vec<u8>>) -> Result<Vec<u8>> {
    let mut root = json::Root {
        asset: json::Asset {
            version: "2.0".to_string(),
            generator: Some("zonelift".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    let mut bin: Vec<u8> = Vec::new();

    let sampler = root.push(json::texture::Sampler {
        mag_filter: Some(Valid(json::texture::MagFilter::Linear)),
        min_filter: Some(Valid(json::texture::MinFilter::LinearMipmapLinear)),
        wrap_s: Valid(json::texture::WrappingMode::Repeat),
        wrap_t: Valid(json::texture::WrappingMode::Repeat),
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    });

    // Embed every converted texture and remember its glTF texture index.
    let mut texture_indices = BTreeMap::new();
    for (name, png) in textures {
        let view = push_view(&mut root, &mut bin, png, None);
        let image = root.push(json::Image {
            buffer_view: Some(view),
            mime_type: Some(json::image::MimeType("image/png".to_string())),
            uri: None,
            name: Some(name.clone()),
            extensions: Default::default(),
            extras: Default::default(),
        });
        let texture = root.push(json::Texture {
            source: image,
            sampler: Some(sampler),
            name: None,
            extensions: Default::default(),
            extras: Default::default(),
        });
        texture_indices.insert(name.clone(), texture);
    }

    for (index, material) in scene.materials.iter().enumerate() {
        let base_color_texture = material
            .filenames
            .first()
            .and_then(|name| texture_indices.get(&png_name(name)))
            .map(|&texture| json::texture::Info {
                index: texture,
                tex_coord: 0,
                extensions: Default::default(),
                extras: Default::default(),
            });
        let (alpha_mode, alpha_cutoff) = if material.is_translucent() {
            (json::material::AlphaMode::Blend, None)
        } else if material.is_masked() {
            (
                json::material::AlphaMode::Mask,
                Some(json::material::AlphaCutoff(0.5)),
            )
        } else {
            (json::material::AlphaMode::Opaque, None)
        };
        root.push(json::Material {
            name: Some(format!("material_{index}")),
            alpha_cutoff,
            alpha_mode: Valid(alpha_mode),
            pbr_metallic_roughness: json::material::PbrMetallicRoughness {
                base_color_texture,
                metallic_factor: json::material::StrengthFactor(0.0),
                roughness_factor: json::material::StrengthFactor(1.0),
                ..Default::default()
            },
            ..Default::default()
        });
    }

    // One glTF mesh per object; objects with no geometry get none.
    let mut object_meshes: Vec<Option<json::Index<json::Mesh>>> = Vec::new();
    for (index, object) in scene.objects.iter().enumerate() {
        let primitives: Vec<json::mesh::Primitive> = object
            .meshes
            .iter()
            .filter(|mesh| !mesh.vertices.is_empty() && !mesh.indices.is_empty())
            .map(|mesh| push_primitive(&mut root, &mut bin, mesh))
            .collect();
        if primitives.is_empty() {
            object_meshes.push(None);
            continue;
        }
        let name = object
            .name
            .clone()
            .unwrap_or_else(|| format!("object_{index}"));
        object_meshes.push(Some(root.push(json::Mesh {
            primitives,
            weights: None,
            name: Some(name),
            extensions: Default::default(),
            extras: Default::default(),
        })));
    }

    // One node per placeable, plus a static node for every object no
    // placeable references (the zone geometry, chiefly).
    let mut scene_nodes = Vec::new();
    for (index, placeable) in scene.placeables.iter().enumerate() {
        let mesh = object_meshes
            .get(placeable.object_id as usize)
            .copied()
            .flatten();
        let q = Quaternion::from(Euler::new(
            Deg(placeable.rotation.x),
            Deg(placeable.rotation.y),
            Deg(placeable.rotation.z),
        ));
        let rotation = json::scene::UnitQuaternion([q.v.x, q.v.z, -q.v.y, q.s]);
        let node = root.push(json::Node {
            mesh,
            name: Some(format!("placeable_{index}")),
            translation: Some(to_y_up(placeable.position.into())),
            rotation: Some(rotation),
            scale: Some([placeable.scale.x, placeable.scale.z, placeable.scale.y]),
            ..Default::default()
        });
        scene_nodes.push(node);
    }
    for (index, mesh) in object_meshes.iter().enumerate() {
        let placed = scene
            .placeables
            .iter()
            .any(|p| p.object_id as usize == index);
        if placed {
            continue;
        }
        if let Some(mesh) = mesh {
            let name = scene.objects[index]
                .name
                .clone()
                .unwrap_or_else(|| format!("object_{index}"));
            let node = root.push(json::Node {
                mesh: Some(*mesh),
                name: Some(name),
                ..Default::default()
            });
            scene_nodes.push(node);
        }
    }

    let scene_index = root.push(json::Scene {
        nodes: scene_nodes,
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    });
    root.scene = Some(scene_index);

    while bin.len() % 4 != 0 {
        bin.push(0);
    }
    if !bin.is_empty() {
        root.push(json::Buffer {
            byte_length: USize64::from(bin.len()),
            uri: None,
            name: None,
            extensions: Default::default(),
            extras: Default::default(),
        });
    }

    let json_string =
        json::serialize::to_string(&root).map_err(|e| Error::Serialize(e.to_string()))?;
    let glb = gltf::binary::Glb {
        header: gltf::binary::Header {
            magic: *b"glTF",
            version: 2,
            length: 0, // computed by the writer
        },
        json: Cow::Owned(json_string.into_bytes()),
        bin: if bin.is_empty() {
            None
        } else {
            Some(Cow::Owned(bin))
        },
    };
    let mut out = Vec::new();
    glb.to_writer(&mut out)
        .map_err(|e| Error::Serialize(e.to_string()))?;
    Ok(out)
}

fn push_view(
    root: &mut json::Root,
    bin: &mut Vec<u8>,
    bytes: &[u8],
    target: Option<json::buffer::Target>,
) -> json::Index<json::buffer::View> {
    let byte_offset = bin.len();
    bin.extend_from_slice(bytes);
    while bin.len() % 4 != 0 {
        bin.push(0);
    }
    root.push(json::buffer::View {
        buffer: json::Index::new(0),
        byte_length: USize64::from(bytes.len()),
        byte_offset: Some(USize64::from(byte_offset)),
        byte_stride: None,
        target: target.map(Valid),
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    })
}

fn push_primitive(
    root: &mut json::Root,
    bin: &mut Vec<u8>,
    mesh: &Mesh,
) -> json::mesh::Primitive {
    let positions: Vec<[f32; 3]> = mesh.vertices.iter().map(|v| to_y_up(v.position)).collect();
    let normals: Vec<[f32; 3]> = mesh.vertices.iter().map(|v| to_y_up(v.normal)).collect();
    let uvs: Vec<[f32; 2]> = mesh.vertices.iter().map(|v| v.tex_coord).collect();
    // The axis change flips handedness, so winding reverses with it.
    let indices: Vec<u32> = mesh
        .indices
        .chunks_exact(3)
        .flat_map(|t| [t[0], t[2], t[1]])
        .collect();

    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    for p in &positions {
        for axis in 0..3 {
            min[axis] = min[axis].min(p[axis]);
            max[axis] = max[axis].max(p[axis]);
        }
    }

    let mut flat = Vec::with_capacity(positions.len() * 12);
    for p in &positions {
        for value in p {
            flat.extend_from_slice(&value.to_le_bytes());
        }
    }
    let view = push_view(root, bin, &flat, Some(json::buffer::Target::ArrayBuffer));
    let position_accessor = root.push(json::Accessor {
        buffer_view: Some(view),
        byte_offset: Some(USize64(0)),
        count: USize64::from(positions.len()),
        component_type: Valid(json::accessor::GenericComponentType(
            json::accessor::ComponentType::F32,
        )),
        type_: Valid(json::accessor::Type::Vec3),
        min: Some(json::Value::from(min.to_vec())),
        max: Some(json::Value::from(max.to_vec())),
        name: None,
        normalized: false,
        sparse: None,
        extensions: Default::default(),
        extras: Default::default(),
    });

    let mut flat = Vec::with_capacity(normals.len() * 12);
    for n in &normals {
        for value in n {
            flat.extend_from_slice(&value.to_le_bytes());
        }
    }
    let view = push_view(root, bin, &flat, Some(json::buffer::Target::ArrayBuffer));
    let normal_accessor = root.push(json::Accessor {
        buffer_view: Some(view),
        byte_offset: Some(USize64(0)),
        count: USize64::from(normals.len()),
        component_type: Valid(json::accessor::GenericComponentType(
            json::accessor::ComponentType::F32,
        )),
        type_: Valid(json::accessor::Type::Vec3),
        min: None,
        max: None,
        name: None,
        normalized: false,
        sparse: None,
        extensions: Default::default(),
        extras: Default::default(),
    });

    let mut flat = Vec::with_capacity(uvs.len() * 8);
    for uv in &uvs {
        for value in uv {
            flat.extend_from_slice(&value.to_le_bytes());
        }
    }
    let view = push_view(root, bin, &flat, Some(json::buffer::Target::ArrayBuffer));
    let uv_accessor = root.push(json::Accessor {
        buffer_view: Some(view),
        byte_offset: Some(USize64(0)),
        count: USize64::from(uvs.len()),
        component_type: Valid(json::accessor::GenericComponentType(
            json::accessor::ComponentType::F32,
        )),
        type_: Valid(json::accessor::Type::Vec2),
        min: None,
        max: None,
        name: None,
        normalized: false,
        sparse: None,
        extensions: Default::default(),
        extras: Default::default(),
    });

    let mut flat = Vec::with_capacity(indices.len() * 4);
    for index in &indices {
        flat.extend_from_slice(&index.to_le_bytes());
    }
    let view = push_view(
        root,
        bin,
        &flat,
        Some(json::buffer::Target::ElementArrayBuffer),
    );
    let index_accessor = root.push(json::Accessor {
        buffer_view: Some(view),
        byte_offset: Some(USize64(0)),
        count: USize64::from(indices.len()),
        component_type: Valid(json::accessor::GenericComponentType(
            json::accessor::ComponentType::U32,
        )),
        type_: Valid(json::accessor::Type::Scalar),
        min: None,
        max: None,
        name: None,
        normalized: false,
        sparse: None,
        extensions: Default::default(),
        extras: Default::default(),
    });

    let mut attributes = BTreeMap::new();
    attributes.insert(Valid(json::mesh::Semantic::Positions), position_accessor);
    attributes.insert(Valid(json::mesh::Semantic::Normals), normal_accessor);
    attributes.insert(Valid(json::mesh::Semantic::TexCoords(0)), uv_accessor);

    json::mesh::Primitive {
        attributes,
        indices: Some(index_accessor),
        // Materials were pushed in scene order, so the scene material id is
        // the glTF material index.
        material: if (mesh.material_id as usize) < root.materials.len() {
            Some(json::Index::new(mesh.material_id))
        } else {
            None
        },
        mode: Valid(json::mesh::Mode::Triangles),
        targets: None,
        extensions: Default::default(),
        extras: Default::default(),
    }
}
