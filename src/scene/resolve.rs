//! Reference resolution: one forward pass over a fragment table, turning
//! records into scene entities and wiring their positional back-references
//! to already-resolved entries.
//!
//! The walk never aborts on a bad reference. A zero index means "absent"
//! and is legal; any other index that does not land on a suitable entry is
//! a dangling reference, which is logged, tallied and replaced with a
//! sentinel (the fallback material, an empty object) so the rest of the
//! file still converts.
//!
//! Mesh fragments are split into per-material-slot pieces here, but the
//! slot is only validated when the piece is claimed — by an actor
//! definition (object mesh) or, for pieces nothing claims, by the
//! end-of-run sweep that coalesces them into the zone object (zone mesh).

use std::collections::HashMap;
use std::fmt;

use cgmath::Vector3;
use log::warn;

use crate::fragment::{FragmentFile, FragmentKind, MeshGeometry, POLYGON_PASSABLE};
use crate::pipeline::ConversionSummary;
use crate::scene::{
    Light, MATERIAL_ANIMATED, Material, Mesh, Placeable, Scene, SceneObject, Vertex,
};

/// Rotation unit of instance records: 512ths of a full circle.
const ROTATION_DIVISOR: f32 = 512.0;

/// Where a mesh ended up, for fallback diagnostics.
#[derive(Debug, Clone, Copy)]
enum MeshContext {
    Zone,
    Object,
}

impl fmt::Display for MeshContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshContext::Zone => write!(f, "zone"),
            MeshContext::Object => write!(f, "object"),
        }
    }
}

/// Per-file resolution results, parallel to the fragment table.
enum Entry {
    None,
    Textures(Vec<String>),
    TextureList {
        names: Vec<String>,
        animated: bool,
        delay_ms: u32,
    },
    TextureListRef(usize),
    Material(u32),
    MaterialSlots(Vec<u32>),
    Meshes(usize),
    MeshRef(usize),
    Object(u32),
    LightDef {
        color: [f32; 3],
        attenuation: f32,
        flags: u32,
    },
    LightRef(usize),
}

/// A mesh piece split out of a geometry fragment, not yet bound to a
/// scene material: `slot` still has to be validated against `slots` of
/// its group.
struct PendingMesh {
    slot: u16,
    collidable: bool,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

/// All pieces of one geometry fragment plus its resolved slot table.
struct PendingGroup {
    slots: Vec<u32>,
    meshes: Vec<PendingMesh>,
}

/// Accumulates scene entities across the fragment files of one conversion
/// run and finalizes them into an immutable [`Scene`].
pub struct SceneBuilder {
    materials: Vec<Material>,
    objects: Vec<SceneObject>,
    placeables: Vec<Placeable>,
    lights: Vec<Light>,
    zone_meshes: Vec<Mesh>,
    object_names: HashMap<String, u32>,
    fallback_material: Option<u32>,
    fallback_object: Option<u32>,
    pub summary: ConversionSummary,
}

impl Default for SceneBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self {
            materials: Vec::new(),
            objects: Vec::new(),
            placeables: Vec::new(),
            lights: Vec::new(),
            zone_meshes: Vec::new(),
            object_names: HashMap::new(),
            fallback_material: None,
            fallback_object: None,
            summary: ConversionSummary::default(),
        }
    }

    /// Walk one fragment table in order, appending everything it defines.
    pub fn resolve_file(&mut self, file: &FragmentFile) {
        self.summary.unrecognized_fragments += file.unrecognized;
        self.summary.truncated_fragments += file.truncated;
        self.summary.suspect_texture_lists += file.suspect_texture_lists;

        let mut entries: Vec<Entry> = Vec::with_capacity(file.fragments.len());
        let mut pending: Vec<Option<PendingGroup>> = Vec::new();

        for (index, fragment) in file.fragments.iter().enumerate() {
            let entry = match &fragment.kind {
                FragmentKind::TextureSource(src) => Entry::Textures(src.filenames.clone()),

                FragmentKind::TextureList(list) => {
                    let names = match self.resolve_ref(&entries, list.source_ref, index, "texture list source") {
                        Some(Entry::Textures(names)) => names.clone(),
                        Some(_) => {
                            self.dangle(index, "texture list source", list.source_ref);
                            Vec::new()
                        }
                        None => Vec::new(),
                    };
                    Entry::TextureList {
                        names,
                        animated: list.animated(),
                        delay_ms: list.delay_ms,
                    }
                }

                FragmentKind::TextureListRef(r) => {
                    match self.resolve_ref(&entries, r.list_ref, index, "texture list reference") {
                        Some(Entry::TextureList { .. }) => Entry::TextureListRef(index_of(r.list_ref)),
                        Some(_) => {
                            self.dangle(index, "texture list reference", r.list_ref);
                            Entry::None
                        }
                        None => Entry::None,
                    }
                }

                FragmentKind::MaterialDef(def) => {
                    let mut names = Vec::new();
                    let mut animated = false;
                    let mut delay_ms = 0;
                    match self.resolve_ref(&entries, def.texture_ref, index, "material texture") {
                        Some(Entry::TextureListRef(j)) => {
                            if let Entry::TextureList {
                                names: n,
                                animated: a,
                                delay_ms: d,
                            } = &entries[*j]
                            {
                                names = n.clone();
                                animated = *a;
                                delay_ms = *d;
                            }
                        }
                        Some(Entry::TextureList {
                            names: n,
                            animated: a,
                            delay_ms: d,
                        }) => {
                            names = n.clone();
                            animated = *a;
                            delay_ms = *d;
                        }
                        Some(_) => self.dangle(index, "material texture", def.texture_ref),
                        None => {}
                    }
                    let mut flags = def.flags;
                    let mut param = def.param;
                    if animated {
                        flags |= MATERIAL_ANIMATED;
                        param = delay_ms;
                    }
                    let id = self.materials.len() as u32;
                    self.materials.push(Material {
                        flags,
                        param,
                        filenames: names,
                    });
                    Entry::Material(id)
                }

                FragmentKind::MaterialList(list) => {
                    let mut slots = Vec::with_capacity(list.material_refs.len());
                    for &r in &list.material_refs {
                        let id = match self.resolve_ref(&entries, r, index, "material slot") {
                            Some(Entry::Material(id)) => *id,
                            Some(_) => {
                                self.dangle(index, "material slot", r);
                                self.fallback_material_id()
                            }
                            None => self.fallback_material_id(),
                        };
                        slots.push(id);
                    }
                    Entry::MaterialSlots(slots)
                }

                FragmentKind::MeshGeometry(geometry) => {
                    let slots = match self.resolve_ref(
                        &entries,
                        geometry.material_list_ref,
                        index,
                        "mesh material list",
                    ) {
                        Some(Entry::MaterialSlots(slots)) => slots.clone(),
                        Some(_) => {
                            self.dangle(index, "mesh material list", geometry.material_list_ref);
                            Vec::new()
                        }
                        None => Vec::new(),
                    };
                    pending.push(Some(PendingGroup {
                        slots,
                        meshes: split_mesh(geometry),
                    }));
                    Entry::Meshes(pending.len() - 1)
                }

                FragmentKind::MeshRef(r) => {
                    match self.resolve_ref(&entries, r.mesh_ref, index, "mesh reference") {
                        Some(Entry::Meshes(p)) => Entry::MeshRef(*p),
                        Some(_) => {
                            self.dangle(index, "mesh reference", r.mesh_ref);
                            Entry::None
                        }
                        None => Entry::None,
                    }
                }

                FragmentKind::ActorDef(def) => {
                    let mut object = SceneObject {
                        name: fragment.name.clone(),
                        meshes: Vec::new(),
                    };
                    for &r in &def.mesh_refs {
                        let claimed = match self.resolve_ref(&entries, r, index, "actor mesh") {
                            Some(Entry::Meshes(p)) | Some(Entry::MeshRef(p)) => Some(*p),
                            Some(_) => {
                                self.dangle(index, "actor mesh", r);
                                None
                            }
                            None => None,
                        };
                        if let Some(p) = claimed {
                            match pending[p].take() {
                                Some(group) => {
                                    for mesh in group.meshes {
                                        let mesh =
                                            self.finalize_mesh(mesh, &group.slots, MeshContext::Object);
                                        object.meshes.push(mesh);
                                    }
                                }
                                None => warn!(
                                    "fragment {}: mesh already claimed by an earlier actor, skipping",
                                    index + 1
                                ),
                            }
                        }
                    }
                    let id = self.objects.len() as u32;
                    if let Some(name) = &object.name {
                        self.object_names.insert(name.clone(), id);
                    }
                    self.objects.push(object);
                    Entry::Object(id)
                }

                FragmentKind::ObjectInstance(inst) => {
                    let object_id = if inst.actor_ref > 0 {
                        match self.resolve_ref(&entries, inst.actor_ref, index, "instance actor") {
                            Some(Entry::Object(id)) => *id,
                            Some(_) => {
                                self.dangle(index, "instance actor", inst.actor_ref);
                                self.fallback_object_id()
                            }
                            None => self.fallback_object_id(),
                        }
                    } else if inst.actor_ref < 0 {
                        // Cross-file placement: the actor is referenced by
                        // name through the string hash.
                        match file
                            .strings
                            .name(inst.actor_ref)
                            .and_then(|name| self.object_names.get(&name).copied())
                        {
                            Some(id) => id,
                            None => {
                                self.dangle(index, "instance actor name", inst.actor_ref);
                                self.fallback_object_id()
                            }
                        }
                    } else {
                        self.fallback_object_id()
                    };
                    self.placeables.push(Placeable {
                        object_id,
                        position: Vector3::from(inst.position),
                        rotation: Vector3::from(inst.rotation) * (360.0 / ROTATION_DIVISOR),
                        scale: Vector3::from(inst.scale),
                    });
                    Entry::None
                }

                FragmentKind::LightDef(def) => Entry::LightDef {
                    color: def.color,
                    attenuation: def.attenuation,
                    flags: def.flags,
                },

                FragmentKind::LightRef(r) => {
                    match self.resolve_ref(&entries, r.def_ref, index, "light reference") {
                        Some(Entry::LightDef { .. }) => Entry::LightRef(index_of(r.def_ref)),
                        Some(_) => {
                            self.dangle(index, "light reference", r.def_ref);
                            Entry::None
                        }
                        None => Entry::None,
                    }
                }

                FragmentKind::LightPlacement(placement) => {
                    let mut color = [1.0, 1.0, 1.0];
                    let mut attenuation = 0.0;
                    let mut def_flags = 0;
                    match self.resolve_ref(&entries, placement.light_ref, index, "light placement") {
                        Some(Entry::LightRef(j)) => {
                            if let Entry::LightDef {
                                color: c,
                                attenuation: a,
                                flags: f,
                            } = &entries[*j]
                            {
                                color = *c;
                                attenuation = *a;
                                def_flags = *f;
                            }
                        }
                        Some(Entry::LightDef {
                            color: c,
                            attenuation: a,
                            flags: f,
                        }) => {
                            color = *c;
                            attenuation = *a;
                            def_flags = *f;
                        }
                        Some(_) => self.dangle(index, "light placement", placement.light_ref),
                        None => {}
                    }
                    self.lights.push(Light {
                        position: Vector3::from(placement.position),
                        color: Vector3::from(color),
                        radius: placement.radius,
                        attenuation,
                        flags: placement.flags | def_flags,
                    });
                    Entry::None
                }

                FragmentKind::Opaque(_) => Entry::None,
            };
            entries.push(entry);
        }

        // Geometry no actor claimed belongs to the zone itself.
        for group in pending.into_iter().flatten() {
            for mesh in group.meshes {
                let mesh = self.finalize_mesh(mesh, &group.slots, MeshContext::Zone);
                self.zone_meshes.push(mesh);
            }
        }
    }

    /// Assemble the finalized scene. Unclaimed geometry collected over the
    /// whole run becomes a single trailing zone object.
    pub fn finish(mut self) -> (Scene, ConversionSummary) {
        if !self.zone_meshes.is_empty() {
            self.objects.push(SceneObject {
                name: None,
                meshes: std::mem::take(&mut self.zone_meshes),
            });
        }
        (
            Scene {
                materials: self.materials,
                objects: self.objects,
                placeables: self.placeables,
                lights: self.lights,
            },
            self.summary,
        )
    }

    /// Resolve a 1-based back-reference against the entries so far.
    /// Returns `None` without complaint for the legal "absent" zero;
    /// logs and tallies anything else that cannot resolve.
    fn resolve_ref<'e>(
        &mut self,
        entries: &'e [Entry],
        reference: i32,
        at: usize,
        what: &str,
    ) -> Option<&'e Entry> {
        if reference == 0 {
            return None;
        }
        if reference < 0 {
            self.dangle(at, what, reference);
            return None;
        }
        let target = reference as usize - 1;
        if target >= at || target >= entries.len() {
            self.dangle(at, what, reference);
            return None;
        }
        Some(&entries[target])
    }

    fn dangle(&mut self, at: usize, what: &str, reference: i32) {
        warn!(
            "fragment {}: dangling {what} reference {reference}, substituting a sentinel",
            at + 1
        );
        self.summary.dangling_references += 1;
    }

    /// Bind a split mesh piece to a scene material, falling back to the
    /// default material when its slot is out of range.
    fn finalize_mesh(&mut self, mesh: PendingMesh, slots: &[u32], context: MeshContext) -> Mesh {
        let material_id = if (mesh.slot as usize) < slots.len() {
            slots[mesh.slot as usize]
        } else {
            warn!(
                "{context} mesh references material slot {} but only {} slots are bound, using the fallback material",
                mesh.slot,
                slots.len()
            );
            self.summary.material_fallbacks += 1;
            self.fallback_material_id()
        };
        Mesh {
            material_id,
            collidable: mesh.collidable,
            vertices: mesh.vertices,
            indices: mesh.indices,
        }
    }

    fn fallback_material_id(&mut self) -> u32 {
        if let Some(id) = self.fallback_material {
            return id;
        }
        let id = self.materials.len() as u32;
        self.materials.push(Material::fallback());
        self.fallback_material = Some(id);
        id
    }

    fn fallback_object_id(&mut self) -> u32 {
        if let Some(id) = self.fallback_object {
            return id;
        }
        let id = self.objects.len() as u32;
        self.objects.push(SceneObject::default());
        self.fallback_object = Some(id);
        id
    }
}

fn index_of(reference: i32) -> usize {
    reference as usize - 1
}

/// Split a geometry fragment into per-(slot, collidability) mesh pieces,
/// remapping vertices so each piece carries a compact buffer.
fn split_mesh(geometry: &MeshGeometry) -> Vec<PendingMesh> {
    // Expand the run-length bone assignment to one value per vertex.
    let mut bones = vec![0u16; geometry.positions.len()];
    let mut cursor = 0usize;
    for run in &geometry.bone_runs {
        for _ in 0..run.count {
            if cursor < bones.len() {
                bones[cursor] = run.value;
                cursor += 1;
            }
        }
    }

    // Expand the polygon material runs the same way; polygons past the
    // last run land in slot 0.
    let mut poly_slots = vec![0u16; geometry.polygons.len()];
    let mut cursor = 0usize;
    for run in &geometry.material_runs {
        for _ in 0..run.count {
            if cursor < poly_slots.len() {
                poly_slots[cursor] = run.value;
                cursor += 1;
            }
        }
    }

    struct Bucket {
        slot: u16,
        collidable: bool,
        remap: HashMap<u16, u32>,
        mesh: PendingMesh,
    }
    let mut buckets: Vec<Bucket> = Vec::new();

    for (polygon, &slot) in geometry.polygons.iter().zip(&poly_slots) {
        let collidable = polygon.flags & POLYGON_PASSABLE == 0;
        let position = buckets
            .iter()
            .position(|b| b.slot == slot && b.collidable == collidable)
            .unwrap_or_else(|| {
                buckets.push(Bucket {
                    slot,
                    collidable,
                    remap: HashMap::new(),
                    mesh: PendingMesh {
                        slot,
                        collidable,
                        vertices: Vec::new(),
                        indices: Vec::new(),
                    },
                });
                buckets.len() - 1
            });
        let bucket = &mut buckets[position];
        for &source in &polygon.indices {
            let next = bucket.mesh.vertices.len() as u32;
            let index = *bucket.remap.entry(source).or_insert(next);
            if index == next {
                let i = source as usize;
                bucket.mesh.vertices.push(Vertex {
                    position: geometry.positions.get(i).copied().unwrap_or_default(),
                    normal: geometry.normals.get(i).copied().unwrap_or_default(),
                    tex_coord: geometry.tex_coords.get(i).copied().unwrap_or_default(),
                    bone: f32::from(bones.get(i).copied().unwrap_or_default()),
                });
            }
            bucket.mesh.indices.push(index);
        }
    }

    buckets.into_iter().map(|b| b.mesh).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::{
        ActorDef, Fragment, LightDef, LightPlacement, LightRef, MaterialDef, MaterialList,
        MeshGeometry, ObjectInstance, Polygon, Run, StringHash, TextureList, TextureListRef,
        TextureSource, Version, decrypt_strings,
    };

    fn file(fragments: Vec<Fragment>) -> FragmentFile {
        FragmentFile {
            version: Version::Old,
            fragments,
            strings: StringHash::new(&[]),
            unrecognized: 0,
            truncated: 0,
            suspect_texture_lists: 0,
        }
    }

    fn frag(kind: FragmentKind) -> Fragment {
        Fragment {
            tag: 0,
            name: None,
            kind,
        }
    }

    fn named(name: &str, kind: FragmentKind) -> Fragment {
        Fragment {
            tag: 0,
            name: Some(name.to_string()),
            kind,
        }
    }

    fn quad_geometry(material_list_ref: i32, slot: u16) -> MeshGeometry {
        MeshGeometry {
            flags: 0,
            material_list_ref,
            anim_ref: 0,
            center: [0.0; 3],
            max_dist: 0.0,
            min: [0.0; 3],
            max: [0.0; 3],
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            tex_coords: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            normals: vec![[0.0, 0.0, 1.0]; 4],
            colors: Vec::new(),
            polygons: vec![
                Polygon {
                    flags: 0,
                    indices: [0, 1, 2],
                },
                Polygon {
                    flags: 0,
                    indices: [0, 2, 3],
                },
            ],
            bone_runs: Vec::new(),
            material_runs: vec![Run {
                count: 2,
                value: slot,
            }],
        }
    }

    fn material_chain() -> Vec<Fragment> {
        vec![
            frag(FragmentKind::TextureSource(TextureSource {
                filenames: vec!["MAPLE.BMP".into()],
            })),
            frag(FragmentKind::TextureList(TextureList {
                flags: 0,
                declared_count: 0,
                delay_ms: 0,
                source_ref: 1,
            })),
            frag(FragmentKind::TextureListRef(TextureListRef {
                list_ref: 2,
                flags: 0,
            })),
            frag(FragmentKind::MaterialDef(MaterialDef {
                flags: 0,
                param: 0,
                texture_ref: 3,
                brightness: 1.0,
                scaled_ambient: 1.0,
            })),
            frag(FragmentKind::MaterialList(MaterialList {
                flags: 0,
                material_refs: vec![4],
            })),
        ]
    }

    #[test]
    fn should_resolve_a_full_material_chain_into_one_scene_material() {
        let mut fragments = material_chain();
        fragments.push(frag(FragmentKind::MeshGeometry(quad_geometry(5, 0))));
        let mut builder = SceneBuilder::new();
        builder.resolve_file(&file(fragments));
        let (scene, summary) = builder.finish();

        assert_eq!(scene.materials.len(), 1);
        assert_eq!(scene.materials[0].filenames, vec!["MAPLE.BMP".to_string()]);
        // Unclaimed geometry becomes the zone object.
        assert_eq!(scene.objects.len(), 1);
        assert_eq!(scene.objects[0].meshes.len(), 1);
        assert_eq!(scene.objects[0].meshes[0].vertices.len(), 4);
        assert_eq!(scene.objects[0].meshes[0].indices.len(), 6);
        assert_eq!(scene.objects[0].meshes[0].material_id, 0);
        assert_eq!(summary.dangling_references, 0);
        assert_eq!(summary.material_fallbacks, 0);
    }

    #[test]
    fn should_bind_fallback_material_for_out_of_range_slot() {
        let mut fragments = material_chain();
        // Slot 5 in a one-slot list: degrade, don't fail.
        fragments.push(frag(FragmentKind::MeshGeometry(quad_geometry(5, 5))));
        let mut builder = SceneBuilder::new();
        builder.resolve_file(&file(fragments));
        let (scene, summary) = builder.finish();

        assert_eq!(summary.material_fallbacks, 1);
        assert_eq!(scene.materials.len(), 2);
        let mesh = &scene.objects[0].meshes[0];
        assert_eq!(mesh.material_id, 1);
        assert_eq!(scene.materials[1], Material::fallback());
    }

    #[test]
    fn should_substitute_sentinels_for_dangling_references() {
        let fragments = vec![
            // Points past the end of the table.
            frag(FragmentKind::MaterialList(MaterialList {
                flags: 0,
                material_refs: vec![9],
            })),
            frag(FragmentKind::MeshGeometry(quad_geometry(1, 0))),
        ];
        let mut builder = SceneBuilder::new();
        builder.resolve_file(&file(fragments));
        let (scene, summary) = builder.finish();

        assert_eq!(summary.dangling_references, 1);
        // The slot table still has one entry: the fallback material.
        assert_eq!(scene.objects[0].meshes[0].material_id, 0);
        assert_eq!(scene.materials.len(), 1);
        assert_eq!(scene.materials[0], Material::fallback());
    }

    #[test]
    fn should_claim_meshes_into_actor_objects_and_place_them_by_name() {
        let mut fragments = material_chain();
        fragments.push(frag(FragmentKind::MeshGeometry(quad_geometry(5, 0)))); // 6
        fragments.push(named(
            "TREE1_ACTORDEF",
            FragmentKind::ActorDef(ActorDef {
                flags: 0,
                callback_ref: 0,
                mesh_refs: vec![6],
            }),
        ));
        let defs = file(fragments);

        let hash = decrypt_strings(b"\0TREE1_ACTORDEF\0");
        let placements = FragmentFile {
            version: Version::Old,
            fragments: vec![frag(FragmentKind::ObjectInstance(ObjectInstance {
                actor_ref: -1,
                flags: 0,
                position: [1.0, 2.0, 3.0],
                rotation: [0.0, 0.0, 128.0],
                scale: [1.0, 1.0, 1.0],
            }))],
            strings: StringHash::new(&hash),
            unrecognized: 0,
            truncated: 0,
            suspect_texture_lists: 0,
        };

        let mut builder = SceneBuilder::new();
        builder.resolve_file(&defs);
        builder.resolve_file(&placements);
        let (scene, summary) = builder.finish();

        assert_eq!(scene.objects.len(), 1);
        assert_eq!(scene.objects[0].name.as_deref(), Some("TREE1_ACTORDEF"));
        assert_eq!(scene.objects[0].meshes.len(), 1);
        assert_eq!(scene.placeables.len(), 1);
        assert_eq!(scene.placeables[0].object_id, 0);
        // 128/512ths of a circle is 90 degrees.
        assert_eq!(scene.placeables[0].rotation.z, 90.0);
        assert_eq!(summary.dangling_references, 0);
    }

    #[test]
    fn should_merge_light_definition_and_placement() {
        let fragments = vec![
            frag(FragmentKind::LightDef(LightDef {
                flags: 0x4,
                attenuation: 200.0,
                color: [1.0, 0.5, 0.25],
            })),
            frag(FragmentKind::LightRef(LightRef {
                def_ref: 1,
                flags: 0,
            })),
            frag(FragmentKind::LightPlacement(LightPlacement {
                light_ref: 2,
                flags: 0x8,
                position: [10.0, 20.0, 30.0],
                radius: 50.0,
            })),
        ];
        let mut builder = SceneBuilder::new();
        builder.resolve_file(&file(fragments));
        let (scene, _) = builder.finish();

        assert_eq!(scene.lights.len(), 1);
        let light = &scene.lights[0];
        assert_eq!(light.color, Vector3::new(1.0, 0.5, 0.25));
        assert_eq!(light.radius, 50.0);
        assert_eq!(light.attenuation, 200.0);
        assert_eq!(light.flags, 0xC);
    }

    #[test]
    fn should_split_meshes_by_material_run_and_passability() {
        let mut geometry = quad_geometry(0, 0);
        geometry.material_runs = vec![
            Run { count: 1, value: 0 },
            Run { count: 1, value: 1 },
        ];
        geometry.polygons[1].flags = POLYGON_PASSABLE;
        let fragments = vec![frag(FragmentKind::MeshGeometry(geometry))];
        let mut builder = SceneBuilder::new();
        builder.resolve_file(&file(fragments));
        let (scene, summary) = builder.finish();

        // Two pieces: (slot 0, collidable) and (slot 1, passable); both
        // slots dangle off the empty slot table, so both fall back.
        let meshes = &scene.objects[0].meshes;
        assert_eq!(meshes.len(), 2);
        assert!(meshes[0].collidable);
        assert!(!meshes[1].collidable);
        assert_eq!(meshes[0].vertices.len(), 3);
        assert_eq!(meshes[1].vertices.len(), 3);
        assert_eq!(summary.material_fallbacks, 2);
    }

    #[test]
    fn should_assign_bone_indices_from_runs() {
        let mut geometry = quad_geometry(0, 0);
        geometry.bone_runs = vec![
            Run { count: 2, value: 0 },
            Run { count: 2, value: 3 },
        ];
        let fragments = vec![frag(FragmentKind::MeshGeometry(geometry))];
        let mut builder = SceneBuilder::new();
        builder.resolve_file(&file(fragments));
        let (scene, _) = builder.finish();

        let mesh = &scene.objects[0].meshes[0];
        let bones: Vec<f32> = mesh.vertices.iter().map(|v| v.bone).collect();
        assert_eq!(bones, vec![0.0, 0.0, 3.0, 3.0]);
    }
}
