//! Whole-archive conversion orchestration.
//!
//! One conversion run is a single batch job over fully buffered inputs:
//!
//! 1. Parse and decompress every input archive
//! 2. Resolve the object-definition files (`*_obj.wld`), so placements
//!    can reference actors by name
//! 3. Resolve the placement file (`objects.wld`) and light file
//!    (`lights.wld`) when present
//! 4. Resolve the main zone file (`<zone>.wld`) — the only required asset
//! 5. Convert every referenced texture to PNG
//! 6. Serialize the finalized scene to the native form and to GLB
//!
//! The run either completes (possibly with logged, tallied anomalies) or
//! fails fatally on archive-level corruption. Recovered anomalies never
//! change the success status, but the summary line makes an anomalous run
//! distinguishable from a clean one.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use log::{error, info, warn};

use crate::archive::Archive;
use crate::error::Error;
use crate::fragment::FragmentFile;
use crate::output::{gltf, native};
use crate::scene::Scene;
use crate::scene::resolve::SceneBuilder;
use crate::textures;

/// Feature toggles supplied by the embedding configuration source.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    /// Scale textures up to power-of-two dimensions.
    pub texture_resampling: bool,
    /// Keep invisible collision-only geometry in the outputs.
    pub include_collision: bool,
    /// Merge meshes that share a material within each object.
    pub optimize_meshes: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            texture_resampling: false,
            include_collision: true,
            optimize_meshes: true,
        }
    }
}

/// Tally of every anomaly recovered during a run. A non-zero tally means
/// the outputs were produced in degraded form somewhere.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConversionSummary {
    pub chunks_dropped: usize,
    pub unrecognized_fragments: usize,
    pub truncated_fragments: usize,
    pub suspect_texture_lists: usize,
    pub dangling_references: usize,
    pub material_fallbacks: usize,
    pub texture_fallbacks: usize,
}

impl ConversionSummary {
    pub fn total_anomalies(&self) -> usize {
        self.chunks_dropped
            + self.unrecognized_fragments
            + self.truncated_fragments
            + self.suspect_texture_lists
            + self.dangling_references
            + self.material_fallbacks
            + self.texture_fallbacks
    }

    pub fn is_clean(&self) -> bool {
        self.total_anomalies() == 0
    }

    /// Emit the end-of-run summary line tooling greps for.
    pub fn log(&self) {
        if self.is_clean() {
            info!("conversion clean: no recovered anomalies");
        } else {
            warn!(
                "conversion completed with {} recovered anomalies: \
                 {} dropped chunks, {} unrecognized fragments, {} truncated fragments, \
                 {} suspect texture lists, {} dangling references, \
                 {} material fallbacks, {} texture fallbacks",
                self.total_anomalies(),
                self.chunks_dropped,
                self.unrecognized_fragments,
                self.truncated_fragments,
                self.suspect_texture_lists,
                self.dangling_references,
                self.material_fallbacks,
                self.texture_fallbacks,
            );
        }
    }
}

/// Everything one conversion run produces.
#[derive(Debug)]
pub struct ZoneOutput {
    pub scene: Scene,
    pub native: Vec<u8>,
    /// `None` when GLB serialization failed; the native form is still
    /// produced in that case.
    pub gltf: Option<Vec<u8>>,
    /// Converted PNG name to PNG bytes, ordered for reproducible output.
    pub textures: BTreeMap<String, Vec<u8>>,
    pub summary: ConversionSummary,
}

/// Convert one zone. The first archive is the zone archive; additional
/// archives act as fallbacks for assets the zone archive does not carry
/// (object-definition bundles, shared texture packs).
pub fn convert_zone(
    archives: &[&[u8]],
    zone_name: &str,
    settings: &Settings,
) -> anyhow::Result<ZoneOutput> {
    let mut summary = ConversionSummary::default();
    let mut parsed = Vec::with_capacity(archives.len());
    for (index, bytes) in archives.iter().enumerate() {
        let archive =
            Archive::parse(bytes).with_context(|| format!("parsing archive {index}"))?;
        summary.chunks_dropped += archive.dropped_chunks();
        parsed.push(archive);
    }
    let find = |name: &str| parsed.iter().find_map(|a| a.get(name));

    let mut builder = SceneBuilder::new();
    let main_name = format!("{}.wld", zone_name.to_ascii_lowercase());

    // Object definitions first: placements resolve actors by name.
    let mut definition_names: Vec<String> = parsed
        .iter()
        .flat_map(|archive| archive.names())
        .filter(|name| name.ends_with("_obj.wld") && *name != main_name)
        .map(str::to_owned)
        .collect();
    definition_names.sort();
    definition_names.dedup();
    for name in &definition_names {
        if let Some(bytes) = find(name) {
            resolve_auxiliary(&mut builder, bytes, name);
        }
    }

    for name in ["objects.wld", "lights.wld"] {
        if let Some(bytes) = find(name) {
            resolve_auxiliary(&mut builder, bytes, name);
        }
    }

    let main_bytes = find(&main_name).ok_or_else(|| Error::MissingAsset(main_name.clone()))?;
    let main = FragmentFile::parse(main_bytes).with_context(|| format!("parsing {main_name}"))?;
    builder.resolve_file(&main);

    let (mut scene, resolve_summary) = builder.finish();
    summary.unrecognized_fragments += resolve_summary.unrecognized_fragments;
    summary.truncated_fragments += resolve_summary.truncated_fragments;
    summary.suspect_texture_lists += resolve_summary.suspect_texture_lists;
    summary.dangling_references += resolve_summary.dangling_references;
    summary.material_fallbacks += resolve_summary.material_fallbacks;

    if !settings.include_collision {
        let materials = &scene.materials;
        for object in &mut scene.objects {
            object.meshes.retain(|mesh| {
                let invisible = materials
                    .get(mesh.material_id as usize)
                    .map(|m| m.filenames.is_empty())
                    .unwrap_or(true);
                !(mesh.collidable && invisible)
            });
        }
    }
    if settings.optimize_meshes {
        scene.coalesce_object_meshes();
    }

    // Texture conversion is a leaf step: it cannot affect geometry, and a
    // failed texture only degrades to a placeholder.
    let mut converted = BTreeMap::new();
    for material in &scene.materials {
        for filename in &material.filenames {
            let png = textures::png_name(filename);
            if converted.contains_key(&png) {
                continue;
            }
            let data = find(&filename.to_ascii_lowercase()).unwrap_or_default();
            let texture =
                textures::to_png(filename, data, material.is_masked(), settings.texture_resampling);
            if texture.fallback {
                summary.texture_fallbacks += 1;
            }
            converted.insert(texture.name, texture.data);
        }
    }

    let native = native::write_scene(&scene);
    let gltf = match gltf::write_glb(&scene, &converted) {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            // Fatal for this output target only; the native form above is
            // unaffected.
            error!("GLB serialization failed: {err}");
            None
        }
    };

    summary.log();
    Ok(ZoneOutput {
        scene,
        native,
        gltf,
        textures: converted,
        summary,
    })
}

/// Write a run's outputs under `dir`. Each target is attempted even when
/// another fails; the first failure is returned after all attempts.
pub fn write_outputs(output: &ZoneOutput, dir: &Path, zone_name: &str) -> anyhow::Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut first_error = None;
    let mut attempt = |name: String, bytes: &[u8]| {
        let path = dir.join(name);
        if let Err(err) = fs::write(&path, bytes) {
            error!("writing {} failed: {err}", path.display());
            if first_error.is_none() {
                first_error = Some(anyhow::Error::new(err).context(path.display().to_string()));
            }
        }
    };

    attempt(format!("{zone_name}.oez"), &output.native);
    if let Some(gltf) = &output.gltf {
        attempt(format!("{zone_name}.glb"), gltf);
    }
    for (name, data) in &output.textures {
        attempt(name.clone(), data);
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn resolve_auxiliary(builder: &mut SceneBuilder, bytes: &[u8], name: &str) {
    match FragmentFile::parse(bytes) {
        Ok(file) => builder.resolve_file(&file),
        // Only the main zone file is load-bearing; a broken auxiliary
        // file costs its contents, not the run.
        Err(err) => warn!("skipping {name}: {err}"),
    }
}
