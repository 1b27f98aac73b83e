//! Scene assembly
//!
//! Turns a parsed scene document plus a brick database into mesh
//! objects. Geometry decodes once per design and is cached; rigid
//! parts place the shared mesh with their bone transform, flex parts
//! get a uniquely named per-instance mesh with every vertex resolved
//! through its bone.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};

use crate::core::error::Error;
use crate::core::types::{Mat4, Result, Vec4};
use crate::lxf::db::{geometry_path, primitive_path};
use crate::lxf::lxfml::Part;
use crate::lxf::skinning::{apply_preflex, resolve_flex};
use crate::lxf::{BrickDb, GeometryChunk, Primitive, SceneDoc};
use crate::materials::MaterialTable;
use crate::mesh::{ColorLayer, MaterialSlot, Mesh};
use crate::scene::{LodLevel, SceneGraph, SceneObject};

/// Conversion from the scene document's axes (-z forward, y up) to the
/// pipeline's (y forward, z up): x stays, y becomes z, z becomes -y.
pub fn global_matrix() -> Mat4 {
    Mat4::from_cols(
        Vec4::X,
        Vec4::Z,
        Vec4::new(0.0, -1.0, 0.0, 0.0),
        Vec4::W,
    )
}

/// Counters kept while assembling, mostly for the summary log.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssembleStats {
    /// Designs decoded from the database (cache misses)
    pub designs_decoded: usize,
    pub parts_built: usize,
    pub parts_skipped: usize,
}

struct CachedDesign {
    chunks: Vec<GeometryChunk>,
}

/// Builds scene objects from a document, caching decoded geometry per
/// design id and detail level.
pub struct SceneAssembler<'a> {
    db: &'a BrickDb,
    cache: HashMap<(String, Option<&'static str>), Arc<CachedDesign>>,
    stats: AssembleStats,
    flex_counter: usize,
}

impl<'a> SceneAssembler<'a> {
    pub fn new(db: &'a BrickDb) -> Self {
        Self {
            db,
            cache: HashMap::new(),
            stats: AssembleStats::default(),
            flex_counter: 0,
        }
    }

    pub fn stats(&self) -> AssembleStats {
        self.stats
    }

    /// Assemble every brick of the document. With a database that
    /// ships dedicated game LODs all three detail levels are built;
    /// otherwise only the full-detail level.
    pub fn build(&mut self, doc: &SceneDoc) -> Result<SceneGraph> {
        let levels: &[(LodLevel, Option<&'static str>)] = if self.db.has_game_lods() {
            &[
                (LodLevel::Lod0, Some("0")),
                (LodLevel::Lod1, Some("1")),
                (LodLevel::Lod2, Some("2")),
            ]
        } else {
            &[(LodLevel::Lod0, None)]
        };

        let mut scene = SceneGraph::new(doc.name.clone());
        for &(level, lod) in levels {
            for brick in &doc.bricks {
                for part in &brick.parts {
                    self.build_part(part, &brick.ref_id, level, lod, &mut scene)?;
                }
            }
        }
        info!(
            "assembled {} objects from {} parts ({} designs decoded, {} skipped)",
            scene.objects.len(),
            doc.part_count(),
            self.stats.designs_decoded,
            self.stats.parts_skipped
        );
        Ok(scene)
    }

    fn build_part(
        &mut self,
        part: &Part,
        brick_ref: &str,
        level: LodLevel,
        lod: Option<&'static str>,
        scene: &mut SceneGraph,
    ) -> Result<()> {
        let cached = match self.load_design(&part.design_id, lod) {
            Ok(cached) => cached,
            Err(Error::MissingResource(what)) => {
                scene.warn(format!(
                    "part {} ({}): missing {what}, skipping",
                    part.ref_id, part.design_id
                ));
                self.stats.parts_skipped += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let mesh = self.part_mesh(part, &cached)?;
        let (name, transform) = if part.is_flex() {
            // Flex instances never share geometry, salt the name
            self.flex_counter += 1;
            (
                format!("{}.f{:03}", part.design_id, self.flex_counter),
                global_matrix(),
            )
        } else {
            (part.design_id.clone(), global_matrix() * part.bones[0])
        };

        let mut object = SceneObject::new(name, mesh, transform, level);
        object.brick_ref = Some(brick_ref.to_string());
        scene.add_object(object);
        self.stats.parts_built += 1;
        Ok(())
    }

    /// Merge a part's geometry chunks into one mesh, one material slot
    /// per chunk. When the material list runs short the last entry
    /// repeats.
    fn part_mesh(&self, part: &Part, cached: &CachedDesign) -> Result<Mesh> {
        let mut mesh = Mesh::new();
        if cached.chunks.iter().any(|c| c.uvs.is_some()) {
            mesh.loop_uvs = Some(Vec::new());
        }

        for (i, chunk) in cached.chunks.iter().enumerate() {
            let material = part
                .materials
                .get(i)
                .or_else(|| part.materials.last())
                .cloned()
                .unwrap_or_default();
            let slot = mesh.material_slots.len() as u32;
            mesh.material_slots.push(MaterialSlot::new(material));

            let base = mesh.positions.len() as u32;
            if part.is_flex() {
                let (positions, normals) = resolve_flex(chunk, &part.bones)?;
                mesh.positions.extend(positions);
                mesh.normals.extend(normals);
            } else {
                mesh.positions.extend_from_slice(&chunk.positions);
                mesh.normals.extend_from_slice(&chunk.normals);
            }

            for face in &chunk.faces {
                let verts = face.map(|v| base + v);
                mesh.add_polygon(&verts, slot);
                if let (Some(loop_uvs), Some(uvs)) = (&mut mesh.loop_uvs, &chunk.uvs) {
                    let start = loop_uvs.len() - 3;
                    for (k, &v) in face.iter().enumerate() {
                        loop_uvs[start + k] = uvs[v as usize];
                    }
                }
            }
        }
        Ok(mesh)
    }

    fn load_design(
        &mut self,
        design_id: &str,
        lod: Option<&'static str>,
    ) -> Result<Arc<CachedDesign>> {
        let key = (design_id.to_string(), lod);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.clone());
        }

        let mut chunks = Vec::new();
        loop {
            let path = geometry_path(design_id, lod, chunks.len());
            if !self.db.contains(&path) {
                break;
            }
            chunks.push(GeometryChunk::decode(&self.db.read(&path)?)?);
        }
        if chunks.is_empty() {
            return Err(Error::MissingResource(geometry_path(design_id, lod, 0)));
        }

        // Flex rest bones fold into the cached geometry once
        let meta_path = primitive_path(design_id);
        if self.db.contains(&meta_path) {
            let text = String::from_utf8_lossy(&self.db.read(&meta_path)?).into_owned();
            let primitive = Primitive::parse(&text)?;
            for chunk in &mut chunks {
                apply_preflex(chunk, &primitive.flex_bones);
            }
        }

        self.stats.designs_decoded += 1;
        debug!(
            "decoded design {design_id} (lod {:?}): {} chunks",
            lod,
            chunks.len()
        );
        let cached = Arc::new(CachedDesign { chunks });
        self.cache.insert(key, cached.clone());
        Ok(cached)
    }
}

/// Merge objects into one, baking each transform into its vertices.
/// Material slots with the same base name collapse into one slot and
/// polygon material indices are remapped accordingly.
pub fn merge_objects(name: impl Into<String>, objects: Vec<SceneObject>, lod: LodLevel) -> SceneObject {
    let mut merged = Mesh::new();
    let has_uvs = objects.iter().any(|o| o.mesh.loop_uvs.is_some());
    if has_uvs {
        merged.loop_uvs = Some(Vec::new());
    }

    let mut layer_names: Vec<String> = Vec::new();
    for object in &objects {
        for layer in &object.mesh.color_layers {
            if !layer_names.iter().any(|n| n == &layer.name) {
                layer_names.push(layer.name.clone());
            }
        }
    }
    for name in &layer_names {
        merged.color_layers.push(ColorLayer {
            name: name.clone(),
            data: Vec::new(),
        });
    }

    for object in objects {
        let mesh = object.mesh;
        let linear = glam::Mat3::from_mat4(object.transform);

        let base = merged.positions.len() as u32;
        merged.positions.extend(
            mesh.positions
                .iter()
                .map(|&p| object.transform.transform_point3(p)),
        );
        merged
            .normals
            .extend(mesh.normals.iter().map(|&n| (linear * n).normalize_or_zero()));

        // Coalesce slots by base name
        let slot_map: Vec<u32> = mesh
            .material_slots
            .iter()
            .map(|slot| {
                let base_name = slot.base_name().to_string();
                if let Some(i) = merged
                    .material_slots
                    .iter()
                    .position(|s| s.name == base_name)
                {
                    i as u32
                } else {
                    merged.material_slots.push(MaterialSlot::new(base_name));
                    merged.material_slots.len() as u32 - 1
                }
            })
            .collect();

        let loop_base = merged.loop_vertices.len();
        for poly in &mesh.polygons {
            let verts: Vec<u32> = mesh
                .polygon_vertices(poly)
                .iter()
                .map(|&v| base + v)
                .collect();
            let slot = slot_map.get(poly.material as usize).copied().unwrap_or(0);
            merged.add_polygon(&verts, slot);
        }

        // add_polygon already padded the merged layers to the new loop
        // count, so only real source data needs copying in
        if let (Some(loop_uvs), Some(uvs)) = (&mut merged.loop_uvs, &mesh.loop_uvs) {
            loop_uvs[loop_base..].copy_from_slice(uvs);
        }
        for target in &mut merged.color_layers {
            if let Some(source) = mesh.color_layer(&target.name) {
                target.data[loop_base..].copy_from_slice(&source.data);
            }
        }
    }

    SceneObject::new(name, merged, Mat4::IDENTITY, lod)
}

/// Merge each brick's sibling parts into one object per level. Objects
/// without a brick reference are left alone.
pub fn precombine(scene: &mut SceneGraph) {
    let mut kept: Vec<SceneObject> = Vec::new();
    let mut buckets: HashMap<(String, LodLevel), Vec<SceneObject>> = HashMap::new();
    let mut order: Vec<(String, LodLevel)> = Vec::new();

    for object in scene.objects.drain(..) {
        let Some(brick_ref) = object.brick_ref.clone() else {
            kept.push(object);
            continue;
        };
        let key = (brick_ref, object.lod);
        if !buckets.contains_key(&key) {
            order.push(key.clone());
        }
        buckets.entry(key).or_default().push(object);
    }

    for key in order {
        let group = buckets.remove(&key).unwrap_or_default();
        if group.len() == 1 {
            kept.extend(group);
        } else {
            let name = group[0].name.clone();
            let mut merged = merge_objects(name, group, key.1);
            merged.brick_ref = Some(key.0);
            kept.push(merged);
        }
    }
    scene.objects = kept;
}

/// Whether every material slot of a mesh resolves to a transparent
/// material. A mesh with no slots is not transparent.
pub fn is_transparent(mesh: &Mesh, table: &MaterialTable) -> bool {
    !mesh.material_slots.is_empty()
        && mesh
            .material_slots
            .iter()
            .all(|slot| table.is_transparent(slot.base_name()))
}

/// Join each detail level's opaque objects into one object and its
/// transparent objects into another; the two never share a mesh.
/// Transparent objects stay separate unless `combine_transparent` is
/// set. Objects with no materials join the opaque side after a warning.
pub fn join_by_transparency(
    scene: &mut SceneGraph,
    table: &MaterialTable,
    combine_transparent: bool,
) {
    let mut warnings = Vec::new();
    let mut kept: Vec<SceneObject> = Vec::new();
    let mut buckets: HashMap<(LodLevel, bool), Vec<SceneObject>> = HashMap::new();

    for mut object in scene.objects.drain(..) {
        let transparent = if object.mesh.material_slots.is_empty() {
            warnings.push(format!(
                "object {} has no materials, treating as opaque",
                object.name
            ));
            false
        } else {
            is_transparent(&object.mesh, table)
        };
        if transparent && !combine_transparent {
            object.attributes.transparent = true;
            kept.push(object);
            continue;
        }
        buckets.entry((object.lod, transparent)).or_default().push(object);
    }
    for warning in warnings {
        scene.warn(warning);
    }

    for level in LodLevel::ALL {
        for transparent in [false, true] {
            let Some(group) = buckets.remove(&(level, transparent)) else {
                continue;
            };
            let kind = if transparent { "Alpha" } else { "Opaque" };
            let name = format!("{kind}_{}", level.suffix());
            let mut joined = merge_objects(name, group, level);
            joined.attributes.transparent = transparent;
            scene.objects.push(joined);
        }
    }
    scene.objects.extend(kept);
}
