//! Process-model orchestration
//!
//! Drives an assembled scene through the full content pipeline: brick
//! precombine, transparency joins, vertex color layers, hidden surface
//! removal over the opaque objects, vertex-budget splitting, and LOD
//! node wiring. Each stage can be toggled from the config; recoverable
//! per-object failures are collected as scene warnings and the rest of
//! the batch keeps going.

pub mod lighting;

use glam::Quat;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::assemble;
use crate::core::types::{Mat4, Result, Vec4};
use crate::hsr::{Baker, CpuBaker, Hsr, HsrConfig};
use crate::materials::{linear_to_srgb, MaterialTable};
use crate::mesh::divide::{self, DEFAULT_MAX_VERTS, DEFAULT_MIN_DIV_RATE};
use crate::mesh::{MaterialSlot, Mesh};
use crate::scene::{SceneGraph, SceneNode, SceneObject};

/// Engine limit on exported object names
pub const MAX_OBJECT_NAME: usize = 60;

/// Shader prefix transparent objects always export under
const TRANSPARENT_SHADER_PREFIX: &str = "S01";

/// Material slot names objects carry after bake material setup
const BAKE_MATERIAL: &str = "VertexColor";
const BAKE_MATERIAL_TRANSPARENT: &str = "VertexColorTransparent";

/// Knobs of one processing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Join each detail level's opaque objects into one mesh
    pub combine_objects: bool,
    /// Join transparent objects too instead of leaving them separate
    pub combine_transparent: bool,
    /// Keep imported texture coordinates instead of clearing them
    pub keep_uvs: bool,
    /// Write the Lit/Col/Alpha/Glow vertex color layers
    pub apply_vertex_colors: bool,
    /// Jitter material brightness so identical bricks do not read flat
    pub use_color_variation: bool,
    /// Variation strength in percent
    pub color_variation: f32,
    /// Seed for the variation jitter, fixed for reproducible output
    pub variation_seed: u64,
    /// Opacity percent written into transparent objects' Col alpha
    pub transparent_opacity: f32,
    /// Collapse material slots to the single bake material
    pub setup_bake_material: bool,
    /// Run hidden surface removal over the opaque objects
    pub remove_hidden_faces: bool,
    pub hsr: HsrConfig,
    /// Vertex cap for recursive mesh splitting
    pub max_verts: usize,
    pub min_division_rate: f32,
    /// Wire LOD grouping nodes and extents
    pub setup_lod_data: bool,
    /// Rotate the finished scene +90 degrees around X for the engine's
    /// up axis
    pub correct_orientation: bool,
    /// Shader prefix for opaque object names
    pub shader_prefix: String,
    /// LOD switch distances
    pub lod0_extent: f32,
    pub lod1_extent: f32,
    pub lod2_extent: f32,
    pub cull_extent: f32,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            combine_objects: true,
            combine_transparent: false,
            keep_uvs: false,
            apply_vertex_colors: true,
            use_color_variation: true,
            color_variation: 5.0,
            variation_seed: 0,
            transparent_opacity: 70.0,
            setup_bake_material: true,
            remove_hidden_faces: true,
            hsr: HsrConfig::default(),
            max_verts: DEFAULT_MAX_VERTS,
            min_division_rate: DEFAULT_MIN_DIV_RATE,
            setup_lod_data: true,
            correct_orientation: true,
            shader_prefix: "S01".to_string(),
            lod0_extent: 0.0,
            lod1_extent: 25.0,
            lod2_extent: 50.0,
            cull_extent: 10000.0,
        }
    }
}

impl ProcessConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// The pipeline driver. Owns the removal engine so its atlas scratch
/// buffer is reused across objects.
pub struct Processor<B: Baker> {
    pub config: ProcessConfig,
    hsr: Hsr<B>,
}

impl Default for Processor<CpuBaker> {
    fn default() -> Self {
        Self::new(ProcessConfig::default(), CpuBaker::new())
    }
}

impl<B: Baker> Processor<B> {
    pub fn new(config: ProcessConfig, baker: B) -> Self {
        let hsr = Hsr::new(config.hsr.clone(), baker);
        Self { config, hsr }
    }

    /// Run the whole pipeline over one assembled scene.
    pub fn run(&mut self, scene: &mut SceneGraph, table: &MaterialTable) -> Result<()> {
        assemble::precombine(scene);
        tag_transparency(scene, table);

        if self.config.combine_objects {
            assemble::join_by_transparency(scene, table, self.config.combine_transparent);
        }

        if !self.config.keep_uvs {
            for object in &mut scene.objects {
                object.mesh.loop_uvs = None;
            }
        }

        if self.config.apply_vertex_colors {
            self.apply_vertex_colors(scene, table);
        }

        if self.config.setup_bake_material {
            for object in &mut scene.objects {
                setup_bake_material(&mut object.mesh, object.attributes.transparent);
            }
        }

        if self.config.remove_hidden_faces {
            self.remove_hidden_faces(scene);
        }

        self.split_objects(scene);

        if self.config.setup_lod_data {
            self.setup_lod_data(scene);
        }

        info!(
            "processed scene {}: {} objects, {} nodes, {} warnings",
            scene.name,
            scene.objects.len(),
            scene.nodes.len(),
            scene.warnings.len()
        );
        Ok(())
    }

    /// Resolve each object's material slot colors and write the
    /// Lit/Col/Alpha/Glow layers from them.
    fn apply_vertex_colors(&self, scene: &mut SceneGraph, table: &MaterialTable) {
        let mut rng = StdRng::seed_from_u64(self.config.variation_seed);

        for object in &mut scene.objects {
            let mut colors: Vec<Vec4> = object
                .mesh
                .material_slots
                .iter()
                .map(|slot| table.color(slot.base_name()))
                .collect();

            if self.config.use_color_variation {
                for (slot, color) in object.mesh.material_slots.iter().zip(&mut colors) {
                    let scale = table.variation_scale(slot.base_name());
                    *color = vary_value(
                        *color,
                        self.config.color_variation * scale,
                        &mut rng,
                    );
                }
            }

            write_color_layers(
                &mut object.mesh,
                &colors,
                table,
                object.attributes.transparent,
                self.config.transparent_opacity,
            );
        }
    }

    /// Hidden surface removal over the opaque objects. Failures are
    /// scoped to one object: the object keeps all its faces and the
    /// batch continues.
    fn remove_hidden_faces(&mut self, scene: &mut SceneGraph) {
        let mut warnings = Vec::new();
        for object in &mut scene.objects {
            if object.attributes.transparent {
                continue;
            }
            if let Err(e) = self.hsr.run(&mut object.mesh, object.transform) {
                warnings.push(format!(
                    "skipping hidden surface removal on {}: {e}",
                    object.name
                ));
            }
        }
        for warning in warnings {
            scene.warn(warning);
        }
    }

    /// Split oversized meshes under the vertex cap. An object that
    /// cannot be divided keeps its mesh and the problem is reported.
    fn split_objects(&self, scene: &mut SceneGraph) {
        let mut warnings = Vec::new();
        let objects = std::mem::take(&mut scene.objects);

        for object in objects {
            if object.mesh.positions.len() < self.config.max_verts {
                scene.objects.push(object);
                continue;
            }
            match divide::divide(
                object.mesh.clone(),
                self.config.max_verts,
                self.config.min_division_rate,
            ) {
                Ok(pieces) => {
                    for (i, mesh) in pieces.into_iter().enumerate() {
                        let name = if i == 0 {
                            object.name.clone()
                        } else {
                            format!("{}.{i:03}", object.name)
                        };
                        let mut piece =
                            SceneObject::new(name, mesh, object.transform, object.lod);
                        piece.attributes = object.attributes.clone();
                        piece.brick_ref = object.brick_ref.clone();
                        scene.objects.push(piece);
                    }
                }
                Err(e) => {
                    warnings.push(format!("could not split {}: {e}", object.name));
                    scene.objects.push(object);
                }
            }
        }
        for warning in warnings {
            scene.warn(warning);
        }
    }

    /// Rename objects to their export form and hang them under typed
    /// LOD grouping nodes with switch extents.
    fn setup_lod_data(&self, scene: &mut SceneGraph) {
        let root = scene.add_node(SceneNode {
            name: format!("SceneNode_{}", scene.name),
            node_type: "SceneNode".to_string(),
            transform: Mat4::IDENTITY,
            parent: None,
        });

        for i in 0..scene.objects.len() {
            let transparent = scene.objects[i].attributes.transparent;
            let shader_prefix = if transparent {
                TRANSPARENT_SHADER_PREFIX
            } else {
                &self.config.shader_prefix
            };
            let type_prefix = if transparent { "Alpha" } else { "Opaque" };
            let base = base_object_name(&scene.objects[i].name);
            let mut name = format!("{shader_prefix}_{type_prefix}_{base}");
            name.truncate(MAX_OBJECT_NAME);

            let node = match scene
                .nodes
                .iter()
                .position(|n| n.name == name && n.node_type == "NiLODNode")
            {
                Some(node) => node,
                None => scene.add_node(SceneNode {
                    name: name.clone(),
                    node_type: "NiLODNode".to_string(),
                    transform: Mat4::IDENTITY,
                    parent: Some(root),
                }),
            };

            let object = &mut scene.objects[i];
            object.name = name;
            object.parent = Some(node);
            let (near, far) = match object.lod.index() {
                0 => (self.config.lod0_extent, self.config.lod1_extent),
                1 => (self.config.lod1_extent, self.config.lod2_extent),
                _ => (self.config.lod2_extent, self.config.cull_extent),
            };
            object.attributes.near_extent = Some(near);
            object.attributes.far_extent = Some(far);
        }

        if self.config.correct_orientation {
            scene.rotate_roots(Quat::from_rotation_x(std::f32::consts::FRAC_PI_2));
        }
    }
}

/// Mark every object whose materials all resolve transparent.
fn tag_transparency(scene: &mut SceneGraph, table: &MaterialTable) {
    for object in &mut scene.objects {
        object.attributes.transparent = assemble::is_transparent(&object.mesh, table);
    }
}

/// Object name without the instance-disambiguation suffix
fn base_object_name(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((base, suffix)) if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) => {
            base
        }
        _ => name,
    }
}

/// Jitter a color's brightness in gamma space, keeping hue and
/// saturation. `variation` is the full percent range of the jitter.
fn vary_value(color: Vec4, variation: f32, rng: &mut StdRng) -> Vec4 {
    let value = color.x.max(color.y).max(color.z);
    let mut gamma = value.powf(1.0 / 2.224);
    gamma += rng.gen_range(-variation / 200.0..=variation / 200.0);
    let varied = gamma.clamp(0.0, 1.0).powf(2.224);

    if value > 0.0 {
        let scale = varied / value;
        Vec4::new(color.x * scale, color.y * scale, color.z * scale, color.w)
    } else {
        Vec4::new(varied, varied, varied, color.w)
    }
}

/// Overwrite a color layer with per-loop data, creating it if missing.
fn set_color_layer(mesh: &mut Mesh, name: &str, data: Vec<Vec4>) {
    let index = mesh.ensure_color_layer(name, Vec4::ONE);
    mesh.color_layers[index].data = data;
}

/// Per-loop palette lookup indexed by each polygon's material slot
fn spread_by_material(mesh: &Mesh, palette: &[Vec4]) -> Vec<Vec4> {
    let mut data = vec![Vec4::ONE; mesh.loop_count()];
    for poly in &mesh.polygons {
        let color = palette[poly.material as usize];
        for l in poly.loops() {
            data[l] = color;
        }
    }
    data
}

/// Write the Lit/Col/Alpha/Glow layers. Col carries the resolved
/// material color per loop; single-material meshes store it linear,
/// multi-material meshes store the sRGB form the exporter expects for
/// indexed palettes. Lit, Alpha and Glow only exist on opaque objects.
fn write_color_layers(
    mesh: &mut Mesh,
    colors: &[Vec4],
    table: &MaterialTable,
    transparent: bool,
    opacity_percent: f32,
) {
    let loop_count = mesh.loop_count();
    let alpha = opacity_percent / 100.0;

    if !transparent {
        set_color_layer(mesh, "Lit", vec![Vec4::new(0.0, 0.0, 0.0, 1.0); loop_count]);
    }

    let col_data = if colors.len() < 2 {
        let mut color = colors
            .first()
            .copied()
            .unwrap_or(Vec4::new(0.8, 0.8, 0.8, 1.0));
        if transparent {
            color.w = alpha;
        }
        vec![color; loop_count]
    } else {
        let mut palette: Vec<Vec4> = colors.iter().map(|&c| linear_to_srgb(c)).collect();
        if transparent {
            for color in &mut palette {
                color.w = alpha;
            }
        }
        spread_by_material(mesh, &palette)
    };
    set_color_layer(mesh, "Col", col_data);

    if !transparent {
        set_color_layer(mesh, "Alpha", vec![Vec4::ONE; loop_count]);

        let any_glow = mesh
            .material_slots
            .iter()
            .any(|slot| table.has_glow(slot.base_name()));
        let glow_data = if any_glow {
            let palette: Vec<Vec4> = mesh
                .material_slots
                .iter()
                .map(|slot| match table.glow_color(slot.base_name()) {
                    Some(color) => linear_to_srgb(color),
                    None => Vec4::new(0.0, 0.0, 0.0, 1.0),
                })
                .collect();
            spread_by_material(mesh, &palette)
        } else {
            vec![Vec4::new(0.0, 0.0, 0.0, 1.0); loop_count]
        };
        set_color_layer(mesh, "Glow", glow_data);
    }
}

/// Replace all material slots with the single bake material every
/// processed object exports with.
fn setup_bake_material(mesh: &mut Mesh, transparent: bool) {
    mesh.material_slots.clear();
    mesh.material_slots.push(MaterialSlot::new(if transparent {
        BAKE_MATERIAL_TRANSPARENT
    } else {
        BAKE_MATERIAL
    }));
    for poly in &mut mesh.polygons {
        poly.material = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;
    use crate::scene::LodLevel;

    fn object(name: &str, materials: &[&str], lod: LodLevel) -> SceneObject {
        let mut mesh = Mesh::new();
        for (i, &material) in materials.iter().enumerate() {
            let base = mesh.positions.len() as u32;
            let x = i as f32 * 2.0;
            mesh.positions.push(Vec3::new(x, 0.0, 0.0));
            mesh.positions.push(Vec3::new(x + 1.0, 0.0, 0.0));
            mesh.positions.push(Vec3::new(x, 1.0, 0.0));
            mesh.normals.extend([Vec3::Z; 3]);
            mesh.material_slots.push(MaterialSlot::new(material));
            mesh.add_polygon(&[base, base + 1, base + 2], i as u32);
        }
        SceneObject::new(name, mesh, Mat4::IDENTITY, lod)
    }

    fn scene_with(objects: Vec<SceneObject>) -> SceneGraph {
        let mut scene = SceneGraph::new("fixture");
        for object in objects {
            scene.add_object(object);
        }
        scene
    }

    #[test]
    fn test_opaque_object_gets_all_layers() {
        let table = MaterialTable::default();
        let mut scene = scene_with(vec![object("a", &["21"], LodLevel::Lod0)]);
        let mut processor = Processor::default();
        processor.config.remove_hidden_faces = false;
        processor.config.setup_lod_data = false;
        processor.config.use_color_variation = false;
        processor.run(&mut scene, &table).unwrap();

        let mesh = &scene.objects[0].mesh;
        for layer in ["Lit", "Col", "Alpha", "Glow"] {
            assert!(mesh.color_layer(layer).is_some(), "missing {layer}");
        }
        let lit = mesh.color_layer("Lit").unwrap();
        assert!(lit.data.iter().all(|&c| c == Vec4::new(0.0, 0.0, 0.0, 1.0)));
        // Single-material Col carries the table color as-is
        let col = mesh.color_layer("Col").unwrap();
        assert_eq!(col.data[0], table.color("21"));
    }

    #[test]
    fn test_transparent_object_col_alpha_and_no_extra_layers() {
        let table = MaterialTable::default();
        let mut scene = scene_with(vec![object("a", &["40"], LodLevel::Lod0)]);
        let mut processor = Processor::default();
        processor.config.remove_hidden_faces = false;
        processor.config.setup_lod_data = false;
        processor.config.use_color_variation = false;
        processor.run(&mut scene, &table).unwrap();

        let mesh = &scene.objects[0].mesh;
        assert!(mesh.color_layer("Lit").is_none());
        assert!(mesh.color_layer("Alpha").is_none());
        assert!(mesh.color_layer("Glow").is_none());
        let col = mesh.color_layer("Col").unwrap();
        assert!((col.data[0].w - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_multi_material_col_is_indexed_srgb() {
        let table = MaterialTable::default();
        let mut scene = scene_with(vec![object("a", &["21", "23"], LodLevel::Lod0)]);
        let mut processor = Processor::default();
        processor.config.remove_hidden_faces = false;
        processor.config.setup_lod_data = false;
        processor.config.setup_bake_material = false;
        processor.config.use_color_variation = false;
        processor.run(&mut scene, &table).unwrap();

        let mesh = &scene.objects[0].mesh;
        let col = mesh.color_layer("Col").unwrap();
        assert_eq!(col.data[0], linear_to_srgb(table.color("21")));
        assert_eq!(col.data[3], linear_to_srgb(table.color("23")));
    }

    #[test]
    fn test_glow_layer_uses_glow_table() {
        let table = MaterialTable::default();
        let mut scene = scene_with(vec![object("a", &["50", "21"], LodLevel::Lod0)]);
        let mut processor = Processor::default();
        processor.config.remove_hidden_faces = false;
        processor.config.setup_lod_data = false;
        processor.config.setup_bake_material = false;
        processor.config.use_color_variation = false;
        processor.run(&mut scene, &table).unwrap();

        let glow = scene.objects[0].mesh.color_layer("Glow").unwrap();
        assert_eq!(glow.data[0], linear_to_srgb(table.glow_color("50").unwrap()));
        assert_eq!(glow.data[3], Vec4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_color_variation_is_seeded() {
        let table = MaterialTable::default();
        let run = |seed: u64| {
            let mut scene = scene_with(vec![object("a", &["21"], LodLevel::Lod0)]);
            let mut processor = Processor::default();
            processor.config.remove_hidden_faces = false;
            processor.config.setup_lod_data = false;
            processor.config.variation_seed = seed;
            processor.run(&mut scene, &table).unwrap();
            scene.objects[0].mesh.color_layer("Col").unwrap().data[0]
        };
        assert_eq!(run(7), run(7));
        assert_ne!(run(7), run(8));
        // Variation only scales brightness, hue ratios survive
        let varied = run(7);
        let base = table.color("21");
        assert!((varied.x / base.x - varied.z / base.z).abs() < 1e-4);
    }

    #[test]
    fn test_bake_material_replaces_slots() {
        let table = MaterialTable::default();
        let mut scene = scene_with(vec![
            object("a", &["21", "23"], LodLevel::Lod0),
            object("b", &["40"], LodLevel::Lod0),
        ]);
        let mut processor = Processor::default();
        processor.config.combine_objects = false;
        processor.config.remove_hidden_faces = false;
        processor.config.setup_lod_data = false;
        processor.run(&mut scene, &table).unwrap();

        let opaque = &scene.objects[0].mesh;
        assert_eq!(opaque.material_slots.len(), 1);
        assert_eq!(opaque.material_slots[0].name, "VertexColor");
        assert!(opaque.polygons.iter().all(|p| p.material == 0));
        let alpha = &scene.objects[1].mesh;
        assert_eq!(alpha.material_slots[0].name, "VertexColorTransparent");
    }

    #[test]
    fn test_uv_clear_respects_keep_uvs() {
        let table = MaterialTable::default();
        let make = || {
            let mut o = object("a", &["21"], LodLevel::Lod0);
            o.mesh.loop_uvs = Some(vec![crate::core::types::Vec2::ONE; 3]);
            scene_with(vec![o])
        };

        let mut processor = Processor::default();
        processor.config.remove_hidden_faces = false;
        processor.config.setup_lod_data = false;
        let mut scene = make();
        processor.run(&mut scene, &table).unwrap();
        assert!(scene.objects[0].mesh.loop_uvs.is_none());

        processor.config.keep_uvs = true;
        let mut scene = make();
        processor.run(&mut scene, &table).unwrap();
        assert!(scene.objects[0].mesh.loop_uvs.is_some());
    }

    #[test]
    fn test_lod_nodes_extents_and_names() {
        let table = MaterialTable::default();
        let mut scene = scene_with(vec![
            object("a", &["21"], LodLevel::Lod0),
            object("b", &["21"], LodLevel::Lod1),
            object("c", &["40"], LodLevel::Lod0),
        ]);
        let mut processor = Processor::default();
        processor.config.remove_hidden_faces = false;
        processor.config.correct_orientation = false;
        processor.config.shader_prefix = "S02".to_string();
        processor.run(&mut scene, &table).unwrap();

        // Root scene node plus one LOD group per joined name
        assert_eq!(scene.nodes[0].name, "SceneNode_fixture");
        let opaque0 = scene
            .objects
            .iter()
            .find(|o| o.lod == LodLevel::Lod0 && !o.attributes.transparent)
            .unwrap();
        assert_eq!(opaque0.name, "S02_Opaque_Opaque_LOD_0");
        assert_eq!(opaque0.attributes.near_extent, Some(0.0));
        assert_eq!(opaque0.attributes.far_extent, Some(25.0));

        let opaque1 = scene
            .objects
            .iter()
            .find(|o| o.lod == LodLevel::Lod1)
            .unwrap();
        assert_eq!(opaque1.attributes.near_extent, Some(25.0));
        assert_eq!(opaque1.attributes.far_extent, Some(50.0));

        // Transparent objects always export under the S01 shader
        let alpha = scene
            .objects
            .iter()
            .find(|o| o.attributes.transparent)
            .unwrap();
        assert!(alpha.name.starts_with("S01_Alpha_"));
        let node = &scene.nodes[alpha.parent.unwrap()];
        assert_eq!(node.node_type, "NiLODNode");
        assert_eq!(node.parent, Some(0));
    }

    #[test]
    fn test_orientation_correction_rotates_scene() {
        let table = MaterialTable::default();
        let mut o = object("a", &["21"], LodLevel::Lod0);
        o.transform = Mat4::from_translation(Vec3::Y);
        let mut scene = scene_with(vec![o]);
        let mut processor = Processor::default();
        // Joining would bake the transform into the geometry
        processor.config.combine_objects = false;
        processor.config.remove_hidden_faces = false;
        processor.run(&mut scene, &table).unwrap();

        let t = scene.objects[0].transform.w_axis.truncate();
        assert!((t - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_oversized_object_is_split() {
        let table = MaterialTable::default();
        let mut mesh = Mesh::new();
        mesh.material_slots.push(MaterialSlot::new("21"));
        for i in 0..40 {
            let base = mesh.positions.len() as u32;
            let x = i as f32 * 2.0;
            mesh.positions.push(Vec3::new(x, 0.0, 0.0));
            mesh.positions.push(Vec3::new(x + 1.0, 0.0, 0.0));
            mesh.positions.push(Vec3::new(x, 1.0, 0.0));
            mesh.normals.extend([Vec3::Z; 3]);
            mesh.add_polygon(&[base, base + 1, base + 2], 0);
        }
        let mut scene = scene_with(vec![SceneObject::new(
            "big",
            mesh,
            Mat4::IDENTITY,
            LodLevel::Lod0,
        )]);

        let mut processor = Processor::default();
        processor.config.remove_hidden_faces = false;
        processor.config.setup_lod_data = false;
        processor.config.max_verts = 30;
        processor.run(&mut scene, &table).unwrap();

        assert!(scene.objects.len() >= 2);
        assert!(scene.objects.iter().all(|o| o.mesh.positions.len() < 30));
        let total: usize = scene.objects.iter().map(|o| o.mesh.polygons.len()).sum();
        assert_eq!(total, 40);
    }

    #[test]
    fn test_hsr_failure_is_warning_not_error() {
        let table = MaterialTable::default();
        // Pentagon topology makes the removal engine refuse the object
        let mut o = object("bad", &["21"], LodLevel::Lod0);
        let base = o.mesh.positions.len() as u32;
        o.mesh
            .positions
            .extend([Vec3::ZERO, Vec3::X, Vec3::ONE, Vec3::Y, Vec3::Z]);
        o.mesh.normals.extend([Vec3::Z; 5]);
        o.mesh
            .add_polygon(&[base, base + 1, base + 2, base + 3, base + 4], 0);

        let mut scene = scene_with(vec![o]);
        let mut processor = Processor::default();
        processor.config.setup_lod_data = false;
        processor.run(&mut scene, &table).unwrap();

        assert_eq!(scene.warnings.len(), 1);
        assert!(scene.warnings[0].contains("hidden surface removal"));
        // The object kept its geometry
        assert_eq!(scene.objects[0].mesh.polygons.len(), 2);
    }
}
