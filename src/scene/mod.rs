//! CPU-side scene graph
//!
//! Assembled brick objects live here between import and export: each
//! object owns a mesh, a world transform, and typed attributes the
//! later pipeline stages read. Grouping nodes carry the LOD switching
//! metadata for the exporter.

use glam::Quat;

use crate::core::types::{Mat4, Vec3};
use crate::mesh::Mesh;

/// Detail level a mesh object belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LodLevel {
    Lod0,
    Lod1,
    Lod2,
}

impl LodLevel {
    pub const ALL: [LodLevel; 3] = [LodLevel::Lod0, LodLevel::Lod1, LodLevel::Lod2];

    pub fn suffix(self) -> &'static str {
        match self {
            LodLevel::Lod0 => "LOD_0",
            LodLevel::Lod1 => "LOD_1",
            LodLevel::Lod2 => "LOD_2",
        }
    }

    pub fn index(self) -> usize {
        match self {
            LodLevel::Lod0 => 0,
            LodLevel::Lod1 => 1,
            LodLevel::Lod2 => 2,
        }
    }
}

/// Typed per-object attributes the pipeline stages read and the
/// exporter writes out as custom properties.
#[derive(Clone, Debug, Default)]
pub struct ObjectAttributes {
    /// All materials on the object are transparent
    pub transparent: bool,
    /// LOD switch-in distance, set when LOD nodes are wired
    pub near_extent: Option<f32>,
    /// LOD switch-out distance
    pub far_extent: Option<f32>,
}

/// One mesh object in the scene.
#[derive(Clone, Debug)]
pub struct SceneObject {
    pub name: String,
    pub mesh: Mesh,
    pub transform: Mat4,
    pub lod: LodLevel,
    pub attributes: ObjectAttributes,
    /// Hidden objects are excluded from bake occlusion
    pub hide_render: bool,
    /// Brick instance this object came from, shared by sibling parts
    pub brick_ref: Option<String>,
    /// Grouping node this object hangs under, if any
    pub parent: Option<usize>,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, mesh: Mesh, transform: Mat4, lod: LodLevel) -> Self {
        Self {
            name: name.into(),
            mesh,
            transform,
            lod,
            attributes: ObjectAttributes::default(),
            hide_render: false,
            brick_ref: None,
            parent: None,
        }
    }

    /// Triangle soup in world space, quads fan-split
    pub fn world_triangles(&self) -> Vec<[Vec3; 3]> {
        self.mesh
            .triangle_soup()
            .into_iter()
            .map(|tri| tri.map(|p| self.transform.transform_point3(p)))
            .collect()
    }
}

/// A grouping node without geometry of its own. The exporter turns
/// these into engine LOD-switch nodes.
#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    pub node_type: String,
    pub transform: Mat4,
    /// Index of the parent node, None for roots
    pub parent: Option<usize>,
}

/// The whole assembled scene: mesh objects, grouping nodes, and the
/// recoverable warnings collected while building it.
#[derive(Clone, Debug, Default)]
pub struct SceneGraph {
    pub name: String,
    pub objects: Vec<SceneObject>,
    pub nodes: Vec<SceneNode>,
    pub warnings: Vec<String>,
}

impl SceneGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_object(&mut self, object: SceneObject) -> usize {
        self.objects.push(object);
        self.objects.len() - 1
    }

    pub fn add_node(&mut self, node: SceneNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Record a recoverable problem and keep going
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{message}");
        self.warnings.push(message);
    }

    pub fn objects_in_lod(&self, lod: LodLevel) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter().filter(move |o| o.lod == lod)
    }

    /// Rotate every root transform, used to reorient the finished
    /// scene for engines with a different up axis.
    pub fn rotate_roots(&mut self, rotation: Quat) {
        let m = Mat4::from_quat(rotation);
        for object in &mut self.objects {
            object.transform = m * object.transform;
        }
        for node in &mut self.nodes {
            node.transform = m * node.transform;
        }
    }

    /// World-space occluder triangles: every object still visible to
    /// the renderer contributes.
    pub fn occluder_triangles(&self) -> Vec<[Vec3; 3]> {
        let mut triangles = Vec::new();
        for object in self.objects.iter().filter(|o| !o.hide_render) {
            triangles.extend(object.world_triangles());
        }
        triangles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_mesh() -> Mesh {
        let mut mesh = Mesh::new();
        mesh.positions = vec![
            Vec3::ZERO,
            Vec3::X,
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::Y,
        ];
        mesh.normals = vec![Vec3::Z; 4];
        mesh.add_polygon(&[0, 1, 2, 3], 0);
        mesh
    }

    #[test]
    fn test_world_triangles_apply_transform() {
        let transform = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let object = SceneObject::new("brick", quad_mesh(), transform, LodLevel::Lod0);
        let tris = object.world_triangles();
        assert_eq!(tris.len(), 2);
        assert_eq!(tris[0][0], Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(tris[0][1], Vec3::new(11.0, 0.0, 0.0));
    }

    #[test]
    fn test_hidden_objects_do_not_occlude() {
        let mut scene = SceneGraph::new("test");
        scene.add_object(SceneObject::new(
            "a",
            quad_mesh(),
            Mat4::IDENTITY,
            LodLevel::Lod0,
        ));
        let hidden = scene.add_object(SceneObject::new(
            "b",
            quad_mesh(),
            Mat4::IDENTITY,
            LodLevel::Lod0,
        ));
        scene.objects[hidden].hide_render = true;
        assert_eq!(scene.occluder_triangles().len(), 2);
    }

    #[test]
    fn test_lod_filter_and_suffix() {
        let mut scene = SceneGraph::new("test");
        scene.add_object(SceneObject::new(
            "a",
            quad_mesh(),
            Mat4::IDENTITY,
            LodLevel::Lod0,
        ));
        scene.add_object(SceneObject::new(
            "b",
            quad_mesh(),
            Mat4::IDENTITY,
            LodLevel::Lod1,
        ));
        assert_eq!(scene.objects_in_lod(LodLevel::Lod0).count(), 1);
        assert_eq!(LodLevel::Lod1.suffix(), "LOD_1");
    }

    #[test]
    fn test_rotate_roots() {
        let mut scene = SceneGraph::new("test");
        scene.add_object(SceneObject::new(
            "a",
            quad_mesh(),
            Mat4::from_translation(Vec3::Y),
            LodLevel::Lod0,
        ));
        scene.rotate_roots(Quat::from_rotation_x(std::f32::consts::FRAC_PI_2));
        let t = scene.objects[0].transform.w_axis.truncate();
        assert!((t - Vec3::Z).length() < 1e-6);
    }
}
