//! Editable polygon mesh
//!
//! Polygons index a flat loop table, one loop per polygon corner.
//! Attribute layers (UVs, colors) are stored per loop so neighbouring
//! polygons can disagree about the value at a shared vertex. Meshes
//! accept arbitrary n-gons at construction; `ops::validate` rejects
//! anything but tris and quads before processing.

pub mod ops;
pub mod divide;

use crate::core::types::{Vec2, Vec3, Vec4};

/// One polygon, a contiguous run of loops.
#[derive(Clone, Copy, Debug)]
pub struct Polygon {
    pub loop_start: u32,
    pub loop_len: u32,
    /// Index into the mesh's material slot list
    pub material: u32,
    /// Selection hint set by hidden-surface marking (non-destructive mode)
    pub selected: bool,
}

impl Polygon {
    pub fn len(&self) -> usize {
        self.loop_len as usize
    }

    pub fn is_quad(&self) -> bool {
        self.loop_len == 4
    }

    pub fn loops(&self) -> std::ops::Range<usize> {
        self.loop_start as usize..(self.loop_start + self.loop_len) as usize
    }
}

/// Named material slot. `base_name` strips the instance-disambiguation
/// suffix, so slots "21" and "21.003" share base name "21".
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialSlot {
    pub name: String,
}

impl MaterialSlot {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn base_name(&self) -> &str {
        match self.name.split_once('.') {
            Some((base, suffix)) if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) => base,
            _ => &self.name,
        }
    }
}

/// A per-loop RGBA color layer (lighting, tint, opacity, glow).
#[derive(Clone, Debug)]
pub struct ColorLayer {
    pub name: String,
    pub data: Vec<Vec4>,
}

/// Polygon mesh with per-vertex positions/normals and per-loop layers.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub polygons: Vec<Polygon>,
    /// Vertex index per loop
    pub loop_vertices: Vec<u32>,
    /// Per-loop texture coordinates, if the source geometry had any
    pub loop_uvs: Option<Vec<Vec2>>,
    pub color_layers: Vec<ColorLayer>,
    pub material_slots: Vec<MaterialSlot>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loop_count(&self) -> usize {
        self.loop_vertices.len()
    }

    /// Vertex indices of one polygon's corners
    pub fn polygon_vertices(&self, poly: &Polygon) -> &[u32] {
        &self.loop_vertices[poly.loops()]
    }

    /// Append a polygon with the given corner vertices.
    pub fn add_polygon(&mut self, verts: &[u32], material: u32) {
        let loop_start = self.loop_vertices.len() as u32;
        self.loop_vertices.extend_from_slice(verts);
        self.polygons.push(Polygon {
            loop_start,
            loop_len: verts.len() as u32,
            material,
            selected: false,
        });
        let loop_count = self.loop_vertices.len();
        if let Some(uvs) = &mut self.loop_uvs {
            uvs.resize(loop_count, Vec2::ZERO);
        }
        for layer in &mut self.color_layers {
            layer.data.resize(loop_count, Vec4::ONE);
        }
    }

    /// Get a color layer by name, creating it (filled with `fill`) if
    /// missing. Returns the layer index.
    pub fn ensure_color_layer(&mut self, name: &str, fill: Vec4) -> usize {
        if let Some(i) = self.color_layers.iter().position(|l| l.name == name) {
            return i;
        }
        self.color_layers.push(ColorLayer {
            name: name.to_string(),
            data: vec![fill; self.loop_count()],
        });
        self.color_layers.len() - 1
    }

    pub fn color_layer(&self, name: &str) -> Option<&ColorLayer> {
        self.color_layers.iter().find(|l| l.name == name)
    }

    pub fn color_layer_mut(&mut self, name: &str) -> Option<&mut ColorLayer> {
        self.color_layers.iter_mut().find(|l| l.name == name)
    }

    pub fn remove_color_layer(&mut self, name: &str) {
        self.color_layers.retain(|l| l.name != name);
    }

    /// Flat triangle list (quads fan-split), for occlusion queries.
    /// Does not modify the mesh.
    pub fn triangle_soup(&self) -> Vec<[Vec3; 3]> {
        let mut tris = Vec::new();
        for poly in &self.polygons {
            let v = self.polygon_vertices(poly);
            for i in 1..v.len() - 1 {
                tris.push([
                    self.positions[v[0] as usize],
                    self.positions[v[i] as usize],
                    self.positions[v[i + 1] as usize],
                ]);
            }
        }
        tris
    }

    /// Face normal from the first three corners
    pub fn polygon_normal(&self, poly: &Polygon) -> Vec3 {
        let v = self.polygon_vertices(poly);
        let a = self.positions[v[0] as usize];
        let b = self.positions[v[1] as usize];
        let c = self.positions[v[2] as usize];
        (b - a).cross(c - a).normalize_or_zero()
    }

    /// Polygon centroid
    pub fn polygon_center(&self, poly: &Polygon) -> Vec3 {
        let mut sum = Vec3::ZERO;
        for &v in self.polygon_vertices(poly) {
            sum += self.positions[v as usize];
        }
        sum / poly.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_polygon_loops() {
        let mut mesh = Mesh::new();
        mesh.positions = vec![Vec3::ZERO; 5];
        mesh.add_polygon(&[0, 1, 2], 0);
        mesh.add_polygon(&[0, 2, 3, 4], 0);
        assert_eq!(mesh.loop_count(), 7);
        assert_eq!(mesh.polygons[1].loops(), 3..7);
        assert_eq!(mesh.polygon_vertices(&mesh.polygons[1]), &[0, 2, 3, 4]);
    }

    #[test]
    fn test_material_slot_base_name() {
        assert_eq!(MaterialSlot::new("21").base_name(), "21");
        assert_eq!(MaterialSlot::new("21.003").base_name(), "21");
        assert_eq!(MaterialSlot::new("1.5mm").base_name(), "1.5mm");
    }

    #[test]
    fn test_ensure_color_layer_idempotent() {
        let mut mesh = Mesh::new();
        mesh.positions = vec![Vec3::ZERO; 3];
        mesh.add_polygon(&[0, 1, 2], 0);
        let a = mesh.ensure_color_layer("Lit", Vec4::ONE);
        let b = mesh.ensure_color_layer("Lit", Vec4::ZERO);
        assert_eq!(a, b);
        assert_eq!(mesh.color_layers.len(), 1);
        assert_eq!(mesh.color_layers[0].data.len(), 3);
    }

    #[test]
    fn test_triangle_soup_splits_quads() {
        let mut mesh = Mesh::new();
        mesh.positions = vec![
            Vec3::ZERO,
            Vec3::X,
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::Y,
        ];
        mesh.add_polygon(&[0, 1, 2, 3], 0);
        assert_eq!(mesh.triangle_soup().len(), 2);
    }
}
