//! Bake request and baker boundary
//!
//! A bake is a synchronous call handing the baker everything it needs
//! as one value: target geometry, occluder set, environment strength
//! and sample count. The baker writes exposure into the atlas pixel
//! buffer or a per-vertex channel and owns no scene state between
//! calls.

use crate::core::types::{Mat4, Result, Vec2, Vec3};
use crate::mesh::Mesh;

use super::atlas::AtlasLayout;

/// Emission strength of the overexposed environment. Any unoccluded
/// sample saturates the result toward white.
pub const OVEREXPOSED_STRENGTH: f32 = 100_000.0;

/// Light transport passes accumulated into the bake target.
#[derive(Debug, Clone, Copy)]
pub struct BakePasses {
    pub direct: bool,
    pub indirect: bool,
    pub diffuse: bool,
}

impl Default for BakePasses {
    fn default() -> Self {
        Self {
            direct: true,
            indirect: true,
            diffuse: true,
        }
    }
}

/// Everything one bake call needs, passed by value instead of cloning
/// scene state into the renderer.
pub struct BakeRequest<'a> {
    /// Target mesh in object space
    pub mesh: &'a Mesh,
    /// Object-to-world transform of the target
    pub transform: Mat4,
    /// World-space occluder triangles, the target's own geometry
    /// included
    pub occluders: &'a [[Vec3; 3]],
    pub samples: u32,
    /// Environment emission strength picked up by escaping samples.
    /// 1.0 is a plain white ambient; [`OVEREXPOSED_STRENGTH`] makes any
    /// escape saturate.
    pub environment: f32,
    pub passes: BakePasses,
}

/// Synchronous bake service. Implementations may parallelize
/// internally; the call returns once the target buffer is complete.
pub trait Baker {
    /// Bake exposure into the atlas pixel buffer (RGB, row-major,
    /// `layout.pixel_count()` entries) for the candidate polygons.
    /// `uvs` is the packed per-loop atlas UV buffer; bakers that
    /// rasterize through texture coordinates consume it, bakers that
    /// address quadrants through the layout may ignore it.
    fn bake_atlas(
        &mut self,
        request: &BakeRequest,
        layout: &AtlasLayout,
        uvs: &[Vec2],
        candidates: &[usize],
        pixels: &mut [Vec3],
    ) -> Result<()>;

    /// Bake exposure per vertex instead, returning one brightness
    /// value per mesh vertex. Used by the cheap pre-pass.
    fn bake_vertices(&mut self, request: &BakeRequest) -> Result<Vec<f32>>;
}

/// Triangles of the optional ground plane, a flat black box under the
/// model so downward-facing geometry reads as occluded.
pub fn ground_plane() -> Vec<[Vec3; 3]> {
    box_triangles(Vec3::new(0.0, 0.0, -50.0), Vec3::new(500.0, 500.0, 50.0))
}

/// Twelve triangles of an axis-aligned box
pub fn box_triangles(center: Vec3, half_extent: Vec3) -> Vec<[Vec3; 3]> {
    let min = center - half_extent;
    let max = center + half_extent;
    let corner = |x: bool, y: bool, z: bool| {
        Vec3::new(
            if x { max.x } else { min.x },
            if y { max.y } else { min.y },
            if z { max.z } else { min.z },
        )
    };
    // One quad per face, wound outward
    let quads: [[Vec3; 4]; 6] = [
        [corner(false, false, false), corner(false, true, false), corner(true, true, false), corner(true, false, false)],
        [corner(false, false, true), corner(true, false, true), corner(true, true, true), corner(false, true, true)],
        [corner(false, false, false), corner(true, false, false), corner(true, false, true), corner(false, false, true)],
        [corner(false, true, false), corner(false, true, true), corner(true, true, true), corner(true, true, false)],
        [corner(false, false, false), corner(false, false, true), corner(false, true, true), corner(false, true, false)],
        [corner(true, false, false), corner(true, true, false), corner(true, true, true), corner(true, false, true)],
    ];
    quads
        .iter()
        .flat_map(|q| [[q[0], q[1], q[2]], [q[0], q[2], q[3]]])
        .collect()
}
