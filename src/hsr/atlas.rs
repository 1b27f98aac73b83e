//! Occlusion atlas layout and UV packing
//!
//! Every candidate polygon gets one square quadrant of a shared atlas
//! texture, row-major by candidate index. The packer emits a transient
//! per-loop UV buffer pinning each polygon corner to its quadrant's
//! corners; the classifier inverts the same layout, so both sides go
//! through this module's coordinate convention.

use crate::core::types::{Vec2, Vec3};
use crate::mesh::Mesh;

/// Geometry of one atlas: quadrant grid dimensions in quadrants and
/// pixels. Immutable for the duration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasLayout {
    /// Padding pixels between quadrant corner verts
    pub padding: u32,
    /// Quadrants per atlas row, `ceil(sqrt(polygon_count))`
    pub size: u32,
    /// Quadrant edge length in pixels, `2 + padding`
    pub quadrant_size: u32,
    /// Atlas edge length in pixels
    pub size_pixels: u32,
}

impl AtlasLayout {
    pub fn new(polygon_count: usize, padding: u32) -> Self {
        let size = (polygon_count as f64).sqrt().ceil() as u32;
        let quadrant_size = 2 + padding;
        Self {
            padding,
            size,
            quadrant_size,
            size_pixels: size * quadrant_size,
        }
    }

    pub fn pixel_count(&self) -> usize {
        (self.size_pixels * self.size_pixels) as usize
    }

    /// Quadrant grid cell of a candidate index, row-major
    pub fn quadrant_of(&self, index: usize) -> (u32, u32) {
        (index as u32 % self.size, index as u32 / self.size)
    }

    /// Candidate index owning an atlas pixel, the inverse of
    /// `quadrant_of` for every pixel inside the quadrant
    pub fn polygon_of(&self, x: u32, y: u32) -> usize {
        (x / self.quadrant_size + (y / self.quadrant_size) * self.size) as usize
    }

    /// Pixel range of one quadrant along either axis
    pub fn quadrant_pixels(&self, cell: u32) -> std::ops::Range<u32> {
        let start = cell * self.quadrant_size;
        start..start + self.quadrant_size
    }

    /// Flat row-major index of a pixel
    pub fn pixel_index(&self, x: u32, y: u32) -> usize {
        (y * self.size_pixels + x) as usize
    }
}

/// The four quadrant-corner UV offsets for a candidate's loops, in
/// loop order: bottom-left, bottom-right, top-right, top-left. The
/// small factors inset or overshoot the corners so bake filtering
/// does not bleed across quadrant borders.
fn corner_offsets(layout: &AtlasLayout) -> [Vec2; 4] {
    let inv = 1.0 / layout.size_pixels as f32;
    let p1 = (layout.padding + 1) as f32;
    [
        Vec2::new(0.0 - 0.01 * p1, 0.0) * inv,
        Vec2::new(1.0 + 1.00 * p1, 0.0) * inv,
        Vec2::new(1.0 + 1.00 * p1, 1.0 + 1.01 * p1) * inv,
        Vec2::new(0.0 - 0.01 * p1, 1.0 + 1.01 * p1) * inv,
    ]
}

/// Build the transient atlas UV buffer, one entry per mesh loop.
/// Loops of non-candidate polygons stay at zero; they are never baked
/// or read back.
pub fn pack(mesh: &Mesh, layout: &AtlasLayout, candidates: &[usize]) -> Vec<Vec2> {
    let offsets = corner_offsets(layout);
    let size_inv = 1.0 / layout.size as f32;

    let mut uvs = vec![Vec2::ZERO; mesh.loop_count()];
    for (i, &polygon) in candidates.iter().enumerate() {
        let (qx, qy) = layout.quadrant_of(i);
        let target = Vec2::new(qx as f32, qy as f32) * size_inv;
        for (j, l) in mesh.polygons[polygon].loops().enumerate() {
            uvs[l] = target + offsets[j];
        }
    }
    uvs
}

/// World-space surface point for an atlas pixel inside a candidate's
/// quadrant, interpolated from the polygon's corner positions. `x` and
/// `y` are pixel coordinates local to the quadrant.
pub fn surface_point(
    corners: &[Vec3],
    layout: &AtlasLayout,
    x_local: u32,
    y_local: u32,
) -> Vec3 {
    let q = layout.quadrant_size as f32;
    let u = (x_local as f32 + 0.5) / q;
    let v = (y_local as f32 + 0.5) / q;
    match corners.len() {
        // Triangles span the lower-right half: corners at (0,0),
        // (1,0), (1,1) in quadrant space
        3 => corners[0] * (1.0 - u) + corners[1] * (u - v) + corners[2] * v,
        _ => {
            corners[0] * ((1.0 - u) * (1.0 - v))
                + corners[1] * (u * (1.0 - v))
                + corners[2] * (u * v)
                + corners[3] * ((1.0 - u) * v)
        }
    }
}

/// Whether a quadrant-local pixel lies inside a triangle candidate's
/// baked footprint, the half square below the diagonal
pub fn tri_covers(layout: &AtlasLayout, x_local: u32, y_local: u32) -> bool {
    debug_assert!(x_local < layout.quadrant_size && y_local < layout.quadrant_size);
    x_local >= y_local
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_dimensions() {
        let layout = AtlasLayout::new(10, 5);
        assert_eq!(layout.size, 4);
        assert_eq!(layout.quadrant_size, 7);
        assert_eq!(layout.size_pixels, 28);
        assert_eq!(layout.pixel_count(), 784);
    }

    #[test]
    fn test_quadrant_round_trip() {
        // Every pixel inside quadrant i maps back to i
        let layout = AtlasLayout::new(9, 3);
        for i in 0..9 {
            let (qx, qy) = layout.quadrant_of(i);
            for y in layout.quadrant_pixels(qy) {
                for x in layout.quadrant_pixels(qx) {
                    assert_eq!(layout.polygon_of(x, y), i);
                }
            }
        }
    }

    #[test]
    fn test_pack_pins_corners_to_quadrant() {
        let mut mesh = Mesh::new();
        mesh.positions = vec![Vec3::ZERO; 8];
        for i in 0..2 {
            let b = i * 4;
            mesh.add_polygon(&[b, b + 1, b + 2, b + 3], 0);
        }

        // size = 2, quadrant = 7, atlas = 14 pixels
        let layout = AtlasLayout::new(2, 5);
        let uvs = pack(&mesh, &layout, &[0, 1]);
        assert_eq!(uvs.len(), 8);

        // Second quadrant starts half way across the atlas; its
        // bottom-left corner is inset slightly left of the border and
        // its bottom-right corner lands exactly one quadrant further
        assert!((uvs[4].x - (0.5 - 0.06 / 14.0)).abs() < 1e-6);
        assert_eq!(uvs[4].y, 0.0);
        assert!((uvs[5].x - 1.0).abs() < 1e-6);
        assert!((uvs[6].y - 7.06 / 14.0).abs() < 1e-6);
    }

    #[test]
    fn test_tri_footprint_pixel_count() {
        let layout = AtlasLayout::new(1, 5);
        let q = layout.quadrant_size;
        let mut count = 0;
        for y in 0..q {
            for x in 0..q {
                if tri_covers(&layout, x, y) {
                    count += 1;
                }
            }
        }
        // Half a quadrant plus its diagonal, matching the classifier's
        // triangle normalization
        assert_eq!(count, (q * q + q) / 2);
    }

    #[test]
    fn test_surface_point_interpolation() {
        let layout = AtlasLayout::new(1, 0);
        let quad = [
            Vec3::ZERO,
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(2.0, 2.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
        ];
        // Quadrant size 2, pixel (1,1) center sits at uv (0.75, 0.75)
        let p = surface_point(&quad, &layout, 1, 1);
        assert!((p - Vec3::new(1.5, 1.5, 0.0)).length() < 1e-6);

        let tri = [Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), Vec3::new(2.0, 2.0, 0.0)];
        let p = surface_point(&tri, &layout, 1, 0);
        // u=0.75, v=0.25 -> 0.25*c0 + 0.5*c1 + 0.25*c2
        assert!((p - Vec3::new(1.5, 0.5, 0.0)).length() < 1e-6);
    }
}
