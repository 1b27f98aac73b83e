//! Occlusion classification
//!
//! Collapses the baked atlas to one exposure score per candidate
//! polygon by summing each quadrant's RGB, normalized by the polygon's
//! theoretical full-coverage pixel count. Quadrant addressing reuses
//! the packer's layout so both sides share one coordinate convention.

use crate::core::types::Vec3;
use crate::mesh::Mesh;

use super::atlas::AtlasLayout;

/// Outcome of one classification pass.
#[derive(Debug, Clone, Default)]
pub struct OcclusionResult {
    /// Polygon indices classified hidden
    pub hidden: Vec<usize>,
    /// Exposure score per candidate, as (polygon index, score)
    pub scores: Vec<(usize, f32)>,
}

impl OcclusionResult {
    pub fn all_visible(&self) -> bool {
        self.hidden.is_empty()
    }
}

/// Score every candidate and split off the hidden set. A polygon is
/// hidden iff its score is strictly below the threshold; a score equal
/// to the threshold stays visible.
pub fn classify(
    pixels: &[Vec3],
    layout: &AtlasLayout,
    mesh: &Mesh,
    candidates: &[usize],
    threshold: f32,
) -> OcclusionResult {
    let q = layout.quadrant_size as f64;
    let pixels_per_quad = q * q;
    // Half a quadrant plus its diagonal, exactly the triangle
    // footprint the baker fills
    let pixels_per_tri = (q * q + q) / 2.0;

    let mut result = OcclusionResult::default();
    for (i, &polygon) in candidates.iter().enumerate() {
        let (qx, qy) = layout.quadrant_of(i);
        // Accumulate in f64 so a quadrant sitting exactly at the
        // threshold does not drift below it and flip to hidden
        let mut sum = 0.0f64;
        for y in layout.quadrant_pixels(qy) {
            for x in layout.quadrant_pixels(qx) {
                let p = pixels[layout.pixel_index(x, y)];
                sum += f64::from(p.x) + f64::from(p.y) + f64::from(p.z);
            }
        }

        let coverage = if mesh.polygons[polygon].is_quad() {
            pixels_per_quad
        } else {
            pixels_per_tri
        };
        let score = (sum / coverage / 3.0) as f32;

        result.scores.push((polygon, score));
        if score < threshold {
            result.hidden.push(polygon);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hsr::atlas::{self, tri_covers};

    fn tri_quad_mesh() -> Mesh {
        let mut mesh = Mesh::new();
        mesh.positions = vec![crate::core::types::Vec3::ZERO; 7];
        mesh.add_polygon(&[0, 1, 2], 0);
        mesh.add_polygon(&[3, 4, 5, 6], 0);
        mesh
    }

    /// Fill quadrant i with a flat brightness, respecting the triangle
    /// footprint when `tri` is set
    fn fill_quadrant(pixels: &mut [Vec3], layout: &AtlasLayout, i: usize, value: f32, tri: bool) {
        let (qx, qy) = layout.quadrant_of(i);
        let q = layout.quadrant_size;
        for y in 0..q {
            for x in 0..q {
                if tri && !tri_covers(layout, x, y) {
                    continue;
                }
                pixels[layout.pixel_index(qx * q + x, qy * q + y)] = Vec3::splat(value);
            }
        }
    }

    #[test]
    fn test_full_coverage_scores_one() {
        let mesh = tri_quad_mesh();
        let layout = AtlasLayout::new(2, 5);
        let mut pixels = vec![Vec3::ZERO; layout.pixel_count()];
        fill_quadrant(&mut pixels, &layout, 0, 1.0, true);
        fill_quadrant(&mut pixels, &layout, 1, 1.0, false);

        let result = classify(&pixels, &layout, &mesh, &[0, 1], 0.01);
        assert!(result.all_visible());
        // The triangle normalization matches its footprint exactly
        assert!((result.scores[0].1 - 1.0).abs() < 1e-6);
        assert!((result.scores[1].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_dark_quadrant_is_hidden() {
        let mesh = tri_quad_mesh();
        let layout = AtlasLayout::new(2, 5);
        let mut pixels = vec![Vec3::ZERO; layout.pixel_count()];
        fill_quadrant(&mut pixels, &layout, 1, 1.0, false);

        let result = classify(&pixels, &layout, &mesh, &[0, 1], 0.01);
        assert_eq!(result.hidden, vec![0]);
    }

    #[test]
    fn test_threshold_boundary_is_visible() {
        let mesh = tri_quad_mesh();
        let layout = AtlasLayout::new(2, 5);
        let threshold = 0.01;
        let mut pixels = vec![Vec3::ZERO; layout.pixel_count()];

        // Exactly the threshold score stays visible, epsilon below
        // flips to hidden
        fill_quadrant(&mut pixels, &layout, 1, threshold, false);
        let result = classify(&pixels, &layout, &mesh, &[0, 1], threshold);
        assert!(!result.hidden.contains(&1));

        fill_quadrant(&mut pixels, &layout, 1, threshold - 1e-4, false);
        let result = classify(&pixels, &layout, &mesh, &[0, 1], threshold);
        assert!(result.hidden.contains(&1));
    }

    #[test]
    fn test_score_is_monotonic_in_brightness() {
        let mesh = tri_quad_mesh();
        let layout = AtlasLayout::new(2, 5);
        let mut previous = 0.0;
        for step in 0..8 {
            let mut pixels = vec![Vec3::ZERO; layout.pixel_count()];
            fill_quadrant(&mut pixels, &layout, 1, step as f32 / 8.0, false);
            let result = classify(&pixels, &layout, &mesh, &[0, 1], 0.01);
            let score = result.scores[1].1;
            assert!(score >= previous);
            previous = score;
        }
    }

    #[test]
    fn test_candidate_indirection() {
        // Candidate slot 0 maps to polygon 1: scores carry the real
        // polygon index
        let mesh = tri_quad_mesh();
        let layout = AtlasLayout::new(1, 5);
        let mut pixels = vec![Vec3::ZERO; layout.pixel_count()];
        fill_quadrant(&mut pixels, &layout, 0, 1.0, false);

        let result = classify(&pixels, &layout, &mesh, &[1], 0.01);
        assert_eq!(result.scores, vec![(1, 1.0)]);
        assert!(result.hidden.is_empty());
    }

    #[test]
    fn test_uses_packer_layout() {
        // Direct coupling check between packer UVs and classifier
        // addressing: the packed corner pixels of quadrant 1 land in
        // the region the classifier sums for candidate 1
        let mesh = tri_quad_mesh();
        let layout = AtlasLayout::new(2, 5);
        let uvs = atlas::pack(&mesh, &layout, &[0, 1]);

        // Quad corner 0 of candidate 1 (loop index 3)
        let uv = uvs[3];
        let x = (uv.x * layout.size_pixels as f32).round().max(0.0) as u32;
        let y = (uv.y * layout.size_pixels as f32) as u32;
        assert_eq!(layout.polygon_of(x.min(layout.size_pixels - 1), y), 1);
    }
}
