//! Built-in CPU occlusion baker
//!
//! Diffuse-only hemisphere visibility against a BVH over the occluder
//! set. Sampling is a deterministic stratified cosine-weighted set, so
//! repeated bakes of the same request produce identical buffers. Any
//! sample ray that escapes the occluders picks up the overexposed
//! environment, saturating the result toward white.

use rayon::prelude::*;

use crate::core::error::Error;
use crate::core::types::{Mat4, Result, Vec2, Vec3};
use crate::math::{Bvh, Ray};
use crate::mesh::Mesh;

use super::atlas::{surface_point, tri_covers, AtlasLayout};
use super::bake::{BakeRequest, Baker};

/// Ray origins are nudged off the surface along the normal to avoid
/// self-intersection at the emitting polygon.
const SURFACE_OFFSET: f32 = 1e-4;

#[derive(Debug, Default)]
pub struct CpuBaker;

impl CpuBaker {
    pub fn new() -> Self {
        Self
    }
}

impl Baker for CpuBaker {
    // Quadrants are addressed through the shared layout, so the
    // packed UV buffer is not consulted here.
    fn bake_atlas(
        &mut self,
        request: &BakeRequest,
        layout: &AtlasLayout,
        _uvs: &[Vec2],
        candidates: &[usize],
        pixels: &mut [Vec3],
    ) -> Result<()> {
        if request.mesh.polygons.is_empty() {
            return Err(Error::RendererTransient(
                "target has no renderable polygons".into(),
            ));
        }

        // Cleared up front so stale quadrants from a previous, larger
        // candidate set cannot leak into classification
        pixels.fill(Vec3::ZERO);

        let bvh = Bvh::build(request.occluders.to_vec());
        let q = layout.quadrant_size;

        // One quadrant-sized scanline block per candidate, scattered
        // into the shared buffer afterwards
        let quadrants: Vec<Vec<Vec3>> = candidates
            .par_iter()
            .map(|&polygon| {
                let mut block = vec![Vec3::ZERO; (q * q) as usize];
                let (corners, normal) = world_polygon(request.mesh, request.transform, polygon);
                for y in 0..q {
                    for x in 0..q {
                        if corners.len() == 3 && !tri_covers(layout, x, y) {
                            continue;
                        }
                        let origin =
                            surface_point(&corners, layout, x, y) + normal * SURFACE_OFFSET;
                        let exposure =
                            exposure(&bvh, origin, normal, request.samples, request.environment);
                        block[(y * q + x) as usize] = Vec3::splat(exposure);
                    }
                }
                block
            })
            .collect();

        for (i, block) in quadrants.iter().enumerate() {
            let (qx, qy) = layout.quadrant_of(i);
            for y in 0..q {
                for x in 0..q {
                    let index = layout.pixel_index(qx * q + x, qy * q + y);
                    pixels[index] = block[(y * q + x) as usize];
                }
            }
        }
        Ok(())
    }

    fn bake_vertices(&mut self, request: &BakeRequest) -> Result<Vec<f32>> {
        if request.mesh.polygons.is_empty() {
            return Err(Error::RendererTransient(
                "target has no renderable polygons".into(),
            ));
        }

        let bvh = Bvh::build(request.occluders.to_vec());
        let linear = glam::Mat3::from_mat4(request.transform);

        Ok(request
            .mesh
            .positions
            .par_iter()
            .zip(request.mesh.normals.par_iter())
            .map(|(&position, &normal)| {
                let normal = (linear * normal).normalize_or_zero();
                let origin =
                    request.transform.transform_point3(position) + normal * SURFACE_OFFSET;
                exposure(&bvh, origin, normal, request.samples, request.environment)
            })
            .collect())
    }
}

fn world_polygon(mesh: &Mesh, transform: Mat4, polygon: usize) -> (Vec<Vec3>, Vec3) {
    let poly = &mesh.polygons[polygon];
    let corners: Vec<Vec3> = mesh
        .polygon_vertices(poly)
        .iter()
        .map(|&v| transform.transform_point3(mesh.positions[v as usize]))
        .collect();
    let linear = glam::Mat3::from_mat4(transform);
    let normal = (linear * mesh.polygon_normal(poly)).normalize_or_zero();
    (corners, normal)
}

/// Fraction of hemisphere samples that escape the occluders, scaled by
/// the environment strength and clamped to full brightness
fn exposure(bvh: &Bvh, origin: Vec3, normal: Vec3, samples: u32, environment: f32) -> f32 {
    if normal == Vec3::ZERO {
        return 0.0;
    }
    let samples = samples.max(1);
    let (tangent, bitangent) = basis(normal);

    let mut escaped = 0u32;
    for s in 0..samples {
        let u = (s as f32 + 0.5) / samples as f32;
        let v = radical_inverse(s);
        let local = cosine_hemisphere(u, v);
        let direction = tangent * local.x + bitangent * local.y + normal * local.z;
        if !bvh.occluded(&Ray::new(origin, direction), f32::MAX) {
            escaped += 1;
        }
    }
    (escaped as f32 / samples as f32 * environment).min(1.0)
}

/// Van der Corput base-2 sequence
fn radical_inverse(i: u32) -> f32 {
    (i.reverse_bits() as f32) * 2.0f32.powi(-32)
}

fn cosine_hemisphere(u: f32, v: f32) -> Vec3 {
    let r = u.sqrt();
    let phi = 2.0 * std::f32::consts::PI * v;
    Vec3::new(r * phi.cos(), r * phi.sin(), (1.0 - u).max(0.0).sqrt())
}

fn basis(normal: Vec3) -> (Vec3, Vec3) {
    let helper = if normal.x.abs() > 0.9 { Vec3::Y } else { Vec3::X };
    let bitangent = normal.cross(helper).normalize();
    let tangent = bitangent.cross(normal);
    (tangent, bitangent)
}
