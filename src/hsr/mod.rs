//! Hidden surface removal
//!
//! Classifies polygons by their exposure to an overexposed environment
//! bake and removes (or marks) the ones no light reaches. One run
//! walks a fixed sequence: validate, optional quadify, optional cheap
//! vertex pre-pass, pack the atlas, bake, classify, apply, then leave
//! the mesh triangulated. All atlas state is transient per run; only
//! the pixel scratch buffer survives between runs.

pub mod atlas;
pub mod bake;
pub mod classify;
pub mod raybake;

pub use atlas::AtlasLayout;
pub use bake::{BakePasses, BakeRequest, Baker};
pub use classify::OcclusionResult;
pub use raybake::CpuBaker;

use std::path::PathBuf;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::core::types::{Mat4, Result, Vec3};
use crate::mesh::{ops, Mesh};

/// Knobs of one removal run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HsrConfig {
    /// Delete hidden polygons; when off they are only marked selected
    pub autoremove: bool,
    /// Merge triangles into quads before packing for a denser atlas
    pub tris_to_quads: bool,
    /// Padding pixels between quadrant corner verts
    pub pixels_between_verts: u32,
    /// Bake samples for the atlas pass
    pub samples: u32,
    /// Run the cheap per-vertex pre-pass first
    pub prepass: bool,
    /// Bake samples for the pre-pass
    pub prepass_samples: u32,
    /// Exposure below this is hidden (strict comparison)
    pub threshold: f32,
    /// Drop a black ground plane under the model so downward faces
    /// count as occluded
    pub use_ground_plane: bool,
    /// Write the baked atlas to this path as a PNG for inspection
    pub debug_atlas: Option<PathBuf>,
}

impl Default for HsrConfig {
    fn default() -> Self {
        Self {
            autoremove: true,
            tris_to_quads: true,
            pixels_between_verts: 5,
            samples: 8,
            prepass: false,
            prepass_samples: 32,
            threshold: 0.01,
            use_ground_plane: false,
            debug_atlas: None,
        }
    }
}

/// The removal engine. Owns the baker and the reusable atlas scratch
/// buffer, which is reallocated wholesale whenever the required size
/// changes.
pub struct Hsr<B: Baker> {
    pub config: HsrConfig,
    baker: B,
    scratch: Vec<Vec3>,
    scratch_dim: u32,
}

impl Default for Hsr<CpuBaker> {
    fn default() -> Self {
        Self::new(HsrConfig::default(), CpuBaker::new())
    }
}

impl<B: Baker> Hsr<B> {
    pub fn new(config: HsrConfig, baker: B) -> Self {
        Self {
            config,
            baker,
            scratch: Vec::new(),
            scratch_dim: 0,
        }
    }

    /// Run hidden surface removal on one mesh placed in the world by
    /// `transform`. The mesh's own geometry is the only occluder,
    /// optionally joined by the ground plane.
    pub fn run(&mut self, mesh: &mut Mesh, transform: Mat4) -> Result<OcclusionResult> {
        ops::validate(mesh)?;

        if self.config.tris_to_quads {
            ops::tris_to_quads(mesh);
        }

        let mut occluders: Vec<[Vec3; 3]> = mesh
            .triangle_soup()
            .into_iter()
            .map(|tri| tri.map(|p| transform.transform_point3(p)))
            .collect();
        if self.config.use_ground_plane {
            occluders.extend(bake::ground_plane());
        }

        let mut candidates: Vec<usize> = (0..mesh.polygons.len()).collect();
        if self.config.prepass {
            candidates = self.prepass_candidates(mesh, transform, &occluders)?;
            if candidates.is_empty() {
                debug!("pre-pass found every polygon visible");
                self.finish_topology(mesh);
                return Ok(OcclusionResult::default());
            }
        }

        let layout = AtlasLayout::new(candidates.len(), self.config.pixels_between_verts);
        // The packed UVs are transient; the mesh's own UV layer is
        // never touched
        let uvs = atlas::pack(mesh, &layout, &candidates);

        let request = BakeRequest {
            mesh,
            transform,
            occluders: &occluders,
            samples: self.config.samples,
            environment: bake::OVEREXPOSED_STRENGTH,
            passes: BakePasses::default(),
        };
        if self.scratch_dim != layout.size_pixels {
            self.scratch = vec![Vec3::ZERO; layout.pixel_count()];
            self.scratch_dim = layout.size_pixels;
        }
        let bake_result =
            self.baker
                .bake_atlas(&request, &layout, &uvs, &candidates, &mut self.scratch);
        if let Err(e) = bake_result {
            // Leave the mesh in the uniform triangulated state even
            // when the bake failed
            self.finish_topology(mesh);
            return Err(e);
        }

        if let Some(path) = &self.config.debug_atlas {
            dump_atlas(&self.scratch, &layout, path)?;
        }

        let result = classify::classify(
            &self.scratch,
            &layout,
            mesh,
            &candidates,
            self.config.threshold,
        );
        info!(
            "classified {} of {} polygons hidden",
            result.hidden.len(),
            mesh.polygons.len()
        );

        if self.config.autoremove {
            let mut remove = vec![false; mesh.polygons.len()];
            for &polygon in &result.hidden {
                remove[polygon] = true;
            }
            ops::delete_polygons(mesh, &remove);
            ops::delete_loose_vertices(mesh);
        } else {
            for &polygon in &result.hidden {
                mesh.polygons[polygon].selected = true;
            }
        }

        self.finish_topology(mesh);
        Ok(result)
    }

    /// Vertex-color pre-pass: polygons with any corner already exposed
    /// are definitely visible and drop out of the atlas bake.
    fn prepass_candidates(
        &mut self,
        mesh: &Mesh,
        transform: Mat4,
        occluders: &[[Vec3; 3]],
    ) -> Result<Vec<usize>> {
        let request = BakeRequest {
            mesh,
            transform,
            occluders,
            samples: self.config.prepass_samples,
            environment: bake::OVEREXPOSED_STRENGTH,
            passes: BakePasses::default(),
        };
        let exposure = self.baker.bake_vertices(&request)?;

        let threshold = self.config.threshold;
        let candidates = (0..mesh.polygons.len())
            .filter(|&p| {
                mesh.polygon_vertices(&mesh.polygons[p])
                    .iter()
                    .all(|&v| exposure[v as usize] <= threshold)
            })
            .collect::<Vec<_>>();
        debug!(
            "pre-pass kept {} of {} polygons as candidates",
            candidates.len(),
            mesh.polygons.len()
        );
        Ok(candidates)
    }

    /// Quadification is bake-local; exported meshes are uniformly
    /// triangulated.
    fn finish_topology(&self, mesh: &mut Mesh) {
        if self.config.tris_to_quads {
            ops::triangulate(mesh);
        }
    }
}

/// Write the atlas pixel buffer as an 8-bit grayscale-ish PNG. Bake
/// output is already clamped to [0, 1].
fn dump_atlas(pixels: &[Vec3], layout: &AtlasLayout, path: &std::path::Path) -> Result<()> {
    let dim = layout.size_pixels;
    let floats: &[f32] = bytemuck::cast_slice(pixels);
    let mut img = image::RgbImage::new(dim, dim);
    for (i, pixel) in img.pixels_mut().enumerate() {
        let rgb = &floats[i * 3..i * 3 + 3];
        *pixel = image::Rgb([
            (rgb[0] * 255.0) as u8,
            (rgb[1] * 255.0) as u8,
            (rgb[2] * 255.0) as u8,
        ]);
    }
    img.save(path)?;
    debug!("wrote atlas debug image to {}", path.display());
    Ok(())
}
