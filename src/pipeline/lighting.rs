//! Standalone vertex lighting bake
//!
//! Bakes scene lighting into the "Lit" color layer of every opaque
//! object under a white ambient environment. Transparent objects are
//! hidden for the duration so light passes through them; each target is
//! lit by every other visible object as well as its own geometry. The
//! alpha channel of an existing "Alpha" layer is folded into Lit so the
//! exporter reads both from one layer.

use log::info;
use serde::{Deserialize, Serialize};

use crate::core::types::{Result, Vec3, Vec4};
use crate::hsr::{BakePasses, BakeRequest, Baker};
use crate::scene::SceneGraph;

/// Knobs of one lighting bake.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    /// Hemisphere samples per vertex
    pub samples: u32,
    /// Skip indirect bounces, leaving pure ambient occlusion
    pub ao_only: bool,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            samples: 256,
            ao_only: false,
        }
    }
}

/// Bake lighting into the "Lit" layer of every opaque object.
/// Materialless objects are skipped with a warning; transparent
/// objects neither receive light nor block it.
pub fn bake_lighting<B: Baker>(
    scene: &mut SceneGraph,
    baker: &mut B,
    config: &LightingConfig,
) -> Result<()> {
    let occluders: Vec<[Vec3; 3]> = scene
        .objects
        .iter()
        .filter(|o| !o.hide_render && !o.attributes.transparent)
        .flat_map(|o| o.world_triangles())
        .collect();

    let mut passes = BakePasses::default();
    passes.indirect = !config.ao_only;

    let mut warnings = Vec::new();
    let mut baked = 0usize;
    for object in &mut scene.objects {
        if object.attributes.transparent {
            continue;
        }
        if object.mesh.material_slots.is_empty() {
            warnings.push(format!("skipping {}: has no materials", object.name));
            continue;
        }

        let request = BakeRequest {
            mesh: &object.mesh,
            transform: object.transform,
            occluders: &occluders,
            samples: config.samples,
            environment: 1.0,
            passes,
        };
        let exposure = match baker.bake_vertices(&request) {
            Ok(exposure) => exposure,
            Err(e) => {
                warnings.push(format!("skipping {}: {e}", object.name));
                continue;
            }
        };

        let mesh = &mut object.mesh;
        let lit = mesh.ensure_color_layer("Lit", Vec4::new(0.0, 0.0, 0.0, 1.0));
        for (l, &v) in mesh.loop_vertices.iter().enumerate() {
            let e = exposure[v as usize];
            let alpha = mesh.color_layers[lit].data[l].w;
            mesh.color_layers[lit].data[l] = Vec4::new(e, e, e, alpha);
        }

        // The engine reads opacity from Lit's alpha channel
        if let Some(alpha) = mesh.color_layer("Alpha") {
            let reds: Vec<f32> = alpha.data.iter().map(|c| c.x).collect();
            if let Some(lit) = mesh.color_layer_mut("Lit") {
                for (color, red) in lit.data.iter_mut().zip(reds) {
                    color.w = red;
                }
            }
        }
        baked += 1;
    }

    for warning in warnings {
        scene.warn(warning);
    }
    info!("baked lighting for {baked} objects");
    Ok(())
}
