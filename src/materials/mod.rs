//! Brick material color tables
//!
//! Immutable base tables keyed by material id, composed with an
//! optional override table loaded from JSON. Colors are stored linear;
//! conversion helpers cover the sRGB transfer both ways.

use std::collections::HashMap;

use serde::Deserialize;

use crate::core::types::{Result, Vec4};

/// Fallback material id when a referenced id is unknown
pub const FALLBACK_MATERIAL: &str = "26";

const OPAQUE: [(&str, [f32; 4]); 35] = [
    ("26", [0.006, 0.006, 0.006, 1.0]),
    ("199", [0.072272, 0.082283, 0.093059, 1.0]),
    ("194", [0.332452, 0.283149, 0.283149, 1.0]),
    ("208", [0.768151, 0.768151, 0.693872, 1.0]),
    ("1", [0.904661, 0.904661, 0.904661, 1.0]),
    ("154", [0.215861, 0.002428, 0.01096, 1.0]),
    ("21", [0.730461, 0.0, 0.004025, 1.0]),
    ("308", [0.03434, 0.015209, 0.0, 1.0]),
    ("192", [0.104617, 0.011612, 0.003677, 1.0]),
    ("138", [0.262251, 0.177888, 0.084376, 1.0]),
    ("5", [0.693872, 0.491021, 0.194618, 1.0]),
    ("38", [0.391572, 0.046665, 0.007499, 1.0]),
    ("18", [0.672443, 0.168269, 0.051269, 1.0]),
    ("106", [0.799103, 0.124772, 0.009134, 1.0]),
    ("191", [0.887923, 0.318547, 0.0, 1.0]),
    ("283", [0.913099, 0.533276, 0.250158, 1.0]),
    ("24", [0.991102, 0.552011, 0.0, 1.0]),
    ("226", [1.0, 0.768151, 0.141263, 1.0]),
    ("329", [0.913099, 0.896269, 0.679542, 1.0]),
    ("141", [0.0, 0.03434, 0.008023, 1.0]),
    ("151", [0.114435, 0.223228, 0.130137, 1.0]),
    ("28", [0.0, 0.198069, 0.021219, 1.0]),
    ("37", [0.0, 0.304987, 0.017642, 1.0]),
    ("119", [0.296138, 0.47932, 0.003035, 1.0]),
    ("326", [0.760525, 0.947307, 0.323143, 1.0]),
    ("140", [0.0, 0.0185, 0.052861, 1.0]),
    ("23", [0.0, 0.095307, 0.391572, 1.0]),
    ("102", [0.06301, 0.262251, 0.564712, 1.0]),
    ("135", [0.111932, 0.174647, 0.262251, 1.0]),
    ("212", [0.242281, 0.520996, 0.83077, 1.0]),
    ("268", [0.025187, 0.007499, 0.184475, 1.0]),
    ("124", [0.332452, 0.0, 0.147027, 1.0]),
    ("221", [0.730461, 0.038204, 0.258183, 1.0]),
    ("222", [0.846873, 0.341914, 0.53948, 1.0]),
    ("194b", [0.332452, 0.283149, 0.283149, 1.0]),
];

const TRANSPARENT: [(&str, [f32; 4]); 16] = [
    ("40", [0.854993, 0.854993, 0.854993, 1.0]),
    ("41", [0.745405, 0.023153, 0.022174, 1.0]),
    ("311", [0.42869, 0.64448, 0.061246, 1.0]),
    ("113", [0.854993, 0.337164, 0.545725, 1.0]),
    ("111", [0.496933, 0.445201, 0.341914, 1.0]),
    ("294", [0.846873, 0.341914, 0.53948, 1.0]),
    ("43", [0.08022, 0.439657, 0.806952, 1.0]),
    ("42", [0.467784, 0.745404, 0.863157, 1.0]),
    ("126", [0.332452, 0.296138, 0.571125, 1.0]),
    ("48", [0.119539, 0.450786, 0.155927, 1.0]),
    ("182", [0.8388, 0.181164, 0.004391, 1.0]),
    ("44", [0.947307, 0.863157, 0.141263, 1.0]),
    ("47", [0.791298, 0.132868, 0.059511, 1.0]),
    ("49", [0.930111, 0.83077, 0.099899, 1.0]),
    ("143", [0.623961, 0.760525, 0.930111, 1.0]),
    ("20", [0.930111, 0.672443, 0.250158, 1.0]),
];

const GLOW: [(&str, [f32; 4]); 2] = [
    ("50", [1.0, 1.0, 1.0, 1.0]),
    ("329", [0.913099, 0.896269, 0.679542, 1.0]),
];

/// Per-material deviation from the global color variation strength
const CUSTOM_VARIATION: [(&str, f32); 2] = [("140", 1.0), ("194", 1.0)];

/// Optional override table, JSON `{ "opaque": { "21": [r,g,b,a] }, ... }`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaterialOverrides {
    #[serde(default)]
    pub opaque: HashMap<String, [f32; 4]>,
    #[serde(default)]
    pub transparent: HashMap<String, [f32; 4]>,
    #[serde(default)]
    pub glow: HashMap<String, [f32; 4]>,
}

impl MaterialOverrides {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Composed material table: built-in base colors plus overrides,
/// immutable after construction.
#[derive(Debug, Clone)]
pub struct MaterialTable {
    opaque: HashMap<String, Vec4>,
    transparent: HashMap<String, Vec4>,
    glow: HashMap<String, Vec4>,
    variation: HashMap<String, f32>,
}

impl Default for MaterialTable {
    fn default() -> Self {
        Self::new(MaterialOverrides::default())
    }
}

impl MaterialTable {
    pub fn new(overrides: MaterialOverrides) -> Self {
        let build = |base: &[(&str, [f32; 4])], extra: HashMap<String, [f32; 4]>| {
            let mut map: HashMap<String, Vec4> = base
                .iter()
                .map(|&(id, c)| (id.to_string(), Vec4::from_array(c)))
                .collect();
            for (id, c) in extra {
                map.insert(id, Vec4::from_array(c));
            }
            map
        };
        Self {
            opaque: build(&OPAQUE, overrides.opaque),
            transparent: build(&TRANSPARENT, overrides.transparent),
            glow: build(&GLOW, overrides.glow),
            variation: CUSTOM_VARIATION
                .iter()
                .map(|&(id, v)| (id.to_string(), v))
                .collect(),
        }
    }

    /// Linear base color for a material id, opaque or transparent.
    /// Unknown ids fall back to the default material.
    pub fn color(&self, id: &str) -> Vec4 {
        self.opaque
            .get(id)
            .or_else(|| self.transparent.get(id))
            .copied()
            .unwrap_or_else(|| {
                log::warn!("material {id} does not exist, using {FALLBACK_MATERIAL}");
                self.opaque[FALLBACK_MATERIAL]
            })
    }

    /// Corrected color, if the id has a table entry at all
    pub fn correction(&self, id: &str) -> Option<Vec4> {
        self.opaque
            .get(id)
            .or_else(|| self.transparent.get(id))
            .copied()
    }

    pub fn is_transparent(&self, id: &str) -> bool {
        self.transparent.contains_key(id)
    }

    pub fn glow_color(&self, id: &str) -> Option<Vec4> {
        self.glow.get(id).copied()
    }

    pub fn has_glow(&self, id: &str) -> bool {
        self.glow.contains_key(id)
    }

    /// Color variation strength multiplier for a material id
    pub fn variation_scale(&self, id: &str) -> f32 {
        self.variation.get(id).copied().unwrap_or(1.0)
    }
}

/// sRGB transfer to linear, per channel (alpha passes through the same
/// curve as the original tooling does)
pub fn srgb_to_linear(color: Vec4) -> Vec4 {
    Vec4::from_array(color.to_array().map(|srgb| {
        if srgb <= 0.040_448_237 {
            srgb / 12.92
        } else {
            ((srgb + 0.055) / 1.055).powf(2.4)
        }
    }))
}

/// Linear to sRGB transfer, per channel
pub fn linear_to_srgb(color: Vec4) -> Vec4 {
    Vec4::from_array(color.to_array().map(|lin| {
        if lin > 0.003_130_8 {
            1.055 * lin.powf(1.0 / 2.4) - 0.055
        } else {
            12.92 * lin
        }
    }))
}
