// src/shadows/params.rs
// Runtime shadow parameters with range validation
// Exists so hosts can hand the renderer a checked value object; the
// renderer itself only ever holds validated snapshots
// RELEVANT FILES: src/shadows/reconcile.rs, src/shadows/uniforms.rs

use super::technique::ShadowTechnique;

/// Permitted shadow map resolutions (512-texel steps).
pub const MAP_SIZES: [u32; 8] = [512, 1024, 1536, 2048, 2560, 3072, 3584, 4096];

/// Permitted PCF sample counts; larger requests round down.
pub const PCF_SAMPLE_BUCKETS: [u32; 4] = [4, 8, 16, 32];

/// Permitted PCSS blocker-search sample counts. The shader caps the
/// actual search at [`PCSS_BLOCKER_CAP`] for uniform control flow.
pub const PCSS_BLOCKER_BUCKETS: [u32; 3] = [8, 16, 32];

/// Hard cap on blocker-search taps regardless of the requested count.
pub const PCSS_BLOCKER_CAP: u32 = 8;

pub const MIN_BIAS: f32 = 0.001;
pub const MAX_BIAS: f32 = 0.02;
pub const MIN_PCF_RADIUS: f32 = 0.5;
pub const MAX_PCF_RADIUS: f32 = 5.0;
pub const MIN_LIGHT_SIZE: f32 = 0.01;
pub const MAX_LIGHT_SIZE: f32 = 0.2;
pub const MIN_VSM_VARIANCE: f32 = 1.0e-6;
pub const MAX_VSM_VARIANCE: f32 = 1.0e-3;
pub const MAX_BLEED_REDUCTION: f32 = 0.8;
pub const MAX_SHADOW_STRENGTH: f32 = 2.0;

/// Host-owned shadow configuration. The renderer copies this into an
/// immutable per-frame snapshot; changes land in a pending slot that
/// is applied between frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowParams {
    pub technique: ShadowTechnique,
    pub map_size: u32,
    pub bias: f32,
    pub pcf_radius: f32,
    pub pcf_samples: u32,
    pub pcss_light_size: f32,
    pub pcss_blocker_samples: u32,
    pub vsm_min_variance: f32,
    pub vsm_light_bleed_reduction: f32,
    pub shadow_strength: f32,
}

impl Default for ShadowParams {
    fn default() -> Self {
        Self {
            technique: ShadowTechnique::PCF,
            map_size: 2048,
            bias: 0.005,
            pcf_radius: 2.0,
            pcf_samples: 16,
            pcss_light_size: 0.05,
            pcss_blocker_samples: 8,
            vsm_min_variance: 1.0e-4,
            vsm_light_bleed_reduction: 0.2,
            shadow_strength: 1.0,
        }
    }
}

impl ShadowParams {
    pub fn new(technique: ShadowTechnique) -> Self {
        Self {
            technique,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !MAP_SIZES.contains(&self.map_size) {
            return Err(format!(
                "map_size must be one of {:?}, got {}",
                MAP_SIZES, self.map_size
            ));
        }

        if self.bias < MIN_BIAS || self.bias > MAX_BIAS {
            return Err(format!(
                "bias must be between {} and {}",
                MIN_BIAS, MAX_BIAS
            ));
        }

        if self.pcf_radius < MIN_PCF_RADIUS || self.pcf_radius > MAX_PCF_RADIUS {
            return Err(format!(
                "pcf_radius must be between {} and {}",
                MIN_PCF_RADIUS, MAX_PCF_RADIUS
            ));
        }

        if !PCF_SAMPLE_BUCKETS.contains(&self.pcf_samples) {
            return Err(format!(
                "pcf_samples must be one of {:?}, got {}",
                PCF_SAMPLE_BUCKETS, self.pcf_samples
            ));
        }

        if self.pcss_light_size < MIN_LIGHT_SIZE || self.pcss_light_size > MAX_LIGHT_SIZE {
            return Err(format!(
                "pcss_light_size must be between {} and {}",
                MIN_LIGHT_SIZE, MAX_LIGHT_SIZE
            ));
        }

        if !PCSS_BLOCKER_BUCKETS.contains(&self.pcss_blocker_samples) {
            return Err(format!(
                "pcss_blocker_samples must be one of {:?}, got {}",
                PCSS_BLOCKER_BUCKETS, self.pcss_blocker_samples
            ));
        }

        if self.vsm_min_variance < MIN_VSM_VARIANCE || self.vsm_min_variance > MAX_VSM_VARIANCE {
            return Err(format!(
                "vsm_min_variance must be between {:e} and {:e}",
                MIN_VSM_VARIANCE, MAX_VSM_VARIANCE
            ));
        }

        if self.vsm_light_bleed_reduction < 0.0
            || self.vsm_light_bleed_reduction > MAX_BLEED_REDUCTION
        {
            return Err(format!(
                "vsm_light_bleed_reduction must be between 0 and {}",
                MAX_BLEED_REDUCTION
            ));
        }

        if self.shadow_strength < 0.0 || self.shadow_strength > MAX_SHADOW_STRENGTH {
            return Err(format!(
                "shadow_strength must be between 0 and {}",
                MAX_SHADOW_STRENGTH
            ));
        }

        Ok(())
    }
}
