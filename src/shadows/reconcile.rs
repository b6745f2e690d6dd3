// src/shadows/reconcile.rs
// Configuration snapshot + diff deciding which GPU objects a
// parameter change actually invalidates
// Numeric slider changes reach the GPU through the per-frame uniforms
// alone; only technique, map size, and blur wiring touch resources
// RELEVANT FILES: src/shadows/renderer.rs, src/shadows/params.rs

use super::params::ShadowParams;
use super::resources::BlurMode;
use super::technique::ShadowTechnique;

/// The subset of parameters whose change invalidates GPU objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Configuration {
    pub technique: ShadowTechnique,
    pub map_size: u32,
    pub blur_mode: BlurMode,
}

impl Configuration {
    pub fn new(params: &ShadowParams, blur_mode: BlurMode) -> Self {
        Self {
            technique: params.technique,
            map_size: params.map_size,
            blur_mode,
        }
    }
}

/// Work items produced by diffing two configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcilePlan {
    /// Shadow/moment textures must be reallocated at the new size.
    pub reallocate_resources: bool,
    /// The active lit pipeline changes.
    pub switch_pipeline: bool,
    /// The set-1 bind group references stale resources.
    pub rebuild_bind_group: bool,
}

impl ReconcilePlan {
    pub fn is_noop(&self) -> bool {
        !self.reallocate_resources && !self.switch_pipeline && !self.rebuild_bind_group
    }
}

/// Compare configurations and emit only the necessary rebuild steps.
pub fn diff(old: &Configuration, new: &Configuration) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();

    if old.map_size != new.map_size {
        plan.reallocate_resources = true;
        plan.rebuild_bind_group = true;
    }
    if old.technique != new.technique {
        plan.switch_pipeline = true;
        plan.rebuild_bind_group = true;
    }
    if old.blur_mode != new.blur_mode && new.technique == ShadowTechnique::VSM {
        // The lit pass samples a different moment texture.
        plan.rebuild_bind_group = true;
    }

    plan
}
