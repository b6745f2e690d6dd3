// src/shadows/filtering.rs
// CPU reference implementations of the four shadow visibility functions
// Mirrors the WGSL numerics one-to-one so the contracts stay testable
// without GPU dependencies
// RELEVANT FILES: src/shaders/scene_pcf.wgsl, src/shaders/scene_pcss.wgsl,
// src/shaders/scene_vsm.wgsl, src/shadows/params.rs

use glam::{Mat4, Vec2, Vec3, Vec4};

use super::params::{PCF_SAMPLE_BUCKETS, PCSS_BLOCKER_CAP};

/// Fixed Poisson-disk offset table. PCF sample counts select a
/// contiguous prefix; PCSS uses the first 8 entries for its blocker
/// search and the first 16 for its filter taps. The WGSL table in the
/// scene shaders must stay identical to this one.
pub const POISSON_DISK: [[f32; 2]; 64] = [
    [-0.539334, -0.492325],
    [-0.509200, 0.571405],
    [0.458805, 0.783500],
    [0.488911, -0.261915],
    [0.452173, -0.022044],
    [-0.530513, -0.794268],
    [0.700490, 0.574240],
    [-0.205606, 0.151885],
    [-0.185109, -0.560211],
    [-0.736013, 0.509801],
    [0.252076, -0.774730],
    [-0.949220, 0.237791],
    [0.158699, -0.537161],
    [-0.349124, -0.890625],
    [-0.496108, 0.136868],
    [0.078643, 0.247216],
    [-0.776528, -0.125209],
    [-0.185253, -0.097785],
    [-0.293542, -0.332949],
    [-0.146407, 0.656425],
    [0.773362, -0.447381],
    [-0.350507, 0.820093],
    [0.223500, 0.961514],
    [0.035579, -0.221739],
    [-0.857712, 0.028791],
    [0.011699, -0.853659],
    [-0.460341, -0.213012],
    [0.329892, 0.147179],
    [0.872897, -0.267538],
    [0.535038, -0.517948],
    [0.708072, -0.655479],
    [0.249925, 0.649310],
    [0.344744, -0.523548],
    [0.760626, 0.146269],
    [0.692071, -0.259149],
    [0.086108, 0.545769],
    [-0.615233, -0.016540],
    [-0.940641, -0.210061],
    [-0.722493, -0.639132],
    [0.250361, -0.306990],
    [0.208327, -0.124376],
    [0.823817, 0.411788],
    [-0.364366, -0.515255],
    [0.921826, 0.040728],
    [-0.618416, 0.272107],
    [0.108245, 0.780445],
    [0.231309, 0.384504],
    [-0.323597, 0.518323],
    [-0.113954, -0.387467],
    [0.045826, 0.012915],
    [0.418339, -0.733719],
    [-0.414683, 0.372037],
    [0.427582, 0.442425],
    [-0.768580, -0.348590],
    [0.936858, 0.277485],
    [-0.105163, 0.459872],
    [-0.321969, -0.682112],
    [0.591107, -0.798955],
    [0.606604, 0.058865],
    [-0.029708, -0.687574],
    [0.138994, -0.972386],
    [-0.068800, 0.943566],
    [0.474260, 0.242736],
    [-0.339687, -0.019480],
];

/// PCSS filter taps after a successful blocker search.
pub const PCSS_FILTER_SAMPLES: u32 = 16;

/// Upper clamp on the derived PCSS filter radius, in texels.
pub const MAX_FILTER_TEXELS: f32 = 24.0;

/// Upper clamp on the blocker search radius, in texels.
pub const MAX_SEARCH_TEXELS: f32 = 16.0;

/// A fragment's position in the shadow map: texture coordinates plus
/// the receiver depth in [0,1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSample {
    pub uv: Vec2,
    pub depth: f32,
}

/// Project a world-space point through the light's view-projection.
/// Returns `None` when the NDC position falls outside
/// `[-1,1]² × [0,1]`; callers must report full visibility for such
/// points, since they lie outside the shadow frustum.
pub fn project_to_light_space(world: Vec3, light_view_proj: Mat4) -> Option<LightSample> {
    let clip = light_view_proj * Vec4::new(world.x, world.y, world.z, 1.0);
    if clip.w.abs() <= f32::EPSILON {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    if ndc.x < -1.0 || ndc.x > 1.0 || ndc.y < -1.0 || ndc.y > 1.0 || ndc.z < 0.0 || ndc.z > 1.0 {
        return None;
    }
    // Flip y going from NDC to texture space, matching the WGSL side.
    Some(LightSample {
        uv: Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5),
        depth: ndc.z,
    })
}

/// Round a requested PCF sample count down to the nearest supported
/// bucket. Requests above the largest bucket clamp to it.
pub fn round_pcf_samples(requested: u32) -> u32 {
    let mut chosen = PCF_SAMPLE_BUCKETS[0];
    for bucket in PCF_SAMPLE_BUCKETS {
        if bucket <= requested {
            chosen = bucket;
        }
    }
    chosen
}

/// Hard shadow map comparison: lit when the biased receiver depth is
/// closer than the stored depth.
pub fn hard_visibility(stored_depth: f32, receiver_depth: f32, bias: f32) -> f32 {
    if receiver_depth - bias < stored_depth {
        1.0
    } else {
        0.0
    }
}

/// PCF: average of N hard comparisons at Poisson-disk offsets scaled
/// by `radius_texels`. `sample_depth` reads the stored depth at a
/// texture coordinate.
pub fn pcf_visibility<F>(
    sample_depth: F,
    sample: LightSample,
    bias: f32,
    radius_texels: f32,
    requested_samples: u32,
    map_size: f32,
) -> f32
where
    F: Fn(Vec2) -> f32,
{
    let count = round_pcf_samples(requested_samples);
    let texel = radius_texels / map_size;
    let mut sum = 0.0;
    for offset in POISSON_DISK.iter().take(count as usize) {
        let uv = sample.uv + Vec2::new(offset[0], offset[1]) * texel;
        sum += hard_visibility(sample_depth(uv), sample.depth, bias);
    }
    sum / count as f32
}

/// Blocker search radius in texels for a given light size.
pub fn blocker_search_radius_texels(light_size: f32, map_size: f32) -> f32 {
    (light_size * map_size * 0.5).clamp(1.0, MAX_SEARCH_TEXELS)
}

/// PCSS filter radius in texels derived from the penumbra estimate.
pub fn pcss_filter_radius_texels(penumbra: f32, map_size: f32) -> f32 {
    (penumbra * map_size).max(1.0).min(MAX_FILTER_TEXELS)
}

/// Penumbra width estimate from the classic similar-triangles
/// relation between receiver, average blocker, and light size.
pub fn penumbra_width(receiver_depth: f32, avg_blocker_depth: f32, light_size: f32) -> f32 {
    if avg_blocker_depth <= f32::EPSILON {
        return 0.0;
    }
    ((receiver_depth - avg_blocker_depth) * light_size / avg_blocker_depth).max(0.0)
}

/// PCSS: blocker search followed by penumbra-scaled PCF. The search is
/// capped at [`PCSS_BLOCKER_CAP`] taps regardless of the requested
/// count so control flow stays uniform on the GPU.
pub fn pcss_visibility<F>(
    sample_depth: F,
    sample: LightSample,
    bias: f32,
    light_size: f32,
    requested_blocker_samples: u32,
    map_size: f32,
) -> f32
where
    F: Fn(Vec2) -> f32,
{
    let search_texel = blocker_search_radius_texels(light_size, map_size) / map_size;
    let search_count = requested_blocker_samples.min(PCSS_BLOCKER_CAP);

    let mut blocker_sum = 0.0;
    let mut blocker_count = 0u32;
    for offset in POISSON_DISK.iter().take(search_count as usize) {
        let uv = sample.uv + Vec2::new(offset[0], offset[1]) * search_texel;
        let stored = sample_depth(uv);
        if stored < sample.depth {
            blocker_sum += stored;
            blocker_count += 1;
        }
    }

    if blocker_count == 0 {
        return 1.0;
    }

    let avg_blocker = blocker_sum / blocker_count as f32;
    let penumbra = penumbra_width(sample.depth, avg_blocker, light_size);
    let filter_texels = pcss_filter_radius_texels(penumbra, map_size);

    pcf_visibility(
        sample_depth,
        sample,
        bias,
        filter_texels,
        PCSS_FILTER_SAMPLES,
        map_size,
    )
}

/// VSM: Chebyshev upper bound on occlusion probability from the first
/// two depth moments, with light-bleed reduction.
pub fn vsm_visibility(
    mean: f32,
    mean_sq: f32,
    receiver_depth: f32,
    min_variance: f32,
    bleed_reduction: f32,
) -> f32 {
    if receiver_depth <= mean {
        return 1.0;
    }
    let variance = (mean_sq - mean * mean).max(min_variance);
    let delta = receiver_depth - mean;
    let p = variance / (variance + delta * delta);
    ((p - bleed_reduction) / (1.0 - bleed_reduction)).clamp(0.0, 1.0)
}

/// Shared post-blend: strengths in [0,1] fade the shadow out toward
/// fully lit, strengths in (1,2] darken beyond the raw visibility.
pub fn apply_shadow_strength(raw_visibility: f32, strength: f32) -> f32 {
    if strength <= 1.0 {
        1.0 + (raw_visibility - 1.0) * strength
    } else {
        raw_visibility * (2.0 - strength)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poisson_offsets_stay_inside_unit_disk() {
        for [x, y] in POISSON_DISK {
            assert!(x * x + y * y <= 1.0 + 1.0e-5);
        }
    }

    #[test]
    fn sample_rounding_picks_lower_bucket() {
        assert_eq!(round_pcf_samples(4), 4);
        assert_eq!(round_pcf_samples(7), 4);
        assert_eq!(round_pcf_samples(8), 8);
        assert_eq!(round_pcf_samples(31), 16);
        assert_eq!(round_pcf_samples(32), 32);
        assert_eq!(round_pcf_samples(64), 32);
    }

    #[test]
    fn projection_rejects_points_behind_light_frustum() {
        let light_vp = Mat4::orthographic_rh(-1.0, 1.0, -1.0, 1.0, 0.0, 10.0);
        assert!(project_to_light_space(Vec3::new(0.0, 0.0, -5.0), light_vp).is_some());
        assert!(project_to_light_space(Vec3::new(5.0, 0.0, -5.0), light_vp).is_none());
        assert!(project_to_light_space(Vec3::new(0.0, 0.0, 5.0), light_vp).is_none());
    }

    #[test]
    fn strength_blend_endpoints() {
        assert_eq!(apply_shadow_strength(0.25, 0.0), 1.0);
        assert_eq!(apply_shadow_strength(0.25, 1.0), 0.25);
        assert_eq!(apply_shadow_strength(0.25, 2.0), 0.0);
    }
}
