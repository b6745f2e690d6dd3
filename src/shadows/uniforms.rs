// src/shadows/uniforms.rs
// Per-frame uniform layout shared by every shadow pipeline
// The byte layout here is load-bearing: all seven WGSL programs read
// this exact struct, so any change must be mirrored in src/shaders/
// RELEVANT FILES: src/shaders/scene_pcf.wgsl, src/shadows/renderer.rs

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use super::params::ShadowParams;
use super::technique::ShadowTechnique;

/// Packed size of one frame uniform block, in bytes:
/// 3 column-major mat4 + 3 vec4, all f32.
pub const FRAME_UNIFORM_SIZE: usize = std::mem::size_of::<FrameUniforms>();

/// Per-frame, per-draw uniform block. Field order and packing are
/// byte-exact: model at 0, view_proj at 64, light_view_proj at 128,
/// light at 192, camera_pos at 208, technique_params at 224.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub model: [f32; 16],
    pub view_proj: [f32; 16],
    pub light_view_proj: [f32; 16],
    /// xyz = light direction (world space), w = shadow strength
    pub light: [f32; 4],
    pub camera_pos: [f32; 4],
    /// Meaning switches with the active technique, see
    /// [`technique_params`].
    pub technique_params: [f32; 4],
}

impl FrameUniforms {
    /// Serialize frame state into the fixed layout. Matrices are
    /// exported column-major via glam's `to_cols_array`.
    pub fn pack(
        model: Mat4,
        view_proj: Mat4,
        light_view_proj: Mat4,
        light_dir: Vec3,
        camera_pos: Vec3,
        params: &ShadowParams,
    ) -> Self {
        Self {
            model: model.to_cols_array(),
            view_proj: view_proj.to_cols_array(),
            light_view_proj: light_view_proj.to_cols_array(),
            light: [
                light_dir.x,
                light_dir.y,
                light_dir.z,
                params.shadow_strength,
            ],
            camera_pos: [camera_pos.x, camera_pos.y, camera_pos.z, 1.0],
            technique_params: technique_params(params),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// The four-float technique slot. Hard/PCF carry
/// `[bias, pcf_radius, pcf_samples, map_size]`, PCSS carries
/// `[bias, light_size, blocker_samples, map_size]`, VSM carries
/// `[min_variance, bleed_reduction, 0, 0]`.
pub fn technique_params(params: &ShadowParams) -> [f32; 4] {
    match params.technique {
        ShadowTechnique::Hard | ShadowTechnique::PCF => [
            params.bias,
            params.pcf_radius,
            params.pcf_samples as f32,
            params.map_size as f32,
        ],
        ShadowTechnique::PCSS => [
            params.bias,
            params.pcss_light_size,
            params.pcss_blocker_samples as f32,
            params.map_size as f32,
        ],
        ShadowTechnique::VSM => [
            params.vsm_min_variance,
            params.vsm_light_bleed_reduction,
            0.0,
            0.0,
        ],
    }
}

/// Accumulates one stride-aligned uniform block per drawable so the
/// whole frame uploads with a single `write_buffer`. Blocks are bound
/// with dynamic offsets; the stride comes from the device's uniform
/// offset alignment.
#[derive(Debug)]
pub struct UniformArena {
    bytes: Vec<u8>,
    stride: u32,
}

impl UniformArena {
    pub fn new(min_alignment: u32) -> Self {
        let stride = (FRAME_UNIFORM_SIZE as u32).next_multiple_of(min_alignment.max(1));
        Self {
            bytes: Vec::new(),
            stride,
        }
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Append a block; returns its dynamic offset.
    pub fn push(&mut self, uniforms: &FrameUniforms) -> u32 {
        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(uniforms.as_bytes());
        self.bytes.resize(offset as usize + self.stride as usize, 0);
        offset
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_block_is_240_bytes() {
        assert_eq!(FRAME_UNIFORM_SIZE, 240);
    }

    #[test]
    fn field_offsets_match_shader_expectations() {
        assert_eq!(std::mem::offset_of!(FrameUniforms, model), 0);
        assert_eq!(std::mem::offset_of!(FrameUniforms, view_proj), 64);
        assert_eq!(std::mem::offset_of!(FrameUniforms, light_view_proj), 128);
        assert_eq!(std::mem::offset_of!(FrameUniforms, light), 192);
        assert_eq!(std::mem::offset_of!(FrameUniforms, camera_pos), 208);
        assert_eq!(std::mem::offset_of!(FrameUniforms, technique_params), 224);
    }

    #[test]
    fn arena_aligns_blocks_to_stride() {
        let mut arena = UniformArena::new(256);
        assert_eq!(arena.stride(), 256);
        let uniforms = FrameUniforms::pack(
            Mat4::IDENTITY,
            Mat4::IDENTITY,
            Mat4::IDENTITY,
            Vec3::NEG_Y,
            Vec3::ZERO,
            &ShadowParams::default(),
        );
        let first = arena.push(&uniforms);
        let second = arena.push(&uniforms);
        assert_eq!(first, 0);
        assert_eq!(second, 256);
        assert_eq!(arena.len_bytes(), 512);
    }
}
