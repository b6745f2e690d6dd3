// tests/test_uniform_pack.rs
// Byte-level round trip of the packed frame uniforms: every field
// must land at the offset the shading programs read it from.

use glam::{Mat4, Vec3, Vec4};
use umbra::shadows::uniforms::{FrameUniforms, UniformArena, FRAME_UNIFORM_SIZE};
use umbra::shadows::ShadowParams;
use umbra::ShadowTechnique;

fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

fn read_mat4(bytes: &[u8], offset: usize) -> Mat4 {
    let mut cols = [0.0f32; 16];
    for (i, col) in cols.iter_mut().enumerate() {
        *col = read_f32(bytes, offset + i * 4);
    }
    Mat4::from_cols_array(&cols)
}

fn read_vec4(bytes: &[u8], offset: usize) -> Vec4 {
    Vec4::new(
        read_f32(bytes, offset),
        read_f32(bytes, offset + 4),
        read_f32(bytes, offset + 8),
        read_f32(bytes, offset + 12),
    )
}

fn distinct_matrix(seed: f32) -> Mat4 {
    let cols: Vec<f32> = (0..16).map(|i| seed + i as f32 * 0.25).collect();
    Mat4::from_cols_array(&cols.try_into().unwrap())
}

#[test]
fn packed_fields_round_trip_at_expected_offsets() {
    let model = distinct_matrix(1.0);
    let view_proj = distinct_matrix(100.0);
    let light_view_proj = distinct_matrix(10_000.0);
    let light_dir = Vec3::new(0.25, -0.75, 0.5);
    let camera_pos = Vec3::new(3.0, 4.0, 5.0);
    let mut params = ShadowParams::default();
    params.shadow_strength = 0.85;

    let packed = FrameUniforms::pack(
        model,
        view_proj,
        light_view_proj,
        light_dir,
        camera_pos,
        &params,
    );
    let bytes = packed.as_bytes();
    assert_eq!(bytes.len(), FRAME_UNIFORM_SIZE);
    assert_eq!(bytes.len(), 240);

    assert_eq!(read_mat4(bytes, 0), model);
    assert_eq!(read_mat4(bytes, 64), view_proj);
    assert_eq!(read_mat4(bytes, 128), light_view_proj);

    let light = read_vec4(bytes, 192);
    assert_eq!(light.truncate(), light_dir);
    assert_eq!(light.w, 0.85);

    let camera = read_vec4(bytes, 208);
    assert_eq!(camera.truncate(), camera_pos);
}

#[test]
fn matrices_are_column_major() {
    // Element (row 1, col 0) of a column-major mat4 is the second
    // packed float.
    let model = Mat4::from_cols(
        Vec4::new(1.0, 2.0, 3.0, 4.0),
        Vec4::new(5.0, 6.0, 7.0, 8.0),
        Vec4::new(9.0, 10.0, 11.0, 12.0),
        Vec4::new(13.0, 14.0, 15.0, 16.0),
    );
    let packed = FrameUniforms::pack(
        model,
        Mat4::IDENTITY,
        Mat4::IDENTITY,
        Vec3::NEG_Y,
        Vec3::ZERO,
        &ShadowParams::default(),
    );
    let bytes = packed.as_bytes();
    assert_eq!(read_f32(bytes, 0), 1.0);
    assert_eq!(read_f32(bytes, 4), 2.0);
    assert_eq!(read_f32(bytes, 16), 5.0);
    assert_eq!(read_f32(bytes, 60), 16.0);
}

#[test]
fn technique_slot_mapping_follows_active_technique() {
    let mut params = ShadowParams::default();
    params.bias = 0.01;
    params.pcf_radius = 3.0;
    params.pcf_samples = 16;
    params.map_size = 1024;
    params.pcss_light_size = 0.15;
    params.pcss_blocker_samples = 16;
    params.vsm_min_variance = 5.0e-4;
    params.vsm_light_bleed_reduction = 0.3;

    let slot = |technique: ShadowTechnique, params: &ShadowParams| -> Vec4 {
        let mut p = *params;
        p.technique = technique;
        let packed = FrameUniforms::pack(
            Mat4::IDENTITY,
            Mat4::IDENTITY,
            Mat4::IDENTITY,
            Vec3::NEG_Y,
            Vec3::ZERO,
            &p,
        );
        read_vec4(packed.as_bytes(), 224)
    };

    assert_eq!(
        slot(ShadowTechnique::Hard, &params),
        Vec4::new(0.01, 3.0, 16.0, 1024.0)
    );
    assert_eq!(
        slot(ShadowTechnique::PCF, &params),
        Vec4::new(0.01, 3.0, 16.0, 1024.0)
    );
    assert_eq!(
        slot(ShadowTechnique::PCSS, &params),
        Vec4::new(0.01, 0.15, 16.0, 1024.0)
    );
    assert_eq!(
        slot(ShadowTechnique::VSM, &params),
        Vec4::new(5.0e-4, 0.3, 0.0, 0.0)
    );
}

#[test]
fn arena_packs_draws_at_stride_boundaries() {
    let mut arena = UniformArena::new(256);
    let block = FrameUniforms::pack(
        distinct_matrix(7.0),
        Mat4::IDENTITY,
        Mat4::IDENTITY,
        Vec3::NEG_Y,
        Vec3::ZERO,
        &ShadowParams::default(),
    );
    for i in 0..3 {
        assert_eq!(arena.push(&block), i * 256);
    }
    // Each slot's payload is identical and padding stays zero.
    let bytes = arena.bytes();
    assert_eq!(bytes.len(), 3 * 256);
    for i in 0..3 {
        let start = i * 256;
        assert_eq!(&bytes[start..start + 240], block.as_bytes());
        assert!(bytes[start + 240..start + 256].iter().all(|b| *b == 0));
    }
}
