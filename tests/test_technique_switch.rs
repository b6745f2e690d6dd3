// tests/test_technique_switch.rs
// End-to-end technique switching on a live device: after each switch
// the next frame must use the new pipeline/bind-group set and record
// the documented number of passes. Skips when no adapter is present.

use glam::{Mat4, Vec3};
use umbra::gpu;
use umbra::mesh::{Material, Mesh, MeshDraw, Vertex};
use umbra::shadows::renderer::FrameInputs;
use umbra::{BlurMode, ShadowParams, ShadowRenderer, ShadowTechnique};

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const TARGET_SIZE: u32 = 128;

fn quad(device: &wgpu::Device, label: &str, y: f32, half: f32) -> Mesh {
    let vertices = [
        Vertex::new([-half, y, -half], [0.0, 1.0, 0.0], [0.0, 0.0]),
        Vertex::new([half, y, -half], [0.0, 1.0, 0.0], [1.0, 0.0]),
        Vertex::new([half, y, half], [0.0, 1.0, 0.0], [1.0, 1.0]),
        Vertex::new([-half, y, half], [0.0, 1.0, 0.0], [0.0, 1.0]),
    ];
    let indices = [0u32, 2, 1, 0, 3, 2];
    Mesh::upload(device, label, &vertices, &indices)
}

fn frame_inputs() -> FrameInputs {
    let view = Mat4::look_at_rh(Vec3::new(6.0, 5.0, 6.0), Vec3::ZERO, Vec3::Y);
    let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_4, 1.0, 0.1, 50.0);
    let light_dir = Vec3::new(-0.4, -1.0, -0.3).normalize();
    let light_view = Mat4::look_at_rh(-light_dir * 15.0, Vec3::ZERO, Vec3::Y);
    let light_proj = Mat4::orthographic_rh(-8.0, 8.0, -8.0, 8.0, 0.1, 40.0);
    FrameInputs {
        view_proj: proj * view,
        light_view_proj: light_proj * light_view,
        light_dir,
        camera_pos: Vec3::new(6.0, 5.0, 6.0),
    }
}

fn render_target(device: &wgpu::Device) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("test_target"),
        size: wgpu::Extent3d {
            width: TARGET_SIZE,
            height: TARGET_SIZE,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TARGET_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[test]
fn switching_techniques_swaps_pipeline_and_pass_counts() {
    let Some(ctx) = gpu::try_ctx() else {
        eprintln!("skipping: no GPU adapter");
        return;
    };
    let device = &ctx.device;
    let queue = &ctx.queue;

    let mut params = ShadowParams::default();
    params.map_size = 1024;
    let mut renderer =
        ShadowRenderer::new(device, TARGET_FORMAT, params).expect("renderer init");
    renderer
        .resize_surface(device, TARGET_SIZE, TARGET_SIZE)
        .expect("surface depth");

    let ground = quad(device, "ground", 0.0, 6.0);
    let occluder = quad(device, "occluder", 2.0, 1.5);
    let material = Material::solid_white(device, queue, renderer.pipelines().material_layout());
    let target = render_target(device);
    let inputs = frame_inputs();

    let sequence = [
        (ShadowTechnique::Hard, 2),
        (ShadowTechnique::PCF, 2),
        (ShadowTechnique::PCSS, 2),
        (ShadowTechnique::VSM, 4),
        (ShadowTechnique::Hard, 2),
    ];

    for (technique, expected_passes) in sequence {
        let mut next = *renderer.params();
        next.technique = technique;
        renderer.set_params(next).expect("queue params");

        let draws = [
            MeshDraw {
                mesh: &ground,
                material: &material,
                model: Mat4::IDENTITY,
            },
            MeshDraw {
                mesh: &occluder,
                material: &material,
                model: Mat4::IDENTITY,
            },
        ];
        let report = renderer
            .render(device, queue, &target, &draws, &inputs)
            .expect("frame");

        assert_eq!(renderer.technique(), technique, "active pipeline lags switch");
        assert!(
            renderer.pipelines().has_shadow_bind_group(),
            "stale bind group after switching to {:?}",
            technique
        );
        assert_eq!(
            report.pass_count, expected_passes,
            "pass count for {:?}",
            technique
        );
        assert_eq!(report.draw_count, 2);
    }
}

#[test]
fn horizontal_only_blur_drops_one_pass() {
    let Some(ctx) = gpu::try_ctx() else {
        eprintln!("skipping: no GPU adapter");
        return;
    };
    let device = &ctx.device;
    let queue = &ctx.queue;

    let mut params = ShadowParams::default();
    params.technique = ShadowTechnique::VSM;
    params.map_size = 512;
    let mut renderer =
        ShadowRenderer::new(device, TARGET_FORMAT, params).expect("renderer init");
    renderer
        .resize_surface(device, TARGET_SIZE, TARGET_SIZE)
        .expect("surface depth");
    renderer.set_blur_mode(BlurMode::HorizontalOnly);

    let ground = quad(device, "ground", 0.0, 6.0);
    let material = Material::solid_white(device, queue, renderer.pipelines().material_layout());
    let target = render_target(device);

    let draws = [MeshDraw {
        mesh: &ground,
        material: &material,
        model: Mat4::IDENTITY,
    }];
    let report = renderer
        .render(device, queue, &target, &draws, &frame_inputs())
        .expect("frame");
    assert_eq!(report.pass_count, 3);
}

#[test]
fn reconfiguring_same_map_size_does_not_reallocate() {
    let Some(ctx) = gpu::try_ctx() else {
        eprintln!("skipping: no GPU adapter");
        return;
    };
    let device = &ctx.device;
    let queue = &ctx.queue;

    let mut params = ShadowParams::default();
    params.map_size = 2048;
    let mut renderer =
        ShadowRenderer::new(device, TARGET_FORMAT, params).expect("renderer init");
    renderer
        .resize_surface(device, TARGET_SIZE, TARGET_SIZE)
        .expect("surface depth");

    let ground = quad(device, "ground", 0.0, 6.0);
    let material = Material::solid_white(device, queue, renderer.pipelines().material_layout());
    let target = render_target(device);
    let inputs = frame_inputs();
    let draws = [MeshDraw {
        mesh: &ground,
        material: &material,
        model: Mat4::IDENTITY,
    }];

    renderer
        .render(device, queue, &target, &draws, &inputs)
        .expect("frame");
    let baseline = renderer.resources().texture_allocations();

    // Re-apply the identical configuration twice.
    for _ in 0..2 {
        renderer.set_params(params).expect("queue params");
        renderer
            .render(device, queue, &target, &draws, &inputs)
            .expect("frame");
    }
    assert_eq!(
        renderer.resources().texture_allocations(),
        baseline,
        "configure with unchanged map_size must not allocate"
    );
    assert_eq!(renderer.resources().map_size(), 2048);
}

#[test]
fn invalid_params_are_rejected_before_the_frame() {
    let Some(ctx) = gpu::try_ctx() else {
        eprintln!("skipping: no GPU adapter");
        return;
    };
    let device = &ctx.device;

    let renderer = ShadowRenderer::new(device, TARGET_FORMAT, ShadowParams::default())
        .expect("renderer init");

    let mut bad = *renderer.params();
    bad.map_size = 777;
    assert!(renderer.set_params(bad).is_err());

    let mut bad = *renderer.params();
    bad.shadow_strength = 3.0;
    assert!(renderer.set_params(bad).is_err());
}
