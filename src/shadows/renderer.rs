// src/shadows/renderer.rs
// Frame orchestrator: applies pending parameters, packs uniforms, and
// records the per-frame pass sequence in dependency order
// (shadow capture -> optional blur -> lit), then submits
// RELEVANT FILES: src/shadows/reconcile.rs, src/shadows/pipelines.rs,
// src/shadows/resources.rs, src/shadows/blur.rs

use std::sync::Mutex;
use std::time::Instant;

use glam::{Mat4, Vec3};
use log::warn;
use wgpu::{
    BindGroup, Buffer, BufferDescriptor, BufferUsages, Device, Queue, TextureView,
};

use crate::error::{RenderError, RenderResult};
use crate::mesh::MeshDraw;
use crate::stats::FrameTimings;

use super::blur::MomentBlurPass;
use super::params::ShadowParams;
use super::pipelines::ShadowPipelines;
use super::reconcile::{self, Configuration};
use super::resources::{BlurMode, ShadowResources};
use super::technique::ShadowTechnique;
use super::uniforms::{FrameUniforms, UniformArena};

const INITIAL_UNIFORM_SLOTS: u64 = 64;

/// Where the orchestrator currently is within a frame. Updated as
/// passes are recorded; lands back on `Idle` after presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameState {
    #[default]
    Idle,
    ShadowCapture,
    BlurHorizontal,
    BlurVertical,
    LitPass,
    Presented,
}

/// One recorded pass within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    DepthCapture,
    MomentCapture,
    BlurHorizontal,
    BlurVertical,
    Lit,
}

/// The pass sequence a frame records for a technique. Pure so the
/// schedule is checkable without a device.
pub fn pass_plan(technique: ShadowTechnique, blur_mode: BlurMode) -> Vec<PassKind> {
    match technique {
        ShadowTechnique::Hard | ShadowTechnique::PCF | ShadowTechnique::PCSS => {
            vec![PassKind::DepthCapture, PassKind::Lit]
        }
        ShadowTechnique::VSM => match blur_mode {
            BlurMode::Separable => vec![
                PassKind::MomentCapture,
                PassKind::BlurHorizontal,
                PassKind::BlurVertical,
                PassKind::Lit,
            ],
            BlurMode::HorizontalOnly => vec![
                PassKind::MomentCapture,
                PassKind::BlurHorizontal,
                PassKind::Lit,
            ],
        },
    }
}

/// Per-frame camera/light state supplied by the host.
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs {
    pub view_proj: Mat4,
    pub light_view_proj: Mat4,
    /// World-space direction the light shines along.
    pub light_dir: Vec3,
    pub camera_pos: Vec3,
}

/// Telemetry handed back after each frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameReport {
    pub frame_index: u64,
    pub pass_count: u32,
    pub draw_count: u32,
    pub cpu_ms: f32,
}

/// Owns the full shadow rendering state and drives one frame per call.
pub struct ShadowRenderer {
    params: ShadowParams,
    pending: Mutex<Option<ShadowParams>>,
    blur_mode: BlurMode,
    config: Configuration,
    resources: ShadowResources,
    pipelines: ShadowPipelines,
    blur: MomentBlurPass,
    uniform_buffer: Buffer,
    uniform_capacity: u64,
    frame_bind_group: BindGroup,
    arena: UniformArena,
    state: FrameState,
    frame_index: u64,
    timings: FrameTimings,
    device_valid: bool,
}

impl ShadowRenderer {
    pub fn new(
        device: &Device,
        color_format: wgpu::TextureFormat,
        params: ShadowParams,
    ) -> RenderResult<Self> {
        params.validate().map_err(RenderError::invalid_config)?;

        let resources = ShadowResources::new(device, params.map_size)?;
        let mut pipelines = ShadowPipelines::build(device, color_format, params.technique)?;
        let blur = MomentBlurPass::new(device)?;
        let blur_mode = BlurMode::default();

        pipelines.rebuild_shadow_bind_group(device, &resources, blur_mode);

        let arena = UniformArena::new(device.limits().min_uniform_buffer_offset_alignment);
        let uniform_capacity = arena.stride() as u64 * INITIAL_UNIFORM_SLOTS;
        let uniform_buffer = create_uniform_buffer(device, uniform_capacity);
        let frame_bind_group = pipelines.create_frame_bind_group(device, &uniform_buffer);

        Ok(Self {
            config: Configuration::new(&params, blur_mode),
            params,
            pending: Mutex::new(None),
            blur_mode,
            resources,
            pipelines,
            blur,
            uniform_buffer,
            uniform_capacity,
            frame_bind_group,
            arena,
            state: FrameState::Idle,
            frame_index: 0,
            timings: FrameTimings::default(),
            device_valid: true,
        })
    }

    /// Queue a validated parameter set. May be called from a thread
    /// other than the render thread; the change lands at the top of
    /// the next frame.
    pub fn set_params(&self, params: ShadowParams) -> RenderResult<()> {
        params.validate().map_err(RenderError::invalid_config)?;
        *self.pending.lock().expect("pending params lock") = Some(params);
        Ok(())
    }

    /// Select the blur wiring for VSM. Takes effect with the next
    /// frame's reconcile step.
    pub fn set_blur_mode(&mut self, mode: BlurMode) {
        self.blur_mode = mode;
    }

    /// Allocate the scene depth buffer for the current surface size.
    pub fn resize_surface(&mut self, device: &Device, width: u32, height: u32) -> RenderResult<()> {
        self.resources.configure_surface_depth(device, width, height)
    }

    /// Mark the device as lost. Every subsequent frame fails until the
    /// renderer is rebuilt against a fresh device.
    pub fn notify_device_lost(&mut self) {
        self.device_valid = false;
        self.state = FrameState::Idle;
    }

    pub fn params(&self) -> &ShadowParams {
        &self.params
    }

    pub fn technique(&self) -> ShadowTechnique {
        self.pipelines.active()
    }

    pub fn blur_mode(&self) -> BlurMode {
        self.blur_mode
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn resources(&self) -> &ShadowResources {
        &self.resources
    }

    pub fn pipelines(&self) -> &ShadowPipelines {
        &self.pipelines
    }

    pub fn timings(&self) -> &FrameTimings {
        &self.timings
    }

    /// Apply a pending parameter set, rebuilding only what its diff
    /// demands. On allocation failure the previous configuration
    /// stays active and the error propagates so the host can revert
    /// its UI value.
    fn apply_pending(&mut self, device: &Device) -> RenderResult<()> {
        let pending = self.pending.lock().expect("pending params lock").take();
        // Diff against the current blur wiring too, so a blur-mode
        // change alone still rebinds the lit pass input.
        let next = pending.unwrap_or(self.params);
        let next_config = Configuration::new(&next, self.blur_mode);
        let plan = reconcile::diff(&self.config, &next_config);
        if plan.is_noop() {
            self.params = next;
            self.config = next_config;
            return Ok(());
        }

        if plan.reallocate_resources {
            if let Err(err) = self.resources.configure(device, next.map_size) {
                warn!(
                    "parameter change rolled back: {} (keeping map_size {})",
                    err,
                    self.params.map_size
                );
                return Err(err);
            }
        }
        if plan.switch_pipeline {
            self.pipelines.select(next.technique);
        }
        if plan.rebuild_bind_group {
            self.pipelines
                .rebuild_shadow_bind_group(device, &self.resources, self.blur_mode);
        }

        self.params = next;
        self.config = next_config;
        Ok(())
    }

    fn ensure_uniform_capacity(&mut self, device: &Device, needed: u64) {
        if needed <= self.uniform_capacity {
            return;
        }
        let mut capacity = self.uniform_capacity.max(1);
        while capacity < needed {
            capacity *= 2;
        }
        self.uniform_buffer = create_uniform_buffer(device, capacity);
        self.frame_bind_group = self
            .pipelines
            .create_frame_bind_group(device, &self.uniform_buffer);
        self.uniform_capacity = capacity;
    }

    /// Render one frame into `target`. Passes execute in issuance
    /// order within a single submission, which is what lets the blur
    /// and lit passes read the previous pass's output without an
    /// explicit fence.
    pub fn render(
        &mut self,
        device: &Device,
        queue: &Queue,
        target: &TextureView,
        draws: &[MeshDraw],
        inputs: &FrameInputs,
    ) -> RenderResult<FrameReport> {
        if !self.device_valid {
            return Err(RenderError::device_lost(
                "renderer invalidated; reinitialize before rendering",
            ));
        }

        let frame_start = Instant::now();
        self.apply_pending(device)?;

        if !self.pipelines.has_shadow_bind_group() {
            self.pipelines
                .rebuild_shadow_bind_group(device, &self.resources, self.blur_mode);
        }

        // Pack one stride-aligned uniform block per drawable; a single
        // write covers the whole frame.
        self.arena.clear();
        let mut offsets = Vec::with_capacity(draws.len());
        for draw in draws {
            let uniforms = FrameUniforms::pack(
                draw.model,
                inputs.view_proj,
                inputs.light_view_proj,
                inputs.light_dir,
                inputs.camera_pos,
                &self.params,
            );
            offsets.push(self.arena.push(&uniforms));
        }
        self.ensure_uniform_capacity(device, self.arena.len_bytes());
        if !self.arena.is_empty() {
            queue.write_buffer(&self.uniform_buffer, 0, self.arena.bytes());
        }

        let plan = pass_plan(self.technique(), self.blur_mode);
        let scene_depth = self.resources.scene_depth_view()?;
        let shadow_bind_group = self.pipelines.shadow_bind_group()?;

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("shadow_frame_encoder"),
        });
        let mut pass_count = 0u32;

        for kind in &plan {
            match kind {
                PassKind::DepthCapture => {
                    self.state = FrameState::ShadowCapture;
                    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("shadow_depth_pass"),
                        color_attachments: &[],
                        depth_stencil_attachment: Some(
                            wgpu::RenderPassDepthStencilAttachment {
                                view: self.resources.shadow_depth_view(),
                                depth_ops: Some(wgpu::Operations {
                                    load: wgpu::LoadOp::Clear(1.0),
                                    store: wgpu::StoreOp::Store,
                                }),
                                stencil_ops: None,
                            },
                        ),
                        timestamp_writes: None,
                        occlusion_query_set: None,
                    });
                    pass.set_pipeline(self.pipelines.depth_pipeline());
                    for (draw, offset) in draws.iter().zip(&offsets) {
                        pass.set_bind_group(0, &self.frame_bind_group, &[*offset]);
                        pass.set_vertex_buffer(0, draw.mesh.vertex_buffer.slice(..));
                        pass.set_index_buffer(
                            draw.mesh.index_buffer.slice(..),
                            wgpu::IndexFormat::Uint32,
                        );
                        pass.draw_indexed(0..draw.mesh.index_count, 0, 0..1);
                    }
                    pass_count += 1;
                }
                PassKind::MomentCapture => {
                    self.state = FrameState::ShadowCapture;
                    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("shadow_moment_pass"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: self.resources.moment_capture_view(),
                            resolve_target: None,
                            ops: wgpu::Operations {
                                // Background texels read as depth 1:
                                // mean 1, variance 0, always lit.
                                load: wgpu::LoadOp::Clear(wgpu::Color {
                                    r: 1.0,
                                    g: 1.0,
                                    b: 0.0,
                                    a: 0.0,
                                }),
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: Some(
                            wgpu::RenderPassDepthStencilAttachment {
                                view: self.resources.shadow_depth_view(),
                                depth_ops: Some(wgpu::Operations {
                                    load: wgpu::LoadOp::Clear(1.0),
                                    store: wgpu::StoreOp::Store,
                                }),
                                stencil_ops: None,
                            },
                        ),
                        timestamp_writes: None,
                        occlusion_query_set: None,
                    });
                    pass.set_pipeline(self.pipelines.moment_pipeline());
                    for (draw, offset) in draws.iter().zip(&offsets) {
                        pass.set_bind_group(0, &self.frame_bind_group, &[*offset]);
                        pass.set_vertex_buffer(0, draw.mesh.vertex_buffer.slice(..));
                        pass.set_index_buffer(
                            draw.mesh.index_buffer.slice(..),
                            wgpu::IndexFormat::Uint32,
                        );
                        pass.draw_indexed(0..draw.mesh.index_count, 0, 0..1);
                    }
                    pass_count += 1;
                }
                PassKind::BlurHorizontal => {
                    self.state = FrameState::BlurHorizontal;
                    // The blur pass records one or both dispatches and
                    // reports how many it added.
                    pass_count += self.blur.execute(
                        device,
                        queue,
                        &mut encoder,
                        &self.resources,
                        self.blur_mode,
                    );
                    if self.blur_mode == BlurMode::Separable {
                        self.state = FrameState::BlurVertical;
                    }
                }
                PassKind::BlurVertical => {
                    // Recorded together with the horizontal dispatch.
                }
                PassKind::Lit => {
                    self.state = FrameState::LitPass;
                    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("lit_pass"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: target,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(wgpu::Color {
                                    r: 0.06,
                                    g: 0.07,
                                    b: 0.09,
                                    a: 1.0,
                                }),
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: Some(
                            wgpu::RenderPassDepthStencilAttachment {
                                view: scene_depth,
                                depth_ops: Some(wgpu::Operations {
                                    load: wgpu::LoadOp::Clear(1.0),
                                    store: wgpu::StoreOp::Store,
                                }),
                                stencil_ops: None,
                            },
                        ),
                        timestamp_writes: None,
                        occlusion_query_set: None,
                    });
                    pass.set_pipeline(self.pipelines.active_lit_pipeline());
                    for (draw, offset) in draws.iter().zip(&offsets) {
                        pass.set_bind_group(0, &self.frame_bind_group, &[*offset]);
                        pass.set_bind_group(1, shadow_bind_group, &[]);
                        pass.set_bind_group(2, &draw.material.bind_group, &[]);
                        pass.set_vertex_buffer(0, draw.mesh.vertex_buffer.slice(..));
                        pass.set_index_buffer(
                            draw.mesh.index_buffer.slice(..),
                            wgpu::IndexFormat::Uint32,
                        );
                        pass.draw_indexed(0..draw.mesh.index_count, 0, 0..1);
                    }
                    pass_count += 1;
                }
            }
        }

        queue.submit(std::iter::once(encoder.finish()));
        self.state = FrameState::Presented;

        let cpu_ms = frame_start.elapsed().as_secs_f32() * 1000.0;
        self.timings.push(cpu_ms);
        self.frame_index += 1;
        let report = FrameReport {
            frame_index: self.frame_index,
            pass_count,
            draw_count: draws.len() as u32,
            cpu_ms,
        };
        self.state = FrameState::Idle;
        Ok(report)
    }
}

fn create_uniform_buffer(device: &Device, capacity: u64) -> Buffer {
    device.create_buffer(&BufferDescriptor {
        label: Some("frame_uniform_arena"),
        size: capacity,
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}
