// src/shadows/pipelines.rs
// Pipeline set for the shadow system: depth capture, moment capture,
// one lit pipeline per technique, and the bind group layouts they
// share. Pipelines are compiled once and kept; switching technique
// swaps the active lit pipeline and rebuilds only the set-1 bind group
// RELEVANT FILES: src/shadows/technique.rs, src/shadows/resources.rs,
// src/shaders/shadow_depth.wgsl

use std::num::NonZeroU64;

use log::info;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType, Buffer, BufferBindingType, Device,
    RenderPipeline, RenderPipelineDescriptor, SamplerBindingType, ShaderModule,
    ShaderModuleDescriptor, ShaderSource, ShaderStages, TextureFormat, TextureSampleType,
    TextureViewDimension,
};

use crate::error::{RenderError, RenderResult};
use crate::mesh::Vertex;

use super::resources::{BlurMode, ShadowResources, MOMENT_FORMAT, SHADOW_DEPTH_FORMAT};
use super::technique::{ShadowBindingKind, ShadowTechnique, TECHNIQUE_TABLE};
use super::uniforms::FRAME_UNIFORM_SIZE;

/// Compiled pipelines and layouts for every shadow technique.
pub struct ShadowPipelines {
    frame_bgl: BindGroupLayout,
    material_bgl: BindGroupLayout,
    compare_bgl: BindGroupLayout,
    pcss_bgl: BindGroupLayout,
    moments_bgl: BindGroupLayout,
    depth_pipeline: RenderPipeline,
    moment_pipeline: RenderPipeline,
    lit_pipelines: [RenderPipeline; 4],
    active: ShadowTechnique,
    shadow_bind_group: Option<BindGroup>,
}

impl ShadowPipelines {
    /// Compile all six pipeline objects. A WGSL or pipeline validation
    /// failure is fatal and reports the failing stage by name.
    pub fn build(
        device: &Device,
        color_format: TextureFormat,
        initial: ShadowTechnique,
    ) -> RenderResult<Self> {
        let frame_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("frame_uniform_layout"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(FRAME_UNIFORM_SIZE as u64),
                },
                count: None,
            }],
        });

        let material_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("material_layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let compare_entries = [
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: TextureSampleType::Depth,
                    view_dimension: TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Sampler(SamplerBindingType::Comparison),
                count: None,
            },
        ];

        let compare_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("shadow_compare_layout"),
            entries: &compare_entries,
        });

        // PCSS adds a non-comparison sampler for the blocker search.
        let pcss_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("shadow_pcss_layout"),
            entries: &[
                compare_entries[0],
                compare_entries[1],
                BindGroupLayoutEntry {
                    binding: 2,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::NonFiltering),
                    count: None,
                },
            ],
        });

        let moments_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("shadow_moments_layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let depth_shader = create_shader_checked(
            device,
            "shadow_depth",
            include_str!("../shaders/shadow_depth.wgsl"),
        )?;
        let moment_shader = create_shader_checked(
            device,
            "shadow_moments",
            include_str!("../shaders/shadow_moments.wgsl"),
        )?;

        let depth_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shadow_depth_pipeline_layout"),
            bind_group_layouts: &[&frame_bgl],
            push_constant_ranges: &[],
        });

        let depth_pipeline = create_pipeline_checked(device, "shadow_depth", || {
            device.create_render_pipeline(&RenderPipelineDescriptor {
                label: Some("shadow_depth_pipeline"),
                layout: Some(&depth_layout),
                vertex: wgpu::VertexState {
                    module: &depth_shader,
                    entry_point: "vs_main",
                    buffers: &[Vertex::layout()],
                },
                fragment: None,
                primitive: primitive_state(),
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: SHADOW_DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
        })?;

        let moment_pipeline = create_pipeline_checked(device, "shadow_moments", || {
            device.create_render_pipeline(&RenderPipelineDescriptor {
                label: Some("shadow_moment_pipeline"),
                layout: Some(&depth_layout),
                vertex: wgpu::VertexState {
                    module: &moment_shader,
                    entry_point: "vs_main",
                    buffers: &[Vertex::layout()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &moment_shader,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: MOMENT_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: primitive_state(),
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: SHADOW_DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
        })?;

        let mut lit_pipelines = Vec::with_capacity(4);
        for descriptor in TECHNIQUE_TABLE.iter() {
            let shader = create_shader_checked(
                device,
                descriptor.shader_label,
                descriptor.shader_source,
            )?;
            let shadow_bgl = match descriptor.binding_kind {
                ShadowBindingKind::CompareDepth => &compare_bgl,
                ShadowBindingKind::CompareDepthWithSearch => &pcss_bgl,
                ShadowBindingKind::Moments => &moments_bgl,
            };
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(descriptor.shader_label),
                bind_group_layouts: &[&frame_bgl, shadow_bgl, &material_bgl],
                push_constant_ranges: &[],
            });
            let pipeline = create_pipeline_checked(device, descriptor.shader_label, || {
                device.create_render_pipeline(&RenderPipelineDescriptor {
                    label: Some(descriptor.shader_label),
                    layout: Some(&layout),
                    vertex: wgpu::VertexState {
                        module: &shader,
                        entry_point: "vs_main",
                        buffers: &[Vertex::layout()],
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &shader,
                        entry_point: "fs_main",
                        targets: &[Some(wgpu::ColorTargetState {
                            format: color_format,
                            blend: Some(wgpu::BlendState::REPLACE),
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                    }),
                    primitive: primitive_state(),
                    depth_stencil: Some(wgpu::DepthStencilState {
                        format: SHADOW_DEPTH_FORMAT,
                        depth_write_enabled: true,
                        depth_compare: wgpu::CompareFunction::Less,
                        stencil: wgpu::StencilState::default(),
                        bias: wgpu::DepthBiasState::default(),
                    }),
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                })
            })?;
            lit_pipelines.push(pipeline);
        }

        let lit_pipelines: [RenderPipeline; 4] = lit_pipelines
            .try_into()
            .map_err(|_| RenderError::compilation("lit_pipelines", "expected four pipelines"))?;

        info!(
            "shadow pipelines compiled (color format {:?}, initial technique {})",
            color_format,
            initial.name()
        );

        Ok(Self {
            frame_bgl,
            material_bgl,
            compare_bgl,
            pcss_bgl,
            moments_bgl,
            depth_pipeline,
            moment_pipeline,
            lit_pipelines,
            active: initial,
            shadow_bind_group: None,
        })
    }

    pub fn active(&self) -> ShadowTechnique {
        self.active
    }

    /// Designate the active lit pipeline. The caller must rebuild the
    /// shadow bind group afterwards since the bound resource identity
    /// changes with the technique.
    pub fn select(&mut self, technique: ShadowTechnique) {
        if self.active != technique {
            info!(
                "shadow technique {} -> {}",
                self.active.name(),
                technique.name()
            );
            self.active = technique;
            self.shadow_bind_group = None;
        }
    }

    pub fn frame_layout(&self) -> &BindGroupLayout {
        &self.frame_bgl
    }

    pub fn material_layout(&self) -> &BindGroupLayout {
        &self.material_bgl
    }

    pub fn depth_pipeline(&self) -> &RenderPipeline {
        &self.depth_pipeline
    }

    pub fn moment_pipeline(&self) -> &RenderPipeline {
        &self.moment_pipeline
    }

    pub fn active_lit_pipeline(&self) -> &RenderPipeline {
        &self.lit_pipelines[self.active.as_u32() as usize]
    }

    /// Bind group for set 0 over the frame uniform arena, bound with
    /// dynamic offsets.
    pub fn create_frame_bind_group(&self, device: &Device, buffer: &Buffer) -> BindGroup {
        device.create_bind_group(&BindGroupDescriptor {
            label: Some("frame_uniform_bind_group"),
            layout: &self.frame_bgl,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: NonZeroU64::new(FRAME_UNIFORM_SIZE as u64),
                }),
            }],
        })
    }

    /// Rebuild the set-1 bind group for the active technique against
    /// the current resource set. Must run after `select` and after any
    /// map resize.
    pub fn rebuild_shadow_bind_group(
        &mut self,
        device: &Device,
        resources: &ShadowResources,
        blur_mode: BlurMode,
    ) {
        let bind_group = match self.active.descriptor().binding_kind {
            ShadowBindingKind::CompareDepth => device.create_bind_group(&BindGroupDescriptor {
                label: Some("shadow_compare_bind_group"),
                layout: &self.compare_bgl,
                entries: &[
                    BindGroupEntry {
                        binding: 0,
                        resource: BindingResource::TextureView(resources.shadow_depth_view()),
                    },
                    BindGroupEntry {
                        binding: 1,
                        resource: BindingResource::Sampler(resources.compare_sampler()),
                    },
                ],
            }),
            ShadowBindingKind::CompareDepthWithSearch => {
                device.create_bind_group(&BindGroupDescriptor {
                    label: Some("shadow_pcss_bind_group"),
                    layout: &self.pcss_bgl,
                    entries: &[
                        BindGroupEntry {
                            binding: 0,
                            resource: BindingResource::TextureView(resources.shadow_depth_view()),
                        },
                        BindGroupEntry {
                            binding: 1,
                            resource: BindingResource::Sampler(resources.compare_sampler()),
                        },
                        BindGroupEntry {
                            binding: 2,
                            resource: BindingResource::Sampler(resources.blocker_sampler()),
                        },
                    ],
                })
            }
            ShadowBindingKind::Moments => device.create_bind_group(&BindGroupDescriptor {
                label: Some("shadow_moments_bind_group"),
                layout: &self.moments_bgl,
                entries: &[
                    BindGroupEntry {
                        binding: 0,
                        resource: BindingResource::TextureView(
                            resources.moment_lit_view(blur_mode),
                        ),
                    },
                    BindGroupEntry {
                        binding: 1,
                        resource: BindingResource::Sampler(resources.moment_sampler()),
                    },
                ],
            }),
        };
        self.shadow_bind_group = Some(bind_group);
    }

    pub fn shadow_bind_group(&self) -> RenderResult<&BindGroup> {
        self.shadow_bind_group.as_ref().ok_or_else(|| {
            RenderError::invalid_config("shadow bind group not built; call rebuild_shadow_bind_group")
        })
    }

    pub fn has_shadow_bind_group(&self) -> bool {
        self.shadow_bind_group.is_some()
    }
}

fn primitive_state() -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        strip_index_format: None,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode: Some(wgpu::Face::Back),
        unclipped_depth: false,
        polygon_mode: wgpu::PolygonMode::Fill,
        conservative: false,
    }
}

/// Compile a WGSL module under a validation error scope so a bad
/// source reports the failing stage instead of tearing down the
/// device callback path.
fn create_shader_checked(
    device: &Device,
    stage: &str,
    source: &str,
) -> RenderResult<ShaderModule> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(ShaderModuleDescriptor {
        label: Some(stage),
        source: ShaderSource::Wgsl(source.into()),
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(RenderError::compilation(stage, err));
    }
    Ok(module)
}

fn create_pipeline_checked<F>(device: &Device, stage: &str, create: F) -> RenderResult<RenderPipeline>
where
    F: FnOnce() -> RenderPipeline,
{
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline = create();
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(RenderError::compilation(stage, err));
    }
    Ok(pipeline)
}
