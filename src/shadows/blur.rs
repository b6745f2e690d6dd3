// src/shadows/blur.rs
// Separable Gaussian blur over the VSM moment map
// Two compute dispatches per frame: rows into the intermediate
// texture, then columns back into the capture texture. Each direction
// owns its parameter buffer so both dispatches can be recorded into
// one submission
// RELEVANT FILES: src/shaders/moment_blur.wgsl, src/shadows/resources.rs

use bytemuck::{Pod, Zeroable};
use wgpu::{
    BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType, Buffer, BufferBindingType,
    BufferDescriptor, BufferUsages, ComputePipeline, ComputePipelineDescriptor, Device,
    PipelineLayoutDescriptor, Queue, ShaderStages, StorageTextureAccess, TextureFormat,
    TextureSampleType, TextureViewDimension,
};

use crate::error::{RenderError, RenderResult};

use super::resources::{BlurMode, ShadowResources};

const WORKGROUP_SIZE: u32 = 8;

#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct BlurParams {
    direction: [f32; 2],
    texture_size: u32,
    _pad: u32,
}

/// Moment map blur pass for VSM.
pub struct MomentBlurPass {
    pipeline: ComputePipeline,
    bind_group_layout: BindGroupLayout,
    horizontal_params: Buffer,
    vertical_params: Buffer,
    current_size: u32,
}

impl MomentBlurPass {
    pub fn new(device: &Device) -> RenderResult<Self> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("moment_blur_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/moment_blur.wgsl").into()),
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::compilation("moment_blur", err));
        }

        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("moment_blur_layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: false },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::StorageTexture {
                        access: StorageTextureAccess::WriteOnly,
                        format: TextureFormat::Rgba16Float,
                        view_dimension: TextureViewDimension::D2,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 2,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("moment_blur_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("moment_blur_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "cs_blur",
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::compilation("moment_blur", err));
        }

        let horizontal_params = device.create_buffer(&BufferDescriptor {
            label: Some("moment_blur_params_h"),
            size: std::mem::size_of::<BlurParams>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let vertical_params = device.create_buffer(&BufferDescriptor {
            label: Some("moment_blur_params_v"),
            size: std::mem::size_of::<BlurParams>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            pipeline,
            bind_group_layout,
            horizontal_params,
            vertical_params,
            current_size: 0,
        })
    }

    fn sync_params(&mut self, queue: &Queue, texture_size: u32) {
        if self.current_size == texture_size {
            return;
        }
        let horizontal = BlurParams {
            direction: [1.0, 0.0],
            texture_size,
            _pad: 0,
        };
        let vertical = BlurParams {
            direction: [0.0, 1.0],
            texture_size,
            _pad: 0,
        };
        queue.write_buffer(&self.horizontal_params, 0, bytemuck::bytes_of(&horizontal));
        queue.write_buffer(&self.vertical_params, 0, bytemuck::bytes_of(&vertical));
        self.current_size = texture_size;
    }

    /// Record the blur dispatches for this frame. Returns the number
    /// of compute passes recorded.
    pub fn execute(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut wgpu::CommandEncoder,
        resources: &ShadowResources,
        mode: BlurMode,
    ) -> u32 {
        let size = resources.map_size();
        self.sync_params(queue, size);

        // Rows: capture -> intermediate.
        self.dispatch(
            device,
            encoder,
            "moment_blur_horizontal",
            resources.moment_capture_view(),
            resources.moment_intermediate_view(),
            &self.horizontal_params,
            size,
        );

        if mode == BlurMode::HorizontalOnly {
            return 1;
        }

        // Columns: intermediate -> capture.
        self.dispatch(
            device,
            encoder,
            "moment_blur_vertical",
            resources.moment_intermediate_view(),
            resources.moment_capture_view(),
            &self.vertical_params,
            size,
        );
        2
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch(
        &self,
        device: &Device,
        encoder: &mut wgpu::CommandEncoder,
        label: &str,
        input: &wgpu::TextureView,
        output: &wgpu::TextureView,
        params: &Buffer,
        texture_size: u32,
    ) {
        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some(label),
            layout: &self.bind_group_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(input),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::TextureView(output),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: params.as_entire_binding(),
                },
            ],
        });

        let groups = (texture_size + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE;

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(groups, groups, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blur_params_are_gpu_aligned() {
        assert_eq!(std::mem::size_of::<BlurParams>(), 16);
    }
}
