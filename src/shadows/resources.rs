// src/shadows/resources.rs
// GPU memory owned by the shadow system: depth map, moment ping-pong
// pair, samplers, and the scene depth buffer
// Reallocation is atomic: new textures are created and verified before
// the previous set is dropped, so an in-flight frame never observes a
// half-resized resource set
// RELEVANT FILES: src/shadows/pipelines.rs, src/shadows/renderer.rs

use log::{debug, warn};
use wgpu::{
    AddressMode, CompareFunction, Device, Extent3d, FilterMode, Sampler, SamplerDescriptor,
    Texture, TextureDescriptor, TextureDimension, TextureFormat, TextureUsages, TextureView,
    TextureViewDescriptor,
};

use crate::error::{RenderError, RenderResult};

/// Depth format for the shadow map and the scene depth buffer.
pub const SHADOW_DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// Moment map format. The two moments live in rg; ba stay zero. The
/// four-channel layout keeps the texture both filterable and usable as
/// a storage target for the blur.
pub const MOMENT_FORMAT: TextureFormat = TextureFormat::Rgba16Float;

/// Which moment texture the lit pass should read, depending on how
/// many blur dispatches ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlurMode {
    /// Horizontal then vertical dispatch; the lit pass reads the
    /// capture texture, which receives the vertical result.
    #[default]
    Separable,
    /// Compatibility wiring that only runs the horizontal dispatch;
    /// the lit pass reads the intermediate texture.
    HorizontalOnly,
}

impl BlurMode {
    /// Compute dispatches this mode contributes to a VSM frame.
    pub fn dispatch_count(self) -> u32 {
        match self {
            BlurMode::Separable => 2,
            BlurMode::HorizontalOnly => 1,
        }
    }
}

struct MomentPair {
    views: [TextureView; 2],
}

/// All GPU allocations the shadow passes read or write. Views keep
/// their underlying textures alive, so dropping a view pair releases
/// the GPU memory once in-flight work retires.
pub struct ShadowResources {
    map_size: u32,
    shadow_depth_view: TextureView,
    moments: MomentPair,
    compare_sampler: Sampler,
    blocker_sampler: Sampler,
    moment_sampler: Sampler,
    scene_depth: Option<TextureView>,
    surface_size: (u32, u32),
    texture_allocations: u64,
}

impl ShadowResources {
    pub fn new(device: &Device, map_size: u32) -> RenderResult<Self> {
        let (shadow_depth_view, moments) = allocate_maps(device, map_size)?;

        let compare_sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("shadow_compare_sampler"),
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Nearest,
            compare: Some(CompareFunction::Less),
            ..Default::default()
        });

        // Depth textures reject filtering samplers, so the blocker
        // search reads through a nearest, non-comparison sampler.
        let blocker_sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("shadow_blocker_sampler"),
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            mipmap_filter: FilterMode::Nearest,
            compare: None,
            ..Default::default()
        });

        let moment_sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("shadow_moment_sampler"),
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Nearest,
            compare: None,
            ..Default::default()
        });

        Ok(Self {
            map_size,
            shadow_depth_view,
            moments,
            compare_sampler,
            blocker_sampler,
            moment_sampler,
            scene_depth: None,
            surface_size: (0, 0),
            texture_allocations: 3,
        })
    }

    /// (Re)allocate the shadow map and moment pair for `map_size`.
    /// Idempotent when the size is unchanged. On allocation failure
    /// the previous resources stay live and the error is returned so
    /// the caller can revert its configuration.
    pub fn configure(&mut self, device: &Device, map_size: u32) -> RenderResult<()> {
        if map_size == self.map_size {
            return Ok(());
        }

        match allocate_maps(device, map_size) {
            Ok((shadow_depth_view, moments)) => {
                debug!(
                    "shadow maps resized {} -> {} texels",
                    self.map_size, map_size
                );
                // Dropping the previous views releases the old maps;
                // the swap happens only after the new set exists.
                self.shadow_depth_view = shadow_depth_view;
                self.moments = moments;
                self.map_size = map_size;
                self.texture_allocations += 3;
                Ok(())
            }
            Err(err) => {
                warn!(
                    "shadow map resize to {} failed ({}); keeping {} texels",
                    map_size, err, self.map_size
                );
                Err(err)
            }
        }
    }

    /// Allocate the scene depth buffer sized to the presentation
    /// surface. Called on every surface resize; idempotent for an
    /// unchanged size.
    pub fn configure_surface_depth(
        &mut self,
        device: &Device,
        width: u32,
        height: u32,
    ) -> RenderResult<()> {
        if self.surface_size == (width, height) && self.scene_depth.is_some() {
            return Ok(());
        }
        if width == 0 || height == 0 {
            return Err(RenderError::invalid_config(
                "surface depth dimensions must be non-zero",
            ));
        }

        let texture = create_texture_checked(
            device,
            &TextureDescriptor {
                label: Some("scene_depth"),
                size: Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: TextureDimension::D2,
                format: SHADOW_DEPTH_FORMAT,
                usage: TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            },
        )?;

        self.scene_depth = Some(texture.create_view(&TextureViewDescriptor::default()));
        self.surface_size = (width, height);
        self.texture_allocations += 1;
        Ok(())
    }

    pub fn map_size(&self) -> u32 {
        self.map_size
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.surface_size
    }

    /// Running count of texture allocations, used to verify that
    /// reconfiguring with an unchanged size does not reallocate.
    pub fn texture_allocations(&self) -> u64 {
        self.texture_allocations
    }

    pub fn shadow_depth_view(&self) -> &TextureView {
        &self.shadow_depth_view
    }

    pub fn compare_sampler(&self) -> &Sampler {
        &self.compare_sampler
    }

    pub fn blocker_sampler(&self) -> &Sampler {
        &self.blocker_sampler
    }

    pub fn moment_sampler(&self) -> &Sampler {
        &self.moment_sampler
    }

    /// Render target for VSM's moment capture pass.
    pub fn moment_capture_view(&self) -> &TextureView {
        &self.moments.views[0]
    }

    /// Intermediate target written by the horizontal blur dispatch.
    pub fn moment_intermediate_view(&self) -> &TextureView {
        &self.moments.views[1]
    }

    /// The moment view the lit pass samples, which depends on where
    /// the last blur dispatch wrote.
    pub fn moment_lit_view(&self, blur_mode: BlurMode) -> &TextureView {
        match blur_mode {
            BlurMode::Separable => &self.moments.views[0],
            BlurMode::HorizontalOnly => &self.moments.views[1],
        }
    }

    pub fn scene_depth_view(&self) -> RenderResult<&TextureView> {
        self.scene_depth.as_ref().ok_or_else(|| {
            RenderError::invalid_config("surface depth not configured; call configure_surface_depth")
        })
    }

    /// Total bytes held by the shadow textures at the current size.
    pub fn memory_bytes(&self) -> u64 {
        let texels = self.map_size as u64 * self.map_size as u64;
        // Depth32Float = 4 bytes, two Rgba16Float moment maps = 8 each.
        texels * 4 + texels * 8 * 2
    }
}

fn allocate_maps(device: &Device, map_size: u32) -> RenderResult<(TextureView, MomentPair)> {
    let shadow_depth = create_texture_checked(
        device,
        &TextureDescriptor {
            label: Some("shadow_depth_map"),
            size: Extent3d {
                width: map_size,
                height: map_size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: SHADOW_DEPTH_FORMAT,
            usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        },
    )?;

    let shadow_depth_view = shadow_depth.create_view(&TextureViewDescriptor {
        label: Some("shadow_depth_view"),
        aspect: wgpu::TextureAspect::DepthOnly,
        ..Default::default()
    });

    let mut moment_textures = Vec::with_capacity(2);
    for i in 0..2 {
        moment_textures.push(create_texture_checked(
            device,
            &TextureDescriptor {
                label: Some(if i == 0 { "moment_map_a" } else { "moment_map_b" }),
                size: Extent3d {
                    width: map_size,
                    height: map_size,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: TextureDimension::D2,
                format: MOMENT_FORMAT,
                usage: TextureUsages::RENDER_ATTACHMENT
                    | TextureUsages::TEXTURE_BINDING
                    | TextureUsages::STORAGE_BINDING,
                view_formats: &[],
            },
        )?);
    }

    let view_b = moment_textures[1].create_view(&TextureViewDescriptor::default());
    let view_a = moment_textures[0].create_view(&TextureViewDescriptor::default());

    Ok((
        shadow_depth_view,
        MomentPair {
            views: [view_a, view_b],
        },
    ))
}

/// Create a texture under an error scope so device-side rejection
/// (out of memory, invalid dimensions) surfaces as a typed error
/// instead of a delayed uncaptured-error callback.
fn create_texture_checked(
    device: &Device,
    descriptor: &TextureDescriptor,
) -> RenderResult<Texture> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let texture = device.create_texture(descriptor);
    let validation = pollster::block_on(device.pop_error_scope());
    let oom = pollster::block_on(device.pop_error_scope());
    if let Some(err) = oom.or(validation) {
        return Err(RenderError::allocation(format!(
            "{}: {}",
            descriptor.label.unwrap_or("texture"),
            err
        )));
    }
    Ok(texture)
}
