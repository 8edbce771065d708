//! Tracing dispatcher.
//!
//! Ray-marches the medium once per tracing texel. Each texel samples the
//! full-resolution pixel selected by the view's scale/bias, so over one dither
//! cycle every sub-position of a tile is traced once. Output is premultiplied
//! luminance with transmittance in alpha, plus the front distance in meters.

use glam::{Mat4, UVec2, UVec4, Vec3};
use nimbus_render::{
    FullscreenAttachment, FullscreenPipelineDesc, GpuCapabilities,
    PREMULTIPLIED_TRANSMITTANCE_BLEND, PixelRect, QueueHint, ShaderLibrary, TargetDesc,
    create_fullscreen_pipeline, create_linear_sampler, depth_texture_entry, opaque_target,
    run_fullscreen_pass, sampler_entry, texture_entry, uniform_entry,
};

use crate::COMMON_WGSL;
use crate::medium::VolumetricMedium;
use crate::resolution::{CLOUD_COLOR_FORMAT, CLOUD_DEPTH_FORMAT};
use crate::settings::TracingSettings;
use crate::uniforms::{
    CloudLayerUniform, CloudViewUniform, LIGHT_MAP_SHADOW, LIGHT_MAP_SKY_AO, TracingUniform,
};

const TRACING_WGSL: &str = include_str!("shaders/tracing.wgsl");

/// Format of the 1×1 texture bound in place of a missing light map.
const NEUTRAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg16Float;

/// Two f16 ones: full transmittance, front depth at the far plane.
const NEUTRAL_TEXEL: [u8; 4] = [0x00, 0x3c, 0x00, 0x3c];

/// Directional light driving the medium.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunLight {
    /// Normalized direction the light travels (from the sun toward the scene).
    pub direction: Vec3,
    pub illuminance: Vec3,
}

impl Default for SunLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(0.3, -1.0, 0.2).normalize(),
            illuminance: Vec3::splat(1.0),
        }
    }
}

/// Per-dispatch inputs to [`tracing_uniform`].
#[derive(Debug, Clone, Copy)]
pub struct TracingFrame {
    pub scale_bias: UVec4,
    pub tracing_size: UVec2,
    pub noise_frame: u32,
    pub reflection_capture: bool,
    pub sun: SunLight,
    pub shadow_strength: f32,
    pub sky_ao_strength: f32,
    /// World-to-clip of the bound shadow map, if any.
    pub shadow: Option<Mat4>,
    /// World-to-clip of the bound sky AO map, if any.
    pub sky_ao: Option<Mat4>,
}

/// Pack the tracing uniform for one dispatch.
pub fn tracing_uniform(settings: &TracingSettings, frame: &TracingFrame) -> TracingUniform {
    let (sample_count_max, shadow_sample_count_max) =
        settings.sample_caps(frame.reflection_capture);
    let mut flags = 0;
    if frame.shadow.is_some() {
        flags |= LIGHT_MAP_SHADOW;
    }
    if frame.sky_ao.is_some() {
        flags |= LIGHT_MAP_SKY_AO;
    }
    let sun_direction = frame.sun.direction.normalize_or(Vec3::NEG_Y);

    TracingUniform {
        scale_bias: frame.scale_bias.to_array(),
        tracing_size: [
            frame.tracing_size.x,
            frame.tracing_size.y,
            frame.noise_frame,
            settings.sample_count_debug_mode,
        ],
        march: [
            settings.tracing_start_max_distance,
            settings.tracing_max_distance,
            settings.inv_distance_to_sample_count_max,
            settings.shadow_tracing_max_distance,
        ],
        counts: [
            sample_count_max,
            shadow_sample_count_max,
            settings.intersect_with_opaque as u32,
            flags,
        ],
        sun_direction: sun_direction.extend(frame.shadow_strength).to_array(),
        sun_illuminance: frame.sun.illuminance.extend(frame.sky_ao_strength).to_array(),
        shadow_world_to_clip: frame.shadow.unwrap_or(Mat4::IDENTITY).to_cols_array(),
        sky_ao_world_to_clip: frame.sky_ao.unwrap_or(Mat4::IDENTITY).to_cols_array(),
    }
}

/// Pick the queue for the tracing dispatch.
///
/// Async compute needs a storage-writable, single-sampled target and a device
/// with a separate compute queue. Anything else falls back to the main queue.
pub fn select_tracing_queue(
    target: &TargetDesc,
    capabilities: &GpuCapabilities,
    requested: bool,
) -> QueueHint {
    if !requested {
        return QueueHint::Main;
    }
    let reason = if !target.supports_storage_writes() {
        "target lacks storage usage"
    } else if target.sample_count > 1 {
        "target is multisampled"
    } else if !capabilities.async_compute_queue {
        "no async compute queue"
    } else {
        return QueueHint::AsyncCompute;
    };
    log::debug!("Async tracing unavailable ({reason}), using main queue");
    QueueHint::Main
}

/// Uniform buffers bound to group 0 of the tracing shader.
pub struct TracingBuffers<'a> {
    pub layer: &'a wgpu::Buffer,
    pub view: &'a wgpu::Buffer,
    pub tracing: &'a wgpu::Buffer,
}

/// Pipelines and shared resources of the tracing dispatcher.
pub struct TracingPass {
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline: wgpu::RenderPipeline,
    direct_pipeline: wgpu::RenderPipeline,
    neutral_view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

impl TracingPass {
    /// Build the tracing pipelines for `medium`.
    ///
    /// `direct_format` is the scene color format written by reflection
    /// captures, which skip reconstruction.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        shaders: &mut ShaderLibrary,
        medium: &dyn VolumetricMedium,
        direct_format: wgpu::TextureFormat,
    ) -> Self {
        let medium_source = medium.wgsl();
        let medium_wgsl: &str = &medium_source;
        let shader = shaders.get_or_compile(
            device,
            &format!("cloud-tracing-{}", medium.label()),
            &[
                nimbus_render::FULLSCREEN_VS_WGSL,
                COMMON_WGSL,
                medium_wgsl,
                TRACING_WGSL,
            ],
        );

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("cloud-tracing-uniform-bgl"),
            entries: &[
                uniform_entry(0, std::mem::size_of::<CloudLayerUniform>() as u64),
                uniform_entry(1, std::mem::size_of::<CloudViewUniform>() as u64),
                uniform_entry(2, std::mem::size_of::<TracingUniform>() as u64),
            ],
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("cloud-tracing-texture-bgl"),
            entries: &[
                depth_texture_entry(0),
                texture_entry(1, true),
                texture_entry(2, true),
                sampler_entry(3),
            ],
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("cloud-tracing-layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            immediate_size: 0,
        });

        let pipeline = create_fullscreen_pipeline(
            device,
            &FullscreenPipelineDesc {
                label: "cloud-tracing-pipeline",
                shader: &shader,
                layout: &layout,
                fragment_entry: "fs_trace",
                targets: &[
                    opaque_target(CLOUD_COLOR_FORMAT),
                    opaque_target(CLOUD_DEPTH_FORMAT),
                ],
            },
        );
        let direct_pipeline = create_fullscreen_pipeline(
            device,
            &FullscreenPipelineDesc {
                label: "cloud-tracing-direct-pipeline",
                shader: &shader,
                layout: &layout,
                fragment_entry: "fs_trace_direct",
                targets: &[Some(wgpu::ColorTargetState {
                    format: direct_format,
                    blend: Some(PREMULTIPLIED_TRANSMITTANCE_BLEND),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            },
        );

        let neutral = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("cloud-neutral-light-map"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: NEUTRAL_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &neutral,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &NEUTRAL_TEXEL,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(NEUTRAL_TEXEL.len() as u32),
                rows_per_image: None,
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        let neutral_view = neutral.create_view(&wgpu::TextureViewDescriptor::default());

        log::info!("Created cloud tracing pipelines for medium '{}'", medium.label());

        Self {
            uniform_layout,
            texture_layout,
            pipeline,
            direct_pipeline,
            neutral_view,
            sampler: create_linear_sampler(device, "cloud-tracing-sampler"),
        }
    }

    /// 1×1 stand-in for a light map that does not exist yet.
    pub fn neutral_light_map(&self) -> &wgpu::TextureView {
        &self.neutral_view
    }

    /// Bind groups 0 and 1 for one dispatch. Missing light maps bind the
    /// neutral texture.
    pub fn create_bind_groups(
        &self,
        device: &wgpu::Device,
        buffers: &TracingBuffers<'_>,
        scene_depth: &wgpu::TextureView,
        shadow_map: Option<&wgpu::TextureView>,
        sky_ao_map: Option<&wgpu::TextureView>,
    ) -> [wgpu::BindGroup; 2] {
        let uniforms = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("cloud-tracing-uniform-bg"),
            layout: &self.uniform_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffers.layer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffers.view.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffers.tracing.as_entire_binding(),
                },
            ],
        });
        if shadow_map.is_none() || sky_ao_map.is_none() {
            log::trace!("Binding neutral light map for missing shadow or sky AO map");
        }
        let textures = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("cloud-tracing-texture-bg"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(scene_depth),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(
                        shadow_map.unwrap_or(&self.neutral_view),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(
                        sky_ao_map.unwrap_or(&self.neutral_view),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        [uniforms, textures]
    }

    /// Trace into the tracing color and depth targets.
    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        bind_groups: &[wgpu::BindGroup; 2],
        color: &wgpu::TextureView,
        depth: &wgpu::TextureView,
    ) {
        run_fullscreen_pass(
            encoder,
            "cloud-tracing",
            &self.pipeline,
            &[&bind_groups[0], &bind_groups[1]],
            &[
                FullscreenAttachment {
                    view: color,
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                },
                FullscreenAttachment {
                    view: depth,
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                },
            ],
            None,
        );
    }

    /// Trace at full resolution and blend straight into scene color.
    pub fn record_direct(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        bind_groups: &[wgpu::BindGroup; 2],
        scene_color: &wgpu::TextureView,
        rect: Option<PixelRect>,
    ) {
        run_fullscreen_pass(
            encoder,
            "cloud-tracing-direct",
            &self.direct_pipeline,
            &[&bind_groups[0], &bind_groups[1]],
            &[FullscreenAttachment {
                view: scene_color,
                load: wgpu::LoadOp::Load,
            }],
            rect,
        );
    }
}
