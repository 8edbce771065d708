//! Composition pass.
//!
//! Upsamples the reconstructed buffer onto the scene, attenuating what is
//! already there by the cloud transmittance and adding the cloud luminance.
//! The underwater variant writes the water-excluded color target, restricted
//! to the screen rectangle behind refractive water.

use glam::UVec2;
use nimbus_render::{
    FullscreenAttachment, FullscreenPipelineDesc, PREMULTIPLIED_TRANSMITTANCE_BLEND, PixelRect,
    ShaderLibrary, create_fullscreen_pipeline, create_linear_sampler, depth_texture_entry,
    run_fullscreen_pass, sampler_entry, texture_entry, uniform_entry,
};

use crate::COMMON_WGSL;
use crate::resolution::VolumetricRenderTarget;
use crate::uniforms::{CloudViewUniform, ComposeUniform};

const COMPOSE_WGSL: &str = include_str!("shaders/compose.wgsl");

/// Where the composition pass writes.
pub enum CompositionOutput<'a> {
    /// Full-screen scene color.
    Opaque { color: &'a wgpu::TextureView },
    /// Water-excluded color, only inside `rect`.
    Underwater {
        color: &'a wgpu::TextureView,
        rect: PixelRect,
    },
}

/// Pack the composition uniform.
pub fn compose_uniform<T>(
    target: &VolumetricRenderTarget<T>,
    output_size: UVec2,
) -> ComposeUniform {
    let reconstruct = target.reconstruct_resolution().max(UVec2::ONE).as_vec2();
    let output = output_size.max(UVec2::ONE).as_vec2();
    let settings = target.settings();
    ComposeUniform {
        mode: [
            settings.upsampling_mode.index(),
            target.noise_frame_index(),
            0,
            0,
        ],
        reconstruct_size: [
            reconstruct.x,
            reconstruct.y,
            1.0 / reconstruct.x,
            1.0 / reconstruct.y,
        ],
        output_size: [output.x, output.y, 1.0 / output.x, 1.0 / output.y],
        params: [
            settings.disocclusion_threshold,
            settings.noise_scale,
            0.0,
            0.0,
        ],
    }
}

/// Pipelines of the composition pass.
pub struct CompositionPass {
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    opaque: wgpu::RenderPipeline,
    underwater: wgpu::RenderPipeline,
    sampler: wgpu::Sampler,
}

impl CompositionPass {
    pub fn new(
        device: &wgpu::Device,
        shaders: &mut ShaderLibrary,
        scene_format: wgpu::TextureFormat,
        water_format: wgpu::TextureFormat,
    ) -> Self {
        let shader = shaders.get_or_compile(
            device,
            "cloud-compose",
            &[nimbus_render::FULLSCREEN_VS_WGSL, COMMON_WGSL, COMPOSE_WGSL],
        );

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("cloud-compose-uniform-bgl"),
            entries: &[
                uniform_entry(0, std::mem::size_of::<CloudViewUniform>() as u64),
                uniform_entry(1, std::mem::size_of::<ComposeUniform>() as u64),
            ],
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("cloud-compose-texture-bgl"),
            entries: &[
                texture_entry(0, true),
                texture_entry(1, false),
                depth_texture_entry(2),
                sampler_entry(3),
            ],
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("cloud-compose-layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            immediate_size: 0,
        });

        let pipeline = |label: &str, format: wgpu::TextureFormat| {
            create_fullscreen_pipeline(
                device,
                &FullscreenPipelineDesc {
                    label,
                    shader: &shader,
                    layout: &layout,
                    fragment_entry: "fs_compose",
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(PREMULTIPLIED_TRANSMITTANCE_BLEND),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                },
            )
        };
        let opaque = pipeline("cloud-compose-pipeline", scene_format);
        let underwater = pipeline("cloud-compose-underwater-pipeline", water_format);
        log::info!("Created cloud composition pipelines ({scene_format:?}, {water_format:?})");

        Self {
            uniform_layout,
            texture_layout,
            opaque,
            underwater,
            sampler: create_linear_sampler(device, "cloud-compose-sampler"),
        }
    }

    /// Bind groups for one draw. `scene_depth` is the depth matching the
    /// output: scene depth for opaque, water-excluded depth for underwater.
    pub fn create_bind_groups(
        &self,
        device: &wgpu::Device,
        view: &wgpu::Buffer,
        params: &wgpu::Buffer,
        reconstruct_color: &wgpu::TextureView,
        reconstruct_depth: &wgpu::TextureView,
        scene_depth: &wgpu::TextureView,
    ) -> [wgpu::BindGroup; 2] {
        let uniforms = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("cloud-compose-uniform-bg"),
            layout: &self.uniform_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: view.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: params.as_entire_binding(),
                },
            ],
        });
        let textures = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("cloud-compose-texture-bg"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(reconstruct_color),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(reconstruct_depth),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(scene_depth),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        [uniforms, textures]
    }

    /// Blend the clouds into `output`. `output_size` is the size of the
    /// output target; underwater rects are clipped to it and an empty rect
    /// records nothing.
    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        bind_groups: &[wgpu::BindGroup; 2],
        output: &CompositionOutput<'_>,
        output_size: UVec2,
    ) {
        let (pipeline, color, rect, label) = match output {
            CompositionOutput::Opaque { color } => (&self.opaque, *color, None, "cloud-compose"),
            CompositionOutput::Underwater { color, rect } => {
                match rect.clipped_to(output_size.x, output_size.y) {
                    Some(rect) => (
                        &self.underwater,
                        *color,
                        Some(rect),
                        "cloud-compose-underwater",
                    ),
                    None => {
                        log::trace!("Underwater rect {rect:?} is empty, skipping composition");
                        return;
                    }
                }
            }
        };
        run_fullscreen_pass(
            encoder,
            label,
            pipeline,
            &[&bind_groups[0], &bind_groups[1]],
            &[FullscreenAttachment {
                view: color,
                load: wgpu::LoadOp::Load,
            }],
            rect,
        );
    }
}
