//! Reconstruction pass.
//!
//! Expands the traced buffer to reconstruct resolution. The texel matching
//! the dither offset takes the fresh trace; every other texel reprojects the
//! previous reconstruct buffer and blends it with the nearest trace, falling
//! back to the trace when the history is off-screen or disoccluded.

use nimbus_render::{
    FullscreenAttachment, FullscreenPipelineDesc, ShaderLibrary, TargetAllocator,
    create_fullscreen_pipeline, create_linear_sampler, opaque_target, run_fullscreen_pass,
    sampler_entry, texture_entry, uniform_entry,
};

use crate::COMMON_WGSL;
use crate::resolution::{CLOUD_COLOR_FORMAT, CLOUD_DEPTH_FORMAT, VolumetricRenderTarget};
use crate::uniforms::{CloudViewUniform, ReconstructUniform};

const RECONSTRUCT_WGSL: &str = include_str!("shaders/reconstruct.wgsl");
const RECONSTRUCT_HISTORY_WGSL: &str = include_str!("shaders/reconstruct_history.wgsl");

/// Shader variant of the reconstruction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconstructVariant {
    /// Reads and reprojects the previous reconstruct buffer.
    WithHistory,
    /// Binds no history; every texel takes the nearest trace.
    NoHistory,
}

impl ReconstructVariant {
    pub fn select(history_valid: bool) -> Self {
        if history_valid {
            Self::WithHistory
        } else {
            Self::NoHistory
        }
    }
}

/// Pack the reconstruction uniform from the view's state for this frame.
pub fn reconstruct_uniform<T>(target: &VolumetricRenderTarget<T>) -> ReconstructUniform {
    let dither = target.dither_offset();
    let tracing = target.tracing_resolution();
    let reconstruct = target.reconstruct_resolution();
    let settings = target.settings();
    ReconstructUniform {
        dither: [dither.x, dither.y, target.tracing_factor(), 0],
        sizes: [tracing.x, tracing.y, reconstruct.x, reconstruct.y],
        blend: [
            settings.temporal_factor,
            settings.disocclusion_threshold,
            0.0,
            0.0,
        ],
        // History always matches the current layout; a layout change
        // invalidates it.
        history_size: [reconstruct.x, reconstruct.y, 0, 0],
    }
}

/// Bind groups for one reconstruction draw.
pub struct ReconstructBindGroups {
    uniforms: wgpu::BindGroup,
    tracing: wgpu::BindGroup,
    history: Option<wgpu::BindGroup>,
}

impl ReconstructBindGroups {
    pub fn variant(&self) -> ReconstructVariant {
        ReconstructVariant::select(self.history.is_some())
    }
}

/// Reconstructed history of the previous frame.
pub struct HistoryViews<'a> {
    pub color: &'a wgpu::TextureView,
    pub depth: &'a wgpu::TextureView,
}

/// Pipelines of the reconstruction pass.
pub struct ReconstructionPass {
    uniform_layout: wgpu::BindGroupLayout,
    tracing_layout: wgpu::BindGroupLayout,
    history_layout: wgpu::BindGroupLayout,
    with_history: wgpu::RenderPipeline,
    no_history: wgpu::RenderPipeline,
    sampler: wgpu::Sampler,
}

impl ReconstructionPass {
    pub fn new(device: &wgpu::Device, shaders: &mut ShaderLibrary) -> Self {
        let no_history_shader = shaders.get_or_compile(
            device,
            "cloud-reconstruct-no-history",
            &[nimbus_render::FULLSCREEN_VS_WGSL, COMMON_WGSL, RECONSTRUCT_WGSL],
        );
        let history_shader = shaders.get_or_compile(
            device,
            "cloud-reconstruct",
            &[
                nimbus_render::FULLSCREEN_VS_WGSL,
                COMMON_WGSL,
                RECONSTRUCT_WGSL,
                RECONSTRUCT_HISTORY_WGSL,
            ],
        );

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("cloud-reconstruct-uniform-bgl"),
            entries: &[
                uniform_entry(0, std::mem::size_of::<CloudViewUniform>() as u64),
                uniform_entry(1, std::mem::size_of::<ReconstructUniform>() as u64),
            ],
        });
        let tracing_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("cloud-reconstruct-tracing-bgl"),
            entries: &[texture_entry(0, false), texture_entry(1, false)],
        });
        let history_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("cloud-reconstruct-history-bgl"),
            entries: &[
                texture_entry(0, true),
                texture_entry(1, false),
                sampler_entry(2),
            ],
        });

        let targets = [
            opaque_target(CLOUD_COLOR_FORMAT),
            opaque_target(CLOUD_DEPTH_FORMAT),
        ];
        let no_history_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("cloud-reconstruct-no-history-layout"),
            bind_group_layouts: &[&uniform_layout, &tracing_layout],
            immediate_size: 0,
        });
        let history_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("cloud-reconstruct-layout"),
                bind_group_layouts: &[&uniform_layout, &tracing_layout, &history_layout],
                immediate_size: 0,
            });

        let no_history = create_fullscreen_pipeline(
            device,
            &FullscreenPipelineDesc {
                label: "cloud-reconstruct-no-history-pipeline",
                shader: &no_history_shader,
                layout: &no_history_layout,
                fragment_entry: "fs_reconstruct_no_history",
                targets: &targets,
            },
        );
        let with_history = create_fullscreen_pipeline(
            device,
            &FullscreenPipelineDesc {
                label: "cloud-reconstruct-pipeline",
                shader: &history_shader,
                layout: &history_pipeline_layout,
                fragment_entry: "fs_reconstruct",
                targets: &targets,
            },
        );
        log::info!("Created cloud reconstruction pipelines");

        Self {
            uniform_layout,
            tracing_layout,
            history_layout,
            with_history,
            no_history,
            sampler: create_linear_sampler(device, "cloud-reconstruct-sampler"),
        }
    }

    /// Bind groups for one draw. Passing `history` selects
    /// [`ReconstructVariant::WithHistory`].
    pub fn create_bind_groups(
        &self,
        device: &wgpu::Device,
        view: &wgpu::Buffer,
        params: &wgpu::Buffer,
        tracing_color: &wgpu::TextureView,
        tracing_depth: &wgpu::TextureView,
        history: Option<HistoryViews<'_>>,
    ) -> ReconstructBindGroups {
        let uniforms = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("cloud-reconstruct-uniform-bg"),
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
        let tracing = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("cloud-reconstruct-tracing-bg"),
            layout: &self.tracing_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(tracing_color),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(tracing_depth),
                },
            ],
        });
        let history = history.map(|history| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("cloud-reconstruct-history-bg"),
                layout: &self.history_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(history.color),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(history.depth),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            })
        });
        ReconstructBindGroups {
            uniforms,
            tracing,
            history,
        }
    }

    /// Write the reconstruct color and depth of the current ping-pong slot.
    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        bind_groups: &ReconstructBindGroups,
        color: &wgpu::TextureView,
        depth: &wgpu::TextureView,
    ) {
        let attachments = [
            FullscreenAttachment {
                view: color,
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            },
            FullscreenAttachment {
                view: depth,
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            },
        ];
        match &bind_groups.history {
            Some(history) => run_fullscreen_pass(
                encoder,
                "cloud-reconstruct",
                &self.with_history,
                &[&bind_groups.uniforms, &bind_groups.tracing, history],
                &attachments,
                None,
            ),
            None => run_fullscreen_pass(
                encoder,
                "cloud-reconstruct-no-history",
                &self.no_history,
                &[&bind_groups.uniforms, &bind_groups.tracing],
                &attachments,
                None,
            ),
        }
    }
}

/// Allocate the destination slot and, when history is valid, resolve the
/// history views. Returns the variant the pass will run.
pub fn prepare_reconstruct_targets<T, A>(
    target: &mut VolumetricRenderTarget<T>,
    allocator: &mut A,
) -> ReconstructVariant
where
    A: TargetAllocator<Target = T>,
{
    target.get_or_create_dst_reconstruct(allocator);
    target.get_or_create_dst_reconstruct_depth(allocator);
    let variant = ReconstructVariant::select(target.is_history_valid());
    log::trace!("Reconstruction variant {variant:?}");
    variant
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{self, CloudSample, FAR_DEPTH, HistoryTexel};
    use crate::settings::{CloudTargetSettings, ReconstructionMode};
    use crate::test_support::{create_test_device, fill, read_back, test_target, texel};
    use crate::uniforms::create_uniform_buffer;
    use glam::{Mat4, UVec2, Vec2, Vec3, Vec4};
    use nimbus_render::TargetDesc;

    #[derive(Default)]
    struct Counter(usize);

    impl TargetAllocator for Counter {
        type Target = usize;

        fn allocate(&mut self, _desc: &TargetDesc) -> usize {
            self.0 += 1;
            self.0
        }
    }

    #[test]
    fn test_variant_selection() {
        assert_eq!(ReconstructVariant::select(false), ReconstructVariant::NoHistory);
        assert_eq!(ReconstructVariant::select(true), ReconstructVariant::WithHistory);
    }

    #[test]
    fn test_first_frame_selects_no_history() {
        let mut allocator = Counter::default();
        let mut target = VolumetricRenderTarget::new();
        target.initialize(UVec2::new(320, 180), &CloudTargetSettings::default());
        let variant = prepare_reconstruct_targets(&mut target, &mut allocator);
        assert_eq!(variant, ReconstructVariant::NoHistory);
        assert_eq!(allocator.0, 2);
    }

    #[test]
    fn test_uniform_packing() {
        let mut target = VolumetricRenderTarget::<usize>::new();
        let settings = CloudTargetSettings {
            mode: ReconstructionMode::FullResolutionQuarterTrace,
            temporal_factor: 0.8,
            ..Default::default()
        };
        target.initialize(UVec2::new(1920, 1080), &settings);
        target.initialize(UVec2::new(1920, 1080), &settings);
        let uniform = reconstruct_uniform(&target);
        let dither = target.dither_offset();
        assert_eq!(uniform.dither, [dither.x, dither.y, 4, 0]);
        assert_eq!(uniform.sizes, [480, 270, 1920, 1080]);
        assert_eq!(uniform.blend[0], 0.8);
        assert_eq!(uniform.history_size, [1920, 1080, 0, 0]);
    }

    const SIZE: u32 = 8;
    const FACTOR: u32 = 2;
    const TRACED: [f32; 4] = [1.0, 1.0, 1.0, 0.0];
    const HISTORY: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

    fn test_view_proj() -> Mat4 {
        Mat4::perspective_infinite_reverse_rh(1.0, 1.0, 0.1)
            * Mat4::look_to_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y)
    }

    /// Reconstruct a sky-only trace over uniform history stored at
    /// `history_depth`, with a static camera. Returns color and depth.
    fn reconstruct_over_history(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        history_depth: f32,
    ) -> (Vec<f32>, Vec<f32>) {
        let mut shaders = ShaderLibrary::new();
        let pass = ReconstructionPass::new(device, &mut shaders);
        let tracing_size = SIZE / FACTOR;

        let tracing_color =
            test_target(device, "tracing", tracing_size, tracing_size, CLOUD_COLOR_FORMAT);
        let tracing_depth =
            test_target(device, "tracing-depth", tracing_size, tracing_size, CLOUD_DEPTH_FORMAT);
        let history_color = test_target(device, "history", SIZE, SIZE, CLOUD_COLOR_FORMAT);
        let history_depth_target =
            test_target(device, "history-depth", SIZE, SIZE, CLOUD_DEPTH_FORMAT);
        let color = test_target(device, "reconstruct", SIZE, SIZE, CLOUD_COLOR_FORMAT);
        let depth = test_target(device, "reconstruct-depth", SIZE, SIZE, CLOUD_DEPTH_FORMAT);
        fill(queue, &tracing_color, &TRACED);
        fill(queue, &tracing_depth, &[FAR_DEPTH]);
        fill(queue, &history_color, &HISTORY);
        fill(queue, &history_depth_target, &[history_depth]);

        let view_proj = test_view_proj();
        let view_buffer = create_uniform_buffer::<CloudViewUniform>(device, "test-view");
        let params_buffer = create_uniform_buffer::<ReconstructUniform>(device, "test-params");
        queue.write_buffer(
            &view_buffer,
            0,
            bytemuck::bytes_of(&CloudViewUniform::new(
                view_proj,
                Vec3::ZERO,
                view_proj,
                Vec3::ZERO,
                UVec2::splat(SIZE),
            )),
        );
        queue.write_buffer(
            &params_buffer,
            0,
            bytemuck::bytes_of(&ReconstructUniform {
                dither: [0, 0, FACTOR, 0],
                sizes: [tracing_size, tracing_size, SIZE, SIZE],
                blend: [0.5, 0.1, 0.0, 0.0],
                history_size: [SIZE, SIZE, 0, 0],
            }),
        );

        let bind_groups = pass.create_bind_groups(
            device,
            &view_buffer,
            &params_buffer,
            &tracing_color.view,
            &tracing_depth.view,
            Some(HistoryViews {
                color: &history_color.view,
                depth: &history_depth_target.view,
            }),
        );
        assert_eq!(bind_groups.variant(), ReconstructVariant::WithHistory);
        let mut encoder = device.create_command_encoder(&Default::default());
        pass.record(&mut encoder, &bind_groups, &color.view, &depth.view);
        queue.submit([encoder.finish()]);

        (
            read_back(device, queue, &color),
            read_back(device, queue, &depth),
        )
    }

    fn expected_texel(coord: UVec2, history_depth: f32) -> CloudSample {
        let view_proj = test_view_proj();
        let nearest = CloudSample {
            color: Vec4::from_array(TRACED),
            depth: FAR_DEPTH,
        };
        let uv = (coord.as_vec2() + Vec2::splat(0.5)) / SIZE as f32;
        let dir = kernel::view_ray(view_proj.inverse(), Vec3::ZERO, uv);
        let history = kernel::reproject(dir, nearest.depth, Vec3::ZERO, Vec3::ZERO, view_proj)
            .map(|(uv, expected_depth)| HistoryTexel {
                sample: CloudSample {
                    color: Vec4::from_array(HISTORY),
                    depth: history_depth,
                },
                uv,
                expected_depth,
            });
        kernel::reconstruct_texel(
            coord,
            FACTOR,
            UVec2::ZERO,
            nearest,
            history,
            UVec2::splat(SIZE),
            0.5,
            0.1,
        )
    }

    fn interior_texels() -> impl Iterator<Item = UVec2> {
        (1..SIZE - 1).flat_map(|y| (1..SIZE - 1).map(move |x| UVec2::new(x, y)))
    }

    #[test]
    fn test_gpu_far_history_blends_with_trace() {
        let Some((device, queue)) = create_test_device() else {
            return;
        };
        let (color, depth) = reconstruct_over_history(&device, &queue, FAR_DEPTH);
        for coord in interior_texels() {
            let expected = expected_texel(coord, FAR_DEPTH);
            let got = Vec4::from_slice(texel(&color, SIZE, 4, coord.x, coord.y));
            assert!(got.abs_diff_eq(expected.color, 1e-3), "texel {coord}: {got}");
            if !kernel::is_dither_texel(coord, FACTOR, UVec2::ZERO) {
                assert!(got.abs_diff_eq(Vec4::splat(0.5), 1e-3), "texel {coord}: {got}");
            }
            assert_eq!(texel(&depth, SIZE, 1, coord.x, coord.y)[0], FAR_DEPTH);
        }
    }

    #[test]
    fn test_gpu_rejected_history_takes_nearest_trace() {
        let Some((device, queue)) = create_test_device() else {
            return;
        };
        // Cloud history in front of an expected sky texel is disoccluded.
        let (color, _) = reconstruct_over_history(&device, &queue, 100.0);
        for coord in interior_texels() {
            let expected = expected_texel(coord, 100.0);
            assert_eq!(expected.color, Vec4::from_array(TRACED));
            let got = Vec4::from_slice(texel(&color, SIZE, 4, coord.x, coord.y));
            assert!(got.abs_diff_eq(expected.color, 1e-3), "texel {coord}: {got}");
        }
    }
}
