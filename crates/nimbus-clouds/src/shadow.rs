//! Cloud shadow and sky ambient-occlusion maps.
//!
//! Each light (or the sky light) traces the medium through an orthographic
//! projection anchored on a snapped world grid under the camera. The traced
//! map is blended with the previous frame's map, then optionally smoothed.
//! History is discarded when the map is reallocated or when the light turns
//! by more than the configured rotation cut.
//!
//! Maps are consumed by the next frame's tracing pass: [`CloudShadowTemporalState::light_map`]
//! only returns maps committed in an earlier frame.

use glam::{Mat4, Vec3};
use nimbus_render::{
    FullscreenAttachment, FullscreenPipelineDesc, RenderTarget, ShaderLibrary, TargetAllocator,
    TargetDesc, create_fullscreen_pipeline, create_linear_sampler, opaque_target,
    run_fullscreen_pass, sampler_entry, texture_entry, uniform_entry,
};

use crate::COMMON_WGSL;
use crate::history::HistoryState;
use crate::medium::VolumetricMedium;
use crate::settings::{LayerSettings, LightMapSettings};
use crate::uniforms::{
    CloudLayerUniform, ShadowFilterUniform, ShadowTemporalUniform, ShadowTraceUniform,
};

const SHADOW_TRACE_WGSL: &str = include_str!("shaders/shadow_trace.wgsl");
const SHADOW_TEMPORAL_WGSL: &str = include_str!("shaders/shadow_temporal.wgsl");
const SHADOW_FILTER_WGSL: &str = include_str!("shaders/shadow_filter.wgsl");

/// Transmittance and normalized front depth.
pub const LIGHT_MAP_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg16Float;

/// Above this |direction · up| the light is treated as vertical.
const VERTICAL_THRESHOLD: f32 = 0.99;

/// Texel size in meters at which the light-map filter runs at full strength.
pub const REFERENCE_TEXEL_METERS: f32 = 1000.0;

/// Which map a light produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    /// Directional shadow transmittance.
    Shadow,
    /// Ambient occlusion from the sky, traced toward the planet center.
    SkyAo,
}

impl LightKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Shadow => "shadow",
            Self::SkyAo => "sky-ao",
        }
    }
}

/// Orthographic light projection for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightProjection {
    pub world_to_clip: Mat4,
    pub clip_to_world: Mat4,
    /// Snapped grid point the projection is centered on.
    pub anchor: Vec3,
    pub light_position: Vec3,
    /// Normalized march direction.
    pub direction: Vec3,
    /// Half extent in meters.
    pub extent: f32,
    pub far_depth: f32,
    pub sample_count: u32,
    pub texel_world_size: f32,
}

/// Point on the planet surface directly below `camera`.
pub fn camera_ground_point(camera: Vec3, layer: &LayerSettings) -> Vec3 {
    let center = layer.planet_center();
    let up = (camera - center).normalize_or(Vec3::Y);
    center + up * layer.planet_radius
}

/// Snap each axis to the grid of `snap` meters.
pub fn snap_anchor(point: Vec3, snap: f32) -> Vec3 {
    if snap <= 0.0 {
        return point;
    }
    ((point + Vec3::splat(0.5 * snap)) / snap).floor() * snap
}

/// World-space size of one light-map texel.
pub fn light_map_texel_size(extent: f32, resolution: u32) -> f32 {
    extent * 2.0 / resolution.max(1) as f32
}

/// Spatial filter strength for a light map with the given texel size.
pub fn filter_strength(texel_world_size: f32) -> f32 {
    if texel_world_size <= 0.0 {
        return 1.0;
    }
    (REFERENCE_TEXEL_METERS / texel_world_size).clamp(0.0, 1.0)
}

/// Orthographic projection with depth 1 at the near plane and 0 at `far`.
pub fn reverse_z_orthographic(extent: f32, far: f32) -> Mat4 {
    Mat4::orthographic_rh(-extent, extent, -extent, extent, far, 0.0)
}

/// Shadow march samples: more for grazing light, which crosses more of the
/// layer.
pub fn shadow_sample_count(planet_up: Vec3, direction: Vec3) -> u32 {
    let cos = planet_up.dot(direction).abs().max(1.0e-4);
    let grazing = (0.2 / cos - 1.0).clamp(0.0, 1.0);
    (16.0 + 32.0 * grazing).round() as u32
}

/// Whether the light turned by more than `threshold_degrees` between frames.
pub fn rotation_exceeds(previous: Vec3, current: Vec3, threshold_degrees: f32) -> bool {
    let cos = previous.normalize_or_zero().dot(current.normalize_or_zero());
    cos < threshold_degrees.to_radians().cos()
}

/// Build this frame's projection.
///
/// `light_direction` is the direction the light travels; it is ignored for
/// sky AO, which always marches toward the planet center. `default_extent`
/// is used when the settings carry no override.
pub fn compute_light_projection(
    kind: LightKind,
    light_direction: Vec3,
    camera: Vec3,
    settings: &LightMapSettings,
    layer: &LayerSettings,
    default_extent: f32,
) -> LightProjection {
    let ground = camera_ground_point(camera, layer);
    let planet_up = (ground - layer.planet_center()).normalize_or(Vec3::Y);
    let anchor = snap_anchor(ground, settings.snap_length);
    let extent = if settings.override_extent > 0.0 {
        settings.override_extent
    } else {
        default_extent
    }
    .max(1.0);
    let far_depth = 2.0 * extent;

    let (direction, up, sample_count) = match kind {
        LightKind::Shadow => {
            let direction = light_direction.normalize_or(-planet_up);
            let up = if direction.dot(planet_up).abs() > VERTICAL_THRESHOLD {
                Vec3::X
            } else {
                planet_up
            };
            (direction, up, shadow_sample_count(planet_up, direction))
        }
        LightKind::SkyAo => (-planet_up, Vec3::X, settings.sample_count),
    };

    let light_position = anchor - direction * extent;
    let view = Mat4::look_to_rh(light_position, direction, up);
    let world_to_clip = reverse_z_orthographic(extent, far_depth) * view;

    LightProjection {
        world_to_clip,
        clip_to_world: world_to_clip.inverse(),
        anchor,
        light_position,
        direction,
        extent,
        far_depth,
        sample_count,
        texel_world_size: light_map_texel_size(extent, settings.resolution),
    }
}

#[derive(Debug, Clone, Copy)]
struct CommittedMap {
    frame: u64,
    world_to_clip: Mat4,
}

/// Targets of one light-map frame.
pub struct LightFrameTargets<'s, T> {
    /// Written this frame.
    pub map: &'s T,
    pub scratch: &'s T,
    /// Previous map and its world-to-clip, when history is valid.
    pub history: Option<(&'s T, Mat4)>,
}

/// Per-light temporal state: two ping-pong maps plus a scratch target.
pub struct CloudShadowTemporalState<T> {
    kind: LightKind,
    maps: [Option<T>; 2],
    committed: [Option<CommittedMap>; 2],
    scratch: Option<T>,
    history: HistoryState,
    current_index: usize,
    frame: u64,
    resolution: u32,
    previous_direction: Option<Vec3>,
    projection: Option<LightProjection>,
}

impl<T> CloudShadowTemporalState<T> {
    pub fn new(kind: LightKind) -> Self {
        Self {
            kind,
            maps: [None, None],
            committed: [None, None],
            scratch: None,
            history: HistoryState::Uninitialized,
            current_index: 1,
            frame: 0,
            resolution: 0,
            previous_direction: None,
            projection: None,
        }
    }

    /// Begin `frame` for this light. Must run before any other per-frame call.
    pub fn update(
        &mut self,
        frame: u64,
        light_direction: Vec3,
        camera: Vec3,
        settings: &LightMapSettings,
        layer: &LayerSettings,
        default_extent: f32,
    ) -> &LightProjection {
        let first = !self.history.is_initialized();
        let reallocated = first || settings.resolution != self.resolution;
        if reallocated {
            if !first {
                log::debug!(
                    "Reallocating {} map: {} -> {}",
                    self.kind.label(),
                    self.resolution,
                    settings.resolution
                );
            }
            self.maps = [None, None];
            self.committed = [None, None];
            self.scratch = None;
            self.resolution = settings.resolution;
        }

        let rotation_cut = match (self.kind, self.previous_direction) {
            (LightKind::Shadow, Some(previous)) if !reallocated => {
                rotation_exceeds(previous, light_direction, settings.rotation_cut_degrees)
            }
            _ => false,
        };
        if rotation_cut {
            log::debug!("{} map history discarded by rotation cut", self.kind.label());
        }

        self.frame = frame;
        self.current_index = 1 - self.current_index;
        let previous = self.committed[1 - self.current_index];
        self.history = self
            .history
            .advance(!reallocated && !rotation_cut && previous.is_some());
        self.committed[self.current_index] = None;
        self.previous_direction = Some(light_direction);

        let projection = compute_light_projection(
            self.kind,
            light_direction,
            camera,
            settings,
            layer,
            default_extent,
        );
        log::trace!(
            "{} map frame {frame} anchor {:?} history {:?}",
            self.kind.label(),
            projection.anchor,
            self.history
        );
        self.projection.insert(projection)
    }

    fn assert_updated(&self) {
        assert!(
            self.history.is_initialized(),
            "light map state used before update"
        );
    }

    pub fn map_desc(&self) -> TargetDesc {
        TargetDesc::new(
            "cloud-light-map",
            self.resolution,
            self.resolution,
            LIGHT_MAP_FORMAT,
        )
        .with_usage(wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST)
    }

    /// The map written this frame.
    pub fn get_or_create_map<A>(&mut self, allocator: &mut A) -> &T
    where
        A: TargetAllocator<Target = T>,
    {
        self.assert_updated();
        let desc = self.map_desc();
        self.maps[self.current_index].get_or_insert_with(|| allocator.allocate(&desc))
    }

    /// Intermediate target for the raw trace and filter ping-pong.
    pub fn get_or_create_scratch<A>(&mut self, allocator: &mut A) -> &T
    where
        A: TargetAllocator<Target = T>,
    {
        self.assert_updated();
        let desc = TargetDesc {
            label: "cloud-light-map-scratch",
            ..self.map_desc()
        };
        self.scratch.get_or_insert_with(|| allocator.allocate(&desc))
    }

    /// Allocate this frame's targets and resolve the history map.
    pub fn prepare_frame<A>(&mut self, allocator: &mut A) -> LightFrameTargets<'_, T>
    where
        A: TargetAllocator<Target = T>,
    {
        self.assert_updated();
        let desc = self.map_desc();
        let scratch_desc = TargetDesc {
            label: "cloud-light-map-scratch",
            ..desc
        };
        let history_matrix = if self.history.is_valid() {
            self.committed[1 - self.current_index].map(|c| c.world_to_clip)
        } else {
            None
        };
        let Self {
            maps,
            scratch,
            current_index,
            ..
        } = self;
        let [first, second] = maps;
        let (current, previous) = if *current_index == 0 {
            (first, second)
        } else {
            (second, first)
        };
        let previous: &Option<T> = previous;
        LightFrameTargets {
            map: current.get_or_insert_with(|| allocator.allocate(&desc)),
            scratch: scratch.get_or_insert_with(|| allocator.allocate(&scratch_desc)),
            history: history_matrix
                .and_then(move |matrix| previous.as_ref().map(|map| (map, matrix))),
        }
    }

    pub fn current_map(&self) -> Option<&T> {
        self.maps[self.current_index].as_ref()
    }

    pub fn scratch(&self) -> Option<&T> {
        self.scratch.as_ref()
    }

    /// Previous frame's map and its world-to-clip, when history is valid.
    pub fn history_map(&self) -> Option<(&T, Mat4)> {
        self.assert_updated();
        if !self.history.is_valid() {
            return None;
        }
        let previous = 1 - self.current_index;
        let committed = self.committed[previous]?;
        self.maps[previous]
            .as_ref()
            .map(|map| (map, committed.world_to_clip))
    }

    /// Mark the current map as complete for this frame.
    pub fn commit(&mut self) {
        self.assert_updated();
        assert!(
            self.maps[self.current_index].is_some(),
            "light map committed without a map"
        );
        let world_to_clip = self
            .projection
            .map_or(Mat4::IDENTITY, |projection| projection.world_to_clip);
        self.committed[self.current_index] = Some(CommittedMap {
            frame: self.frame,
            world_to_clip,
        });
    }

    /// The most recent map committed before `frame`, with its world-to-clip.
    pub fn light_map(&self, frame: u64) -> Option<(&T, Mat4)> {
        let (index, committed) = self
            .committed
            .iter()
            .enumerate()
            .filter_map(|(index, committed)| committed.map(|c| (index, c)))
            .filter(|(_, committed)| committed.frame < frame)
            .max_by_key(|(_, committed)| committed.frame)?;
        self.maps[index]
            .as_ref()
            .map(|map| (map, committed.world_to_clip))
    }

    pub fn kind(&self) -> LightKind {
        self.kind
    }

    pub fn projection(&self) -> Option<&LightProjection> {
        self.projection.as_ref()
    }

    pub fn history_state(&self) -> HistoryState {
        self.history
    }

    pub fn is_history_valid(&self) -> bool {
        self.history.is_valid()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }
}

pub fn shadow_trace_uniform(
    kind: LightKind,
    projection: &LightProjection,
    resolution: u32,
) -> ShadowTraceUniform {
    ShadowTraceUniform {
        world_to_clip: projection.world_to_clip.to_cols_array(),
        clip_to_world: projection.clip_to_world.to_cols_array(),
        direction: projection
            .direction
            .extend(projection.far_depth)
            .to_array(),
        params: [
            projection.sample_count,
            resolution,
            (kind == LightKind::SkyAo) as u32,
            0,
        ],
    }
}

pub fn shadow_temporal_uniform(
    projection: &LightProjection,
    previous_world_to_clip: Option<Mat4>,
    settings: &LightMapSettings,
) -> ShadowTemporalUniform {
    ShadowTemporalUniform {
        prev_world_to_clip: previous_world_to_clip
            .unwrap_or(Mat4::IDENTITY)
            .to_cols_array(),
        clip_to_world: projection.clip_to_world.to_cols_array(),
        params: [
            settings.temporal_weight,
            if previous_world_to_clip.is_some() { 1.0 } else { 0.0 },
            settings.resolution as f32,
            projection.far_depth,
        ],
    }
}

pub fn shadow_filter_uniform(
    kind: LightKind,
    projection: &LightProjection,
    settings: &LightMapSettings,
) -> ShadowFilterUniform {
    ShadowFilterUniform {
        strength: filter_strength(projection.texel_world_size),
        min_transmittance_clamp: settings.min_transmittance_clamp,
        is_sky_ao: if kind == LightKind::SkyAo { 1.0 } else { 0.0 },
        inv_resolution: 1.0 / settings.resolution.max(1) as f32,
    }
}

/// Uniform buffers owned by one light.
pub struct LightMapBuffers<'a> {
    pub layer: &'a wgpu::Buffer,
    pub trace: &'a wgpu::Buffer,
    pub temporal: &'a wgpu::Buffer,
    pub filter: &'a wgpu::Buffer,
}

/// Pipelines of the light-map trace, temporal and filter passes.
pub struct LightMapPass {
    trace_layout: wgpu::BindGroupLayout,
    trace_pipeline: wgpu::RenderPipeline,
    temporal_uniform_layout: wgpu::BindGroupLayout,
    temporal_texture_layout: wgpu::BindGroupLayout,
    temporal_pipeline: wgpu::RenderPipeline,
    filter_uniform_layout: wgpu::BindGroupLayout,
    filter_texture_layout: wgpu::BindGroupLayout,
    filter_pipeline: wgpu::RenderPipeline,
    sampler: wgpu::Sampler,
}

impl LightMapPass {
    pub fn new(
        device: &wgpu::Device,
        shaders: &mut ShaderLibrary,
        medium: &dyn VolumetricMedium,
    ) -> Self {
        let medium_source = medium.wgsl();
        let medium_wgsl: &str = &medium_source;
        let vs = nimbus_render::FULLSCREEN_VS_WGSL;
        let trace_shader = shaders.get_or_compile(
            device,
            &format!("cloud-light-trace-{}", medium.label()),
            &[vs, COMMON_WGSL, medium_wgsl, SHADOW_TRACE_WGSL],
        );
        let temporal_shader = shaders.get_or_compile(
            device,
            "cloud-light-temporal",
            &[vs, COMMON_WGSL, SHADOW_TEMPORAL_WGSL],
        );
        let filter_shader = shaders.get_or_compile(
            device,
            "cloud-light-filter",
            &[vs, COMMON_WGSL, SHADOW_FILTER_WGSL],
        );

        let trace_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("cloud-light-trace-bgl"),
            entries: &[
                uniform_entry(0, std::mem::size_of::<CloudLayerUniform>() as u64),
                uniform_entry(1, std::mem::size_of::<ShadowTraceUniform>() as u64),
            ],
        });
        let temporal_uniform_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("cloud-light-temporal-uniform-bgl"),
                entries: &[uniform_entry(
                    0,
                    std::mem::size_of::<ShadowTemporalUniform>() as u64,
                )],
            });
        let temporal_texture_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("cloud-light-temporal-texture-bgl"),
                entries: &[
                    texture_entry(0, true),
                    texture_entry(1, true),
                    sampler_entry(2),
                ],
            });
        let filter_uniform_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("cloud-light-filter-uniform-bgl"),
                entries: &[uniform_entry(
                    0,
                    std::mem::size_of::<ShadowFilterUniform>() as u64,
                )],
            });
        let filter_texture_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("cloud-light-filter-texture-bgl"),
                entries: &[texture_entry(0, true)],
            });

        let pipeline = |label: &str,
                        shader: &wgpu::ShaderModule,
                        entry: &str,
                        layouts: &[&wgpu::BindGroupLayout]| {
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: layouts,
                immediate_size: 0,
            });
            create_fullscreen_pipeline(
                device,
                &FullscreenPipelineDesc {
                    label,
                    shader,
                    layout: &layout,
                    fragment_entry: entry,
                    targets: &[opaque_target(LIGHT_MAP_FORMAT)],
                },
            )
        };
        let trace_pipeline = pipeline(
            "cloud-light-trace-pipeline",
            &trace_shader,
            "fs_shadow_trace",
            &[&trace_layout],
        );
        let temporal_pipeline = pipeline(
            "cloud-light-temporal-pipeline",
            &temporal_shader,
            "fs_shadow_temporal",
            &[&temporal_uniform_layout, &temporal_texture_layout],
        );
        let filter_pipeline = pipeline(
            "cloud-light-filter-pipeline",
            &filter_shader,
            "fs_shadow_filter",
            &[&filter_uniform_layout, &filter_texture_layout],
        );
        log::info!("Created cloud light map pipelines for medium '{}'", medium.label());

        Self {
            trace_layout,
            trace_pipeline,
            temporal_uniform_layout,
            temporal_texture_layout,
            temporal_pipeline,
            filter_uniform_layout,
            filter_texture_layout,
            filter_pipeline,
            sampler: create_linear_sampler(device, "cloud-light-map-sampler"),
        }
    }

    /// Trace the medium into `scratch`.
    pub fn record_trace(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        buffers: &LightMapBuffers<'_>,
        scratch: &wgpu::TextureView,
    ) {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("cloud-light-trace-bg"),
            layout: &self.trace_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffers.layer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffers.trace.as_entire_binding(),
                },
            ],
        });
        run_fullscreen_pass(
            encoder,
            "cloud-light-trace",
            &self.trace_pipeline,
            &[&bind_group],
            &[FullscreenAttachment {
                view: scratch,
                load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
            }],
            None,
        );
    }

    /// Blend `scratch` with `history` into `map`. Without valid history the
    /// temporal uniform disables the blend and `history` may be any texture.
    pub fn record_temporal(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        buffers: &LightMapBuffers<'_>,
        scratch: &wgpu::TextureView,
        history: &wgpu::TextureView,
        map: &wgpu::TextureView,
    ) {
        let uniforms = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("cloud-light-temporal-uniform-bg"),
            layout: &self.temporal_uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffers.temporal.as_entire_binding(),
            }],
        });
        let textures = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("cloud-light-temporal-texture-bg"),
            layout: &self.temporal_texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(scratch),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(history),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        run_fullscreen_pass(
            encoder,
            "cloud-light-temporal",
            &self.temporal_pipeline,
            &[&uniforms, &textures],
            &[FullscreenAttachment {
                view: map,
                load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
            }],
            None,
        );
    }

    /// Run `iterations` filter steps ping-ponging between `map` and
    /// `scratch`. The result always ends up in `map`.
    pub fn record_filter(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        buffers: &LightMapBuffers<'_>,
        map: &RenderTarget,
        scratch: &RenderTarget,
        iterations: u32,
    ) {
        if iterations == 0 {
            return;
        }
        let uniforms = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("cloud-light-filter-uniform-bg"),
            layout: &self.filter_uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffers.filter.as_entire_binding(),
            }],
        });
        for (source, destination) in filter_schedule(iterations)
            .into_iter()
            .map(|step| step.targets(map, scratch))
        {
            let textures = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("cloud-light-filter-texture-bg"),
                layout: &self.filter_texture_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&source.view),
                }],
            });
            run_fullscreen_pass(
                encoder,
                "cloud-light-filter",
                &self.filter_pipeline,
                &[&uniforms, &textures],
                &[FullscreenAttachment {
                    view: &destination.view,
                    load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                }],
                None,
            );
        }
        if iterations % 2 == 1 {
            encoder.copy_texture_to_texture(
                scratch.texture.as_image_copy(),
                map.texture.as_image_copy(),
                wgpu::Extent3d {
                    width: map.desc.width,
                    height: map.desc.height,
                    depth_or_array_layers: 1,
                },
            );
        }
    }
}

/// Direction of one filter iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStep {
    MapToScratch,
    ScratchToMap,
}

impl FilterStep {
    fn targets<'t, T>(self, map: &'t T, scratch: &'t T) -> (&'t T, &'t T) {
        match self {
            Self::MapToScratch => (map, scratch),
            Self::ScratchToMap => (scratch, map),
        }
    }
}

/// Filter steps for `iterations` passes starting from the map.
pub fn filter_schedule(iterations: u32) -> Vec<FilterStep> {
    (0..iterations)
        .map(|i| {
            if i % 2 == 0 {
                FilterStep::MapToScratch
            } else {
                FilterStep::ScratchToMap
            }
        })
        .collect()
}
