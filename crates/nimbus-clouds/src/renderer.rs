//! Per-frame orchestration of the cloud passes.
//!
//! [`CloudRenderer`] owns the pipelines plus the persistent per-view and
//! per-light state. Each call to [`CloudRenderer::render_view`] builds a
//! small [`FrameGraph`] (trace, reconstruct, compose) and records it into the
//! caller's encoder; [`CloudRenderer::render_light_maps`] does the same for
//! one light's shadow or sky-AO map.

use std::collections::HashMap;

use glam::{Mat4, UVec2, UVec4, Vec3};
use nimbus_render::{
    DeviceAllocator, ExecutedPass, FrameGraph, GpuCapabilities, GraphError, PixelRect, QueueHint,
    RenderTarget, ShaderLibrary,
};

use crate::composition::{CompositionOutput, CompositionPass, compose_uniform};
use crate::medium::VolumetricMedium;
use crate::reconstruction::{
    HistoryViews, ReconstructVariant, ReconstructionPass, prepare_reconstruct_targets,
    reconstruct_uniform,
};
use crate::resolution::VolumetricRenderTarget;
use crate::settings::{CloudSettings, LightMapSettings};
use crate::shadow::{
    CloudShadowTemporalState, LightKind, LightMapBuffers, LightMapPass, shadow_filter_uniform,
    shadow_temporal_uniform, shadow_trace_uniform,
};
use crate::tracing::{
    SunLight, TracingBuffers, TracingFrame, TracingPass, select_tracing_queue, tracing_uniform,
};
use crate::uniforms::{
    CloudLayerUniform, CloudViewUniform, ComposeUniform, ReconstructUniform, ShadowFilterUniform,
    ShadowTemporalUniform, ShadowTraceUniform, TracingUniform, create_uniform_buffer,
};

/// Errors raised while recording cloud passes.
#[derive(Debug, thiserror::Error)]
pub enum CloudRenderError {
    #[error("cloud frame graph: {0}")]
    Graph(#[from] GraphError),
}

/// Caller-chosen identifier of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub u64);

/// Caller-chosen identifier of a light or sky light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightId(pub u64);

/// Color formats the composition and direct tracing passes write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloudFormats {
    pub scene_color: wgpu::TextureFormat,
    /// Water-excluded color used by the underwater variant.
    pub water_color: wgpu::TextureFormat,
}

/// Where a view's clouds end up.
pub enum ViewTarget<'a> {
    /// Composite over the scene color.
    Scene { color: &'a wgpu::TextureView },
    /// Composite over the water-excluded color behind refractive water.
    Underwater {
        color: &'a wgpu::TextureView,
        /// Water-excluded depth, matching `color`.
        depth: &'a wgpu::TextureView,
        rect: PixelRect,
    },
    /// Reflection capture: trace at full resolution straight into `color`,
    /// without reconstruction or composition.
    Direct { color: &'a wgpu::TextureView },
}

/// Inputs of one view for one frame.
pub struct ViewInputs<'a> {
    pub resolution: UVec2,
    pub view_proj: Mat4,
    pub camera_position: Vec3,
    /// Full-resolution scene depth (reverse Z).
    pub scene_depth: &'a wgpu::TextureView,
    pub target: ViewTarget<'a>,
    pub sun: SunLight,
    pub shadow_light: Option<LightId>,
    pub sky_light: Option<LightId>,
}

/// Inputs of one light for one frame.
#[derive(Debug, Clone, Copy)]
pub struct LightMapInputs {
    pub kind: LightKind,
    /// Direction the light travels. Ignored for sky AO.
    pub direction: Vec3,
    /// Camera the map is centered under.
    pub camera_position: Vec3,
}

/// What [`CloudRenderer::render_view`] scheduled.
#[derive(Debug, Clone)]
pub struct ViewFrameReport {
    pub frame_id: u32,
    pub dither_offset: UVec2,
    pub history_valid: bool,
    /// `None` for direct tracing.
    pub variant: Option<ReconstructVariant>,
    pub tracing_queue: QueueHint,
    /// Targets allocated while recording this view.
    pub allocations: usize,
    pub passes: Vec<ExecutedPass>,
}

struct ViewState {
    target: VolumetricRenderTarget<RenderTarget>,
    view_buffer: wgpu::Buffer,
    tracing_buffer: wgpu::Buffer,
    reconstruct_buffer: wgpu::Buffer,
    compose_buffer: wgpu::Buffer,
    previous_camera: Option<Vec3>,
}

impl ViewState {
    fn new(device: &wgpu::Device) -> Self {
        Self {
            target: VolumetricRenderTarget::new(),
            view_buffer: create_uniform_buffer::<CloudViewUniform>(device, "cloud-view-uniform"),
            tracing_buffer: create_uniform_buffer::<TracingUniform>(
                device,
                "cloud-tracing-uniform",
            ),
            reconstruct_buffer: create_uniform_buffer::<ReconstructUniform>(
                device,
                "cloud-reconstruct-uniform",
            ),
            compose_buffer: create_uniform_buffer::<ComposeUniform>(
                device,
                "cloud-compose-uniform",
            ),
            previous_camera: None,
        }
    }
}

struct LightState {
    state: CloudShadowTemporalState<RenderTarget>,
    trace_buffer: wgpu::Buffer,
    temporal_buffer: wgpu::Buffer,
    filter_buffer: wgpu::Buffer,
}

impl LightState {
    fn new(device: &wgpu::Device, kind: LightKind) -> Self {
        Self {
            state: CloudShadowTemporalState::new(kind),
            trace_buffer: create_uniform_buffer::<ShadowTraceUniform>(
                device,
                "cloud-light-trace-uniform",
            ),
            temporal_buffer: create_uniform_buffer::<ShadowTemporalUniform>(
                device,
                "cloud-light-temporal-uniform",
            ),
            filter_buffer: create_uniform_buffer::<ShadowFilterUniform>(
                device,
                "cloud-light-filter-uniform",
            ),
        }
    }
}

/// Graph context for a view: the encoder plus which outputs were recorded.
struct ViewRecording<'e> {
    encoder: &'e mut wgpu::CommandEncoder,
    traced: bool,
    reconstructed: bool,
}

/// Volumetric cloud renderer.
pub struct CloudRenderer {
    settings: CloudSettings,
    capabilities: GpuCapabilities,
    tracing: TracingPass,
    reconstruction: ReconstructionPass,
    composition: CompositionPass,
    light_maps: LightMapPass,
    layer_buffer: wgpu::Buffer,
    views: HashMap<ViewId, ViewState>,
    lights: HashMap<LightId, LightState>,
    frame: u64,
}

impl CloudRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        formats: CloudFormats,
        settings: CloudSettings,
        medium: &dyn VolumetricMedium,
        capabilities: GpuCapabilities,
    ) -> Self {
        let mut shaders = ShaderLibrary::new();
        let tracing = TracingPass::new(device, queue, &mut shaders, medium, formats.scene_color);
        let reconstruction = ReconstructionPass::new(device, &mut shaders);
        let composition =
            CompositionPass::new(device, &mut shaders, formats.scene_color, formats.water_color);
        let light_maps = LightMapPass::new(device, &mut shaders, medium);

        let layer_buffer = create_uniform_buffer::<CloudLayerUniform>(device, "cloud-layer");
        queue.write_buffer(
            &layer_buffer,
            0,
            bytemuck::bytes_of(&CloudLayerUniform::new(&settings.layer)),
        );
        log::info!(
            "Cloud renderer ready: medium '{}', {} shader modules, {:?}",
            medium.label(),
            shaders.len(),
            capabilities
        );

        Self {
            settings,
            capabilities,
            tracing,
            reconstruction,
            composition,
            light_maps,
            layer_buffer,
            views: HashMap::new(),
            lights: HashMap::new(),
            frame: 0,
        }
    }

    /// Advance the frame counter. Call once per frame before any view or
    /// light is rendered.
    pub fn begin_frame(&mut self) -> u64 {
        self.frame += 1;
        log::trace!("Cloud frame {}", self.frame);
        self.frame
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn settings(&self) -> &CloudSettings {
        &self.settings
    }

    /// Replace the settings, for instance after a config reload. Per-view
    /// state picks up layout changes on its next `initialize`.
    pub fn update_settings(&mut self, queue: &wgpu::Queue, settings: CloudSettings) {
        if settings.layer != self.settings.layer {
            queue.write_buffer(
                &self.layer_buffer,
                0,
                bytemuck::bytes_of(&CloudLayerUniform::new(&settings.layer)),
            );
        }
        self.settings = settings;
        log::debug!("Cloud settings updated");
    }

    /// Record the clouds of one view. With clouds disabled nothing is
    /// recorded and the view's persistent state is released.
    pub fn render_view(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        view_id: ViewId,
        inputs: &ViewInputs<'_>,
    ) -> Result<ViewFrameReport, CloudRenderError> {
        if !self.settings.enabled {
            return Ok(self.skip_disabled_view(view_id));
        }
        if let ViewTarget::Direct { color } = inputs.target {
            return self.render_direct(device, queue, encoder, view_id, inputs, color);
        }

        let Self {
            settings,
            capabilities,
            tracing,
            reconstruction,
            composition,
            layer_buffer,
            views,
            lights,
            frame,
            ..
        } = self;
        let frame = *frame;
        let (tracing, reconstruction, composition): (
            &TracingPass,
            &ReconstructionPass,
            &CompositionPass,
        ) = (tracing, reconstruction, composition);
        let view = views
            .entry(view_id)
            .or_insert_with(|| ViewState::new(device));

        // Step 1: initialize, then allocate what this frame writes.
        view.target
            .set_tracing_storage(settings.tracing.async_compute && capabilities.storage_textures);
        view.target.initialize(inputs.resolution, &settings.target);
        let mut allocator = DeviceAllocator::new(device);
        view.target.get_or_create_tracing_target(&mut allocator);
        view.target.get_or_create_tracing_depth(&mut allocator);
        let variant = prepare_reconstruct_targets(&mut view.target, &mut allocator);
        let allocations = allocator.allocations();

        let target = &view.target;
        let tracing_queue = select_tracing_queue(
            &target.tracing_color_desc(),
            capabilities,
            settings.tracing.async_compute,
        );
        let (shadow, sky_ao) = bound_light_maps(lights, settings, inputs, frame);

        let prev_view_proj = if target.is_history_valid() {
            target.history_view_proj()
        } else {
            inputs.view_proj
        };
        let view_uniform = CloudViewUniform::new(
            inputs.view_proj,
            inputs.camera_position,
            prev_view_proj,
            view.previous_camera.unwrap_or(inputs.camera_position),
            target.full_resolution(),
        );
        let tracing_params = tracing_uniform(
            &settings.tracing,
            &TracingFrame {
                scale_bias: target.tracing_to_full_res_scale_bias(),
                tracing_size: target.tracing_resolution(),
                noise_frame: target.noise_frame_index(),
                reflection_capture: false,
                sun: inputs.sun,
                shadow_strength: settings.shadow_map.strength,
                sky_ao_strength: settings.sky_ao.strength,
                shadow: shadow.map(|(_, matrix)| matrix),
                sky_ao: sky_ao.map(|(_, matrix)| matrix),
            },
        );
        queue.write_buffer(&view.view_buffer, 0, bytemuck::bytes_of(&view_uniform));
        queue.write_buffer(&view.tracing_buffer, 0, bytemuck::bytes_of(&tracing_params));
        queue.write_buffer(
            &view.reconstruct_buffer,
            0,
            bytemuck::bytes_of(&reconstruct_uniform(target)),
        );
        queue.write_buffer(
            &view.compose_buffer,
            0,
            bytemuck::bytes_of(&compose_uniform(target, inputs.resolution)),
        );

        let tracing_groups = tracing.create_bind_groups(
            device,
            &TracingBuffers {
                layer: layer_buffer,
                view: &view.view_buffer,
                tracing: &view.tracing_buffer,
            },
            inputs.scene_depth,
            shadow.map(|(map, _)| &map.view),
            sky_ao.map(|(map, _)| &map.view),
        );
        let history = (variant == ReconstructVariant::WithHistory).then(|| HistoryViews {
            color: &target.src_reconstruct().view,
            depth: &target.src_reconstruct_depth().view,
        });
        let reconstruct_groups = reconstruction.create_bind_groups(
            device,
            &view.view_buffer,
            &view.reconstruct_buffer,
            &target.tracing_target().view,
            &target.tracing_depth().view,
            history,
        );
        let (output, compose_depth) = match &inputs.target {
            ViewTarget::Underwater { color, depth, rect } => (
                CompositionOutput::Underwater {
                    color,
                    rect: *rect,
                },
                *depth,
            ),
            ViewTarget::Scene { color } | ViewTarget::Direct { color } => {
                (CompositionOutput::Opaque { color }, inputs.scene_depth)
            }
        };
        let compose_groups = composition.create_bind_groups(
            device,
            &view.view_buffer,
            &view.compose_buffer,
            &target.dst_reconstruct().view,
            &target.dst_reconstruct_depth().view,
            compose_depth,
        );

        // Steps 2 to 5 as a graph: trace, reconstruct, compose.
        let mut graph: FrameGraph<'_, ViewRecording<'_>> = FrameGraph::new();
        let scene_depth = graph.import("scene-depth");
        let light_maps = graph.import("previous-light-maps");
        let reconstruct_history = graph.import("reconstruct-history");
        let scene_color = graph.import("scene-color");
        let traced = graph.create("tracing");
        let reconstructed = graph.create("reconstruct");

        let tracing_color = &target.tracing_target().view;
        let tracing_depth = &target.tracing_depth().view;
        graph.add_pass(
            "cloud-tracing",
            |pass| {
                pass.read(scene_depth)
                    .read(light_maps)
                    .write(traced)
                    .queue(tracing_queue);
            },
            move |recording: &mut ViewRecording<'_>| {
                tracing.record(
                    recording.encoder,
                    &tracing_groups,
                    tracing_color,
                    tracing_depth,
                );
                recording.traced = true;
            },
        );
        let reconstruct_color = &target.dst_reconstruct().view;
        let reconstruct_depth = &target.dst_reconstruct_depth().view;
        graph.add_pass(
            "cloud-reconstruct",
            |pass| {
                pass.read(traced)
                    .read(reconstruct_history)
                    .write(reconstructed);
            },
            move |recording: &mut ViewRecording<'_>| {
                reconstruction.record(
                    recording.encoder,
                    &reconstruct_groups,
                    reconstruct_color,
                    reconstruct_depth,
                );
                recording.reconstructed = true;
            },
        );
        let output_size = inputs.resolution;
        graph.add_pass(
            "cloud-compose",
            |pass| {
                pass.read(reconstructed).read(scene_depth).write(scene_color);
            },
            move |recording: &mut ViewRecording<'_>| {
                composition.record(recording.encoder, &compose_groups, &output, output_size);
            },
        );

        let mut recording = ViewRecording {
            encoder,
            traced: false,
            reconstructed: false,
        };
        let passes = graph.execute(&mut recording)?;

        let report = ViewFrameReport {
            frame_id: view.target.frame_id(),
            dither_offset: view.target.dither_offset(),
            history_valid: view.target.is_history_valid(),
            variant: Some(variant),
            tracing_queue,
            allocations,
            passes,
        };
        // Steps 3 and 4: extract the outputs that were recorded.
        if recording.traced {
            view.target.commit_tracing();
        }
        if recording.reconstructed {
            view.target.commit_reconstruct(inputs.view_proj);
        }
        view.previous_camera = Some(inputs.camera_position);
        log::trace!(
            "View {:?} frame {frame}: dither {:?} variant {variant:?}",
            view_id,
            report.dither_offset
        );
        Ok(report)
    }

    /// Clouds are off: record nothing and drop the view's history, so
    /// re-enabling starts from a fresh trace.
    fn skip_disabled_view(&mut self, view_id: ViewId) -> ViewFrameReport {
        if self.views.remove(&view_id).is_some() {
            log::debug!("Clouds disabled, dropped state of view {view_id:?}");
        }
        ViewFrameReport {
            frame_id: 0,
            dither_offset: UVec2::ZERO,
            history_valid: false,
            variant: None,
            tracing_queue: QueueHint::Main,
            allocations: 0,
            passes: Vec::new(),
        }
    }

    fn render_direct(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        view_id: ViewId,
        inputs: &ViewInputs<'_>,
        color: &wgpu::TextureView,
    ) -> Result<ViewFrameReport, CloudRenderError> {
        let Self {
            settings,
            tracing,
            layer_buffer,
            views,
            lights,
            frame,
            ..
        } = self;
        let frame = *frame;
        let view = views
            .entry(view_id)
            .or_insert_with(|| ViewState::new(device));
        let resolution = inputs.resolution.max(UVec2::ONE);
        let (shadow, sky_ao) = bound_light_maps(lights, settings, inputs, frame);

        let view_uniform = CloudViewUniform::new(
            inputs.view_proj,
            inputs.camera_position,
            inputs.view_proj,
            inputs.camera_position,
            resolution,
        );
        let tracing_params = tracing_uniform(
            &settings.tracing,
            &TracingFrame {
                scale_bias: UVec4::new(1, 1, 0, 0),
                tracing_size: resolution,
                noise_frame: frame as u32,
                reflection_capture: true,
                sun: inputs.sun,
                shadow_strength: settings.shadow_map.strength,
                sky_ao_strength: settings.sky_ao.strength,
                shadow: shadow.map(|(_, matrix)| matrix),
                sky_ao: sky_ao.map(|(_, matrix)| matrix),
            },
        );
        queue.write_buffer(&view.view_buffer, 0, bytemuck::bytes_of(&view_uniform));
        queue.write_buffer(&view.tracing_buffer, 0, bytemuck::bytes_of(&tracing_params));
        let groups = tracing.create_bind_groups(
            device,
            &TracingBuffers {
                layer: layer_buffer,
                view: &view.view_buffer,
                tracing: &view.tracing_buffer,
            },
            inputs.scene_depth,
            shadow.map(|(map, _)| &map.view),
            sky_ao.map(|(map, _)| &map.view),
        );

        let mut graph: FrameGraph<'_, wgpu::CommandEncoder> = FrameGraph::new();
        let scene_depth = graph.import("scene-depth");
        let light_maps = graph.import("previous-light-maps");
        let scene_color = graph.import("scene-color");
        graph.add_pass(
            "cloud-tracing-direct",
            |pass| {
                pass.read(scene_depth).read(light_maps).write(scene_color);
            },
            move |encoder: &mut wgpu::CommandEncoder| {
                tracing.record_direct(encoder, &groups, color, None);
            },
        );
        let passes = graph.execute(encoder)?;
        view.previous_camera = Some(inputs.camera_position);

        Ok(ViewFrameReport {
            frame_id: 0,
            dither_offset: UVec2::ZERO,
            history_valid: false,
            variant: None,
            tracing_queue: QueueHint::Main,
            allocations: 0,
            passes,
        })
    }

    /// Record the shadow or sky-AO map of one light. The map becomes visible
    /// to tracing from the next frame on. Disabled maps record nothing.
    pub fn render_light_maps(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        light_id: LightId,
        inputs: &LightMapInputs,
    ) -> Result<Vec<ExecutedPass>, CloudRenderError> {
        let Self {
            settings,
            tracing,
            light_maps,
            layer_buffer,
            lights,
            frame,
            ..
        } = self;
        let (tracing, light_maps): (&TracingPass, &LightMapPass) = (tracing, light_maps);
        if !settings.enabled {
            if lights.remove(&light_id).is_some() {
                log::debug!("Clouds disabled, dropped maps of light {light_id:?}");
            }
            return Ok(Vec::new());
        }
        let map_settings = light_map_settings(settings, inputs.kind);
        if !map_settings.enabled {
            log::trace!("{} map disabled, skipping light {:?}", inputs.kind.label(), light_id);
            return Ok(Vec::new());
        }

        let light = lights
            .entry(light_id)
            .or_insert_with(|| LightState::new(device, inputs.kind));
        if light.state.kind() != inputs.kind {
            log::debug!(
                "Light {:?} changed kind to {}, dropping its maps",
                light_id,
                inputs.kind.label()
            );
            *light = LightState::new(device, inputs.kind);
        }

        let projection = *light.state.update(
            *frame,
            inputs.direction,
            inputs.camera_position,
            &map_settings,
            &settings.layer,
            settings.default_light_map_extent(),
        );
        let mut allocator = DeviceAllocator::new(device);
        let targets = light.state.prepare_frame(&mut allocator);

        queue.write_buffer(
            &light.trace_buffer,
            0,
            bytemuck::bytes_of(&shadow_trace_uniform(
                inputs.kind,
                &projection,
                map_settings.resolution,
            )),
        );
        queue.write_buffer(
            &light.temporal_buffer,
            0,
            bytemuck::bytes_of(&shadow_temporal_uniform(
                &projection,
                targets.history.map(|(_, matrix)| matrix),
                &map_settings,
            )),
        );
        queue.write_buffer(
            &light.filter_buffer,
            0,
            bytemuck::bytes_of(&shadow_filter_uniform(
                inputs.kind,
                &projection,
                &map_settings,
            )),
        );

        let buffers = LightMapBuffers {
            layer: layer_buffer,
            trace: &light.trace_buffer,
            temporal: &light.temporal_buffer,
            filter: &light.filter_buffer,
        };
        let map = targets.map;
        let scratch = targets.scratch;
        let history_view = targets
            .history
            .map_or(tracing.neutral_light_map(), |(history, _)| &history.view);
        let filter_iterations = map_settings.filter_iterations;

        let mut graph: FrameGraph<'_, wgpu::CommandEncoder> = FrameGraph::new();
        let previous_map = graph.import("previous-light-map");
        let raw = graph.create("light-map-raw");
        let blended = graph.create("light-map-temporal");
        let filtered = graph.create("light-map");
        let buffers = &buffers;
        graph.add_pass(
            "cloud-light-trace",
            |pass| {
                pass.write(raw);
            },
            move |encoder: &mut wgpu::CommandEncoder| {
                light_maps.record_trace(device, encoder, buffers, &scratch.view);
            },
        );
        graph.add_pass(
            "cloud-light-temporal",
            |pass| {
                pass.read(raw).read(previous_map).write(blended);
            },
            move |encoder: &mut wgpu::CommandEncoder| {
                light_maps.record_temporal(
                    device,
                    encoder,
                    buffers,
                    &scratch.view,
                    history_view,
                    &map.view,
                );
            },
        );
        if filter_iterations > 0 {
            graph.add_pass(
                "cloud-light-filter",
                |pass| {
                    pass.read(blended).write(filtered);
                },
                move |encoder: &mut wgpu::CommandEncoder| {
                    light_maps.record_filter(
                        device,
                        encoder,
                        buffers,
                        map,
                        scratch,
                        filter_iterations,
                    );
                },
            );
        }
        let passes = graph.execute(encoder)?;

        light.state.commit();
        log::trace!(
            "{} map for light {:?} frame {}: {} passes, {} allocations",
            inputs.kind.label(),
            light_id,
            frame,
            passes.len(),
            allocator.allocations()
        );
        Ok(passes)
    }

    /// The light's most recent map committed before the current frame.
    pub fn light_map(&self, light_id: LightId) -> Option<&RenderTarget> {
        self.lights
            .get(&light_id)
            .and_then(|light| light.state.light_map(self.frame))
            .map(|(map, _)| map)
    }

    /// Persistent state of a view, if it has been rendered.
    pub fn view_target(&self, view_id: ViewId) -> Option<&VolumetricRenderTarget<RenderTarget>> {
        self.views.get(&view_id).map(|view| &view.target)
    }

    pub fn remove_view(&mut self, view_id: ViewId) -> bool {
        let removed = self.views.remove(&view_id).is_some();
        if removed {
            log::debug!("Dropped cloud state of view {view_id:?}");
        }
        removed
    }

    pub fn remove_light(&mut self, light_id: LightId) -> bool {
        let removed = self.lights.remove(&light_id).is_some();
        if removed {
            log::debug!("Dropped light map state of light {light_id:?}");
        }
        removed
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub fn light_count(&self) -> usize {
        self.lights.len()
    }
}

fn light_map_settings(settings: &CloudSettings, kind: LightKind) -> LightMapSettings {
    match kind {
        LightKind::Shadow => settings.shadow_map,
        LightKind::SkyAo => settings.sky_ao,
    }
}

type BoundMap<'l> = Option<(&'l RenderTarget, Mat4)>;

/// Light maps the view's tracing pass samples this frame.
fn bound_light_maps<'l>(
    lights: &'l HashMap<LightId, LightState>,
    settings: &CloudSettings,
    inputs: &ViewInputs<'_>,
    frame: u64,
) -> (BoundMap<'l>, BoundMap<'l>) {
    let lookup = |id: Option<LightId>, kind: LightKind| {
        if !light_map_settings(settings, kind).enabled {
            return None;
        }
        lights
            .get(&id?)
            .filter(|light| light.state.kind() == kind)
            .and_then(|light| light.state.light_map(frame))
    };
    (
        lookup(inputs.shadow_light, LightKind::Shadow),
        lookup(inputs.sky_light, LightKind::SkyAo),
    )
}
