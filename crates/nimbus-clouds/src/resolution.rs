//! Per-view volumetric render target state.
//!
//! [`VolumetricRenderTarget`] owns the ping-pong reconstruct buffers, the
//! transient tracing buffers, and the scheduling state derived from them
//! (downsample factors, frame id, dither offset, history validity). It is
//! generic over the target handle so the state machine can be driven by any
//! [`TargetAllocator`].
//!
//! Per frame, `initialize` must be called exactly once before any other
//! method. Accessing targets before `initialize`, or reading history while it
//! is invalid, panics.

use glam::{Mat4, UVec2, UVec4};
use nimbus_render::{TargetAllocator, TargetDesc, div_round_up};

use crate::dither::{cycle_length, dither_offset};
use crate::history::HistoryState;
use crate::settings::CloudTargetSettings;

/// Premultiplied luminance in RGB, transmittance in alpha.
pub const CLOUD_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Front distance (meters) from the camera.
pub const CLOUD_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

struct ReconstructSlot<T> {
    color: Option<T>,
    depth: Option<T>,
    /// View-projection of the frame whose output this slot holds.
    committed: Option<Mat4>,
}

impl<T> Default for ReconstructSlot<T> {
    fn default() -> Self {
        Self {
            color: None,
            depth: None,
            committed: None,
        }
    }
}

/// Persistent per-view state for temporally reconstructed volumetrics.
pub struct VolumetricRenderTarget<T> {
    settings: CloudTargetSettings,
    full_resolution: UVec2,
    reconstruct_resolution: UVec2,
    tracing_resolution: UVec2,
    reconstruct_factor: u32,
    tracing_factor: u32,
    current_index: usize,
    frame_id: u32,
    frame_counter: u32,
    dither_offset: UVec2,
    history: HistoryState,
    storage_tracing: bool,
    slots: [ReconstructSlot<T>; 2],
    tracing_color: Option<T>,
    tracing_depth: Option<T>,
    tracing_committed: bool,
}

impl<T> Default for VolumetricRenderTarget<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> VolumetricRenderTarget<T> {
    pub fn new() -> Self {
        Self {
            settings: CloudTargetSettings::default(),
            full_resolution: UVec2::ZERO,
            reconstruct_resolution: UVec2::ZERO,
            tracing_resolution: UVec2::ZERO,
            reconstruct_factor: 1,
            tracing_factor: 1,
            // The first initialize flips this to 0.
            current_index: 1,
            frame_id: 0,
            frame_counter: 0,
            dither_offset: UVec2::ZERO,
            history: HistoryState::Uninitialized,
            storage_tracing: false,
            slots: [ReconstructSlot::default(), ReconstructSlot::default()],
            tracing_color: None,
            tracing_depth: None,
            tracing_committed: false,
        }
    }

    /// Request storage-texture usage on the tracing targets.
    ///
    /// Changing the flag drops the tracing targets; they are recreated on the
    /// next `get_or_create_*` call.
    pub fn set_tracing_storage(&mut self, enabled: bool) {
        if self.storage_tracing != enabled {
            self.storage_tracing = enabled;
            self.tracing_color = None;
            self.tracing_depth = None;
        }
    }

    /// Begin a frame for a view of `view_rect_resolution` pixels.
    pub fn initialize(&mut self, view_rect_resolution: UVec2, settings: &CloudTargetSettings) {
        let full_resolution = view_rect_resolution.max(UVec2::ONE);
        let reconstruct_factor = settings.mode.reconstruct_factor();
        let tracing_factor = settings.mode.tracing_factor();
        let reconstruct_resolution = UVec2::new(
            div_round_up(full_resolution.x, reconstruct_factor),
            div_round_up(full_resolution.y, reconstruct_factor),
        );
        let tracing_resolution = UVec2::new(
            div_round_up(reconstruct_resolution.x, tracing_factor),
            div_round_up(reconstruct_resolution.y, tracing_factor),
        );

        let first = !self.history.is_initialized();
        let layout_changed = first
            || full_resolution != self.full_resolution
            || reconstruct_factor != self.reconstruct_factor
            || tracing_factor != self.tracing_factor;

        if layout_changed {
            if !first {
                log::debug!(
                    "Volumetric target layout changed: {}x{} ÷{}÷{} -> {}x{} ÷{}÷{}",
                    self.full_resolution.x,
                    self.full_resolution.y,
                    self.reconstruct_factor,
                    self.tracing_factor,
                    full_resolution.x,
                    full_resolution.y,
                    reconstruct_factor,
                    tracing_factor
                );
            }
            self.release_targets();
        }

        self.settings = *settings;
        self.full_resolution = full_resolution;
        self.reconstruct_resolution = reconstruct_resolution;
        self.tracing_resolution = tracing_resolution;
        self.reconstruct_factor = reconstruct_factor;
        self.tracing_factor = tracing_factor;

        self.current_index = 1 - self.current_index;
        self.frame_id = if layout_changed {
            0
        } else {
            (self.frame_id + 1) % cycle_length(tracing_factor)
        };
        self.frame_counter = self.frame_counter.wrapping_add(1);
        self.dither_offset = dither_offset(tracing_factor, self.frame_id);

        let previous_committed = self.slots[self.previous_index()].committed.is_some();
        self.history = self
            .history
            .advance(!layout_changed && previous_committed);

        // Whatever the new current slot held is about to be overwritten.
        self.slots[self.current_index].committed = None;
        self.tracing_committed = false;

        log::trace!(
            "Volumetric target frame {} dither {:?} history {:?}",
            self.frame_id,
            self.dither_offset,
            self.history
        );
    }

    fn release_targets(&mut self) {
        self.slots = [ReconstructSlot::default(), ReconstructSlot::default()];
        self.tracing_color = None;
        self.tracing_depth = None;
        self.tracing_committed = false;
    }

    fn assert_initialized(&self) {
        assert!(
            self.history.is_initialized(),
            "volumetric render target used before initialize"
        );
    }

    fn previous_index(&self) -> usize {
        1 - self.current_index
    }

    // --- Target descriptions ---

    pub fn tracing_color_desc(&self) -> TargetDesc {
        self.tracing_desc("cloud-tracing-color", CLOUD_COLOR_FORMAT)
    }

    pub fn tracing_depth_desc(&self) -> TargetDesc {
        self.tracing_desc("cloud-tracing-depth", CLOUD_DEPTH_FORMAT)
    }

    fn tracing_desc(&self, label: &'static str, format: wgpu::TextureFormat) -> TargetDesc {
        let desc = TargetDesc::new(
            label,
            self.tracing_resolution.x,
            self.tracing_resolution.y,
            format,
        );
        if self.storage_tracing {
            desc.with_usage(wgpu::TextureUsages::STORAGE_BINDING)
        } else {
            desc
        }
    }

    pub fn reconstruct_color_desc(&self) -> TargetDesc {
        TargetDesc::new(
            "cloud-reconstruct-color",
            self.reconstruct_resolution.x,
            self.reconstruct_resolution.y,
            CLOUD_COLOR_FORMAT,
        )
    }

    pub fn reconstruct_depth_desc(&self) -> TargetDesc {
        TargetDesc::new(
            "cloud-reconstruct-depth",
            self.reconstruct_resolution.x,
            self.reconstruct_resolution.y,
            CLOUD_DEPTH_FORMAT,
        )
    }

    // --- Lazy allocation ---

    pub fn get_or_create_tracing_target<A>(&mut self, allocator: &mut A) -> &T
    where
        A: TargetAllocator<Target = T>,
    {
        self.assert_initialized();
        let desc = self.tracing_color_desc();
        self.tracing_color
            .get_or_insert_with(|| allocator.allocate(&desc))
    }

    pub fn get_or_create_tracing_depth<A>(&mut self, allocator: &mut A) -> &T
    where
        A: TargetAllocator<Target = T>,
    {
        self.assert_initialized();
        let desc = self.tracing_depth_desc();
        self.tracing_depth
            .get_or_insert_with(|| allocator.allocate(&desc))
    }

    pub fn get_or_create_dst_reconstruct<A>(&mut self, allocator: &mut A) -> &T
    where
        A: TargetAllocator<Target = T>,
    {
        self.assert_initialized();
        let desc = self.reconstruct_color_desc();
        self.slots[self.current_index]
            .color
            .get_or_insert_with(|| allocator.allocate(&desc))
    }

    pub fn get_or_create_dst_reconstruct_depth<A>(&mut self, allocator: &mut A) -> &T
    where
        A: TargetAllocator<Target = T>,
    {
        self.assert_initialized();
        let desc = self.reconstruct_depth_desc();
        self.slots[self.current_index]
            .depth
            .get_or_insert_with(|| allocator.allocate(&desc))
    }

    // --- Read access to allocated targets ---

    pub fn tracing_target(&self) -> &T {
        self.assert_initialized();
        allocated(&self.tracing_color, "tracing color")
    }

    pub fn tracing_depth(&self) -> &T {
        self.assert_initialized();
        allocated(&self.tracing_depth, "tracing depth")
    }

    pub fn dst_reconstruct(&self) -> &T {
        self.assert_initialized();
        allocated(&self.slots[self.current_index].color, "reconstruct color")
    }

    pub fn dst_reconstruct_depth(&self) -> &T {
        self.assert_initialized();
        allocated(&self.slots[self.current_index].depth, "reconstruct depth")
    }

    /// Previous frame's reconstructed color. Requires valid history.
    pub fn src_reconstruct(&self) -> &T {
        let slot = self.history_slot();
        allocated(&slot.color, "history color")
    }

    /// Previous frame's reconstructed depth. Requires valid history.
    pub fn src_reconstruct_depth(&self) -> &T {
        let slot = self.history_slot();
        allocated(&slot.depth, "history depth")
    }

    /// View-projection the history was rendered with. Requires valid history.
    pub fn history_view_proj(&self) -> Mat4 {
        match self.history_slot().committed {
            Some(view_proj) => view_proj,
            None => unreachable!("valid history without a committed slot"),
        }
    }

    fn history_slot(&self) -> &ReconstructSlot<T> {
        self.assert_initialized();
        assert!(
            self.history.is_valid(),
            "reconstruct history read while history is invalid"
        );
        &self.slots[self.previous_index()]
    }

    // --- Commit ---

    /// Mark this frame's tracing outputs as produced.
    pub fn commit_tracing(&mut self) {
        self.assert_initialized();
        assert!(
            self.tracing_color.is_some() && self.tracing_depth.is_some(),
            "tracing committed without tracing targets"
        );
        self.tracing_committed = true;
    }

    /// Mark the current reconstruct slot as this frame's output, rendered
    /// with `view_proj`.
    pub fn commit_reconstruct(&mut self, view_proj: Mat4) {
        self.assert_initialized();
        let slot = &mut self.slots[self.current_index];
        assert!(
            slot.color.is_some() && slot.depth.is_some(),
            "reconstruct committed without reconstruct targets"
        );
        slot.committed = Some(view_proj);
    }

    // --- Scheduling state ---

    /// `(combined, combined, dither.x · reconstruct factor, dither.y · reconstruct factor)`:
    /// maps a tracing texel to the full-resolution pixel it samples.
    pub fn tracing_to_full_res_scale_bias(&self) -> UVec4 {
        let combined = self.combined_factor();
        UVec4::new(
            combined,
            combined,
            self.dither_offset.x * self.reconstruct_factor,
            self.dither_offset.y * self.reconstruct_factor,
        )
    }

    pub fn settings(&self) -> &CloudTargetSettings {
        &self.settings
    }

    pub fn full_resolution(&self) -> UVec2 {
        self.full_resolution
    }

    pub fn reconstruct_resolution(&self) -> UVec2 {
        self.reconstruct_resolution
    }

    pub fn tracing_resolution(&self) -> UVec2 {
        self.tracing_resolution
    }

    pub fn reconstruct_factor(&self) -> u32 {
        self.reconstruct_factor
    }

    pub fn tracing_factor(&self) -> u32 {
        self.tracing_factor
    }

    pub fn combined_factor(&self) -> u32 {
        self.reconstruct_factor * self.tracing_factor
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn frame_id(&self) -> u32 {
        self.frame_id
    }

    /// Monotonic (wrapping) count of `initialize` calls, used to seed noise.
    pub fn noise_frame_index(&self) -> u32 {
        self.frame_counter
    }

    pub fn dither_offset(&self) -> UVec2 {
        self.dither_offset
    }

    pub fn history_state(&self) -> HistoryState {
        self.history
    }

    pub fn is_history_valid(&self) -> bool {
        self.history.is_valid()
    }

    pub fn is_tracing_committed(&self) -> bool {
        self.tracing_committed
    }

    pub fn is_reconstruct_committed(&self) -> bool {
        self.slots[self.current_index].committed.is_some()
    }
}

fn allocated<'s, T>(slot: &'s Option<T>, what: &str) -> &'s T {
    match slot {
        Some(target) => target,
        None => panic!("{what} accessed before allocation"),
    }
}
