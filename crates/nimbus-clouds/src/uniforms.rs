//! GPU uniform blocks shared by the cloud passes.
//!
//! Layouts match the WGSL structs in `shaders/`. Matrices are column-major
//! `[f32; 16]`; every block is a multiple of 16 bytes.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec2, Vec3};

use crate::settings::LayerSettings;

/// Cloud layer shell geometry in meters.
///
/// Total size: 16 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CloudLayerUniform {
    pub planet_radius: f32,
    pub bottom_radius: f32,
    pub top_radius: f32,
    pub inv_height: f32,
}

impl CloudLayerUniform {
    pub fn new(layer: &LayerSettings) -> Self {
        Self {
            planet_radius: layer.planet_radius,
            bottom_radius: layer.bottom_radius(),
            top_radius: layer.top_radius(),
            inv_height: 1.0 / layer.height,
        }
    }
}

/// Camera matrices for the current and previous frame.
///
/// Total size: 3×64 + 3×16 = 240 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CloudViewUniform {
    pub view_proj: [f32; 16],
    pub inv_view_proj: [f32; 16],
    pub prev_view_proj: [f32; 16],
    /// xyz = world position, w unused.
    pub camera_position: [f32; 4],
    pub prev_camera_position: [f32; 4],
    /// (width, height, 1/width, 1/height) of the full-resolution view.
    pub full_resolution: [f32; 4],
}

impl CloudViewUniform {
    pub fn new(
        view_proj: Mat4,
        camera_position: Vec3,
        prev_view_proj: Mat4,
        prev_camera_position: Vec3,
        resolution: UVec2,
    ) -> Self {
        let size = resolution.max(UVec2::ONE).as_vec2();
        Self {
            view_proj: view_proj.to_cols_array(),
            inv_view_proj: view_proj.inverse().to_cols_array(),
            prev_view_proj: prev_view_proj.to_cols_array(),
            camera_position: camera_position.extend(1.0).to_array(),
            prev_camera_position: prev_camera_position.extend(1.0).to_array(),
            full_resolution: [size.x, size.y, 1.0 / size.x, 1.0 / size.y],
        }
    }
}

/// Tracing dispatch parameters.
///
/// Total size: 6×16 + 2×64 = 224 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct TracingUniform {
    /// Tracing texel → full-resolution pixel: (scale, scale, bias.x, bias.y).
    pub scale_bias: [u32; 4],
    /// (width, height, noise frame index, sample-count debug mode).
    pub tracing_size: [u32; 4],
    /// (start max distance, max distance, 1 / distance to max samples,
    /// shadow max distance), meters.
    pub march: [f32; 4],
    /// (max samples, max shadow samples, intersect with opaque, light map
    /// flags). Flag bit 0: shadow map bound, bit 1: sky AO map bound.
    pub counts: [u32; 4],
    /// xyz = direction the sunlight travels, w = shadow strength.
    pub sun_direction: [f32; 4],
    /// rgb = sun illuminance, w = sky AO strength.
    pub sun_illuminance: [f32; 4],
    pub shadow_world_to_clip: [f32; 16],
    pub sky_ao_world_to_clip: [f32; 16],
}

/// Light map flag: a shadow map is bound.
pub const LIGHT_MAP_SHADOW: u32 = 1;
/// Light map flag: a sky AO map is bound.
pub const LIGHT_MAP_SKY_AO: u32 = 2;

/// Reconstruction parameters.
///
/// Total size: 4×16 = 64 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ReconstructUniform {
    /// (dither.x, dither.y, tracing factor, 0).
    pub dither: [u32; 4],
    /// (tracing width, tracing height, reconstruct width, reconstruct height).
    pub sizes: [u32; 4],
    /// (temporal factor, disocclusion threshold, 0, 0).
    pub blend: [f32; 4],
    /// (history width, history height, 0, 0).
    pub history_size: [u32; 4],
}

/// Composition parameters.
///
/// Total size: 4×16 = 64 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ComposeUniform {
    /// (upsampling mode, noise frame index, 0, 0).
    pub mode: [u32; 4],
    /// (width, height, 1/width, 1/height) of the reconstruct buffer.
    pub reconstruct_size: [f32; 4],
    /// (width, height, 1/width, 1/height) of the output target.
    pub output_size: [f32; 4],
    /// (disocclusion threshold, noise scale, 0, 0).
    pub params: [f32; 4],
}

/// Light-map trace parameters.
///
/// Total size: 2×64 + 2×16 = 160 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ShadowTraceUniform {
    pub world_to_clip: [f32; 16],
    pub clip_to_world: [f32; 16],
    /// xyz = march direction, w = far depth in meters.
    pub direction: [f32; 4],
    /// (sample count, resolution, is sky AO, 0).
    pub params: [u32; 4],
}

/// Light-map temporal blend parameters.
///
/// Total size: 2×64 + 16 = 144 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ShadowTemporalUniform {
    pub prev_world_to_clip: [f32; 16],
    pub clip_to_world: [f32; 16],
    /// (weight, history valid, resolution, far depth).
    pub params: [f32; 4],
}

/// Light-map spatial filter parameters.
///
/// Total size: 16 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ShadowFilterUniform {
    pub strength: f32,
    pub min_transmittance_clamp: f32,
    /// 1.0 for sky AO, 0.0 for shadow maps.
    pub is_sky_ao: f32,
    pub inv_resolution: f32,
}

static_assertions::assert_eq_size!(CloudLayerUniform, [u8; 16]);
static_assertions::assert_eq_size!(CloudViewUniform, [u8; 240]);
static_assertions::assert_eq_size!(TracingUniform, [u8; 224]);
static_assertions::assert_eq_size!(ReconstructUniform, [u8; 64]);
static_assertions::assert_eq_size!(ComposeUniform, [u8; 64]);
static_assertions::assert_eq_size!(ShadowTraceUniform, [u8; 160]);
static_assertions::assert_eq_size!(ShadowTemporalUniform, [u8; 144]);
static_assertions::assert_eq_size!(ShadowFilterUniform, [u8; 16]);

/// Create a uniform buffer sized for `T`.
pub(crate) fn create_uniform_buffer<T: Pod>(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: std::mem::size_of::<T>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}
