//! Runtime settings derived from [`nimbus_config::Config`].
//!
//! Config values are user-facing (kilometers, raw integers); runtime settings
//! are validated, clamped into range, and expressed in meters. Every clamp is
//! logged at `warn`.

use nimbus_config::{CloudConfig, CloudLayerConfig, Config, LightMapConfig};

/// Meters per kilometer.
pub const KM_TO_M: f32 = 1000.0;

/// Most spatial filter iterations applied to a light map.
pub const MAX_FILTER_ITERATIONS: u32 = 4;

/// Smallest light map resolution.
pub const MIN_LIGHT_MAP_RESOLUTION: u32 = 32;

/// Pairing of reconstruct and tracing downsample factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconstructionMode {
    /// Reconstruct at half resolution, trace at half of that.
    #[default]
    HalfResolution,
    /// Reconstruct at full resolution, trace at half.
    FullResolution,
    /// Reconstruct at full resolution, trace at quarter.
    FullResolutionQuarterTrace,
}

impl ReconstructionMode {
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Self::HalfResolution),
            1 => Some(Self::FullResolution),
            2 => Some(Self::FullResolutionQuarterTrace),
            _ => None,
        }
    }

    pub fn index(self) -> u32 {
        match self {
            Self::HalfResolution => 0,
            Self::FullResolution => 1,
            Self::FullResolutionQuarterTrace => 2,
        }
    }

    /// Full resolution ÷ reconstruct resolution.
    pub fn reconstruct_factor(self) -> u32 {
        match self {
            Self::HalfResolution => 2,
            Self::FullResolution | Self::FullResolutionQuarterTrace => 1,
        }
    }

    /// Reconstruct resolution ÷ tracing resolution.
    pub fn tracing_factor(self) -> u32 {
        match self {
            Self::HalfResolution | Self::FullResolution => 2,
            Self::FullResolutionQuarterTrace => 4,
        }
    }

    /// Full resolution ÷ tracing resolution.
    pub fn combined_factor(self) -> u32 {
        self.reconstruct_factor() * self.tracing_factor()
    }
}

/// Kernel used to upsample the reconstructed buffer onto the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpsamplingMode {
    Bilinear,
    BilinearJitter,
    /// Nearest sample with jitter; on depth mismatch, the closest depth in
    /// the 3×3 neighborhood wins.
    NearestJitterDepthTest,
    BilinearJitterKeepClosest,
    /// Depth-weighted bilateral upsampling.
    #[default]
    Bilateral,
}

impl UpsamplingMode {
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Self::Bilinear),
            1 => Some(Self::BilinearJitter),
            2 => Some(Self::NearestJitterDepthTest),
            3 => Some(Self::BilinearJitterKeepClosest),
            4 => Some(Self::Bilateral),
            _ => None,
        }
    }

    pub fn index(self) -> u32 {
        match self {
            Self::Bilinear => 0,
            Self::BilinearJitter => 1,
            Self::NearestJitterDepthTest => 2,
            Self::BilinearJitterKeepClosest => 3,
            Self::Bilateral => 4,
        }
    }
}

/// Per-view volumetric render target settings, consumed by `initialize`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudTargetSettings {
    pub mode: ReconstructionMode,
    pub upsampling_mode: UpsamplingMode,
    /// Weight of reprojected history during reconstruction, in `[0, 1]`.
    pub temporal_factor: f32,
    /// Upsampling jitter magnitude in reconstruct texels, `>= 0`.
    pub noise_scale: f32,
    /// Relative depth difference that rejects history, `> 0`.
    pub disocclusion_threshold: f32,
}

impl Default for CloudTargetSettings {
    fn default() -> Self {
        Self::from_config(&CloudConfig::default())
    }
}

impl CloudTargetSettings {
    pub fn from_config(config: &CloudConfig) -> Self {
        let mode = ReconstructionMode::from_index(config.mode).unwrap_or_else(|| {
            log::warn!("clouds.mode {} out of range, using 0", config.mode);
            ReconstructionMode::HalfResolution
        });
        let upsampling_mode = UpsamplingMode::from_index(config.upsampling_mode)
            .unwrap_or_else(|| {
                log::warn!(
                    "clouds.upsampling_mode {} out of range, using 4",
                    config.upsampling_mode
                );
                UpsamplingMode::Bilateral
            });
        Self {
            mode,
            upsampling_mode,
            temporal_factor: clamp_logged(
                "clouds.temporal_factor",
                config.temporal_factor,
                0.0,
                1.0,
            ),
            noise_scale: clamp_logged("clouds.noise_scale", config.noise_scale, 0.0, 4.0),
            disocclusion_threshold: clamp_logged(
                "clouds.disocclusion_threshold",
                config.disocclusion_threshold,
                1.0e-3,
                10.0,
            ),
        }
    }
}

/// Ray-march limits for the tracing pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TracingSettings {
    pub sample_count_max: u32,
    pub inv_distance_to_sample_count_max: f32,
    pub reflection_sample_count_max: u32,
    pub shadow_sample_count_max: u32,
    pub reflection_shadow_sample_count_max: u32,
    /// Meters.
    pub tracing_start_max_distance: f32,
    /// Meters.
    pub tracing_max_distance: f32,
    /// Meters.
    pub shadow_tracing_max_distance: f32,
    pub intersect_with_opaque: bool,
    pub async_compute: bool,
    /// 0 = off, 1..=5 visualize the sample count.
    pub sample_count_debug_mode: u32,
}

impl TracingSettings {
    pub fn from_config(config: &CloudConfig, sample_count_debug_mode: u32) -> Self {
        Self {
            sample_count_max: config.sample_count_max.max(2),
            inv_distance_to_sample_count_max: 1.0
                / (config.distance_to_sample_count_max_km * KM_TO_M).max(1.0),
            reflection_sample_count_max: config.reflection_sample_count_max.max(2),
            shadow_sample_count_max: config.shadow_sample_count_max.max(2),
            reflection_shadow_sample_count_max: config.reflection_shadow_sample_count_max.max(2),
            tracing_start_max_distance: config.tracing_start_max_distance_km.max(0.0) * KM_TO_M,
            tracing_max_distance: config.tracing_max_distance_km.max(0.0) * KM_TO_M,
            shadow_tracing_max_distance: config.shadow_tracing_max_distance_km.max(0.1) * KM_TO_M,
            intersect_with_opaque: config.intersect_with_opaque,
            async_compute: config.async_compute,
            sample_count_debug_mode: sample_count_debug_mode.min(5),
        }
    }

    /// Primary and shadow sample caps for a view.
    pub fn sample_caps(&self, reflection_capture: bool) -> (u32, u32) {
        if reflection_capture {
            (
                self.reflection_sample_count_max,
                self.reflection_shadow_sample_count_max,
            )
        } else {
            (self.sample_count_max, self.shadow_sample_count_max)
        }
    }
}

/// Shadow map or sky-AO map settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightMapSettings {
    pub enabled: bool,
    pub resolution: u32,
    /// Meters.
    pub snap_length: f32,
    /// Meters; `<= 0` derives the extent from the tracing distances.
    pub override_extent: f32,
    pub strength: f32,
    pub temporal_weight: f32,
    pub rotation_cut_degrees: f32,
    pub filter_iterations: u32,
    pub min_transmittance_clamp: f32,
    pub sample_count: u32,
}

impl LightMapSettings {
    pub fn from_config(name: &str, config: &LightMapConfig) -> Self {
        let resolution = if config.resolution < MIN_LIGHT_MAP_RESOLUTION {
            log::warn!(
                "{name}.resolution {} below minimum, using {MIN_LIGHT_MAP_RESOLUTION}",
                config.resolution
            );
            MIN_LIGHT_MAP_RESOLUTION
        } else {
            config.resolution
        };
        let filter_iterations = if config.filter_iterations > MAX_FILTER_ITERATIONS {
            log::warn!(
                "{name}.filter_iterations {} above maximum, using {MAX_FILTER_ITERATIONS}",
                config.filter_iterations
            );
            MAX_FILTER_ITERATIONS
        } else {
            config.filter_iterations
        };
        Self {
            enabled: config.enabled,
            resolution,
            snap_length: clamp_logged(
                &format!("{name}.snap_length_km"),
                config.snap_length_km,
                0.001,
                f32::MAX,
            ) * KM_TO_M,
            override_extent: config.override_extent_km * KM_TO_M,
            strength: config.strength.max(0.0),
            temporal_weight: clamp_logged(
                &format!("{name}.temporal_weight"),
                config.temporal_weight,
                0.0,
                1.0,
            ),
            rotation_cut_degrees: clamp_logged(
                &format!("{name}.rotation_cut_degrees"),
                config.rotation_cut_degrees,
                0.0,
                180.0,
            ),
            filter_iterations,
            min_transmittance_clamp: clamp_logged(
                &format!("{name}.min_transmittance_clamp"),
                config.min_transmittance_clamp,
                0.0,
                1.0,
            ),
            sample_count: config.sample_count.max(1),
        }
    }
}

/// Cloud layer geometry in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerSettings {
    pub planet_radius: f32,
    pub bottom_altitude: f32,
    pub height: f32,
}

impl LayerSettings {
    pub fn from_config(config: &CloudLayerConfig) -> Self {
        Self {
            planet_radius: config.planet_radius_km.max(1.0) * KM_TO_M,
            bottom_altitude: config.bottom_altitude_km.max(0.0) * KM_TO_M,
            height: config.height_km.max(0.01) * KM_TO_M,
        }
    }

    /// Planet center; the world origin sits on the planet surface, Y up.
    pub fn planet_center(&self) -> glam::Vec3 {
        glam::Vec3::new(0.0, -self.planet_radius, 0.0)
    }

    pub fn bottom_radius(&self) -> f32 {
        self.planet_radius + self.bottom_altitude
    }

    pub fn top_radius(&self) -> f32 {
        self.bottom_radius() + self.height
    }
}

/// Everything the cloud renderer needs from the configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudSettings {
    pub enabled: bool,
    pub target: CloudTargetSettings,
    pub tracing: TracingSettings,
    pub shadow_map: LightMapSettings,
    pub sky_ao: LightMapSettings,
    pub layer: LayerSettings,
}

impl CloudSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            enabled: config.clouds.enabled,
            target: CloudTargetSettings::from_config(&config.clouds),
            tracing: TracingSettings::from_config(&config.clouds, config.debug.sample_count_mode),
            shadow_map: LightMapSettings::from_config("shadow_map", &config.shadow_map),
            sky_ao: LightMapSettings::from_config("sky_ao", &config.sky_ao),
            layer: LayerSettings::from_config(&config.layer),
        }
    }

    /// Half extent (meters) covered by light maps when no override is set.
    pub fn default_light_map_extent(&self) -> f32 {
        self.tracing.tracing_start_max_distance + self.tracing.tracing_max_distance
    }
}

impl Default for CloudSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

fn clamp_logged(name: &str, value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        log::warn!("{name} is NaN, using {min}");
        return min;
    }
    let clamped = value.clamp(min, max);
    if clamped != value {
        log::warn!("{name} {value} out of range, clamped to {clamped}");
    }
    clamped
}
