//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Name of the configuration file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.ron";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// View (render target) settings.
    pub window: WindowConfig,
    /// Volumetric cloud tracing, reconstruction, and composition.
    pub clouds: CloudConfig,
    /// Cloud shadow map cast by the atmospheric light.
    pub shadow_map: LightMapConfig,
    /// Cloud occlusion of the sky light.
    pub sky_ao: LightMapConfig,
    /// Cloud layer placement around the planet.
    pub layer: CloudLayerConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// View configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    /// View width in pixels.
    pub width: u32,
    /// View height in pixels.
    pub height: u32,
    /// MSAA sample count of the scene color target (1, 2, 4).
    pub msaa_samples: u32,
}

/// Volumetric cloud render-target configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CloudConfig {
    /// Master toggle.
    pub enabled: bool,
    /// Downsample pairing: 0 = half-res reconstruct + quarter-res trace,
    /// 1 = full-res reconstruct + half-res trace, 2 = full-res reconstruct + quarter-res trace.
    pub mode: u32,
    /// Upsampling kernel used when composing over the scene (0..=4).
    pub upsampling_mode: u32,
    /// Weight of the history sample during reconstruction, in `[0, 1]`.
    pub temporal_factor: f32,
    /// Magnitude of the upsampling jitter, in reconstruct texels.
    pub noise_scale: f32,
    /// Relative depth difference above which history is rejected.
    pub disocclusion_threshold: f32,
    /// Maximum ray-march samples for primary rays.
    pub sample_count_max: u32,
    /// Distance (km) over which the sample count ramps up to `sample_count_max`.
    pub distance_to_sample_count_max_km: f32,
    /// Maximum ray-march samples for primary rays in reflection captures.
    pub reflection_sample_count_max: u32,
    /// Maximum ray-march samples for secondary shadow rays.
    pub shadow_sample_count_max: u32,
    /// Maximum ray-march samples for shadow rays in reflection captures.
    pub reflection_shadow_sample_count_max: u32,
    /// Maximum distance (km) of the layer entry point before tracing is skipped.
    pub tracing_start_max_distance_km: f32,
    /// Maximum distance (km) traced inside the layer.
    pub tracing_max_distance_km: f32,
    /// Maximum distance (km) traced for shadow rays inside the layer.
    pub shadow_tracing_max_distance_km: f32,
    /// Stop tracing behind opaque geometry.
    pub intersect_with_opaque: bool,
    /// Prefer the async compute queue for tracing when the device has one.
    pub async_compute: bool,
}

/// Configuration shared by the cloud shadow map and the cloud sky-AO map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LightMapConfig {
    /// Enable the map.
    pub enabled: bool,
    /// Resolution (width = height) of the map in texels.
    pub resolution: u32,
    /// World-space grid (km) the projection anchor snaps to.
    pub snap_length_km: f32,
    /// Half extent (km) of the map around the anchor; `<= 0` derives it from the tracing distances.
    pub override_extent_km: f32,
    /// Strength of the effect when sampled by the tracer.
    pub strength: f32,
    /// Weight of the previous map during temporal accumulation, in `[0, 1]`.
    pub temporal_weight: f32,
    /// Light rotation (degrees) between two frames above which history is discarded.
    pub rotation_cut_degrees: f32,
    /// Dilation/smoothing iterations after accumulation (0..=4).
    pub filter_iterations: u32,
    /// Lower clamp of the filtered transmittance.
    pub min_transmittance_clamp: f32,
    /// Ray-march sample count (sky-AO only; shadow maps derive theirs from the sun elevation).
    pub sample_count: u32,
}

/// Cloud layer placement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CloudLayerConfig {
    /// Planet radius in kilometers.
    pub planet_radius_km: f32,
    /// Altitude of the layer bottom above the ground in kilometers.
    pub bottom_altitude_km: f32,
    /// Thickness of the layer in kilometers.
    pub height_km: f32,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Per-trace sample count visualization (0 = off, up to 5).
    pub sample_count_mode: u32,
}

// --- Default implementations ---

impl Default for Config {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            clouds: CloudConfig::default(),
            shadow_map: LightMapConfig::shadow_map(),
            sky_ao: LightMapConfig::sky_ao(),
            layer: CloudLayerConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            msaa_samples: 1,
        }
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: 0,
            upsampling_mode: 4,
            temporal_factor: 0.5,
            noise_scale: 0.5,
            disocclusion_threshold: 0.1,
            sample_count_max: 32,
            distance_to_sample_count_max_km: 15.0,
            reflection_sample_count_max: 10,
            shadow_sample_count_max: 10,
            reflection_shadow_sample_count_max: 3,
            tracing_start_max_distance_km: 350.0,
            tracing_max_distance_km: 50.0,
            shadow_tracing_max_distance_km: 10.0,
            intersect_with_opaque: true,
            async_compute: true,
        }
    }
}

impl LightMapConfig {
    /// Defaults for the atmospheric-light shadow map.
    pub fn shadow_map() -> Self {
        Self {
            enabled: true,
            resolution: 512,
            snap_length_km: 20.0,
            override_extent_km: 150.0,
            strength: 0.2,
            temporal_weight: 0.5,
            rotation_cut_degrees: 2.0,
            filter_iterations: 1,
            min_transmittance_clamp: 0.0,
            sample_count: 16,
        }
    }

    /// Defaults for the sky-light ambient occlusion map.
    pub fn sky_ao() -> Self {
        Self {
            enabled: true,
            resolution: 256,
            snap_length_km: 20.0,
            override_extent_km: 150.0,
            strength: 1.0,
            temporal_weight: 0.5,
            rotation_cut_degrees: 2.0,
            filter_iterations: 1,
            min_transmittance_clamp: 0.0,
            sample_count: 10,
        }
    }
}

impl Default for LightMapConfig {
    fn default() -> Self {
        Self::shadow_map()
    }
}

impl Default for CloudLayerConfig {
    fn default() -> Self {
        Self {
            planet_radius_km: 6360.0,
            bottom_altitude_km: 5.0,
            height_km: 10.0,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            sample_count_mode: 0,
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Default config directory for this platform (`<config_dir>/nimbus`).
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("nimbus"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
