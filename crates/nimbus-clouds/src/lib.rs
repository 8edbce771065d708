//! Temporally-amortized volumetric clouds.
//!
//! Clouds are ray-marched at a fraction of the view resolution, one
//! sub-position of each tile per frame, then reconstructed against the
//! reprojected previous frame and composited over the scene. Shadow and
//! sky-AO maps are traced through a snapped orthographic projection and
//! consumed by the next frame's trace.

pub mod composition;
pub mod dither;
pub mod history;
pub mod medium;
pub mod reconstruction;
pub mod renderer;
pub mod resolution;
pub mod settings;
pub mod shadow;
pub mod tracing;
pub mod uniforms;

#[cfg(test)]
mod kernel;
#[cfg(test)]
mod test_support;

/// Shared WGSL: layer and view structs, ray/sphere math, hashing.
pub(crate) const COMMON_WGSL: &str = include_str!("shaders/common.wgsl");

pub use composition::{CompositionOutput, CompositionPass, compose_uniform};
pub use history::HistoryState;
pub use medium::{SlabMedium, VolumetricMedium};
pub use reconstruction::{ReconstructVariant, ReconstructionPass};
pub use renderer::{
    CloudFormats, CloudRenderError, CloudRenderer, LightId, LightMapInputs, ViewFrameReport,
    ViewId, ViewInputs, ViewTarget,
};
pub use resolution::{CLOUD_COLOR_FORMAT, CLOUD_DEPTH_FORMAT, VolumetricRenderTarget};
pub use settings::{
    CloudSettings, CloudTargetSettings, LayerSettings, LightMapSettings, ReconstructionMode,
    TracingSettings, UpsamplingMode,
};
pub use shadow::{CloudShadowTemporalState, LIGHT_MAP_FORMAT, LightKind, LightProjection};
pub use tracing::{SunLight, TracingPass};
