//! The participating medium traced by the cloud passes.
//!
//! A medium is WGSL source spliced into the tracing and light-map shaders. It
//! must define:
//!
//! ```wgsl
//! fn medium_extinction(p: vec3<f32>) -> f32   // per meter, world position
//! fn medium_albedo() -> vec3<f32>
//! ```
//!
//! and may read the `cloud_layer: CloudLayer` uniform and the helpers in
//! `common.wgsl`.

use std::borrow::Cow;

/// WGSL source of a volumetric medium.
pub trait VolumetricMedium: Send + Sync {
    /// Short name for logs and pipeline labels.
    fn label(&self) -> &str;

    /// WGSL defining `medium_extinction` and `medium_albedo`.
    fn wgsl(&self) -> Cow<'_, str>;
}

const SLAB_WGSL: &str = include_str!("shaders/medium_slab.wgsl");

/// A horizontal layer filling the cloud shell, shaped by value noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlabMedium {
    /// Fraction of the sky covered, in `[0, 1]`.
    pub coverage: f32,
    /// Peak extinction coefficient, per meter.
    pub extinction_per_meter: f32,
    pub albedo: [f32; 3],
    /// Noise lattice cells per meter.
    pub noise_frequency: f32,
}

impl Default for SlabMedium {
    fn default() -> Self {
        Self {
            coverage: 0.45,
            extinction_per_meter: 0.04,
            albedo: [0.98, 0.98, 0.98],
            noise_frequency: 1.0 / 4000.0,
        }
    }
}

impl VolumetricMedium for SlabMedium {
    fn label(&self) -> &str {
        "slab"
    }

    fn wgsl(&self) -> Cow<'_, str> {
        Cow::Owned(format!(
            "const SLAB_COVERAGE: f32 = {:?};\n\
             const SLAB_EXTINCTION: f32 = {:?};\n\
             const SLAB_ALBEDO: vec3<f32> = vec3<f32>({:?}, {:?}, {:?});\n\
             const SLAB_NOISE_FREQUENCY: f32 = {:?};\n\
             {SLAB_WGSL}",
            self.coverage.clamp(0.0, 1.0),
            self.extinction_per_meter.max(0.0),
            self.albedo[0],
            self.albedo[1],
            self.albedo[2],
            self.noise_frequency,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slab_wgsl_defines_contract() {
        let medium = SlabMedium::default();
        let source = medium.wgsl();
        assert!(source.contains("fn medium_extinction(p: vec3<f32>) -> f32"));
        assert!(source.contains("fn medium_albedo() -> vec3<f32>"));
    }

    #[test]
    fn test_slab_constants_are_float_literals() {
        let medium = SlabMedium {
            coverage: 1.0,
            extinction_per_meter: 2.0,
            albedo: [1.0, 0.5, 0.25],
            noise_frequency: 0.001,
        };
        let source = medium.wgsl();
        // `{:?}` keeps the decimal point so WGSL parses f32, not abstract int.
        assert!(source.contains("const SLAB_COVERAGE: f32 = 1.0;"));
        assert!(source.contains("vec3<f32>(1.0, 0.5, 0.25)"));
    }

    #[test]
    fn test_coverage_is_clamped() {
        let medium = SlabMedium {
            coverage: 3.0,
            ..Default::default()
        };
        assert!(medium.wgsl().contains("const SLAB_COVERAGE: f32 = 1.0;"));
    }
}
