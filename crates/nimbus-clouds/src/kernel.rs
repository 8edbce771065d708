//! CPU reference for the per-texel math of the reconstruction, composition
//! and light-map filter shaders.
//!
//! The pass tests compare GPU readbacks against these functions, and the
//! scheduling scenarios use them to reason about convergence without a GPU.

use glam::{Mat4, UVec2, Vec2, Vec3, Vec4, Vec4Swizzles};

/// Distance stored for texels with nothing in front of the far plane.
pub(crate) const FAR_DEPTH: f32 = 1.0e9;

/// Lower bound for relative depth comparisons.
const DEPTH_EPSILON: f32 = 1.0e-3;

/// A reconstruct texel: premultiplied luminance + transmittance, and front
/// distance in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CloudSample {
    pub color: Vec4,
    pub depth: f32,
}

impl CloudSample {
    /// Fully transparent, nothing in front of the far plane.
    pub const EMPTY: Self = Self {
        color: Vec4::new(0.0, 0.0, 0.0, 1.0),
        depth: FAR_DEPTH,
    };
}

/// A history texel fetched at the reprojected position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct HistoryTexel {
    pub sample: CloudSample,
    pub uv: Vec2,
    /// Distance from the previous camera to the reprojected point.
    pub expected_depth: f32,
}

/// Whether reconstruct texel `coord` is the sub-position traced this frame.
pub(crate) fn is_dither_texel(coord: UVec2, factor: u32, dither: UVec2) -> bool {
    coord % factor.max(1) == dither
}

/// Tracing texel whose tile contains reconstruct texel `coord`.
pub(crate) fn tracing_coord_for(coord: UVec2, factor: u32, tracing_size: UVec2) -> UVec2 {
    (coord / factor.max(1)).min(tracing_size.max(UVec2::ONE) - UVec2::ONE)
}

/// Whether `uv` lies inside a texture of `size` texels, edges inset by half a
/// texel.
pub(crate) fn uv_in_valid_bounds(uv: Vec2, size: UVec2) -> bool {
    let half_texel = Vec2::splat(0.5) / size.max(UVec2::ONE).as_vec2();
    uv.cmpge(half_texel).all() && uv.cmple(Vec2::ONE - half_texel).all()
}

/// Whether history at `history_depth` no longer matches the surface expected
/// at `expected_depth`.
pub(crate) fn is_disoccluded(history_depth: f32, expected_depth: f32, threshold: f32) -> bool {
    let relative = (history_depth - expected_depth).abs() / expected_depth.max(DEPTH_EPSILON);
    relative > threshold
}

/// Blend a reprojected history value into the nearest traced value.
/// `temporal_factor` is the history weight.
pub(crate) fn temporal_blend(traced: Vec4, history: Vec4, temporal_factor: f32) -> Vec4 {
    traced.lerp(history, temporal_factor.clamp(0.0, 1.0))
}

/// Normalized view ray through `uv` (reverse-Z: depth 1 is the near plane).
pub(crate) fn view_ray(inv_view_proj: Mat4, camera: Vec3, uv: Vec2) -> Vec3 {
    let ndc = Vec2::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0);
    (inv_view_proj.project_point3(ndc.extend(1.0)) - camera).normalize()
}

/// Reproject the traced point along `dir` at `depth` into the previous frame.
///
/// Far samples reproject as directions. Returns the history UV and the
/// distance expected there, or `None` when the point falls behind the
/// previous camera.
pub(crate) fn reproject(
    dir: Vec3,
    depth: f32,
    camera: Vec3,
    prev_camera: Vec3,
    prev_view_proj: Mat4,
) -> Option<(Vec2, f32)> {
    let (clip, expected_depth) = if depth >= FAR_DEPTH {
        (prev_view_proj * dir.extend(0.0), FAR_DEPTH)
    } else {
        let world = camera + dir * depth;
        (prev_view_proj * world.extend(1.0), world.distance(prev_camera))
    };
    if clip.w <= 0.0 {
        return None;
    }
    let ndc = clip.xy() / clip.w;
    Some((
        Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5),
        expected_depth,
    ))
}

/// Reconstruct one texel.
///
/// `nearest` is the traced value of the containing tile. History is rejected
/// when its UV is out of bounds, or when its depth does not match the
/// expected distance unless both lie on the far plane.
#[allow(clippy::too_many_arguments)]
pub(crate) fn reconstruct_texel(
    coord: UVec2,
    factor: u32,
    dither: UVec2,
    nearest: CloudSample,
    history: Option<HistoryTexel>,
    history_size: UVec2,
    temporal_factor: f32,
    disocclusion_threshold: f32,
) -> CloudSample {
    if is_dither_texel(coord, factor, dither) {
        return nearest;
    }
    let Some(history) = history else {
        return nearest;
    };
    let both_far = history.sample.depth >= FAR_DEPTH && history.expected_depth >= FAR_DEPTH;
    let disoccluded = !both_far
        && is_disoccluded(
            history.sample.depth,
            history.expected_depth,
            disocclusion_threshold,
        );
    if !uv_in_valid_bounds(history.uv, history_size) || disoccluded {
        return nearest;
    }
    CloudSample {
        color: temporal_blend(nearest.color, history.sample.color, temporal_factor),
        depth: history.sample.depth.min(nearest.depth),
    }
}

/// `dest = src.rgb + dest · src.a`.
pub(crate) fn compose(src: Vec4, dest: Vec3) -> Vec3 {
    src.truncate() + dest * src.w
}

/// One spatial filter step: mix the center with the mean of its four
/// neighbors. Sky AO additionally clamps to `min_transmittance`.
pub(crate) fn filter_texel(
    center: f32,
    neighbors: [f32; 4],
    strength: f32,
    min_transmittance: Option<f32>,
) -> f32 {
    let mean = neighbors.iter().sum::<f32>() * 0.25;
    let filtered = center + (mean - center) * strength;
    match min_transmittance {
        Some(min) => filtered.max(min),
        None => filtered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(value: f32, depth: f32) -> CloudSample {
        CloudSample {
            color: Vec4::new(value, value, value, 1.0 - value),
            depth,
        }
    }

    fn history(value: f32, depth: f32, uv: Vec2, expected_depth: f32) -> Option<HistoryTexel> {
        Some(HistoryTexel {
            sample: sample(value, depth),
            uv,
            expected_depth,
        })
    }

    #[test]
    fn test_dither_texel_selection() {
        assert!(is_dither_texel(UVec2::new(4, 6), 2, UVec2::new(0, 0)));
        assert!(is_dither_texel(UVec2::new(5, 7), 2, UVec2::new(1, 1)));
        assert!(!is_dither_texel(UVec2::new(5, 6), 2, UVec2::new(1, 1)));
        // Factor 1: every texel is traced.
        assert!(is_dither_texel(UVec2::new(3, 9), 1, UVec2::ZERO));
    }

    #[test]
    fn test_tracing_coord_is_clamped() {
        let size = UVec2::new(3, 2);
        assert_eq!(tracing_coord_for(UVec2::new(5, 3), 2, size), UVec2::new(2, 1));
        assert_eq!(tracing_coord_for(UVec2::new(6, 4), 2, size), UVec2::new(2, 1));
    }

    #[test]
    fn test_valid_bounds_inset() {
        let size = UVec2::new(10, 10);
        assert!(uv_in_valid_bounds(Vec2::splat(0.5), size));
        assert!(uv_in_valid_bounds(Vec2::splat(0.05), size));
        assert!(!uv_in_valid_bounds(Vec2::splat(0.04), size));
        assert!(!uv_in_valid_bounds(Vec2::new(0.5, 0.96), size));
        assert!(!uv_in_valid_bounds(Vec2::new(-0.1, 0.5), size));
    }

    #[test]
    fn test_disocclusion_is_relative() {
        assert!(!is_disoccluded(1050.0, 1000.0, 0.1));
        assert!(is_disoccluded(1200.0, 1000.0, 0.1));
        assert!(!is_disoccluded(105_000.0, 100_000.0, 0.1));
    }

    #[test]
    fn test_dither_texel_takes_fresh_value() {
        let fresh = sample(0.8, 500.0);
        let out = reconstruct_texel(
            UVec2::new(1, 1),
            2,
            UVec2::new(1, 1),
            fresh,
            history(0.2, 500.0, Vec2::splat(0.5), 500.0),
            UVec2::splat(64),
            0.9,
            0.1,
        );
        assert_eq!(out, fresh);
    }

    #[test]
    fn test_history_is_blended() {
        let fresh = sample(1.0, 500.0);
        let out = reconstruct_texel(
            UVec2::new(0, 1),
            2,
            UVec2::new(1, 1),
            fresh,
            history(0.0, 500.0, Vec2::splat(0.5), 500.0),
            UVec2::splat(64),
            0.75,
            0.1,
        );
        assert!((out.color.x - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_far_history_survives_depth_test() {
        let fresh = sample(1.0, FAR_DEPTH);
        let out = reconstruct_texel(
            UVec2::new(0, 1),
            2,
            UVec2::ZERO,
            fresh,
            history(0.0, FAR_DEPTH, Vec2::splat(0.5), FAR_DEPTH),
            UVec2::splat(64),
            0.5,
            0.1,
        );
        assert!((out.color.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_history_rejected_falls_back_to_nearest() {
        let fresh = sample(1.0, 500.0);
        let size = UVec2::splat(64);
        let out_of_bounds = history(0.0, 500.0, Vec2::new(1.2, 0.5), 500.0);
        let disoccluded = history(0.0, 900.0, Vec2::splat(0.5), 500.0);
        let near_over_far = history(0.0, 100.0, Vec2::splat(0.5), FAR_DEPTH);
        for history in [out_of_bounds, disoccluded, near_over_far, None] {
            let out = reconstruct_texel(
                UVec2::new(0, 1),
                2,
                UVec2::ZERO,
                fresh,
                history,
                size,
                0.9,
                0.1,
            );
            assert_eq!(out, fresh);
        }
    }

    #[test]
    fn test_reproject_static_camera_keeps_uv() {
        let view_proj = Mat4::perspective_infinite_reverse_rh(1.0, 1.0, 0.1)
            * Mat4::look_to_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let uv = Vec2::new(0.3, 0.7);
        let dir = view_ray(view_proj.inverse(), Vec3::ZERO, uv);
        for depth in [250.0, FAR_DEPTH] {
            let (reprojected, expected) =
                reproject(dir, depth, Vec3::ZERO, Vec3::ZERO, view_proj).unwrap();
            assert!(reprojected.abs_diff_eq(uv, 1e-4));
            assert!((expected - depth).abs() / depth < 1e-4);
        }
    }

    #[test]
    fn test_reproject_behind_previous_camera_is_rejected() {
        let view_proj = Mat4::perspective_infinite_reverse_rh(1.0, 1.0, 0.1)
            * Mat4::look_to_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        assert!(reproject(Vec3::Z, 100.0, Vec3::ZERO, Vec3::ZERO, view_proj).is_none());
        assert!(reproject(Vec3::Z, FAR_DEPTH, Vec3::ZERO, Vec3::ZERO, view_proj).is_none());
    }

    #[test]
    fn test_compose_attenuates_and_adds() {
        let dest = Vec3::new(0.5, 0.5, 0.5);
        // Fully transparent cloud leaves the scene unchanged.
        assert_eq!(compose(Vec4::new(0.0, 0.0, 0.0, 1.0), dest), dest);
        // Opaque cloud replaces it.
        assert_eq!(compose(Vec4::new(0.3, 0.2, 0.1, 0.0), dest), Vec3::new(0.3, 0.2, 0.1));
        let half = compose(Vec4::new(0.1, 0.1, 0.1, 0.5), dest);
        assert!((half.x - 0.35).abs() < 1e-6);
    }

    #[test]
    fn test_filter_texel_and_sky_clamp() {
        let smoothed = filter_texel(1.0, [0.0; 4], 0.5, None);
        assert_eq!(smoothed, 0.5);
        assert_eq!(filter_texel(0.0, [0.0; 4], 1.0, Some(0.3)), 0.3);
    }
}
