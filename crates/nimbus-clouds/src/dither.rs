//! Sub-tile sample ordering.
//!
//! Each frame the tracing pass covers exactly one sub-position of every
//! `factor × factor` tile. The tables below are Bayer orderings: consecutive
//! frames land far apart within the tile, and `factor²` consecutive frame ids
//! visit every sub-position exactly once.

use glam::UVec2;

/// Frame id → offset for 2×2 tiles.
pub const BAYER_2X2: [[u32; 2]; 4] = [[0, 0], [1, 1], [1, 0], [0, 1]];

/// Frame id → offset for 4×4 tiles.
pub const BAYER_4X4: [[u32; 2]; 16] = [
    [0, 0],
    [2, 2],
    [2, 0],
    [0, 2],
    [1, 1],
    [3, 3],
    [3, 1],
    [1, 3],
    [1, 0],
    [3, 2],
    [3, 0],
    [1, 2],
    [0, 1],
    [2, 3],
    [2, 1],
    [0, 3],
];

/// Number of frames before the pattern repeats.
pub fn cycle_length(factor: u32) -> u32 {
    factor * factor
}

/// Sub-tile offset traced on `frame_id` for the given tracing factor.
///
/// Factor 1 (no subdivision) always yields `(0, 0)`.
pub fn dither_offset(factor: u32, frame_id: u32) -> UVec2 {
    let entry = match factor {
        2 => BAYER_2X2[(frame_id % 4) as usize],
        4 => BAYER_4X4[(frame_id % 16) as usize],
        _ => {
            debug_assert!(factor == 1, "unsupported tracing factor {factor}");
            [0, 0]
        }
    };
    UVec2::new(entry[0], entry[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn visited(factor: u32, start: u32) -> HashSet<UVec2> {
        (start..start + cycle_length(factor))
            .map(|frame| dither_offset(factor, frame))
            .collect()
    }

    #[test]
    fn test_factor_two_is_bijection() {
        let offsets = visited(2, 0);
        assert_eq!(offsets.len(), 4);
        assert!(offsets.iter().all(|o| o.x < 2 && o.y < 2));
    }

    #[test]
    fn test_factor_four_is_bijection() {
        let offsets = visited(4, 0);
        assert_eq!(offsets.len(), 16);
        assert!(offsets.iter().all(|o| o.x < 4 && o.y < 4));
    }

    #[test]
    fn test_any_window_of_cycle_length_is_bijection() {
        // Starting mid-cycle still covers the tile.
        for start in [1, 3, 7, 100] {
            assert_eq!(visited(2, start).len(), 4);
            assert_eq!(visited(4, start).len(), 16);
        }
    }

    #[test]
    fn test_wraparound() {
        assert_eq!(dither_offset(2, 4), dither_offset(2, 0));
        assert_eq!(dither_offset(4, 17), dither_offset(4, 1));
    }

    #[test]
    fn test_factor_one_is_constant() {
        for frame in 0..8 {
            assert_eq!(dither_offset(1, frame), UVec2::ZERO);
        }
        assert_eq!(cycle_length(1), 1);
    }

    #[test]
    fn test_consecutive_offsets_are_spread() {
        // Bayer order never steps to an adjacent texel on the first half cycle.
        let a = dither_offset(4, 0);
        let b = dither_offset(4, 1);
        assert_eq!((b.as_ivec2() - a.as_ivec2()).abs().max_element(), 2);
    }
}
