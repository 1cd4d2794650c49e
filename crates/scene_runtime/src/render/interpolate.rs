//! Keyframe interpolation
//!
//! Maps a blend factor onto an ordered, non-decreasing key sequence: which
//! two adjacent keys bracket it, and how far between them it sits.

use crate::foundation::math::utils;

/// Pair of adjacent keyframes around a blend factor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    /// Index of the lower keyframe
    pub lower: usize,
    /// Index of the upper keyframe, always `lower + 1`
    pub upper: usize,
    /// Position between the two keys in `[0, 1]`
    pub factor: f32,
}

/// Find the keyframes bracketing `factor`
///
/// The factor is clamped to the key range. At or below the first key the
/// first pair is used, at or above the last key the last pair. Otherwise the
/// keys are scanned from the end for the first one strictly below the factor,
/// which makes repeated keys resolve to the earliest declared pair.
///
/// Returns `None` for fewer than two keys.
pub fn bracket(keys: &[f32], factor: f32) -> Option<Bracket> {
    if keys.len() < 2 {
        return None;
    }
    let last_index = keys.len() - 1;
    let (first, last) = (keys[0], keys[last_index]);
    let factor = utils::clamp(factor, first, last);

    // Zero-width boundary spans resolve to the key the factor sits on.
    let (lower, degenerate) = if factor <= first {
        (0, 0.0)
    } else if factor >= last {
        (last_index - 1, 1.0)
    } else {
        let lower = (0..last_index).rev().find(|&i| keys[i] < factor).unwrap_or(0);
        (lower, 0.0)
    };
    let upper = lower + 1;

    let span = keys[upper] - keys[lower];
    let local = if span > 0.0 {
        utils::clamp((factor - keys[lower]) / span, 0.0, 1.0)
    } else {
        degenerate
    };

    Some(Bracket {
        lower,
        upper,
        factor: local,
    })
}
