//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::Dimensions;

/// Widths to generate for an image under the breakpoint rule.
///
/// 1. `max` is the first breakpoint at or above the natural width, or the
///    largest breakpoint when the image is wider than all of them.
/// 2. Every breakpoint up to and including `max` is kept.
/// 3. If only one width survives, `max / 2` is prepended so `srcset` always
///    offers a choice.
///
/// Breakpoints may be given in any order; duplicates collapse.
///
/// # Examples
/// ```
/// # use postpress::imaging::target_widths;
/// assert_eq!(target_widths(1000, &[400, 800, 1600]), vec![400, 800, 1600]);
/// assert_eq!(target_widths(300, &[400, 800, 1600]), vec![200, 400]);
/// ```
pub fn target_widths(natural_width: u32, breakpoints: &[u32]) -> Vec<u32> {
    let mut sorted: Vec<u32> = breakpoints.iter().copied().filter(|&w| w > 0).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let Some(&largest) = sorted.last() else {
        return Vec::new();
    };
    let max = sorted
        .iter()
        .copied()
        .find(|&w| w >= natural_width)
        .unwrap_or(largest);

    let mut widths: Vec<u32> = sorted.into_iter().filter(|&w| w <= max).collect();
    if widths.len() == 1 && max / 2 > 0 {
        widths.insert(0, max / 2);
    }
    widths
}

/// Height for `width` at the natural aspect ratio, rounded, at least 1.
pub fn scaled_height(natural: Dimensions, width: u32) -> u32 {
    if natural.width == 0 {
        return natural.height.max(1);
    }
    let height = (natural.height as f64 * width as f64 / natural.width as f64).round() as u32;
    height.max(1)
}

/// Width for `height` at the natural aspect ratio, rounded, at least 1.
pub fn scaled_width(natural: Dimensions, height: u32) -> u32 {
    if natural.height == 0 {
        return natural.width.max(1);
    }
    let width = (natural.width as f64 * height as f64 / natural.height as f64).round() as u32;
    width.max(1)
}

/// Pixel size a derivative is actually encoded at: the target width, capped
/// at the natural width so nothing is upscaled.
pub fn encode_dimensions(natural: Dimensions, target_width: u32) -> Dimensions {
    let width = target_width.min(natural.width).max(1);
    Dimensions {
        width,
        height: scaled_height(natural, width),
    }
}

/// Display size for the density profile.
///
/// Explicit `w`/`h` hints win; a single hint derives the other side from the
/// aspect ratio; with neither, the image is shown at `min(max_width, natural)`.
pub fn display_size(
    natural: Dimensions,
    hint_width: Option<u32>,
    hint_height: Option<u32>,
    max_width: u32,
) -> Dimensions {
    match (hint_width, hint_height) {
        (Some(width), Some(height)) => Dimensions { width, height },
        (Some(width), None) => Dimensions {
            width,
            height: scaled_height(natural, width),
        },
        (None, Some(height)) => Dimensions {
            width: scaled_width(natural, height),
            height,
        },
        (None, None) => {
            let width = max_width.min(natural.width).max(1);
            Dimensions {
                width,
                height: scaled_height(natural, width),
            }
        }
    }
}

/// Width of the single double-resolution derivative: twice the display
/// width, capped at the natural width.
pub fn density_width(display_width: u32, natural_width: u32) -> u32 {
    display_width.saturating_mul(2).min(natural_width).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BREAKPOINTS: [u32; 3] = [400, 800, 1600];

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    // =========================================================================
    // target_widths tests
    // =========================================================================

    #[test]
    fn widths_between_breakpoints() {
        assert_eq!(target_widths(1000, &BREAKPOINTS), vec![400, 800, 1600]);
    }

    #[test]
    fn widths_below_smallest_breakpoint_get_half_width() {
        assert_eq!(target_widths(300, &BREAKPOINTS), vec![200, 400]);
    }

    #[test]
    fn widths_boundary_is_inclusive() {
        assert_eq!(target_widths(400, &BREAKPOINTS), vec![200, 400]);
        assert_eq!(target_widths(800, &BREAKPOINTS), vec![400, 800]);
    }

    #[test]
    fn widths_above_largest_breakpoint() {
        assert_eq!(target_widths(2000, &BREAKPOINTS), vec![400, 800, 1600]);
    }

    #[test]
    fn widths_unsorted_breakpoints() {
        assert_eq!(target_widths(1000, &[1600, 400, 800, 400]), vec![400, 800, 1600]);
    }

    #[test]
    fn widths_single_breakpoint() {
        assert_eq!(target_widths(5000, &[1200]), vec![600, 1200]);
    }

    #[test]
    fn widths_empty_breakpoints() {
        assert!(target_widths(1000, &[]).is_empty());
    }

    // =========================================================================
    // dimension helpers
    // =========================================================================

    #[test]
    fn scaled_height_rounds() {
        // 1000x667 at 400 → 266.8 → 267
        assert_eq!(scaled_height(dims(1000, 667), 400), 267);
        assert_eq!(scaled_height(dims(300, 200), 400), 267);
    }

    #[test]
    fn scaled_height_never_zero() {
        assert_eq!(scaled_height(dims(4000, 1), 10), 1);
    }

    #[test]
    fn encode_dimensions_never_upscale() {
        assert_eq!(encode_dimensions(dims(300, 200), 400), dims(300, 200));
        assert_eq!(encode_dimensions(dims(300, 200), 200), dims(200, 133));
    }

    // =========================================================================
    // density profile
    // =========================================================================

    #[test]
    fn display_size_defaults_to_max_width() {
        assert_eq!(display_size(dims(2000, 1000), None, None, 800), dims(800, 400));
    }

    #[test]
    fn display_size_small_image_keeps_natural_width() {
        assert_eq!(display_size(dims(500, 250), None, None, 800), dims(500, 250));
    }

    #[test]
    fn display_size_from_width_hint() {
        assert_eq!(display_size(dims(2000, 1000), Some(300), None, 800), dims(300, 150));
    }

    #[test]
    fn display_size_from_height_hint() {
        assert_eq!(display_size(dims(2000, 1000), None, Some(100), 800), dims(200, 100));
    }

    #[test]
    fn display_size_both_hints_win() {
        assert_eq!(
            display_size(dims(2000, 1000), Some(320), Some(320), 800),
            dims(320, 320)
        );
    }

    #[test]
    fn density_width_doubles_and_caps() {
        assert_eq!(density_width(400, 2000), 800);
        assert_eq!(density_width(800, 1200), 1200);
    }
}
