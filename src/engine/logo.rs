// Title logo sizing
// Width is a share of the screen that grows with the aspect ratio,
// then clamped by the height limits below.

const MIN_HEIGHT_DP: f32 = 40.0;
const MAX_HEIGHT_SHARE: f32 = 0.15;
const MAX_WIDTH_SHARE: f32 = 0.25;

/// Screen size in density-independent pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayMetrics {
    pub width_dp: f32,
    pub height_dp: f32,
    pub density: f32,
}

impl Default for DisplayMetrics {
    /// A 1080p TV
    fn default() -> Self {
        Self {
            width_dp: 960.0,
            height_dp: 540.0,
            density: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogoSize {
    pub width_px: u32,
    pub height_px: u32,
}

fn width_share(aspect: f32) -> f32 {
    if aspect > 8.0 {
        0.18
    } else if aspect > 4.0 {
        0.16
    } else if aspect > 2.0 {
        0.14
    } else {
        0.12
    }
}

impl LogoSize {
    /// Size for a logo with the given intrinsic pixel size, or `None` when
    /// the image reports no dimensions.
    pub fn fit((width, height): (u32, u32), display: &DisplayMetrics) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }

        let aspect = width as f32 / height as f32;
        let target_width = display.width_dp * width_share(aspect);
        let target_height = target_width / aspect;

        let max_width = display.width_dp * MAX_WIDTH_SHARE;
        let max_height = display.height_dp * MAX_HEIGHT_SHARE;

        // max before min: on very small screens the floor wins
        let final_height = target_height.min(max_height).max(MIN_HEIGHT_DP);
        let final_width = if final_height != target_height {
            (final_height * aspect).min(max_width)
        } else {
            target_width.min(max_width)
        };

        let size = Self {
            width_px: (final_width * display.density).round() as u32,
            height_px: (final_height * display.density).round() as u32,
        };

        tracing::debug!(
            "Logo {}x{} ({:.2}:1) -> {}x{}dp",
            width,
            height,
            aspect,
            final_width as u32,
            final_height as u32
        );

        Some(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_logo_hits_height_floor() {
        // 4.5:1 -> 16% of 960 = 153.6dp wide, 34dp tall, raised to 40dp
        let size = LogoSize::fit((900, 200), &DisplayMetrics::default()).unwrap();
        assert_eq!(size, LogoSize { width_px: 360, height_px: 80 });
    }

    #[test]
    fn test_square_logo_capped_by_height() {
        // 1:1 -> 115.2dp square, capped at 15% of 540 = 81dp
        let size = LogoSize::fit((500, 500), &DisplayMetrics::default()).unwrap();
        assert_eq!(size, LogoSize { width_px: 162, height_px: 162 });
    }

    #[test]
    fn test_very_wide_logo_capped_by_width() {
        // 12:1 -> 172.8dp wide, 14.4dp tall, raised to 40dp makes 480dp,
        // capped at 25% of 960 = 240dp
        let size = LogoSize::fit((1200, 100), &DisplayMetrics::default()).unwrap();
        assert_eq!(size, LogoSize { width_px: 480, height_px: 80 });
    }

    #[test]
    fn test_medium_logo_unclamped() {
        let display = DisplayMetrics {
            width_dp: 1920.0,
            height_dp: 1080.0,
            density: 1.0,
        };
        // 3:1 -> 14% of 1920 = 268.8dp wide, 89.6dp tall
        let size = LogoSize::fit((600, 200), &display).unwrap();
        assert_eq!(size, LogoSize { width_px: 269, height_px: 90 });
    }

    #[test]
    fn test_zero_size() {
        assert!(LogoSize::fit((0, 100), &DisplayMetrics::default()).is_none());
    }
}
