// Ambient color extraction - derives edge gradient colors from backdrops

pub mod gradient;
pub mod palette;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use gradient::OPAQUE_BLACK;
use palette::{Palette, DEFAULT_MAX_COLORS};

/// How the backdrop is partitioned for sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regions {
    Single,
    #[default]
    Split,
}

impl Regions {
    pub fn count(&self) -> usize {
        match self {
            Regions::Single => 1,
            Regions::Split => 2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AmbientExtractor {
    regions: Regions,
    sample_size: u32,
}

impl AmbientExtractor {
    pub fn new(regions: Regions, sample_size: u32) -> Self {
        Self {
            regions,
            sample_size: sample_size.max(2),
        }
    }

    /// One ARGB color per region, left to right
    pub fn extract(&self, image: &RgbaImage) -> Vec<u32> {
        if image.width() == 0 || image.height() == 0 {
            return vec![OPAQUE_BLACK; self.regions.count()];
        }

        let sample = imageops::resize(
            image,
            self.sample_size,
            self.sample_size,
            FilterType::Triangle,
        );

        match self.regions {
            Regions::Single => vec![dominant_color(&sample)],
            Regions::Split => {
                let half = sample.width() / 2;
                let left = imageops::crop_imm(&sample, 0, 0, half, sample.height()).to_image();
                let right = imageops::crop_imm(&sample, half, 0, sample.width() - half, sample.height())
                    .to_image();
                vec![dominant_color(&left), dominant_color(&right)]
            }
        }
    }
}

/// Dark muted swatch, falling back to dark vibrant, muted, then black
pub fn dominant_color(image: &RgbaImage) -> u32 {
    let pixels = image
        .pixels()
        .filter(|p| p.0[3] >= 128)
        .map(|p| [p.0[0], p.0[1], p.0[2]]);
    let palette = Palette::generate(pixels, DEFAULT_MAX_COLORS);
    if palette.is_empty() {
        return OPAQUE_BLACK;
    }

    palette
        .dark_muted()
        .or_else(|| palette.dark_vibrant())
        .or_else(|| palette.muted())
        .map(|swatch| swatch.argb)
        .unwrap_or(OPAQUE_BLACK)
}
