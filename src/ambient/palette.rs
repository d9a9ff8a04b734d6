// Palette quantisation
// Median cut over a 5-bit-per-channel histogram, then the resulting
// swatches are scored against HSL targets. Near-black and near-white
// colors never make it into the palette.

use std::collections::HashMap;

pub const DEFAULT_MAX_COLORS: usize = 16;

const BLACK_MAX_LIGHTNESS: f32 = 0.05;
const WHITE_MIN_LIGHTNESS: f32 = 0.95;

const WEIGHT_SATURATION: f32 = 0.24;
const WEIGHT_LIGHTNESS: f32 = 0.52;
const WEIGHT_POPULATION: f32 = 0.24;

/// A palette color and how many sampled pixels it stands for
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Swatch {
    /// Opaque ARGB
    pub argb: u32,
    pub population: u32,
    hsl: [f32; 3],
}

impl Swatch {
    fn new(rgb: [u8; 3], population: u32) -> Self {
        let argb = 0xFF00_0000 | (rgb[0] as u32) << 16 | (rgb[1] as u32) << 8 | rgb[2] as u32;
        Self {
            argb,
            population,
            hsl: rgb_to_hsl(rgb),
        }
    }

    pub fn saturation(&self) -> f32 {
        self.hsl[1]
    }

    pub fn lightness(&self) -> f32 {
        self.hsl[2]
    }
}

/// Acceptable ranges and ideal values for a named swatch
#[derive(Debug, Clone, Copy)]
pub struct Target {
    saturation: (f32, f32, f32),
    lightness: (f32, f32, f32),
}

impl Target {
    pub const DARK_MUTED: Target = Target {
        saturation: (0.0, 0.3, 0.4),
        lightness: (0.0, 0.26, 0.45),
    };
    pub const DARK_VIBRANT: Target = Target {
        saturation: (0.35, 1.0, 1.0),
        lightness: (0.0, 0.26, 0.45),
    };
    pub const MUTED: Target = Target {
        saturation: (0.0, 0.3, 0.4),
        lightness: (0.3, 0.5, 0.7),
    };

    fn accepts(&self, swatch: &Swatch) -> bool {
        let (s_min, _, s_max) = self.saturation;
        let (l_min, _, l_max) = self.lightness;
        (s_min..=s_max).contains(&swatch.saturation())
            && (l_min..=l_max).contains(&swatch.lightness())
    }

    fn score(&self, swatch: &Swatch, max_population: u32) -> f32 {
        let saturation = 1.0 - (swatch.saturation() - self.saturation.1).abs();
        let lightness = 1.0 - (swatch.lightness() - self.lightness.1).abs();
        let population = if max_population > 0 {
            swatch.population as f32 / max_population as f32
        } else {
            0.0
        };
        saturation * WEIGHT_SATURATION
            + lightness * WEIGHT_LIGHTNESS
            + population * WEIGHT_POPULATION
    }
}

#[derive(Debug, Clone, Default)]
pub struct Palette {
    swatches: Vec<Swatch>,
}

impl Palette {
    /// Quantise the given RGB pixels into at most `max_colors` swatches
    pub fn generate(pixels: impl IntoIterator<Item = [u8; 3]>, max_colors: usize) -> Self {
        let mut histogram: HashMap<u16, u32> = HashMap::new();
        for rgb in pixels {
            *histogram.entry(quantize(rgb)).or_insert(0) += 1;
        }

        let colors: Vec<(u16, u32)> = histogram
            .into_iter()
            .filter(|(color, _)| !is_filtered(expand(*color)))
            .collect();

        let swatches = if colors.len() <= max_colors {
            colors
                .into_iter()
                .map(|(color, count)| Swatch::new(expand(color), count))
                .collect()
        } else {
            median_cut(colors, max_colors)
                .into_iter()
                .map(|vbox| vbox.average())
                .collect()
        };

        Self { swatches }
    }

    pub fn is_empty(&self) -> bool {
        self.swatches.is_empty()
    }

    /// Best swatch for a target, if any falls inside its ranges
    pub fn best(&self, target: Target) -> Option<&Swatch> {
        let max_population = self.swatches.iter().map(|s| s.population).max().unwrap_or(0);
        self.swatches
            .iter()
            .filter(|s| target.accepts(s))
            .max_by(|a, b| {
                target
                    .score(a, max_population)
                    .total_cmp(&target.score(b, max_population))
            })
    }

    pub fn dark_muted(&self) -> Option<&Swatch> {
        self.best(Target::DARK_MUTED)
    }

    pub fn dark_vibrant(&self) -> Option<&Swatch> {
        self.best(Target::DARK_VIBRANT)
    }

    pub fn muted(&self) -> Option<&Swatch> {
        self.best(Target::MUTED)
    }
}

fn quantize([r, g, b]: [u8; 3]) -> u16 {
    (((r >> 3) as u16) << 10) | (((g >> 3) as u16) << 5) | ((b >> 3) as u16)
}

fn component(color: u16, channel: usize) -> u8 {
    ((color >> (10 - channel * 5)) & 0x1F) as u8
}

fn widen(value: u8) -> u8 {
    (value << 3) | (value >> 2)
}

fn expand(color: u16) -> [u8; 3] {
    [
        widen(component(color, 0)),
        widen(component(color, 1)),
        widen(component(color, 2)),
    ]
}

fn is_filtered(rgb: [u8; 3]) -> bool {
    let lightness = rgb_to_hsl(rgb)[2];
    lightness <= BLACK_MAX_LIGHTNESS || lightness >= WHITE_MIN_LIGHTNESS
}

/// Hue in degrees, saturation and lightness in 0..=1
pub fn rgb_to_hsl([r, g, b]: [u8; 3]) -> [f32; 3] {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let lightness = (max + min) / 2.0;

    if delta == 0.0 {
        return [0.0, 0.0, lightness];
    }

    let sector = if max == r {
        ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };
    let hue = sector * 60.0;
    let saturation = delta / (1.0 - (2.0 * lightness - 1.0).abs());

    [hue, saturation.clamp(0.0, 1.0), lightness]
}

/// Box in 5-bit color space holding part of the histogram
struct VBox {
    colors: Vec<(u16, u32)>,
}

impl VBox {
    fn range(&self, channel: usize) -> (u8, u8) {
        self.colors
            .iter()
            .map(|(c, _)| component(*c, channel))
            .fold((u8::MAX, u8::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)))
    }

    fn volume(&self) -> u32 {
        (0..3)
            .map(|ch| {
                let (lo, hi) = self.range(ch);
                (hi - lo) as u32 + 1
            })
            .product()
    }

    fn can_split(&self) -> bool {
        self.colors.len() > 1
    }

    /// Split at the population median along the widest channel
    fn split(mut self) -> (VBox, VBox) {
        let channel = (0..3)
            .max_by_key(|&ch| {
                let (lo, hi) = self.range(ch);
                hi - lo
            })
            .unwrap_or(0);

        self.colors.sort_by_key(|(c, _)| component(*c, channel));

        let total: u32 = self.colors.iter().map(|(_, n)| n).sum();
        let mut running = 0;
        let mut split_at = self.colors.len() - 1;
        for (i, (_, n)) in self.colors.iter().enumerate() {
            running += n;
            if running * 2 >= total {
                split_at = i;
                break;
            }
        }
        let split_at = split_at.min(self.colors.len() - 2) + 1;

        let upper = self.colors.split_off(split_at);
        (self, VBox { colors: upper })
    }

    fn average(&self) -> Swatch {
        let mut sums = [0u64; 3];
        let mut population = 0u64;
        for (color, count) in &self.colors {
            let rgb = expand(*color);
            for ch in 0..3 {
                sums[ch] += rgb[ch] as u64 * *count as u64;
            }
            population += *count as u64;
        }
        let population = population.max(1);
        let rgb = [
            (sums[0] / population) as u8,
            (sums[1] / population) as u8,
            (sums[2] / population) as u8,
        ];
        Swatch::new(rgb, population as u32)
    }
}

fn median_cut(colors: Vec<(u16, u32)>, max_colors: usize) -> Vec<VBox> {
    let mut boxes = vec![VBox { colors }];

    while boxes.len() < max_colors {
        let Some(index) = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.can_split())
            .max_by_key(|(_, b)| b.volume())
            .map(|(i, _)| i)
        else {
            break;
        };

        let (lower, upper) = boxes.swap_remove(index).split();
        boxes.push(lower);
        boxes.push(upper);
    }

    boxes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hsl() {
        assert_eq!(rgb_to_hsl([0, 0, 0]), [0.0, 0.0, 0.0]);
        assert_eq!(rgb_to_hsl([255, 0, 0]), [0.0, 1.0, 0.5]);
        let [h, s, l] = rgb_to_hsl([0, 0, 255]);
        assert_eq!(h, 240.0);
        assert_eq!(s, 1.0);
        assert_eq!(l, 0.5);
    }

    #[test]
    fn test_black_and_white_are_filtered() {
        let pixels = std::iter::repeat([0, 0, 0])
            .take(50)
            .chain(std::iter::repeat([255, 255, 255]).take(50));
        assert!(Palette::generate(pixels, DEFAULT_MAX_COLORS).is_empty());
    }

    #[test]
    fn test_few_colors_kept_exactly() {
        let pixels = std::iter::repeat([64, 48, 40])
            .take(30)
            .chain(std::iter::repeat([200, 30, 30]).take(10));
        let palette = Palette::generate(pixels, DEFAULT_MAX_COLORS);

        assert_eq!(palette.swatches.len(), 2);
        let total: u32 = palette.swatches.iter().map(|s| s.population).sum();
        assert_eq!(total, 40);
    }

    #[test]
    fn test_median_cut_limits_colors() {
        let pixels: Vec<[u8; 3]> = (0..=255u8)
            .step_by(4)
            .flat_map(|r| (0..=255u8).step_by(32).map(move |g| [r, g, 128]))
            .collect();
        let count = pixels.len() as u32;
        let palette = Palette::generate(pixels, DEFAULT_MAX_COLORS);

        assert_eq!(palette.swatches.len(), DEFAULT_MAX_COLORS);
        let total: u32 = palette.swatches.iter().map(|s| s.population).sum();
        assert!(total <= count);
    }

    #[test]
    fn test_dark_muted_target() {
        // Dark desaturated brown dominates, a bright saturated red is present
        let pixels = std::iter::repeat([70, 55, 45])
            .take(80)
            .chain(std::iter::repeat([220, 20, 20]).take(20));
        let palette = Palette::generate(pixels, DEFAULT_MAX_COLORS);

        let swatch = palette.dark_muted().unwrap();
        assert_eq!(swatch.population, 80);
        assert!(swatch.lightness() < 0.45);
        assert!(palette.muted().is_none());
    }

    #[test]
    fn test_dark_vibrant_target() {
        let palette = Palette::generate(std::iter::repeat([10, 30, 120]).take(10), 16);
        assert!(palette.dark_muted().is_none());
        assert!(palette.dark_vibrant().is_some());
    }
}
