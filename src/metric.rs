use super::error::FlagError;
use super::normalizer::CanonicalImage;
use image::{imageops, imageops::FilterType, GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// How two canonical images are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Summed squared channel error per pixel.
    Mse,
    /// Hamming distance between 64-bit average hashes.
    Hash,
    /// Mean structural similarity over the three channels.
    Ssim,
}

/// Which way a distance moves as two flags get more alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Minimize,
    Maximize,
}

impl Direction {
    pub fn inverse(self) -> Self {
        match self {
            Self::Minimize => Self::Maximize,
            Self::Maximize => Self::Minimize,
        }
    }

    /// Strict: equal distances never improve.
    #[inline]
    pub fn improves(self, candidate: Distance, best: Distance) -> bool {
        match self {
            Self::Minimize => candidate < best,
            Self::Maximize => candidate > best,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distance {
    Float(f64),
    Bits(u32),
}

impl Distance {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Float(d) => d,
            Self::Bits(d) => d as f64,
        }
    }
}

impl PartialOrd for Distance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Bits(a), Self::Bits(b)) => a.partial_cmp(b),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(d) => write!(f, "{d}"),
            Self::Bits(d) => write!(f, "{d}"),
        }
    }
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Mse, Metric::Hash, Metric::Ssim];

    pub fn name(self) -> &'static str {
        match self {
            Self::Mse => "mse",
            Self::Hash => "hash",
            Self::Ssim => "ssim",
        }
    }

    /// Direction in which a distance means "more similar".
    pub fn direction(self) -> Direction {
        match self {
            Self::Mse | Self::Hash => Direction::Minimize,
            Self::Ssim => Direction::Maximize,
        }
    }

    pub fn distance(self, a: &CanonicalImage, b: &CanonicalImage) -> Distance {
        match self {
            Self::Mse => Distance::Float(mse(a, b)),
            Self::Hash => Distance::Bits(hash_distance(a, b)),
            Self::Ssim => Distance::Float(ssim(a, b)),
        }
    }
}

impl FromStr for Metric {
    type Err = FlagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mse" => Ok(Self::Mse),
            "hash" => Ok(Self::Hash),
            "ssim" => Ok(Self::Ssim),
            _ => Err(FlagError::InvalidMethod {
                method: s.to_string(),
            }),
        }
    }
}

impl TryFrom<&str> for Metric {
    type Error = FlagError;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        name.parse()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sum of squared differences over every channel, divided by the number of
/// pixels (not pixel-channels).
pub fn mse(a: &CanonicalImage, b: &CanonicalImage) -> f64 {
    let (a, b) = (a.as_rgb(), b.as_rgb());
    let err: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&x, &y)| {
            let d = x.abs_diff(y) as u64;
            d * d
        })
        .sum();
    err as f64 / (a.width() as f64 * a.height() as f64)
}

const HASH_SIZE: u32 = 8;

/// ITU-R 601-2 luma in 16-bit fixed point, rounded to nearest.
#[inline]
fn luma_of([r, g, b]: [u8; 3]) -> u8 {
    ((r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16) as u8
}

fn luma(img: &RgbImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        Luma([luma_of(img.get_pixel(x, y).0)])
    })
}

/// 64-bit average hash: grayscale, shrink to 8x8, one bit per cell brighter
/// than the mean. Bit `i` is cell `i` in row-major order.
pub fn average_hash(img: &CanonicalImage) -> u64 {
    let gray = luma(img.as_rgb());
    let small = imageops::resize(&gray, HASH_SIZE, HASH_SIZE, FilterType::Lanczos3);
    let cells = small.as_raw();
    let mean = cells.iter().map(|&c| c as f64).sum::<f64>() / cells.len() as f64;
    cells
        .iter()
        .enumerate()
        .filter(|&(_, &c)| c as f64 > mean)
        .fold(0u64, |hash, (i, _)| hash | 1u64 << i)
}

pub fn hash_distance(a: &CanonicalImage, b: &CanonicalImage) -> u32 {
    (average_hash(a) ^ average_hash(b)).count_ones()
}

const SSIM_WINDOW: u32 = 7;
const SSIM_K1: f64 = 0.01;
const SSIM_K2: f64 = 0.03;
const SSIM_DATA_RANGE: f64 = 255.0;

/// Summed-area table over one per-pixel quantity.
struct Integral {
    stride: usize,
    sums: Vec<u64>,
}

impl Integral {
    fn new<F>(width: u32, height: u32, f: F) -> Self
    where
        F: Fn(u32, u32) -> u64,
    {
        let stride = width as usize + 1;
        let mut sums = vec![0; stride * (height as usize + 1)];
        for y in 0..height {
            let mut row = 0;
            for x in 0..width {
                row += f(x, y);
                let i = (y as usize + 1) * stride + x as usize + 1;
                sums[i] = sums[i - stride] + row;
            }
        }
        Self { stride, sums }
    }

    /// Sum over the square window with its top-left corner at `(x, y)`.
    #[inline]
    fn window(&self, x: u32, y: u32, size: u32) -> u64 {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + size as usize, y0 + size as usize);
        self.sums[y1 * self.stride + x1] + self.sums[y0 * self.stride + x0]
            - self.sums[y0 * self.stride + x1]
            - self.sums[y1 * self.stride + x0]
    }
}

/// Mean SSIM of one channel over every full 7x7 uniform window, using
/// sample covariance.
fn channel_ssim(a: &RgbImage, b: &RgbImage, channel: usize) -> f64 {
    let (width, height) = a.dimensions();
    let at = |img: &RgbImage, x, y| img.get_pixel(x, y)[channel] as u64;
    let sx = Integral::new(width, height, |x, y| at(a, x, y));
    let sy = Integral::new(width, height, |x, y| at(b, x, y));
    let sxx = Integral::new(width, height, |x, y| at(a, x, y) * at(a, x, y));
    let syy = Integral::new(width, height, |x, y| at(b, x, y) * at(b, x, y));
    let sxy = Integral::new(width, height, |x, y| at(a, x, y) * at(b, x, y));

    let np = (SSIM_WINDOW * SSIM_WINDOW) as f64;
    let cov_norm = np / (np - 1.0);
    let c1 = (SSIM_K1 * SSIM_DATA_RANGE).powi(2);
    let c2 = (SSIM_K2 * SSIM_DATA_RANGE).powi(2);

    let mut total = 0.0;
    let mut count = 0usize;
    for y in 0..=height - SSIM_WINDOW {
        for x in 0..=width - SSIM_WINDOW {
            let mean = |s: &Integral| s.window(x, y, SSIM_WINDOW) as f64 / np;
            let (ux, uy) = (mean(&sx), mean(&sy));
            let vx = cov_norm * (mean(&sxx) - ux * ux);
            let vy = cov_norm * (mean(&syy) - uy * uy);
            let vxy = cov_norm * (mean(&sxy) - ux * uy);
            let numerator = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
            let denominator = (ux * ux + uy * uy + c1) * (vx + vy + c2);
            total += numerator / denominator;
            count += 1;
        }
    }
    total / count as f64
}

/// Structural similarity averaged over the R, G and B channels. `1.0` for
/// identical images.
pub fn ssim(a: &CanonicalImage, b: &CanonicalImage) -> f64 {
    let (a, b) = (a.as_rgb(), b.as_rgb());
    (0..3).map(|c| channel_ssim(a, b, c)).sum::<f64>() / 3.0
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::normalizer::{NotCanonical, HEIGHT, WIDTH};
    use crate::quantizer::LEVELS;
    use image::Rgb;

    pub(crate) fn canonical(f: impl Fn(u32, u32) -> [u8; 3]) -> CanonicalImage {
        CanonicalImage::try_from(RgbImage::from_fn(WIDTH, HEIGHT, |x, y| Rgb(f(x, y)))).unwrap()
    }

    pub(crate) fn solid(rgb: [u8; 3]) -> CanonicalImage {
        canonical(|_, _| rgb)
    }

    /// Deterministic noisy web-safe image.
    pub(crate) fn pattern(seed: u32) -> CanonicalImage {
        canonical(|x, y| {
            let h = (x.wrapping_mul(2654435761) ^ y.wrapping_mul(40503) ^ seed.wrapping_mul(97))
                .wrapping_mul(2246822519);
            [
                LEVELS[(h >> 8) as usize % 6],
                LEVELS[(h >> 16) as usize % 6],
                LEVELS[(h >> 24) as usize % 6],
            ]
        })
    }

    fn half_white(vertical: bool) -> CanonicalImage {
        canonical(|x, y| {
            let white = if vertical { x < WIDTH / 2 } else { y < HEIGHT / 2 };
            if white {
                [255, 255, 255]
            } else {
                [0, 0, 0]
            }
        })
    }

    #[test]
    fn metric_names() {
        for metric in Metric::ALL {
            assert_eq!(metric.name().parse::<Metric>().unwrap(), metric);
            assert_eq!(metric.to_string(), metric.name());
        }
        let err = "xyz".parse::<Metric>().unwrap_err();
        assert!(matches!(err, FlagError::InvalidMethod { ref method } if method == "xyz"));
        assert!("MSE".parse::<Metric>().is_err());
    }

    #[test]
    fn directions() {
        assert_eq!(Metric::Mse.direction(), Direction::Minimize);
        assert_eq!(Metric::Hash.direction(), Direction::Minimize);
        assert_eq!(Metric::Ssim.direction(), Direction::Maximize);
        assert_eq!(Direction::Minimize.inverse(), Direction::Maximize);
        let (lo, hi) = (Distance::Float(-1.0), Distance::Float(0.5));
        assert!(Direction::Minimize.improves(lo, hi));
        assert!(Direction::Maximize.improves(hi, lo));
        assert!(!Direction::Minimize.improves(lo, lo));
        assert!(!Direction::Maximize.improves(lo, lo));
    }

    #[test]
    fn identical_images() {
        for seed in 0..3 {
            let img = pattern(seed);
            assert_eq!(Metric::Mse.distance(&img, &img), Distance::Float(0.0));
            assert_eq!(Metric::Hash.distance(&img, &img), Distance::Bits(0));
            let s = Metric::Ssim.distance(&img, &img).as_f64();
            assert!((s - 1.0).abs() < 1e-12, "{s}");
        }
        let s = ssim(&solid([51, 51, 51]), &solid([51, 51, 51]));
        assert!((s - 1.0).abs() < 1e-12, "{s}");
    }

    #[test]
    fn metrics_are_symmetric() {
        let (a, b) = (pattern(1), pattern(2));
        let c = half_white(true);
        for metric in Metric::ALL {
            for (x, y) in [(&a, &b), (&a, &c), (&b, &c)] {
                let (xy, yx) = (metric.distance(x, y), metric.distance(y, x));
                assert!((xy.as_f64() - yx.as_f64()).abs() < 1e-12, "{metric}: {xy} {yx}");
            }
        }
    }

    #[test]
    fn mse_divides_by_pixels() {
        let d = mse(&solid([0, 0, 0]), &solid([51, 0, 0]));
        assert_eq!(d, 2601.0);
        let d = mse(&solid([0, 0, 0]), &solid([51, 51, 51]));
        assert_eq!(d, 3.0 * 2601.0);
    }

    #[test]
    fn average_hash_bits() {
        assert_eq!(average_hash(&solid([0, 0, 0])), 0);
        let left = average_hash(&half_white(true));
        assert_eq!(left, 0x0f0f_0f0f_0f0f_0f0f);
        let top = average_hash(&half_white(false));
        assert_eq!(top, 0x0000_0000_ffff_ffff);
        assert_eq!(
            Metric::Hash.distance(&half_white(true), &half_white(false)),
            Distance::Bits(32)
        );
    }

    #[test]
    fn ssim_range() {
        let s = ssim(&solid([0, 0, 0]), &solid([255, 255, 255]));
        assert!(s > 0.0 && s < 0.01, "{s}");
        let s = ssim(&pattern(1), &pattern(2));
        assert!((-1.0..0.5).contains(&s), "{s}");
        let s = ssim(&half_white(true), &half_white(false));
        assert!((-1.0..1.0).contains(&s), "{s}");
    }

    #[test]
    fn distance_ordering() {
        assert!(Distance::Bits(3) < Distance::Bits(4));
        assert!(Distance::Float(0.25) > Distance::Float(-0.5));
        assert_eq!(Distance::Bits(7).to_string(), "7");
        assert_eq!(Distance::Float(2.5).to_string(), "2.5");
    }

    #[test]
    fn luma_rounds_to_nearest() {
        assert_eq!(luma_of([0, 0, 0]), 0);
        assert_eq!(luma_of([255, 255, 255]), 255);
        assert_eq!(luma_of([102, 102, 102]), 102);
        assert_eq!(luma_of([255, 0, 0]), 76);
        // 29.94 and 89.81 before rounding
        assert_eq!(luma_of([0, 51, 0]), 30);
        assert_eq!(luma_of([0, 153, 0]), 90);
        assert_eq!(luma_of([0, 0, 255]), 29);
        for gray in LEVELS {
            assert_eq!(luma_of([gray; 3]), gray);
        }
    }

    #[test]
    fn helpers_only_see_canonical_sizes() {
        for (w, h) in [(5, 5), (10, 10), (WIDTH, HEIGHT + 1)] {
            let err = CanonicalImage::try_from(RgbImage::new(w, h)).unwrap_err();
            assert_eq!(err, NotCanonical::Size { width: w, height: h });
        }
        let (a, b) = (solid([0, 0, 0]), pattern(3));
        assert!(mse(&a, &b) > 0.0);
        assert!(ssim(&a, &b).is_finite());
        assert_eq!(hash_distance(&a, &a), 0);
    }
}
