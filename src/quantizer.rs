use image::{imageops::ColorMap, Rgb};
use std::collections::HashMap;
use std::iter;
use std::sync::{Mutex, PoisonError};

/// Channel values allowed in a web-safe color.
pub const LEVELS: [u8; 6] = [0, 51, 102, 153, 204, 255];
pub const PALETTE_SIZE: usize = LEVELS.len() * LEVELS.len() * LEVELS.len();

/// The 216 web-safe colors, ordered by red, then green, then blue.
pub static PALETTE: [Rgb<u8>; PALETTE_SIZE] = build_palette();

const fn build_palette() -> [Rgb<u8>; PALETTE_SIZE] {
    let mut palette = [Rgb([0, 0, 0]); PALETTE_SIZE];
    let mut i = 0;
    while i < PALETTE_SIZE {
        palette[i] = Rgb([LEVELS[i / 36], LEVELS[(i / 6) % 6], LEVELS[i % 6]]);
        i += 1;
    }
    palette
}

#[inline]
pub fn is_web_safe_level(value: u8) -> bool {
    value % 51 == 0
}

#[inline]
fn l1_distance(a: Rgb<u8>, b: Rgb<u8>) -> u16 {
    iter::zip(a.0, b.0).map(|(a, b)| a.abs_diff(b) as u16).sum()
}

fn scan_nearest(color: Rgb<u8>) -> Rgb<u8> {
    let mut nearest = PALETTE[0];
    let mut min_dist = l1_distance(color, nearest);
    for &candidate in &PALETTE[1..] {
        let dist = l1_distance(color, candidate);
        if dist < min_dist {
            min_dist = dist;
            nearest = candidate;
        }
    }
    nearest
}

/// Maps arbitrary colors onto the web-safe palette.
///
/// Lookups are memoized per instance. The cache only ever grows and every
/// value in it is a palette color; it sits behind a mutex so a shared
/// quantizer can serve concurrent callers.
#[derive(Debug, Default)]
pub struct ColorQuantizer {
    cache: Mutex<HashMap<[u8; 3], Rgb<u8>>>,
}

impl ColorQuantizer {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn palette(&self) -> &'static [Rgb<u8>] {
        &PALETTE
    }

    /// Palette color with the smallest L1 distance to `color`. On a tie the
    /// color reached first in palette order wins.
    pub fn nearest(&self, color: Rgb<u8>) -> Rgb<u8> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        *cache.entry(color.0).or_insert_with(|| {
            tracing::trace!(?color, "quantizer cache miss");
            scan_nearest(color)
        })
    }

    /// Number of distinct colors resolved so far.
    pub fn cached_len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[inline(always)]
    pub fn get_index(&self, color: Rgb<u8>) -> usize {
        let [r, g, b] = self.nearest(color).0.map(|c| (c / 51) as usize);
        r * 36 + g * 6 + b
    }
}

impl ColorMap for ColorQuantizer {
    type Color = Rgb<u8>;

    #[inline(always)]
    fn index_of(&self, color: &Self::Color) -> usize {
        self.get_index(*color)
    }

    #[inline(always)]
    fn lookup(&self, index: usize) -> Option<Self::Color> {
        PALETTE.get(index).copied()
    }

    fn has_lookup(&self) -> bool {
        true
    }

    #[inline(always)]
    fn map_color(&self, color: &mut Self::Color) {
        *color = self.nearest(*color)
    }
}
