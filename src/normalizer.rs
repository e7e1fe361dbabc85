use super::config::FetchConfig;
use super::error::{FlagError, Result};
use super::quantizer::{is_web_safe_level, ColorQuantizer};
use image::{imageops, imageops::ColorMap, imageops::FilterType, DynamicImage, RgbImage};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const WIDTH: u32 = 180;
pub const HEIGHT: u32 = 90;
pub const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

/// A flag at the fixed comparison resolution with every channel on a
/// web-safe level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalImage(RgbImage);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NotCanonical {
    #[error("expected 180x90 pixels, got {width}x{height}")]
    Size { width: u32, height: u32 },
    #[error("pixel ({x}, {y}) = {rgb:?} is not a web-safe color")]
    Color { x: u32, y: u32, rgb: [u8; 3] },
}

impl TryFrom<RgbImage> for CanonicalImage {
    type Error = NotCanonical;

    fn try_from(img: RgbImage) -> std::result::Result<Self, Self::Error> {
        if img.dimensions() != (WIDTH, HEIGHT) {
            return Err(NotCanonical::Size {
                width: img.width(),
                height: img.height(),
            });
        }
        if let Some((x, y, p)) = img
            .enumerate_pixels()
            .find(|(_, _, p)| !p.0.iter().all(|&c| is_web_safe_level(c)))
        {
            return Err(NotCanonical::Color { x, y, rgb: p.0 });
        }
        Ok(Self(img))
    }
}

impl CanonicalImage {
    #[inline]
    pub fn as_rgb(&self) -> &RgbImage {
        &self.0
    }

    pub fn into_rgb(self) -> RgbImage {
        self.0
    }
}

/// Where an image to be identified comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Url(String),
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl ImageSource {
    /// `http(s)://` inputs are URLs, anything else is a local path.
    pub fn parse(input: &str) -> Self {
        let lower = input.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Url(input.to_string())
        } else {
            Self::Path(PathBuf::from(input))
        }
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for ImageSource {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

/// Turns arbitrary flag images into [`CanonicalImage`]s.
#[derive(Debug)]
pub struct ImageNormalizer {
    quantizer: ColorQuantizer,
    client: reqwest::blocking::Client,
}

impl ImageNormalizer {
    pub fn new(fetch: &FetchConfig) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(fetch.timeout_secs))
            .user_agent(fetch.user_agent.as_str());
        if !fetch.system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build().map_err(FlagError::HttpClient)?;
        Ok(Self {
            quantizer: ColorQuantizer::new(),
            client,
        })
    }

    #[inline]
    pub fn quantizer(&self) -> &ColorQuantizer {
        &self.quantizer
    }

    pub fn normalize(&self, source: &ImageSource) -> Result<CanonicalImage> {
        match source {
            ImageSource::Url(url) => {
                let bytes = self.fetch(url)?;
                self.normalize_bytes(&bytes)
            }
            ImageSource::Path(path) => {
                let bytes = std::fs::read(path).map_err(|source| FlagError::Io {
                    path: path.clone(),
                    source,
                })?;
                self.normalize_bytes(&bytes)
            }
            ImageSource::Bytes(bytes) => self.normalize_bytes(bytes),
        }
    }

    pub fn normalize_bytes(&self, bytes: &[u8]) -> Result<CanonicalImage> {
        let img = image::load_from_memory(bytes)?;
        Ok(self.normalize_image(&img))
    }

    /// Converts to RGB, stretches to the canonical size and snaps every
    /// pixel to the web-safe palette.
    pub fn normalize_image(&self, img: &DynamicImage) -> CanonicalImage {
        let rgb = img.to_rgb8();
        let mut resized = imageops::resize(&rgb, WIDTH, HEIGHT, RESIZE_FILTER);
        resized
            .pixels_mut()
            .for_each(|p| self.quantizer.map_color(p));
        CanonicalImage(resized)
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        tracing::debug!(url, "fetching image");
        let network = |source| FlagError::Network {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FlagError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().map_err(network)?;
        Ok(bytes.to_vec())
    }
}
