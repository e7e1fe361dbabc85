use super::config::Config;
use super::corpus::{FlagCorpus, FlagEntry};
use super::engine::NearestNeighborEngine;
use super::error::{FlagError, Result};
use super::metric::{Distance, Metric};
use super::normalizer::{ImageNormalizer, ImageSource};
use image::RgbImage;

/// Identifies flags and compares them against a loaded corpus.
///
/// Every operation takes a method as either a [`Metric`] or one of the names
/// `"mse"`, `"hash"`, `"ssim"`. The method is resolved before anything is
/// fetched or scanned.
#[derive(Debug)]
pub struct FlagIdentificationService {
    engine: NearestNeighborEngine,
    normalizer: ImageNormalizer,
}

impl FlagIdentificationService {
    pub fn new(corpus: FlagCorpus, normalizer: ImageNormalizer) -> Self {
        Self {
            engine: NearestNeighborEngine::new(corpus),
            normalizer,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let corpus = FlagCorpus::load(&config.corpus.manifest)?;
        let normalizer = ImageNormalizer::new(&config.fetch)?;
        Ok(Self::new(corpus, normalizer))
    }

    #[inline]
    pub fn corpus(&self) -> &FlagCorpus {
        self.engine.corpus()
    }

    #[inline]
    pub fn normalizer(&self) -> &ImageNormalizer {
        &self.normalizer
    }

    /// Country whose flag is most similar to the image at `source`.
    pub fn identify<M>(&self, source: &ImageSource, method: M) -> Result<&str>
    where
        M: TryInto<Metric>,
        FlagError: From<M::Error>,
    {
        let metric = method.try_into()?;
        let query = self.normalizer.normalize(source)?;
        Ok(self.engine.identify(&query, metric)?.name())
    }

    /// Country whose flag is most similar to `country`'s, excluding itself.
    pub fn closest_flag<M>(&self, country: &str, method: M) -> Result<&str>
    where
        M: TryInto<Metric>,
        FlagError: From<M::Error>,
    {
        let metric = method.try_into()?;
        Ok(self.engine.closest(country, metric)?.name())
    }

    /// Country whose flag is least similar to `country`'s.
    pub fn farthest_flag<M>(&self, country: &str, method: M) -> Result<&str>
    where
        M: TryInto<Metric>,
        FlagError: From<M::Error>,
    {
        let metric = method.try_into()?;
        Ok(self.engine.farthest(country, metric)?.name())
    }

    pub fn flag_distance<M>(&self, country_a: &str, country_b: &str, method: M) -> Result<Distance>
    where
        M: TryInto<Metric>,
        FlagError: From<M::Error>,
    {
        let metric = method.try_into()?;
        let a = self.corpus().get(country_a)?;
        let b = self.corpus().get(country_b)?;
        Ok(metric.distance(a, b))
    }

    /// Every country name, in corpus order.
    pub fn country_list(&self) -> Vec<&str> {
        self.corpus().list()
    }

    pub fn flag_image(&self, country: &str) -> Result<&RgbImage> {
        self.corpus().get(country).map(|img| img.as_rgb())
    }

    pub fn entries(&self) -> &[FlagEntry] {
        self.corpus().entries()
    }
}
