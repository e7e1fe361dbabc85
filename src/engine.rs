use super::corpus::{title_case, FlagCorpus, FlagEntry};
use super::error::{FlagError, Result};
use super::metric::{Direction, Distance, Metric};
use super::normalizer::CanonicalImage;

/// A corpus entry together with its distance to the query.
#[derive(Debug, Clone, Copy)]
pub struct Match<'a> {
    pub entry: &'a FlagEntry,
    pub distance: Distance,
}

impl<'a> Match<'a> {
    #[inline]
    pub fn name(&self) -> &'a str {
        self.entry.name()
    }
}

/// Exhaustive search over a [`FlagCorpus`]. Every query is a single linear
/// scan in corpus order.
#[derive(Debug)]
pub struct NearestNeighborEngine {
    corpus: FlagCorpus,
}

impl NearestNeighborEngine {
    pub fn new(corpus: FlagCorpus) -> Self {
        Self { corpus }
    }

    #[inline]
    pub fn corpus(&self) -> &FlagCorpus {
        &self.corpus
    }

    /// Best entry by `direction`, skipping `exclude` (compared title-cased).
    /// Only a strict improvement replaces the current best, so the earliest
    /// entry wins ties.
    pub fn best_match(
        &self,
        query: &CanonicalImage,
        exclude: Option<&str>,
        metric: Metric,
        direction: Direction,
    ) -> Option<Match<'_>> {
        let exclude = exclude.map(title_case);
        let mut best: Option<Match> = None;
        for entry in self.corpus.entries() {
            if exclude.as_deref() == Some(entry.name()) {
                continue;
            }
            let distance = metric.distance(query, entry.image());
            if best.map_or(true, |b| direction.improves(distance, b.distance)) {
                best = Some(Match { entry, distance });
            }
        }
        if let Some(m) = &best {
            tracing::debug!(
                %metric,
                ?direction,
                country = m.name(),
                distance = %m.distance,
                "best match"
            );
        }
        best
    }

    /// Most similar entry to an external image.
    pub fn identify(&self, query: &CanonicalImage, metric: Metric) -> Result<Match<'_>> {
        self.best_match(query, None, metric, metric.direction())
            .ok_or(FlagError::NoCandidates)
    }

    /// Most similar entry to `country`'s flag, never `country` itself.
    pub fn closest(&self, country: &str, metric: Metric) -> Result<Match<'_>> {
        self.search_from(country, metric, metric.direction())
    }

    /// Least similar entry to `country`'s flag.
    pub fn farthest(&self, country: &str, metric: Metric) -> Result<Match<'_>> {
        self.search_from(country, metric, metric.direction().inverse())
    }

    fn search_from(
        &self,
        country: &str,
        metric: Metric,
        direction: Direction,
    ) -> Result<Match<'_>> {
        let origin = self.corpus.entry(country)?;
        self.best_match(origin.image(), Some(origin.name()), metric, direction)
            .ok_or(FlagError::NoCandidates)
    }
}
