use super::error::{FlagError, Result};
use super::normalizer::CanonicalImage;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct Manifest {
    flags: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    country: String,
    /// Relative to the manifest's directory.
    image: PathBuf,
}

/// Upper-cases the first letter of every run of letters and lower-cases the
/// rest, so `"the united states"` and `"THE UNITED STATES"` both become
/// `"The United States"`.
pub fn title_case(name: &str) -> String {
    let mut titled = String::with_capacity(name.len());
    let mut in_word = false;
    for c in name.chars() {
        if c.is_alphabetic() {
            if in_word {
                titled.extend(c.to_lowercase());
            } else {
                titled.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            titled.push(c);
            in_word = false;
        }
    }
    titled
}

#[derive(Debug, Clone)]
pub struct FlagEntry {
    name: String,
    image: CanonicalImage,
}

impl FlagEntry {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn image(&self) -> &CanonicalImage {
        &self.image
    }
}

/// Every known flag, keyed by title-cased country name, in manifest order.
///
/// Built once by [`FlagCorpus::load`] and read-only afterwards.
#[derive(Debug)]
pub struct FlagCorpus {
    entries: Vec<FlagEntry>,
    index: HashMap<String, usize>,
}

impl FlagCorpus {
    /// Reads a JSON manifest of `{"flags": [{"country", "image"}, ...]}` and
    /// every image it references. Each image must already be canonical.
    pub fn load(manifest: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(manifest)
            .map_err(|e| FlagError::corpus_load(manifest, e))?;
        let parsed: Manifest =
            serde_json::from_str(&contents).map_err(|e| FlagError::corpus_load(manifest, e))?;
        let base = manifest.parent().unwrap_or_else(|| Path::new("."));

        let mut entries = Vec::with_capacity(parsed.flags.len());
        for flag in parsed.flags {
            let path = base.join(&flag.image);
            let img = image::open(&path)
                .map_err(|e| FlagError::corpus_load(&path, e))?
                .to_rgb8();
            let image =
                CanonicalImage::try_from(img).map_err(|e| FlagError::corpus_load(&path, e))?;
            entries.push((flag.country, image));
        }

        let corpus =
            Self::from_entries(entries).map_err(|e| FlagError::corpus_load(manifest, e))?;
        tracing::info!(
            flags = corpus.len(),
            manifest = %manifest.display(),
            "loaded flag corpus"
        );
        Ok(corpus)
    }

    pub(crate) fn from_entries<I>(entries: I) -> std::result::Result<Self, String>
    where
        I: IntoIterator<Item = (String, CanonicalImage)>,
    {
        let mut corpus = Self {
            entries: Vec::new(),
            index: HashMap::new(),
        };
        for (country, image) in entries {
            let name = title_case(&country);
            if corpus.index.contains_key(&name) {
                return Err(format!("duplicate country '{name}'"));
            }
            corpus.index.insert(name.clone(), corpus.entries.len());
            corpus.entries.push(FlagEntry { name, image });
        }
        if corpus.entries.is_empty() {
            return Err("manifest lists no flags".to_string());
        }
        Ok(corpus)
    }

    pub fn entry(&self, country: &str) -> Result<&FlagEntry> {
        self.index
            .get(&title_case(country))
            .map(|&i| &self.entries[i])
            .ok_or_else(|| FlagError::UnknownCountry {
                country: country.to_string(),
            })
    }

    /// Case-insensitive lookup of a country's canonical flag.
    pub fn get(&self, country: &str) -> Result<&CanonicalImage> {
        self.entry(country).map(FlagEntry::image)
    }

    /// Country names in load order.
    pub fn list(&self) -> Vec<&str> {
        self.entries.iter().map(FlagEntry::name).collect()
    }

    #[inline]
    pub fn entries(&self) -> &[FlagEntry] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::metric::tests::{pattern, solid};
    use crate::normalizer::tests::png_bytes;
    use image::RgbImage;
    use std::fs;
    use tempfile::TempDir;

    /// Writes one PNG per flag plus a manifest listing them in order.
    pub(crate) fn write_corpus(dir: &Path, flags: &[(&str, &RgbImage)]) -> PathBuf {
        let mut listed = Vec::new();
        for (i, (country, img)) in flags.iter().enumerate() {
            let file = format!("flag_{i}.png");
            fs::write(dir.join(&file), png_bytes(img)).unwrap();
            listed.push(serde_json::json!({ "country": country, "image": file }));
        }
        let manifest = dir.join("manifest.json");
        fs::write(
            &manifest,
            serde_json::json!({ "flags": listed }).to_string(),
        )
        .unwrap();
        manifest
    }

    fn assert_load_error(manifest: &Path, needle: &str) {
        match FlagCorpus::load(manifest) {
            Err(FlagError::CorpusLoad { path, message }) => {
                let text = format!("{} {message}", path.display());
                assert!(text.contains(needle), "{text}");
            }
            other => panic!("expected CorpusLoad error, got {other:?}"),
        }
    }

    #[test]
    fn title_casing() {
        assert_eq!(title_case("canada"), "Canada");
        assert_eq!(title_case("the UNITED states"), "The United States");
        assert_eq!(title_case("guinea-bissau"), "Guinea-Bissau");
        assert_eq!(title_case("côte d'ivoire"), "Côte D'Ivoire");
        assert_eq!(title_case("  São tomé  "), "  São Tomé  ");
    }

    #[test]
    fn load_keeps_manifest_order() {
        let dir = TempDir::new().unwrap();
        let (a, b, c) = (pattern(1), solid([255, 0, 0]), pattern(3));
        let manifest = write_corpus(
            dir.path(),
            &[
                ("zimbabwe", a.as_rgb()),
                ("Canada", b.as_rgb()),
                ("the united states", c.as_rgb()),
            ],
        );
        let corpus = FlagCorpus::load(&manifest).unwrap();
        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus.list(), ["Zimbabwe", "Canada", "The United States"]);
        assert_eq!(corpus.list(), corpus.list());
        assert_eq!(corpus.get("CANADA").unwrap(), &b);
        assert_eq!(corpus.get("The United States").unwrap(), &c);
        assert_eq!(corpus.entry("zimbabwe").unwrap().image(), &a);
    }

    #[test]
    fn unknown_country() {
        let dir = TempDir::new().unwrap();
        let img = solid([0, 0, 0]);
        let manifest = write_corpus(dir.path(), &[("Canada", img.as_rgb())]);
        let corpus = FlagCorpus::load(&manifest).unwrap();
        let err = corpus.get("Atlantis").unwrap_err();
        assert!(
            matches!(err, FlagError::UnknownCountry { ref country } if country == "Atlantis"),
            "{err}"
        );
    }

    #[test]
    fn missing_manifest() {
        let dir = TempDir::new().unwrap();
        assert_load_error(&dir.path().join("manifest.json"), "manifest.json");
    }

    #[test]
    fn corrupt_manifest() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("manifest.json");
        fs::write(&manifest, r#"{"flags": [{"country": "Canada"}]}"#).unwrap();
        assert_load_error(&manifest, "image");
    }

    #[test]
    fn missing_image() {
        let dir = TempDir::new().unwrap();
        let img = solid([0, 0, 0]);
        let manifest = write_corpus(dir.path(), &[("Canada", img.as_rgb())]);
        fs::remove_file(dir.path().join("flag_0.png")).unwrap();
        assert_load_error(&manifest, "flag_0.png");
    }

    #[test]
    fn corrupt_image() {
        let dir = TempDir::new().unwrap();
        let img = solid([0, 0, 0]);
        let manifest = write_corpus(dir.path(), &[("Canada", img.as_rgb())]);
        fs::write(dir.path().join("flag_0.png"), b"garbage").unwrap();
        assert_load_error(&manifest, "flag_0.png");
    }

    #[test]
    fn non_canonical_images() {
        let dir = TempDir::new().unwrap();
        let small = RgbImage::new(90, 45);
        let manifest = write_corpus(dir.path(), &[("Canada", &small)]);
        assert_load_error(&manifest, "180x90");

        let off_palette = RgbImage::from_pixel(180, 90, image::Rgb([1, 2, 3]));
        let manifest = write_corpus(dir.path(), &[("Canada", &off_palette)]);
        assert_load_error(&manifest, "web-safe");
    }

    #[test]
    fn duplicate_and_empty() {
        let dir = TempDir::new().unwrap();
        let img = solid([0, 0, 0]);
        let manifest = write_corpus(
            dir.path(),
            &[("Canada", img.as_rgb()), ("CANADA", img.as_rgb())],
        );
        assert_load_error(&manifest, "duplicate country 'Canada'");

        let manifest = write_corpus(dir.path(), &[]);
        assert_load_error(&manifest, "no flags");
    }
}
