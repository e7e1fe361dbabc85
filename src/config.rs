use super::error::{FlagError, Result};
use super::metric::Metric;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "FLAGID_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "flagid.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub fetch: FetchConfig,
    pub default_method: Metric,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    pub manifest: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Honor `HTTP_PROXY`-style environment variables.
    pub system_proxy: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            corpus: CorpusConfig::default(),
            fetch: FetchConfig::default(),
            default_method: Metric::Mse,
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("flags/manifest.json"),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("flagid/", env!("CARGO_PKG_VERSION")).to_string(),
            system_proxy: true,
        }
    }
}

impl Config {
    /// Reads `path` if given, else `$FLAGID_CONFIG`, else `flagid.toml` when
    /// it exists. Falls back to defaults; never writes a file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        match explicit {
            Some(path) => Self::from_file(&path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| FlagError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|e| FlagError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn from_toml(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}
