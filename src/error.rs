use std::convert::Infallible;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlagError>;

/// Every way a query against the flag corpus can fail.
///
/// There is no partial-result mode: an operation either answers or returns
/// one of these.
#[derive(Error, Debug)]
pub enum FlagError {
    #[error("unknown method '{method}', must be one of: mse, hash, ssim")]
    InvalidMethod { method: String },

    #[error("unknown country '{country}'")]
    UnknownCountry { country: String },

    #[error("no candidate flags left to compare against")]
    NoCandidates,

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("failed to fetch {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("failed to fetch {url}: HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("failed to load corpus from {path}: {message}")]
    CorpusLoad { path: PathBuf, message: String },
}

impl From<Infallible> for FlagError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

impl FlagError {
    pub(crate) fn corpus_load(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::CorpusLoad {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// `true` for the transport-level failures a caller may choose to retry.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::HttpStatus { .. })
    }
}
