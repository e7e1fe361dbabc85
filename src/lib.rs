pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod metric;
pub mod normalizer;
pub mod quantizer;
pub mod service;

pub use self::config::Config;
pub use self::corpus::{FlagCorpus, FlagEntry};
pub use self::engine::{Match, NearestNeighborEngine};
pub use self::error::{FlagError, Result};
pub use self::metric::{Direction, Distance, Metric};
pub use self::normalizer::{CanonicalImage, ImageNormalizer, ImageSource};
pub use self::quantizer::ColorQuantizer;
pub use self::service::FlagIdentificationService;
