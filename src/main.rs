use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flagid::{Config, FlagIdentificationService, ImageNormalizer, ImageSource, Metric};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Identify country flags and compare them by similarity
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Config file (defaults to $FLAGID_CONFIG, then ./flagid.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Corpus manifest, overrides the config file
    #[arg(short, long, global = true)]
    manifest: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Name the country whose flag best matches an image URL or file
    Identify {
        input: String,
        #[arg(short = 'M', long, value_parser = parse_metric)]
        method: Option<Metric>,
    },
    /// Country with the most similar flag
    Closest {
        country: String,
        #[arg(short = 'M', long, value_parser = parse_metric)]
        method: Option<Metric>,
    },
    /// Country with the least similar flag
    Farthest {
        country: String,
        #[arg(short = 'M', long, value_parser = parse_metric)]
        method: Option<Metric>,
    },
    /// Distance between two countries' flags
    Distance {
        country_a: String,
        country_b: String,
        #[arg(short = 'M', long, value_parser = parse_metric)]
        method: Option<Metric>,
    },
    /// List every country in the corpus
    List,
    /// Write a country's canonical flag image
    Export { country: String, output: PathBuf },
    /// Normalize an image URL or file into a canonical flag image
    Normalize { input: String, output: PathBuf },
}

fn parse_metric(name: &str) -> Result<Metric, String> {
    name.parse().map_err(|e: flagid::FlagError| e.to_string())
}

fn level_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level).with_context(|| format!("invalid log level '{level}'"))
}

fn init_logging(level: &str) -> Result<()> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) => EnvFilter::try_new(&directives)
            .with_context(|| format!("invalid {} '{directives}'", EnvFilter::DEFAULT_ENV))?,
        Err(_) => level_filter(level)?,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(manifest) = &args.manifest {
        config.corpus.manifest = manifest.clone();
    }
    Ok(config)
}

fn save_png(img: &image::RgbImage, output: &Path) -> Result<()> {
    img.save_with_format(output, image::ImageFormat::Png)
        .with_context(|| format!("failed to write {}", output.display()))
}

fn run(args: Args) -> Result<()> {
    init_logging(&args.log_level)?;
    let config = load_config(&args)?;
    let method = |m: Option<Metric>| m.unwrap_or(config.default_method);
    let service = || FlagIdentificationService::from_config(&config);

    match args.command {
        Command::Identify { input, method: m } => {
            let service = service()?;
            let source = ImageSource::parse(&input);
            println!("{}", service.identify(&source, method(m))?);
        }
        Command::Closest { country, method: m } => {
            let service = service()?;
            println!("{}", service.closest_flag(&country, method(m))?);
        }
        Command::Farthest { country, method: m } => {
            let service = service()?;
            println!("{}", service.farthest_flag(&country, method(m))?);
        }
        Command::Distance {
            country_a,
            country_b,
            method: m,
        } => {
            let distance = service()?.flag_distance(&country_a, &country_b, method(m))?;
            println!("{distance}");
        }
        Command::List => {
            for country in service()?.country_list() {
                println!("{country}");
            }
        }
        Command::Export { country, output } => {
            save_png(service()?.flag_image(&country)?, &output)?;
        }
        Command::Normalize { input, output } => {
            // no corpus needed
            let normalizer = ImageNormalizer::new(&config.fetch)?;
            let canonical = normalizer.normalize(&ImageSource::parse(&input))?;
            save_png(canonical.as_rgb(), &output)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
