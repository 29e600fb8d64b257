//! Command-line interface parsing for restcache
//!
//! This module handles parsing of CLI arguments using clap and turns them
//! into a `FetchConfig` describing what the binary should request.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;
use url::Url;

use crate::config::{ClientConfig, ConfigError};
use crate::http::Classification;

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// A -H argument is not of the form `Name: value`
    #[error("Invalid header: '{0}'. Expected 'Name: value'")]
    InvalidHeader(String),

    /// The URL argument could not be parsed
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    /// The config file could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// restcache - Fetch a URL through the response cache
#[derive(Parser, Debug)]
#[command(name = "restcache")]
#[command(about = "Fetch a URL through a TTL-bounded response cache")]
#[command(version)]
pub struct Cli {
    /// URL to fetch with GET
    ///
    /// A relative URL is resolved against `base_url` from the --config file.
    pub url: String,

    /// Number of times to fetch the URL
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub repeat: u32,

    /// Issue all repetitions at once instead of one after another
    #[arg(long)]
    pub parallel: bool,

    /// Cache lifetime in milliseconds; cached responses never expire without it
    #[arg(long, value_name = "MS")]
    pub ttl_ms: Option<u64>,

    /// Always call the network, still storing the response
    #[arg(long)]
    pub bypass: bool,

    /// Group tag stored with the cached response
    #[arg(long)]
    pub group: Option<String>,

    /// Action tag stored with the cached response
    #[arg(long)]
    pub action: Option<String>,

    /// Explicit cache key instead of one derived from the URL
    #[arg(long)]
    pub id: Option<String>,

    /// Extra request header, may be repeated
    ///
    /// Example: -H 'Accept: application/json'
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
    pub headers: Vec<String>,

    /// JSON config file with client settings
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Request timeout in seconds, overrides the config file
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

/// Everything the binary needs to perform its requests
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Target URL
    pub url: Url,
    /// Number of requests to issue
    pub repeat: u32,
    /// Whether to issue requests concurrently
    pub parallel: bool,
    /// Caching instructions for every request
    pub classification: Classification,
    /// Headers from the config file merged with -H arguments
    pub headers: HeaderMap,
    /// Client settings
    pub client: ClientConfig,
}

/// Parses a `Name: value` header argument
///
/// # Returns
/// * `Ok((HeaderName, HeaderValue))` for a well-formed header
/// * `Err(CliError::InvalidHeader)` if the colon is missing or either part is invalid
pub fn parse_header_arg(s: &str) -> Result<(HeaderName, HeaderValue), CliError> {
    let invalid = || CliError::InvalidHeader(s.to_string());
    let (name, value) = s.split_once(':').ok_or_else(invalid)?;
    let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| invalid())?;
    let value = HeaderValue::from_str(value.trim()).map_err(|_| invalid())?;
    Ok((name, value))
}

/// Parses the URL argument, resolving relative URLs against `base_url`
///
/// # Returns
/// * `Ok(Url)` for an absolute URL, or a relative one when a base is configured
/// * `Err(CliError::InvalidUrl)` if the argument or the base cannot be parsed
pub fn resolve_url_arg(arg: &str, base_url: Option<&str>) -> Result<Url, CliError> {
    let invalid = |source| CliError::InvalidUrl {
        url: arg.to_string(),
        source,
    };
    match (Url::parse(arg), base_url) {
        (Err(url::ParseError::RelativeUrlWithoutBase), Some(base)) => {
            let mut base = Url::parse(base).map_err(invalid)?;
            if !base.path().ends_with('/') {
                let path = format!("{}/", base.path());
                base.set_path(&path);
            }
            base.join(arg.trim_start_matches('/')).map_err(invalid)
        }
        (parsed, _) => parsed.map_err(invalid),
    }
}

impl FetchConfig {
    /// Creates a FetchConfig from parsed CLI arguments.
    ///
    /// Settings from `--config` are loaded first; command-line flags win.
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let mut client = match &cli.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::default(),
        };
        let url = resolve_url_arg(&cli.url, client.base_url.as_deref())?;
        if let Some(timeout_secs) = cli.timeout_secs {
            client.timeout_secs = timeout_secs;
        }

        let mut headers = client.header_map()?;
        for arg in &cli.headers {
            let (name, value) = parse_header_arg(arg)?;
            headers.insert(name, value);
        }

        let classification = Classification {
            group: cli.group.clone(),
            action: cli.action.clone(),
            id: cli.id.clone(),
            cache_lifetime: cli.ttl_ms.map(Duration::from_millis),
            bypass_cache: cli.bypass,
        };

        Ok(FetchConfig {
            url,
            repeat: cli.repeat,
            parallel: cli.parallel,
            classification,
            headers,
            client,
        })
    }
}
