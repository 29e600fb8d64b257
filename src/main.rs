//! restcache - Fetch a URL through the response cache
//!
//! Issues one or more GET requests for a URL via the cache-aware dispatcher
//! and reports, for each, whether it was answered by the network or the cache.

use std::process;
use std::sync::Arc;

use clap::Parser;
use futures::future::join_all;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rest_cache::cli::{Cli, FetchConfig};
use rest_cache::http::{Dispatcher, ReqwestTransport, RequestDescriptor};
use rest_cache::Envelope;

/// Installs a stderr logger; RUST_LOG takes precedence over `level`
fn setup_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Prints the outcome of one request
fn report(attempt: usize, envelope: &Envelope) {
    let source = if envelope.is_cache { "cache" } else { "network" };
    println!("#{} status={} source={}", attempt, envelope.status, source);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    setup_tracing(&cli.log_level);

    let config = match FetchConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(2);
        }
    };

    let transport = Arc::new(ReqwestTransport::from_config(&config.client)?);
    let dispatcher = Dispatcher::new(transport);
    let request = RequestDescriptor::get(config.url.clone()).with_headers(config.headers.clone());
    let classification = Some(&config.classification);

    let results = if config.parallel {
        let calls = (0..config.repeat).map(|_| dispatcher.dispatch(&request, classification));
        join_all(calls).await
    } else {
        let mut results = Vec::with_capacity(config.repeat as usize);
        for _ in 0..config.repeat {
            results.push(dispatcher.dispatch(&request, classification).await);
        }
        results
    };

    let mut last = None;
    for (attempt, result) in results.into_iter().enumerate() {
        match result {
            Ok(envelope) => {
                report(attempt + 1, &envelope);
                last = Some(envelope);
            }
            Err(e) => {
                eprintln!("error: {}", e);
                process::exit(1);
            }
        }
    }

    if let Some(envelope) = last {
        println!("{}", serde_json::to_string_pretty(&envelope.data)?);
    }

    let stats = dispatcher.store().stats();
    println!(
        "cache: hits={} misses={} entries={}",
        stats.hits, stats.misses, stats.size
    );

    Ok(())
}
