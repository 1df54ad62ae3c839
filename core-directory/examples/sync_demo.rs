//! Directory sync demonstration
//!
//! Fetches the provider directory, geocodes what is missing and prints a
//! short summary plus the providers closest to a point.
//!
//! Run with:
//! ```bash
//! DIRECTORY_ENDPOINT=https://example.org/api/providers \
//! DIRECTORY_API_KEY=secret DIRECTORY_LOG=debug \
//!     cargo run -p core-directory --example sync_demo
//!
//! # Force a refresh and search around a point (lat, lon, radius km)
//! cargo run -p core-directory --example sync_demo -- --force 6.37 2.39 5
//! ```

use anyhow::Context;
use core_directory::{filter, stats, FilterCriteria, SyncOrchestrator};
use core_runtime::config::{CoreConfig, DirectoryConfig};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use std::env;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args: Vec<String> = env::args().skip(1).collect();
    let force = match args.first() {
        Some(flag) if flag == "--force" => {
            args.remove(0);
            true
        }
        _ => false,
    };

    let mut logging = LoggingConfig::from_env().context("reading log settings")?;
    if env::var_os("DIRECTORY_LOG_FORMAT").is_none() {
        logging = logging.with_format(LogFormat::Compact);
    }
    init_logging(logging).context("initializing logging")?;

    let directory = DirectoryConfig::from_env().context("reading DIRECTORY_* settings")?;
    let config = CoreConfig::builder()
        .directory(directory)
        .build()
        .await
        .context("building core config")?;

    let orchestrator = SyncOrchestrator::from_config(&config);
    let outcome = orchestrator.sync(force).await?;

    info!(origin = ?outcome.origin, "Sync finished");
    if let Some(message) = &outcome.message {
        println!("{}", message);
    }

    let summary = stats(&outcome.records);
    println!(
        "{} providers, {} geocoded, {} with agreement",
        summary.total, summary.geocoded, summary.agreement
    );
    for (city, count) in &summary.by_city {
        println!("  {:<20} {}", city, count);
    }

    if let [lat, lon, radius] = args.as_slice() {
        let criteria = FilterCriteria::new().within(
            lat.parse().context("latitude")?,
            lon.parse().context("longitude")?,
            radius.parse().context("radius")?,
        );
        let nearby = filter(&outcome.records, &criteria);
        println!("{} providers within {} km:", nearby.len(), radius);
        for record in nearby.iter().take(10) {
            println!(
                "  {:>6.2} km  {} ({})",
                record.distance_km.unwrap_or_default(),
                record.provider.name,
                record.provider.city
            );
        }
    }

    let info = orchestrator.cache_info().await;
    println!(
        "cache: {} coordinate entries, last synced {:?}",
        info.coordinate_entries, info.last_synced_at
    );

    Ok(())
}
