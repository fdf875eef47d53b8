//! CLI mode
//!
//! One-shot commands that do not start the update schedule.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use serde::Serialize;
use tracing::warn;

use crate::config::{GeoIpConfig, StaticConfig};
use crate::services::geoip::{HttpFetcher, RefreshOutcome};
use crate::services::{CountryInfo, GeoIpService, MaxMindGeoIpService};

const DEFAULT_SAMPLE_PATH: &str = "config.example.toml";

/// One `lookup --json` output line
#[derive(Serialize)]
struct LookupLine<'a> {
    ip: &'a str,
    #[serde(flatten)]
    country: &'a CountryInfo,
}

/// Download the database once, replacing the local copy.
pub async fn run_update(config: &GeoIpConfig) -> Result<()> {
    let fetcher = Arc::new(HttpFetcher::new(config.download_timeout()));
    let service = MaxMindGeoIpService::build(config.clone(), fetcher)
        .map_err(|e| anyhow::anyhow!(e.format_simple()))?;

    match service.refresh_now().await {
        Ok(RefreshOutcome::Updated(source)) => {
            println!(
                "{} {} {}",
                "GeoIP database updated from".green(),
                source.to_string().bold(),
                config.database_path.display().to_string().blue()
            );
        }
        Ok(RefreshOutcome::Skipped) => {
            println!("{}", "Another update is already running".yellow());
        }
        Err(e) => bail!(e.format_simple()),
    }

    service.close().await.map_err(|e| anyhow::anyhow!(e.format_simple()))?;
    Ok(())
}

/// Look up each address and print one line per address.
///
/// A failed lookup is reported but does not stop the remaining ones; the
/// command fails if any lookup failed.
pub async fn run_lookup(config: &GeoIpConfig, ips: &[String], json: bool) -> Result<()> {
    let fetcher = Arc::new(HttpFetcher::new(config.download_timeout()));
    let service = MaxMindGeoIpService::build(config.clone(), fetcher)
        .map_err(|e| anyhow::anyhow!(e.format_simple()))?;
    service
        .warm_up()
        .await
        .map_err(|e| anyhow::anyhow!(e.format_simple()))?;

    let mut failures = 0usize;
    for ip in ips {
        match service.get_country(ip).await {
            Ok(country) if json => {
                let line = LookupLine {
                    ip,
                    country: &country,
                };
                println!("{}", serde_json::to_string(&line)?);
            }
            Ok(country) => println!("{}\t{}\t{}", ip, country.code, country.name),
            Err(e) => {
                failures += 1;
                warn!("Lookup failed for {}: {}", ip, e);
                eprintln!("{}\t{} {}", ip, "error:".red().bold(), e);
            }
        }
    }

    service.close().await.map_err(|e| anyhow::anyhow!(e.format_simple()))?;

    if failures > 0 {
        bail!("{} of {} lookups failed", failures, ips.len());
    }
    Ok(())
}

/// Write a sample configuration file.
pub fn run_config_generate(output_path: Option<String>, force: bool) -> Result<()> {
    let path = output_path.unwrap_or_else(|| DEFAULT_SAMPLE_PATH.to_string());

    if Path::new(&path).exists() && !force {
        bail!("{} already exists, use --force to overwrite", path);
    }

    println!(
        "{} {}",
        "Generating configuration file...".yellow(),
        path.blue()
    );
    StaticConfig::default()
        .save_to_file(&path)
        .with_context(|| format!("Unable to write configuration file {}", path))?;
    println!(
        "  {} {}",
        "Configuration file generated successfully".green(),
        path.blue()
    );
    println!(
        "  {}",
        "Please edit the configuration file and restart the service".yellow()
    );
    Ok(())
}
