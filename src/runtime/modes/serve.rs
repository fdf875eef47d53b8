//! Serve mode
//!
//! Starts the GeoIP service with its update schedule and blocks until
//! shutdown.

use anyhow::Result;
use tracing::info;

use crate::config::StaticConfig;
use crate::runtime::lifetime;
use crate::services::MaxMindGeoIpService;
use crate::utils::time_parser::format_interval;

pub async fn run_serve(config: &StaticConfig) -> Result<()> {
    let geoip = &config.geoip;
    info!(
        "Starting micro-geoip: database={}, update_interval={}, maxmind_key={}",
        geoip.database_path.display(),
        format_interval(geoip.update_interval()),
        if geoip.has_license_key() { "set" } else { "unset" }
    );

    let service = MaxMindGeoIpService::new(geoip.clone())
        .await
        .map_err(|e| anyhow::anyhow!(e.format_simple()))?;

    info!("micro-geoip is ready, press Ctrl+C to stop");
    lifetime::shutdown::listen_for_shutdown(&service).await;
    info!("micro-geoip stopped");
    Ok(())
}
