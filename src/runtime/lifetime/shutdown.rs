use std::time::Duration;

use tokio::signal;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::services::{GeoIpService, MaxMindGeoIpService};

/// 关闭超时时间（秒）
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// 等待 Ctrl+C；Unix 上 SIGUSR1 触发一次立即更新
pub async fn listen_for_shutdown(service: &MaxMindGeoIpService) {
    #[cfg(unix)]
    wait_with_reload(service).await;

    #[cfg(not(unix))]
    wait_for_ctrl_c().await;

    let shutdown_result = timeout(
        Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
        perform_shutdown_tasks(service),
    )
    .await;

    match shutdown_result {
        Ok(()) => {
            info!("All shutdown tasks completed successfully");
        }
        Err(_) => {
            error!(
                "Shutdown tasks timed out after {} seconds! Forcing exit.",
                SHUTDOWN_TIMEOUT_SECS
            );
            std::process::exit(1);
        }
    }
}

async fn wait_for_ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, closing GeoIP service...");
        }
        Err(e) => {
            warn!(
                "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
                e
            );
        }
    }
}

#[cfg(unix)]
async fn wait_with_reload(service: &MaxMindGeoIpService) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut usr1 = match signal(SignalKind::user_defined1()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Failed to register SIGUSR1 handler: {}", e);
            wait_for_ctrl_c().await;
            return;
        }
    };

    let ctrl_c = wait_for_ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => return,
            Some(()) = usr1.recv() => {
                info!("SIGUSR1 received, updating GeoIP database...");
                // 更新在后台阻塞线程上进行，等待期间仍可响应 Ctrl+C
                tokio::select! {
                    _ = &mut ctrl_c => return,
                    result = service.refresh_now() => {
                        if let Err(e) = result {
                            error!("Manual GeoIP update failed: {}", e);
                        }
                    }
                }
            }
        }
    }
}

async fn perform_shutdown_tasks(service: &MaxMindGeoIpService) {
    if let Err(e) = service.close().await {
        error!("Failed to close GeoIP service: {}", e);
    }
}
