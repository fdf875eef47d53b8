//! MaxMind DB 服务
//!
//! 组合下载、解压、热替换与定时更新：
//! 1. 启动时加载本地数据库，失败则下载一次；仍失败则返回错误
//! 2. 按 `update_interval` 周期性重新下载并热替换
//! 3. 查询始终读取当前快照，不会被更新阻塞

use std::fs;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use super::acquisition::AcquisitionOrchestrator;
use super::fetcher::{HttpFetcher, SourceFetcher};
use super::provider::GeoIpService;
use super::scheduler::{RefreshOutcome, RefreshScheduler, RefreshStatus, RefreshTrigger, RefreshWorker};
use super::store::{DatasetHandle, HotSwapStore};
use super::types::{CountryInfo, ServiceState};
use crate::config::GeoIpConfig;
use crate::errors::{GeoIpError, LookupError, Result};

pub struct MaxMindGeoIpService {
    store: Arc<HotSwapStore>,
    worker: Arc<RefreshWorker>,
    scheduler: RefreshScheduler,
}

impl MaxMindGeoIpService {
    /// Build the service with the HTTP fetcher, warm it up and start the
    /// update schedule.
    pub async fn new(config: GeoIpConfig) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(config.download_timeout()));
        Self::with_fetcher(config, fetcher).await
    }

    /// Same as `new` with a caller-supplied fetcher.
    pub async fn with_fetcher(config: GeoIpConfig, fetcher: Arc<dyn SourceFetcher>) -> Result<Self> {
        let service = Self::build(config.clone(), fetcher)?;
        service.warm_up().await?;
        service.scheduler.start(config.update_interval());
        info!("GeoIP service initialized");
        Ok(service)
    }

    /// Build without warm-up or schedule; the service starts `NeverInitialized`.
    pub fn build(config: GeoIpConfig, fetcher: Arc<dyn SourceFetcher>) -> Result<Self> {
        if config.database_path.file_name().is_none() {
            return Err(GeoIpError::config(format!(
                "database_path must name a file: {}",
                config.database_path.display()
            )));
        }

        let dir = config.database_dir();
        fs::create_dir_all(&dir).inspect_err(|e| {
            error!("Failed to create data directory {}: {}", dir.display(), e);
        })?;

        let store = Arc::new(HotSwapStore::new());
        let database_path = config.database_path.clone();
        let orchestrator = AcquisitionOrchestrator::new(config, fetcher);
        let worker = Arc::new(RefreshWorker::new(
            orchestrator,
            Arc::clone(&store),
            database_path,
        ));
        let scheduler = RefreshScheduler::new(Arc::clone(&worker));

        Ok(Self {
            store,
            worker,
            scheduler,
        })
    }

    /// Load the local database, downloading it first when it is missing or
    /// unreadable. Does not start the update schedule.
    pub async fn warm_up(&self) -> Result<()> {
        self.worker.warm_up().await
    }

    /// Run one refresh cycle now, unless one is already running.
    pub async fn refresh_now(&self) -> Result<RefreshOutcome> {
        self.worker.refresh(RefreshTrigger::Manual).await
    }

    pub fn state(&self) -> ServiceState {
        if !self.store.is_ready() {
            return ServiceState::NeverInitialized;
        }

        match self.worker.status().last_result {
            Some(result) if !result.success => ServiceState::Degraded,
            _ => ServiceState::Ready,
        }
    }

    pub fn refresh_status(&self) -> RefreshStatus {
        self.worker.status()
    }

    /// The dataset currently serving lookups.
    pub fn current_dataset(&self) -> Option<Arc<DatasetHandle>> {
        self.store.current()
    }

    pub fn lookup(&self, ip: &str) -> std::result::Result<CountryInfo, LookupError> {
        self.store.lookup(ip)
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }
}

#[async_trait]
impl GeoIpService for MaxMindGeoIpService {
    async fn get_country(&self, ip: &str) -> std::result::Result<CountryInfo, LookupError> {
        self.store.lookup(ip)
    }

    /// Stop the schedule, wait for a running cycle to finish, then release
    /// the active dataset. Later refreshes are ignored.
    async fn close(&self) -> Result<()> {
        self.worker.close();
        self.scheduler.stop();
        self.worker.wait_idle().await;
        if self.store.clear().is_some() {
            info!("GeoIP database closed");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "MaxMind"
    }
}
