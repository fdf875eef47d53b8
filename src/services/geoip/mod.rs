//! GeoIP 服务模块
//!
//! 本地 MaxMind DB 格式数据库的完整生命周期：
//! - 从 MaxMind（主源）或 DB-IP（备用源）下载
//! - 解压 tar.gz / gzip
//! - 原子热替换正在使用的数据库
//! - 定时更新

mod acquisition;
mod extractor;
mod fetcher;
mod mock;
mod provider;
mod scheduler;
mod service;
mod source;
mod store;
mod types;

pub use acquisition::AcquisitionOrchestrator;
pub use extractor::{ArchiveKind, DATASET_SUFFIX, extract};
pub use fetcher::{HttpFetcher, SourceFetcher};
pub use mock::MockGeoIpService;
pub use provider::GeoIpService;
pub use scheduler::{
    RefreshOutcome, RefreshResult, RefreshScheduler, RefreshStatus, RefreshTrigger, RefreshWorker,
};
pub use service::MaxMindGeoIpService;
pub use source::{
    DBIP_DATE_PLACEHOLDER, DatasetSource, SourceKind, dbip_download_url, maxmind_download_url,
    redact_url,
};
pub use store::{DatasetHandle, HotSwapStore};
pub use types::{CountryInfo, ServiceState, UNKNOWN};
