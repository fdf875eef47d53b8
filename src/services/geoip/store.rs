//! Dataset handle and hot-swap store
//!
//! `HotSwapStore` 持有当前生效的数据库句柄。查询通过 `ArcSwapOption::load`
//! 拿到快照，整个查询期间都使用同一个句柄；`publish` 原子替换句柄，
//! 旧句柄在最后一个查询释放引用后才被销毁。

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use maxminddb::Reader;
use serde::Deserialize;
use tracing::{info, trace};

use super::types::{CountryInfo, UNKNOWN};
use crate::errors::{LoadError, LookupError};

/// Preferred language for country names.
const PREFERRED_LANGUAGE: &str = "en";

/// The subset of a GeoIP2/GeoLite2/DB-IP country record we read.
#[derive(Debug, Deserialize)]
struct CountryRecord<'a> {
    #[serde(borrow)]
    country: Option<CountryEntry<'a>>,
}

#[derive(Debug, Deserialize)]
struct CountryEntry<'a> {
    #[serde(borrow)]
    iso_code: Option<&'a str>,
    /// BTreeMap 保证在没有英文名时按语言代码字典序取第一个
    #[serde(borrow, default)]
    names: BTreeMap<&'a str, &'a str>,
}

impl CountryEntry<'_> {
    fn to_country_info(&self) -> CountryInfo {
        let code = self
            .iso_code
            .filter(|c| !c.is_empty())
            .unwrap_or(UNKNOWN);

        let name = self
            .names
            .get(PREFERRED_LANGUAGE)
            .copied()
            .filter(|n| !n.is_empty())
            .or_else(|| self.names.values().copied().find(|n| !n.is_empty()))
            .unwrap_or(UNKNOWN);

        CountryInfo::new(code, name)
    }
}

/// An opened, queryable dataset bound to the file it was loaded from.
pub struct DatasetHandle {
    reader: Reader<Vec<u8>>,
    path: PathBuf,
    loaded_at: DateTime<Utc>,
}

impl DatasetHandle {
    /// Open and validate the dataset at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LoadError::Missing(path.to_path_buf()));
        }

        let reader = Reader::open_readfile(path).map_err(|e| LoadError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(Self::from_reader(reader, path))
    }

    /// Wrap an in-memory database image. `path` is informational only.
    pub fn from_bytes(buf: Vec<u8>, path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let reader = Reader::from_source(buf).map_err(|e| LoadError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(Self::from_reader(reader, path))
    }

    fn from_reader(reader: Reader<Vec<u8>>, path: &Path) -> Self {
        Self {
            reader,
            path: path.to_path_buf(),
            loaded_at: Utc::now(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// e.g. "GeoLite2-Country" or "DBIP-Country-Lite"
    pub fn database_type(&self) -> &str {
        &self.reader.metadata.database_type
    }

    pub fn build_epoch(&self) -> u64 {
        self.reader.metadata.build_epoch
    }

    /// Resolve one address against this dataset.
    ///
    /// Unmatched addresses and records without country data resolve to
    /// `CountryInfo::unknown()`.
    pub fn lookup(&self, addr: IpAddr) -> Result<CountryInfo, LookupError> {
        // ::ffff:a.b.c.d 按 IPv4 查询
        let addr = match addr {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(addr, IpAddr::V4),
            IpAddr::V4(_) => addr,
        };

        if addr.is_ipv6() && self.reader.metadata.ip_version == 4 {
            // IPv4-only database has no data for IPv6 addresses
            return Ok(CountryInfo::unknown());
        }

        let result = self
            .reader
            .lookup(addr)
            .map_err(|e| LookupError::Database(e.to_string()))?;

        let record: Option<CountryRecord<'_>> = result
            .decode()
            .map_err(|e| LookupError::Database(e.to_string()))?;

        let info = record
            .and_then(|r| r.country)
            .map(|c| c.to_country_info())
            .unwrap_or_else(CountryInfo::unknown);

        trace!(
            "GeoIP lookup for {}: code={}, name={}",
            addr, info.code, info.name
        );

        Ok(info)
    }
}

impl std::fmt::Debug for DatasetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetHandle")
            .field("path", &self.path)
            .field("database_type", &self.database_type())
            .field("build_epoch", &self.build_epoch())
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

/// Owns the active dataset and serves lookups against it.
pub struct HotSwapStore {
    active: ArcSwapOption<DatasetHandle>,
}

impl HotSwapStore {
    pub fn new() -> Self {
        Self {
            active: ArcSwapOption::empty(),
        }
    }

    /// Resolve `ip` against whichever handle is active when the call starts.
    pub fn lookup(&self, ip: &str) -> Result<CountryInfo, LookupError> {
        let addr: IpAddr = ip
            .parse()
            .map_err(|_| LookupError::InvalidAddress(ip.to_string()))?;

        let snapshot = self.active.load();
        let handle = snapshot.as_ref().ok_or(LookupError::Unavailable)?;
        handle.lookup(addr)
    }

    /// Atomically make `handle` the active dataset and return the one it replaced.
    ///
    /// The replaced handle stays alive until every in-flight lookup holding it
    /// has finished.
    pub fn publish(&self, handle: DatasetHandle) -> Option<Arc<DatasetHandle>> {
        info!(
            "GeoIP database loaded: {} ({}, build epoch {})",
            handle.path().display(),
            handle.database_type(),
            handle.build_epoch()
        );
        self.active.swap(Some(Arc::new(handle)))
    }

    /// Drop the active handle; subsequent lookups return `Unavailable`.
    pub fn clear(&self) -> Option<Arc<DatasetHandle>> {
        self.active.swap(None)
    }

    pub fn current(&self) -> Option<Arc<DatasetHandle>> {
        self.active.load_full()
    }

    pub fn is_ready(&self) -> bool {
        self.active.load().is_some()
    }
}

impl Default for HotSwapStore {
    fn default() -> Self {
        Self::new()
    }
}
