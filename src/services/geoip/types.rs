//! GeoIP 查询结果与服务状态类型

use serde::Serialize;

/// 未知国家的占位值
pub const UNKNOWN: &str = "Unknown";

/// 国家信息
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CountryInfo {
    /// ISO 3166-1 alpha-2 国家代码 (e.g., "US")，未知时为 "Unknown"
    pub code: String,
    /// 国家名称 (e.g., "United States")，未知时为 "Unknown"
    pub name: String,
}

impl CountryInfo {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }

    /// 数据库中没有该地址的国家信息
    pub fn unknown() -> Self {
        Self::new(UNKNOWN, UNKNOWN)
    }

    pub fn is_unknown(&self) -> bool {
        self.code == UNKNOWN
    }
}

/// Service-level lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// No dataset has ever been published; every lookup is `Unavailable`.
    NeverInitialized,
    /// A dataset is published and the last refresh cycle (if any) succeeded.
    Ready,
    /// A dataset is published but the most recent refresh failed, so it may be stale.
    Degraded,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceState::NeverInitialized => write!(f, "never-initialized"),
            ServiceState::Ready => write!(f, "ready"),
            ServiceState::Degraded => write!(f, "degraded"),
        }
    }
}
