//! 测试用 GeoIP 服务
//!
//! 固定的 IP -> 国家映射，供依赖 `GeoIpService` 的上层代码测试使用。

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::RwLock;

use async_trait::async_trait;

use super::provider::GeoIpService;
use super::types::CountryInfo;
use crate::errors::{GeoIpError, LookupError};

pub struct MockGeoIpService {
    countries: RwLock<HashMap<String, CountryInfo>>,
}

impl MockGeoIpService {
    /// 预置几个常用公共 DNS 地址
    pub fn new() -> Self {
        let countries = [
            ("8.8.8.8", "US", "United States"),
            ("1.1.1.1", "US", "United States"),
            ("208.67.222.222", "US", "United States"),
            ("134.195.196.26", "DE", "Germany"),
            ("2001:4860:4860::8888", "US", "United States"),
        ]
        .into_iter()
        .map(|(ip, code, name)| (ip.to_string(), CountryInfo::new(code, name)))
        .collect();

        Self {
            countries: RwLock::new(countries),
        }
    }

    /// An empty mock: every valid address resolves to `Unknown`.
    pub fn empty() -> Self {
        Self {
            countries: RwLock::new(HashMap::new()),
        }
    }

    pub fn set_country(&self, ip: &str, code: &str, name: &str) {
        if let Ok(mut map) = self.countries.write() {
            map.insert(ip.to_string(), CountryInfo::new(code, name));
        }
    }

    pub fn remove_country(&self, ip: &str) {
        if let Ok(mut map) = self.countries.write() {
            map.remove(ip);
        }
    }
}

impl Default for MockGeoIpService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GeoIpService for MockGeoIpService {
    async fn get_country(&self, ip: &str) -> Result<CountryInfo, LookupError> {
        ip.parse::<IpAddr>()
            .map_err(|_| LookupError::InvalidAddress(ip.to_string()))?;

        let map = self
            .countries
            .read()
            .map_err(|_| LookupError::Unavailable)?;
        Ok(map.get(ip).cloned().unwrap_or_else(CountryInfo::unknown))
    }

    async fn close(&self) -> Result<(), GeoIpError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Mock"
    }
}
