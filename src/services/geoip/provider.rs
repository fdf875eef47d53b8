//! GeoIP 服务抽象层
//!
//! HTTP 层只依赖 `GeoIpService`：按 IP 查询国家，以及关闭时释放资源。

use async_trait::async_trait;

use super::types::CountryInfo;
use crate::errors::{GeoIpError, LookupError};

/// GeoIP 查询 trait
#[async_trait]
pub trait GeoIpService: Send + Sync {
    /// 查询 IP 地址所在国家
    ///
    /// - 非法地址返回 `LookupError::InvalidAddress`
    /// - 数据库尚未加载返回 `LookupError::Unavailable`
    /// - 数据库中无记录返回 `CountryInfo::unknown()`
    async fn get_country(&self, ip: &str) -> Result<CountryInfo, LookupError>;

    /// 停止后台更新并释放数据库
    async fn close(&self) -> Result<(), GeoIpError>;

    /// 获取实现名称（用于日志）
    fn name(&self) -> &'static str;
}
