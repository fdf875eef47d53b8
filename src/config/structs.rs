use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::utils::time_parser::parse_interval;

/// 配置文件默认路径
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// 环境变量前缀：MG__GEOIP__PREFER_DBIP=true
pub const ENV_PREFIX: &str = "MG";

/// Flat environment variable names kept for existing deployments,
/// mapped onto their config keys.
pub const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("MAXMIND_API_KEY", "geoip.maxmind_api_key"),
    ("GEOIP_DB_PATH", "geoip.database_path"),
    ("GEOIP_UPDATE_INTERVAL", "geoip.update_interval"),
    ("MAXMIND_DOWNLOAD_URL", "geoip.maxmind_url"),
    ("DBIP_DOWNLOAD_URL", "geoip.dbip_url"),
    ("PREFER_DBIP", "geoip.prefer_dbip"),
];

/// 更新间隔解析失败时的回退值（30 天）
const FALLBACK_UPDATE_INTERVAL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// 静态配置（从 TOML + 环境变量加载，启动时使用）
///
/// - geoip: 数据库路径、下载源、更新间隔
/// - logging: 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub geoip: GeoIpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：旧版扁平 ENV > ENV(MG__*) > config.toml > 默认值
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        use config::{Config, Environment, File};

        let path = path.unwrap_or(DEFAULT_CONFIG_PATH);

        let mut builder = Config::builder()
            // 1. 从 TOML 文件加载（可选）
            .add_source(File::with_name(path).required(false))
            // 2. 从环境变量覆盖，前缀 MG，分隔符 __
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );

        // 3. 兼容旧版环境变量
        for (var, key) in LEGACY_ENV_KEYS {
            let value = std::env::var(var).ok().filter(|v| !v.is_empty());
            builder = builder.set_override_option(*key, value)?;
        }

        let settings = builder.build()?;
        if Path::new(path).exists() {
            eprintln!("[INFO] Configuration loaded from: {}", path);
        }
        settings.try_deserialize::<StaticConfig>()
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// GeoIP 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoIpConfig {
    /// MaxMind license key；为空时不使用 MaxMind
    #[serde(default)]
    pub maxmind_api_key: Option<String>,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// 相对时长，如 "720h"、"30d"
    #[serde(default = "default_update_interval")]
    pub update_interval: String,
    #[serde(default = "default_maxmind_url")]
    pub maxmind_url: String,
    #[serde(default = "default_maxmind_edition")]
    pub maxmind_edition: String,
    /// `{YYYY-MM}` 会被替换为当前年月
    #[serde(default = "default_dbip_url")]
    pub dbip_url: String,
    #[serde(default)]
    pub prefer_dbip: bool,
    /// 单次下载超时（秒）
    #[serde(default = "default_download_timeout")]
    pub download_timeout: u64,
}

impl GeoIpConfig {
    /// The license key, if one is actually set.
    pub fn license_key(&self) -> Option<&str> {
        self.maxmind_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn has_license_key(&self) -> bool {
        self.license_key().is_some()
    }

    /// Directory that holds the dataset file.
    pub fn database_dir(&self) -> PathBuf {
        match self.database_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Parsed refresh period; invalid values fall back to 30 days.
    pub fn update_interval(&self) -> Duration {
        match parse_interval(&self.update_interval) {
            Ok(interval) => interval,
            Err(e) => {
                warn!(
                    "Invalid update interval '{}', using default (30 days): {}",
                    self.update_interval, e
                );
                FALLBACK_UPDATE_INTERVAL
            }
        }
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout.max(1))
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "text" 或 "json"
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

// ============================================================
// Default value functions
// ============================================================

fn default_database_path() -> PathBuf {
    PathBuf::from("./data/GeoLite2-Country.mmdb")
}

fn default_update_interval() -> String {
    "720h".to_string()
}

fn default_maxmind_url() -> String {
    "https://download.maxmind.com/app/geoip_download".to_string()
}

fn default_maxmind_edition() -> String {
    "GeoLite2-Country".to_string()
}

fn default_dbip_url() -> String {
    "https://download.db-ip.com/free/dbip-country-lite-{YYYY-MM}.mmdb.gz".to_string()
}

fn default_download_timeout() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

// ============================================================
// Default implementations
// ============================================================

impl Default for GeoIpConfig {
    fn default() -> Self {
        Self {
            maxmind_api_key: None,
            database_path: default_database_path(),
            update_interval: default_update_interval(),
            maxmind_url: default_maxmind_url(),
            maxmind_edition: default_maxmind_edition(),
            dbip_url: default_dbip_url(),
            prefer_dbip: false,
            download_timeout: default_download_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}
