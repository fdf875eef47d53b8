//! Error taxonomy for the GeoIP database lifecycle.
//!
//! Each stage of an acquisition cycle has its own error type so that the
//! orchestrator can turn per-source failures into fallback decisions, while
//! `GeoIpError` is what crosses the service boundary.

use std::path::PathBuf;

use thiserror::Error;

use crate::services::geoip::SourceKind;

/// HTTP download failure for a single source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("download from {url} failed with status: {status}")]
    Status { url: String, status: u16 },

    #[error("download from {url} timed out")]
    Timeout { url: String },

    #[error("download from {url} failed: {cause}")]
    Transport { url: String, cause: String },

    #[error("failed to save downloaded file: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to turn a downloaded archive into a dataset file.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no '*{suffix}' entry containing '{identifier}' found in archive")]
    EntryNotFound {
        identifier: String,
        suffix: &'static str,
    },

    #[error("malformed archive: {0}")]
    Malformed(String),

    #[error("failed to write extracted dataset: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to open a dataset file as a queryable database.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("database file does not exist: {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to open GeoIP database {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
}

/// Why one source attempt inside an acquisition cycle failed.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source not configured: {0}")]
    NotConfigured(&'static str),

    #[error("invalid source URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("downloaded dataset rejected: {0}")]
    Rejected(#[from] LoadError),

    #[error("failed to stage dataset: {0}")]
    Stage(std::io::Error),
}

/// Both sources were exhausted in one acquisition cycle.
#[derive(Debug, Error)]
#[error("no database source available (primary: {primary}; secondary: {secondary})")]
pub struct AcquisitionError {
    pub primary: SourceError,
    pub secondary: SourceError,
}

impl AcquisitionError {
    /// Build from the two failed attempts, whatever order they ran in.
    pub fn from_attempts(first: (SourceKind, SourceError), second: (SourceKind, SourceError)) -> Self {
        let ((_, primary), (_, secondary)) = if first.0.is_primary() {
            (first, second)
        } else {
            (second, first)
        };
        Self { primary, secondary }
    }
}

/// Per-request lookup failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("invalid IP address: {0}")]
    InvalidAddress(String),

    #[error("GeoIP database not available")]
    Unavailable,

    #[error("GeoIP lookup failed: {0}")]
    Database(String),
}

/// Service-level error.
#[derive(Debug, Error)]
pub enum GeoIpError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("{0}")]
    Config(String),

    #[error("file operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

impl GeoIpError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            GeoIpError::Acquisition(_) => "E001",
            GeoIpError::Load(_) => "E002",
            GeoIpError::Lookup(_) => "E003",
            GeoIpError::Config(_) => "E004",
            GeoIpError::Io(_) => "E005",
            GeoIpError::Task(_) => "E006",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            GeoIpError::Acquisition(_) => "Acquisition Error",
            GeoIpError::Load(_) => "Database Load Error",
            GeoIpError::Lookup(_) => "Lookup Error",
            GeoIpError::Config(_) => "Configuration Error",
            GeoIpError::Io(_) => "File Operation Error",
            GeoIpError::Task(_) => "Task Error",
        }
    }

    /// 格式化为简洁输出（用于 CLI 模式）
    pub fn format_simple(&self) -> String {
        format!("[{}] {}: {}", self.code(), self.error_type(), self)
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        GeoIpError::Config(msg.into())
    }
}

impl From<tokio::task::JoinError> for GeoIpError {
    fn from(err: tokio::task::JoinError) -> Self {
        GeoIpError::Task(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GeoIpError>;
