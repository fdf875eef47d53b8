//! HTTP 下载
//!
//! 将数据源下载到临时文件。临时文件随 `NamedTempFile` drop 自动删除，
//! 因此无论一次获取尝试成功与否都不会残留。

use std::io::{self, Write};
use std::time::Duration;

use tempfile::NamedTempFile;
use tracing::debug;
use ureq::Agent;

use super::source::redact_url;
use crate::errors::FetchError;

/// Downloads a source URL into a scoped temporary file.
///
/// Implementations perform a single attempt; fallback between sources is
/// the caller's job.
pub trait SourceFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<NamedTempFile, FetchError>;
}

/// ureq-backed fetcher used in production.
pub struct HttpFetcher {
    agent: Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            // 自行检查状态码，以便在错误中带上 status
            .http_status_as_error(false)
            .build()
            .into();

        Self { agent }
    }
}

impl SourceFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<NamedTempFile, FetchError> {
        let shown = redact_url(url);

        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Timeout(_) => FetchError::Timeout { url: shown.clone() },
            ureq::Error::Io(ref io) if io.kind() == io::ErrorKind::TimedOut => {
                FetchError::Timeout { url: shown.clone() }
            }
            other => FetchError::Transport {
                url: shown.clone(),
                cause: other.to_string(),
            },
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: shown,
                status: status.as_u16(),
            });
        }

        let mut file = tempfile::Builder::new()
            .prefix("micro-geoip-")
            .suffix(".download")
            .tempfile()?;

        let mut body = response.into_body().into_reader();
        let bytes = io::copy(&mut body, file.as_file_mut()).map_err(|e| {
            if is_timeout(&e) {
                FetchError::Timeout { url: shown.clone() }
            } else {
                FetchError::Transport {
                    url: shown.clone(),
                    cause: e.to_string(),
                }
            }
        })?;
        file.as_file_mut().flush()?;

        debug!("Downloaded {} bytes from {} to {}", bytes, shown, file.path().display());
        Ok(file)
    }
}

/// 读取 body 时 ureq 把自身的错误包在 `io::Error::other` 里
fn is_timeout(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::TimedOut
        || e.get_ref()
            .and_then(|inner| inner.downcast_ref::<ureq::Error>())
            .is_some_and(|inner| matches!(inner, ureq::Error::Timeout(_)))
}
