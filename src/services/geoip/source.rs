//! Download sources.
//!
//! There are exactly two: MaxMind (primary, needs a license key, ships a
//! tar.gz) and DB-IP (secondary, free, ships a plain gzip of the mmdb).

use chrono::{DateTime, Utc};
use url::Url;

use super::extractor::ArchiveKind;

/// DB-IP 下载地址中的年月占位符
pub const DBIP_DATE_PLACEHOLDER: &str = "{YYYY-MM}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// 商业源（需要 license key）
    MaxMind,
    /// 免费源
    DbIp,
}

impl SourceKind {
    pub fn is_primary(&self) -> bool {
        matches!(self, SourceKind::MaxMind)
    }

    /// The other source, used as the fallback.
    pub fn other(&self) -> Self {
        match self {
            SourceKind::MaxMind => SourceKind::DbIp,
            SourceKind::DbIp => SourceKind::MaxMind,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::MaxMind => write!(f, "MaxMind"),
            SourceKind::DbIp => write!(f, "DB-IP"),
        }
    }
}

/// A fully resolved download for one acquisition attempt.
#[derive(Debug, Clone)]
pub struct DatasetSource {
    pub kind: SourceKind,
    pub url: String,
    pub archive: ArchiveKind,
}

/// Build the MaxMind permalink: `{base}?edition_id=..&license_key=..&suffix=tar.gz`
pub fn maxmind_download_url(
    base: &str,
    edition_id: &str,
    license_key: &str,
) -> Result<String, url::ParseError> {
    let url = Url::parse_with_params(
        base,
        &[
            ("edition_id", edition_id),
            ("license_key", license_key),
            ("suffix", "tar.gz"),
        ],
    )?;
    Ok(url.into())
}

/// Substitute the first `{YYYY-MM}` in the DB-IP template with the given month.
pub fn dbip_download_url(template: &str, now: DateTime<Utc>) -> String {
    let month = now.format("%Y-%m").to_string();
    template.replacen(DBIP_DATE_PLACEHOLDER, &month, 1)
}

/// 隐藏 URL 中的 license_key，避免写入日志
pub fn redact_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };

    if !url.query_pairs().any(|(k, _)| k == "license_key") {
        return raw.to_string();
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            if k == "license_key" {
                (k.into_owned(), "REDACTED".to_string())
            } else {
                (k.into_owned(), v.into_owned())
            }
        })
        .collect();

    url.query_pairs_mut().clear().extend_pairs(pairs);
    url.into()
}
