//! Acquisition orchestrator.
//!
//! One acquisition cycle tries at most two sources, primary or secondary
//! first depending on configuration. Each attempt downloads, extracts into a
//! staging file next to the canonical dataset, checks that the result opens
//! as a database, and only then renames it over the canonical path. A cycle
//! where every source fails leaves the canonical file untouched.

use std::fs;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::extractor::{ArchiveKind, extract};
use super::fetcher::SourceFetcher;
use super::source::{DatasetSource, SourceKind, dbip_download_url, maxmind_download_url};
use super::store::DatasetHandle;
use crate::config::GeoIpConfig;
use crate::errors::{AcquisitionError, SourceError};

pub struct AcquisitionOrchestrator {
    config: GeoIpConfig,
    fetcher: Arc<dyn SourceFetcher>,
}

impl AcquisitionOrchestrator {
    pub fn new(config: GeoIpConfig, fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self { config, fetcher }
    }

    /// Source tried first, then its fallback.
    ///
    /// MaxMind goes first only when a license key is configured and DB-IP is
    /// not preferred.
    pub fn source_order(&self) -> [SourceKind; 2] {
        let first = if self.config.has_license_key() && !self.config.prefer_dbip {
            SourceKind::MaxMind
        } else {
            SourceKind::DbIp
        };
        [first, first.other()]
    }

    /// Run one acquisition cycle. Blocking; call from a blocking context.
    pub fn acquire(&self) -> Result<SourceKind, AcquisitionError> {
        let [first, second] = self.source_order();

        let first_err = match self.attempt(first) {
            Ok(()) => return Ok(first),
            Err(e) => e,
        };

        if second.is_primary() && !self.config.has_license_key() {
            warn!("{} download failed: {}", first, first_err);
        } else {
            warn!("{} download failed: {}, trying {} fallback", first, first_err, second);
        }

        match self.attempt(second) {
            Ok(()) => Ok(second),
            Err(second_err) => Err(AcquisitionError::from_attempts(
                (first, first_err),
                (second, second_err),
            )),
        }
    }

    /// Resolve the download URL and archive format for `kind`.
    pub fn resolve(&self, kind: SourceKind) -> Result<DatasetSource, SourceError> {
        match kind {
            SourceKind::MaxMind => {
                let key = self
                    .config
                    .license_key()
                    .ok_or(SourceError::NotConfigured("no MaxMind API key provided"))?;
                let url = maxmind_download_url(
                    &self.config.maxmind_url,
                    &self.config.maxmind_edition,
                    key,
                )
                .map_err(|e| SourceError::InvalidUrl(e.to_string()))?;

                Ok(DatasetSource {
                    kind,
                    url,
                    archive: ArchiveKind::TarGz {
                        entry_identifier: self.config.maxmind_edition.clone(),
                    },
                })
            }
            SourceKind::DbIp => Ok(DatasetSource {
                kind,
                url: dbip_download_url(&self.config.dbip_url, Utc::now()),
                archive: ArchiveKind::Gzip,
            }),
        }
    }

    fn attempt(&self, kind: SourceKind) -> Result<(), SourceError> {
        let source = self.resolve(kind)?;

        info!("Downloading GeoIP database from {}...", kind);
        let download = self.fetcher.fetch(&source.url)?;
        self.stage(&download, &source.archive)?;
        // download 在此 drop，临时文件被删除

        info!("{} GeoIP database downloaded and extracted successfully", kind);
        Ok(())
    }

    /// Extract into a sibling staging file, validate it, then atomically
    /// replace the canonical dataset.
    fn stage(
        &self,
        download: &tempfile::NamedTempFile,
        archive: &ArchiveKind,
    ) -> Result<(), SourceError> {
        let dir = self.config.database_dir();
        fs::create_dir_all(&dir).map_err(SourceError::Stage)?;

        let staging = tempfile::Builder::new()
            .prefix(".geoip-staging-")
            .suffix(".mmdb")
            .tempfile_in(&dir)
            .map_err(SourceError::Stage)?;

        extract(download.path(), archive, staging.path())?;
        DatasetHandle::load(staging.path())?;

        staging
            .persist(&self.config.database_path)
            .map_err(|e| SourceError::Stage(e.error))?;
        Ok(())
    }
}
