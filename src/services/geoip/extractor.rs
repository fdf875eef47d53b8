//! Archive extraction.
//!
//! Turns a downloaded blob into the raw `.mmdb` file. The archive format is a
//! closed set, selected by the source that produced the blob.

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::debug;

use crate::errors::ExtractError;

/// 数据库文件后缀
pub const DATASET_SUFFIX: &str = ".mmdb";

const COPY_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveKind {
    /// gzip 压缩的 tar 包，取第一个名称匹配的 `.mmdb` 条目
    TarGz { entry_identifier: String },
    /// 整个文件就是 gzip 压缩的 `.mmdb`
    Gzip,
}

/// Decode `archive` according to `kind` and write the dataset to `destination`.
///
/// The destination is created or truncated; on failure it may be left partial.
pub fn extract(archive: &Path, kind: &ArchiveKind, destination: &Path) -> Result<(), ExtractError> {
    let file = File::open(archive)?;
    let reader = BufReader::new(file);

    match kind {
        ArchiveKind::TarGz { entry_identifier } => {
            extract_tar_entry(GzDecoder::new(reader), entry_identifier, destination)
        }
        ArchiveKind::Gzip => {
            let mut decoder = GzDecoder::new(reader);
            let mut out = File::create(destination)?;
            let written = copy_stream(&mut decoder, &mut out)?;
            debug!(
                "Decompressed {} bytes to {}",
                written,
                destination.display()
            );
            Ok(())
        }
    }
}

fn extract_tar_entry<R: Read>(
    decoder: R,
    identifier: &str,
    destination: &Path,
) -> Result<(), ExtractError> {
    let mut archive = tar::Archive::new(decoder);
    let entries = archive.entries().map_err(malformed)?;

    for entry in entries {
        let mut entry = entry.map_err(malformed)?;
        let name = entry.path().map_err(malformed)?.to_string_lossy().into_owned();

        if name.ends_with(DATASET_SUFFIX) && name.contains(identifier) {
            let mut out = File::create(destination)?;
            let written = copy_stream(&mut entry, &mut out)?;
            debug!(
                "Extracted archive entry {} ({} bytes) to {}",
                name,
                written,
                destination.display()
            );
            return Ok(());
        }

        debug!("Skipping archive entry {}", name);
    }

    Err(ExtractError::EntryNotFound {
        identifier: identifier.to_string(),
        suffix: DATASET_SUFFIX,
    })
}

/// Copy until EOF, classifying read errors as a malformed archive and write
/// errors as local I/O failures.
fn copy_stream<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> Result<u64, ExtractError> {
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(malformed(e)),
        };
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }

    writer.flush()?;
    Ok(total)
}

fn malformed(err: io::Error) -> ExtractError {
    ExtractError::Malformed(err.to_string())
}
