//! 测试公共工具
//!
//! - `MmdbBuilder`: 在内存中生成最小可用的 MaxMind DB 文件
//! - `tar_gz` / `gzip`: 构造下载归档
//! - `MockFetcher`: 按 URL 片段返回预设内容或 HTTP 错误
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Write;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use flate2::Compression;
use flate2::write::GzEncoder;
use micro_geoip::config::GeoIpConfig;
use micro_geoip::errors::FetchError;
use micro_geoip::services::geoip::SourceFetcher;
use tempfile::NamedTempFile;

pub const MAXMIND_HOST: &str = "maxmind.test";
pub const DBIP_HOST: &str = "dbip.test";

// ============== MMDB writer ==============

const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";
const DATA_SEPARATOR: usize = 16;

/// A value in the MMDB data section.
#[derive(Debug, Clone)]
pub enum Value {
    Str(String),
    U16(u16),
    U32(u32),
    U64(u64),
    Map(Vec<(String, Value)>),
    Array(Vec<Value>),
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(s.to_string())
    }

    pub fn map(pairs: Vec<(&str, Value)>) -> Self {
        Value::Map(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Value::Str(s) => {
                write_control(out, 2, s.len());
                out.extend_from_slice(s.as_bytes());
            }
            Value::U16(v) => write_uint(out, 5, *v as u64),
            Value::U32(v) => write_uint(out, 6, *v as u64),
            Value::U64(v) => write_uint(out, 9, *v),
            Value::Map(pairs) => {
                write_control(out, 7, pairs.len());
                for (key, value) in pairs {
                    Value::Str(key.clone()).encode(out);
                    value.encode(out);
                }
            }
            Value::Array(items) => {
                write_control(out, 11, items.len());
                for item in items {
                    item.encode(out);
                }
            }
        }
    }
}

fn write_uint(out: &mut Vec<u8>, type_num: u8, value: u64) {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let payload = &bytes[skip..];
    write_control(out, type_num, payload.len());
    out.extend_from_slice(payload);
}

fn write_control(out: &mut Vec<u8>, type_num: u8, size: usize) {
    let (size_bits, extra): (u8, Vec<u8>) = if size < 29 {
        (size as u8, Vec::new())
    } else if size < 29 + 256 {
        (29, vec![(size - 29) as u8])
    } else if size < 285 + 65536 {
        (30, ((size - 285) as u16).to_be_bytes().to_vec())
    } else {
        let v = (size - 65821) as u32;
        (31, v.to_be_bytes()[1..].to_vec())
    };

    if type_num <= 7 {
        out.push((type_num << 5) | size_bits);
    } else {
        out.push(size_bits);
        out.push(type_num - 7);
    }
    out.extend_from_slice(&extra);
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Record {
    Empty,
    Node(usize),
    Data(usize),
}

/// Builds a 24-bit record MMDB image with a handful of networks.
pub struct MmdbBuilder {
    ip_version: u16,
    database_type: String,
    build_epoch: u64,
    nodes: Vec<[Record; 2]>,
    data: Vec<u8>,
}

impl MmdbBuilder {
    pub fn new(database_type: &str) -> Self {
        Self::with_ip_version(database_type, 6)
    }

    pub fn with_ip_version(database_type: &str, ip_version: u16) -> Self {
        Self {
            ip_version,
            database_type: database_type.to_string(),
            build_epoch: 1_700_000_000,
            nodes: vec![[Record::Empty, Record::Empty]],
            data: Vec::new(),
        }
    }

    pub fn build_epoch(mut self, epoch: u64) -> Self {
        self.build_epoch = epoch;
        self
    }

    /// Insert `network/prefix_len` pointing at `value`.
    ///
    /// IPv4 networks go under `::/96` in an IPv6 tree. Overlapping
    /// networks are not supported.
    pub fn insert(mut self, network: &str, prefix_len: u8, value: Value) -> Self {
        let addr: IpAddr = network.parse().expect("valid network address");
        let (bits, len) = match (addr, self.ip_version) {
            (IpAddr::V4(v4), 4) => (u32::from(v4) as u128, prefix_len as usize),
            (IpAddr::V4(v4), _) => (u32::from(v4) as u128, 96 + prefix_len as usize),
            (IpAddr::V6(v6), 6) => (u128::from(v6), prefix_len as usize),
            (IpAddr::V6(_), _) => panic!("IPv6 network in an IPv4 database"),
        };
        let width = if self.ip_version == 4 { 32 } else { 128 };

        let offset = self.data.len();
        value.encode(&mut self.data);

        let mut node = 0usize;
        for depth in 0..len {
            let bit = ((bits >> (width - 1 - depth)) & 1) as usize;
            if depth == len - 1 {
                self.nodes[node][bit] = Record::Data(offset);
                break;
            }
            node = match self.nodes[node][bit] {
                Record::Node(next) => next,
                Record::Empty => {
                    self.nodes.push([Record::Empty, Record::Empty]);
                    let next = self.nodes.len() - 1;
                    self.nodes[node][bit] = Record::Node(next);
                    next
                }
                Record::Data(_) => panic!("overlapping networks are not supported"),
            };
        }
        self
    }

    /// Shorthand for a GeoLite2-style country record.
    pub fn country(self, network: &str, prefix_len: u8, iso: &str, names: &[(&str, &str)]) -> Self {
        self.insert(network, prefix_len, country_value(iso, names))
    }

    pub fn build(&self) -> Vec<u8> {
        let node_count = self.nodes.len();
        let mut out = Vec::with_capacity(node_count * 6 + DATA_SEPARATOR + self.data.len() + 256);

        for pair in &self.nodes {
            for record in pair {
                let value = match *record {
                    Record::Node(n) => n,
                    Record::Empty => node_count,
                    Record::Data(off) => node_count + DATA_SEPARATOR + off,
                } as u32;
                out.extend_from_slice(&value.to_be_bytes()[1..]);
            }
        }

        out.extend_from_slice(&[0u8; DATA_SEPARATOR]);
        out.extend_from_slice(&self.data);
        out.extend_from_slice(METADATA_MARKER);

        let metadata = Value::map(vec![
            ("binary_format_major_version", Value::U16(2)),
            ("binary_format_minor_version", Value::U16(0)),
            ("build_epoch", Value::U64(self.build_epoch)),
            ("database_type", Value::str(&self.database_type)),
            (
                "description",
                Value::map(vec![("en", Value::str("micro-geoip test database"))]),
            ),
            ("ip_version", Value::U16(self.ip_version)),
            ("languages", Value::Array(vec![Value::str("en")])),
            ("node_count", Value::U32(node_count as u32)),
            ("record_size", Value::U16(24)),
        ]);
        metadata.encode(&mut out);
        out
    }
}

pub fn country_value(iso: &str, names: &[(&str, &str)]) -> Value {
    let names: BTreeMap<&str, &str> = names.iter().copied().collect();
    Value::map(vec![(
        "country",
        Value::map(vec![
            ("geoname_id", Value::U32(6_252_001)),
            ("iso_code", Value::str(iso)),
            (
                "names",
                Value::Map(
                    names
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), Value::str(v)))
                        .collect(),
                ),
            ),
        ]),
    )])
}

/// The dataset most tests use:
/// - 8.8.8.0/24 → US / United States
/// - 81.2.69.0/24 → GB (German and English names)
/// - 2001:db8::/32 → JP
/// - 198.51.100.0/24 → record without a country entry
pub fn sample_database() -> Vec<u8> {
    MmdbBuilder::new("GeoLite2-Country")
        .country(
            "8.8.8.0",
            24,
            "US",
            &[("de", "USA"), ("en", "United States"), ("ja", "アメリカ合衆国")],
        )
        .country("81.2.69.0", 24, "GB", &[("de", "Vereinigtes Königreich"), ("en", "United Kingdom")])
        .country("2001:db8::", 32, "JP", &[("en", "Japan")])
        .insert(
            "198.51.100.0",
            24,
            Value::map(vec![(
                "continent",
                Value::map(vec![("code", Value::str("NA"))]),
            )]),
        )
        .build()
}

/// A dataset that tells itself apart from `sample_database` on 8.8.8.8.
pub fn alternate_database(database_type: &str) -> Vec<u8> {
    MmdbBuilder::new(database_type)
        .build_epoch(1_800_000_000)
        .country("8.8.8.0", 24, "CA", &[("en", "Canada")])
        .build()
}

pub fn ipv4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(a, b, c, d))
}

pub fn ipv6(s: &str) -> IpAddr {
    IpAddr::V6(s.parse::<Ipv6Addr>().expect("valid IPv6 address"))
}

// ============== Archives ==============

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

/// A gzipped tar with the given `(path, content)` entries, in order.
pub fn tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, *content).unwrap();
    }
    let tar_bytes = builder.into_inner().unwrap();
    gzip(&tar_bytes)
}

/// A MaxMind-style archive: four entries, the dataset second.
pub fn maxmind_archive(database: &[u8]) -> Vec<u8> {
    tar_gz(&[
        (
            "GeoLite2-Country_20240102/LICENSE.txt",
            b"license text".as_slice(),
        ),
        ("GeoLite2-Country_20240102/GeoLite2-Country.mmdb", database),
        (
            "GeoLite2-Country_20240102/COPYRIGHT.txt",
            b"copyright".as_slice(),
        ),
        ("GeoLite2-Country_20240102/README.txt", b"readme".as_slice()),
    ])
}

// ============== MockFetcher ==============

enum Route {
    Body(Vec<u8>),
    Status(u16),
}

/// Serves canned responses keyed by a URL fragment.
///
/// URLs with no matching route fail with 404.
#[derive(Default)]
pub struct MockFetcher {
    routes: Mutex<Vec<(String, Route)>>,
    requests: Mutex<Vec<String>>,
    calls: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(self, fragment: &str, body: Vec<u8>) -> Self {
        self.set_body(fragment, body);
        self
    }

    pub fn fail(self, fragment: &str, status: u16) -> Self {
        self.set_status(fragment, status);
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn set_body(&self, fragment: &str, body: Vec<u8>) {
        self.replace(fragment, Route::Body(body));
    }

    pub fn set_status(&self, fragment: &str, status: u16) {
        self.replace(fragment, Route::Status(status));
    }

    fn replace(&self, fragment: &str, route: Route) {
        let mut routes = self.routes.lock().unwrap();
        routes.retain(|(f, _)| f != fragment);
        routes.push((fragment.to_string(), route));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl SourceFetcher for MockFetcher {
    fn fetch(&self, url: &str) -> Result<NamedTempFile, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(url.to_string());

        if let Some(delay) = *self.delay.lock().unwrap() {
            std::thread::sleep(delay);
        }

        let routes = self.routes.lock().unwrap();
        match routes.iter().find(|(fragment, _)| url.contains(fragment.as_str())) {
            Some((_, Route::Body(body))) => {
                let mut file = NamedTempFile::new()?;
                file.write_all(body)?;
                file.flush()?;
                Ok(file)
            }
            Some((_, Route::Status(status))) => Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

// ============== Config ==============

/// Config pointing at the mock hosts with the dataset inside `dir`.
pub fn test_config(dir: &std::path::Path, license_key: Option<&str>) -> GeoIpConfig {
    GeoIpConfig {
        maxmind_api_key: license_key.map(String::from),
        database_path: dir.join("GeoLite2-Country.mmdb"),
        update_interval: "1h".to_string(),
        maxmind_url: format!("https://{}/app/geoip_download", MAXMIND_HOST),
        maxmind_edition: "GeoLite2-Country".to_string(),
        dbip_url: format!("https://{}/free/dbip-country-lite-{{YYYY-MM}}.mmdb.gz", DBIP_HOST),
        prefer_dbip: false,
        download_timeout: 5,
    }
}
