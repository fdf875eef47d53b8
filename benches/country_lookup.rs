//! 国家查询性能基准测试

#[path = "../tests/common/mod.rs"]
mod common;

use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use micro_geoip::services::geoip::{DatasetHandle, GeoIpService, HotSwapStore, MockGeoIpService};

fn sample_store() -> Arc<HotSwapStore> {
    let store = Arc::new(HotSwapStore::new());
    let handle = DatasetHandle::from_bytes(common::sample_database(), "bench.mmdb").unwrap();
    store.publish(handle);
    store
}

// ============== HotSwapStore ==============

fn bench_store_lookup(c: &mut Criterion) {
    let store = sample_store();

    c.bench_function("store/lookup_hit_v4", |b| {
        b.iter(|| store.lookup(std::hint::black_box("8.8.8.8")))
    });

    c.bench_function("store/lookup_miss_v4", |b| {
        b.iter(|| store.lookup(std::hint::black_box("203.0.113.9")))
    });

    c.bench_function("store/lookup_hit_v6", |b| {
        b.iter(|| store.lookup(std::hint::black_box("2001:db8::1")))
    });

    c.bench_function("store/lookup_invalid", |b| {
        b.iter(|| store.lookup(std::hint::black_box("not-an-ip")))
    });
}

fn bench_publish(c: &mut Criterion) {
    let store = sample_store();
    let buf = common::sample_database();

    c.bench_function("store/publish", |b| {
        b.iter(|| {
            let handle = DatasetHandle::from_bytes(buf.clone(), "bench.mmdb").unwrap();
            store.publish(handle)
        })
    });
}

// ============== GeoIpService ==============

fn bench_mock_service(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = Arc::new(MockGeoIpService::new());

    c.bench_function("mock_service/get_country", |b| {
        b.to_async(&rt).iter(|| {
            let s = Arc::clone(&service);
            async move { s.get_country("8.8.8.8").await }
        });
    });
}

criterion_group!(benches, bench_store_lookup, bench_publish, bench_mock_service);
criterion_main!(benches);
