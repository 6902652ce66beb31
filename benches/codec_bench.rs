//! Performance benchmarks for the scan path.
//!
//! Run with: cargo bench

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fest_checkin::scan::{PayloadCodec, PayloadIssuer, PayloadMode, RedemptionGuard, RedemptionPolicy};
use fest_checkin::{AttendeeRecord, DocumentId, InMemoryRecordStore, RecordKey, RollNumber};

const PASSPHRASE: &str = "0123456789abcdef0123456789abcdef";

fn plain_code(i: usize) -> String {
    serde_json::json!({ "roll_num": format!("CS{i:05}") }).to_string()
}

/// Benchmark plain and encrypted payload decoding
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let codec = PayloadCodec::with_passphrase(PayloadMode::Auto, PASSPHRASE).unwrap();
    let issuer = PayloadIssuer::with_passphrase(PASSPHRASE).unwrap();

    let plain = plain_code(42);
    let sealed = issuer
        .issue(&DocumentId::from("doc-00042"), &RollNumber::from("CS00042"))
        .unwrap();

    group.throughput(Throughput::Elements(1));
    group.bench_function("plain", |b| {
        b.iter(|| black_box(codec.decode(black_box(&plain)).unwrap()));
    });
    group.bench_function("sealed", |b| {
        b.iter(|| black_box(codec.decode(black_box(&sealed)).unwrap()));
    });
    group.bench_function("garbage", |b| {
        b.iter(|| black_box(codec.decode(black_box("not a code")).is_err()));
    });

    group.finish();
}

/// Benchmark issuing encrypted codes
fn bench_issue(c: &mut Criterion) {
    let issuer = PayloadIssuer::with_passphrase(PASSPHRASE).unwrap();
    let doc_id = DocumentId::from("doc-00042");
    let roll_num = RollNumber::from("CS00042");

    c.bench_function("issue_sealed", |b| {
        b.iter(|| black_box(issuer.issue(&doc_id, &roll_num).unwrap()));
    });
}

/// Benchmark redemption against the in-memory store at varying roster sizes
fn bench_redeem(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("redeem");

    for size in [100usize, 1_000, 10_000] {
        let records: Vec<AttendeeRecord> = (0..size)
            .map(|i| {
                AttendeeRecord::new(
                    DocumentId::new(format!("doc-{i:05}")),
                    RollNumber::new(format!("CS{i:05}")),
                    format!("Attendee {i}"),
                )
            })
            .collect();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("by_roll_number", size), &size, |b, &size| {
            b.to_async(&rt).iter_batched(
                || {
                    let store = Arc::new(InMemoryRecordStore::with_records(records.clone()));
                    RedemptionGuard::new(store, RedemptionPolicy::Conditional)
                },
                |guard| async move {
                    let key = RecordKey::RollNumber(RollNumber::new(format!("CS{:05}", size / 2)));
                    black_box(guard.redeem(&key).await.unwrap())
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_decode, bench_issue, bench_redeem);
criterion_main!(benches);
