//! # Write Coordination Benchmarks
//!
//! | Area | Operation | Target |
//! |------|-----------|--------|
//! | Envelope | pack + unpack, 4 KiB body | < 10µs |
//! | Request log | in-memory append | < 1µs |
//! | Request log | file append incl. fsync | disk bound |
//! | Coordinator | primary commit, mock transport | < 50µs |
//! | Cluster | primary + 2 replicas over the bus | < 1ms |

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use rand::RngCore;
use sd_tests::cluster::Cluster;
use sd_write_coordination::{
    CoordinatorConfig, FileRequestLog, InMemoryRequestLog, MockReplicationTransport,
    RequestCoordinator, RequestLog, WriteCoordinationApi,
};
use shared_types::{LogId, NodeId, RequestEnvelope, RequestType};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

fn random_body(len: usize) -> Vec<u8> {
    let mut body = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut body);
    body
}

// ============================================================================
// ENVELOPE
// ============================================================================

fn bench_envelope_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope");

    for size in [256usize, 4 * 1024, 64 * 1024] {
        let envelope = RequestEnvelope::new(RequestType::DocumentInsert, random_body(size))
            .with_addition(random_body(64));
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("pack_unpack", size), &envelope, |b, env| {
            b.iter(|| {
                let packed = env.pack().unwrap();
                black_box(RequestEnvelope::unpack(&packed).unwrap())
            })
        });
    }

    group.finish();
}

// ============================================================================
// REQUEST LOG
// ============================================================================

fn numbered(count: u64) -> Vec<RequestEnvelope> {
    (1..=count)
        .map(|id| {
            let mut envelope = RequestEnvelope::new(RequestType::DocumentUpdate, random_body(512));
            envelope.inc_id = LogId(id);
            envelope
        })
        .collect()
}

fn bench_request_log(c: &mut Criterion) {
    let mut group = c.benchmark_group("request-log");
    let batch = numbered(100);
    group.throughput(Throughput::Elements(batch.len() as u64));

    group.bench_function("memory_append_100", |b| {
        b.iter_batched(
            || {
                let log = InMemoryRequestLog::new();
                log.open().unwrap();
                log
            },
            |log| {
                for envelope in &batch {
                    black_box(log.append(envelope).unwrap());
                }
            },
            BatchSize::SmallInput,
        )
    });

    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));
    group.bench_function("file_append_100", |b| {
        b.iter_batched(
            || {
                let dir = tempfile::tempdir().unwrap();
                let log = FileRequestLog::new(dir.path());
                log.open().unwrap();
                (dir, log)
            },
            |(_dir, log)| {
                for envelope in &batch {
                    black_box(log.append(envelope).unwrap());
                }
            },
            BatchSize::PerIteration,
        )
    });

    group.finish();
}

// ============================================================================
// COORDINATOR
// ============================================================================

fn bench_primary_commit(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("coordinator");

    for replicas in [0usize, 2, 8] {
        let coordinator = rt.block_on(async {
            let (transport, events) = MockReplicationTransport::new(replicas);
            let coordinator = Arc::new(RequestCoordinator::new(
                CoordinatorConfig::for_node(NodeId(1)),
                Arc::new(InMemoryRequestLog::new()),
                Arc::new(transport),
            ));
            coordinator.init().unwrap();
            coordinator.spawn_event_pump(events);
            coordinator
        });

        group.bench_with_input(
            BenchmarkId::new("mock_commit", replicas),
            &coordinator,
            |b, coordinator| {
                b.iter(|| {
                    rt.block_on(async {
                        coordinator
                            .prepare(RequestType::DocumentInsert, b"doc".to_vec())
                            .unwrap();
                        coordinator.process_local_begin().unwrap();
                        coordinator.process_local_finished(true).await.unwrap();
                    })
                })
            },
        );
    }

    group.finish();
}

fn bench_cluster_commit(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let cluster = rt.block_on(async { Cluster::start(2).unwrap() });
    let body = random_body(1024);

    let mut group = c.benchmark_group("cluster");
    group.bench_function("bus_commit_2_replicas", |b| {
        b.iter(|| {
            rt.block_on(async {
                let envelope = cluster
                    .primary()
                    .write(RequestType::DocumentInsert, body.clone())
                    .await
                    .unwrap();
                cluster.settle().await;
                black_box(envelope)
            })
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_envelope_codec,
    bench_request_log,
    bench_primary_commit,
    bench_cluster_commit
);
criterion_main!(benches);
