use std::sync::Arc;
use std::time::{Duration, Instant};

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tokio::runtime::{Builder, Runtime};

use kvfs::{FilePath, FileStore, MemoryKv, ReadOptions, SaveOptions};

const MB: usize = 1024 * 1024;
const BIG_FILE_BYTES: usize = 16 * MB;
const SMALL_FILE_BYTES: usize = 8 * 1024;
const SMALL_FILE_COUNT: usize = 200;

fn tokio_runtime() -> Runtime {
    Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

async fn fresh_store() -> FileStore {
    let store = FileStore::with_kv(Arc::new(MemoryKv::new()));
    store.recovery_finished().await;
    store
}

async fn run_big_write(data: &[u8]) -> Duration {
    let store = fresh_store().await;
    let start = Instant::now();
    store
        .save(SaveOptions::new(FilePath::from(["bench", "big.dat"])), data.to_vec())
        .await
        .record()
        .expect("bench save");
    start.elapsed()
}

async fn run_big_read(data: &[u8]) -> Duration {
    let store = fresh_store().await;
    let path = FilePath::from(["bench", "big.dat"]);
    store
        .save(SaveOptions::new(path.clone()), data.to_vec())
        .await
        .record()
        .expect("bench save");

    let start = Instant::now();
    let (_, content) = store
        .read(ReadOptions::new(path))
        .await
        .found()
        .expect("bench read");
    let body = content.read_to_end().await.expect("bench drain");
    assert_eq!(body.len(), data.len());
    start.elapsed()
}

async fn run_small_writes(data: &[u8]) -> Duration {
    let store = fresh_store().await;
    let start = Instant::now();
    for i in 0..SMALL_FILE_COUNT {
        let path = FilePath::new(["bench".to_string(), format!("small-{i}.dat")]);
        store
            .save(SaveOptions::new(path), data.to_vec())
            .await
            .record()
            .expect("bench save");
    }
    start.elapsed()
}

fn bench_big_file(c: &mut Criterion) {
    let runtime = tokio_runtime();
    let data = payload(BIG_FILE_BYTES);
    let mut group = c.benchmark_group("kvfs_big_file");
    group.throughput(Throughput::Bytes(BIG_FILE_BYTES as u64));

    group.bench_function(BenchmarkId::new("write", BIG_FILE_BYTES / MB), |b| {
        b.iter_custom(|iters| {
            let mut total = Duration::ZERO;
            for _ in 0..iters {
                total += runtime.block_on(run_big_write(&data));
            }
            total
        })
    });

    group.bench_function(BenchmarkId::new("read", BIG_FILE_BYTES / MB), |b| {
        b.iter_custom(|iters| {
            let mut total = Duration::ZERO;
            for _ in 0..iters {
                total += runtime.block_on(run_big_read(&data));
            }
            total
        })
    });

    group.finish();
}

fn bench_small_files(c: &mut Criterion) {
    let runtime = tokio_runtime();
    let data = payload(SMALL_FILE_BYTES);
    let mut group = c.benchmark_group("kvfs_small_file");
    group.throughput(Throughput::Elements(SMALL_FILE_COUNT as u64));

    group.bench_function(BenchmarkId::new("write", SMALL_FILE_COUNT), |b| {
        b.iter_custom(|iters| {
            let mut total = Duration::ZERO;
            for _ in 0..iters {
                total += runtime.block_on(run_small_writes(&data));
            }
            total
        })
    });

    group.finish();
}

criterion_group!(kvfs_benches, bench_big_file, bench_small_files);
criterion_main!(kvfs_benches);
