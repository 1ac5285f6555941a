use connect_crypto::{BlobCodec, EcdhKeyPair, SealedBlobCodec};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const DEVICE_ID: &str = "0123456789abcdef0123456789abcdef01234567";

/// Benchmark sealing a credential payload, including the key agreement.
fn bench_blob_seal(c: &mut Criterion) {
    let mut group = c.benchmark_group("blob_seal");
    let source = EcdhKeyPair::generate();
    let target = EcdhKeyPair::generate();
    let target_public = target.public_key();

    for size in [64, 256, 1024] {
        group.throughput(Throughput::Bytes(size as u64));
        let payload = vec![0xABu8; size];

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                SealedBlobCodec.encrypt(
                    black_box(&source),
                    black_box(&target_public),
                    DEVICE_ID,
                    "alice",
                    black_box(&payload),
                )
            });
        });
    }

    group.finish();
}

/// Benchmark opening a sealed blob on the target side.
fn bench_blob_open(c: &mut Criterion) {
    let mut group = c.benchmark_group("blob_open");
    let source = EcdhKeyPair::generate();
    let target = EcdhKeyPair::generate();
    let source_public = source.public_key();

    for size in [64, 256, 1024] {
        group.throughput(Throughput::Bytes(size as u64));
        let payload = vec![0xABu8; size];
        let blob = SealedBlobCodec
            .encrypt(&source, &target.public_key(), DEVICE_ID, "alice", &payload)
            .unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                SealedBlobCodec.decrypt(
                    black_box(&target),
                    black_box(&source_public),
                    DEVICE_ID,
                    "alice",
                    black_box(&blob),
                )
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_blob_seal, bench_blob_open);
criterion_main!(benches);
