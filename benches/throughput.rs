//! Throughput Benchmark for Postilion Proxy
//!
//! This benchmark measures frame extraction, header emission and buffer
//! pool lease/release under various payload sizes.

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use postilion_proxy::buffer::BufferPool;
use postilion_proxy::protocol::{emit_header, encode_frame, try_extract_frame, Message};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const PAYLOAD_SIZES: [usize; 3] = [64, 1024, 16 * 1024];

fn framed_stream(payload_len: usize, frames: usize) -> BytesMut {
    let payload = vec![0x5Au8; payload_len];
    let mut wire = BytesMut::with_capacity((payload_len + 2) * frames);
    for _ in 0..frames {
        encode_frame(&payload, &mut wire).unwrap();
    }
    wire
}

/// Benchmark extracting frames from a coalesced read buffer
fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");

    for size in PAYLOAD_SIZES {
        let wire = framed_stream(size, 100);
        group.throughput(Throughput::Bytes(wire.len() as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &wire, |b, wire| {
            b.iter(|| {
                let mut rest: &[u8] = wire;
                let mut count = 0;
                while let Some((frame, tail)) = try_extract_frame(rest) {
                    black_box(frame.payload());
                    rest = tail;
                    count += 1;
                }
                black_box(count)
            });
        });
    }

    group.finish();
}

/// Benchmark header emission and full frame encoding
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Elements(1));

    group.bench_function("emit_header", |b| {
        let mut len = 0usize;
        b.iter(|| {
            black_box(emit_header(black_box(len)).unwrap());
            len = (len + 1) % 65_536;
        });
    });

    for size in PAYLOAD_SIZES {
        let payload = vec![0xA5u8; size];
        group.bench_with_input(BenchmarkId::new("encode_frame", size), &payload, |b, payload| {
            let mut wire = BytesMut::with_capacity(size + 2);
            b.iter(|| {
                wire.clear();
                encode_frame(payload, &mut wire).unwrap();
                black_box(wire.len());
            });
        });
    }

    group.bench_function("message_into_lease", |b| {
        let pool = BufferPool::new();
        let message = Message::from(vec![0x30u8; 512]);
        b.iter(|| {
            let mut lease = pool.lease();
            black_box(message.encode_into(&mut lease).unwrap());
        });
    });

    group.finish();
}

/// Benchmark pool lease/release
fn bench_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool");
    group.throughput(Throughput::Elements(1));

    group.bench_function("lease_release", |b| {
        let pool = BufferPool::new();
        b.iter(|| {
            let lease = pool.lease();
            black_box(lease.capacity());
            lease.release();
        });
    });

    group.bench_function("lease_from_1k", |b| {
        let pool = BufferPool::new();
        let data = vec![0x11u8; 1024];
        b.iter(|| {
            let lease = pool.lease_from(&data);
            black_box(lease.len());
        });
    });

    group.finish();
}

/// Benchmark concurrent pool access
fn bench_concurrent(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_lease_release", |b| {
        b.iter(|| {
            let pool = Arc::new(BufferPool::new());
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let pool = Arc::clone(&pool);
                    thread::spawn(move || {
                        for i in 0..10_000u32 {
                            let lease = pool.lease_from(&i.to_be_bytes());
                            black_box(lease.as_slice());
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(pool.stats().outstanding());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_extract,
    bench_encode,
    bench_pool,
    bench_concurrent,
);
criterion_main!(benches);
