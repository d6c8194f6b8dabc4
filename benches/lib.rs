//! # YaoXiang stream benchmarks
//!
//! Criterion benchmarks for the character layer.
//!
//! ## Groups
//! - `decode`: pending-input decoding of buffered bytes
//! - `streams`: reading and writing through in-memory streams
//!
//! ## Usage
//! ```bash
//! cargo bench          # run everything
//! cargo bench decode   # decoding only
//! ```

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;
use yaoxiang_stream::stream::{
    decode_buffered, Encoding, MemoryTransport, Newline, Position, Registry,
};
use yaoxiang_stream::util::config::StreamConfig;

fn sample_text() -> String {
    "The quick brown fox 跳过了 lazy dog, €42 ↔ ÿ\r\n".repeat(1024)
}

fn bench_registry() -> Arc<Registry> {
    Registry::builder()
        .config(StreamConfig::default())
        .standard_streams(
            Box::new(MemoryTransport::reader(Vec::new())),
            Box::new(MemoryTransport::writer()),
            Box::new(MemoryTransport::writer()),
        )
        .build()
}

// ============================================================================
// Decoding
// ============================================================================

fn bench_decode_utf8(c: &mut Criterion) {
    let text = sample_text();
    let bytes = text.as_bytes();
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("utf8_posix", |b| {
        b.iter(|| {
            let mut newline = Newline::Posix;
            decode_buffered(black_box(bytes), Encoding::Utf8, true, &mut newline, None)
        })
    });

    group.bench_function("utf8_detect_with_position", |b| {
        b.iter(|| {
            let mut newline = Newline::Detect;
            let mut position = Position::default();
            decode_buffered(
                black_box(bytes),
                Encoding::Utf8,
                true,
                &mut newline,
                Some(&mut position),
            )
        })
    });

    let utf16: Vec<u8> = text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
    group.bench_function("utf16le", |b| {
        b.iter(|| {
            let mut newline = Newline::Posix;
            decode_buffered(black_box(&utf16), Encoding::UnicodeLe, true, &mut newline, None)
        })
    });

    group.finish();
}

// ============================================================================
// Streams
// ============================================================================

fn bench_read_codes(c: &mut Criterion) {
    let registry = bench_registry();
    let text = sample_text();
    c.bench_function("read_codes_utf8", |b| {
        b.iter(|| {
            let s = registry.open_memory_input(text.as_bytes().to_vec(), Encoding::Utf8);
            let mut count = 0usize;
            {
                let mut g = s.lock().unwrap();
                while let Some(code) = g.get_code().unwrap() {
                    black_box(code);
                    count += 1;
                }
            }
            registry.close_stream(&s, true).unwrap();
            count
        })
    });
}

fn bench_write_capture(c: &mut Criterion) {
    let registry = bench_registry();
    let text = sample_text();
    c.bench_function("write_capture_utf8", |b| {
        b.iter(|| {
            let s = registry.open_memory_output(Encoding::Utf8);
            let mut g = s.lock().unwrap();
            g.write_str(black_box(&text)).unwrap();
            g.close_capture().unwrap()
        })
    });
}

fn bench_copy_stream(c: &mut Criterion) {
    let registry = bench_registry();
    let text = sample_text();
    c.bench_function("copy_utf8_to_utf16", |b| {
        b.iter(|| {
            let input = registry.open_memory_input(text.as_bytes().to_vec(), Encoding::Utf8);
            let output = registry.open_memory_output(Encoding::UnicodeBe);
            let n = registry.copy_stream_data(&input, &output, None).unwrap();
            registry.close_stream(&input, true).unwrap();
            registry.close_stream(&output, true).unwrap();
            n
        })
    });
}

// ============================================================================
// Criterion Groups
// ============================================================================

criterion_group!(
    name = decode;
    config = Criterion::default().sample_size(50);
    targets = bench_decode_utf8
);

criterion_group!(
    name = streams;
    config = Criterion::default().sample_size(30);
    targets = bench_read_codes, bench_write_capture, bench_copy_stream
);

criterion_main!(decode, streams);
