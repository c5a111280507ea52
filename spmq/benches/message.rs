//! Message engine benchmarks
//!
//! Measures the buffer operations every delivery goes through: allocation,
//! header push/pop, and growing a body into its headroom.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use spmq::compat::msg;
use spmq::message::Message;
use spmq::prelude::*;

const MESSAGE_SIZES: &[usize] = &[64, 1024, 16 * 1024];

fn alloc_and_fill(c: &mut Criterion) {
    let mut group = c.benchmark_group("message/alloc");
    for &size in MESSAGE_SIZES {
        let payload = vec![0xA5u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| black_box(Message::from_body(black_box(payload)).unwrap()));
        });
    }
    group.finish();
}

fn header_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("message/header");
    group.bench_function("push_pop_u32", |b| {
        let mut msg = Message::alloc(256).unwrap();
        b.iter(|| {
            msg.append_header_u32(black_box(0x8000_0001)).unwrap();
            msg.prepend_header(&7u32.to_be_bytes()).unwrap();
            black_box(msg.trim_header_u32().unwrap());
            black_box(msg.trim_header_u32().unwrap());
        });
    });
    group.finish();
}

fn prepend_trim(c: &mut Criterion) {
    let mut group = c.benchmark_group("message/prepend_trim");
    for &size in MESSAGE_SIZES {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut msg = Message::alloc(size).unwrap();
            let prefix = [0u8; 8];
            b.iter(|| {
                msg.prepend(black_box(&prefix)).unwrap();
                msg.trim(prefix.len()).unwrap();
            });
        });
    }
    group.finish();
}

fn legacy_alloc_free(c: &mut Criterion) {
    c.bench_function("legacy/alloc_free", |b| {
        b.iter(|| {
            let ptr = msg::alloc_msg(black_box(128), 0).unwrap();
            msg::free_msg(ptr).unwrap();
        });
    });
}

fn inproc_round_trip(c: &mut Criterion) {
    spmq::dev_tracing::init_tracing();

    let rep = Socket::open(Protocol::Rep).unwrap();
    rep.listen("inproc://bench-round-trip").unwrap();
    let req = Socket::open(Protocol::Req).unwrap();
    req.dial("inproc://bench-round-trip").unwrap();

    c.bench_function("socket/req_rep_round_trip", |b| {
        b.iter(|| {
            req.send(Message::from_body(b"ping").unwrap()).unwrap();
            let request = rep.recv().unwrap();
            rep.send(request).unwrap();
            black_box(req.recv().unwrap());
        });
    });
}

criterion_group!(
    benches,
    alloc_and_fill,
    header_routing,
    prepend_trim,
    legacy_alloc_free,
    inproc_round_trip
);
criterion_main!(benches);
