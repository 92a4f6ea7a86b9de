// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Conversion engine benchmarks.
//!
//! Measures the core codec characteristics:
//! - container decode (buffer -> dynamic value)
//! - container encode (dynamic value -> buffer)
//! - direct byte-copy fast path

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dynbind::{Database, ElemKind, Instance, MapSchema, Value};
use std::rc::Rc;

fn telemetry_db() -> Rc<Database> {
    let mut schema = MapSchema::new();
    let u8_t = schema.scalar("uint8", ElemKind::Unsigned, 1);
    let u32_t = schema.scalar("uint32", ElemKind::Unsigned, 4);
    let u64_t = schema.scalar("uint64", ElemKind::Unsigned, 8);
    let f64_t = schema.scalar("float64", ElemKind::Float, 8);
    let name = schema.string("name32", 32);
    let samples = schema.array("Samples16", f64_t, 16).expect("array");
    schema
        .container(
            "Telemetry",
            &[
                ("seq", u64_t),
                ("source", u32_t),
                ("quality", u8_t),
                ("label", name),
                ("samples", samples),
            ],
        )
        .expect("container");
    Database::open("bench_telemetry", Rc::new(schema))
}

fn bench_decode(c: &mut Criterion) {
    let db = telemetry_db();
    let telemetry = db.lookup_name("Telemetry").expect("type");
    let inst = Instance::new(&telemetry).expect("instance");
    inst.set("seq", &Value::UInt(42)).expect("seq");
    inst.set("label", &Value::from("bench")).expect("label");

    c.bench_function("decode_telemetry", |b| {
        b.iter(|| black_box(inst.read().expect("decode")));
    });
}

fn bench_encode(c: &mut Criterion) {
    let db = telemetry_db();
    let telemetry = db.lookup_name("Telemetry").expect("type");
    let inst = Instance::new(&telemetry).expect("instance");
    let value = {
        let seeded = Instance::new(&telemetry).expect("seed");
        seeded.set("seq", &Value::UInt(7)).expect("seq");
        seeded.set("quality", &Value::UInt(3)).expect("quality");
        seeded.read().expect("read")
    };

    c.bench_function("encode_telemetry", |b| {
        b.iter(|| inst.write(black_box(&value)).expect("encode"));
    });
}

fn bench_direct_copy(c: &mut Criterion) {
    let db = telemetry_db();
    let telemetry = db.lookup_name("Telemetry").expect("type");
    let src = Instance::new(&telemetry).expect("src");
    src.set("seq", &Value::UInt(9)).expect("seq");
    let dst = Instance::new(&telemetry).expect("dst");
    let source = Value::Object(src);

    c.bench_function("direct_copy_telemetry", |b| {
        b.iter(|| dst.write(black_box(&source)).expect("copy"));
    });
}

criterion_group!(benches, bench_decode, bench_encode, bench_direct_copy);
criterion_main!(benches);
